//! Durable credential storage for the WorkHelper session
//!
//! Persists the access token, the serialized user profile, and the last
//! activity timestamp under the home directory so a session survives an
//! application restart. Key names are stable: `token`, `user`,
//! `lastActivity`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::error::{Result, StoreError};
use crate::models::User;

/// On-disk session record.
///
/// The user profile is kept as the JSON string the backend handed back,
/// so a corrupt blob is detected on load rather than trusted blindly.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct SessionFile {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    token: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    user: Option<String>,

    /// Epoch milliseconds, string-encoded
    #[serde(
        rename = "lastActivity",
        default,
        skip_serializing_if = "Option::is_none"
    )]
    last_activity: Option<String>,
}

/// File-backed store for the current session credentials
pub struct CredentialStore {
    path: PathBuf,
}

impl CredentialStore {
    /// Open the store at the default location.
    pub fn open() -> Result<Self> {
        Ok(Self {
            path: Self::default_path()?,
        })
    }

    /// Get the default session file path (~/.workhelper/session.yaml)
    pub fn default_path() -> Result<PathBuf> {
        let home = dirs::home_dir().ok_or(StoreError::NoHome)?;
        Ok(home.join(".workhelper").join("session.yaml"))
    }

    /// Open the store at a specific path (for testing)
    pub fn open_at(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Persist a new session. Writes token and user and resets the
    /// activity stamp to now. The token is stored as-is; callers
    /// validate it before use.
    pub fn save(&self, token: &str, user: &User) -> Result<()> {
        let blob =
            serde_json::to_string(user).map_err(|e| StoreError::Serialize(e.to_string()))?;

        self.write_file(&SessionFile {
            token: Some(token.to_string()),
            user: Some(blob),
            last_activity: Some(now_ms()),
        })
    }

    /// Load the persisted session, if any.
    ///
    /// Returns `Some` only when both the token and a parseable user
    /// profile are present. A user blob that fails to parse clears the
    /// store and reads as absent.
    pub fn load(&self) -> Option<(String, User)> {
        let file = self.read_file()?;
        let (Some(token), Some(blob)) = (file.token, file.user) else {
            return None;
        };

        match serde_json::from_str(&blob) {
            Ok(user) => Some((token, user)),
            Err(err) => {
                log::warn!("stored user profile failed to parse, clearing session: {err}");
                self.clear();
                None
            }
        }
    }

    /// Remove the persisted session. Safe to call repeatedly; a missing
    /// file is not an error.
    pub fn clear(&self) {
        if let Err(err) = std::fs::remove_file(&self.path) {
            if err.kind() != std::io::ErrorKind::NotFound {
                log::warn!("failed to clear session store: {err}");
            }
        }
    }

    /// Rewrite only the activity stamp.
    pub fn touch_activity(&self) -> Result<()> {
        let mut file = self.read_file().unwrap_or_default();
        file.last_activity = Some(now_ms());
        self.write_file(&file)
    }

    /// The persisted last-activity time, if present and well-formed.
    pub fn last_activity(&self) -> Option<DateTime<Utc>> {
        let ms: i64 = self.read_file()?.last_activity?.parse().ok()?;
        DateTime::from_timestamp_millis(ms)
    }

    fn read_file(&self) -> Option<SessionFile> {
        let contents = match std::fs::read_to_string(&self.path) {
            Ok(contents) => contents,
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => return None,
            Err(err) => {
                log::warn!("failed to read session store: {err}");
                return None;
            }
        };

        match serde_yaml::from_str(&contents) {
            Ok(file) => Some(file),
            Err(err) => {
                log::warn!("session store is corrupt, clearing: {err}");
                self.clear();
                None
            }
        }
    }

    fn write_file(&self, file: &SessionFile) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| StoreError::Io(e.to_string()))?;
        }

        let contents =
            serde_yaml::to_string(file).map_err(|e| StoreError::Serialize(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| StoreError::Io(e.to_string()))?;

        // Credentials only readable by the owner on Unix systems
        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mut perms = std::fs::metadata(&self.path)
                .map_err(|e| StoreError::Io(e.to_string()))?
                .permissions();
            perms.set_mode(0o600);
            std::fs::set_permissions(&self.path, perms)
                .map_err(|e| StoreError::Io(e.to_string()))?;
        }

        Ok(())
    }
}

fn now_ms() -> String {
    Utc::now().timestamp_millis().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    fn sample_user() -> User {
        User {
            id: 7,
            username: "grace".to_string(),
            email: "grace@example.com".to_string(),
            full_name: Some("Grace Park".to_string()),
            role: "user".to_string(),
            is_active: true,
        }
    }

    #[test]
    fn test_save_then_load_round_trips() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::open_at(temp.path().join("session.yaml"));

        store.save("tok-1", &sample_user()).unwrap();

        let (token, user) = store.load().expect("session should load");
        assert_eq!(token, "tok-1");
        assert_eq!(user, sample_user());
    }

    #[test]
    fn test_load_missing_file_returns_none() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::open_at(temp.path().join("session.yaml"));

        assert!(store.load().is_none());
    }

    #[test]
    fn test_clear_is_idempotent() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::open_at(temp.path().join("session.yaml"));

        // Clearing an empty store must not panic or error.
        store.clear();
        store.clear();

        store.save("tok-1", &sample_user()).unwrap();
        store.clear();
        store.clear();

        assert!(store.load().is_none());
    }

    #[test]
    fn test_corrupt_user_blob_clears_store() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.yaml");
        let store = CredentialStore::open_at(&path);

        std::fs::write(
            &path,
            "token: tok-1\nuser: 'not json at all'\nlastActivity: '1700000000000'\n",
        )
        .unwrap();

        assert!(store.load().is_none());
        assert!(!path.exists(), "corrupt session file should be removed");
    }

    #[test]
    fn test_corrupt_file_reads_as_absent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.yaml");
        let store = CredentialStore::open_at(&path);

        std::fs::write(&path, ": not : valid : yaml [").unwrap();

        assert!(store.load().is_none());
    }

    #[test]
    fn test_token_without_user_reads_as_absent() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.yaml");
        let store = CredentialStore::open_at(&path);

        std::fs::write(&path, "token: tok-1\n").unwrap();

        assert!(store.load().is_none());
    }

    #[test]
    fn test_garbage_token_stored_as_is() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::open_at(temp.path().join("session.yaml"));

        store.save("not-a-jwt", &sample_user()).unwrap();

        let (token, _) = store.load().unwrap();
        assert_eq!(token, "not-a-jwt");
    }

    #[test]
    fn test_save_resets_activity_stamp() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::open_at(temp.path().join("session.yaml"));

        let before = Utc::now();
        store.save("tok-1", &sample_user()).unwrap();

        let stamp = store.last_activity().expect("stamp should exist");
        assert!(stamp >= before - chrono::Duration::seconds(1));
        assert!(stamp <= Utc::now() + chrono::Duration::seconds(1));
    }

    #[test]
    fn test_touch_activity_is_non_decreasing() {
        let temp = tempdir().unwrap();
        let store = CredentialStore::open_at(temp.path().join("session.yaml"));

        store.save("tok-1", &sample_user()).unwrap();
        let first = store.last_activity().unwrap();

        store.touch_activity().unwrap();
        let second = store.last_activity().unwrap();

        assert!(second >= first);
        // Token and user survive an activity-only write.
        assert!(store.load().is_some());
    }

    #[test]
    fn test_activity_stamp_is_string_epoch_ms() {
        let temp = tempdir().unwrap();
        let path = temp.path().join("session.yaml");
        let store = CredentialStore::open_at(&path);

        store.save("tok-1", &sample_user()).unwrap();

        let contents = std::fs::read_to_string(&path).unwrap();
        let file: serde_yaml::Value = serde_yaml::from_str(&contents).unwrap();
        let stamp = file["lastActivity"]
            .as_str()
            .expect("lastActivity should be a string");
        let ms: i64 = stamp.parse().expect("should be numeric");
        assert!(ms > 1_000_000_000_000, "should be epoch milliseconds");
    }

    #[cfg(unix)]
    #[test]
    fn test_session_file_is_owner_only() {
        use std::os::unix::fs::PermissionsExt;

        let temp = tempdir().unwrap();
        let path = temp.path().join("session.yaml");
        let store = CredentialStore::open_at(&path);

        store.save("tok-1", &sample_user()).unwrap();

        let mode = std::fs::metadata(&path).unwrap().permissions().mode();
        assert_eq!(mode & 0o777, 0o600);
    }
}
