//! WorkHelper API client with transparent token lifecycle
//!
//! Every screen issues its REST calls through [`SessionCoordinator`].
//! The coordinator checks token expiry before each call, silently
//! refreshes when a token is close to lapsing, retries a call exactly
//! once after a 401, and funnels every session-fatal condition through
//! one forced-logout path.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Client as HttpClient, Method, StatusCode};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tokio::sync::{RwLock, watch};

use super::{SessionControl, SessionState, token};
use crate::error::{ApiError, Error, Result};
use crate::models::{LoginResponse, PasswordChange, RefreshResponse, RegisterRequest, User};
use crate::store::CredentialStore;

/// Request timeout. Also bounds a hung refresh call, so the refresh
/// guard cannot stay held forever.
const HTTP_TIMEOUT: Duration = Duration::from_secs(30);

/// The refresh endpoint is excluded from the pre-request expiry check
/// and from the 401 retry, preventing refresh recursion.
const REFRESH_PATH: &str = "/api/auth/refresh";

/// Notice shown on the login screen after a session-fatal 401.
pub const SESSION_EXPIRED_NOTICE: &str = "Session expired. Please sign in again.";

/// In-memory mirror of the live session
#[derive(Debug, Clone, Default)]
struct AuthState {
    token: Option<String>,
    user: Option<User>,
}

/// Session-aware client for the WorkHelper REST API
pub struct SessionCoordinator {
    http: HttpClient,
    base_url: String,
    store: CredentialStore,
    auth: RwLock<AuthState>,
    /// At most one refresh may be in flight process-wide. Checked and
    /// set atomically, with no suspension point in between.
    refreshing: AtomicBool,
    state_tx: watch::Sender<SessionState>,
}

impl SessionCoordinator {
    /// Create a coordinator over the given backend and credential
    /// store. A complete persisted session (token plus parseable user)
    /// is restored without a network call.
    pub fn new(base_url: impl Into<String>, store: CredentialStore) -> Result<Self> {
        let http = HttpClient::builder()
            .timeout(HTTP_TIMEOUT)
            .build()
            .map_err(|e| ApiError::Network(e.to_string()))?;

        let restored = store.load();
        if restored.is_some() {
            // Restart the idle clock from now, not from stale storage.
            if let Err(err) = store.touch_activity() {
                log::warn!("failed to reset activity stamp on restore: {err}");
            }
        }

        let auth = match &restored {
            Some((token, user)) => AuthState {
                token: Some(token.clone()),
                user: Some(user.clone()),
            },
            None => AuthState::default(),
        };

        let initial = match restored {
            Some((_, user)) => {
                log::info!("restored session for {}", user.username);
                SessionState::SignedIn { user }
            }
            None => SessionState::SignedOut { notice: None },
        };
        let (state_tx, _) = watch::channel(initial);

        Ok(Self {
            http,
            base_url: base_url.into(),
            store,
            auth: RwLock::new(auth),
            refreshing: AtomicBool::new(false),
            state_tx,
        })
    }

    /// Watch session lifecycle transitions.
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.state_tx.subscribe()
    }

    /// Profile of the signed-in user, if any.
    pub async fn current_user(&self) -> Option<User> {
        self.auth.read().await.user.clone()
    }

    pub async fn is_authenticated(&self) -> bool {
        self.auth.read().await.token.is_some()
    }

    pub async fn is_admin(&self) -> bool {
        self.auth
            .read()
            .await
            .user
            .as_ref()
            .is_some_and(User::is_admin)
    }

    /// Authenticate with username and password.
    ///
    /// The backend takes OAuth2 form fields. On success the session is
    /// persisted and `SignedIn` is published.
    pub async fn login(&self, username: &str, password: &str) -> Result<User> {
        let url = format!("{}/api/auth/login", self.base_url);
        let response = self
            .http
            .post(&url)
            .form(&[("username", username), ("password", password)])
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_error_status(status, response).await);
        }

        let body: LoginResponse = response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse login response: {e}")))?;

        self.store.save(&body.access_token, &body.user)?;
        {
            let mut auth = self.auth.write().await;
            auth.token = Some(body.access_token.clone());
            auth.user = Some(body.user.clone());
        }
        self.state_tx.send_replace(SessionState::SignedIn {
            user: body.user.clone(),
        });

        log::info!("signed in as {}", body.user.username);
        Ok(body.user)
    }

    /// Create a new account. Unauthenticated; does not start a session.
    pub async fn register(&self, request: &RegisterRequest) -> Result<User> {
        let url = format!("{}/api/auth/register", self.base_url);
        let response = self
            .http
            .post(&url)
            .json(request)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_error_status(status, response).await);
        }

        response
            .json()
            .await
            .map_err(|e| ApiError::InvalidResponse(format!("Failed to parse user: {e}")).into())
    }

    /// Fetch the signed-in user's profile from the backend.
    pub async fn me(&self) -> Result<User> {
        self.get("/api/auth/me").await
    }

    /// Change the signed-in user's password.
    pub async fn change_password(&self, change: &PasswordChange) -> Result<()> {
        let _: serde_json::Value = self
            .request(Method::PUT, "/api/auth/change-password", Some(change))
            .await?;
        Ok(())
    }

    /// User-initiated logout. Same teardown as a forced logout, with no
    /// notice for the login screen.
    pub async fn logout(&self) {
        log::info!("user-initiated logout");
        self.teardown(None).await;
    }

    /// System-initiated session teardown: clear the store, reset the
    /// in-memory state, publish `SignedOut` with the optional reason.
    pub async fn force_logout(&self, reason: Option<&str>) {
        log::warn!(
            "forced logout: {}",
            reason.unwrap_or("no reason given")
        );
        self.teardown(reason.map(str::to_string)).await;
    }

    async fn teardown(&self, notice: Option<String>) {
        self.store.clear();
        {
            let mut auth = self.auth.write().await;
            *auth = AuthState::default();
        }
        self.state_tx
            .send_replace(SessionState::SignedOut { notice });
    }

    /// Persist an activity stamp. Called by the activity monitor on
    /// every recognized user interaction.
    pub fn touch_activity(&self) {
        if let Err(err) = self.store.touch_activity() {
            log::warn!("failed to persist activity stamp: {err}");
        }
    }

    /// Exchange the current token for a fresh one.
    ///
    /// At most one refresh runs at a time; a caller that loses the race
    /// returns immediately without touching the network. A 401 from the
    /// refresh endpoint is session-fatal and triggers a forced logout;
    /// any other failure leaves the session intact and is surfaced to
    /// the caller only.
    pub async fn refresh(&self) -> Result<()> {
        if self.refreshing.swap(true, Ordering::SeqCst) {
            log::debug!("refresh already in flight, skipping");
            return Ok(());
        }

        let result = self.refresh_inner().await;
        self.refreshing.store(false, Ordering::SeqCst);

        if let Err(Error::Api(ApiError::Unauthorized)) = &result {
            self.force_logout(Some(SESSION_EXPIRED_NOTICE)).await;
        }
        result
    }

    async fn refresh_inner(&self) -> Result<()> {
        // Re-read storage rather than trusting the in-memory copy; a
        // concurrent writer may have replaced the token.
        let Some((current_token, stored_user)) = self.store.load() else {
            log::debug!("no stored session, nothing to refresh");
            return Ok(());
        };

        let url = format!("{}{}", self.base_url, REFRESH_PATH);
        let response = self
            .http
            .post(&url)
            .bearer_auth(&current_token)
            .send()
            .await
            .map_err(ApiError::from)?;

        let status = response.status();
        if !status.is_success() {
            return Err(map_error_status(status, response).await);
        }

        let body: RefreshResponse = response.json().await.map_err(|e| {
            ApiError::InvalidResponse(format!("Failed to parse refresh response: {e}"))
        })?;

        // The refresh response is trusted fully: a returned user
        // replaces the stored profile.
        let user = body.user.unwrap_or(stored_user);
        self.store.save(&body.access_token, &user)?;
        {
            let mut auth = self.auth.write().await;
            auth.token = Some(body.access_token.clone());
            auth.user = Some(user.clone());
        }
        self.state_tx
            .send_replace(SessionState::SignedIn { user });

        log::debug!("access token refreshed");
        Ok(())
    }

    /// Issue a GET through the session pipeline.
    pub async fn get<T: DeserializeOwned>(&self, path: &str) -> Result<T> {
        self.request(Method::GET, path, None::<&()>).await
    }

    /// Issue a POST with a JSON body through the session pipeline.
    pub async fn post<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::POST, path, Some(body)).await
    }

    /// Issue a PUT with a JSON body through the session pipeline.
    pub async fn put<T, B>(&self, path: &str, body: &B) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.request(Method::PUT, path, Some(body)).await
    }

    /// Issue a DELETE through the session pipeline, discarding the
    /// response body.
    pub async fn delete(&self, path: &str) -> Result<()> {
        let _: serde_json::Value = self.request(Method::DELETE, path, None::<&()>).await?;
        Ok(())
    }

    /// Authenticated request with the pre-request expiry hook and the
    /// 401 retry-once policy.
    async fn request<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        self.ensure_fresh_token(path).await?;

        match self.send_once(method.clone(), path, body).await {
            Err(Error::Api(ApiError::Unauthorized)) if !path.contains(REFRESH_PATH) => {
                log::debug!("401 on {method} {path}, refreshing and retrying once");

                if let Err(err) = self.refresh().await {
                    log::warn!("refresh after 401 failed: {err}");
                    self.force_logout(Some(SESSION_EXPIRED_NOTICE)).await;
                    return Err(ApiError::Unauthorized.into());
                }

                match self.send_once(method, path, body).await {
                    Err(Error::Api(ApiError::Unauthorized)) => {
                        // Retried and still rejected. Fatal.
                        self.force_logout(Some(SESSION_EXPIRED_NOTICE)).await;
                        Err(ApiError::Unauthorized.into())
                    }
                    other => other,
                }
            }
            other => other,
        }
    }

    /// Pre-request hook: refresh a near-expiry token before the call
    /// goes out. Skipped for the refresh endpoint itself and while a
    /// refresh is already in flight; a transient refresh failure lets
    /// the call proceed with the current token.
    async fn ensure_fresh_token(&self, path: &str) -> Result<()> {
        if path.contains(REFRESH_PATH) {
            return Ok(());
        }

        let Some((current_token, _)) = self.store.load() else {
            return Ok(());
        };

        if token::is_expiring_soon(&current_token) && !self.refreshing.load(Ordering::SeqCst) {
            log::debug!("token expiring soon, refreshing before {path}");
            match self.refresh().await {
                Ok(()) => {}
                Err(err @ Error::Api(ApiError::Unauthorized)) => return Err(err),
                Err(err) => {
                    log::warn!("pre-request refresh failed, proceeding with current token: {err}");
                }
            }
        }

        Ok(())
    }

    async fn send_once<T, B>(&self, method: Method, path: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let url = format!("{}{}", self.base_url, path);
        let mut request = self.http.request(method, &url);

        // Re-read the store so a token rewritten by another process is
        // picked up on the next call.
        if let Some((current_token, _)) = self.store.load() {
            request = request.bearer_auth(current_token);
        }
        if let Some(body) = body {
            request = request.json(body);
        }

        let response = request.send().await.map_err(ApiError::from)?;

        let status = response.status();
        if status.is_success() {
            return response.json::<T>().await.map_err(|e| {
                ApiError::InvalidResponse(format!("Failed to parse response: {e}")).into()
            });
        }

        Err(map_error_status(status, response).await)
    }
}

async fn map_error_status(status: StatusCode, response: reqwest::Response) -> Error {
    match status {
        StatusCode::UNAUTHORIZED => ApiError::Unauthorized.into(),
        StatusCode::FORBIDDEN => ApiError::Forbidden.into(),
        StatusCode::NOT_FOUND => {
            let msg = response
                .text()
                .await
                .unwrap_or_else(|_| "Resource not found".to_string());
            ApiError::NotFound(msg).into()
        }
        StatusCode::BAD_REQUEST | StatusCode::UNPROCESSABLE_ENTITY => {
            let msg = response
                .text()
                .await
                .unwrap_or_else(|_| "Bad request".to_string());
            ApiError::BadRequest(msg).into()
        }
        status if status.is_server_error() => {
            let msg = response
                .text()
                .await
                .unwrap_or_else(|_| format!("Server error: {status}"));
            ApiError::ServerError(msg).into()
        }
        status => ApiError::InvalidResponse(format!("Unexpected status code: {status}")).into(),
    }
}

#[async_trait]
impl SessionControl for SessionCoordinator {
    async fn refresh(&self) -> Result<()> {
        SessionCoordinator::refresh(self).await
    }

    async fn force_logout(&self, reason: Option<&str>) {
        SessionCoordinator::force_logout(self, reason).await;
    }

    fn subscribe(&self) -> watch::Receiver<SessionState> {
        SessionCoordinator::subscribe(self)
    }

    fn touch_activity(&self) {
        SessionCoordinator::touch_activity(self);
    }
}
