//! Bearer token inspection
//!
//! The access token is an opaque credential to everything except the
//! expiry check: its payload segment is decodable and carries an `exp`
//! claim. Signature verification is the backend's job, not ours.

use base64::{Engine as _, engine::general_purpose::URL_SAFE_NO_PAD};
use chrono::{DateTime, Utc};
use serde::Deserialize;

/// Remaining validity (seconds) below which a token counts as expiring
pub const EXPIRY_BUFFER_SECS: i64 = 300;

#[derive(Deserialize)]
struct Claims {
    exp: i64,
}

/// Decode the expiry timestamp out of a bearer token.
///
/// Token format: `header.payload.signature`, each segment base64url
/// without padding. Returns `None` for anything that does not decode.
pub fn decode_expiry(token: &str) -> Option<DateTime<Utc>> {
    let parts: Vec<&str> = token.split('.').collect();
    if parts.len() != 3 {
        return None;
    }

    let payload = URL_SAFE_NO_PAD.decode(parts[1]).ok()?;
    let claims: Claims = serde_json::from_slice(&payload).ok()?;

    DateTime::from_timestamp(claims.exp, 0)
}

/// True when the token expires within [`EXPIRY_BUFFER_SECS`] or cannot
/// be decoded at all.
///
/// Conservative on purpose: an undecodable token is treated as expiring
/// rather than invalid, so the refresh endpoint gets the final say on
/// whether the credential is still usable.
pub fn is_expiring_soon(token: &str) -> bool {
    match decode_expiry(token) {
        Some(expires_at) => {
            let remaining = expires_at - Utc::now();
            remaining.num_seconds() < EXPIRY_BUFFER_SECS
        }
        None => true,
    }
}
