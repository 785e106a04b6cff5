//! Wire models for the WorkHelper auth API

use serde::{Deserialize, Serialize};

/// User profile as returned by the backend.
///
/// Denormalized into the session so screens can render the signed-in
/// user without another round trip.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct User {
    /// User ID
    pub id: i64,

    /// Login name
    pub username: String,

    /// Email address
    pub email: String,

    /// Display name (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,

    /// Role name; `"admin"` grants the administrative screens
    pub role: String,

    /// Whether the account is enabled
    #[serde(default = "default_active")]
    pub is_active: bool,
}

fn default_active() -> bool {
    true
}

impl User {
    /// True when the user carries the admin role.
    pub fn is_admin(&self) -> bool {
        self.role == "admin"
    }
}

/// Response body of `POST /api/auth/login`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginResponse {
    /// Bearer access token
    pub access_token: String,

    /// Always `"bearer"`
    pub token_type: String,

    /// Profile of the authenticated user
    pub user: User,
}

/// Response body of `POST /api/auth/refresh`
///
/// Some backend versions return the updated user alongside the new
/// token; when present it replaces the stored profile.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RefreshResponse {
    /// Replacement bearer access token
    pub access_token: String,

    /// Updated user profile (optional)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user: Option<User>,
}

/// Request body of `POST /api/auth/register`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegisterRequest {
    pub username: String,
    pub email: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub full_name: Option<String>,
    pub password: String,
}

/// Request body of `PUT /api/auth/change-password`
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PasswordChange {
    pub current_password: String,
    pub new_password: String,
}
