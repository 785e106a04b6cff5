//! Session coordination: token lifecycle, request interception, and the
//! single logout funnel every screen reacts to.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::Result;
use crate::models::User;

pub mod coordinator;
pub mod token;

pub use coordinator::{SESSION_EXPIRED_NOTICE, SessionCoordinator};
pub use token::{EXPIRY_BUFFER_SECS, decode_expiry, is_expiring_soon};

/// Session lifecycle signal published to the rest of the application.
///
/// Consumers watch this through [`SessionControl::subscribe`]; every way
/// a session can end (explicit logout, failed refresh, inactivity)
/// converges on a single `SignedOut` transition.
#[derive(Debug, Clone, PartialEq)]
pub enum SessionState {
    /// A user is authenticated.
    SignedIn { user: User },

    /// No session. `notice` carries the reason for a system-initiated
    /// logout; login screens show it as a transient informational
    /// message, distinct from a credential-validation error.
    SignedOut { notice: Option<String> },
}

impl SessionState {
    pub fn is_signed_in(&self) -> bool {
        matches!(self, SessionState::SignedIn { .. })
    }
}

/// Session operations driven from outside the request path.
///
/// The activity monitor runs against this seam so its timer behavior
/// can be tested with a scripted session instead of a live backend.
#[async_trait]
pub trait SessionControl: Send + Sync {
    /// Silently exchange the current token for a fresh one.
    async fn refresh(&self) -> Result<()>;

    /// System-initiated session teardown with an optional user-visible
    /// reason.
    async fn force_logout(&self, reason: Option<&str>);

    /// Watch session lifecycle transitions.
    fn subscribe(&self) -> watch::Receiver<SessionState>;

    /// Persist an activity stamp for the current session.
    fn touch_activity(&self);
}
