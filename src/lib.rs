//! Session-aware client for the WorkHelper platform
//!
//! WorkHelper screens are thin views over a REST backend; this crate
//! owns the one stateful piece between them and the network, the
//! session/token lifecycle:
//!
//! - [`CredentialStore`] persists the access token, the user profile,
//!   and the last-activity stamp across restarts.
//! - [`SessionCoordinator`] wraps every outgoing API call: it refreshes
//!   a near-expiry token before the call goes out, retries a call
//!   exactly once after a 401, and funnels every session-fatal
//!   condition through one forced-logout signal.
//! - [`ActivityMonitor`] keeps an active user's token fresh and signs
//!   out a user idle past the timeout.
//!
//! Screens issue calls through the coordinator's `get`/`post`/`put`/
//! `delete` methods and react to session teardown by watching
//! [`SessionCoordinator::subscribe`].

pub mod error;
pub mod models;
pub mod monitor;
pub mod session;
pub mod store;

pub use error::{ApiError, Error, Result, StoreError};
pub use models::{LoginResponse, PasswordChange, RefreshResponse, RegisterRequest, User};
pub use monitor::ActivityMonitor;
pub use session::{SessionControl, SessionCoordinator, SessionState};
pub use store::CredentialStore;
