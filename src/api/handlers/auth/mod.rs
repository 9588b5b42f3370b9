//! Authentication: credential verification, token authority and the gate.
//!
//! ## Tokens
//!
//! - **Access token:** HS256 JWT, 3 hours, verified statelessly on every
//!   guarded call (`Authorization: Bearer`).
//! - **Refresh token:** HS256 JWT, 7 days, delivered in the `quillkeep_refresh`
//!   cookie. Valid only while its SHA-256 matches the user's row in
//!   `refresh_sessions`; every login or refresh overwrites that row.
//!
//! Logout deletes the row, so an unexpired refresh token stops working
//! immediately.

pub(crate) mod identity;
pub(crate) mod principal;
pub(crate) mod session;
pub(crate) mod session_store;
mod state;
pub(crate) mod token;
pub(crate) mod types;
pub(crate) mod utils;

pub use identity::{CredentialVerifier, GoTrueProvider, IdentityError, IdentityProvider};
pub use principal::{require_auth, Principal};
pub use session_store::{PgSessionStore, SessionStore};
pub use state::AuthConfig;
pub use token::TokenAuthority;
