//! # Quillkeep (Blog Admission & Session Authority)
//!
//! `quillkeep` is the administration backend of a small blog. Beyond plain
//! CRUD it owns two state machines:
//!
//! ## Sign-up Admission
//!
//! Anonymous visitors request membership with an email and a name. The blog
//! owner accepts or rejects each request while it is still valid (24 hours),
//! and an accepted request is consumed exactly once by the account-creation
//! call. Requests are never deleted; a daily sweep moves stale ones to
//! `expired`.
//!
//! ## Session Authority
//!
//! Login verifies the password against the external identity provider and
//! issues a short-lived access token plus a rotating refresh token. Only the
//! most recently issued refresh token per user is accepted (its digest lives in
//! `refresh_sessions`); logout deletes it.
//!
//! Authentication failures never reveal *why* a token was rejected: expired,
//! revoked and forged tokens all produce the same `401`.

pub mod api;
pub mod cli;

#[cfg(test)]
pub(crate) mod test_support;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
