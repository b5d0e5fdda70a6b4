//! # auth-api (Challenge-gated password login)
//!
//! `auth-api` authenticates a username/password pair behind a bot-protection
//! challenge and answers with a short-lived HS256 access token.
//!
//! ## Login pipeline
//!
//! Every login runs the same ordered steps and stops at the first failure:
//!
//! 1. Both configured secrets (challenge and signing) must be present.
//! 2. The challenge token is checked against the siteverify endpoint.
//! 3. The credential record is read from the key-value store (`user:<username>`).
//! 4. The password is checked against the stored `$argon2id$...` formatted digest.
//! 5. A signed access token is issued.
//!
//! Unknown usernames and wrong passwords produce the same `401 Invalid credentials`
//! response so callers cannot probe which accounts exist.
//!
//! ## Fail closed
//!
//! The challenge verifier and the password hasher never surface transport or
//! parsing faults to the caller; any doubt is a rejection. Store outages look like
//! unknown users.

pub mod api;
pub mod auth;
pub mod cli;
pub mod vault;

#[allow(clippy::doc_markdown, clippy::needless_raw_string_hashes)]
pub mod built_info {
    include!(concat!(env!("OUT_DIR"), "/built.rs"));
}

pub const GIT_COMMIT_HASH: &str = match built_info::GIT_COMMIT_HASH {
    Some(hash) => hash,
    None => "unknown",
};

pub const APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"),);
