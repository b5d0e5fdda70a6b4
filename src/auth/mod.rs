//! Authentication core.
//!
//! [`LoginOrchestrator`] owns the pipeline; the other modules are its
//! collaborators and are injected through its constructor.

pub mod challenge;
pub mod config;
pub mod login;
pub mod password;
pub mod store;
pub mod token;

pub use challenge::{ChallengeVerifier, TurnstileVerifier};
pub use config::AuthConfig;
pub use login::{LoginError, LoginOrchestrator, LoginRequest, LoginSuccess, ValidationError};
pub use password::{PasswordHasher, PasswordVerifier};
pub use store::{CredentialRecord, CredentialStore, KeyValueStore, KvCredentialStore, MemoryStore};
pub use token::{AccessToken, Claims, TokenIssuer};
