//! The login pipeline: config, challenge, lookup, password, token.

use super::{
    challenge::ChallengeVerifier,
    config::AuthConfig,
    password::PasswordVerifier,
    store::CredentialStore,
    token::TokenIssuer,
};
use std::sync::Arc;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};

pub const USERNAME_MIN_CHARS: usize = 3;
pub const USERNAME_MAX_CHARS: usize = 50;
pub const PASSWORD_MIN_CHARS: usize = 6;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("username must be between 3 and 50 characters")]
    Username,
    #[error("password must be at least 6 characters")]
    Password,
}

/// A username/password pair that passed shape checks.
#[derive(Clone, PartialEq, Eq)]
pub struct LoginRequest {
    username: String,
    password: String,
}

impl std::fmt::Debug for LoginRequest {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginRequest")
            .field("username", &self.username)
            .field("password", &"[REDACTED]")
            .finish()
    }
}

impl LoginRequest {
    /// # Errors
    /// Returns an error if the username is not 3..=50 characters or the
    /// password is shorter than 6 characters.
    pub fn new(
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<Self, ValidationError> {
        let username = username.into();
        let password = password.into();

        let username_chars = username.chars().count();
        if !(USERNAME_MIN_CHARS..=USERNAME_MAX_CHARS).contains(&username_chars) {
            return Err(ValidationError::Username);
        }
        if password.chars().count() < PASSWORD_MIN_CHARS {
            return Err(ValidationError::Password);
        }

        Ok(Self { username, password })
    }

    #[must_use]
    pub fn username(&self) -> &str {
        &self.username
    }

    #[must_use]
    pub fn password(&self) -> &str {
        &self.password
    }
}

#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum LoginError {
    #[error("Missing required secrets")]
    Config,
    #[error("Invalid Turnstile token")]
    ChallengeRejected,
    #[error("Invalid credentials")]
    InvalidCredentials,
    #[error("Internal server error")]
    Internal,
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LoginSuccess {
    pub access_token: String,
    pub user_id: String,
    pub username: String,
    pub expires_in: i64,
}

/// Runs one login at a time per call; shared across requests behind an `Arc`.
pub struct LoginOrchestrator {
    config: AuthConfig,
    challenge: Arc<dyn ChallengeVerifier>,
    store: Arc<dyn CredentialStore>,
    passwords: Arc<dyn PasswordVerifier>,
    tokens: TokenIssuer,
}

impl LoginOrchestrator {
    #[must_use]
    pub fn new(
        config: AuthConfig,
        challenge: Arc<dyn ChallengeVerifier>,
        store: Arc<dyn CredentialStore>,
        passwords: Arc<dyn PasswordVerifier>,
        tokens: TokenIssuer,
    ) -> Self {
        Self {
            config,
            challenge,
            store,
            passwords,
            tokens,
        }
    }

    #[must_use]
    pub fn config(&self) -> &AuthConfig {
        &self.config
    }

    #[must_use]
    pub fn tokens(&self) -> &TokenIssuer {
        &self.tokens
    }

    // Key derivation is CPU bound; keep it off the async workers.
    async fn verify_password(&self, password: &str, stored_hash: &str) -> bool {
        let passwords = Arc::clone(&self.passwords);
        let password = password.to_string();
        let stored_hash = stored_hash.to_string();

        tokio::task::spawn_blocking(move || passwords.verify(&password, &stored_hash))
            .await
            .unwrap_or_else(|err| {
                error!("password check did not complete: {err}");
                false
            })
    }

    /// Authenticate `username` and issue an access token.
    ///
    /// Each step runs only if every earlier step succeeded. An unknown user and
    /// a wrong password both yield [`LoginError::InvalidCredentials`].
    ///
    /// # Errors
    /// Returns the first failing step as a [`LoginError`].
    #[instrument(skip(self, password, challenge_token))]
    pub async fn login(
        &self,
        username: &str,
        password: &str,
        challenge_token: &str,
    ) -> Result<LoginSuccess, LoginError> {
        let (Some(challenge_secret), Some(signing_secret)) =
            (self.config.challenge_secret(), self.config.signing_secret())
        else {
            error!("missing secrets: {}", self.config.missing().join(", "));
            return Err(LoginError::Config);
        };

        if challenge_token.is_empty() {
            debug!("challenge token missing");
            return Err(LoginError::ChallengeRejected);
        }
        if !self.challenge.verify(challenge_token, challenge_secret).await {
            debug!("challenge rejected");
            return Err(LoginError::ChallengeRejected);
        }

        let Some(record) = self.store.get(username).await else {
            debug!("unknown user");
            return Err(LoginError::InvalidCredentials);
        };

        if !self.verify_password(password, &record.password_hash).await {
            debug!("password mismatch");
            return Err(LoginError::InvalidCredentials);
        }

        let token = self
            .tokens
            .issue(&record.id, &record.username, signing_secret)
            .map_err(|err| {
                warn!("failed to issue token: {err}");
                LoginError::Internal
            })?;

        info!(user_id = %record.id, "login succeeded");

        Ok(LoginSuccess {
            expires_in: token.expires_in(),
            access_token: token.into_string(),
            user_id: record.id,
            username: record.username,
        })
    }
}
