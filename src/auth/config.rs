use secrecy::{ExposeSecret, SecretString};

/// Secrets the login pipeline needs on every call.
///
/// Both are optional so a misconfigured deployment still starts and answers
/// `500` instead of refusing to boot.
#[derive(Clone, Debug, Default)]
pub struct AuthConfig {
    challenge_secret: Option<SecretString>,
    signing_secret: Option<SecretString>,
}

impl AuthConfig {
    #[must_use]
    pub fn new(challenge_secret: Option<SecretString>, signing_secret: Option<SecretString>) -> Self {
        Self {
            challenge_secret,
            signing_secret,
        }
    }

    #[must_use]
    pub fn with_challenge_secret(mut self, secret: impl Into<String>) -> Self {
        self.challenge_secret = Some(SecretString::from(secret.into()));
        self
    }

    #[must_use]
    pub fn with_signing_secret(mut self, secret: impl Into<String>) -> Self {
        self.signing_secret = Some(SecretString::from(secret.into()));
        self
    }

    /// The challenge secret, if set and non-empty.
    #[must_use]
    pub fn challenge_secret(&self) -> Option<&str> {
        non_empty(self.challenge_secret.as_ref())
    }

    /// The token signing secret, if set and non-empty.
    #[must_use]
    pub fn signing_secret(&self) -> Option<&str> {
        non_empty(self.signing_secret.as_ref())
    }

    /// Names of the secrets that are missing or empty.
    #[must_use]
    pub fn missing(&self) -> Vec<&'static str> {
        let mut missing = Vec::new();
        if self.challenge_secret().is_none() {
            missing.push("turnstile-secret");
        }
        if self.signing_secret().is_none() {
            missing.push("jwt-secret");
        }
        missing
    }
}

fn non_empty(secret: Option<&SecretString>) -> Option<&str> {
    secret
        .map(|value| value.expose_secret())
        .filter(|value| !value.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_is_missing_both() {
        let config = AuthConfig::default();
        assert_eq!(config.missing(), vec!["turnstile-secret", "jwt-secret"]);
        assert!(config.challenge_secret().is_none());
    }

    #[test]
    fn empty_secret_counts_as_missing() {
        let config = AuthConfig::default()
            .with_challenge_secret("")
            .with_signing_secret("sign");
        assert_eq!(config.missing(), vec!["turnstile-secret"]);
        assert_eq!(config.signing_secret(), Some("sign"));
    }

    #[test]
    fn debug_does_not_leak_secrets() {
        let config = AuthConfig::default()
            .with_challenge_secret("challenge-value")
            .with_signing_secret("signing-value");
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("challenge-value"));
        assert!(!rendered.contains("signing-value"));
    }
}
