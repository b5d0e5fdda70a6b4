//! Bot-protection challenge verification (Cloudflare Turnstile siteverify).

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use thiserror::Error;
use tracing::{Instrument, debug, info_span, warn};

pub const DEFAULT_SITEVERIFY_URL: &str =
    "https://challenges.cloudflare.com/turnstile/v0/siteverify";
pub const DEFAULT_CHALLENGE_TIMEOUT: Duration = Duration::from_secs(5);

#[derive(Debug, Error)]
pub enum ChallengeError {
    #[error("challenge token or secret is empty")]
    EmptyInput,
    #[error("siteverify request failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("siteverify returned HTTP {0}")]
    Status(u16),
    #[error("siteverify response is not valid JSON: {0}")]
    Decode(#[source] reqwest::Error),
    #[error("challenge rejected by provider: {}", codes.join(","))]
    Rejected { codes: Vec<String> },
}

/// Checks a caller-supplied challenge token against the provider.
///
/// Implementations never error: any doubt is `false`.
#[async_trait]
pub trait ChallengeVerifier: Send + Sync {
    async fn verify(&self, token: &str, secret: &str) -> bool;
}

#[derive(Debug, Deserialize)]
struct SiteverifyResponse {
    #[serde(default)]
    success: bool,
    #[serde(rename = "error-codes", default)]
    error_codes: Vec<String>,
}

#[derive(Clone, Debug)]
pub struct TurnstileVerifier {
    client: Client,
    endpoint: String,
}

impl TurnstileVerifier {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Result<Self, ChallengeError> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(ChallengeError::Transport)?;
        Ok(Self {
            client,
            endpoint: endpoint.into(),
        })
    }

    #[must_use]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    /// Verify a token and report why it failed.
    ///
    /// # Errors
    /// Returns the reason the token was not accepted.
    pub async fn try_verify(&self, token: &str, secret: &str) -> Result<(), ChallengeError> {
        if token.is_empty() || secret.is_empty() {
            return Err(ChallengeError::EmptyInput);
        }

        let span = info_span!(
            "challenge.siteverify",
            http.method = "POST",
            url = %self.endpoint
        );
        let response = self
            .client
            .post(&self.endpoint)
            .form(&[("secret", secret), ("response", token)])
            .send()
            .instrument(span)
            .await
            .map_err(ChallengeError::Transport)?;

        let status = response.status();
        if !status.is_success() {
            return Err(ChallengeError::Status(status.as_u16()));
        }

        let body: SiteverifyResponse = response.json().await.map_err(ChallengeError::Decode)?;
        if body.success {
            Ok(())
        } else {
            Err(ChallengeError::Rejected {
                codes: body.error_codes,
            })
        }
    }
}

#[async_trait]
impl ChallengeVerifier for TurnstileVerifier {
    async fn verify(&self, token: &str, secret: &str) -> bool {
        match self.try_verify(token, secret).await {
            Ok(()) => true,
            Err(err @ (ChallengeError::EmptyInput | ChallengeError::Rejected { .. })) => {
                debug!("challenge not accepted: {err}");
                false
            }
            Err(err) => {
                warn!("challenge verification failed: {err}");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use anyhow::Result;
    use serde_json::json;
    use wiremock::matchers::{body_string_contains, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const SITEVERIFY_PATH: &str = "/turnstile/v0/siteverify";

    fn verifier_for(server: &MockServer, timeout: Duration) -> Result<TurnstileVerifier> {
        Ok(TurnstileVerifier::new(
            format!("{}{SITEVERIFY_PATH}", server.uri()),
            timeout,
        )?)
    }

    #[tokio::test]
    async fn accepts_successful_verification() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SITEVERIFY_PATH))
            .and(header("content-type", "application/x-www-form-urlencoded"))
            .and(body_string_contains("secret=site-secret"))
            .and(body_string_contains("response=tok-123"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(1)
            .mount(&server)
            .await;

        let verifier = verifier_for(&server, DEFAULT_CHALLENGE_TIMEOUT)?;
        assert!(verifier.verify("tok-123", "site-secret").await);
        Ok(())
    }

    #[tokio::test]
    async fn rejection_carries_error_codes() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path(SITEVERIFY_PATH))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({
                "success": false,
                "error-codes": ["invalid-input-response", "timeout-or-duplicate"]
            })))
            .mount(&server)
            .await;

        let verifier = verifier_for(&server, DEFAULT_CHALLENGE_TIMEOUT)?;
        assert!(!verifier.verify("tok", "secret").await);
        match verifier.try_verify("tok", "secret").await {
            Err(ChallengeError::Rejected { codes }) => {
                assert_eq!(codes, vec!["invalid-input-response", "timeout-or-duplicate"]);
            }
            other => panic!("unexpected outcome: {other:?}"),
        }
        Ok(())
    }

    #[tokio::test]
    async fn missing_success_field_is_rejection() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "hostname": "x" })))
            .mount(&server)
            .await;

        let verifier = verifier_for(&server, DEFAULT_CHALLENGE_TIMEOUT)?;
        assert!(!verifier.verify("tok", "secret").await);
        Ok(())
    }

    #[tokio::test]
    async fn non_json_body_fails_closed() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_string("<html>oops</html>"))
            .mount(&server)
            .await;

        let verifier = verifier_for(&server, DEFAULT_CHALLENGE_TIMEOUT)?;
        assert!(!verifier.verify("tok", "secret").await);
        assert!(matches!(
            verifier.try_verify("tok", "secret").await,
            Err(ChallengeError::Decode(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn server_error_fails_closed() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let verifier = verifier_for(&server, DEFAULT_CHALLENGE_TIMEOUT)?;
        assert!(matches!(
            verifier.try_verify("tok", "secret").await,
            Err(ChallengeError::Status(503))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn slow_provider_times_out() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(
                ResponseTemplate::new(200)
                    .set_body_json(json!({ "success": true }))
                    .set_delay(Duration::from_secs(2)),
            )
            .mount(&server)
            .await;

        let verifier = verifier_for(&server, Duration::from_millis(100))?;
        assert!(matches!(
            verifier.try_verify("tok", "secret").await,
            Err(ChallengeError::Transport(_))
        ));
        Ok(())
    }

    #[tokio::test]
    async fn unreachable_provider_fails_closed() -> Result<()> {
        let verifier = TurnstileVerifier::new(
            "http://127.0.0.1:9/turnstile/v0/siteverify",
            Duration::from_millis(500),
        )?;
        assert!(!verifier.verify("tok", "secret").await);
        Ok(())
    }

    #[tokio::test]
    async fn empty_inputs_skip_the_network() -> Result<()> {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "success": true })))
            .expect(0)
            .mount(&server)
            .await;

        let verifier = verifier_for(&server, DEFAULT_CHALLENGE_TIMEOUT)?;
        assert!(!verifier.verify("", "secret").await);
        assert!(!verifier.verify("tok", "").await);
        assert!(matches!(
            verifier.try_verify("", "secret").await,
            Err(ChallengeError::EmptyInput)
        ));
        Ok(())
    }
}
