//! HS256 access tokens.
//!
//! Tokens are `base64url(header).base64url(claims).base64url(hmac)` with no padding
//! and compact JSON segments, so any standard JWT library can verify them.

use base64ct::{Base64UrlUnpadded, Encoding};
use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use thiserror::Error;

pub const TOKEN_TTL_SECONDS: i64 = 3600;
pub const TOKEN_ISSUER: &str = "auth-api";
pub const TOKEN_ALG: &str = "HS256";

type HmacSha256 = Hmac<Sha256>;

#[derive(Debug, Error)]
pub enum TokenError {
    #[error("invalid token format")]
    Format,
    #[error("invalid base64url encoding")]
    Base64,
    #[error("invalid json")]
    Json(#[from] serde_json::Error),
    #[error("invalid signing key")]
    Key,
    #[error("unsupported algorithm: {0}")]
    UnsupportedAlg(String),
    #[error("invalid signature")]
    InvalidSignature,
    #[error("invalid issuer")]
    InvalidIssuer,
    #[error("token expired")]
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct TokenHeader {
    pub alg: String,
    pub typ: String,
}

impl TokenHeader {
    fn hs256() -> Self {
        Self {
            alg: TOKEN_ALG.to_string(),
            typ: "JWT".to_string(),
        }
    }
}

/// Field order is the serialized order.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Claims {
    pub sub: String,
    pub username: String,
    pub iat: i64,
    pub exp: i64,
    pub iss: String,
}

#[derive(Debug, Clone)]
pub struct AccessToken {
    token: String,
    claims: Claims,
}

impl AccessToken {
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.token
    }

    #[must_use]
    pub fn into_string(self) -> String {
        self.token
    }

    #[must_use]
    pub fn claims(&self) -> &Claims {
        &self.claims
    }

    #[must_use]
    pub fn expires_in(&self) -> i64 {
        self.claims.exp - self.claims.iat
    }
}

#[derive(Clone, Debug)]
pub struct TokenIssuer {
    ttl_seconds: i64,
    issuer: String,
}

impl Default for TokenIssuer {
    fn default() -> Self {
        Self {
            ttl_seconds: TOKEN_TTL_SECONDS,
            issuer: TOKEN_ISSUER.to_string(),
        }
    }
}

impl TokenIssuer {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_ttl_seconds(mut self, seconds: i64) -> Self {
        self.ttl_seconds = seconds;
        self
    }

    #[must_use]
    pub fn ttl_seconds(&self) -> i64 {
        self.ttl_seconds
    }

    #[must_use]
    pub fn issuer(&self) -> &str {
        &self.issuer
    }

    /// Issue a token valid from now.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded or the key is rejected.
    pub fn issue(
        &self,
        user_id: &str,
        username: &str,
        secret: &str,
    ) -> Result<AccessToken, TokenError> {
        self.issue_at(user_id, username, secret, Utc::now().timestamp())
    }

    /// Issue a token with a fixed issued-at time.
    ///
    /// # Errors
    /// Returns an error if the claims cannot be encoded or the key is rejected.
    pub fn issue_at(
        &self,
        user_id: &str,
        username: &str,
        secret: &str,
        now: i64,
    ) -> Result<AccessToken, TokenError> {
        let claims = Claims {
            sub: user_id.to_string(),
            username: username.to_string(),
            iat: now,
            exp: now.saturating_add(self.ttl_seconds),
            iss: self.issuer.clone(),
        };

        let signing_input = format!(
            "{}.{}",
            b64e_json(&TokenHeader::hs256())?,
            b64e_json(&claims)?
        );
        let signature = mac(secret, &signing_input)?.finalize().into_bytes();
        let token = format!(
            "{signing_input}.{}",
            Base64UrlUnpadded::encode_string(&signature)
        );

        Ok(AccessToken { token, claims })
    }

    /// Verify a token issued by this issuer and return its claims.
    ///
    /// # Errors
    /// Returns an error if the token is malformed, signed with another key or
    /// algorithm, carries a foreign issuer, or is expired at `now`.
    pub fn verify(&self, token: &str, secret: &str, now: i64) -> Result<Claims, TokenError> {
        let mut parts = token.split('.');
        let header_b64 = parts.next().ok_or(TokenError::Format)?;
        let claims_b64 = parts.next().ok_or(TokenError::Format)?;
        let sig_b64 = parts.next().ok_or(TokenError::Format)?;
        if parts.next().is_some() {
            return Err(TokenError::Format);
        }

        let header: TokenHeader = b64d_json(header_b64)?;
        if header.alg != TOKEN_ALG {
            return Err(TokenError::UnsupportedAlg(header.alg));
        }

        let signature = Base64UrlUnpadded::decode_vec(sig_b64).map_err(|_| TokenError::Base64)?;
        mac(secret, &format!("{header_b64}.{claims_b64}"))?
            .verify_slice(&signature)
            .map_err(|_| TokenError::InvalidSignature)?;

        let claims: Claims = b64d_json(claims_b64)?;
        if claims.iss != self.issuer {
            return Err(TokenError::InvalidIssuer);
        }
        if claims.exp <= now {
            return Err(TokenError::Expired);
        }

        Ok(claims)
    }
}

fn mac(secret: &str, signing_input: &str) -> Result<HmacSha256, TokenError> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes()).map_err(|_| TokenError::Key)?;
    mac.update(signing_input.as_bytes());
    Ok(mac)
}

fn b64e_json<T: Serialize>(value: &T) -> Result<String, TokenError> {
    let json = serde_json::to_vec(value)?;
    Ok(Base64UrlUnpadded::encode_string(&json))
}

fn b64d_json<T: for<'de> Deserialize<'de>>(s: &str) -> Result<T, TokenError> {
    let bytes = Base64UrlUnpadded::decode_vec(s).map_err(|_| TokenError::Base64)?;
    Ok(serde_json::from_slice(&bytes)?)
}
