use crate::{
    auth::store::{KeyValueStore, StoreError},
    cli::globals::GlobalArgs,
    vault,
};
use async_trait::async_trait;
use reqwest::{Client, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde_json::Value;
use std::time::Duration;
use tracing::{Instrument, info_span};
use url::Url;

/// Field holding the raw JSON record when a secret stores it as one string.
pub const VALUE_FIELD: &str = "value";

/// Read-only key-value backend over Vault KV v2.
///
/// `user:alice` is read from `/v1/<mount>/data/user:alice`. The secret either
/// holds the record as a JSON string under `value`, or holds the record
/// fields directly.
#[derive(Clone, Debug)]
pub struct VaultKv {
    client: Client,
    vault_url: String,
    vault_token: SecretString,
    kv_mount: String,
}

impl VaultKv {
    /// # Errors
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(globals: &GlobalArgs, timeout: Duration) -> Result<Self, StoreError> {
        let client = Client::builder()
            .user_agent(crate::APP_USER_AGENT)
            .timeout(timeout)
            .build()
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        Ok(Self {
            client,
            vault_url: globals.vault_url.clone(),
            vault_token: globals.vault_token.clone(),
            kv_mount: globals.vault_kv_mount.clone(),
        })
    }
}

// The key is always a single path segment; `/`, `?` and `#` are percent-encoded.
fn secret_url(base: &str, key: &str) -> Result<Url, StoreError> {
    let mut url = Url::parse(base).map_err(|e| StoreError::Backend(e.to_string()))?;
    url.path_segments_mut()
        .map_err(|()| StoreError::Backend(format!("cannot-be-a-base URL: {base}")))?
        .push(key);
    Ok(url)
}

#[async_trait]
impl KeyValueStore for VaultKv {
    async fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let base = vault::endpoint_url(&self.vault_url, &format!("/v1/{}/data", self.kv_mount))
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let url = secret_url(&base, key)?;

        let span = info_span!(
            "vault.kv.read",
            http.method = "GET",
            url = %url
        );
        let response = self
            .client
            .get(url)
            .header("X-Vault-Token", self.vault_token.expose_secret())
            .send()
            .instrument(span)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        if response.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            return Err(StoreError::Status(response.status().as_u16()));
        }

        let json: Value = response
            .json()
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;
        let Some(data) = json.get("data").and_then(|data| data.get("data")) else {
            return Ok(None);
        };

        match data.get(VALUE_FIELD).and_then(Value::as_str) {
            Some(raw) => Ok(Some(raw.to_string())),
            None => Ok(Some(serde_json::to_string(data)?)),
        }
    }
}
