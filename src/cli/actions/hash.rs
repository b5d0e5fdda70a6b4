use crate::auth::{CredentialRecord, LoginRequest, PasswordHasher, store::user_key};
use anyhow::{Context, Result};
use chrono::Utc;
use secrecy::{ExposeSecret, SecretString};
use uuid::Uuid;

#[derive(Debug)]
pub struct Args {
    pub username: String,
    pub password: SecretString,
    pub cost: u32,
    pub kv_mount: String,
}

/// Build the store key and a fresh credential record for `args`.
///
/// # Errors
/// Returns an error if the username or password would never pass login
/// validation, or the cost is out of range.
pub fn credential_record(args: &Args) -> Result<(String, CredentialRecord)> {
    let request = LoginRequest::new(args.username.clone(), args.password.expose_secret())
        .context("credentials would be rejected at login")?;
    let hasher = PasswordHasher::new(args.cost)?;

    let record = CredentialRecord {
        id: Uuid::new_v4().to_string(),
        username: request.username().to_string(),
        password_hash: hasher.hash(request.password())?,
        created_at: Some(Utc::now()),
        last_login: None,
    };

    Ok((user_key(&record.username), record))
}

/// Print the key and JSON record for provisioning.
/// # Errors
/// Returns an error if the record cannot be built or serialized.
pub fn execute(args: &Args) -> Result<()> {
    let (key, record) = credential_record(args)?;
    let json = serde_json::to_string(&record)?;

    println!("key: {key}");
    println!("record: {json}");
    println!("vault: {}", vault_put_command(&args.kv_mount, &key, &json));

    Ok(())
}

/// `vault kv put` invocation that stores `json` under `key` as the `value` field.
#[must_use]
pub fn vault_put_command(kv_mount: &str, key: &str, json: &str) -> String {
    format!(
        "vault kv put {} {}",
        shell_quote(&format!("{kv_mount}/{key}")),
        shell_quote(&format!("value={json}"))
    )
}

// POSIX single quoting; an embedded `'` becomes `'\''`.
fn shell_quote(value: &str) -> String {
    format!("'{}'", value.replace('\'', "'\\''"))
}
