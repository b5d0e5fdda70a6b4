use anyhow::{Result, anyhow};
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;
use std::path::PathBuf;

use crate::cli::globals::DEFAULT_KV_MOUNT;

pub const ARG_USERS_FILE: &str = "users-file";
pub const ARG_VAULT_URL: &str = "vault-url";
pub const ARG_VAULT_TOKEN: &str = "vault-token";
pub const ARG_VAULT_KV_MOUNT: &str = "vault-kv-mount";
pub const ARG_STORE_TIMEOUT: &str = "store-timeout-seconds";

/// Where credential records are read from.
#[derive(Debug)]
pub enum Backend {
    UsersFile(PathBuf),
    Vault {
        url: String,
        token: SecretString,
        kv_mount: String,
    },
}

#[derive(Debug)]
pub struct Options {
    pub backend: Backend,
    pub timeout_seconds: u64,
}

impl Options {
    /// # Errors
    /// Returns an error if neither a users file nor a Vault URL is configured.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        let timeout_seconds = matches
            .get_one::<u64>(ARG_STORE_TIMEOUT)
            .copied()
            .unwrap_or(5);

        let backend = if let Some(path) = matches.get_one::<PathBuf>(ARG_USERS_FILE) {
            Backend::UsersFile(path.clone())
        } else if let Some(url) = matches.get_one::<String>(ARG_VAULT_URL) {
            let token = matches
                .get_one::<String>(ARG_VAULT_TOKEN)
                .cloned()
                .ok_or_else(|| anyhow!("missing required argument: --{ARG_VAULT_TOKEN}"))?;
            Backend::Vault {
                url: url.clone(),
                token: SecretString::from(token),
                kv_mount: matches
                    .get_one::<String>(ARG_VAULT_KV_MOUNT)
                    .cloned()
                    .unwrap_or_else(|| DEFAULT_KV_MOUNT.to_string()),
            }
        } else {
            return Err(anyhow!(
                "missing credential store: --{ARG_USERS_FILE} or --{ARG_VAULT_URL}"
            ));
        };

        Ok(Self {
            backend,
            timeout_seconds,
        })
    }
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_USERS_FILE)
                .long(ARG_USERS_FILE)
                .help("JSON file with a list of credential records, served from memory")
                .env("AUTH_API_USERS_FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .conflicts_with(ARG_VAULT_URL),
        )
        .arg(
            Arg::new(ARG_VAULT_URL)
                .long(ARG_VAULT_URL)
                .help("Vault base URL (http(s)://host:port) holding credential records in KV v2")
                .env("AUTH_API_VAULT_URL"),
        )
        .arg(
            Arg::new(ARG_VAULT_TOKEN)
                .long(ARG_VAULT_TOKEN)
                .help("Vault token with read access to the KV mount")
                .env("VAULT_TOKEN")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_VAULT_KV_MOUNT)
                .long(ARG_VAULT_KV_MOUNT)
                .help("Vault KV v2 mount path")
                .env("AUTH_API_VAULT_KV_MOUNT")
                .default_value(DEFAULT_KV_MOUNT),
        )
        .arg(
            Arg::new(ARG_STORE_TIMEOUT)
                .long(ARG_STORE_TIMEOUT)
                .help("Timeout for credential lookups in seconds")
                .env("AUTH_API_STORE_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..=60)),
        )
}
