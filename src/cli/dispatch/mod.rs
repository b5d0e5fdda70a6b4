//! Map validated CLI arguments to the action the binary runs.

use crate::cli::actions::{Action, hash, server};
use crate::cli::commands::{self, auth, store};
use crate::cli::globals::DEFAULT_KV_MOUNT;
use anyhow::{Context, Result};
use secrecy::SecretString;

/// # Errors
/// Returns an error if required arguments are missing or inconsistent.
pub fn handler(matches: &clap::ArgMatches) -> Result<Action> {
    if let Some(sub) = matches.subcommand_matches("hash-user") {
        return hash_user(sub);
    }

    let port = matches
        .get_one::<u16>(commands::ARG_PORT)
        .copied()
        .unwrap_or(8080);
    let cors_origin = matches.get_one::<String>(commands::ARG_CORS_ORIGIN).cloned();

    Ok(Action::Server(server::Args {
        port,
        cors_origin,
        auth: auth::Options::parse(matches)?,
        store: store::Options::parse(matches)?,
    }))
}

fn hash_user(matches: &clap::ArgMatches) -> Result<Action> {
    let username = matches
        .get_one::<String>(auth::ARG_HASH_USERNAME)
        .cloned()
        .context("missing required argument: --username")?;
    let password = matches
        .get_one::<String>(auth::ARG_HASH_PASSWORD)
        .cloned()
        .context("missing required argument: --password")?;
    let cost = matches
        .get_one::<u32>(auth::ARG_HASH_COST)
        .copied()
        .unwrap_or(crate::auth::password::DEFAULT_COST);

    let kv_mount = matches
        .get_one::<String>(store::ARG_VAULT_KV_MOUNT)
        .cloned()
        .unwrap_or_else(|| DEFAULT_KV_MOUNT.to_string());

    Ok(Action::HashUser(hash::Args {
        username,
        password: SecretString::from(password),
        cost,
        kv_mount,
    }))
}
