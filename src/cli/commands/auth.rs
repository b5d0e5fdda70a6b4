use anyhow::Result;
use clap::{Arg, ArgMatches, Command};
use secrecy::SecretString;

use crate::auth::{challenge::DEFAULT_SITEVERIFY_URL, password::MAX_COST, token::TOKEN_TTL_SECONDS};
use crate::cli::{commands::store::ARG_VAULT_KV_MOUNT, globals::DEFAULT_KV_MOUNT};

pub const ARG_TURNSTILE_SECRET: &str = "turnstile-secret";
pub const ARG_JWT_SECRET: &str = "jwt-secret";
pub const ARG_TURNSTILE_URL: &str = "turnstile-url";
pub const ARG_CHALLENGE_TIMEOUT: &str = "challenge-timeout-seconds";
pub const ARG_TOKEN_TTL: &str = "token-ttl-seconds";

#[derive(Debug)]
pub struct Options {
    pub turnstile_secret: Option<SecretString>,
    pub jwt_secret: Option<SecretString>,
    pub turnstile_url: String,
    pub challenge_timeout_seconds: u64,
    pub token_ttl_seconds: i64,
}

impl Options {
    /// # Errors
    /// Returns an error if an argument with a default is somehow absent.
    pub fn parse(matches: &ArgMatches) -> Result<Self> {
        Ok(Self {
            turnstile_secret: secret(matches, ARG_TURNSTILE_SECRET),
            jwt_secret: secret(matches, ARG_JWT_SECRET),
            turnstile_url: matches
                .get_one::<String>(ARG_TURNSTILE_URL)
                .cloned()
                .unwrap_or_else(|| DEFAULT_SITEVERIFY_URL.to_string()),
            challenge_timeout_seconds: matches
                .get_one::<u64>(ARG_CHALLENGE_TIMEOUT)
                .copied()
                .unwrap_or(5),
            token_ttl_seconds: matches
                .get_one::<i64>(ARG_TOKEN_TTL)
                .copied()
                .unwrap_or(TOKEN_TTL_SECONDS),
        })
    }
}

fn secret(matches: &ArgMatches, id: &str) -> Option<SecretString> {
    matches
        .get_one::<String>(id)
        .map(|value| SecretString::from(value.clone()))
}

pub fn with_args(command: Command) -> Command {
    command
        .arg(
            Arg::new(ARG_TURNSTILE_SECRET)
                .long(ARG_TURNSTILE_SECRET)
                .help("Turnstile secret key used for siteverify")
                .env("AUTH_API_TURNSTILE_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_JWT_SECRET)
                .long(ARG_JWT_SECRET)
                .help("HMAC secret used to sign access tokens")
                .env("AUTH_API_JWT_SECRET")
                .hide_env_values(true),
        )
        .arg(
            Arg::new(ARG_TURNSTILE_URL)
                .long(ARG_TURNSTILE_URL)
                .help("Turnstile siteverify endpoint")
                .env("AUTH_API_TURNSTILE_URL")
                .default_value(DEFAULT_SITEVERIFY_URL),
        )
        .arg(
            Arg::new(ARG_CHALLENGE_TIMEOUT)
                .long(ARG_CHALLENGE_TIMEOUT)
                .help("Timeout for the siteverify call in seconds")
                .env("AUTH_API_CHALLENGE_TIMEOUT_SECONDS")
                .default_value("5")
                .value_parser(clap::value_parser!(u64).range(1..=60)),
        )
        .arg(
            Arg::new(ARG_TOKEN_TTL)
                .long(ARG_TOKEN_TTL)
                .help("Access token lifetime in seconds")
                .env("AUTH_API_TOKEN_TTL_SECONDS")
                .default_value("3600")
                .value_parser(clap::value_parser!(i64).range(60..=86_400)),
        )
}

pub const ARG_HASH_USERNAME: &str = "username";
pub const ARG_HASH_PASSWORD: &str = "password";
pub const ARG_HASH_COST: &str = "cost";

/// `hash-user`: build a credential record for provisioning.
#[must_use]
pub fn hash_user_command() -> Command {
    Command::new("hash-user")
        .about("Hash a password and print the credential record and its store key")
        .arg(
            Arg::new(ARG_HASH_USERNAME)
                .long(ARG_HASH_USERNAME)
                .short('u')
                .help("Login name")
                .required(true),
        )
        .arg(
            Arg::new(ARG_HASH_PASSWORD)
                .long(ARG_HASH_PASSWORD)
                .help("Plaintext password")
                .env("AUTH_API_HASH_PASSWORD")
                .hide_env_values(true)
                .required(true),
        )
        .arg(
            Arg::new(ARG_HASH_COST)
                .long(ARG_HASH_COST)
                .help("Cost factor, thousands of PBKDF2 iterations")
                .default_value("3")
                .value_parser(clap::value_parser!(u32).range(1..=i64::from(MAX_COST))),
        )
        .arg(
            Arg::new(ARG_VAULT_KV_MOUNT)
                .long(ARG_VAULT_KV_MOUNT)
                .help("KV v2 mount used in the printed vault command")
                .env("AUTH_API_VAULT_KV_MOUNT")
                .default_value(DEFAULT_KV_MOUNT),
        )
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    fn command() -> Command {
        with_args(Command::new("test")).subcommand(hash_user_command())
    }

    #[test]
    fn defaults_without_secrets() -> Result<()> {
        temp_env::with_vars(
            [
                ("AUTH_API_TURNSTILE_SECRET", None::<&str>),
                ("AUTH_API_JWT_SECRET", None),
                ("AUTH_API_TOKEN_TTL_SECONDS", None),
            ],
            || {
                let matches = command().get_matches_from(vec!["test"]);
                let options = Options::parse(&matches)?;
                assert!(options.turnstile_secret.is_none());
                assert!(options.jwt_secret.is_none());
                assert_eq!(options.turnstile_url, DEFAULT_SITEVERIFY_URL);
                assert_eq!(options.challenge_timeout_seconds, 5);
                assert_eq!(options.token_ttl_seconds, 3600);
                Ok(())
            },
        )
    }

    #[test]
    fn secrets_from_env() -> Result<()> {
        temp_env::with_vars(
            [
                ("AUTH_API_TURNSTILE_SECRET", Some("ts-secret")),
                ("AUTH_API_JWT_SECRET", Some("jwt-secret")),
                ("AUTH_API_TOKEN_TTL_SECONDS", Some("900")),
            ],
            || {
                let matches = command().get_matches_from(vec!["test"]);
                let options = Options::parse(&matches)?;
                assert_eq!(
                    options.turnstile_secret.as_ref().map(|s| s.expose_secret()),
                    Some("ts-secret")
                );
                assert_eq!(
                    options.jwt_secret.as_ref().map(|s| s.expose_secret()),
                    Some("jwt-secret")
                );
                assert_eq!(options.token_ttl_seconds, 900);
                Ok(())
            },
        )
    }

    #[test]
    fn token_ttl_out_of_range_is_rejected() {
        let result = command().try_get_matches_from(vec!["test", "--token-ttl-seconds", "5"]);
        assert!(result.is_err());
    }

    #[test]
    fn hash_user_requires_username() {
        temp_env::with_vars([("AUTH_API_HASH_PASSWORD", None::<&str>)], || {
            let result =
                command().try_get_matches_from(vec!["test", "hash-user", "--password", "secret1"]);
            assert!(result.is_err());
        });
    }

    #[test]
    fn hash_user_parses_cost() {
        let matches = command().get_matches_from(vec![
            "test",
            "hash-user",
            "--username",
            "alice",
            "--password",
            "password123",
            "--cost",
            "5",
        ]);
        let sub = matches.subcommand_matches("hash-user");
        assert_eq!(
            sub.and_then(|m| m.get_one::<u32>(ARG_HASH_COST)).copied(),
            Some(5)
        );
    }
}
