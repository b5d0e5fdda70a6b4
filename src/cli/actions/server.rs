use crate::{
    api,
    auth::{
        AuthConfig, KeyValueStore, KvCredentialStore, LoginOrchestrator, MemoryStore,
        PasswordHasher, TokenIssuer, TurnstileVerifier,
    },
    cli::{
        commands::{auth, store},
        globals::GlobalArgs,
    },
    vault::kv::VaultKv,
};
use anyhow::{Context, Result};
use std::{sync::Arc, time::Duration};
use tracing::{debug, info, warn};

#[derive(Debug)]
pub struct Args {
    pub port: u16,
    pub cors_origin: Option<String>,
    pub auth: auth::Options,
    pub store: store::Options,
}

/// Execute the server action.
/// # Errors
/// Returns an error if the credential store cannot be opened or the server fails to start.
pub async fn execute(args: Args) -> Result<()> {
    log_startup_args(&args);

    let orchestrator = build_orchestrator(args.auth, args.store).await?;

    api::new(args.port, Arc::new(orchestrator), args.cors_origin).await
}

/// Wire the login pipeline from parsed options.
///
/// # Errors
/// Returns an error if the users file cannot be loaded or an HTTP client cannot be built.
pub async fn build_orchestrator(
    auth: auth::Options,
    store: store::Options,
) -> Result<LoginOrchestrator> {
    let config = AuthConfig::new(auth.turnstile_secret, auth.jwt_secret);
    let missing = config.missing();
    if !missing.is_empty() {
        warn!(
            "missing secrets: {}; every login will fail until they are set",
            missing.join(", ")
        );
    }

    let challenge = TurnstileVerifier::new(
        auth.turnstile_url,
        Duration::from_secs(auth.challenge_timeout_seconds),
    )
    .context("failed to build siteverify client")?;

    let timeout = Duration::from_secs(store.timeout_seconds);
    let kv: Arc<dyn KeyValueStore> = match store.backend {
        store::Backend::UsersFile(path) => {
            let memory = MemoryStore::from_users_file(&path)
                .await
                .with_context(|| format!("failed to load users file: {}", path.display()))?;
            info!("loaded {} credential records from {}", memory.len().await, path.display());
            Arc::new(memory)
        }
        store::Backend::Vault {
            url,
            token,
            kv_mount,
        } => {
            let mut globals = GlobalArgs::new(url);
            globals.set_token(token);
            globals.set_kv_mount(kv_mount);
            debug!("Global args: {:?}", globals);
            Arc::new(VaultKv::new(&globals, timeout).context("failed to build Vault client")?)
        }
    };

    Ok(LoginOrchestrator::new(
        config,
        Arc::new(challenge),
        Arc::new(KvCredentialStore::new(kv, timeout)),
        Arc::new(PasswordHasher::default()),
        TokenIssuer::new().with_ttl_seconds(auth.token_ttl_seconds),
    ))
}

fn log_startup_args(args: &Args) {
    let backend = match &args.store.backend {
        store::Backend::UsersFile(path) => format!("users-file:{}", path.display()),
        store::Backend::Vault { url, kv_mount, .. } => format!("vault:{url}/{kv_mount}"),
    };
    info!(
        port = args.port,
        cors_origin = args.cors_origin.as_deref().unwrap_or("*"),
        turnstile_url = %args.auth.turnstile_url,
        token_ttl_seconds = args.auth.token_ttl_seconds,
        store = %backend,
        "starting auth-api"
    );
}
