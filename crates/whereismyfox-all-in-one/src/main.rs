mod config;

use anyhow::{Context, Result};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};
use whereismyfox_domain::{
    default_command_catalog, CallerRequest, DeviceAccessService, JwtAuthenticator,
    RegistryStore,
};
use whereismyfox_postgres::{MigrationRunner, PostgresClient, PostgresRegistryStore};

/// Services the registry keeps alive until shutdown
struct Registry {
    device_access: DeviceAccessService,
    authenticator: Arc<JwtAuthenticator>,
}

impl Registry {
    /// Fail startup when the session token settings cannot issue a usable token
    fn check_sessions(&self) -> Result<()> {
        let token = self.authenticator.issue_token(STARTUP_IDENTITY)?;
        let caller = CallerRequest::with_authorization(format!("Bearer {}", token));
        let identity = self.device_access.identify(&caller)?;
        anyhow::ensure!(
            identity == STARTUP_IDENTITY,
            "session token resolved to {}",
            identity
        );
        Ok(())
    }
}

const STARTUP_IDENTITY: &str = "startup@whereismyfox.local";

#[tokio::main]
async fn main() {
    let config = match config::ServiceConfig::from_env() {
        Ok(cfg) => cfg,
        Err(e) => {
            eprintln!("Failed to load configuration: {}", e);
            std::process::exit(1);
        }
    };

    init_tracing(&config.log_level);

    info!("starting whereismyfox");

    if let Err(e) = run(config).await {
        error!(error = %e, "service failed");
        std::process::exit(1);
    }
}

fn init_tracing(log_level: &str) {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(log_level));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(
            tracing_subscriber::fmt::layer()
                .json()
                .with_span_list(true)
                .with_current_span(true),
        )
        .init();
}

async fn run(config: config::ServiceConfig) -> Result<()> {
    let startup_timeout = Duration::from_secs(config.startup_timeout_secs);
    let postgres_config = config.postgres();

    let client = PostgresClient::new(&postgres_config)?;
    tokio::time::timeout(startup_timeout, client.ping())
        .await
        .context("timed out connecting to postgres")??;

    MigrationRunner::from_config(&postgres_config)
        .run_migrations()
        .await?;

    let registry_store: Arc<dyn RegistryStore> = Arc::new(PostgresRegistryStore::new(client));
    let registry = assemble(&config, registry_store).await?;
    registry.check_sessions()?;

    info!("device registry ready");
    shutdown_signal().await;
    info!("received shutdown signal, stopping");
    drop(registry);
    Ok(())
}

/// Seed the command catalog and wire the device operations onto the store
async fn assemble(
    config: &config::ServiceConfig,
    registry_store: Arc<dyn RegistryStore>,
) -> Result<Registry> {
    seed_command_catalog(registry_store.as_ref()).await?;

    let authenticator = Arc::new(JwtAuthenticator::new(config.jwt()));
    let device_access = DeviceAccessService::new(registry_store, authenticator.clone());

    Ok(Registry {
        device_access,
        authenticator,
    })
}

async fn seed_command_catalog(store: &dyn RegistryStore) -> Result<()> {
    for command in default_command_catalog() {
        let command = store.add_command(command).await?;
        info!(command_id = command.id, command_name = %command.name, "command catalog entry ready");
    }
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            error!(error = %e, "failed to listen for ctrl-c");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => error!(error = %e, "failed to listen for SIGTERM"),
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
