//! FunPot authentication server.
//!
//! Verifies launch payloads, keeps user profiles in sync and guards the
//! protected API with session tokens.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Error};
use fp_server::{
    api,
    config::{CliOverrides, ServerConfig},
    logging, metrics,
};
use funpot::{
    AuthManager, UserService,
    db::{Database, InMemoryUserRepository, PgUserRepository, UserRepository},
};
use pico_args::Arguments;
use tracing::{info, warn};

const HELP: &str = "\
Run the FunPot authentication server

USAGE:
  fp_server [OPTIONS]

OPTIONS:
  --bind       IP:PORT     Server socket bind address  [default: env FUNPOT_SERVER_ADDRESS or 127.0.0.1:8080]
  --db-url     URL         Database connection string  [default: env DATABASE_URL]

FLAGS:
  --in-memory              Keep profiles in memory even if DATABASE_URL is set
  -h, --help               Print help information

ENVIRONMENT:
  FUNPOT_AUTH_TELEGRAM_BOT_TOKEN   Bot token used to verify launch payloads
  FUNPOT_AUTH_JWT_SECRET           Session token signing secret
  DATABASE_URL                     PostgreSQL connection string
  (See .env.example for all configuration options)
";

#[tokio::main]
async fn main() -> Result<(), Error> {
    // Load .env file if it exists
    let _ = dotenvy::dotenv();

    let mut pargs = Arguments::from_env();

    // Help has a higher priority and should be handled separately.
    if pargs.contains(["-h", "--help"]) {
        print!("{HELP}");
        std::process::exit(0);
    }

    let overrides = CliOverrides {
        bind: pargs.opt_value_from_str::<_, SocketAddr>("--bind")?,
        database_url: pargs.opt_value_from_str("--db-url")?,
        in_memory: pargs.contains("--in-memory"),
    };

    let config = ServerConfig::from_env(overrides)?;

    logging::init(&config.log_level);
    info!(
        environment = %config.environment,
        "Starting FunPot server at {}", config.bind
    );

    if config.telemetry.metrics_enabled {
        metrics::init_metrics(config.telemetry.metrics_address).map_err(Error::msg)?;
        info!("Metrics exporter listening on {}", config.telemetry.metrics_address);
    }

    let repo: Arc<dyn UserRepository> = match &config.database {
        Some(db_config) => {
            info!("Connecting to database");
            let db = Database::new(db_config)
                .await
                .context("Failed to connect to database")?;
            db.migrate().await.context("Failed to apply migrations")?;
            info!("Database connected successfully");
            Arc::new(PgUserRepository::new(db.pool().clone()))
        }
        None => {
            warn!("DATABASE_URL not set, profiles are kept in memory");
            Arc::new(InMemoryUserRepository::new())
        }
    };

    let auth_manager = AuthManager::new(config.auth.to_auth_config()?, UserService::new(repo))
        .context("Invalid auth configuration")?;

    let app = api::create_router(api::AppState::new(auth_manager, config.features.clone()));

    let listener = tokio::net::TcpListener::bind(config.bind)
        .await
        .with_context(|| format!("Failed to bind to {}", config.bind))?;

    info!(
        "Server is running at http://{}. Press Ctrl+C to stop.",
        config.bind
    );

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal(Duration::from_secs(
            config.shutdown_timeout_secs,
        )))
        .await
        .context("Server error")?;

    info!("Server stopped");

    Ok(())
}

/// Graceful shutdown signal
///
/// Resolves on Ctrl+C or SIGTERM. In-flight requests then get `grace` to
/// finish before the process exits.
async fn shutdown_signal(grace: Duration) {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                warn!("Failed to listen for SIGTERM: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    info!("Shutting down server...");

    tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        warn!("Shutdown timed out after {:?}, exiting", grace);
        std::process::exit(1);
    });
}
