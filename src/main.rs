//! Side-Stacker server binary.

mod cli;

use anyhow::Result;
use clap::Parser;
use cli::{Cli, Command};
use side_stacker::{ConnectionRegistry, GameOrchestrator, GameRepository, ServerConfig};
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file
    dotenvy::dotenv().ok();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    match cli.command {
        Command::Serve {
            config,
            host,
            port,
            db_path,
        } => run_server(config, host, port, db_path).await,
        Command::Migrate { config, db_path } => run_migrations(config, db_path),
    }
}

/// Run the game server
async fn run_server(
    config_path: PathBuf,
    host: Option<String>,
    port: Option<u16>,
    db_path: Option<String>,
) -> Result<()> {
    let config = load_config(config_path, host, port, db_path)?;

    info!(
        host = %config.host(),
        port = config.port(),
        db = %config.database_path(),
        "Starting Side-Stacker server"
    );

    let repo = GameRepository::new(config.database_path().clone())?;
    repo.run_migrations()?;

    let orchestrator = GameOrchestrator::new(ConnectionRegistry::new(), repo, config.clone());

    // Request logging in front of the router.
    let app = side_stacker::server::app(orchestrator.clone()).layer(
        tower::ServiceBuilder::new().map_request(|req: axum::http::Request<axum::body::Body>| {
            info!(method = %req.method(), uri = %req.uri(), "Incoming HTTP request");
            req
        }),
    );

    let listener =
        tokio::net::TcpListener::bind((config.host().as_str(), *config.port())).await?;
    info!("Server ready at http://{}:{}/", config.host(), config.port());
    info!(
        "WebSocket endpoint at ws://{}:{}/ws/{{client_id}}",
        config.host(),
        config.port()
    );

    let on_shutdown = orchestrator.clone();
    axum::serve(listener, app)
        .with_graceful_shutdown(async move {
            let _ = tokio::signal::ctrl_c().await;
            info!("Shutdown signal received");
            on_shutdown.shutdown();
        })
        .await?;

    Ok(())
}

/// Apply pending migrations and exit
fn run_migrations(config_path: PathBuf, db_path: Option<String>) -> Result<()> {
    let config = load_config(config_path, None, None, db_path)?;
    let repo = GameRepository::new(config.database_path().clone())?;
    repo.run_migrations()?;
    info!(db = %config.database_path(), "Migrations applied");
    Ok(())
}

fn load_config(
    config_path: PathBuf,
    host: Option<String>,
    port: Option<u16>,
    db_path: Option<String>,
) -> Result<ServerConfig> {
    let mut config = ServerConfig::load(&config_path)?;
    if let Some(host) = host {
        config = config.with_host(host);
    }
    if let Some(port) = port {
        config = config.with_port(port);
    }
    if let Some(db_path) = db_path {
        config = config.with_database_path(db_path);
    }
    Ok(config)
}
