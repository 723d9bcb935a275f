//! gk-bot - rank gatekeeper service
//!
//! Receives chat events over HTTP, validates quiz reports and manages rank
//! roles through the chat platform's REST API.

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use gk_common::config::TomlConfig;
use gk_common::db::init_database;
use gk_common::events::EventBus;
use tokio::signal;
use tracing::{info, warn};

use gk_bot::gateway::RestGateway;
use gk_bot::ledger::SqliteLedger;
use gk_bot::services::KotobaReportClient;
use gk_bot::{build_router, run_dispatcher, AppState, BotSettings, QuizPipeline};

const EVENT_BUS_CAPACITY: usize = 256;

/// Command-line arguments for gk-bot
#[derive(Parser, Debug)]
#[command(name = "gk-bot")]
#[command(about = "Quiz report rank gatekeeper")]
#[command(version)]
struct Args {
    /// Config file (defaults to the platform config location)
    #[arg(short, long, env = "GK_CONFIG")]
    config: Option<PathBuf>,

    /// SQLite attempt ledger path
    #[arg(short, long, env = "GK_DATABASE")]
    database: Option<PathBuf>,

    /// Port to listen on for chat events
    #[arg(short, long, env = "GK_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // Config is read before logging starts so its level applies
    let config_path = TomlConfig::locate(args.config.as_deref());
    let (toml_config, config_error) = match &config_path {
        Some(path) => match TomlConfig::load_from(path) {
            Ok(config) => (config, None),
            Err(e) => (TomlConfig::default(), Some(format!("{}: {}", path.display(), e))),
        },
        None => (TomlConfig::default(), None),
    };

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(&toml_config.logging.level)),
        )
        .init();

    info!(
        "Starting gatekeeper (gk-bot) v{} [{}] ({})",
        env!("CARGO_PKG_VERSION"),
        env!("GIT_HASH"),
        env!("BUILD_PROFILE")
    );

    match (&config_path, config_error) {
        (_, Some(e)) if args.config.is_some() => {
            anyhow::bail!("Failed to load config {}", e);
        }
        (_, Some(e)) => warn!("Ignoring unreadable config {}", e),
        (Some(path), None) => info!("Config file: {}", path.display()),
        (None, None) => info!("No config file found, using environment and defaults"),
    }

    let settings = BotSettings::resolve(&toml_config).context("Failed to resolve bot settings")?;
    info!("Quiz bot id: {}", settings.quiz_bot_id);

    let db_path = args
        .database
        .unwrap_or_else(|| toml_config.resolved_database_path());
    let pool = init_database(&db_path)
        .await
        .context("Failed to initialize database")?;
    info!("Database path: {}", db_path.display());

    let ledger = Arc::new(SqliteLedger::new(pool, settings.cooldown()));
    let gateway = Arc::new(
        RestGateway::new(&settings.api_base_url, &settings.token)
            .context("Failed to create chat gateway")?,
    );
    let reports = Arc::new(
        KotobaReportClient::new(&settings.report_base_url)
            .context("Failed to create report client")?,
    );

    let pipeline = Arc::new(QuizPipeline::new(&settings, ledger, gateway, reports));
    info!(
        "Rank catalog loaded: {} quizzes, {} command prefixes",
        pipeline.catalog().all().len(),
        pipeline.catalog().deck_prefixes().len()
    );

    let bus = EventBus::new(EVENT_BUS_CAPACITY);
    let dispatcher = tokio::spawn(run_dispatcher(pipeline, bus.subscribe()));

    let app = build_router(AppState::new(bus));

    let port = args
        .port
        .unwrap_or_else(|| toml_config.resolved_listen_port());
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;
    info!("gk-bot listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    // Router (and its bus sender) is gone; the dispatcher drains and stops
    if let Err(e) = dispatcher.await {
        warn!("Dispatcher task ended abnormally: {}", e);
    }

    info!("Server shutdown complete");
    Ok(())
}

/// Graceful shutdown signal handler
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            warn!("Failed to listen for Ctrl+C: {}", e);
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!("Failed to install SIGTERM handler: {}", e);
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C, shutting down");
        },
        _ = terminate => {
            info!("Received terminate signal, shutting down");
        },
    }
}
