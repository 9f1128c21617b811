//! Buildbot — Slack relay for CI build prompts.
//!
//! Watches the CI and automation bots' chat messages, tracks one outstanding
//! "run or ignore this build?" prompt per branch, and gates the prompts on
//! the shared test cluster's busy state. Webhook endpoints and direct chat
//! commands mutate the same tracked state.

mod config;
mod error;
mod events;
mod metrics;
mod models;
mod routes;
mod services;

use std::net::SocketAddr;
use std::path::Path;
use std::sync::Arc;

use clap::Parser;
use tokio::sync::{mpsc, Mutex};

use crate::config::BotConfig;
use crate::models::state::BotState;
use crate::services::classifier::SenderIds;
use crate::services::dispatcher::Dispatcher;
use crate::services::event_loop;
use crate::services::slack_service::{ChatChannel, SlackClient};

#[derive(Parser)]
#[command(name = "buildbot", about = "Slack relay bot for CI build prompts")]
struct Cli {
    /// Path to the JSON config file
    #[arg(short, long, env = "BUILDBOT_CONFIG", default_value = "botconfig.json")]
    config: std::path::PathBuf,

    /// Override the configured HTTP listen port
    #[arg(short, long, env = "BUILDBOT_PORT")]
    port: Option<u16>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();
    let config = Arc::new(BotConfig::load(&cli.config)?);
    tracing::info!(
        bot = %config.bot_name,
        trackfile = %config.trackfile,
        "Starting build-prompt relay bot"
    );

    let state = BotState::load(Path::new(&config.trackfile))?;
    tracing::info!(prompts = state.prompts.len(), "Tracking state loaded");
    let state = Arc::new(Mutex::new(state));

    let chat: Arc<dyn ChatChannel> = Arc::new(SlackClient::new(&config.slack_api_token));
    let dispatcher = Dispatcher::new(state, chat, config.clone());

    // Inbound message stream: the Slack events endpoint feeds the bot loop.
    let (inbound_tx, inbound_rx) = mpsc::channel(64);
    let senders = SenderIds {
        ci: config.ci_sender.clone(),
        automation: config.automation_sender.clone(),
    };
    let bot_loop = tokio::spawn(event_loop::run_bot_loop(
        inbound_rx,
        dispatcher.clone(),
        senders,
        config.debug_rules,
    ));

    // Initialize metrics
    metrics::init_metrics();

    // Build router
    let router_state = routes::BotRouterState {
        dispatcher,
        inbound: inbound_tx,
        config: config.clone(),
    };
    let app = routes::bot_router(router_state);

    // Start server
    let port = cli.port.unwrap_or(config.listen_port);
    let addr = SocketAddr::from(([0, 0, 0, 0], port));
    tracing::info!("Listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    let shutdown = async move {
        tokio::select! {
            () = shutdown_signal() => {}
            _ = bot_loop => tracing::info!("Bot loop ended, shutting down..."),
        }
    };
    axum::serve(listener, app).with_graceful_shutdown(shutdown).await?;

    tracing::info!("Clean stop");
    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        tokio::signal::ctrl_c()
            .await
            .expect("failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
            .expect("failed to install SIGTERM handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
