#![warn(clippy::all, clippy::pedantic)]

use std::net::SocketAddr;
use std::path::PathBuf;
use std::sync::Arc;

use clap::Parser;
use tracing::warn;

mod bus;
mod chat;
mod config;
mod error;
mod monitoring;
mod status;
mod web;

use bus::StatusBus;
use chat::{ChatUpdater, LogPublisher};
use config::Config;
use error::AppError;
use logger::init as init_tracing;
use monitoring::heartbeat::{self, HeartbeatTable};
use monitoring::types::ServiceKind;
use monitoring::{ProbeExecutor, Scheduler};
use status::StatusBoard;
use web::AppState;

#[derive(Debug, Parser)]
#[command(name = "statuswatch", about = "Liveness monitor for a mixed fleet of services")]
struct Cli {
    /// Path to the TOML configuration file.
    #[arg(short, long)]
    config: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> Result<(), AppError> {
    init_tracing();
    let cli = Cli::parse();

    let config = Config::from_config(cli.config.as_deref())?;
    monitoring::validation::validate_targets(&config.services)?;

    let heartbeats = HeartbeatTable::new();
    let board = StatusBoard::new(config.services.clone(), heartbeats.clone());
    let bus = StatusBus::new();
    let executor = ProbeExecutor::new(heartbeats.clone())?;
    let scheduler = Scheduler::new(
        board.clone(),
        bus.clone(),
        executor,
        config.monitor.poll_period(),
        config.monitor.refresh_period(),
    );

    // One passive listener per heartbeat target.
    for target in board.targets().iter().filter(|t| t.kind == ServiceKind::Heartbeat) {
        let port = target.port.unwrap_or_default();
        heartbeat::spawn_listener(
            target.name.clone(),
            port,
            heartbeats.clone(),
            scheduler.beat_sender(),
        )
        .await?;
    }

    let addr: SocketAddr = format!("{}:{}", config.web.bind, config.web.port).parse()?;
    let web_state = AppState { board: board.clone(), bus: bus.clone() };
    tokio::spawn(async move {
        if let Err(err) = web::serve(addr, web_state).await {
            warn!("web server stopped: {err}");
        }
    });

    let updater = ChatUpdater::new(Arc::new(LogPublisher), config.web.public_url.clone());
    tokio::spawn(updater.run(board.clone(), bus.clone()));

    scheduler.run().await;
    Ok(())
}
