use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use serde::Serialize;
use snapweb::core::{Runner, ScheduleStore, Scheduler};
use snapweb::web::{StreamMessage, WebServer};
use snapweb::{config, context, logging};
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{broadcast, mpsc};

#[derive(Parser)]
#[command(name = "snapweb")]
#[command(about = "Web control panel daemon for SnapRAID", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the daemon
    Daemon(ServerArgs),
}

#[derive(Args, Serialize)]
struct ServerArgs {
    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    snapraid_binary: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    config_path: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    data_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    log_dir: Option<PathBuf>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    http_port: Option<u16>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    history_limit: Option<usize>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    verbose: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    #[arg(long)]
    json_logs: Option<bool>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    match &cli.command {
        Commands::Daemon(args) => {
            let config = config::AppConfig::new(Some(args))?;
            logging::init(logging::LogConfig {
                json: config.json_logs,
                verbose: config.verbose,
            });
            run_daemon(config).await.context("Failed to start daemon")
        }
    }
}

async fn run_daemon(config: config::AppConfig) -> Result<()> {
    let runner = Arc::new(Runner::new(
        config.snapraid_binary.clone(),
        config.log_dir.clone(),
        config.history_limit,
    ));

    let (events, _) = broadcast::channel::<StreamMessage>(256);
    let (sched_tx, mut sched_rx) = mpsc::channel(64);

    let store = ScheduleStore::new(config.schedules_path());
    let scheduler = Arc::new(Scheduler::new(store, Arc::clone(&runner), Some(sched_tx)));
    scheduler
        .load_schedules()
        .await
        .context("Failed to load schedules")?;

    // scheduled-run output joins the same event stream the API path uses
    let sched_events = events.clone();
    tokio::spawn(async move {
        while let Some(scheduled) = sched_rx.recv().await {
            let _ = sched_events.send(StreamMessage::Output {
                command: scheduled.command.to_string(),
                chunk: scheduled.chunk,
                timestamp: chrono::Utc::now(),
            });
        }
    });

    let ctx = context::AppContext::new(config, runner, scheduler);
    WebServer::new(ctx, events).start().await
}
