use anyhow::Result;
use clap::Parser;
use kairos::config;
use kairos::ipc::server;
use kairos::Worker;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "kairos")]
#[command(about = "Background Pomodoro task timer", long_about = None)]
struct Args {
    /// Config file, defaults to kairos.toml in the platform config directory
    #[arg(short, long)]
    config: Option<PathBuf>,
    /// Control socket path, overrides the config file
    #[arg(short, long)]
    socket: Option<PathBuf>,
    /// Log filter used when RUST_LOG is not set
    #[arg(long, default_value = "info")]
    log_level: String,
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level)),
        )
        .init();

    let mut config = match &args.config {
        Some(path) => config::load_from(path)?,
        None => config::load_config()?,
    };
    if let Some(socket) = args.socket {
        config.socket_path = socket;
    }

    let listener = server::bind(&config.socket_path)?;
    let handle = Worker::spawn(config.timer.clone(), config.notifier.kind.build());
    let watcher = handle.sender();

    let outcome = tokio::select! {
        res = server::serve(listener, handle.sender()) => res,
        _ = tokio::signal::ctrl_c() => {
            info!("Interrupted, shutting down");
            Ok(())
        }
        _ = watcher.closed() => {
            info!("Timer worker quit, shutting down");
            Ok(())
        }
    };

    handle.stop().await;
    let _ = std::fs::remove_file(&config.socket_path);

    outcome
}
