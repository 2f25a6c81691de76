//! `ber-server`: concurrent TCP ingest server that frames BER records
//! into rotating files.

use anyhow::{Context, Result};
use ber_server::config::{BindSpec, DEFAULT_WORKERS, MAX_FILE_SIZE, MAX_WORKERS};
use ber_server::{BerServer, ServerConfig};
use clap::Parser;
use std::path::PathBuf;
use std::time::Duration;

/// Accept BER-framed records over TCP and write them to rotating files.
#[derive(Parser, Debug)]
#[command(name = "ber-server", version, about)]
struct Cli {
    /// Address to listen on: `ip:port`, or `ip:min-max` to have each
    /// worker probe the range for a free port. Repeatable for multiple
    /// binds.
    #[arg(long = "bind", required = true)]
    binds: Vec<BindSpec>,

    /// Number of worker threads, each with its own listener and output file.
    #[arg(long = "number-workers", default_value_t = DEFAULT_WORKERS)]
    number_workers: usize,

    /// Directory new files are written into before they are complete.
    #[arg(long = "temp-dir")]
    temp_dir: PathBuf,

    /// Directory completed files are moved into.
    #[arg(long = "final-dir")]
    final_dir: PathBuf,

    /// Rotate a file once it reaches this many bytes.
    #[arg(long = "max-file-size", default_value_t = MAX_FILE_SIZE)]
    max_file_size: u64,

    /// Rotate a file if it goes this many seconds without a write.
    #[arg(long = "max-file-age", default_value_t = 60)]
    max_file_age_secs: u64,
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();

    if cli.number_workers > MAX_WORKERS {
        anyhow::bail!(
            "--number-workers must be at most {}, got {}",
            MAX_WORKERS,
            cli.number_workers
        );
    }

    let config = ServerConfig::new(
        cli.binds,
        cli.number_workers,
        cli.temp_dir,
        cli.final_dir,
        cli.max_file_size,
        Duration::from_secs(cli.max_file_age_secs),
    )
    .context("invalid server configuration")?;

    let mut server = BerServer::new(config);
    server.start();

    wait_for_shutdown_signal().await?;
    log::info!("shutdown requested, stopping workers");

    server.stop().context("error while stopping server")?;
    Ok(())
}

#[cfg(unix)]
async fn wait_for_shutdown_signal() -> Result<()> {
    let mut sigterm = tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate())
        .context("failed to install SIGTERM handler")?;
    tokio::select! {
        result = tokio::signal::ctrl_c() => result.context("failed to listen for ctrl-c"),
        _ = sigterm.recv() => Ok(()),
    }
}

#[cfg(not(unix))]
async fn wait_for_shutdown_signal() -> Result<()> {
    tokio::signal::ctrl_c()
        .await
        .context("failed to listen for ctrl-c")
}
