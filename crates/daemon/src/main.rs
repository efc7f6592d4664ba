// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! Squad Aegis Daemon (aegisd)
//!
//! Runs the control plane for the servers listed in `aegisd.toml`:
//! RCON channels, log ingestion, player tracking, workflows, plugins.

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

use aegis_daemon::{Config, LifecycleError};
use std::path::PathBuf;
use tokio::signal::unix::{signal, SignalKind};
use tracing::{error, info};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let mut config_path = PathBuf::from("/etc/squad-aegis/aegisd.toml");
    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--version" | "-V" => {
                println!("aegisd {}", env!("CARGO_PKG_VERSION"));
                return Ok(());
            }
            "--help" | "-h" => {
                println!("aegisd {}", env!("CARGO_PKG_VERSION"));
                println!("Squad Aegis daemon - server administration control plane");
                println!();
                println!("USAGE:");
                println!("    aegisd [--config <path>]");
                println!();
                println!("OPTIONS:");
                println!("    -c, --config <path>  Config file (default /etc/squad-aegis/aegisd.toml)");
                println!("    -h, --help           Print help information");
                println!("    -V, --version        Print version information");
                return Ok(());
            }
            "--config" | "-c" => {
                config_path = args
                    .next()
                    .map(PathBuf::from)
                    .ok_or("--config requires a path")?;
            }
            other => {
                eprintln!("error: unexpected argument '{other}'");
                eprintln!("Usage: aegisd [--config <path>]");
                std::process::exit(1);
            }
        }
    }

    let config = Config::load(&config_path)?;
    let _log_guard = setup_logging(&config)?;

    info!(config = %config_path.display(), "starting aegisd");
    let started = match aegis_daemon::lifecycle::startup(&config).await {
        Ok(started) => started,
        Err(LifecycleError::LockFailed(path)) => {
            eprintln!("aegisd is already running (lock: {path})");
            std::process::exit(1);
        }
        Err(e) => {
            error!("failed to start daemon: {e}");
            return Err(e.into());
        }
    };

    info!(
        servers = started.supervisor.managed_servers().len(),
        "daemon ready"
    );

    let mut sigterm = signal(SignalKind::terminate())?;
    let mut sigint = signal(SignalKind::interrupt())?;
    tokio::select! {
        _ = sigterm.recv() => info!("received SIGTERM"),
        _ = sigint.recv() => info!("received SIGINT"),
    }

    started.supervisor.shutdown().await;
    info!("daemon stopped");
    Ok(())
}

fn setup_logging(
    config: &Config,
) -> Result<tracing_appender::non_blocking::WorkerGuard, LifecycleError> {
    use tracing_subscriber::{fmt, prelude::*, EnvFilter};

    std::fs::create_dir_all(&config.state_dir)?;
    let file_appender = tracing_appender::rolling::never(
        &config.state_dir,
        config
            .log_path()
            .file_name()
            .unwrap_or_else(|| std::ffi::OsStr::new("aegisd.log")),
    );
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(non_blocking))
        .init();

    Ok(guard)
}
