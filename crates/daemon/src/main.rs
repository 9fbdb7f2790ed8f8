// SPDX-License-Identifier: MIT
// Copyright (c) 2026 the herdctl authors

// Allow panic!/unwrap/expect in test code
#![cfg_attr(test, allow(clippy::panic))]
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

//! herdd: the fleet daemon binary.
//!
//! Thin surface over the core: decode a JSON fleet config, initialize
//! tracing and the PID file, run the fleet manager, and stop gracefully
//! on SIGINT/SIGTERM. Everything interesting lives in the library
//! crates.

mod backend;
mod pidfile;

use herd_core::{FleetConfig, SystemClock};
use herd_fleet::FleetManager;
use std::path::PathBuf;
use std::sync::Arc;
use thiserror::Error;

#[derive(Debug, Error)]
enum DaemonError {
    #[error("usage: herdd <config.json>")]
    Usage,
    #[error("configuration not found at {0}")]
    ConfigNotFound(PathBuf),
    #[error("invalid configuration: {0}")]
    ConfigInvalid(String),
    #[error(transparent)]
    PidFile(#[from] pidfile::PidFileError),
    #[error(transparent)]
    Fleet(#[from] herd_fleet::FleetError),
    #[error("signal handler setup failed: {0}")]
    Signals(std::io::Error),
}

fn load_config(path: &PathBuf) -> Result<FleetConfig, DaemonError> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(DaemonError::ConfigNotFound(path.clone()));
        }
        Err(e) => return Err(DaemonError::ConfigInvalid(e.to_string())),
    };
    serde_json::from_str(&raw).map_err(|e| DaemonError::ConfigInvalid(e.to_string()))
}

/// File log sink plus env-filtered stderr.
fn init_tracing(state_dir: &std::path::Path) -> tracing_appender::non_blocking::WorkerGuard {
    let appender = tracing_appender::rolling::never(state_dir.join("logs"), "fleet.log");
    let (writer, guard) = tracing_appender::non_blocking(appender);
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(writer)
        .with_ansi(false)
        .init();
    guard
}

async fn run() -> Result<(), DaemonError> {
    let config_path = std::env::args()
        .nth(1)
        .map(PathBuf::from)
        .ok_or(DaemonError::Usage)?;
    let config = load_config(&config_path)?;

    std::fs::create_dir_all(config.state_dir.join("logs"))
        .map_err(|e| DaemonError::ConfigInvalid(format!("cannot prepare state dir: {e}")))?;
    let _log_guard = init_tracing(&config.state_dir);

    let _pid = pidfile::PidFile::acquire(config.state_dir.join("herdctl.pid"))?;

    let backend = Arc::new(backend::CommandBackend::default());
    let manager = FleetManager::new(config, backend, SystemClock);
    manager.initialize()?;
    manager.start().await?;
    tracing::info!("herdd running, send SIGINT or SIGTERM to stop");

    wait_for_shutdown().await.map_err(DaemonError::Signals)?;
    tracing::info!("shutdown signal received");
    manager.stop().await;
    Ok(())
}

async fn wait_for_shutdown() -> std::io::Result<()> {
    use tokio::signal::unix::{signal, SignalKind};
    let mut interrupt = signal(SignalKind::interrupt())?;
    let mut terminate = signal(SignalKind::terminate())?;
    tokio::select! {
        _ = interrupt.recv() => {}
        _ = terminate.recv() => {}
    }
    Ok(())
}

fn main() {
    let runtime = match tokio::runtime::Runtime::new() {
        Ok(runtime) => runtime,
        Err(e) => {
            eprintln!("herdd: failed to start runtime: {e}");
            std::process::exit(1);
        }
    };
    if let Err(e) = runtime.block_on(run()) {
        eprintln!("herdd: {e}");
        std::process::exit(1);
    }
}
