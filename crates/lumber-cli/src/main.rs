#![doc = include_str!("../README.md")]

mod client;

use anyhow::Context;
use clap::Parser;
use client::command::{self, Command, Outcome, USAGE};
use client::config::{CliArgs, ClientConfig};
use client::facade::LogClient;
use client::telemetry::{init_telemetry, shutdown_telemetry};
use tokio::signal;
use tokio_util::sync::CancellationToken;

// Using mimalloc for better performance under contention, especially in musl
// environments.
#[global_allocator]
static GLOBAL: mimalloc::MiMalloc = mimalloc::MiMalloc;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load from .env
    let _ = dotenvy::dotenv();
    let args = CliArgs::parse();
    let config = ClientConfig::try_from(args)?;

    // The channel is only built once the command is known to be valid.
    let Some(command) = Command::parse(&config.command) else {
        println!("{USAGE}");
        return Ok(());
    };

    let providers = init_telemetry()?;
    log_startup_info(&command, &config);

    let client = LogClient::connect_lazy(&config.server_addr)
        .with_context(|| format!("invalid server address {:?}", config.server_addr))?
        .with_deadlines(config.deadlines)
        .with_compression(config.compression.into());

    let cancel = CancellationToken::new();
    // Installing the handler replaces the default SIGINT behavior, so only
    // commands that react to the token get one.
    if command.is_cancellable() {
        tokio::spawn(cancel_on_signal(cancel.clone()));
    }

    let result = command::run(command, &client, &config, &cancel).await;
    shutdown_telemetry(providers);

    match result? {
        Outcome::Done => Ok(()),
        Outcome::HardExit(deadline) => deadline.kill_process(),
    }
}

fn log_startup_info(command: &Command, config: &ClientConfig) {
    if cfg!(debug_assertions) {
        tracing::debug!("Running {command:?} with full config: {config:#?}");
    } else {
        tracing::debug!("Running {command:?} against {}", config.server_addr);
    }
}

async fn cancel_on_signal(cancel: CancellationToken) {
    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!("failed to install SIGTERM handler: {e}");
                core::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = core::future::pending::<()>();

    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!("failed to install Ctrl+C handler: {e}");
            core::future::pending::<()>().await;
        }
    };

    tokio::select! {
        () = ctrl_c => tracing::info!("Received Ctrl+C signal"),
        () = terminate => tracing::info!("Received SIGTERM signal"),
    }

    cancel.cancel();
}
