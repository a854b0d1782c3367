use anyhow::{Context, Result};
use clap::Args;
use colored::Colorize;
use tokio::signal;
use tokio_util::sync::CancellationToken;

use simbridge::prelude::*;

use super::load_config;
use crate::demo::{DemoControl, OrbitSource};
use crate::utils;

#[derive(Args)]
pub struct ServeArgs {
    /// Load configuration from this file instead of the standard locations
    #[arg(short, long, value_name = "PATH")]
    config: Option<String>,

    /// Port to listen on (overrides configuration)
    #[arg(short, long, env = "SIMBRIDGE_PORT")]
    port: Option<u16>,

    /// Wait for the first peer before publishing
    #[arg(long)]
    block: bool,

    /// Interval between samples in milliseconds (overrides configuration)
    #[arg(long, value_name = "MS")]
    interval_ms: Option<u64>,

    /// Number of demo nodes
    #[arg(long, default_value_t = 3)]
    nodes: usize,

    /// Human-readable logs instead of JSON
    #[arg(long)]
    pretty: bool,
}

pub async fn execute(args: ServeArgs) -> Result<()> {
    let mut config = load_config(args.config.as_deref())?;
    if let Some(port) = args.port {
        config.service.port = port;
    }
    if let Some(interval_ms) = args.interval_ms {
        config.publisher.interval_ms = interval_ms;
    }

    if args.pretty {
        init_tracing_pretty(&config)?;
    } else {
        init_tracing(&config)?;
    }

    let server = Server::from_config(&config)
        .await
        .context("Failed to start WebSocket server")?;

    let source = OrbitSource::new(args.nodes);
    register_callbacks(&server, source.control());

    let cancel = CancellationToken::new();
    let publisher = config.publisher.enabled.then(|| {
        Publisher::from_config(server.clone(), source, &config.publisher).spawn(cancel.clone())
    });
    if publisher.is_none() {
        utils::warning("Publisher disabled; only inbound commands will be processed");
    }

    // A signal must also release a start() that is still waiting for a peer
    let signal_server = server.clone();
    let signal_cancel = cancel.clone();
    tokio::spawn(async move {
        shutdown_signal().await;
        signal_cancel.cancel();
        signal_server.stop();
    });

    utils::success(&format!(
        "Listening on {}",
        format!("ws://{}", server.local_addr()).cyan()
    ));
    if args.block {
        utils::info("Waiting for the first peer...");
    }
    server.start(args.block).await?;
    if server.is_connected() {
        utils::info("Peer connected");
    }
    println!("  {}", "Press Ctrl+C to stop.".dimmed());

    cancel.cancelled().await;
    server.shutdown().await;

    if let Some(publisher) = publisher {
        let stats = publisher.await.context("Publisher task failed")?;
        utils::info(&format!(
            "Published {} samples ({} skipped, {} failed)",
            stats.published, stats.skipped, stats.failed
        ));
    }
    utils::success("Shutdown complete");

    Ok(())
}

fn register_callbacks(server: &Server, control: DemoControl) {
    server.on_connected(|| tracing::info!("Peer connected"));
    server.on_disconnected(|| tracing::info!("Peer disconnected"));
    server.on_error(|description| tracing::warn!(error = description, "Bridge error"));
    server.on_message(move |payload| match Command::decode(payload) {
        Ok(command) => {
            tracing::info!(command = command.name(), "Applying command");
            control.apply(command);
        }
        Err(err) => {
            tracing::warn!(len = payload.len(), error = %err, "Ignoring inbound payload");
        }
    });
}

/// Wait for SIGINT or SIGTERM
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(err) = signal::ctrl_c().await {
            tracing::error!(error = %err, "Failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(err) => {
                tracing::error!(error = %err, "Failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            tracing::info!("Received SIGINT (Ctrl+C), starting graceful shutdown");
        },
        _ = terminate => {
            tracing::info!("Received SIGTERM, starting graceful shutdown");
        },
    }
}
