//! Codebox MCP Server entry point.
//!
//! Serves MCP over stdio by default (for local AI tools such as Claude
//! Desktop) and optionally over streamable HTTP for remote agents.
//!
//! ## Transport Modes
//!
//! - **stdio** (default): Only stdio transport
//! - **http**: Only HTTP transport
//! - **both**: Runs stdio + HTTP simultaneously

use codebox_mcp::{http, CodeboxConfig, CodeboxServer, TransportMode};
use rmcp::transport::stdio;
use rmcp::ServiceExt;
use std::sync::Arc;
use tokio::signal;
use tokio::sync::{broadcast, Notify};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

const DEFAULT_LOG_DIRECTIVES: &str = "codebox_mcp=info,codebox_core=info,codebox_telnet=info";

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let dotenv = dotenvy::dotenv();

    // Initialize tracing - logs go to stderr (stdout is MCP transport)
    let filter = if std::env::var_os("RUST_LOG").is_some() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new(DEFAULT_LOG_DIRECTIVES)
    };
    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    tracing::info!(version = env!("CARGO_PKG_VERSION"), "Starting Codebox MCP Server");
    if let Ok(path) = dotenv {
        tracing::debug!(path = %path.display(), "Loaded .env file");
    }

    let config = CodeboxConfig::from_env()?;
    tracing::info!(?config, "Configuration loaded");

    // Validate configuration (warn-only; telnet tools work without a backend)
    config.validate_warn();

    let server = CodeboxServer::new(config.clone());

    let (shutdown_tx, _) = broadcast::channel::<()>(1);
    // Signalled when the stdio peer hangs up
    let stdio_closed = Arc::new(Notify::new());

    let mut handles = Vec::new();

    // HTTP transport
    if config.transport_mode.http_enabled() {
        let http_server = server.clone();
        let http_addr = config.http_addr;
        let mut shutdown_rx = shutdown_tx.subscribe();

        handles.push(tokio::spawn(async move {
            let shutdown = async move {
                let _ = shutdown_rx.recv().await;
            };

            if let Err(e) = http::serve(http_server, http_addr, shutdown).await {
                tracing::error!(error = %e, "HTTP server error");
            }
        }));
        tracing::info!(addr = %config.http_addr, "HTTP transport enabled");
    }

    // Stdio transport
    if config.transport_mode.stdio_enabled() {
        let stdio_server = server.clone();
        let mut shutdown_rx = shutdown_tx.subscribe();
        let closed = Arc::clone(&stdio_closed);

        handles.push(tokio::spawn(async move {
            match stdio_server.serve(stdio()).await {
                Ok(service) => {
                    tokio::select! {
                        result = service.waiting() => {
                            match result {
                                Ok(reason) => tracing::info!(?reason, "Stdio transport closed"),
                                Err(e) => tracing::error!(error = %e, "Stdio service error"),
                            }
                        }
                        _ = shutdown_rx.recv() => {
                            tracing::info!("Stdio transport shutting down");
                        }
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to start stdio transport");
                }
            }
            closed.notify_one();
        }));
        tracing::info!("Stdio transport enabled");
    }

    match config.transport_mode {
        TransportMode::Both => {
            tracing::info!(http_addr = %config.http_addr, "Server ready (stdio + HTTP)");
        }
        TransportMode::Http => {
            tracing::info!(http_addr = %config.http_addr, "Server ready (HTTP only)");
        }
        TransportMode::Stdio => {
            tracing::info!("Server ready (stdio only)");
        }
    }

    // With HTTP running, a closed stdin does not stop the server
    let stdio_only = !config.transport_mode.http_enabled();
    tokio::select! {
        result = signal::ctrl_c() => {
            result?;
            tracing::info!("Received shutdown signal, cleaning up...");
        }
        _ = stdio_closed.notified(), if stdio_only => {
            tracing::info!("Client disconnected, cleaning up...");
        }
    }

    let _ = shutdown_tx.send(());

    server.shutdown().await;

    for handle in handles {
        let _ = handle.await;
    }

    tracing::info!("Server shutdown complete");
    Ok(())
}
