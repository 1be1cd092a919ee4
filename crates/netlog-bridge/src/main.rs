//! netlog bridge
//!
//! - TCP producer listener (loopback by default)
//! - WebSocket fan-out to viewers on `/`
//! - Viewer assets over HTTP with `/` redirect, `/healthz`, `/metrics`

use std::process::ExitCode;

use tracing_subscriber::{fmt, EnvFilter};

use netlog_bridge::{app_state::AppState, config, server};
use netlog_core::error::Result;

#[tokio::main]
async fn main() -> ExitCode {
    fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let path = std::env::args().nth(1);
    match run(path.as_deref()).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            tracing::error!(code = e.code().as_str(), error = %e, "netlog bridge failed to start");
            ExitCode::FAILURE
        }
    }
}

async fn run(config_path: Option<&str>) -> Result<()> {
    let cfg = config::load(config_path)?;

    let listeners = server::Listeners::bind(&cfg.bridge).await?;
    let addrs = listeners.local_addrs()?;
    tracing::info!(tcp = %addrs.tcp, ws = %addrs.ws, http = %addrs.http, "netlog bridge starting");

    server::serve(AppState::new(cfg), listeners, shutdown_signal()).await
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
    tracing::info!("signal received, starting graceful shutdown");
}
