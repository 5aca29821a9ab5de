// api-gateway/src/main.rs

//! API gateway binary.
//!
//! This binary exposes the PBTX protocol over HTTP on top of the `pbtx`
//! crate:
//!
//! - `GET /health`
//! - `POST {URL_PATH}/register_account`
//! - `POST {URL_PATH}/get_seq`
//! - `POST {URL_PATH}/send_transaction`
//!
//! Every option is a command-line flag with an environment variable
//! fallback (`--help` lists both). At start-up the gateway connects to the
//! Antelope node, checks the configured accounts and network, and only then
//! starts listening. An optional Prometheus exporter serves `/metrics` on
//! `METRICS_ADDR`.

mod config;
mod routes;
mod state;

use std::net::SocketAddr;
use std::sync::Arc;

use anyhow::Context;
use clap::Parser;
use tokio::signal;
use tracing_subscriber::EnvFilter;

use config::ApiConfig;
use pbtx::{
    AntelopeLedger, GatewayConfig, MetricsRegistry, Sequencer, run_prometheus_http_server,
    verify_preconditions,
};
use state::{AppState, SharedState};

#[derive(Debug, Parser)]
#[command(name = "api-gateway", version, about = "PBTX gateway for an Antelope ledger")]
struct Cli {
    #[command(flatten)]
    api: ApiConfig,
    #[command(flatten)]
    gateway: GatewayConfig,
}

#[tokio::main]
async fn main() {
    pbtx::load_dotenv();
    let cli = Cli::parse();

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("api_gateway=info,pbtx=info")),
        )
        .init();

    if let Err(e) = run(cli.api, cli.gateway).await {
        tracing::error!("fatal error: {e:#}");
        std::process::exit(1);
    }
}

async fn run(api_cfg: ApiConfig, gateway_cfg: GatewayConfig) -> anyhow::Result<()> {
    // ---------------------------
    // Ledger + preconditions
    // ---------------------------

    let ledger = AntelopeLedger::connect(&gateway_cfg.ledger)
        .await
        .with_context(|| format!("cannot use ledger at {}", gateway_cfg.ledger.rpc_url))?;
    verify_preconditions(&ledger, &gateway_cfg)
        .await
        .context("start-up preconditions not met")?;

    // ---------------------------
    // Metrics
    // ---------------------------

    let metrics = Arc::new(
        MetricsRegistry::new().context("failed to initialise metrics registry")?,
    );

    if let Some(addr) = gateway_cfg.metrics.listen_addr {
        let metrics_clone = metrics.clone();
        tokio::spawn(async move {
            if let Err(e) = run_prometheus_http_server(metrics_clone, addr).await {
                tracing::error!("metrics HTTP server error: {e}");
            }
        });
    }

    // ---------------------------
    // Shared state + HTTP router
    // ---------------------------

    let app_state: SharedState = Arc::new(AppState {
        sequencer: Sequencer::new(gateway_cfg.network_id, Arc::new(ledger)),
        metrics,
    });
    let app = routes::router(app_state, &api_cfg.url_path);

    tracing::info!(
        network_id = gateway_cfg.network_id,
        "API gateway listening on http://{}{}",
        api_cfg.listen_addr(),
        api_cfg.url_path
    );

    let listen_addr = api_cfg.listen_addr();
    let listener = tokio::net::TcpListener::bind(listen_addr)
        .await
        .with_context(|| format!("failed to bind {listen_addr}"))?;

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .context("API server error")?;

    Ok(())
}

/// Waits for Ctrl-C and returns, used for graceful shutdown.
async fn shutdown_signal() {
    let _ = signal::ctrl_c().await;
    tracing::info!("shutdown signal received");
}
