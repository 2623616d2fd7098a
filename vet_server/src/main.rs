//! Vetpraxis API: veterinary business-intelligence backend.
//!
//! Loads the clinic's issued receipts from the upstream store (Supabase REST
//! or PostgreSQL), keeps them in an in-memory cache and serves the dashboard
//! analytics: KPIs, operational and payment analysis, customer insights,
//! data quality, transaction drilldown and the golden dataset check.

mod config;
mod dashboard;
mod metrics;
mod models;
mod routes;
mod services;
#[cfg(test)]
mod test_support;

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Context;
use clap::{Parser, ValueEnum};

use crate::dashboard::golden::GoldenExpectations;
use crate::services::dataset_service::DatasetService;
use crate::services::postgres_service::PostgresSource;
use crate::services::source::ComprobanteSource;
use crate::services::supabase_service::SupabaseSource;

#[derive(Clone, Copy, Debug, ValueEnum)]
enum SourceKind {
    /// Supabase REST API (PostgREST)
    Supabase,
    /// Direct PostgreSQL connection
    Postgres,
}

#[derive(Parser)]
#[command(name = "vetpraxis-api", about = "Vetpraxis dashboard analytics API")]
struct Cli {
    /// Server port
    #[arg(short, long, env = "VET_API_PORT", default_value = "8000")]
    port: u16,

    /// Where the receipts are read from
    #[arg(long, env = "DATA_SOURCE", value_enum, default_value = "supabase")]
    source: SourceKind,

    /// PostgreSQL connection URL (required with `--source postgres`)
    #[arg(long, env = "DATABASE_URL")]
    database_url: Option<String>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();

    // Initialize tracing
    let log_format = std::env::var("LOG_FORMAT").unwrap_or_default();
    if log_format == "json" {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| "info".into()),
            )
            .init();
    }

    let cli = Cli::parse();
    let config = config::ApiConfig::from_env();

    tracing::info!("Starting Vetpraxis API...");

    let source: Arc<dyn ComprobanteSource> = match cli.source {
        SourceKind::Supabase => Arc::new(SupabaseSource::new(&config)?),
        SourceKind::Postgres => {
            let url = cli
                .database_url
                .as_deref()
                .context("DATABASE_URL is required for the postgres source")?;
            Arc::new(PostgresSource::connect(url, &config)?)
        }
    };
    tracing::info!(source = source.name(), table = %config.table, "Receipt source configured");

    let golden = match &config.golden_path {
        Some(path) => GoldenExpectations::load(path)?,
        None => GoldenExpectations::default(),
    };

    let datasets = Arc::new(DatasetService::new(source, &config));

    // Warm the cache without delaying startup
    {
        let datasets = datasets.clone();
        tokio::spawn(async move {
            let dataset = datasets.current().await;
            tracing::info!(rows = dataset.len(), "Initial dataset ready");
        });
    }

    let state = routes::AppState {
        datasets,
        golden: Arc::new(golden),
    };
    let app = routes::app_router(state, Duration::from_secs(config.request_timeout_secs));

    // Initialize metrics
    metrics::init_metrics(config.metrics_port);

    // Start server
    let addr = SocketAddr::from(([0, 0, 0, 0], cli.port));
    tracing::info!("Vetpraxis API listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Shutdown complete");

    Ok(())
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!("Failed to listen for Ctrl+C: {e}");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!("Failed to install SIGTERM handler: {e}");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => tracing::info!("Received SIGINT, shutting down..."),
        _ = terminate => tracing::info!("Received SIGTERM, shutting down..."),
    }
}
