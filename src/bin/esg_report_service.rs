//! ESG Reporting Service Binary
//!
//! Runs the ESG reporting API with:
//! - Structured JSON logging
//! - Request tracing with correlation IDs
//! - Graceful shutdown handling
//! - Health check endpoints
//!
//! ## Configuration
//!
//! Environment variables:
//! - `DATABASE_URL`: PostgreSQL connection string (default: postgresql://localhost/esg)
//! - `PORT`: Service port (default: 5000)
//! - `HOST`: Service host (default: 0.0.0.0)
//! - `RUST_LOG`: Log level filter (default: info)
//! - `LOG_FORMAT`: "json" for structured logs, "pretty" for development (default: json)
//! - `REPORT_DIR`, `BATCH_MAX_ATTEMPTS`, `BATCH_RETRY_DELAY_MS`, `CORS_ALLOWED_ORIGIN`:
//!   see [`esg_reporting::ServiceConfig`]
//!
//! ## Usage
//!
//! ```bash
//! DATABASE_URL=postgresql://... cargo run --bin esg_report_service
//! ```

use std::net::SocketAddr;
use std::time::{Duration, Instant};

use tokio::net::TcpListener;
use tracing::{error, info};
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use esg_reporting::service::{create_app, ServiceState};
use esg_reporting::{LogFormat, PostgresEsgStore, ServiceConfig};

/// Initialize the tracing subscriber with JSON or pretty format
fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        "esg_report_service=info,esg_reporting=info,tower_http=info,sqlx=warn".into()
    });

    match format {
        LogFormat::Pretty => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .with_target(true)
                        .with_span_events(FmtSpan::CLOSE),
                )
                .init();
        }
        LogFormat::Json => {
            tracing_subscriber::registry()
                .with(filter)
                .with(
                    fmt::layer()
                        .json()
                        .with_target(true)
                        .with_current_span(true)
                        .with_span_events(FmtSpan::CLOSE)
                        .flatten_event(true),
                )
                .init();
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let config = ServiceConfig::from_env();
    init_tracing(config.log_format);

    let version = env!("CARGO_PKG_VERSION");
    let build_sha = option_env!("BUILD_SHA").unwrap_or("dev");

    info!(
        version = version,
        build_sha = build_sha,
        "Starting ESG Reporting Service"
    );

    // Connect to PostgreSQL with timeout
    info!("Connecting to PostgreSQL...");
    let connect_start = Instant::now();

    let store = match tokio::time::timeout(Duration::from_secs(30), PostgresEsgStore::from_env())
        .await
    {
        Ok(Ok(store)) => store,
        Ok(Err(e)) => {
            error!(error = %e, "Failed to connect to PostgreSQL");
            return Err(e.into());
        }
        Err(_) => {
            error!("PostgreSQL connection timeout after 30s");
            return Err("Database connection timeout".into());
        }
    };

    let pool = store.pool_stats();
    info!(
        latency_ms = connect_start.elapsed().as_millis() as u64,
        pool_size = pool.size,
        pool_idle = pool.idle,
        pool_max = pool.max,
        "PostgreSQL connection established"
    );

    store.ensure_schema().await?;

    info!(
        report_dir = %config.report_dir.display(),
        max_attempts = config.retry.max_attempts,
        retry_delay_ms = config.retry.delay.as_millis() as u64,
        "Service configured"
    );

    let addr: SocketAddr = config.bind_address().parse()?;
    let state = ServiceState::new(store, config);
    let app = create_app(state);

    info!(
        address = %addr,
        version = version,
        "ESG Reporting Service listening"
    );

    let listener = TcpListener::bind(addr).await?;

    // Graceful shutdown handling
    let shutdown_signal = async {
        let ctrl_c = async {
            if let Err(e) = tokio::signal::ctrl_c().await {
                error!(error = %e, "Failed to install Ctrl+C handler");
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
                    error!(error = %e, "Failed to install SIGTERM handler");
                    std::future::pending::<()>().await;
                }
            }
        };

        #[cfg(not(unix))]
        let terminate = std::future::pending::<()>();

        tokio::select! {
            _ = ctrl_c => info!("Received Ctrl+C, initiating graceful shutdown"),
            _ = terminate => info!("Received SIGTERM, initiating graceful shutdown"),
        }
    };

    info!("Ready to accept connections");

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal)
        .await?;

    info!("ESG Reporting Service shutdown complete");

    Ok(())
}
