//! Distance calculator HTTP microservice.
//!
//! # Configuration
//!
//! - `DATABASE_URL` - SQLite file (default: distance_calculations.db)
//! - `SERVICE_PORT` - HTTP port (default: 5000)
//! - `RUST_LOG` - Log level (default: info)
//! - `LOG_FORMAT` - Log format: json (default) or text
//! - `METRICS_ENABLED` - Set to `false` to disable Prometheus metrics

use std::net::SocketAddr;

use tracing::{error, info};

use cepdist_lib::Database;
use cepdist_service_calculator::{CalculatorConfig, CalculatorState, SERVICE_NAME, router};
use cepdist_service_shared::{LoggingConfig, MetricsConfig, init_logging, init_metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env().with_service(SERVICE_NAME);
    init_logging(&logging_config);

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        // Log but don't fail - metrics are optional
        tracing::warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let config = CalculatorConfig::from_env();
    info!(database = %config.database_url, port = config.port, "starting calculator service");

    let database = Database::open(&config.database_url).map_err(|e| {
        error!(error = %e, path = %config.database_url, "failed to open database");
        e
    })?;
    let state = CalculatorState::new(database)?;

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(addr = %addr, "listening on");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
