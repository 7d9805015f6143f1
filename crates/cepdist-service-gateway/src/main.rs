//! Public gateway HTTP microservice.
//!
//! # Configuration
//!
//! - `DATABASE_URL` - SQLite file for cache, history and users (default: addresses.db)
//! - `SERVICE_PORT` - HTTP port (default: 8000)
//! - `SECONDARY_API_URL` - Calculator base URL (default: http://api-secundaria:5000)
//! - `VIACEP_BASE_URL` - ViaCEP base URL (default: https://viacep.com.br)
//! - `UPSTREAM_TIMEOUT_SECS` - Outbound call deadline (default: 10)
//! - `ADDRESS_CACHE_TTL_DAYS` - CEP cache lifetime (default: 30)
//! - `RUST_LOG`, `LOG_FORMAT`, `METRICS_ENABLED` - see the shared crate

use std::net::SocketAddr;

use tracing::{error, info};

use cepdist_lib::Database;
use cepdist_service_gateway::{GatewayConfig, GatewayState, SERVICE_NAME, router};
use cepdist_service_shared::{LoggingConfig, MetricsConfig, init_logging, init_metrics};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let logging_config = LoggingConfig::from_env().with_service(SERVICE_NAME);
    init_logging(&logging_config);

    let metrics_config = MetricsConfig::from_env();
    if let Err(e) = init_metrics(&metrics_config) {
        tracing::warn!(error = %e, "failed to initialize metrics, continuing without metrics");
    }

    let config = GatewayConfig::from_env();
    info!(
        database = %config.database_url,
        port = config.port,
        calculator = %config.calculator_url,
        viacep = %config.viacep_url,
        timeout_secs = config.upstream_timeout.as_secs(),
        "starting gateway service"
    );

    let database = Database::open(&config.database_url).map_err(|e| {
        error!(error = %e, path = %config.database_url, "failed to open database");
        e
    })?;
    let state = GatewayState::new(database, &config)?;

    let app = router(state);

    let addr = SocketAddr::from(([0, 0, 0, 0], config.port));
    info!(addr = %addr, "listening on");

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}
