//! Stock Server Binary
//!
//! Standalone server for the stock inventory API.

use std::sync::Arc;

use stock_core::StockConfig;
use stock_server::{serve, AppState, ServerError};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<(), ServerError> {
    // Initialize logging
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let mut config = match std::env::var("STOCK_CONFIG") {
        Ok(path) => {
            let text = std::fs::read_to_string(&path)?;
            StockConfig::from_toml(&text).map_err(|e| {
                stock_core::ConfigError::InvalidValue(format!("{}: {}", path, e))
            })?
        }
        Err(_) => StockConfig::default(),
    };
    config.apply_env()?;

    let state = Arc::new(AppState::from_config(&config)?);
    serve(&config.server.addr, state).await
}
