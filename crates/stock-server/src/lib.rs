//! Stock Server - inventory action API
//!
//! Hosts the stock-core action protocol over HTTP.

pub mod http;

use std::sync::Arc;

use axum::{
    routing::{get, post},
    Router,
};
use thiserror::Error;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;

use stock_core::{ConfigError, MemorySheetStore, StockConfig, StockEngine, StockError, StoreBackend};

/// Errors raised while starting the server
#[derive(Error, Debug)]
pub enum ServerError {
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("store error: {0}")]
    Store(#[from] StockError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Shared application state
pub struct AppState {
    pub engine: StockEngine,
}

impl AppState {
    pub fn new(engine: StockEngine) -> Self {
        Self { engine }
    }

    /// In-memory store with the default gate timeout
    pub fn in_memory() -> Self {
        Self::new(StockEngine::new(MemorySheetStore::new()))
    }

    /// Open the store described by the configuration
    pub fn from_config(config: &StockConfig) -> Result<Self, ServerError> {
        config.validate()?;
        let engine = match config.store.backend {
            StoreBackend::Memory => StockEngine::new(MemorySheetStore::new()),
            #[cfg(feature = "sqlite")]
            StoreBackend::Sqlite => {
                let path = config
                    .store
                    .path
                    .as_ref()
                    .ok_or_else(|| ConfigError::MissingField("store.path".to_string()))?;
                tracing::info!("Opening sqlite store at {:?}", path);
                StockEngine::new(stock_core::SqliteSheetStore::open(path)?)
            }
            #[cfg(not(feature = "sqlite"))]
            StoreBackend::Sqlite => {
                return Err(ConfigError::InvalidValue(
                    "sqlite backend not compiled in".to_string(),
                )
                .into())
            }
        };
        Ok(Self::new(engine.with_lock_timeout(config.lock.timeout())))
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::in_memory()
    }
}

/// Create the API router
pub fn create_router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(http::status).post(http::exec_form))
        .route("/exec", get(http::status).post(http::exec_form))
        .route("/api", post(http::exec_json))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Start the server
pub async fn serve(addr: &str, state: Arc<AppState>) -> Result<(), ServerError> {
    let app = create_router(state);
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!("Stock server listening on {}", addr);
    axum::serve(listener, app).await?;
    Ok(())
}
