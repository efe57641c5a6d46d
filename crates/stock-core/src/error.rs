//! Error types for stock-core

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for stock operations
pub type Result<T> = std::result::Result<T, StockError>;

/// Main error type for store engine operations
#[derive(Error, Debug)]
pub enum StockError {
    /// A required field was blank (brand on add, id on update/delete)
    #[error("{0}")]
    Validation(String),

    /// A partition header is missing one of the fixed column names
    #[error("column \"{column}\" not found in sheet \"{sheet}\"; check the sheet headers")]
    ColumnNotFound { column: String, sheet: String },

    /// No partition holds a row with this id
    #[error("item with id '{0}' not found; try refreshing")]
    ItemNotFound(String),

    /// The descriptive tuple already exists in the target partition
    #[error("item (marca, modelo, tamanho, cor) already exists in sheet '{sheet}'; use edit to change the quantity")]
    Duplicate { sheet: String },

    /// The request gate could not be acquired in time
    #[error("store busy: lock not acquired after {waited_ms} ms")]
    LockTimeout { waited_ms: u64 },

    /// The action name is not part of the protocol
    #[error("unknown action: {0}")]
    UnknownAction(String),

    /// The request payload could not be decoded
    #[error("invalid payload: {0}")]
    InvalidPayload(String),

    /// A partition addressed by name does not exist
    #[error("sheet not found: {0}")]
    SheetNotFound(String),

    /// Backend failure
    #[error("storage error: {0}")]
    Storage(String),
}

/// Coarse classification of [`StockError`], carried on the wire
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorCode {
    Validation,
    Lookup,
    Conflict,
    Timeout,
    Storage,
    Protocol,
}

impl StockError {
    pub fn validation(msg: impl Into<String>) -> Self {
        StockError::Validation(msg.into())
    }

    /// Error class as reported to clients.
    pub fn code(&self) -> ErrorCode {
        match self {
            StockError::Validation(_) => ErrorCode::Validation,
            StockError::ColumnNotFound { .. }
            | StockError::ItemNotFound(_)
            | StockError::SheetNotFound(_) => ErrorCode::Lookup,
            StockError::Duplicate { .. } => ErrorCode::Conflict,
            StockError::LockTimeout { .. } => ErrorCode::Timeout,
            StockError::UnknownAction(_) | StockError::InvalidPayload(_) => ErrorCode::Protocol,
            StockError::Storage(_) => ErrorCode::Storage,
        }
    }
}

#[cfg(feature = "sqlite")]
impl From<rusqlite::Error> for StockError {
    fn from(e: rusqlite::Error) -> Self {
        StockError::Storage(e.to_string())
    }
}

impl From<serde_json::Error> for StockError {
    fn from(e: serde_json::Error) -> Self {
        StockError::InvalidPayload(e.to_string())
    }
}
