//! stock-core: store engine for the stock inventory service.
//!
//! Items are kept in partitions ("sheets"), one per brand. The visible
//! collection is computed on read by merging every partition and summing
//! quantities per identifier. Writes locate rows by identifier (update,
//! delete) or by descriptive tuple (duplicate check on add), all under one
//! store-wide request gate.

pub mod action;
pub mod column;
pub mod config;
pub mod engine;
pub mod error;
pub mod event;
pub mod gate;
pub mod identifier;
pub mod item;
pub mod sheet;

#[cfg(feature = "sqlite")]
pub mod sqlite_store;

pub use action::{dispatch, handle, ApiAction, ApiPayload, ApiResponse, ServiceStatus};
pub use column::{Column, HeaderMap};
pub use config::{ConfigError, LockConfig, ServerConfig, StockConfig, StoreBackend, StoreConfig};
pub use engine::StockEngine;
pub use error::{ErrorCode, Result, StockError};
pub use event::StockEvent;
pub use gate::{GateGuard, RequestGate, DEFAULT_LOCK_TIMEOUT};
pub use identifier::derive_id;
pub use item::{parse_quantity, ItemRef, NewItem, QuantityUpdate, StockItem};
pub use sheet::{Cell, MemorySheetStore, Sheet, SheetStore};

#[cfg(feature = "sqlite")]
pub use sqlite_store::SqliteSheetStore;
