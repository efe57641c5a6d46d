//! stock-client: client façade for the stock inventory API.
//!
//! One request per user action (refresh, add, update, delete); every
//! successful response replaces the local collection with the backend's
//! aggregated view.

pub mod client;
pub mod error;
pub mod transport;

pub use client::{sort_by_brand, ItemForm, StockClient};
pub use error::ClientError;
pub use transport::{decode_response, HttpTransport, Transport};
