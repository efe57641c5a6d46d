use serde::{Deserialize, Serialize};

use crate::item::StockItem;

/// Events emitted by the store engine after a mutation is persisted.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StockEvent {
    PartitionCreated(String),
    Added {
        sheet: String,
        item: StockItem,
    },
    QuantityUpdated {
        sheet: String,
        id: String,
        quantidade: u64,
    },
    Deleted {
        sheet: String,
        id: String,
    },
}
