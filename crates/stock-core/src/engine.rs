//! The store engine: aggregation, insertion and id-based mutation over a
//! [`SheetStore`].
//!
//! Every public operation runs under the store-wide [`RequestGate`] and
//! returns the freshly aggregated collection on success. Validation and
//! layout problems are detected before anything is written.

use std::collections::HashMap;
use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::Mutex;
use std::time::Duration;

use crate::column::{default_header, Column, HeaderMap};
use crate::error::{Result, StockError};
use crate::event::StockEvent;
use crate::gate::{RequestGate, DEFAULT_LOCK_TIMEOUT};
use crate::identifier::{derive_id, is_blank_id};
use crate::item::{fold, parse_quantity, quantity_from_f64, ItemRef, NewItem, QuantityUpdate, StockItem};
use crate::sheet::{cell_at, Cell, SheetStore};

pub struct StockEngine {
    store: Box<dyn SheetStore>,
    gate: RequestGate,
    lock_timeout: Duration,
    events: Mutex<Option<Sender<StockEvent>>>,
}

/// Location of a matched row.
#[derive(Debug, Clone, PartialEq, Eq)]
struct RowHit {
    sheet: String,
    row: usize,
}

impl StockEngine {
    pub fn new(store: impl SheetStore + 'static) -> Self {
        Self {
            store: Box::new(store),
            gate: RequestGate::new(),
            lock_timeout: DEFAULT_LOCK_TIMEOUT,
            events: Mutex::new(None),
        }
    }

    pub fn with_lock_timeout(mut self, timeout: Duration) -> Self {
        self.lock_timeout = timeout;
        self
    }

    pub fn lock_timeout(&self) -> Duration {
        self.lock_timeout
    }

    pub fn gate(&self) -> &RequestGate {
        &self.gate
    }

    pub fn store(&self) -> &dyn SheetStore {
        self.store.as_ref()
    }

    /// Open the change event channel. Only one subscriber is supported;
    /// events raised before subscribing are not kept.
    pub fn subscribe(&self) -> Result<Receiver<StockEvent>> {
        let mut events = self
            .events
            .lock()
            .map_err(|e| StockError::Storage(e.to_string()))?;
        if events.is_some() {
            return Err(StockError::Storage("subscribe: already subscribed".to_string()));
        }
        let (tx, rx) = mpsc::channel();
        *events = Some(tx);
        Ok(rx)
    }

    fn emit(&self, event: StockEvent) {
        let Ok(mut events) = self.events.lock() else {
            return;
        };
        let disconnected = match events.as_ref() {
            Some(tx) => tx.send(event).is_err(),
            None => false,
        };
        if disconnected {
            tracing::debug!("event subscriber gone");
            *events = None;
        }
    }

    // ==================== Operations ====================

    /// Aggregated view over every partition.
    pub fn get_items(&self) -> Result<Vec<StockItem>> {
        let _guard = self.gate.acquire(self.lock_timeout)?;
        self.aggregate()
    }

    /// Insert one item into the partition named after its brand.
    pub fn add_item(&self, item: &NewItem) -> Result<Vec<StockItem>> {
        if item.marca.trim().is_empty() {
            tracing::warn!("addItem rejected: blank brand");
            return Err(StockError::validation("brand required to add an item"));
        }
        let id = item.effective_id();
        if id.is_empty() {
            tracing::warn!(marca = %item.marca, "addItem rejected: no usable id");
            return Err(StockError::validation(
                "item has no id; descriptive fields yield an empty identifier",
            ));
        }

        let _guard = self.gate.acquire(self.lock_timeout)?;
        self.check_layouts()?;

        let sheet = item.marca.as_str();
        let header = if self.store.has_sheet(sheet)? {
            self.ensure_header(sheet)?
        } else {
            self.create_partition(sheet)?
        };
        let columns = HeaderMap::resolve(&header, &Column::ALL, sheet)?;

        let rows = self.store.read_rows(sheet)?;
        let key = item.match_key();
        let duplicate = rows.iter().skip(1).any(|row| {
            Column::DESCRIPTIVE
                .iter()
                .zip(key.iter())
                .all(|(col, wanted)| {
                    columns
                        .get(*col)
                        .map(|idx| fold(&cell_at(row, idx).as_text()) == *wanted)
                        .unwrap_or(false)
                })
        });
        if duplicate {
            tracing::warn!(sheet, "addItem rejected: duplicate descriptive tuple");
            return Err(StockError::Duplicate {
                sheet: sheet.to_string(),
            });
        }

        let row = header
            .iter()
            .map(|h| match Column::from_header(&h.as_text()) {
                Some(Column::Id) => Cell::Text(id.clone()),
                Some(Column::Marca) => Cell::Text(item.marca.clone()),
                Some(Column::Modelo) => Cell::Text(item.modelo.clone()),
                Some(Column::Tamanho) => Cell::Text(item.tamanho.clone()),
                Some(Column::Cor) => Cell::Text(item.cor.clone()),
                Some(Column::Quantidade) => Cell::from(item.quantidade),
                None => Cell::Empty,
            })
            .collect();
        self.store.append_row(sheet, row)?;
        tracing::info!(sheet, id = %id, quantidade = item.quantidade, "item added");

        self.emit(StockEvent::Added {
            sheet: sheet.to_string(),
            item: StockItem {
                id,
                marca: item.marca.clone(),
                modelo: item.modelo.clone(),
                tamanho: item.tamanho.clone(),
                cor: item.cor.clone(),
                quantidade: item.quantidade,
            },
        });
        self.aggregate()
    }

    /// Overwrite the quantity of the row holding `update.id`.
    pub fn update_item(&self, update: &QuantityUpdate) -> Result<Vec<StockItem>> {
        let id = require_id(&update.id)?;

        let _guard = self.gate.acquire(self.lock_timeout)?;
        self.check_layouts()?;

        let hit = self.find_by_id_and_execute(id, |sheet, row, columns| {
            let col = columns.require(Column::Quantidade, sheet)?;
            self.store
                .update_cell(sheet, row, col, Cell::from(update.quantidade))
        })?;
        tracing::info!(sheet = %hit.sheet, row = hit.row, id, quantidade = update.quantidade, "quantity updated");

        self.emit(StockEvent::QuantityUpdated {
            sheet: hit.sheet,
            id: id.to_string(),
            quantidade: update.quantidade,
        });
        self.aggregate()
    }

    /// Remove the row holding `target.id`.
    pub fn delete_item(&self, target: &ItemRef) -> Result<Vec<StockItem>> {
        let id = require_id(&target.id)?;

        let _guard = self.gate.acquire(self.lock_timeout)?;
        self.check_layouts()?;

        let hit = self.find_by_id_and_execute(id, |sheet, row, _| self.store.delete_row(sheet, row))?;
        tracing::info!(sheet = %hit.sheet, row = hit.row, id, "item deleted");

        self.emit(StockEvent::Deleted {
            sheet: hit.sheet,
            id: id.to_string(),
        });
        self.aggregate()
    }

    // ==================== Internals ====================

    /// Merge every partition, summing quantities per id in first-seen order.
    fn aggregate(&self) -> Result<Vec<StockItem>> {
        let mut items: Vec<StockItem> = Vec::new();
        let mut index: HashMap<String, usize> = HashMap::new();

        for sheet in self.store.list_sheets()? {
            let rows = self.store.read_rows(&sheet)?;
            if rows.len() < 2 {
                continue;
            }
            let columns = HeaderMap::resolve(&rows[0], &Column::ALL, &sheet)?;

            for row in &rows[1..] {
                let Some(item) = parse_row(row, &columns) else {
                    continue;
                };
                match index.get(&item.id) {
                    Some(&pos) => {
                        let total = &mut items[pos].quantidade;
                        *total = total.saturating_add(item.quantidade);
                    }
                    None => {
                        index.insert(item.id.clone(), items.len());
                        items.push(item);
                    }
                }
            }
        }

        tracing::debug!(count = items.len(), "aggregated items");
        Ok(items)
    }

    /// Fail early if any populated partition lacks a required column.
    fn check_layouts(&self) -> Result<()> {
        for sheet in self.store.list_sheets()? {
            let rows = self.store.read_rows(&sheet)?;
            if rows.len() >= 2 {
                HeaderMap::resolve(&rows[0], &Column::ALL, &sheet)?;
            }
        }
        Ok(())
    }

    /// Create a partition for a new brand and write its header row.
    ///
    /// The layout is copied from the first partition when it has a header,
    /// otherwise the default layout is used. The layout is validated before
    /// the partition is created.
    fn create_partition(&self, sheet: &str) -> Result<Vec<Cell>> {
        let template = match self.store.list_sheets()?.first() {
            Some(first) => self.store.read_rows(first)?.into_iter().next(),
            None => None,
        };
        let header = template
            .filter(|row| !row.is_empty())
            .unwrap_or_else(default_header);
        HeaderMap::resolve(&header, &Column::ALL, sheet)?;

        self.store.create_sheet_with_header(sheet, header.clone())?;
        tracing::info!(sheet, "partition created");
        self.emit(StockEvent::PartitionCreated(sheet.to_string()));
        Ok(header)
    }

    /// Header row of an existing partition, writing the default one if empty.
    fn ensure_header(&self, sheet: &str) -> Result<Vec<Cell>> {
        if let Some(header) = self.store.read_rows(sheet)?.into_iter().next() {
            return Ok(header);
        }
        let header = default_header();
        self.store.append_row(sheet, header.clone())?;
        tracing::debug!(sheet, "default header written to empty partition");
        Ok(header)
    }

    /// Locate the row whose stored id equals `id` and run `action` on it.
    ///
    /// Partitions are scanned in order and rows from last to first; the
    /// first hit wins and no other row is touched.
    fn find_by_id_and_execute<F>(&self, id: &str, action: F) -> Result<RowHit>
    where
        F: FnOnce(&str, usize, &HeaderMap) -> Result<()>,
    {
        for sheet in self.store.list_sheets()? {
            let rows = self.store.read_rows(&sheet)?;
            if rows.len() < 2 {
                continue;
            }
            let columns = HeaderMap::from_row(&rows[0]);
            let id_col = columns.require(Column::Id, &sheet)?;

            let found = (1..rows.len())
                .rev()
                .find(|&j| cell_at(&rows[j], id_col).as_text().trim() == id);
            if let Some(row) = found {
                tracing::debug!(sheet = %sheet, row, id, "row located");
                action(&sheet, row, &columns)?;
                return Ok(RowHit { sheet, row });
            }
        }
        Err(StockError::ItemNotFound(id.to_string()))
    }
}

fn require_id(id: &str) -> Result<&str> {
    if is_blank_id(id) {
        tracing::warn!("request rejected: item has no id");
        return Err(StockError::validation("item has no id; cannot perform the operation"));
    }
    Ok(id.trim())
}

/// Parse one data row; rows with a blank brand are skipped.
fn parse_row(row: &[Cell], columns: &HeaderMap) -> Option<StockItem> {
    let text = |col: Column| {
        columns
            .get(col)
            .map(|idx| cell_at(row, idx).as_text())
            .unwrap_or_default()
    };

    let marca_idx = columns.get(Column::Marca)?;
    if cell_at(row, marca_idx).is_blank() {
        return None;
    }

    let marca = text(Column::Marca);
    let modelo = text(Column::Modelo);
    let tamanho = text(Column::Tamanho);
    let cor = text(Column::Cor);

    let stored_id = text(Column::Id);
    let id = if is_blank_id(&stored_id) {
        derive_id(&marca, &modelo, &tamanho, &cor)
    } else {
        stored_id.trim().to_string()
    };
    if id.is_empty() {
        return None;
    }

    let quantidade = match columns.get(Column::Quantidade).map(|idx| cell_at(row, idx)) {
        Some(Cell::Number(n)) => quantity_from_f64(*n),
        Some(Cell::Text(s)) => parse_quantity(s),
        _ => 0,
    };

    Some(StockItem {
        id,
        marca,
        modelo,
        tamanho,
        cor,
        quantidade,
    })
}
