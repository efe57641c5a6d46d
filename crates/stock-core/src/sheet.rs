//! Partition ("sheet") storage.
//!
//! The engine only sees the [`SheetStore`] surface: list, create, read all
//! rows, append a row, overwrite one cell, delete one row. Row 0 of every
//! non-empty partition is its header.

use std::fmt;
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};

use crate::error::{Result, StockError};

/// A single cell value.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum Cell {
    #[default]
    Empty,
    Number(f64),
    Text(String),
}

impl Cell {
    /// Text rendering of the cell; empty cells render as `""` and integral
    /// numbers without a fractional part.
    pub fn as_text(&self) -> String {
        match self {
            Cell::Empty => String::new(),
            Cell::Number(n) if n.fract() == 0.0 && n.is_finite() => format!("{}", *n as i64),
            Cell::Number(n) => n.to_string(),
            Cell::Text(s) => s.clone(),
        }
    }

    pub fn is_blank(&self) -> bool {
        match self {
            Cell::Empty => true,
            Cell::Number(_) => false,
            Cell::Text(s) => s.trim().is_empty(),
        }
    }
}

impl fmt::Display for Cell {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.as_text())
    }
}

impl From<&str> for Cell {
    fn from(s: &str) -> Self {
        Cell::Text(s.to_string())
    }
}

impl From<String> for Cell {
    fn from(s: String) -> Self {
        Cell::Text(s)
    }
}

impl From<u64> for Cell {
    fn from(n: u64) -> Self {
        Cell::Number(n as f64)
    }
}

/// Cell at `idx`, or an empty cell for short rows.
pub fn cell_at(row: &[Cell], idx: usize) -> &Cell {
    const EMPTY: &Cell = &Cell::Empty;
    row.get(idx).unwrap_or(EMPTY)
}

/// A named partition: header row plus data rows.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sheet {
    pub name: String,
    pub rows: Vec<Vec<Cell>>,
}

impl Sheet {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: Vec::new(),
        }
    }

    pub fn with_rows(name: impl Into<String>, rows: Vec<Vec<Cell>>) -> Self {
        Self {
            name: name.into(),
            rows,
        }
    }
}

/// The external tabular store the engine persists through.
pub trait SheetStore: Send + Sync {
    /// Partition names in store order.
    fn list_sheets(&self) -> Result<Vec<String>>;

    /// Create an empty partition at the end of the store order.
    fn create_sheet(&self, name: &str) -> Result<()>;

    /// Create a partition whose first row is `header`. On failure neither
    /// the partition nor the row exists.
    fn create_sheet_with_header(&self, name: &str, header: Vec<Cell>) -> Result<()>;

    /// All rows of a partition, header first. Empty partitions return no rows.
    fn read_rows(&self, name: &str) -> Result<Vec<Vec<Cell>>>;

    /// Append one row after the last row.
    fn append_row(&self, name: &str, row: Vec<Cell>) -> Result<()>;

    /// Overwrite a single cell. `row` counts the header as row 0.
    fn update_cell(&self, name: &str, row: usize, col: usize, value: Cell) -> Result<()>;

    /// Remove one row, shifting later rows up. `row` counts the header as row 0.
    fn delete_row(&self, name: &str, row: usize) -> Result<()>;

    /// Whether a partition with exactly this name exists.
    fn has_sheet(&self, name: &str) -> Result<bool> {
        Ok(self.list_sheets()?.iter().any(|s| s == name))
    }
}

impl<T: SheetStore + ?Sized> SheetStore for Arc<T> {
    fn list_sheets(&self) -> Result<Vec<String>> {
        (**self).list_sheets()
    }

    fn create_sheet(&self, name: &str) -> Result<()> {
        (**self).create_sheet(name)
    }

    fn create_sheet_with_header(&self, name: &str, header: Vec<Cell>) -> Result<()> {
        (**self).create_sheet_with_header(name, header)
    }

    fn read_rows(&self, name: &str) -> Result<Vec<Vec<Cell>>> {
        (**self).read_rows(name)
    }

    fn append_row(&self, name: &str, row: Vec<Cell>) -> Result<()> {
        (**self).append_row(name, row)
    }

    fn update_cell(&self, name: &str, row: usize, col: usize, value: Cell) -> Result<()> {
        (**self).update_cell(name, row, col, value)
    }

    fn delete_row(&self, name: &str, row: usize) -> Result<()> {
        (**self).delete_row(name, row)
    }
}

/// In-memory [`SheetStore`].
#[derive(Debug, Default)]
pub struct MemorySheetStore {
    sheets: Mutex<Vec<Sheet>>,
}

impl MemorySheetStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Seed the store with existing partitions, kept in the given order.
    pub fn with_sheets(sheets: Vec<Sheet>) -> Self {
        Self {
            sheets: Mutex::new(sheets),
        }
    }

    /// Copy of every partition, for inspection.
    pub fn snapshot(&self) -> Result<Vec<Sheet>> {
        Ok(self.lock()?.clone())
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Sheet>>> {
        self.sheets
            .lock()
            .map_err(|e| StockError::Storage(format!("Mutex poisoned: {}", e)))
    }

    fn with_sheet<T>(&self, name: &str, f: impl FnOnce(&mut Sheet) -> Result<T>) -> Result<T> {
        let mut sheets = self.lock()?;
        let sheet = sheets
            .iter_mut()
            .find(|s| s.name == name)
            .ok_or_else(|| StockError::SheetNotFound(name.to_string()))?;
        f(sheet)
    }
}

impl SheetStore for MemorySheetStore {
    fn list_sheets(&self) -> Result<Vec<String>> {
        Ok(self.lock()?.iter().map(|s| s.name.clone()).collect())
    }

    fn create_sheet(&self, name: &str) -> Result<()> {
        let mut sheets = self.lock()?;
        if sheets.iter().any(|s| s.name == name) {
            return Err(StockError::Storage(format!("sheet already exists: {}", name)));
        }
        sheets.push(Sheet::new(name));
        Ok(())
    }

    fn create_sheet_with_header(&self, name: &str, header: Vec<Cell>) -> Result<()> {
        let mut sheets = self.lock()?;
        if sheets.iter().any(|s| s.name == name) {
            return Err(StockError::Storage(format!("sheet already exists: {}", name)));
        }
        sheets.push(Sheet::with_rows(name, vec![header]));
        Ok(())
    }

    fn read_rows(&self, name: &str) -> Result<Vec<Vec<Cell>>> {
        self.with_sheet(name, |sheet| Ok(sheet.rows.clone()))
    }

    fn append_row(&self, name: &str, row: Vec<Cell>) -> Result<()> {
        self.with_sheet(name, |sheet| {
            sheet.rows.push(row);
            Ok(())
        })
    }

    fn update_cell(&self, name: &str, row: usize, col: usize, value: Cell) -> Result<()> {
        self.with_sheet(name, |sheet| {
            let target = sheet.rows.get_mut(row).ok_or_else(|| {
                StockError::Storage(format!("row {} out of range in sheet {}", row, name))
            })?;
            if target.len() <= col {
                target.resize(col + 1, Cell::Empty);
            }
            target[col] = value;
            Ok(())
        })
    }

    fn delete_row(&self, name: &str, row: usize) -> Result<()> {
        self.with_sheet(name, |sheet| {
            if row >= sheet.rows.len() {
                return Err(StockError::Storage(format!(
                    "row {} out of range in sheet {}",
                    row, name
                )));
            }
            sheet.rows.remove(row);
            Ok(())
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn row(cells: &[&str]) -> Vec<Cell> {
        cells.iter().map(|c| Cell::from(*c)).collect()
    }

    #[test]
    fn cell_text_rendering() {
        assert_eq!(Cell::Empty.as_text(), "");
        assert_eq!(Cell::Number(42.0).as_text(), "42");
        assert_eq!(Cell::Number(2.5).as_text(), "2.5");
        assert_eq!(Cell::from("Preto").as_text(), "Preto");
    }

    #[test]
    fn cell_blankness() {
        assert!(Cell::Empty.is_blank());
        assert!(Cell::from("   ").is_blank());
        assert!(!Cell::Number(0.0).is_blank());
        assert!(!Cell::from("x").is_blank());
    }

    #[test]
    fn cell_serde_is_untagged() {
        let cells = vec![Cell::Empty, Cell::Number(3.0), Cell::from("Nike")];
        let json = serde_json::to_string(&cells).unwrap();
        assert_eq!(json, r#"[null,3.0,"Nike"]"#);
        let back: Vec<Cell> = serde_json::from_str(&json).unwrap();
        assert_eq!(back, cells);
    }

    #[test]
    fn create_keeps_order_and_rejects_duplicates() {
        let store = MemorySheetStore::new();
        store.create_sheet("Nike").unwrap();
        store.create_sheet("Adidas").unwrap();
        assert_eq!(store.list_sheets().unwrap(), ["Nike", "Adidas"]);
        assert!(store.create_sheet("Nike").is_err());
        assert!(store.has_sheet("Adidas").unwrap());
        assert!(!store.has_sheet("adidas").unwrap());
    }

    #[test]
    fn create_with_header_writes_first_row() {
        let store = MemorySheetStore::new();
        store.create_sheet_with_header("Nike", row(&["ID", "MARCA"])).unwrap();
        assert_eq!(store.read_rows("Nike").unwrap(), vec![row(&["ID", "MARCA"])]);

        assert!(store.create_sheet_with_header("Nike", row(&["x"])).is_err());
        assert_eq!(store.snapshot().unwrap().len(), 1);
        assert_eq!(store.read_rows("Nike").unwrap().len(), 1);
    }

    #[test]
    fn append_update_delete() {
        let store = MemorySheetStore::new();
        store.create_sheet("Nike").unwrap();
        store.append_row("Nike", row(&["ID", "QUANTIDADE"])).unwrap();
        store.append_row("Nike", row(&["a", "1"])).unwrap();
        store.append_row("Nike", row(&["b", "2"])).unwrap();

        store.update_cell("Nike", 2, 1, Cell::Number(9.0)).unwrap();
        store.delete_row("Nike", 1).unwrap();

        let rows = store.read_rows("Nike").unwrap();
        assert_eq!(rows.len(), 2);
        assert_eq!(rows[1], vec![Cell::from("b"), Cell::Number(9.0)]);
    }

    #[test]
    fn update_cell_extends_short_rows() {
        let store = MemorySheetStore::with_sheets(vec![Sheet::with_rows("S", vec![row(&["a"])])]);
        store.update_cell("S", 0, 3, Cell::from("x")).unwrap();
        let rows = store.read_rows("S").unwrap();
        assert_eq!(rows[0].len(), 4);
        assert_eq!(rows[0][3], Cell::from("x"));
    }

    #[test]
    fn missing_sheet_and_row_are_errors() {
        let store = MemorySheetStore::new();
        assert!(matches!(
            store.read_rows("Nope").unwrap_err(),
            StockError::SheetNotFound(_)
        ));
        store.create_sheet("S").unwrap();
        assert!(matches!(
            store.delete_row("S", 0).unwrap_err(),
            StockError::Storage(_)
        ));
    }
}
