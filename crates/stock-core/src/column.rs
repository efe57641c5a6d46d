//! Fixed column vocabulary and header resolution.
//!
//! Partitions are addressed by header name, never by fixed position: a
//! [`HeaderMap`] is built from a partition's header row once per access and
//! maps each canonical column to its index.

use std::fmt;

use crate::error::{Result, StockError};
use crate::sheet::Cell;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    Id,
    Marca,
    Modelo,
    Tamanho,
    Cor,
    Quantidade,
}

impl Column {
    /// Canonical order, also the default header layout.
    pub const ALL: [Column; 6] = [
        Column::Id,
        Column::Marca,
        Column::Modelo,
        Column::Tamanho,
        Column::Cor,
        Column::Quantidade,
    ];

    /// The four descriptive columns that make up an item's identity.
    pub const DESCRIPTIVE: [Column; 4] = [Column::Marca, Column::Modelo, Column::Tamanho, Column::Cor];

    pub fn label(self) -> &'static str {
        match self {
            Column::Id => "ID",
            Column::Marca => "MARCA",
            Column::Modelo => "MODELO",
            Column::Tamanho => "TAMANHO",
            Column::Cor => "COR",
            Column::Quantidade => "QUANTIDADE",
        }
    }

    /// Classify a header cell (trimmed, case-insensitive).
    pub fn from_header(header: &str) -> Option<Column> {
        let wanted = header.trim();
        Column::ALL
            .into_iter()
            .find(|c| c.label().eq_ignore_ascii_case(wanted))
    }

    fn slot(self) -> usize {
        self as usize
    }
}

impl fmt::Display for Column {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// Header row written into a partition created with no layout to copy.
pub fn default_header() -> Vec<Cell> {
    Column::ALL
        .iter()
        .map(|c| Cell::Text(c.label().to_string()))
        .collect()
}

/// Canonical column → position lookup for one partition.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct HeaderMap {
    positions: [Option<usize>; 6],
}

impl HeaderMap {
    /// Index every recognised header. On repeated names the first wins.
    pub fn from_row(header: &[Cell]) -> Self {
        let mut positions = [None; 6];
        for (idx, cell) in header.iter().enumerate() {
            if let Some(col) = Column::from_header(&cell.as_text()) {
                positions[col.slot()].get_or_insert(idx);
            }
        }
        Self { positions }
    }

    /// Build the map and require every column in `required`.
    pub fn resolve(header: &[Cell], required: &[Column], sheet: &str) -> Result<Self> {
        let map = Self::from_row(header);
        for col in required {
            map.require(*col, sheet)?;
        }
        Ok(map)
    }

    pub fn get(&self, col: Column) -> Option<usize> {
        self.positions[col.slot()]
    }

    pub fn require(&self, col: Column, sheet: &str) -> Result<usize> {
        self.get(col).ok_or_else(|| StockError::ColumnNotFound {
            column: col.label().to_string(),
            sheet: sheet.to_string(),
        })
    }
}
