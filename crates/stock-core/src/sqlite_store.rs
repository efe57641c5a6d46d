use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use rusqlite::{params, Connection, OptionalExtension};

use crate::error::{Result, StockError};
use crate::sheet::{Cell, SheetStore};

/// SQLite-backed implementation of the SheetStore trait.
///
/// Partition order is creation order; row order is insertion order, with
/// row positions computed on read so deletes never renumber anything.
pub struct SqliteSheetStore {
    conn: Mutex<Connection>,
}

impl SqliteSheetStore {
    /// Open (or create) a database at the given path.
    pub fn open(path: &Path) -> Result<Self> {
        let conn =
            Connection::open(path).map_err(|e| StockError::Storage(format!("open: {}", e)))?;
        Self::init_with_connection(conn)
    }

    /// Create an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| StockError::Storage(format!("open_in_memory: {}", e)))?;
        Self::init_with_connection(conn)
    }

    fn init_with_connection(conn: Connection) -> Result<Self> {
        Self::init_schema(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute_batch(
            "
            PRAGMA foreign_keys = ON;

            CREATE TABLE IF NOT EXISTS sheets (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                name TEXT NOT NULL UNIQUE
            );

            CREATE TABLE IF NOT EXISTS sheet_rows (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                sheet_id INTEGER NOT NULL REFERENCES sheets(id) ON DELETE CASCADE,
                cells TEXT NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_sheet_rows_sheet ON sheet_rows(sheet_id, id);
            ",
        )
        .map_err(|e| StockError::Storage(format!("init_schema: {}", e)))?;
        Ok(())
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| StockError::Storage(e.to_string()))
    }

    fn sheet_id(conn: &Connection, name: &str) -> Result<i64> {
        conn.query_row(
            "SELECT id FROM sheets WHERE name = ?1",
            params![name],
            |row| row.get(0),
        )
        .optional()?
        .ok_or_else(|| StockError::SheetNotFound(name.to_string()))
    }

    /// Storage id of the `row`-th row (0 = header) of a partition.
    fn row_id(conn: &Connection, sheet_id: i64, name: &str, row: usize) -> Result<i64> {
        conn.query_row(
            "SELECT id FROM sheet_rows WHERE sheet_id = ?1 ORDER BY id LIMIT 1 OFFSET ?2",
            params![sheet_id, row as i64],
            |r| r.get(0),
        )
        .optional()?
        .ok_or_else(|| StockError::Storage(format!("row {} out of range in sheet {}", row, name)))
    }

    /// Insert a partition row, returning its storage id.
    fn insert_sheet(conn: &Connection, name: &str) -> Result<i64> {
        match conn.execute("INSERT INTO sheets (name) VALUES (?1)", params![name]) {
            Ok(_) => Ok(conn.last_insert_rowid()),
            Err(rusqlite::Error::SqliteFailure(err, _))
                if err.code == rusqlite::ErrorCode::ConstraintViolation =>
            {
                Err(StockError::Storage(format!("sheet already exists: {}", name)))
            }
            Err(e) => Err(e.into()),
        }
    }

    fn encode(row: &[Cell]) -> Result<String> {
        serde_json::to_string(row).map_err(|e| StockError::Storage(format!("encode row: {}", e)))
    }

    fn decode(cells: &str) -> Result<Vec<Cell>> {
        serde_json::from_str(cells).map_err(|e| StockError::Storage(format!("decode row: {}", e)))
    }
}

impl SheetStore for SqliteSheetStore {
    fn list_sheets(&self) -> Result<Vec<String>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare("SELECT name FROM sheets ORDER BY id")?;
        let names = stmt
            .query_map([], |row| row.get(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        Ok(names)
    }

    fn create_sheet(&self, name: &str) -> Result<()> {
        let conn = self.conn()?;
        Self::insert_sheet(&conn, name)?;
        Ok(())
    }

    fn create_sheet_with_header(&self, name: &str, header: Vec<Cell>) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;
        let sheet_id = Self::insert_sheet(&tx, name)?;
        tx.execute(
            "INSERT INTO sheet_rows (sheet_id, cells) VALUES (?1, ?2)",
            params![sheet_id, Self::encode(&header)?],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn read_rows(&self, name: &str) -> Result<Vec<Vec<Cell>>> {
        let conn = self.conn()?;
        let sheet_id = Self::sheet_id(&conn, name)?;
        let mut stmt = conn.prepare("SELECT cells FROM sheet_rows WHERE sheet_id = ?1 ORDER BY id")?;
        let raw = stmt
            .query_map(params![sheet_id], |row| row.get::<_, String>(0))?
            .collect::<std::result::Result<Vec<String>, _>>()?;
        raw.iter().map(|cells| Self::decode(cells)).collect()
    }

    fn append_row(&self, name: &str, row: Vec<Cell>) -> Result<()> {
        let conn = self.conn()?;
        let sheet_id = Self::sheet_id(&conn, name)?;
        conn.execute(
            "INSERT INTO sheet_rows (sheet_id, cells) VALUES (?1, ?2)",
            params![sheet_id, Self::encode(&row)?],
        )?;
        Ok(())
    }

    fn update_cell(&self, name: &str, row: usize, col: usize, value: Cell) -> Result<()> {
        let conn = self.conn()?;
        let tx = conn.unchecked_transaction()?;

        let sheet_id = Self::sheet_id(&tx, name)?;
        let row_id = Self::row_id(&tx, sheet_id, name, row)?;
        let cells: String = tx.query_row(
            "SELECT cells FROM sheet_rows WHERE id = ?1",
            params![row_id],
            |r| r.get(0),
        )?;

        let mut cells = Self::decode(&cells)?;
        if cells.len() <= col {
            cells.resize(col + 1, Cell::Empty);
        }
        cells[col] = value;

        tx.execute(
            "UPDATE sheet_rows SET cells = ?1 WHERE id = ?2",
            params![Self::encode(&cells)?, row_id],
        )?;
        tx.commit()?;
        Ok(())
    }

    fn delete_row(&self, name: &str, row: usize) -> Result<()> {
        let conn = self.conn()?;
        let sheet_id = Self::sheet_id(&conn, name)?;
        let row_id = Self::row_id(&conn, sheet_id, name, row)?;
        conn.execute("DELETE FROM sheet_rows WHERE id = ?1", params![row_id])?;
        Ok(())
    }
}
