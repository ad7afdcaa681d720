//! Archive collaborators: the assessment spreadsheet and image storage.
//!
//! Rows and columns are 1-based, like a spreadsheet. Row 1 is the header.

pub mod folder_storage;
pub mod sqlite_sheet;

pub use folder_storage::*;
pub use sqlite_sheet::*;

use std::sync::Mutex;

use thiserror::Error;

#[derive(Error, Debug)]
pub enum SheetError {
    #[error("Spreadsheet credential missing or rejected: {0}")]
    Auth(String),

    #[error("Spreadsheet unreachable: {0}")]
    Transport(String),

    #[error("Spreadsheet storage error: {0}")]
    Backend(String),

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),
}

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Storage credential missing or rejected: {0}")]
    Auth(String),

    #[error("Storage unreachable: {0}")]
    Transport(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Append-only assessment spreadsheet.
pub trait SheetStore: Send + Sync {
    /// Value of a cell, `None` when the row or column does not exist.
    fn read_cell(&self, row: usize, col: usize) -> Result<Option<String>, SheetError>;

    /// Replace a whole row.
    fn write_row(&self, row: usize, values: &[String]) -> Result<(), SheetError>;

    /// Add a row after the last one.
    fn append_row(&self, values: &[String]) -> Result<(), SheetError>;
}

/// Image upload target returning a link to the stored object.
pub trait BlobStorage: Send + Sync {
    fn upload(&self, bytes: &[u8], media_type: &str, suggested_name: &str)
        -> Result<String, StorageError>;
}

// ──────────────────────────────────────────────
// In-memory implementations
// ──────────────────────────────────────────────

/// Sheet held in memory (tests, dry runs).
#[derive(Default)]
pub struct MemorySheet {
    rows: Mutex<Vec<Vec<String>>>,
}

impl MemorySheet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_rows(rows: Vec<Vec<String>>) -> Self {
        Self {
            rows: Mutex::new(rows),
        }
    }

    pub fn rows(&self) -> Vec<Vec<String>> {
        self.rows.lock().map(|r| r.clone()).unwrap_or_default()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Vec<Vec<String>>>, SheetError> {
        self.rows
            .lock()
            .map_err(|_| SheetError::Backend("sheet lock poisoned".into()))
    }
}

impl SheetStore for MemorySheet {
    fn read_cell(&self, row: usize, col: usize) -> Result<Option<String>, SheetError> {
        let rows = self.lock()?;
        Ok(row
            .checked_sub(1)
            .and_then(|r| rows.get(r))
            .and_then(|cells| col.checked_sub(1).and_then(|c| cells.get(c)))
            .cloned())
    }

    fn write_row(&self, row: usize, values: &[String]) -> Result<(), SheetError> {
        let index = row
            .checked_sub(1)
            .ok_or_else(|| SheetError::Backend("row numbers start at 1".into()))?;
        let mut rows = self.lock()?;
        if rows.len() <= index {
            rows.resize(index + 1, Vec::new());
        }
        rows[index] = values.to_vec();
        Ok(())
    }

    fn append_row(&self, values: &[String]) -> Result<(), SheetError> {
        self.lock()?.push(values.to_vec());
        Ok(())
    }
}

/// Storage that keeps uploads in memory and hands out fake links.
pub struct MemoryStorage {
    base_url: String,
    uploads: Mutex<Vec<(String, String, usize)>>,
}

impl MemoryStorage {
    pub fn new(base_url: &str) -> Self {
        Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            uploads: Mutex::new(Vec::new()),
        }
    }

    /// `(name, media_type, byte_len)` of every upload, in order.
    pub fn uploads(&self) -> Vec<(String, String, usize)> {
        self.uploads.lock().map(|u| u.clone()).unwrap_or_default()
    }
}

impl BlobStorage for MemoryStorage {
    fn upload(&self, bytes: &[u8], media_type: &str, suggested_name: &str) -> Result<String, StorageError> {
        let mut uploads = self
            .uploads
            .lock()
            .map_err(|_| StorageError::Transport("storage lock poisoned".into()))?;
        uploads.push((suggested_name.to_string(), media_type.to_string(), bytes.len()));
        Ok(format!("{}/{}", self.base_url, suggested_name))
    }
}
