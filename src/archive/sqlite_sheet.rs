use std::path::Path;
use std::sync::Mutex;

use rusqlite::{params, Connection, OptionalExtension};

use super::{SheetError, SheetStore};

/// Schema migrations, applied in order on open.
const MIGRATIONS: &[(i64, &str)] = &[(
    1,
    "CREATE TABLE IF NOT EXISTS schema_version (
         version INTEGER PRIMARY KEY,
         applied_at TEXT NOT NULL DEFAULT (datetime('now'))
     );
     CREATE TABLE IF NOT EXISTS sheet_rows (
         row_index INTEGER PRIMARY KEY CHECK (row_index >= 1),
         cells TEXT NOT NULL
     );
     INSERT INTO schema_version (version) VALUES (1);",
)];

/// Spreadsheet persisted in SQLite: one record per row, cells stored as a
/// JSON array so rows of different widths coexist.
pub struct SqliteSheet {
    conn: Mutex<Connection>,
}

impl SqliteSheet {
    /// Open (or create) a sheet database and run migrations
    pub fn open(path: &Path) -> Result<Self, SheetError> {
        let conn = Connection::open(path)?;
        Self::init(conn)
    }

    /// Open an in-memory sheet (for testing)
    pub fn open_in_memory() -> Result<Self, SheetError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, SheetError> {
        conn.execute_batch("PRAGMA journal_mode=DELETE;")?;
        run_migrations(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Every stored row, ordered by row number (gaps are skipped).
    pub fn rows(&self) -> Result<Vec<(usize, Vec<String>)>, SheetError> {
        let conn = self.lock()?;
        let mut stmt = conn.prepare("SELECT row_index, cells FROM sheet_rows ORDER BY row_index")?;
        let raw = stmt
            .query_map([], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?
            .collect::<Result<Vec<_>, _>>()?;

        raw.into_iter()
            .map(|(index, cells)| -> Result<(usize, Vec<String>), SheetError> {
                Ok((to_row_number(index)?, decode_cells(&cells)?))
            })
            .collect()
    }

    fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, SheetError> {
        self.conn
            .lock()
            .map_err(|_| SheetError::Backend("sheet connection lock poisoned".into()))
    }
}

fn run_migrations(conn: &Connection) -> Result<(), SheetError> {
    let current_version = get_current_version(conn);
    for (version, sql) in MIGRATIONS {
        if *version > current_version {
            tracing::info!("Running sheet migration v{version}");
            conn.execute_batch(sql).map_err(|e| {
                SheetError::Backend(format!("migration v{version} failed: {e}"))
            })?;
        }
    }
    Ok(())
}

/// Current schema version (0 if no schema exists yet)
fn get_current_version(conn: &Connection) -> i64 {
    conn.query_row("SELECT MAX(version) FROM schema_version", [], |row| {
        row.get::<_, Option<i64>>(0)
    })
    .ok()
    .flatten()
    .unwrap_or(0)
}

fn encode_cells(values: &[String]) -> Result<String, SheetError> {
    serde_json::to_string(values).map_err(|e| SheetError::Backend(e.to_string()))
}

fn decode_cells(cells: &str) -> Result<Vec<String>, SheetError> {
    serde_json::from_str(cells).map_err(|e| SheetError::Backend(format!("corrupt row: {e}")))
}

fn to_row_index(row: usize) -> Result<i64, SheetError> {
    if row == 0 {
        return Err(SheetError::Backend("row numbers start at 1".into()));
    }
    i64::try_from(row).map_err(|_| SheetError::Backend(format!("row {row} out of range")))
}

fn to_row_number(index: i64) -> Result<usize, SheetError> {
    usize::try_from(index).map_err(|_| SheetError::Backend(format!("invalid row index {index}")))
}

impl SheetStore for SqliteSheet {
    fn read_cell(&self, row: usize, col: usize) -> Result<Option<String>, SheetError> {
        if row == 0 || col == 0 {
            return Ok(None);
        }
        let conn = self.lock()?;
        let cells: Option<String> = conn
            .query_row(
                "SELECT cells FROM sheet_rows WHERE row_index = ?1",
                params![to_row_index(row)?],
                |r| r.get(0),
            )
            .optional()?;

        match cells {
            Some(cells) => Ok(decode_cells(&cells)?.into_iter().nth(col - 1)),
            None => Ok(None),
        }
    }

    fn write_row(&self, row: usize, values: &[String]) -> Result<(), SheetError> {
        let index = to_row_index(row)?;
        let cells = encode_cells(values)?;
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO sheet_rows (row_index, cells) VALUES (?1, ?2)
             ON CONFLICT(row_index) DO UPDATE SET cells = excluded.cells",
            params![index, cells],
        )?;
        Ok(())
    }

    fn append_row(&self, values: &[String]) -> Result<(), SheetError> {
        let cells = encode_cells(values)?;
        let conn = self.lock()?;
        // Single statement so concurrent appends cannot pick the same index.
        conn.execute(
            "INSERT INTO sheet_rows (row_index, cells)
             SELECT COALESCE(MAX(row_index), 0) + 1, ?1 FROM sheet_rows",
            params![cells],
        )?;
        Ok(())
    }
}
