use crate::core::error::QrtagError;
use rusqlite::{Connection, OpenFlags};
use std::path::Path;
use std::time::Duration;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OpenMode {
    /// Lookups only. The database file must already exist.
    ReadOnly,
    /// Loading records. Creates the database file when missing.
    ReadWrite,
}

pub fn db_connect(db_path: &Path, mode: OpenMode) -> Result<Connection, QrtagError> {
    let flags = match mode {
        OpenMode::ReadOnly => OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        OpenMode::ReadWrite => {
            OpenFlags::SQLITE_OPEN_READ_WRITE
                | OpenFlags::SQLITE_OPEN_CREATE
                | OpenFlags::SQLITE_OPEN_NO_MUTEX
        }
    };
    let conn = Connection::open_with_flags(db_path, flags).map_err(|e| {
        QrtagError::ConnectionError(format!("cannot open {}: {}", db_path.display(), e))
    })?;
    conn.busy_timeout(Duration::from_secs(5))?;
    // Rollback journal only: read-only opens cannot create -shm/-wal files.
    Ok(conn)
}
