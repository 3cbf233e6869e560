use crate::{schema, DbError, Result};
use rusqlite::Connection;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard};
use tracing::info;

/// Handle to the durable store.
///
/// Holds one write connection; every operation takes the lock, so writes are
/// serialized and reads are consistent with them.
pub struct Database {
  conn: Mutex<Connection>,
  path: Option<PathBuf>,
}

impl Database {
  /// Open (creating if needed) the database file and ensure the schema.
  pub fn open(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)?;
    }
    info!(?path, "opening search database");
    let conn = Connection::open(path)?;
    configure(&conn)?;
    schema::ensure_schema(&conn)?;
    Ok(Self {
      conn: Mutex::new(conn),
      path: Some(path.to_path_buf()),
    })
  }

  /// In-memory database for tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()?;
    configure(&conn)?;
    schema::ensure_schema(&conn)?;
    Ok(Self {
      conn: Mutex::new(conn),
      path: None,
    })
  }

  pub fn path(&self) -> Option<&Path> {
    self.path.as_deref()
  }

  pub(crate) fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
    self.conn.lock().map_err(|_| DbError::Poisoned)
  }
}

fn configure(conn: &Connection) -> Result<()> {
  // WAL allows readers while a write is in flight; the busy timeout keeps
  // concurrent openers from failing fast with SQLITE_BUSY.
  conn.pragma_update(None, "journal_mode", "WAL")?;
  conn.pragma_update(None, "busy_timeout", 20_000)?;
  conn.pragma_update(None, "foreign_keys", "ON")?;
  Ok(())
}

#[cfg(test)]
mod tests {
  use super::*;
  use tempfile::TempDir;

  #[test]
  fn opens_and_creates_schema() {
    let dir = TempDir::new().unwrap();
    let db = Database::open(&dir.path().join("nested/wikigraph.db")).unwrap();
    assert!(db.path().is_some());

    let conn = db.lock().unwrap();
    let count: i64 = conn
      .query_row(
        "SELECT COUNT(*) FROM sqlite_master WHERE type = 'table' AND name IN ('search_records', 'search_paths', 'path_segments')",
        [],
        |row| row.get(0),
      )
      .unwrap();
    assert_eq!(count, 3);
  }

  #[test]
  fn reopen_is_idempotent() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("wikigraph.db");
    drop(Database::open(&path).unwrap());
    assert!(Database::open(&path).is_ok());
  }
}
