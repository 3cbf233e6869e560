use crate::Result;
use rusqlite::Connection;

/// Create tables and indexes if they do not exist yet.
pub fn ensure_schema(conn: &Connection) -> Result<()> {
  conn.execute_batch(
    r#"
    CREATE TABLE IF NOT EXISTS search_records (
      id             INTEGER PRIMARY KEY AUTOINCREMENT,
      start_term     TEXT NOT NULL,
      end_term       TEXT NOT NULL,
      resolved_start TEXT,
      resolved_end   TEXT,
      success        INTEGER NOT NULL,
      error_message  TEXT,
      hops           INTEGER NOT NULL DEFAULT 0,
      pages_checked  INTEGER NOT NULL DEFAULT 0,
      elapsed_ms     INTEGER NOT NULL DEFAULT 0,
      created_at     INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS search_paths (
      id              INTEGER PRIMARY KEY AUTOINCREMENT,
      record_id       INTEGER NOT NULL REFERENCES search_records(id) ON DELETE CASCADE,
      titles          TEXT NOT NULL,
      hops            INTEGER NOT NULL,
      diversity_score REAL,
      path_order      INTEGER NOT NULL
    );

    CREATE TABLE IF NOT EXISTS path_segments (
      id          INTEGER PRIMARY KEY AUTOINCREMENT,
      start_title TEXT NOT NULL,
      end_title   TEXT NOT NULL,
      titles      TEXT NOT NULL,
      hops        INTEGER NOT NULL,
      use_count   INTEGER NOT NULL DEFAULT 1,
      last_used   INTEGER NOT NULL,
      created_at  INTEGER NOT NULL
    );

    CREATE INDEX IF NOT EXISTS idx_search_records_terms ON search_records(start_term, end_term);
    CREATE INDEX IF NOT EXISTS idx_search_records_created ON search_records(created_at DESC);
    CREATE INDEX IF NOT EXISTS idx_search_paths_record ON search_paths(record_id);
    CREATE UNIQUE INDEX IF NOT EXISTS idx_path_segments_endpoints ON path_segments(start_title, end_title);
    CREATE INDEX IF NOT EXISTS idx_path_segments_last_used ON path_segments(last_used DESC);
    "#,
  )?;
  Ok(())
}
