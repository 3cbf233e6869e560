//! Path segment persistence: the durable tier of the segment cache.

use crate::{Database, Result};
use chrono::Utc;
use rusqlite::{params, OptionalExtension, Transaction};
use tracing::debug;

/// A segment write queued by the cache.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentUpsert {
  pub start: String,
  pub end: String,
  pub titles: Vec<String>,
}

/// A segment as read back for warm-up.
#[derive(Debug, Clone)]
pub struct SegmentRow {
  pub start: String,
  pub end: String,
  pub titles: Vec<String>,
  pub use_count: u64,
  pub last_used_ms: i64,
}

fn upsert_one(tx: &Transaction<'_>, segment: &SegmentUpsert, now: i64) -> Result<()> {
  let existing = tx
    .query_row(
      "SELECT id, titles FROM path_segments WHERE start_title = ?1 AND end_title = ?2",
      params![segment.start, segment.end],
      |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
    )
    .optional()?;

  match existing {
    Some((id, titles_json)) => {
      let existing_titles: Vec<String> = serde_json::from_str(&titles_json).unwrap_or_default();
      if segment.titles.len() <= existing_titles.len() || existing_titles.is_empty() {
        let titles_json = serde_json::to_string(&segment.titles)?;
        tx.execute(
          "UPDATE path_segments
           SET titles = ?1, hops = ?2, use_count = use_count + 1, last_used = ?3
           WHERE id = ?4",
          params![titles_json, segment.titles.len().saturating_sub(1) as i64, now, id],
        )?;
      } else {
        // A longer path never replaces a shorter one for the same endpoints.
        tx.execute(
          "UPDATE path_segments SET use_count = use_count + 1, last_used = ?1 WHERE id = ?2",
          params![now, id],
        )?;
      }
    }
    None => {
      let titles_json = serde_json::to_string(&segment.titles)?;
      tx.execute(
        "INSERT INTO path_segments (start_title, end_title, titles, hops, use_count, last_used, created_at)
         VALUES (?1, ?2, ?3, ?4, 1, ?5, ?5)",
        params![
          segment.start,
          segment.end,
          titles_json,
          segment.titles.len().saturating_sub(1) as i64,
          now,
        ],
      )?;
    }
  }
  Ok(())
}

impl Database {
  /// Upsert a batch of segments in one transaction.
  pub fn upsert_segments(&self, segments: &[SegmentUpsert]) -> Result<usize> {
    if segments.is_empty() {
      return Ok(0);
    }
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    let now = Utc::now().timestamp_millis();
    for segment in segments {
      upsert_one(&tx, segment, now)?;
    }
    tx.commit()?;
    debug!(count = segments.len(), "flushed segment batch");
    Ok(segments.len())
  }

  /// Look up the segment for an endpoint pair, bumping its usage.
  pub fn get_segment(&self, start: &str, end: &str) -> Result<Option<Vec<String>>> {
    let conn = self.lock()?;
    let found = conn
      .query_row(
        "SELECT id, titles FROM path_segments WHERE start_title = ?1 AND end_title = ?2",
        params![start, end],
        |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)),
      )
      .optional()?;

    let Some((id, titles_json)) = found else {
      return Ok(None);
    };

    conn.execute(
      "UPDATE path_segments SET use_count = use_count + 1, last_used = ?1 WHERE id = ?2",
      params![Utc::now().timestamp_millis(), id],
    )?;

    Ok(Some(serde_json::from_str(&titles_json)?))
  }

  /// Bump usage for a batch of endpoint pairs (memory-tier hits).
  pub fn touch_segments(&self, keys: &[(String, String)]) -> Result<()> {
    if keys.is_empty() {
      return Ok(());
    }
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    let now = Utc::now().timestamp_millis();
    for (start, end) in keys {
      tx.execute(
        "UPDATE path_segments SET use_count = use_count + 1, last_used = ?1
         WHERE start_title = ?2 AND end_title = ?3",
        params![now, start, end],
      )?;
    }
    tx.commit()?;
    Ok(())
  }

  /// Remove the segment for an endpoint pair. Returns whether a row existed.
  pub fn delete_segment(&self, start: &str, end: &str) -> Result<bool> {
    let conn = self.lock()?;
    let removed = conn.execute(
      "DELETE FROM path_segments WHERE start_title = ?1 AND end_title = ?2",
      params![start, end],
    )?;
    Ok(removed > 0)
  }

  /// Most-recently-used segments, for cache warm-up.
  pub fn recent_segments(&self, limit: usize) -> Result<Vec<SegmentRow>> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare(
      "SELECT start_title, end_title, titles, use_count, last_used
       FROM path_segments
       ORDER BY last_used DESC, use_count DESC
       LIMIT ?1",
    )?;
    let rows = stmt.query_map(params![limit as i64], |row| {
      Ok((
        row.get::<_, String>(0)?,
        row.get::<_, String>(1)?,
        row.get::<_, String>(2)?,
        row.get::<_, i64>(3)?,
        row.get::<_, i64>(4)?,
      ))
    })?;

    let mut out = Vec::new();
    for row in rows {
      let (start, end, titles_json, use_count, last_used_ms) = row?;
      out.push(SegmentRow {
        start,
        end,
        titles: serde_json::from_str(&titles_json)?,
        use_count: use_count.max(0) as u64,
        last_used_ms,
      });
    }
    Ok(out)
  }

  /// Drop segments unused for `ttl_days` and enforce the row cap, keeping
  /// the most recently used. Returns the number of rows removed.
  pub fn compact_segments(&self, ttl_days: u32, cap: usize) -> Result<usize> {
    let conn = self.lock()?;
    let cutoff = Utc::now().timestamp_millis() - i64::from(ttl_days) * 86_400_000;

    let mut removed = conn.execute("DELETE FROM path_segments WHERE last_used < ?1", params![cutoff])?;
    removed += conn.execute(
      "DELETE FROM path_segments WHERE id NOT IN (
         SELECT id FROM path_segments ORDER BY last_used DESC LIMIT ?1
       )",
      params![cap as i64],
    )?;

    if removed > 0 {
      debug!(removed, ttl_days, cap, "compacted segment store");
    }
    Ok(removed)
  }

  pub fn segment_count(&self) -> Result<usize> {
    let conn = self.lock()?;
    let count: i64 = conn.query_row("SELECT COUNT(*) FROM path_segments", [], |row| row.get(0))?;
    Ok(count.max(0) as usize)
  }
}
