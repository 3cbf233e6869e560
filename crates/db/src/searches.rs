//! Search record persistence and history queries.

use crate::{Database, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, OptionalExtension, Row};
use serde::Serialize;
use tracing::debug;

/// A completed (or failed) search, ready to be written.
#[derive(Debug, Clone)]
pub struct NewSearchRecord {
  pub start_term: String,
  pub end_term: String,
  pub resolved_start: Option<String>,
  pub resolved_end: Option<String>,
  pub success: bool,
  pub error_message: Option<String>,
  pub pages_checked: u64,
  pub elapsed_ms: u64,
}

/// One accepted path belonging to a record.
#[derive(Debug, Clone)]
pub struct PathRow {
  pub titles: Vec<String>,
  /// Minimum Jaccard distance to the paths accepted before this one.
  pub diversity_score: Option<f64>,
}

/// Listing row for the history surface.
#[derive(Debug, Clone, Serialize)]
pub struct SearchSummary {
  pub id: i64,
  pub start_term: String,
  pub end_term: String,
  pub success: bool,
  pub hops: u32,
  pub pages_checked: u64,
  pub created_at: DateTime<Utc>,
}

/// A stored path as read back from the database.
#[derive(Debug, Clone, Serialize)]
pub struct StoredPath {
  pub titles: Vec<String>,
  pub hops: u32,
  pub diversity_score: Option<f64>,
  pub path_order: u32,
}

/// Full detail for one record.
#[derive(Debug, Clone, Serialize)]
pub struct SearchDetail {
  pub id: i64,
  pub start_term: String,
  pub end_term: String,
  pub resolved_start: Option<String>,
  pub resolved_end: Option<String>,
  pub success: bool,
  pub error_message: Option<String>,
  pub hops: u32,
  pub pages_checked: u64,
  pub elapsed_ms: u64,
  pub created_at: DateTime<Utc>,
  pub paths: Vec<StoredPath>,
}

/// Aggregate statistics over all searches.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct SearchAggregates {
  pub total_searches: u64,
  pub successful_searches: u64,
  pub avg_hops: Option<f64>,
  pub avg_pages_checked: Option<f64>,
}

fn timestamp(ms: i64) -> DateTime<Utc> {
  DateTime::from_timestamp_millis(ms).unwrap_or(DateTime::UNIX_EPOCH)
}

fn summary_from_row(row: &Row<'_>) -> rusqlite::Result<SearchSummary> {
  Ok(SearchSummary {
    id: row.get(0)?,
    start_term: row.get(1)?,
    end_term: row.get(2)?,
    success: row.get::<_, i64>(3)? != 0,
    hops: row.get(4)?,
    pages_checked: row.get::<_, i64>(5)? as u64,
    created_at: timestamp(row.get(6)?),
  })
}

impl Database {
  /// Persist a record and its paths in a single transaction, returning the
  /// monotonically increasing record id.
  pub fn save_search(&self, record: &NewSearchRecord, paths: &[PathRow]) -> Result<i64> {
    let mut conn = self.lock()?;
    let tx = conn.transaction()?;
    let now = Utc::now().timestamp_millis();

    let hops = paths.first().map(|p| p.titles.len().saturating_sub(1)).unwrap_or(0);
    tx.execute(
      "INSERT INTO search_records
         (start_term, end_term, resolved_start, resolved_end, success, error_message,
          hops, pages_checked, elapsed_ms, created_at)
       VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
      params![
        record.start_term,
        record.end_term,
        record.resolved_start,
        record.resolved_end,
        record.success as i64,
        record.error_message,
        hops as i64,
        record.pages_checked as i64,
        record.elapsed_ms as i64,
        now,
      ],
    )?;
    let record_id = tx.last_insert_rowid();

    for (order, path) in paths.iter().enumerate() {
      let titles_json = serde_json::to_string(&path.titles)?;
      tx.execute(
        "INSERT INTO search_paths (record_id, titles, hops, diversity_score, path_order)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
          record_id,
          titles_json,
          path.titles.len().saturating_sub(1) as i64,
          path.diversity_score,
          order as i64,
        ],
      )?;
    }

    tx.commit()?;
    debug!(record_id, paths = paths.len(), "saved search record");
    Ok(record_id)
  }

  /// Fetch one record with its paths.
  pub fn search_by_id(&self, id: i64) -> Result<Option<SearchDetail>> {
    let conn = self.lock()?;

    let header = conn
      .query_row(
        "SELECT id, start_term, end_term, resolved_start, resolved_end, success,
                error_message, hops, pages_checked, elapsed_ms, created_at
         FROM search_records WHERE id = ?1",
        params![id],
        |row| {
          Ok(SearchDetail {
            id: row.get(0)?,
            start_term: row.get(1)?,
            end_term: row.get(2)?,
            resolved_start: row.get(3)?,
            resolved_end: row.get(4)?,
            success: row.get::<_, i64>(5)? != 0,
            error_message: row.get(6)?,
            hops: row.get(7)?,
            pages_checked: row.get::<_, i64>(8)? as u64,
            elapsed_ms: row.get::<_, i64>(9)? as u64,
            created_at: timestamp(row.get(10)?),
            paths: Vec::new(),
          })
        },
      )
      .optional()?;

    let Some(mut detail) = header else {
      return Ok(None);
    };

    let mut stmt = conn.prepare(
      "SELECT titles, hops, diversity_score, path_order
       FROM search_paths WHERE record_id = ?1 ORDER BY path_order",
    )?;
    let rows = stmt.query_map(params![id], |row| {
      Ok((
        row.get::<_, String>(0)?,
        row.get::<_, u32>(1)?,
        row.get::<_, Option<f64>>(2)?,
        row.get::<_, u32>(3)?,
      ))
    })?;
    for row in rows {
      let (titles_json, hops, diversity_score, path_order) = row?;
      detail.paths.push(StoredPath {
        titles: serde_json::from_str(&titles_json)?,
        hops,
        diversity_score,
        path_order,
      });
    }

    Ok(Some(detail))
  }

  /// Most recent searches, optionally filtered by a term substring.
  pub fn recent_searches(&self, query: Option<&str>, limit: usize, offset: usize) -> Result<Vec<SearchSummary>> {
    let conn = self.lock()?;
    let mut out = Vec::new();

    if let Some(query) = query {
      let pattern = format!("%{}%", query);
      let mut stmt = conn.prepare(
        "SELECT id, start_term, end_term, success, hops, pages_checked, created_at
         FROM search_records
         WHERE start_term LIKE ?1 OR end_term LIKE ?1
         ORDER BY created_at DESC LIMIT ?2 OFFSET ?3",
      )?;
      let rows = stmt.query_map(params![pattern, limit as i64, offset as i64], summary_from_row)?;
      for row in rows {
        out.push(row?);
      }
    } else {
      let mut stmt = conn.prepare(
        "SELECT id, start_term, end_term, success, hops, pages_checked, created_at
         FROM search_records
         ORDER BY created_at DESC LIMIT ?1 OFFSET ?2",
      )?;
      let rows = stmt.query_map(params![limit as i64, offset as i64], summary_from_row)?;
      for row in rows {
        out.push(row?);
      }
    }

    Ok(out)
  }

  /// Aggregate statistics across all recorded searches.
  pub fn search_stats(&self) -> Result<SearchAggregates> {
    let conn = self.lock()?;
    let stats = conn.query_row(
      "SELECT COUNT(*),
              COALESCE(SUM(success), 0),
              AVG(CASE WHEN success = 1 THEN hops END),
              AVG(pages_checked)
       FROM search_records",
      [],
      |row| {
        Ok(SearchAggregates {
          total_searches: row.get::<_, i64>(0)? as u64,
          successful_searches: row.get::<_, i64>(1)? as u64,
          avg_hops: row.get(2)?,
          avg_pages_checked: row.get(3)?,
        })
      },
    )?;
    Ok(stats)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  fn record(start: &str, end: &str, success: bool) -> NewSearchRecord {
    NewSearchRecord {
      start_term: start.to_string(),
      end_term: end.to_string(),
      resolved_start: success.then(|| start.to_string()),
      resolved_end: success.then(|| end.to_string()),
      success,
      error_message: (!success).then(|| "no path found".to_string()),
      pages_checked: 42,
      elapsed_ms: 1500,
    }
  }

  fn path_row(titles: &[&str], score: Option<f64>) -> PathRow {
    PathRow {
      titles: titles.iter().map(|s| s.to_string()).collect(),
      diversity_score: score,
    }
  }

  #[test]
  fn record_ids_are_monotonic() {
    let db = Database::open_in_memory().unwrap();
    let a = db.save_search(&record("A", "B", true), &[path_row(&["A", "B"], None)]).unwrap();
    let b = db.save_search(&record("C", "D", false), &[]).unwrap();
    assert!(b > a);
  }

  #[test]
  fn detail_round_trips_paths_in_order() {
    let db = Database::open_in_memory().unwrap();
    let id = db
      .save_search(
        &record("A", "C", true),
        &[path_row(&["A", "B", "C"], None), path_row(&["A", "X", "C"], Some(1.0))],
      )
      .unwrap();

    let detail = db.search_by_id(id).unwrap().unwrap();
    assert!(detail.success);
    assert_eq!(detail.hops, 2);
    assert_eq!(detail.paths.len(), 2);
    assert_eq!(detail.paths[0].titles, vec!["A", "B", "C"]);
    assert_eq!(detail.paths[1].diversity_score, Some(1.0));
    assert_eq!(detail.paths[1].path_order, 1);
  }

  #[test]
  fn missing_record_is_none() {
    let db = Database::open_in_memory().unwrap();
    assert!(db.search_by_id(999).unwrap().is_none());
  }

  #[test]
  fn listing_filters_by_term() {
    let db = Database::open_in_memory().unwrap();
    db.save_search(&record("Tokyo", "Paris", true), &[path_row(&["Tokyo", "Paris"], None)])
      .unwrap();
    db.save_search(&record("Lisbon", "Oslo", false), &[]).unwrap();

    let all = db.recent_searches(None, 10, 0).unwrap();
    assert_eq!(all.len(), 2);

    let filtered = db.recent_searches(Some("Tokyo"), 10, 0).unwrap();
    assert_eq!(filtered.len(), 1);
    assert_eq!(filtered[0].start_term, "Tokyo");
  }

  #[test]
  fn stats_aggregate_over_records() {
    let db = Database::open_in_memory().unwrap();
    db.save_search(&record("A", "B", true), &[path_row(&["A", "X", "B"], None)])
      .unwrap();
    db.save_search(&record("C", "D", false), &[]).unwrap();

    let stats = db.search_stats().unwrap();
    assert_eq!(stats.total_searches, 2);
    assert_eq!(stats.successful_searches, 1);
    assert_eq!(stats.avg_hops, Some(2.0));
  }
}
