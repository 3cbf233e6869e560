//! Durable store for completed searches and reusable path segments.
//!
//! A single write connection behind a mutex serializes all access; callers
//! that run on the async runtime wrap calls in `spawn_blocking`.

mod connection;
mod schema;
mod searches;
mod segments;

pub use connection::Database;
pub use searches::{NewSearchRecord, PathRow, SearchAggregates, SearchDetail, SearchSummary, StoredPath};
pub use segments::{SegmentRow, SegmentUpsert};

use thiserror::Error;

#[derive(Error, Debug)]
pub enum DbError {
  #[error("sqlite: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("io: {0}")]
  Io(#[from] std::io::Error),
  #[error("serialization: {0}")]
  Serialization(#[from] serde_json::Error),
  #[error("database lock poisoned")]
  Poisoned,
}

pub type Result<T> = std::result::Result<T, DbError>;
