//! Append-only log of past analyses in SQLite.

use std::path::Path;
use std::sync::Mutex;
use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};
use serde_json::Value;
use thiserror::Error;

use crate::ai_agent::data::models::{AnalysisResult, HistoryEntry, HistoryRecord};
use crate::ai_agent::tools::exporters::risks_to_csv;

const SQLITE_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

#[derive(Debug, Error)]
pub enum StoreError {
  #[error("no analysis with id {0}")]
  NotFound(i64),
  #[error("history database error: {0}")]
  Sqlite(#[from] rusqlite::Error),
  #[error("history record is corrupt: {0}")]
  Corrupt(String),
  #[error("history store lock poisoned")]
  Poisoned,
}

pub struct HistoryStore {
  conn: Mutex<Connection>,
}

impl HistoryStore {
  pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
    let conn = Connection::open(path.as_ref())?;
    log::info!("Opened analysis history at {}", path.as_ref().display());
    Self::with_connection(conn)
  }

  pub fn open_in_memory() -> Result<Self, StoreError> {
    Self::with_connection(Connection::open_in_memory()?)
  }

  fn with_connection(conn: Connection) -> Result<Self, StoreError> {
    conn.execute_batch(
      r#"
      CREATE TABLE IF NOT EXISTS analyses (
        id INTEGER PRIMARY KEY AUTOINCREMENT,
        ts DATETIME DEFAULT CURRENT_TIMESTAMP,
        params TEXT,
        exec_summary TEXT,
        risks_csv TEXT
      );
      "#,
    )?;
    Ok(HistoryStore { conn: Mutex::new(conn) })
  }

  fn lock(&self) -> Result<std::sync::MutexGuard<'_, Connection>, StoreError> {
    self.conn.lock().map_err(|_| StoreError::Poisoned)
  }

  /// Appends one analysis and returns its id. The risk table is flattened to CSV text.
  pub fn save(&self, params: &Value, result: &AnalysisResult) -> Result<i64, StoreError> {
    let risks_csv = risks_to_csv(&result.risks).map_err(|e| StoreError::Corrupt(e.to_string()))?;
    let risks_csv = String::from_utf8(risks_csv).map_err(|e| StoreError::Corrupt(e.to_string()))?;

    let conn = self.lock()?;
    conn.execute(
      "INSERT INTO analyses (params, exec_summary, risks_csv) VALUES (?1, ?2, ?3)",
      params![params.to_string(), result.executive_summary, risks_csv],
    )?;
    let id = conn.last_insert_rowid();
    log::info!("Saved analysis {} to history", id);
    Ok(id)
  }

  /// Most recent first, at most `limit` entries.
  pub fn list(&self, limit: u32) -> Result<Vec<HistoryEntry>, StoreError> {
    let conn = self.lock()?;
    let mut stmt = conn.prepare("SELECT id, ts FROM analyses ORDER BY id DESC LIMIT ?1")?;
    let rows = stmt.query_map(params![limit], |row| Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?)))?;

    let mut entries: Vec<HistoryEntry> = Vec::new();
    for row in rows {
      let (id, ts) = row?;
      entries.push(HistoryEntry { id, timestamp: parse_timestamp(&ts)? });
    }
    Ok(entries)
  }

  pub fn load(&self, id: i64) -> Result<HistoryRecord, StoreError> {
    let conn = self.lock()?;
    let row = conn
      .query_row(
        "SELECT id, ts, params, exec_summary, risks_csv FROM analyses WHERE id = ?1",
        params![id],
        |row| {
          Ok((
            row.get::<_, i64>(0)?,
            row.get::<_, String>(1)?,
            row.get::<_, Option<String>>(2)?,
            row.get::<_, Option<String>>(3)?,
            row.get::<_, Option<String>>(4)?,
          ))
        },
      )
      .optional()?;

    let (id, ts, params, exec_summary, risks_csv) = row.ok_or(StoreError::NotFound(id))?;
    let params: Value = match params {
      Some(text) => serde_json::from_str(&text).map_err(|e| StoreError::Corrupt(format!("params of analysis {}: {}", id, e)))?,
      None => Value::Null,
    };

    Ok(HistoryRecord {
      id,
      timestamp: parse_timestamp(&ts)?,
      params,
      executive_summary: exec_summary.unwrap_or_default(),
      risks_csv: risks_csv.unwrap_or_default(),
    })
  }
}

fn parse_timestamp(ts: &str) -> Result<NaiveDateTime, StoreError> {
  NaiveDateTime::parse_from_str(ts, SQLITE_TIMESTAMP_FORMAT).map_err(|e| StoreError::Corrupt(format!("timestamp '{}': {}", ts, e)))
}
