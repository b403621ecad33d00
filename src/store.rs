use std::path::{Path, PathBuf};

use rusqlite::{params, Connection};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::error::AppError;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreSettings {
    pub enabled: bool,
    pub path: String,
}

impl Default for StoreSettings {
    fn default() -> Self {
        Self {
            enabled: true,
            path: "data/ensemble_results.sqlite".to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct StoredResult {
    pub run_id: String,
    pub kind: String,
    pub symbol: String,
    pub payload: serde_json::Value,
    pub created_at_ms: i64,
}

/// Append-only SQLite sink for computed results.
#[derive(Debug, Clone)]
pub struct ResultStore {
    path: PathBuf,
}

impl ResultStore {
    pub fn open(path: impl AsRef<Path>) -> Result<Self, AppError> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let store = Self { path };
        let conn = store.connect()?;
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS ensemble_results (
                run_id TEXT PRIMARY KEY,
                kind TEXT NOT NULL,
                symbol TEXT NOT NULL,
                payload TEXT NOT NULL,
                created_at_ms INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_ensemble_results_kind
                ON ensemble_results(kind, created_at_ms);
            "#,
        )?;
        Ok(store)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn connect(&self) -> Result<Connection, AppError> {
        Ok(Connection::open(&self.path)?)
    }

    /// Writes one row and returns its run id.
    pub fn record<T: Serialize>(&self, kind: &str, symbol: &str, payload: &T) -> Result<String, AppError> {
        let body = serde_json::to_string(payload)?;
        let run_id = uuid::Uuid::new_v4().to_string();
        let now_ms = chrono::Utc::now().timestamp_millis();

        let mut conn = self.connect()?;
        let tx = conn.transaction()?;
        tx.execute(
            r#"
            INSERT INTO ensemble_results (run_id, kind, symbol, payload, created_at_ms)
            VALUES (?1, ?2, ?3, ?4, ?5)
            "#,
            params![run_id, kind, symbol, body, now_ms],
        )?;
        tx.commit()?;
        Ok(run_id)
    }

    /// Like [`record`](Self::record), but failures are logged and dropped.
    pub fn record_quietly<T: Serialize>(&self, kind: &str, symbol: &str, payload: &T) -> Option<String> {
        match self.record(kind, symbol, payload) {
            Ok(run_id) => Some(run_id),
            Err(e) => {
                warn!(kind, symbol, error = %e, path = %self.path.display(), "result store write failed");
                None
            }
        }
    }

    /// Newest rows of `kind` first.
    pub fn load_recent(&self, kind: &str, limit: usize) -> Result<Vec<StoredResult>, AppError> {
        let conn = self.connect()?;
        let mut stmt = conn.prepare(
            r#"
            SELECT run_id, kind, symbol, payload, created_at_ms
            FROM ensemble_results
            WHERE kind = ?1
            ORDER BY created_at_ms DESC, rowid DESC
            LIMIT ?2
            "#,
        )?;
        let rows = stmt.query_map(params![kind, limit as i64], |row| {
            Ok((
                row.get::<_, String>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut out = Vec::new();
        for row in rows {
            let (run_id, kind, symbol, payload, created_at_ms) = row?;
            out.push(StoredResult {
                run_id,
                kind,
                symbol,
                payload: serde_json::from_str(&payload)?,
                created_at_ms,
            });
        }
        Ok(out)
    }
}
