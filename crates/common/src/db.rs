use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::Connection;

use crate::queries;
use crate::types::{DailyTotal, Observation, WalletDelta};

/// Async handle on the observation log.
///
/// All SQLite work runs on the dedicated background thread owned by
/// `tokio_rusqlite`; each operation borrows the connection for the length of
/// one closure. Clone is cheap (shared sender to that thread).
#[derive(Clone)]
pub struct AsyncDb {
    conn: tokio_rusqlite::Connection,
}

impl AsyncDb {
    /// Open the database at `path`, set PRAGMAs and create the tables if absent.
    pub async fn open(path: &str) -> Result<Self> {
        if let Some(parent) = std::path::Path::new(path).parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent).with_context(|| {
                    format!("failed to create DB directory: {}", parent.display())
                })?;
            }
        }

        let conn = tokio_rusqlite::Connection::open(path)
            .await
            .with_context(|| format!("failed to open wallet monitor DB: {path}"))?;

        // The collector and the reporter may start together and both try to create the
        // tables. Retry on `database is locked` instead of failing the process.
        let mut backoff = std::time::Duration::from_millis(250);
        let max_backoff = std::time::Duration::from_secs(5);
        let max_total_wait = std::time::Duration::from_secs(60);
        let start = std::time::Instant::now();

        loop {
            let res = conn
                .call(|conn| -> std::result::Result<(), rusqlite::Error> {
                    conn.busy_timeout(std::time::Duration::from_secs(1))?;
                    conn.execute_batch("PRAGMA journal_mode=WAL;")?;
                    conn.execute_batch(SCHEMA)?;
                    conn.busy_timeout(std::time::Duration::from_secs(30))?;
                    Ok(())
                })
                .await;

            match res {
                Ok(()) => break,
                Err(tokio_rusqlite::Error::Error(err)) => {
                    let is_locked = matches!(
                        err,
                        rusqlite::Error::SqliteFailure(
                            rusqlite::ffi::Error {
                                code: rusqlite::ffi::ErrorCode::DatabaseBusy
                                    | rusqlite::ffi::ErrorCode::DatabaseLocked,
                                ..
                            },
                            _,
                        )
                    );
                    if !is_locked {
                        return Err(
                            anyhow::Error::from(err).context("AsyncDb::open: schema setup failed")
                        );
                    }

                    if start.elapsed() >= max_total_wait {
                        return Err(anyhow::Error::from(err).context(
                            "AsyncDb::open: schema setup failed (database stayed locked too long)",
                        ));
                    }

                    tracing::warn!(
                        wait_for = ?backoff,
                        "AsyncDb::open: database is locked; retrying schema setup"
                    );
                    tokio::time::sleep(backoff).await;
                    backoff = (backoff * 2).min(max_backoff);
                }
                Err(other) => return Err(anyhow::anyhow!("AsyncDb::open: {other}")),
            }
        }

        Ok(Self { conn })
    }

    /// Run a closure on the background SQLite thread and return the result.
    pub async fn call<F, R>(&self, function: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        self.conn.call(move |conn| function(conn)).await.map_err(
            |e: tokio_rusqlite::Error<anyhow::Error>| match e {
                tokio_rusqlite::Error::ConnectionClosed => {
                    anyhow::anyhow!("database connection closed")
                }
                tokio_rusqlite::Error::Close((_, err)) => {
                    anyhow::anyhow!("database close error: {err}")
                }
                tokio_rusqlite::Error::Error(err) => err,
                other => anyhow::anyhow!("database error: {other}"),
            },
        )
    }

    /// Like [`Self::call`], but records latency and error metrics under `op`.
    pub async fn call_named<F, R>(&self, op: &'static str, function: F) -> Result<R>
    where
        F: FnOnce(&mut rusqlite::Connection) -> Result<R> + Send + 'static,
        R: Send + 'static,
    {
        let start = std::time::Instant::now();
        let res = self.call(function).await;
        let ms = start.elapsed().as_secs_f64() * 1000.0;

        match &res {
            Ok(_) => {
                metrics::histogram!(
                    "wallet_monitor_db_query_latency_ms",
                    "op" => op,
                    "status" => "ok"
                )
                .record(ms);
            }
            Err(_) => {
                metrics::histogram!(
                    "wallet_monitor_db_query_latency_ms",
                    "op" => op,
                    "status" => "err"
                )
                .record(ms);
                metrics::counter!("wallet_monitor_db_query_errors_total", "op" => op).increment(1);
            }
        }

        res
    }

    /// Append one reading. Returns its sequence number.
    pub async fn insert_observation(
        &self,
        wallet_id: &str,
        unclaimed_earnings: f64,
        observed_at: DateTime<Utc>,
    ) -> Result<i64> {
        let wallet_id = wallet_id.to_string();
        self.call_named("observations.insert", move |conn| {
            queries::insert_observation(conn, &wallet_id, unclaimed_earnings, observed_at)
        })
        .await
    }

    pub async fn upsert_wallet_name(
        &self,
        wallet_id: &str,
        wallet_name: &str,
        updated_at: DateTime<Utc>,
    ) -> Result<()> {
        let wallet_id = wallet_id.to_string();
        let wallet_name = wallet_name.to_string();
        self.call_named("wallet_names.upsert", move |conn| {
            queries::upsert_wallet_name(conn, &wallet_id, &wallet_name, updated_at)
        })
        .await
    }

    pub async fn wallet_name(&self, wallet_id: &str) -> Result<Option<String>> {
        let wallet_id = wallet_id.to_string();
        self.call_named("wallet_names.get", move |conn| {
            queries::wallet_name(conn, &wallet_id)
        })
        .await
    }

    pub async fn latest_observation(&self) -> Result<Option<Observation>> {
        self.call_named("observations.latest", |conn| {
            queries::latest_observation(conn)
        })
        .await
    }

    pub async fn earnings_24h(&self, now: DateTime<Utc>) -> Result<Vec<WalletDelta>> {
        self.call_named("observations.earnings_24h", move |conn| {
            queries::earnings_24h(conn, now)
        })
        .await
    }

    pub async fn daily_totals(&self, now: DateTime<Utc>) -> Result<Vec<DailyTotal>> {
        self.call_named("observations.daily_totals", move |conn| {
            queries::daily_totals(conn, now)
        })
        .await
    }
}

/// Create both tables and their indexes if they do not exist yet.
pub fn run_schema(conn: &Connection) -> Result<()> {
    conn.execute_batch(SCHEMA)?;
    Ok(())
}

const SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS observations (
    seq INTEGER PRIMARY KEY AUTOINCREMENT,
    wallet_id TEXT NOT NULL,
    unclaimed_earnings REAL NOT NULL,
    observed_at TEXT NOT NULL
);

CREATE TABLE IF NOT EXISTS wallet_names (
    wallet_id TEXT PRIMARY KEY,
    wallet_name TEXT NOT NULL,
    updated_at TEXT NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_observations_wallet_observed_at
    ON observations(wallet_id, observed_at);
CREATE INDEX IF NOT EXISTS idx_observations_observed_at ON observations(observed_at);
"#;

#[cfg(test)]
mod tests {
    use super::*;

    fn table_names(conn: &Connection) -> Vec<String> {
        conn.prepare("SELECT name FROM sqlite_master WHERE type='table' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect()
    }

    #[test]
    fn test_schema_creates_tables() {
        let conn = Connection::open_in_memory().unwrap();
        run_schema(&conn).unwrap();

        let tables = table_names(&conn);
        assert!(tables.contains(&"observations".to_string()));
        assert!(tables.contains(&"wallet_names".to_string()));
    }

    #[test]
    fn test_schema_idempotent() {
        let conn = Connection::open_in_memory().unwrap();
        run_schema(&conn).unwrap();
        run_schema(&conn).unwrap(); // second call must not fail
    }

    #[test]
    fn test_schema_creates_expected_indexes() {
        let conn = Connection::open_in_memory().unwrap();
        run_schema(&conn).unwrap();

        let indexes: Vec<String> = conn
            .prepare("SELECT name FROM sqlite_master WHERE type='index' ORDER BY name")
            .unwrap()
            .query_map([], |row| row.get(0))
            .unwrap()
            .filter_map(std::result::Result::ok)
            .collect();

        // The previous-reading subquery walks (wallet_id, observed_at).
        for expected in [
            "idx_observations_observed_at",
            "idx_observations_wallet_observed_at",
        ] {
            assert!(
                indexes.contains(&expected.to_string()),
                "missing index {expected}, got {indexes:?}"
            );
        }
    }

    #[test]
    fn test_sequence_is_strictly_increasing() {
        let conn = Connection::open_in_memory().unwrap();
        run_schema(&conn).unwrap();
        let now = Utc::now();
        let a = queries::insert_observation(&conn, "w-1", 1.0, now).unwrap();
        let b = queries::insert_observation(&conn, "w-1", 1.0, now).unwrap();
        let c = queries::insert_observation(&conn, "w-2", 1.0, now).unwrap();
        assert!(a < b && b < c);
    }

    #[tokio::test]
    async fn test_open_file_db_creates_parent_dir() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("nested").join("wallet_monitor.db");
        let db = AsyncDb::open(path.to_str().unwrap()).await.unwrap();

        let count: i64 = db
            .call(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM observations", [], |row| row.get(0))?)
            })
            .await
            .unwrap();
        assert_eq!(count, 0);
        assert!(path.exists());
    }

    #[tokio::test]
    async fn test_async_round_trip_through_store() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("wallet_monitor.db");
        let db = AsyncDb::open(path.to_str().unwrap()).await.unwrap();
        let now = Utc::now();

        assert!(db.latest_observation().await.unwrap().is_none());

        db.insert_observation("w-1", 0.75, now).await.unwrap();
        db.upsert_wallet_name("w-1", "node-a", now).await.unwrap();

        let latest = db.latest_observation().await.unwrap().unwrap();
        assert_eq!(latest.wallet_id, "w-1");
        assert_eq!(latest.wallet_name.as_deref(), Some("node-a"));
        assert_eq!(db.earnings_24h(now).await.unwrap().len(), 1);
        assert_eq!(db.daily_totals(now).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_reopen_keeps_existing_rows() {
        let tmp = tempfile::TempDir::new().unwrap();
        let path = tmp.path().join("wallet_monitor.db");
        let path = path.to_str().unwrap().to_string();
        let now = Utc::now();

        {
            let db = AsyncDb::open(&path).await.unwrap();
            db.insert_observation("w-1", 2.0, now).await.unwrap();
        }

        let db = AsyncDb::open(&path).await.unwrap();
        let latest = db.latest_observation().await.unwrap().unwrap();
        assert_eq!(latest.wallet_id, "w-1");
    }
}
