//! The local store: a single SQLite file holding the queue of records that have not yet been
//! uploaded.
//!
//! A `Db` is an explicit handle. It is opened once, passed to whatever needs it, and closed by
//! consuming it with `Db::close`.

mod migrations;

use crate::error::Res;
use crate::record::{QueuedRecord, Record};
use anyhow::{bail, Context};
use chrono::{DateTime, Utc};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions};
use sqlx::SqlitePool;
use std::path::{Path, PathBuf};
use tracing::{debug, trace};

/// The name of the store. The file on disk is `{STORE_NAME}.sqlite`.
pub(crate) const STORE_NAME: &str = "budget_tracker";

/// The schema version this program reads and writes.
pub(crate) const STORE_VERSION: i64 = 1;

#[derive(Debug, Clone)]
pub(crate) struct Db {
    pool: SqlitePool,
    path: PathBuf,
}

impl Db {
    /// Opens the store at `path`, creating and initializing it first if it does not exist.
    pub(crate) async fn open(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        if path.is_file() {
            Self::load(path).await
        } else {
            Self::init(path).await
        }
    }

    /// - Validates that no file currently exists at `path`
    /// - Creates a new SQLite file at `path`
    /// - Initializes the schema
    pub(crate) async fn init(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        if path.exists() {
            bail!("A store already exists at '{}'", path.display());
        }
        debug!("Creating store at {}", path.display());
        let pool = connect(path, true).await?;

        sqlx::query("CREATE TABLE schema_version (version INTEGER NOT NULL)")
            .execute(&pool)
            .await
            .context("Unable to create the schema_version table")?;
        sqlx::query("INSERT INTO schema_version (version) VALUES (0)")
            .execute(&pool)
            .await
            .context("Unable to initialize the schema version")?;

        migrations::run(&pool, 0, STORE_VERSION).await?;
        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    /// - Validates that there is a SQLite file at `path`
    /// - Upgrades the schema if it is older than `STORE_VERSION`
    /// - Fails if the schema is newer than `STORE_VERSION`
    pub(crate) async fn load(path: impl AsRef<Path>) -> Res<Self> {
        let path = path.as_ref();
        if !path.is_file() {
            bail!("The store is missing '{}'", path.display());
        }
        debug!("Loading store at {}", path.display());
        let pool = connect(path, false).await?;

        let (version,): (i64,) = sqlx::query_as("SELECT MAX(version) FROM schema_version")
            .fetch_one(&pool)
            .await
            .context("Unable to read the schema version, is this a budget queue store?")?;
        if version > STORE_VERSION {
            bail!(
                "The store at '{}' has schema version {version} but this program only \
                understands version {STORE_VERSION}. Is a newer version of this program installed?",
                path.display()
            );
        }
        migrations::run(&pool, version, STORE_VERSION).await?;

        Ok(Self {
            pool,
            path: path.to_path_buf(),
        })
    }

    pub(crate) fn path(&self) -> &Path {
        &self.path
    }

    /// Appends a record and returns the identifier the store assigned to it.
    pub(crate) async fn insert(&self, record: &Record) -> Res<i64> {
        let payload = record.to_payload()?;
        let saved_at = Utc::now().to_rfc3339();
        let id = sqlx::query("INSERT INTO new_budget_record (payload, saved_at) VALUES (?, ?)")
            .bind(payload)
            .bind(saved_at)
            .execute(&self.pool)
            .await
            .context("Unable to insert the record")?
            .last_insert_rowid();
        trace!("Inserted record {id}");
        Ok(id)
    }

    /// Every queued record in insertion order.
    pub(crate) async fn all(&self) -> Res<Vec<QueuedRecord>> {
        let rows: Vec<(i64, String, String)> =
            sqlx::query_as("SELECT id, payload, saved_at FROM new_budget_record ORDER BY id")
                .fetch_all(&self.pool)
                .await
                .context("Unable to read the queued records")?;

        rows.into_iter()
            .map(|(id, payload, saved_at)| -> Res<QueuedRecord> {
                let record = Record::from_payload(&payload)
                    .with_context(|| format!("Record {id} is corrupt"))?;
                let saved_at = DateTime::parse_from_rfc3339(&saved_at)
                    .with_context(|| format!("Record {id} has an invalid saved_at '{saved_at}'"))?
                    .with_timezone(&Utc);
                Ok(QueuedRecord {
                    id,
                    saved_at,
                    record,
                })
            })
            .collect()
    }

    pub(crate) async fn count(&self) -> Res<u64> {
        let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM new_budget_record")
            .fetch_one(&self.pool)
            .await
            .context("Unable to count the queued records")?;
        Ok(count as u64)
    }

    /// Removes exactly the records with the given identifiers, in one transaction. Returns the
    /// number of rows removed.
    pub(crate) async fn delete(&self, ids: &[i64]) -> Res<u64> {
        let mut tx = self
            .pool
            .begin()
            .await
            .context("Unable to begin a delete transaction")?;
        let mut removed = 0;
        for id in ids {
            removed += sqlx::query("DELETE FROM new_budget_record WHERE id = ?")
                .bind(*id)
                .execute(&mut *tx)
                .await
                .with_context(|| format!("Unable to delete record {id}"))?
                .rows_affected();
        }
        tx.commit()
            .await
            .context("Unable to commit the delete transaction")?;
        Ok(removed)
    }

    /// Removes every queued record. Returns the number of rows removed.
    pub(crate) async fn clear(&self) -> Res<u64> {
        let result = sqlx::query("DELETE FROM new_budget_record")
            .execute(&self.pool)
            .await
            .context("Unable to clear the queued records")?;
        Ok(result.rows_affected())
    }

    /// Closes the store. The handle cannot be used afterwards.
    pub(crate) async fn close(self) {
        debug!("Closing store at {}", self.path.display());
        self.pool.close().await;
    }
}

/// A single connection serializes every operation against the store.
async fn connect(path: &Path, create: bool) -> Res<SqlitePool> {
    let options = SqliteConnectOptions::new()
        .filename(path)
        .create_if_missing(create);
    SqlitePoolOptions::new()
        .max_connections(1)
        .connect_with(options)
        .await
        .with_context(|| format!("Unable to open the SQLite file at '{}'", path.display()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    fn record(value: serde_json::Value) -> Record {
        Record::try_from(value).unwrap()
    }

    fn store_path(dir: &TempDir) -> PathBuf {
        dir.path().join(format!("{STORE_NAME}.sqlite"))
    }

    #[tokio::test]
    async fn test_open_creates_then_reopens() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);

        let db = Db::open(&path).await.unwrap();
        assert!(path.is_file());
        db.insert(&record(json!({"amount": 50}))).await.unwrap();
        db.close().await;

        let db = Db::open(&path).await.unwrap();
        assert_eq!(db.count().await.unwrap(), 1);
        assert_eq!(db.path(), path.as_path());
    }

    #[tokio::test]
    async fn test_init_fails_when_file_exists() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        Db::init(&path).await.unwrap().close().await;
        assert!(Db::init(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_load_fails_when_missing() {
        let dir = TempDir::new().unwrap();
        assert!(Db::load(store_path(&dir)).await.is_err());
    }

    #[tokio::test]
    async fn test_load_rejects_newer_schema() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let db = Db::init(&path).await.unwrap();
        sqlx::query("UPDATE schema_version SET version = 99")
            .execute(&db.pool)
            .await
            .unwrap();
        db.close().await;

        let err = Db::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("schema version 99"));
    }

    #[tokio::test]
    async fn test_load_rejects_foreign_sqlite_file() {
        let dir = TempDir::new().unwrap();
        let path = store_path(&dir);
        let pool = connect(&path, true).await.unwrap();
        sqlx::query("CREATE TABLE something_else (x INTEGER)")
            .execute(&pool)
            .await
            .unwrap();
        pool.close().await;

        assert!(Db::load(&path).await.is_err());
    }

    #[tokio::test]
    async fn test_all_returns_insertion_order() {
        let dir = TempDir::new().unwrap();
        let db = Db::open(store_path(&dir)).await.unwrap();
        let first = db.insert(&record(json!({"amount": 50}))).await.unwrap();
        let second = db.insert(&record(json!({"amount": -20}))).await.unwrap();
        assert!(second > first);

        let all = db.all().await.unwrap();
        let ids: Vec<i64> = all.iter().map(|q| q.id).collect();
        assert_eq!(ids, vec![first, second]);
        assert_eq!(all[0].record, record(json!({"amount": 50})));
        assert_eq!(all[1].record, record(json!({"amount": -20})));
    }

    #[tokio::test]
    async fn test_delete_only_removes_given_ids() {
        let dir = TempDir::new().unwrap();
        let db = Db::open(store_path(&dir)).await.unwrap();
        let a = db.insert(&record(json!({"n": 1}))).await.unwrap();
        let b = db.insert(&record(json!({"n": 2}))).await.unwrap();
        let c = db.insert(&record(json!({"n": 3}))).await.unwrap();

        assert_eq!(db.delete(&[a, c]).await.unwrap(), 2);
        let left: Vec<i64> = db.all().await.unwrap().iter().map(|q| q.id).collect();
        assert_eq!(left, vec![b]);

        // deleting an id that is already gone is not an error
        assert_eq!(db.delete(&[a]).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_ids_are_never_reused() {
        let dir = TempDir::new().unwrap();
        let db = Db::open(store_path(&dir)).await.unwrap();
        let a = db.insert(&record(json!({"n": 1}))).await.unwrap();
        let b = db.insert(&record(json!({"n": 2}))).await.unwrap();
        assert_eq!(db.clear().await.unwrap(), 2);
        assert_eq!(db.count().await.unwrap(), 0);

        let c = db.insert(&record(json!({"n": 3}))).await.unwrap();
        assert!(c > a.max(b));
    }
}
