//! The offline queue: save records locally, drain them to the remote endpoint when possible.
//!
//! A drain walks through these phases, none of which is persisted:
//!
//! ```text
//! Idle -> Reading -> Empty -> Idle
//!                 -> Uploading -> Clearing -> Idle   (acknowledged)
//!                              -> Idle               (failed, queue untouched)
//! ```
//!
//! Only the identifiers that were part of the uploaded batch are removed, so a record saved while
//! an upload is in flight stays queued for the next drain.

use crate::api::{self, Mode, Remote};
use crate::archive::Archive;
use crate::db::Db;
use crate::error::{ErrorType, IntoResult};
use crate::record::{QueuedRecord, Record};
use crate::{Config, Error, Result};
use serde::Serialize;
use tracing::{debug, error, info, warn};

/// Shown to the user after the queue has been drained successfully.
pub const CONFIRMATION: &str = "All saved transactions have been submitted!";

/// The result of one drain attempt.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DrainOutcome {
    /// Nothing was queued, so nothing was sent.
    Empty,
    /// The server acknowledged `count` records and they were removed from the queue.
    Uploaded { count: usize },
    /// The attempt failed and the queue was left as it was.
    Failed { reason: String },
}

impl DrainOutcome {
    /// The message to show the user, if any.
    pub fn notice(&self) -> Option<&'static str> {
        match self {
            DrainOutcome::Uploaded { .. } => Some(CONFIRMATION),
            _ => None,
        }
    }
}

/// The full ordered snapshot of the queue at the moment a drain begins.
struct RemoteBatch {
    ids: Vec<i64>,
    records: Vec<Record>,
}

impl RemoteBatch {
    fn new(queued: Vec<QueuedRecord>) -> Self {
        let (ids, records) = queued.into_iter().map(|q| (q.id, q.record)).unzip();
        Self { ids, records }
    }

    fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

/// Owns the store handle and the remote for the lifetime of the process.
pub struct OfflineQueue {
    db: Db,
    remote: Box<dyn Remote>,
    archive: Option<Archive>,
}

impl OfflineQueue {
    /// Opens the local store (creating it if needed) and sets up the remote for `mode`.
    ///
    /// # Errors
    /// - `ErrorType::Store` if the store cannot be opened. Nothing is retried.
    /// - `ErrorType::Config` if the remote cannot be set up.
    pub async fn open(config: &Config, mode: Mode) -> Result<Self> {
        let db = match Db::open(config.store_path()).await {
            Ok(db) => db,
            Err(e) => {
                error!("Unable to open the local store: {e:#}");
                return Err(Error::new(ErrorType::Store, e));
            }
        };
        debug!("Opened store at {}", db.path().display());
        let remote = api::remote(config, mode).pub_result(ErrorType::Config)?;
        Ok(Self::new(db, remote, Archive::from_config(config)))
    }

    pub(crate) fn new(db: Db, remote: Box<dyn Remote>, archive: Option<Archive>) -> Self {
        Self {
            db,
            remote,
            archive,
        }
    }

    /// Appends `record` to the local queue. There is no duplicate detection.
    pub async fn save(&self, record: &Record) -> Result<()> {
        let id = self.db.insert(record).await.pub_result(ErrorType::Store)?;
        debug!("Queued record {id}");
        Ok(())
    }

    /// The number of records waiting to be uploaded.
    pub async fn len(&self) -> Result<u64> {
        self.db.count().await.pub_result(ErrorType::Store)
    }

    pub async fn is_empty(&self) -> Result<bool> {
        Ok(self.len().await? == 0)
    }

    /// The queued records in insertion order.
    pub async fn pending(&self) -> Result<Vec<QueuedRecord>> {
        self.db.all().await.pub_result(ErrorType::Store)
    }

    /// Discards every queued record without uploading it. Returns how many were discarded.
    pub async fn clear(&self) -> Result<u64> {
        self.db.clear().await.pub_result(ErrorType::Store)
    }

    /// Makes one attempt to upload everything that is queued.
    ///
    /// # Errors
    /// - `ErrorType::Store` if the queue cannot be read or the uploaded records cannot be removed.
    /// - `ErrorType::Upload` if the request fails, the reply is not JSON, or the reply carries a
    ///   `message`. The queue is left untouched.
    pub async fn try_drain(&mut self) -> Result<DrainOutcome> {
        debug!("Drain: reading");
        let batch = RemoteBatch::new(self.pending().await?);
        if batch.is_empty() {
            debug!("Drain: queue is empty");
            return Ok(DrainOutcome::Empty);
        }

        debug!("Drain: uploading {} record(s)", batch.records.len());
        let reply = self
            .remote
            .upload(&batch.records)
            .await
            .pub_result(ErrorType::Upload)?;
        api::check_reply(&reply).pub_result(ErrorType::Upload)?;

        debug!("Drain: clearing {} uploaded record(s)", batch.ids.len());
        let removed = self.db.delete(&batch.ids).await.pub_result(ErrorType::Store)?;
        if removed as usize != batch.ids.len() {
            warn!(
                "Expected to remove {} uploaded record(s) but removed {removed}",
                batch.ids.len()
            );
        }
        if let Some(archive) = &self.archive {
            match archive.save(&batch.records).await {
                Ok(path) => debug!("Archived the sent batch to {}", path.display()),
                Err(e) => warn!("Unable to archive the sent batch: {e:#}"),
            }
        }

        info!("Uploaded {} record(s)", batch.records.len());
        Ok(DrainOutcome::Uploaded {
            count: batch.records.len(),
        })
    }

    /// Like `try_drain`, but a failure is logged and reported as `DrainOutcome::Failed` instead of
    /// being returned as an error.
    pub async fn drain(&mut self) -> DrainOutcome {
        match self.try_drain().await {
            Ok(outcome) => outcome,
            Err(e) => {
                error!("Unable to drain the queue: {e}");
                DrainOutcome::Failed {
                    reason: e.to_string(),
                }
            }
        }
    }

    /// Closes the store handle.
    pub async fn close(self) {
        self.db.close().await;
    }
}
