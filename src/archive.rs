//! Keeps a copy of every batch that was successfully uploaded.
//!
//! Once a batch is acknowledged it is removed from the store, so the archive is the only local
//! trace of it. Files are named `sent.YYYY-MM-DD-NNN.json` and only the newest `copies` are kept.

use crate::error::Res;
use crate::record::Record;
use crate::{utils, Config};
use anyhow::Context;
use chrono::Local;
use std::path::PathBuf;

const PREFIX: &str = "sent";
const EXTENSION: &str = ".json";

#[derive(Debug, Clone)]
pub(crate) struct Archive {
    dir: PathBuf,
    copies: u32,
}

impl Archive {
    /// Returns `None` when archiving is turned off (`archive_copies` is 0).
    pub(crate) fn from_config(config: &Config) -> Option<Self> {
        match config.archive_copies() {
            0 => None,
            copies => Some(Self {
                dir: config.sent_dir().to_path_buf(),
                copies,
            }),
        }
    }

    /// Writes `batch` as pretty JSON, then deletes the oldest files beyond `copies`. Returns the
    /// path of the new file.
    pub(crate) async fn save(&self, batch: &[Record]) -> Res<PathBuf> {
        utils::make_dir(&self.dir).await?;
        let date = Local::now().format("%Y-%m-%d").to_string();
        let names = self.names().await?;
        let next = names
            .iter()
            .filter_map(|name| sequence(name, &date))
            .max()
            .unwrap_or(0)
            + 1;

        let path = self.dir.join(format!("{PREFIX}.{date}-{next:03}{EXTENSION}"));
        let json = serde_json::to_string_pretty(batch).context("Unable to serialize the batch")?;
        utils::write(&path, json).await?;

        self.prune().await?;
        Ok(path)
    }

    /// Archive file names, oldest first. The naming scheme sorts chronologically.
    async fn names(&self) -> Res<Vec<String>> {
        let mut names = Vec::new();
        let mut dir = utils::read_dir(&self.dir).await?;
        while let Some(entry) = dir
            .next_entry()
            .await
            .with_context(|| format!("Unable to list {}", self.dir.display()))?
        {
            let name = entry.file_name().to_string_lossy().to_string();
            if is_archive(&name) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    async fn prune(&self) -> Res<()> {
        let names = self.names().await?;
        let excess = names.len().saturating_sub(self.copies as usize);
        for name in names.iter().take(excess) {
            utils::remove(&self.dir.join(name)).await?;
        }
        Ok(())
    }

    #[cfg(test)]
    pub(crate) fn dir(&self) -> &std::path::Path {
        &self.dir
    }
}

fn is_archive(name: &str) -> bool {
    name.starts_with(&format!("{PREFIX}.")) && name.ends_with(EXTENSION)
}

/// The `NNN` of `sent.{date}-NNN.json`, if `name` belongs to `date`.
fn sequence(name: &str, date: &str) -> Option<u32> {
    name.strip_prefix(&format!("{PREFIX}.{date}-"))?
        .strip_suffix(EXTENSION)?
        .parse()
        .ok()
}
