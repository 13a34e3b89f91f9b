use crate::args::RecordSource;
use crate::commands::Out;
use crate::error::{ErrorType, IntoResult, Res};
use crate::record::Record;
use crate::{utils, Config, Mode, OfflineQueue, Result};
use anyhow::Context;
use tokio::io::AsyncReadExt;

/// Saves one record to the local queue. The record is not sent; use `drain` or `watch` for that.
///
/// Returns the number of records now waiting in the queue.
///
/// # Errors
/// - `ErrorType::Request` if the input cannot be read or is not a JSON object.
/// - `ErrorType::Store` if the store cannot be opened or written.
pub async fn save(config: Config, mode: Mode, source: RecordSource) -> Result<Out<u64>> {
    let record = read_record(&source).await.pub_result(ErrorType::Request)?;
    let queue = OfflineQueue::open(&config, mode).await?;
    queue.save(&record).await?;
    let queued = queue.len().await?;
    queue.close().await;
    Ok(Out::new(
        format!("Saved the record, {queued} waiting to be sent"),
        queued,
    ))
}

async fn read_record(source: &RecordSource) -> Res<Record> {
    let text = match source {
        RecordSource::Inline(json) => json.clone(),
        RecordSource::File(path) => utils::read(path).await?,
        RecordSource::Stdin => {
            let mut text = String::new();
            tokio::io::stdin()
                .read_to_string(&mut text)
                .await
                .context("Unable to read the record from stdin")?;
            text
        }
    };
    text.parse()
}
