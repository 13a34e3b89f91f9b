use crate::commands::Out;
use crate::error::{ErrorType, IntoResult, Res};
use crate::{Config, Mode, OfflineQueue, QueuedRecord, Result};
use anyhow::Context;

/// Returns the records waiting to be sent, oldest first. Each one is also written to stdout as a
/// line of JSON.
pub async fn list(config: Config, mode: Mode) -> Result<Out<Vec<QueuedRecord>>> {
    let queue = OfflineQueue::open(&config, mode).await?;
    let pending = queue.pending().await?;
    queue.close().await;
    for line in json_lines(&pending).pub_result(ErrorType::Internal)? {
        println!("{line}");
    }
    Ok(Out::new(
        format!("{} record(s) waiting to be sent", pending.len()),
        pending,
    ))
}

fn json_lines(pending: &[QueuedRecord]) -> Res<Vec<String>> {
    pending
        .iter()
        .map(|queued| {
            serde_json::to_string(queued)
                .with_context(|| format!("Unable to serialize record {}", queued.id))
        })
        .collect()
}
