use crate::commands::Out;
use crate::{Config, Mode, OfflineQueue, Result};

/// Discards every queued record without sending it. Returns how many were discarded.
pub async fn clear(config: Config, mode: Mode) -> Result<Out<u64>> {
    let queue = OfflineQueue::open(&config, mode).await?;
    let removed = queue.clear().await?;
    queue.close().await;
    Ok(Out::new(format!("Discarded {removed} record(s)"), removed))
}
