use crate::commands::Out;
use crate::{Config, DrainOutcome, Mode, OfflineQueue, Result};

/// Sends everything that is queued in one request.
///
/// # Errors
/// - `ErrorType::Upload` if the request fails or the server rejects the batch. The queue is left
///   as it was.
/// - `ErrorType::Store` if the store cannot be read or the sent records cannot be removed.
pub async fn drain(config: Config, mode: Mode) -> Result<Out<DrainOutcome>> {
    let mut queue = OfflineQueue::open(&config, mode).await?;
    let result = queue.try_drain().await;
    queue.close().await;
    let outcome = result?;
    let message = match &outcome {
        DrainOutcome::Empty => "Nothing to send".to_string(),
        other => other.notice().unwrap_or_default().to_string(),
    };
    Ok(Out::new(message, outcome))
}
