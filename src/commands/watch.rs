use crate::args::WatchArgs;
use crate::commands::Out;
use crate::connectivity;
use crate::error::{ErrorType, IntoResult};
use crate::watch::{self as watcher, WatchOptions, WatchSummary};
use crate::{Config, Error, Mode, OfflineQueue, Result};
use anyhow::anyhow;
use std::future::Future;
use std::time::Duration;
use tracing::{info, warn};

/// Keeps running, draining the queue when the remote is reachable at start and every time it
/// becomes reachable again. Stops on Ctrl-C or after `--polls` checks.
pub async fn watch(config: Config, mode: Mode, args: WatchArgs) -> Result<Out<WatchSummary>> {
    let options = WatchOptions {
        interval: args
            .interval()
            .map(Duration::from_secs)
            .unwrap_or_else(|| config.probe_interval()),
        max_polls: args.polls(),
    };
    if options.interval.is_zero() {
        return Err(Error::new(
            ErrorType::Request,
            anyhow!("The interval between connectivity checks must be at least one second"),
        ));
    }
    let mut connectivity =
        connectivity::connectivity(&config, mode).pub_result(ErrorType::Config)?;
    let mut queue = OfflineQueue::open(&config, mode).await?;

    info!(
        "Watching {} every {:?}, press Ctrl-C to stop",
        config.upload_url(),
        options.interval
    );
    let shutdown = shutdown_on(tokio::signal::ctrl_c());
    let summary = watcher::run(&mut queue, connectivity.as_mut(), &options, shutdown).await;
    queue.close().await;

    Ok(Out::new(
        format!(
            "Stopped watching after {} check(s), sent {} record(s)",
            summary.polls, summary.uploaded
        ),
        summary,
    ))
}

/// Completes when `signal` fires. If the signal cannot be listened for, this never completes.
async fn shutdown_on<F>(signal: F)
where
    F: Future<Output = std::io::Result<()>>,
{
    if let Err(e) = signal.await {
        warn!("Unable to listen for Ctrl-C, only --polls will stop watching: {e}");
        std::future::pending::<()>().await;
    }
}
