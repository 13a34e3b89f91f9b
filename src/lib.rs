mod api;
mod archive;
pub mod args;
pub mod commands;
mod config;
mod connectivity;
mod db;
mod error;
mod queue;
mod record;
mod utils;
mod watch;


pub use api::Mode;
pub use config::Config;
pub use connectivity::{OnlineTracker, Trigger};
pub use error::{Error, ErrorType, Result};
pub use queue::{DrainOutcome, OfflineQueue, CONFIRMATION};
pub use record::{QueuedRecord, Record};
pub use watch::{WatchOptions, WatchSummary};
