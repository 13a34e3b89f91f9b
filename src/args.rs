//! These structs provide the CLI interface for the budgetq CLI.

use clap::{Parser, Subcommand};
use std::convert::Infallible;
use std::fmt::{Display, Formatter};
use std::ops::Deref;
use std::path::{Path, PathBuf};
use std::str::FromStr;
use tracing::error;
use tracing_subscriber::filter::LevelFilter;

/// budgetq: keep budget entries safe while offline and send them when the network returns.
///
/// Entries are saved to a local store with `budgetq save`. `budgetq drain` sends everything that is
/// queued to your budget API in a single request and removes it from the store once the server
/// accepts it. `budgetq watch` does this automatically whenever the API becomes reachable.
#[derive(Debug, Parser, Clone)]
pub struct Args {
    #[clap(flatten)]
    common: Common,

    #[command(subcommand)]
    command: Command,
}

impl Args {
    pub fn new(common: Common, command: Command) -> Self {
        Self { common, command }
    }

    pub fn common(&self) -> &Common {
        &self.common
    }

    pub fn command(&self) -> &Command {
        &self.command
    }
}

#[derive(Subcommand, Debug, Clone)]
pub enum Command {
    /// Create the home directory, its config file and the local store.
    ///
    /// Run this once before anything else. You need the base URL of your budget API, e.g.
    /// https://budget.example.com. Records are posted to `/api/transaction/bulk` under it unless
    /// you pass a different --endpoint.
    Init(InitArgs),
    /// Save one record to the local queue.
    Save(SaveArgs),
    /// Show the records that are waiting to be sent.
    List,
    /// Send every queued record to the API in one request.
    Drain,
    /// Keep running and send the queue whenever the API becomes reachable.
    Watch(WatchArgs),
    /// Throw away every queued record without sending it.
    Clear,
}

/// Arguments common to all subcommands.
#[derive(Debug, Parser, Clone)]
pub struct Common {
    /// The logging verbosity. One of, from least to most verbose:
    /// off, error, warn, info, debug, trace
    ///
    /// This can be overridden by RUST_LOG.
    #[arg(long, default_value_t = LevelFilter::INFO)]
    log_level: LevelFilter,

    /// The directory where the config and the local store are kept. Defaults to ~/budget-queue
    #[arg(long, env = "BUDGET_QUEUE_HOME", default_value_t = default_home())]
    home: DisplayPath,
}

impl Common {
    pub fn new(log_level: LevelFilter, home: PathBuf) -> Self {
        Self {
            log_level,
            home: home.into(),
        }
    }

    pub fn log_level(&self) -> LevelFilter {
        self.log_level
    }

    pub fn home(&self) -> &DisplayPath {
        &self.home
    }
}

/// (Not shown): Args for the `budgetq init` command.
#[derive(Debug, Parser, Clone)]
pub struct InitArgs {
    /// The base URL of your budget API, e.g. https://budget.example.com
    #[arg(long)]
    origin: String,

    /// The path, relative to the origin, that queued records are posted to.
    #[arg(long)]
    endpoint: Option<String>,
}

impl InitArgs {
    pub fn new(origin: impl Into<String>, endpoint: Option<String>) -> Self {
        Self {
            origin: origin.into(),
            endpoint,
        }
    }

    pub fn origin(&self) -> &str {
        &self.origin
    }

    pub fn endpoint(&self) -> Option<&str> {
        self.endpoint.as_deref()
    }
}

/// (Not shown): Args for the `budgetq save` command.
#[derive(Debug, Parser, Clone)]
pub struct SaveArgs {
    /// The record as a JSON object, e.g. '{"name": "coffee", "value": -4.5}'
    #[arg(long, conflicts_with = "file")]
    json: Option<String>,

    /// Read the record from this file. When neither --json nor --file is given the record is read
    /// from stdin.
    #[arg(long)]
    file: Option<PathBuf>,
}

/// Where the record for `budgetq save` comes from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RecordSource {
    Inline(String),
    File(PathBuf),
    Stdin,
}

impl SaveArgs {
    pub fn new(source: RecordSource) -> Self {
        match source {
            RecordSource::Inline(json) => Self {
                json: Some(json),
                file: None,
            },
            RecordSource::File(file) => Self {
                json: None,
                file: Some(file),
            },
            RecordSource::Stdin => Self {
                json: None,
                file: None,
            },
        }
    }

    pub fn source(&self) -> RecordSource {
        match (&self.json, &self.file) {
            (Some(json), _) => RecordSource::Inline(json.clone()),
            (None, Some(file)) => RecordSource::File(file.clone()),
            (None, None) => RecordSource::Stdin,
        }
    }
}

/// (Not shown): Args for the `budgetq watch` command.
#[derive(Debug, Parser, Clone, Default)]
pub struct WatchArgs {
    /// Seconds between connectivity checks. Defaults to `probe_interval_secs` from the config.
    #[arg(long)]
    interval: Option<u64>,

    /// Stop after this many connectivity checks instead of running until interrupted.
    #[arg(long)]
    polls: Option<usize>,
}

impl WatchArgs {
    pub fn new(interval: Option<u64>, polls: Option<usize>) -> Self {
        Self { interval, polls }
    }

    pub fn interval(&self) -> Option<u64> {
        self.interval
    }

    pub fn polls(&self) -> Option<usize> {
        self.polls
    }
}

fn default_home() -> DisplayPath {
    DisplayPath(match dirs::home_dir() {
        Some(home) => home.join("budget-queue"),
        None => {
            error!(
                "There was an error when trying to get your home directory. You can get around \
                this by providing --home or BUDGET_QUEUE_HOME instead of relying on the default \
                home directory.",
            );
            PathBuf::from("budget-queue")
        }
    })
}

#[derive(Debug, Default, Clone, Eq, PartialEq, Ord, PartialOrd, Hash)]
pub struct DisplayPath(PathBuf);

impl From<PathBuf> for DisplayPath {
    fn from(value: PathBuf) -> Self {
        DisplayPath(value)
    }
}

impl Deref for DisplayPath {
    type Target = Path;

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl AsRef<Path> for DisplayPath {
    fn as_ref(&self) -> &Path {
        &self.0
    }
}

impl Display for DisplayPath {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.to_string_lossy())
    }
}

impl FromStr for DisplayPath {
    type Err = Infallible;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(Self(PathBuf::from(s)))
    }
}

impl DisplayPath {
    pub fn path(&self) -> &Path {
        &self.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(argv: &[&str]) -> Args {
        Args::try_parse_from(argv).unwrap()
    }

    #[test]
    fn test_parse_init() {
        let args = parse(&[
            "budgetq",
            "--home",
            "/tmp/bq",
            "init",
            "--origin",
            "http://localhost:3001",
        ]);
        assert_eq!(args.common().home().path(), Path::new("/tmp/bq"));
        match args.command() {
            Command::Init(init) => {
                assert_eq!(init.origin(), "http://localhost:3001");
                assert_eq!(init.endpoint(), None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_parse_save_sources() {
        let args = parse(&["budgetq", "save", "--json", r#"{"amount": 5}"#]);
        match args.command() {
            Command::Save(save) => {
                assert_eq!(save.source(), RecordSource::Inline(r#"{"amount": 5}"#.into()))
            }
            other => panic!("unexpected command {other:?}"),
        }

        let args = parse(&["budgetq", "save"]);
        match args.command() {
            Command::Save(save) => assert_eq!(save.source(), RecordSource::Stdin),
            other => panic!("unexpected command {other:?}"),
        }

        assert!(Args::try_parse_from(["budgetq", "save", "--json", "{}", "--file", "x"]).is_err());
    }

    #[test]
    fn test_parse_watch_and_log_level() {
        let args = parse(&["budgetq", "--log-level", "debug", "watch", "--polls", "3"]);
        assert_eq!(args.common().log_level(), LevelFilter::DEBUG);
        match args.command() {
            Command::Watch(watch) => {
                assert_eq!(watch.polls(), Some(3));
                assert_eq!(watch.interval(), None);
            }
            other => panic!("unexpected command {other:?}"),
        }
    }

    #[test]
    fn test_save_args_round_trip_source() {
        let source = RecordSource::File(PathBuf::from("entry.json"));
        assert_eq!(SaveArgs::new(source.clone()).source(), source);
    }
}
