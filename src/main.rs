use budget_queue::args::{Args, Command};
use budget_queue::{commands, Config, Error, ErrorType, Mode, Result};
use clap::Parser;
use std::path::Path;
use std::process::ExitCode;
use tracing::{debug, error, trace};
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> ExitCode {
    let args = Args::parse();
    let log_level = args.common().log_level();
    init_logger(log_level);
    debug!("Log level set to {}", log_level.to_string().to_lowercase());

    match main_inner(args).await {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            error!("Exiting with error: {e}");
            ExitCode::FAILURE
        }
    }
}

pub async fn main_inner(args: Args) -> Result<()> {
    trace!("{args:?}");
    let home = args.common().home().path();

    // When BUDGET_QUEUE_IN_TEST_MODE is set and non-empty, uploads go to an in-memory stand-in
    // that accepts everything instead of the configured endpoint.
    let mode = Mode::from_env();

    let _: () = match args.command() {
        Command::Init(init_args) => {
            commands::init(home, init_args.origin(), init_args.endpoint())
                .await?
                .print()
        }

        Command::Save(save_args) => commands::save(load(home).await?, mode, save_args.source())
            .await?
            .print(),

        Command::List => commands::list(load(home).await?, mode).await?.print(),

        Command::Drain => commands::drain(load(home).await?, mode).await?.print(),

        Command::Watch(watch_args) => {
            commands::watch(load(home).await?, mode, watch_args.clone())
                .await?
                .print()
        }

        Command::Clear => commands::clear(load(home).await?, mode).await?.print(),
    };
    Ok(())
}

async fn load(home: &Path) -> Result<Config> {
    Config::load(home)
        .await
        .map_err(|e| Error::new(ErrorType::Config, e))
}

/// Initializes the tracing subscriber.
pub fn init_logger(level: LevelFilter) {
    let filter = match std::env::var("RUST_LOG").ok() {
        // RUST_LOG exists; use it.
        Some(_) => EnvFilter::from_default_env(),
        // RUST_LOG does not exist; use the given level for this crate only.
        None => EnvFilter::new(format!(
            "budget_queue={},{}={}",
            level,
            env!("CARGO_BIN_NAME"),
            level
        )),
    };

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .init();
}
