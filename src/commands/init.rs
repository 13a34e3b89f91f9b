use crate::commands::Out;
use crate::error::{ErrorType, IntoResult};
use crate::{Config, Result};
use anyhow::Context;
use std::path::Path;

/// Creates the home directory with:
/// - a `config.json` file pointing at `origin` (and `endpoint`, if given) with default settings
/// - the `.sent` directory for archived batches
/// - an empty local store
///
/// # Arguments
/// - `home` - The directory to create, e.g. `$HOME/budget-queue`
/// - `origin` - The base URL of the budget API, e.g. `https://budget.example.com`
/// - `endpoint` - The path records are posted to. Defaults to `/api/transaction/bulk`.
///
/// # Errors
/// - Returns an error if the directory is already initialized, the URL is invalid, or any file
///   operation fails.
pub async fn init(home: &Path, origin: &str, endpoint: Option<&str>) -> Result<Out<()>> {
    let config = Config::create(home, origin, endpoint)
        .await
        .context("Unable to create the home directory and config")
        .pub_result(ErrorType::Config)?;
    Ok(format!(
        "Created {}, records will be sent to {}",
        config.root().display(),
        config.upload_url()
    )
    .into())
}
