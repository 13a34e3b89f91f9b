//! Configuration file handling.
//!
//! The configuration file is stored at `$BUDGET_QUEUE_HOME/config.json`. It names the remote API
//! the queue drains to, along with a few tuning knobs. The home directory also holds the local
//! store and the archive of sent batches.

use crate::db::STORE_NAME;
use crate::error::Res;
use crate::utils;
use anyhow::{bail, ensure, Context};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;
use url::Url;

const APP_NAME: &str = "budget-queue";
const CONFIG_VERSION: u8 = 1;
const CONFIG_JSON: &str = "config.json";
const SENT: &str = ".sent";

/// The endpoint used when `config.json` does not name one.
pub(crate) const DEFAULT_ENDPOINT: &str = "/api/transaction/bulk";
const ARCHIVE_COPIES: u32 = 5;
const PROBE_INTERVAL_SECS: u64 = 5;

/// The `Config` object represents the configuration of the app. You instantiate it by providing
/// the path to `$BUDGET_QUEUE_HOME` and from there it loads `config.json`. It also provides the
/// paths of the other items that live in the home directory.
#[derive(Debug, Clone)]
pub struct Config {
    root: PathBuf,
    config_path: PathBuf,
    store_path: PathBuf,
    sent_dir: PathBuf,
    upload_url: Url,
    config_file: ConfigFile,
}

impl Config {
    /// Creates the home directory and:
    /// - writes an initial `config.json` pointing at `origin`
    /// - creates the local store
    ///
    /// # Arguments
    /// - `dir` - The home directory, e.g. `$HOME/budget-queue`. Created if missing.
    /// - `origin` - The base URL of the budget API, e.g. `https://budget.example.com`.
    /// - `endpoint` - The path records are posted to. Defaults to `/api/transaction/bulk`.
    ///
    /// # Errors
    /// - Returns an error if `origin` is not a valid URL, if a `config.json` already exists, or if
    ///   any file operation fails.
    pub async fn create(
        dir: impl Into<PathBuf>,
        origin: &str,
        endpoint: Option<&str>,
    ) -> Res<Self> {
        let maybe_relative = dir.into();
        utils::make_dir(&maybe_relative)
            .await
            .context("Unable to create the home directory")?;
        let root = utils::canonicalize(&maybe_relative).await?;

        let config_path = root.join(CONFIG_JSON);
        if config_path.exists() {
            bail!(
                "A config file already exists at '{}'",
                config_path.display()
            );
        }

        let config_file = ConfigFile {
            origin: origin.to_string(),
            endpoint: endpoint.map(str::to_string),
            ..ConfigFile::default()
        };
        let upload_url = config_file.upload_url()?;
        config_file.save(&config_path).await?;

        let sent_dir = root.join(SENT);
        utils::make_dir(&sent_dir).await?;

        let store_path = root.join(format!("{STORE_NAME}.sqlite"));
        crate::db::Db::open(&store_path)
            .await
            .context("Unable to create the local store")?
            .close()
            .await;

        Ok(Self {
            root,
            config_path,
            store_path,
            sent_dir,
            upload_url,
            config_file,
        })
    }

    /// Validates that the home directory and its `config.json` exist, then loads them.
    pub async fn load(home: impl Into<PathBuf>) -> Res<Self> {
        let maybe_relative = home.into();
        let root = utils::canonicalize(&maybe_relative)
            .await
            .context("The home directory is missing, run 'budgetq init' first")?;

        let config_path = root.join(CONFIG_JSON);
        if !config_path.is_file() {
            bail!("The config file is missing '{}'", config_path.display())
        }
        let config_file = ConfigFile::load(&config_path).await?;
        let upload_url = config_file.upload_url()?;

        Ok(Self {
            store_path: root.join(format!("{STORE_NAME}.sqlite")),
            sent_dir: root.join(SENT),
            root,
            config_path,
            upload_url,
            config_file,
        })
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn config_path(&self) -> &Path {
        &self.config_path
    }

    pub fn store_path(&self) -> &Path {
        &self.store_path
    }

    /// Where copies of successfully uploaded batches are kept.
    pub fn sent_dir(&self) -> &Path {
        &self.sent_dir
    }

    /// The full URL that queued records are posted to.
    pub fn upload_url(&self) -> &Url {
        &self.upload_url
    }

    pub fn archive_copies(&self) -> u32 {
        self.config_file.archive_copies
    }

    pub fn probe_interval(&self) -> Duration {
        Duration::from_secs(self.config_file.probe_interval_secs)
    }

    /// `None` means a request may wait forever.
    pub fn request_timeout(&self) -> Option<Duration> {
        self.config_file.request_timeout_secs.map(Duration::from_secs)
    }
}

/// Represents the serialization and deserialization format of the configuration file.
///
/// Example configuration:
/// ```json
/// {
///   "app_name": "budget-queue",
///   "config_version": 1,
///   "origin": "https://budget.example.com",
///   "endpoint": "/api/transaction/bulk",
///   "archive_copies": 5,
///   "probe_interval_secs": 5,
///   "request_timeout_secs": 30
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, Eq, PartialEq)]
struct ConfigFile {
    /// Application name, should always be "budget-queue"
    app_name: String,

    config_version: u8,

    /// Base URL of the budget API
    origin: String,

    /// Path, relative to `origin`, that batches are posted to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    endpoint: Option<String>,

    /// Number of sent-batch archive files to keep, 0 turns archiving off
    #[serde(default = "default_archive_copies")]
    archive_copies: u32,

    /// Seconds between connectivity checks in `watch`
    #[serde(default = "default_probe_interval_secs")]
    probe_interval_secs: u64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    request_timeout_secs: Option<u64>,
}

fn default_archive_copies() -> u32 {
    ARCHIVE_COPIES
}

fn default_probe_interval_secs() -> u64 {
    PROBE_INTERVAL_SECS
}

impl Default for ConfigFile {
    fn default() -> Self {
        Self {
            app_name: APP_NAME.to_string(),
            config_version: CONFIG_VERSION,
            origin: String::new(),
            endpoint: None,
            archive_copies: ARCHIVE_COPIES,
            probe_interval_secs: PROBE_INTERVAL_SECS,
            request_timeout_secs: None,
        }
    }
}

impl ConfigFile {
    async fn load(path: &Path) -> Res<Self> {
        let config: ConfigFile = utils::deserialize(path).await?;
        ensure!(
            config.app_name == APP_NAME,
            "Invalid app_name in config file: expected '{}', got '{}'",
            APP_NAME,
            config.app_name
        );
        ensure!(
            config.config_version == CONFIG_VERSION,
            "Unsupported config_version {} in config file, expected {}",
            config.config_version,
            CONFIG_VERSION
        );
        ensure!(
            config.probe_interval_secs > 0,
            "probe_interval_secs must be greater than zero"
        );
        Ok(config)
    }

    async fn save(&self, path: &Path) -> Res<()> {
        let data = serde_json::to_string_pretty(self).context("Unable to serialize config")?;
        utils::write(path, data)
            .await
            .context("Unable to write config file")
    }

    fn endpoint(&self) -> &str {
        self.endpoint.as_deref().unwrap_or(DEFAULT_ENDPOINT)
    }

    /// Resolves the endpoint against the origin the way a browser resolves a relative `fetch`.
    fn upload_url(&self) -> Res<Url> {
        let origin = Url::parse(&self.origin)
            .with_context(|| format!("Invalid origin URL '{}'", self.origin))?;
        ensure!(
            matches!(origin.scheme(), "http" | "https"),
            "The origin URL must use http or https, got '{}'",
            origin.scheme()
        );
        origin
            .join(self.endpoint())
            .with_context(|| format!("Invalid endpoint '{}'", self.endpoint()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_config_create_and_load() {
        let dir = TempDir::new().unwrap();
        let home = dir.path().join("budget-queue");

        let created = Config::create(&home, "https://budget.example.com", None)
            .await
            .unwrap();
        assert!(created.config_path().is_file());
        assert!(created.store_path().is_file());
        assert!(created.sent_dir().is_dir());
        assert_eq!(
            created.upload_url().as_str(),
            "https://budget.example.com/api/transaction/bulk"
        );

        let loaded = Config::load(&home).await.unwrap();
        assert_eq!(loaded.root(), created.root());
        assert_eq!(loaded.upload_url(), created.upload_url());
        assert_eq!(loaded.archive_copies(), 5);
        assert_eq!(loaded.probe_interval(), Duration::from_secs(5));
        assert_eq!(loaded.request_timeout(), None);
    }

    #[tokio::test]
    async fn test_config_create_twice_fails() {
        let dir = TempDir::new().unwrap();
        Config::create(dir.path(), "http://localhost:3001", None)
            .await
            .unwrap();
        assert!(Config::create(dir.path(), "http://localhost:3001", None)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_config_create_rejects_bad_origin() {
        let dir = TempDir::new().unwrap();
        assert!(Config::create(dir.path(), "not a url", None).await.is_err());
        assert!(Config::create(dir.path(), "ftp://example.com", None)
            .await
            .is_err());
        assert!(!dir.path().join(CONFIG_JSON).exists());
    }

    #[tokio::test]
    async fn test_config_load_missing_home() {
        let dir = TempDir::new().unwrap();
        assert!(Config::load(dir.path().join("nope")).await.is_err());
        assert!(Config::load(dir.path()).await.is_err());
    }

    #[tokio::test]
    async fn test_config_file_minimal() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{
            "app_name": "budget-queue",
            "config_version": 1,
            "origin": "http://localhost:3001"
        }"#;
        utils::write(&path, json).await.unwrap();

        let config = ConfigFile::load(&path).await.unwrap();
        assert_eq!(config.endpoint(), DEFAULT_ENDPOINT);
        assert_eq!(config.archive_copies, ARCHIVE_COPIES);
        assert_eq!(config.probe_interval_secs, PROBE_INTERVAL_SECS);
        assert_eq!(
            config.upload_url().unwrap().as_str(),
            "http://localhost:3001/api/transaction/bulk"
        );
    }

    #[tokio::test]
    async fn test_config_file_invalid_app_name() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let json = r#"{"app_name": "some-other-app", "config_version": 1, "origin": "http://x"}"#;
        utils::write(&path, json).await.unwrap();

        let err = ConfigFile::load(&path).await.unwrap_err();
        assert!(err.to_string().contains("Invalid app_name"));
    }

    #[tokio::test]
    async fn test_config_file_save_and_load() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join(CONFIG_JSON);
        let original = ConfigFile {
            origin: "https://budget.example.com".to_string(),
            endpoint: Some("/bulk".to_string()),
            archive_copies: 2,
            probe_interval_secs: 9,
            request_timeout_secs: Some(30),
            ..ConfigFile::default()
        };
        original.save(&path).await.unwrap();
        assert_eq!(original, ConfigFile::load(&path).await.unwrap());
    }

    #[test]
    fn test_config_file_omits_none_fields() {
        let json = serde_json::to_string(&ConfigFile::default()).unwrap();
        assert!(!json.contains("endpoint"));
        assert!(!json.contains("request_timeout_secs"));
    }

    #[test]
    fn test_upload_url_joins_endpoint() {
        let mut config = ConfigFile {
            origin: "https://budget.example.com/app/".to_string(),
            ..ConfigFile::default()
        };
        assert_eq!(
            config.upload_url().unwrap().as_str(),
            "https://budget.example.com/api/transaction/bulk"
        );
        config.endpoint = Some("queue/flush".to_string());
        assert_eq!(
            config.upload_url().unwrap().as_str(),
            "https://budget.example.com/app/queue/flush"
        );
    }
}
