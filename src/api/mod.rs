//! The remote side of the queue: the endpoint that accepts a batch of records.
//!
//! `Remote` is the seam between the queue and the network. `HttpRemote` posts to the configured
//! URL, `TestRemote` keeps everything in memory so the whole program can run without a server.

mod http;
mod test_remote;

use crate::error::Res;
use crate::record::Record;
use crate::Config;
use anyhow::bail;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::debug;

pub(crate) use http::HttpRemote;
#[cfg(test)]
pub(crate) use test_remote::TestReply;
pub(crate) use test_remote::TestRemote;

/// The `Accept` header sent with every upload.
pub(crate) const ACCEPT: &str = "application/json, text/plain, */*";

/// The `Content-Type` header sent with every upload.
pub(crate) const CONTENT_TYPE: &str = "application/json";

/// The environment variable that switches the program into `Mode::Testing`.
pub const TEST_MODE_ENV: &str = "BUDGET_QUEUE_IN_TEST_MODE";

/// Selects the real HTTP endpoint or the in-memory stand-in.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Mode {
    #[default]
    Remote,
    Testing,
}

serde_plain::derive_display_from_serialize!(Mode);
serde_plain::derive_fromstr_from_deserialize!(Mode);

impl Mode {
    /// `Mode::Testing` when `BUDGET_QUEUE_IN_TEST_MODE` is set to a non-empty value, otherwise
    /// `Mode::Remote`.
    pub fn from_env() -> Self {
        match std::env::var(TEST_MODE_ENV) {
            Ok(value) if !value.is_empty() => Mode::Testing,
            _ => Mode::Remote,
        }
    }
}

/// Something that accepts a batch of records.
#[async_trait::async_trait]
pub(crate) trait Remote: Send {
    /// Sends `records` as a single JSON array and returns the parsed JSON response body.
    ///
    /// Fails if the request cannot be completed or the response body is not JSON. Whether the
    /// body means success is decided by `check_reply`.
    async fn upload(&mut self, records: &[Record]) -> Res<Value>;
}

/// Creates the `Remote` for `mode`.
pub(crate) fn remote(config: &Config, mode: Mode) -> Res<Box<dyn Remote>> {
    debug!("Using the {mode} remote");
    Ok(match mode {
        Mode::Remote => Box::new(HttpRemote::new(config)?),
        Mode::Testing => Box::new(TestRemote::default()),
    })
}

/// A reply is an acknowledgment unless it is an object carrying a `message` field, which is how
/// the server reports that it refused the batch.
pub(crate) fn check_reply(reply: &Value) -> Res<()> {
    if let Some(message) = reply.get("message") {
        match message.as_str() {
            Some(text) => bail!("The server rejected the batch: {text}"),
            None => bail!("The server rejected the batch: {message}"),
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_check_reply_acknowledged() {
        assert!(check_reply(&json!({})).is_ok());
        assert!(check_reply(&json!({"inserted": 2})).is_ok());
        assert!(check_reply(&json!([{"_id": "a"}, {"_id": "b"}])).is_ok());
        assert!(check_reply(&json!(null)).is_ok());
    }

    #[test]
    fn test_check_reply_rejected() {
        let err = check_reply(&json!({"message": "validation failed"})).unwrap_err();
        assert!(err.to_string().contains("validation failed"));
        assert!(check_reply(&json!({"message": null})).is_err());
        assert!(check_reply(&json!({"errors": [], "message": 42})).is_err());
    }

    #[test]
    fn test_mode_round_trip_names() {
        assert_eq!(Mode::Testing.to_string(), "testing");
        assert_eq!("remote".parse::<Mode>().unwrap(), Mode::Remote);
    }
}
