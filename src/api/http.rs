//! Implements the `Remote` trait with a `reqwest` client.

use crate::api::{Remote, ACCEPT, CONTENT_TYPE};
use crate::error::Res;
use crate::record::Record;
use crate::Config;
use anyhow::Context;
use reqwest::header;
use serde_json::Value;
use tracing::{debug, trace};
use url::Url;

/// How much of a non-JSON response body is kept in the error message.
const BODY_EXCERPT_BYTES: usize = 200;

/// Posts batches to the configured upload URL.
pub(crate) struct HttpRemote {
    client: reqwest::Client,
    url: Url,
}

impl HttpRemote {
    pub(crate) fn new(config: &Config) -> Res<Self> {
        let mut builder = reqwest::Client::builder();
        if let Some(timeout) = config.request_timeout() {
            builder = builder.timeout(timeout);
        }
        let client = builder.build().context("Unable to create the HTTP client")?;
        Ok(Self {
            client,
            url: config.upload_url().clone(),
        })
    }
}

#[async_trait::async_trait]
impl Remote for HttpRemote {
    async fn upload(&mut self, records: &[Record]) -> Res<Value> {
        debug!("Posting {} record(s) to {}", records.len(), self.url);
        let response = self
            .client
            .post(self.url.clone())
            .header(header::CONTENT_TYPE, CONTENT_TYPE)
            .header(header::ACCEPT, ACCEPT)
            .json(records)
            .send()
            .await
            .with_context(|| format!("Unable to reach {}", self.url))?;

        // Only the body decides the outcome, not the status code.
        let status = response.status();
        trace!("Response status {status}");
        let body = response
            .bytes()
            .await
            .context("Unable to read the response body")?;
        serde_json::from_slice(&body).with_context(|| {
            format!(
                "The response from {} (status {status}) is not JSON: {}",
                self.url,
                excerpt(&body)
            )
        })
    }
}

/// The start of `body` as text, marked when anything was cut off.
fn excerpt(body: &[u8]) -> String {
    if body.len() <= BODY_EXCERPT_BYTES {
        return String::from_utf8_lossy(body).into_owned();
    }
    let text = String::from_utf8_lossy(&body[..BODY_EXCERPT_BYTES]);
    format!("{}... ({} bytes)", text, body.len())
}
