//! Deciding when to drain: is the remote reachable, and did it just become reachable?

use crate::api::Mode;
use crate::error::Res;
use crate::Config;
use anyhow::Context;
use serde::Serialize;
use std::time::Duration;
use tokio::net::TcpStream;
use tracing::trace;
use url::Url;

/// How long a single reachability check may take.
const PROBE_TIMEOUT: Duration = Duration::from_secs(3);

/// Why a drain was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum Trigger {
    /// The remote was reachable when the program started.
    Load,
    /// The remote became reachable after being unreachable.
    Online,
}

serde_plain::derive_display_from_serialize!(Trigger);

/// Reports whether the remote can currently be reached.
#[async_trait::async_trait]
pub(crate) trait Connectivity: Send {
    async fn is_online(&mut self) -> bool;
}

/// Considers the remote reachable when a TCP connection to its host and port succeeds.
pub(crate) struct TcpProbe {
    host: String,
    port: u16,
    timeout: Duration,
}

impl TcpProbe {
    pub(crate) fn for_url(url: &Url, timeout: Duration) -> Res<Self> {
        let host = url
            .host_str()
            .with_context(|| format!("The URL '{url}' has no host"))?
            .to_string();
        let port = url
            .port_or_known_default()
            .with_context(|| format!("The URL '{url}' has no port"))?;
        Ok(Self {
            host,
            port,
            timeout,
        })
    }
}

#[async_trait::async_trait]
impl Connectivity for TcpProbe {
    async fn is_online(&mut self) -> bool {
        let address = (self.host.as_str(), self.port);
        let online = matches!(
            tokio::time::timeout(self.timeout, TcpStream::connect(address)).await,
            Ok(Ok(_))
        );
        trace!("{}:{} online: {online}", self.host, self.port);
        online
    }
}

/// Always gives the same answer. Used by `Mode::Testing`.
pub(crate) struct FixedConnectivity(pub(crate) bool);

#[async_trait::async_trait]
impl Connectivity for FixedConnectivity {
    async fn is_online(&mut self) -> bool {
        self.0
    }
}

/// Creates the `Connectivity` for `mode`.
pub(crate) fn connectivity(config: &Config, mode: Mode) -> Res<Box<dyn Connectivity>> {
    Ok(match mode {
        Mode::Remote => Box::new(TcpProbe::for_url(config.upload_url(), PROBE_TIMEOUT)?),
        Mode::Testing => Box::new(FixedConnectivity(true)),
    })
}

/// Turns a series of online/offline observations into drain triggers.
///
/// The first observation triggers `Load` if online. After that only an offline to online
/// transition triggers (`Online`). Staying online never triggers again.
#[derive(Debug, Default, Clone)]
pub struct OnlineTracker {
    last: Option<bool>,
}

impl OnlineTracker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn observe(&mut self, online: bool) -> Option<Trigger> {
        let trigger = match (self.last, online) {
            (None, true) => Some(Trigger::Load),
            (Some(false), true) => Some(Trigger::Online),
            _ => None,
        };
        self.last = Some(online);
        trigger
    }

    /// The most recent observation, if there has been one.
    pub fn is_online(&self) -> Option<bool> {
        self.last
    }
}
