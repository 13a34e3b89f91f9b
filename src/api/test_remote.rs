//! Implements the `Remote` trait in memory.
//!
//! Note: this is compiled even in the "production" version of this app so that the whole program
//! can run, top-to-bottom, without a server (see `Mode::Testing`).

use crate::api::Remote;
use crate::error::Res;
use crate::record::Record;
use anyhow::{anyhow, bail};
use serde_json::{json, Value};
use std::sync::{Arc, Mutex};
use tracing::info;

/// How a `TestRemote` answers an upload.
#[derive(Debug, Clone, PartialEq)]
pub(crate) enum TestReply {
    /// Reply with this JSON body.
    Body(Value),
    /// Behave as if the request never reached the server.
    NetworkDown,
    /// Reply with a body that is not JSON.
    NotJson,
}

impl Default for TestReply {
    fn default() -> Self {
        TestReply::Body(json!({}))
    }
}

#[derive(Debug, Default)]
struct State {
    reply: TestReply,
    attempts: usize,
    batches: Vec<Vec<Record>>,
}

/// Records every batch it receives and answers with a configurable reply. Clones share state, so a
/// test can keep one clone to inspect while the queue owns another.
#[derive(Debug, Clone, Default)]
pub(crate) struct TestRemote {
    state: Arc<Mutex<State>>,
}

// The accessors are only used by tests, but the type itself is used by `Mode::Testing`.
#[cfg_attr(not(test), allow(dead_code))]
impl TestRemote {
    pub(crate) fn replying(reply: TestReply) -> Self {
        let remote = Self::default();
        remote.set_reply(reply);
        remote
    }

    pub(crate) fn set_reply(&self, reply: TestReply) {
        self.lock().reply = reply;
    }

    /// Every upload attempt, including ones that failed.
    pub(crate) fn attempts(&self) -> usize {
        self.lock().attempts
    }

    /// The batches that reached the server, in order.
    pub(crate) fn batches(&self) -> Vec<Vec<Record>> {
        self.lock().batches.clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, State> {
        // A poisoned lock only happens when a test has already panicked.
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}

#[async_trait::async_trait]
impl Remote for TestRemote {
    async fn upload(&mut self, records: &[Record]) -> Res<Value> {
        let mut state = self.lock();
        state.attempts += 1;
        match state.reply.clone() {
            TestReply::NetworkDown => Err(anyhow!("Unable to reach the test remote")),
            TestReply::NotJson => {
                state.batches.push(records.to_vec());
                bail!("The response from the test remote is not JSON")
            }
            TestReply::Body(body) => {
                info!("Test remote received {} record(s)", records.len());
                state.batches.push(records.to_vec());
                Ok(body)
            }
        }
    }
}
