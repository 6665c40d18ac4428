//! Scriptable in-memory points sink for tests and local runs.

use std::collections::VecDeque;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use domain::PointsPayload;

use super::PointsSink;
use crate::error::SinkError;

/// Canned answer for one call to [`InMemoryPointsSink`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptedResponse {
    /// 2xx with the given body.
    Ok(String),
    /// 5xx with the given status.
    ServerError(u16),
    /// Non-5xx failure status.
    ClientError(u16),
    /// No response at all.
    Transport,
}

#[derive(Debug, Default)]
struct InMemorySinkState {
    received: Vec<PointsPayload>,
    script: VecDeque<ScriptedResponse>,
    fallback: Option<ScriptedResponse>,
    latency: Option<Duration>,
}

/// In-memory points sink.
///
/// Answers calls from a queue of scripted responses, then from the fallback
/// response (200 with an empty body unless changed). Every payload that
/// reaches the sink is recorded, whatever the scripted answer.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPointsSink {
    state: Arc<Mutex<InMemorySinkState>>,
}

impl InMemoryPointsSink {
    /// Creates a sink that accepts every call.
    pub fn new() -> Self {
        Self::default()
    }

    /// Queues responses for the next calls, in order.
    pub fn push_responses(&self, responses: impl IntoIterator<Item = ScriptedResponse>) {
        self.lock().script.extend(responses);
    }

    /// Sets the answer used once the queue is empty.
    pub fn set_fallback(&self, response: ScriptedResponse) {
        self.lock().fallback = Some(response);
    }

    /// Delays every answer by `latency`.
    pub fn set_latency(&self, latency: Duration) {
        self.lock().latency = Some(latency);
    }

    /// Returns the payloads received so far.
    pub fn received(&self) -> Vec<PointsPayload> {
        self.lock().received.clone()
    }

    /// Returns the number of calls that reached the sink.
    pub fn call_count(&self) -> usize {
        self.lock().received.len()
    }

    fn lock(&self) -> MutexGuard<'_, InMemorySinkState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PointsSink for InMemoryPointsSink {
    async fn send(&self, payload: &PointsPayload) -> Result<String, SinkError> {
        let (response, latency) = {
            let mut state = self.lock();
            state.received.push(payload.clone());
            let response = state
                .script
                .pop_front()
                .or_else(|| state.fallback.clone())
                .unwrap_or_else(|| ScriptedResponse::Ok(String::new()));
            (response, state.latency)
        };

        if let Some(latency) = latency {
            tokio::time::sleep(latency).await;
        }

        match response {
            ScriptedResponse::Ok(body) => Ok(body),
            ScriptedResponse::ServerError(status) => Err(SinkError::Server {
                status,
                body: String::new(),
            }),
            ScriptedResponse::ClientError(status) => Err(SinkError::Client { status }),
            ScriptedResponse::Transport => {
                Err(SinkError::Transport("connection refused".to_string()))
            }
        }
    }
}
