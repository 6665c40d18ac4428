//! Points sink trait and implementations.

pub mod http;
pub mod memory;

pub use http::HttpPointsSink;
pub use memory::{InMemoryPointsSink, ScriptedResponse};

use async_trait::async_trait;
use domain::PointsPayload;

use crate::error::SinkError;

/// Downstream service recording loyalty points.
#[async_trait]
pub trait PointsSink: Send + Sync {
    /// Posts one payload and returns the response body on a 2xx answer.
    async fn send(&self, payload: &PointsPayload) -> Result<String, SinkError>;
}
