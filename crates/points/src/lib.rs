//! Order placement and loyalty-points delivery.
//!
//! Placing an order persists it, then notifies the downstream points sink
//! through the [`OutboundPipeline`]. Each delivery attempt passes, in order:
//! 1. Circuit breaker admission
//! 2. Rate limiter permit
//! 3. HTTP POST of `{username, amount}` to the sink
//!
//! Attempts repeat under the retry policy. Whatever happens downstream is
//! absorbed by the pipeline; only persistence failures reach the caller.

pub mod error;
pub mod pipeline;
pub mod service;
pub mod sink;

pub use error::{OutboundError, SinkError};
pub use pipeline::{Delivery, OutboundPipeline};
pub use service::OrderService;
pub use sink::{HttpPointsSink, InMemoryPointsSink, PointsSink, ScriptedResponse};
