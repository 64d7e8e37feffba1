//! Observability for the prompt manager: subscriber setup and render statistics.

#![warn(missing_docs, clippy::pedantic)]

mod stats;
mod subscriber;

pub use stats::{RenderStats, StatsObserver};
pub use subscriber::{LogFormat, TelemetryConfig, init_tracing};
