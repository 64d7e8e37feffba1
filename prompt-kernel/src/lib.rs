//! Prompt registry, versioned manager, and render pipeline.
//!
//! [`PromptManager`] is the entry point: it owns the in-memory registry, the
//! append-only version store, the template engine, and the schema registry,
//! and exposes every operation as an `async fn`. [`PromptManager::blocking`]
//! offers the same operations to synchronous callers through the
//! [`bridge`] module.

#![warn(missing_docs, clippy::pedantic)]

pub mod bridge;

mod blocking;
mod cache;
mod error;
mod manager;
mod observer;
mod plugins;
mod registry;

pub use blocking::BlockingPromptManager;
pub use bridge::{ExecutionMode, current_mode, live_private_schedulers, run_blocking};
pub use cache::{MemoryRenderCache, RenderCache, RenderKey};
pub use error::{ErrorKind, PromptError, PromptResult};
pub use manager::{PromptManager, PromptManagerBuilder, RenderOptions, UpdateMode};
pub use observer::{CompositeObserver, RenderObserver, TracingObserver};
pub use plugins::{PluginRegistry, PromptPlugin, RenderedMessage, RenderedPrompt};
pub use registry::PromptRegistry;
