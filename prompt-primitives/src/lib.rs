//! Core prompt data model shared across the promptkit crates.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod filter;
mod history;
mod ids;
mod message;
mod prompt;
mod version;

/// Error type and result alias for the data model.
pub use error::{Error, Result};
/// Listing criteria.
pub use filter::PromptFilter;
/// Immutable history snapshot.
pub use history::PromptVersion;
/// Stable prompt identifier.
pub use ids::PromptId;
/// Chat message model.
pub use message::{Message, Role};
/// Prompt model and builder.
pub use prompt::{
    ChatTemplate, Prompt, PromptBuilder, PromptContent, PromptFormat, PromptMetadata,
    PromptStatus, TextTemplate,
};
/// Semantic version and bump level.
pub use version::{BumpLevel, Version};
