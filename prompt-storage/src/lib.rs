//! Persistence backends for prompts.
//!
//! The [`PromptStorage`] trait is the only thing the registry depends on; the
//! in-memory and JSON file backends here are interchangeable implementations.

#![warn(missing_docs, clippy::pedantic)]

mod backend;
mod error;
mod file;
mod memory;

pub use backend::PromptStorage;
pub use error::{StorageError, StorageResult};
pub use file::FileStorage;
pub use memory::InMemoryStorage;
