//! Append-only version history for prompts.
//!
//! Every committed [`PromptVersion`](prompt_primitives::PromptVersion) is
//! immutable. A second commit for an existing `(id, version)` pair fails with
//! [`VersionStoreError::Duplicate`], which is what serialises racing bumps.

#![warn(missing_docs, clippy::pedantic)]

mod error;
mod index;
mod journal;
mod memory;
mod store;

pub use error::{VersionResult, VersionStoreError};
pub use journal::JournalVersionStore;
pub use memory::InMemoryVersionStore;
pub use store::VersionStore;
