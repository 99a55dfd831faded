//! Model integration for PMFS.
//!
//! Everything that talks to a language model goes through the narrow
//! [`LanguageModel`] seam; the similarity and extraction oracles used by the
//! dedup and attachment layers are built on top of it.

pub mod client;
pub mod gates;
pub mod interact;
pub mod oracle;
pub mod prompts;
pub mod responses;

pub use client::{AiClient, AiError, AiMode};
pub use gates::Gate;
pub use oracle::{ExtractionOracle, FnModel, LanguageModel, ModelOracle, SimilarityOracle};
pub use prompts::{Prompt, PromptCatalog};
