//! Plain-language legal contract assistant
//!
//! A retrieval-augmented analysis pipeline for legal contracts:
//! - Clause segmentation on paragraph boundaries
//! - Reference-law retrieval (fastembed index, persisted on disk)
//! - Interchangeable completion backends (OpenRouter, Ollama, local process)
//! - Defensive parsing of model output with deterministic fallbacks
//! - Narration of results via text-to-speech

pub mod config;
pub mod error;
pub mod extract;
pub mod index;
pub mod parser;
pub mod pipeline;
pub mod prompts;
pub mod provider;
pub mod segmenter;
pub mod server;
pub mod speech;
pub mod types;

// Re-exports for convenience
pub use config::Config;
pub use error::{AssistError, Result};
pub use index::{ReferenceIndex, ReferenceSource};
pub use pipeline::Analyzer;
pub use provider::CompletionBackend;
pub use types::{ContractDocument, DocumentAnalysis, Language, RiskLevel};
