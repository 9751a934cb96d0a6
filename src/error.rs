//! Error taxonomy for the analysis pipeline.
//!
//! Failures local to one clause or one document-level block are absorbed
//! inside the pipeline (fallback records, placeholder blocks); the variants
//! here are what can still reach a caller. Malformed generation output is
//! deliberately absent: the response parser is total and recovers it via
//! the fallback record instead of raising.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum AssistError {
    /// The caller supplied no contract text (or only whitespace).
    /// Surfaced before any backend call is made.
    #[error("no contract text provided")]
    NoInputProvided,

    /// The completion backend was unreachable, returned a non-success
    /// status, timed out, or produced no output.
    #[error("generation backend failed: {0}")]
    GenerationFailed(String),

    /// The reference index could not be opened or queried. The pipeline
    /// recovers by proceeding with empty context.
    #[error("reference index unavailable: {0}")]
    RetrievalUnavailable(String),

    /// A query string for the reference index was empty.
    #[error("reference index query text must not be empty")]
    EmptyQuery,

    /// Speech synthesis failed; callers omit audio rather than failing
    /// the textual result.
    #[error("speech synthesis failed: {0}")]
    SynthesisFailed(String),

    /// Text could not be extracted from the supplied PDF bytes.
    #[error("pdf extraction failed: {0}")]
    PdfExtraction(String),

    /// Invalid or incomplete configuration (unknown backend name,
    /// unknown embedding model, missing credential).
    #[error("invalid configuration: {0}")]
    Config(String),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, AssistError>;
