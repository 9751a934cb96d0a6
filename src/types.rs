//! Core data model: contract documents, clauses, per-clause analysis
//! records and the terminal document-level result.

use serde::{Deserialize, Serialize};
use std::str::FromStr;

use crate::error::{AssistError, Result};

/// A contract under analysis. Immutable once created; lifetime is one
/// analysis request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ContractDocument {
    /// Raw contract text, exactly as typed or extracted.
    pub text: String,
    /// Where the text came from (file name, upload id), if known.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl ContractDocument {
    pub fn from_text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            source: None,
        }
    }

    /// Extract text from PDF bytes. May legitimately produce an empty
    /// document for image-only/scanned PDFs; the pipeline rejects those
    /// as missing input.
    pub fn from_pdf_bytes(bytes: &[u8], source: impl Into<String>) -> Result<Self> {
        let text = crate::extract::pdf_text(bytes)?;
        Ok(Self {
            text,
            source: Some(source.into()),
        })
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// One ordered unit of a contract, as produced by the segmenter.
/// Numbering is 1-based and follows original document order; text is
/// trimmed and never empty.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Clause {
    pub number: usize,
    pub text: String,
}

impl Clause {
    pub fn new(number: usize, text: impl Into<String>) -> Self {
        Self {
            number,
            text: text.into(),
        }
    }
}

/// Risk level assigned to a clause by the generation backend.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum RiskLevel {
    Low,
    #[default]
    Medium,
    High,
}

impl FromStr for RiskLevel {
    type Err = ();

    /// Case-insensitive; the backend is not reliable about casing.
    fn from_str(s: &str) -> std::result::Result<Self, ()> {
        match s.trim().to_ascii_lowercase().as_str() {
            "low" => Ok(RiskLevel::Low),
            "medium" => Ok(RiskLevel::Medium),
            "high" => Ok(RiskLevel::High),
            _ => Err(()),
        }
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            RiskLevel::Low => write!(f, "Low"),
            RiskLevel::Medium => write!(f, "Medium"),
            RiskLevel::High => write!(f, "High"),
        }
    }
}

/// Analysis of a single clause. One record per clause, never mutated
/// after creation.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ClauseAnalysis {
    pub clause: Clause,
    /// Plain-language explanation (1-2 sentences requested).
    pub explanation: String,
    pub risk: RiskLevel,
    /// One short illustrative example.
    pub example: String,
    /// Citation into the reference corpus, when the backend offers one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub law_reference: Option<String>,
}

/// The terminal artifact of one pipeline run, owned by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DocumentAnalysis {
    pub summary: String,
    pub lawyer_questions: String,
    pub next_steps: String,
    pub clauses: Vec<ClauseAnalysis>,
    pub language: Language,
    /// How many generation calls (clause + document-level) fell back to a
    /// placeholder. Presentation layers use this to surface a clear
    /// degradation message alongside whatever partial results exist.
    pub failed_generations: usize,
    pub total_generations: usize,
}

impl DocumentAnalysis {
    /// True when every generation call failed: the backend is down, and
    /// the result contains only fallback records.
    pub fn fully_degraded(&self) -> bool {
        self.total_generations > 0 && self.failed_generations == self.total_generations
    }
}

/// Narration/translation languages. A closed, static set: configuration
/// may select a default, it cannot register new entries.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Language {
    #[default]
    English,
    Hindi,
    Tamil,
    Malayalam,
    Kannada,
    Bengali,
}

impl Language {
    pub const ALL: [Language; 6] = [
        Language::English,
        Language::Hindi,
        Language::Tamil,
        Language::Malayalam,
        Language::Kannada,
        Language::Bengali,
    ];

    /// Synthesis/locale code understood by the TTS collaborator.
    pub fn code(&self) -> &'static str {
        match self {
            Language::English => "en",
            Language::Hindi => "hi",
            Language::Tamil => "ta",
            Language::Malayalam => "ml",
            Language::Kannada => "kn",
            Language::Bengali => "bn",
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Language::English => "English",
            Language::Hindi => "Hindi",
            Language::Tamil => "Tamil",
            Language::Malayalam => "Malayalam",
            Language::Kannada => "Kannada",
            Language::Bengali => "Bengali",
        }
    }

    /// Look a language up by human-readable name, case-insensitively.
    pub fn from_name(name: &str) -> Option<Language> {
        let wanted = name.trim().to_ascii_lowercase();
        Language::ALL
            .iter()
            .copied()
            .find(|l| l.name().to_ascii_lowercase() == wanted)
    }
}

impl FromStr for Language {
    type Err = AssistError;

    fn from_str(s: &str) -> Result<Language> {
        Language::from_name(s)
            .ok_or_else(|| AssistError::Config(format!("unsupported language: {s}")))
    }
}

impl std::fmt::Display for Language {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.name())
    }
}
