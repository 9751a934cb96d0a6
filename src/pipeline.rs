//! The analysis pipeline.
//!
//! `Analyzer::analyze` drives one full run: segmentation, per-clause
//! retrieval and generation, the three document-level blocks, and
//! optional translation, assembled into a single `DocumentAnalysis`.
//!
//! Failure policy: empty input is the only early error. After that, every
//! generation unit is isolated — a failed clause call becomes a fallback
//! record, a failed document-level call becomes a placeholder block, a
//! failed translation keeps the untranslated text. Callers read the
//! degradation counters on the result to tell a healthy run from a
//! backend outage.
//!
//! All work runs in non-spawned futures joined before return, so dropping
//! the future returned by `analyze` cancels in-flight backend calls.

use std::sync::Arc;
use std::time::Duration;

use futures_util::future::join_all;
use tokio::sync::Semaphore;
use tokio::time::Instant;
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::error::{AssistError, Result};
use crate::index::{ReferenceChunk, ReferenceSource};
use crate::parser::{self, ClauseFields};
use crate::prompts;
use crate::provider::{ChatMessage, CompletionBackend};
use crate::segmenter;
use crate::types::{Clause, ClauseAnalysis, ContractDocument, DocumentAnalysis, Language};

pub struct Analyzer {
    backend: Arc<dyn CompletionBackend>,
    index: Option<Arc<dyn ReferenceSource>>,
    retrieval_k: usize,
    max_retries: u32,
    concurrency_limit: Arc<Semaphore>,
    deadline: Duration,
}

impl Analyzer {
    pub fn new(backend: Arc<dyn CompletionBackend>) -> Self {
        Self {
            backend,
            index: None,
            retrieval_k: 3,
            max_retries: 1,
            concurrency_limit: Arc::new(Semaphore::new(4)),
            deadline: Duration::from_secs(600),
        }
    }

    pub fn from_config(
        backend: Arc<dyn CompletionBackend>,
        index: Option<Arc<dyn ReferenceSource>>,
        config: &Config,
    ) -> Self {
        let mut analyzer = Self::new(backend)
            .with_retrieval_k(config.retrieval_k)
            .with_max_retries(config.max_retries)
            .with_max_concurrency(config.max_concurrency)
            .with_deadline(config.analysis_deadline);
        if let Some(index) = index {
            analyzer = analyzer.with_index(index);
        }
        analyzer
    }

    pub fn with_index(mut self, index: Arc<dyn ReferenceSource>) -> Self {
        self.index = Some(index);
        self
    }

    pub fn with_retrieval_k(mut self, k: usize) -> Self {
        self.retrieval_k = k;
        self
    }

    pub fn with_max_retries(mut self, retries: u32) -> Self {
        self.max_retries = retries;
        self
    }

    /// Cap on concurrent backend calls across clause, document-level and
    /// translation units.
    pub fn with_max_concurrency(mut self, limit: usize) -> Self {
        self.concurrency_limit = Arc::new(Semaphore::new(limit.max(1)));
        self
    }

    /// Overall deadline for one `analyze` call. Units still in flight at
    /// the deadline degrade to fallbacks; finished work is kept.
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = deadline;
        self
    }

    #[tracing::instrument(skip(self, document), fields(doc_len = document.text.len(), language = %language))]
    pub async fn analyze(
        &self,
        document: &ContractDocument,
        language: Language,
    ) -> Result<DocumentAnalysis> {
        let text = document.text.trim();
        if text.is_empty() {
            return Err(AssistError::NoInputProvided);
        }

        let deadline = Instant::now() + self.deadline;
        let clauses = segmenter::segment(&document.text);
        let total_generations = clauses.len() + 3;
        info!(clauses = clauses.len(), backend = self.backend.name(), "analysis started");

        let clause_tasks = clauses.into_iter().map(|clause| async move {
            let references = self.retrieve(&clause.text, deadline).await;
            let outcome = self.clause_call(&clause, &references, deadline).await;
            (clause, outcome)
        });

        let (clause_outcomes, summary_res, questions_res, steps_res) = tokio::join!(
            join_all(clause_tasks),
            self.document_call(prompts::summary_prompt(text), deadline),
            self.document_call(prompts::lawyer_questions_prompt(text), deadline),
            self.document_call(prompts::next_steps_prompt(text), deadline),
        );

        let mut failed_generations = 0usize;
        let mut analyses = Vec::with_capacity(clause_outcomes.len());
        for (clause, outcome) in clause_outcomes {
            let fields = match outcome {
                Ok(raw) => parser::parse_clause_fields(&raw),
                Err(e) => {
                    warn!(clause = clause.number, error = %e, "clause generation failed");
                    failed_generations += 1;
                    ClauseFields::fallback()
                }
            };
            analyses.push(ClauseAnalysis {
                clause,
                explanation: fields.explanation,
                risk: fields.risk,
                example: fields.example,
                law_reference: fields.law_reference,
            });
        }

        let (summary, summary_failed) = unwrap_block("summary", summary_res);
        let (lawyer_questions, questions_failed) = unwrap_block("lawyer_questions", questions_res);
        let (next_steps, steps_failed) = unwrap_block("next_steps", steps_res);
        failed_generations +=
            [summary_failed, questions_failed, steps_failed].iter().filter(|f| **f).count();

        let mut analysis = DocumentAnalysis {
            summary,
            lawyer_questions,
            next_steps,
            clauses: analyses,
            language,
            failed_generations,
            total_generations,
        };

        if language != Language::English {
            self.translate_in_place(&mut analysis, deadline).await;
        }

        info!(
            failed = analysis.failed_generations,
            total = analysis.total_generations,
            "analysis finished"
        );
        Ok(analysis)
    }

    /// Retrieval is enrichment: any failure, including deadline expiry,
    /// downgrades to no context rather than failing the clause.
    async fn retrieve(&self, clause_text: &str, deadline: Instant) -> Vec<ReferenceChunk> {
        let Some(ref index) = self.index else {
            return Vec::new();
        };
        if self.retrieval_k == 0 {
            return Vec::new();
        }
        match tokio::time::timeout_at(deadline, index.query(clause_text, self.retrieval_k)).await {
            Ok(Ok(chunks)) => chunks,
            Ok(Err(e)) => {
                warn!(error = %e, "reference retrieval failed, continuing without context");
                Vec::new()
            }
            Err(_) => {
                warn!("reference retrieval deadline expired, continuing without context");
                Vec::new()
            }
        }
    }

    async fn clause_call(
        &self,
        clause: &Clause,
        references: &[ReferenceChunk],
        deadline: Instant,
    ) -> Result<String> {
        let messages = [
            ChatMessage::system(prompts::SYSTEM_PROMPT),
            ChatMessage::user(prompts::clause_prompt(&clause.text, references)),
        ];
        self.generate(&messages, deadline).await
    }

    async fn document_call(&self, prompt: String, deadline: Instant) -> Result<String> {
        let messages = [ChatMessage::system(prompts::SYSTEM_PROMPT), ChatMessage::user(prompt)];
        self.generate(&messages, deadline).await
    }

    /// One bounded backend call: concurrency permit, deadline, and a
    /// retry pass on backend failure. Deadline expiry is not retried.
    async fn generate(&self, messages: &[ChatMessage], deadline: Instant) -> Result<String> {
        let _permit = self
            .concurrency_limit
            .acquire()
            .await
            .map_err(|_| AssistError::GenerationFailed("concurrency limiter closed".to_string()))?;

        let mut last_err = AssistError::GenerationFailed("no attempt made".to_string());
        for attempt in 0..=self.max_retries {
            match tokio::time::timeout_at(deadline, self.backend.complete(messages)).await {
                Ok(Ok(text)) => return Ok(text),
                Ok(Err(e)) => {
                    debug!(attempt, error = %e, "generation attempt failed");
                    last_err = e;
                }
                Err(_) => {
                    return Err(AssistError::GenerationFailed(
                        "analysis deadline exceeded".to_string(),
                    ));
                }
            }
        }
        Err(last_err)
    }

    /// Translate the user-facing blocks (clause explanations, summary,
    /// next steps) in place. Any failed translation keeps the original
    /// text; fallback sentinels stay verbatim so degraded records remain
    /// recognizable.
    async fn translate_in_place(&self, analysis: &mut DocumentAnalysis, deadline: Instant) {
        let language = analysis.language;

        let (summary, steps, explanations) = tokio::join!(
            self.translate_block(analysis.summary.clone(), language, deadline),
            self.translate_block(analysis.next_steps.clone(), language, deadline),
            join_all(
                analysis
                    .clauses
                    .iter()
                    .map(|c| self.translate_block(c.explanation.clone(), language, deadline)),
            ),
        );

        if let Some(translated) = summary {
            analysis.summary = translated;
        }
        if let Some(translated) = steps {
            analysis.next_steps = translated;
        }
        for (clause, translated) in analysis.clauses.iter_mut().zip(explanations) {
            if let Some(text) = translated {
                clause.explanation = text;
            }
        }
    }

    async fn translate_block(
        &self,
        text: String,
        language: Language,
        deadline: Instant,
    ) -> Option<String> {
        let trimmed = text.trim();
        if trimmed.is_empty() || trimmed == parser::FALLBACK_EXPLANATION {
            return None;
        }
        let messages = [
            ChatMessage::system(prompts::SYSTEM_PROMPT),
            ChatMessage::user(prompts::translation_prompt(&text, language.name())),
        ];
        match self.generate(&messages, deadline).await {
            Ok(translated) => Some(translated),
            Err(e) => {
                warn!(error = %e, lang = language.code(), "translation failed, keeping original text");
                None
            }
        }
    }
}

fn unwrap_block(name: &str, result: Result<String>) -> (String, bool) {
    match result {
        Ok(text) => (text, false),
        Err(e) => {
            warn!(block = name, error = %e, "document-level generation failed");
            (parser::FALLBACK_EXPLANATION.to_string(), true)
        }
    }
}
