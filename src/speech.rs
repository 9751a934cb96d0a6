//! Text-to-speech synthesis.
//!
//! Narration goes through the Google Translate TTS endpoint, the same
//! service the original assistant used. Long text is sent in word-level
//! chunks because the endpoint caps query length, and the returned MP3
//! segments are concatenated into one uniquely named artifact file.

use std::path::PathBuf;

use async_trait::async_trait;
use reqwest::Client;
use tracing::info;
use uuid::Uuid;

use crate::error::{AssistError, Result};
use crate::types::Language;

#[async_trait]
pub trait SpeechSynthesizer: Send + Sync {
    /// Render `text` as speech and return the path of a freshly written
    /// audio artifact. Every call produces a new, uniquely named file;
    /// deleting stale artifacts is the caller's job.
    async fn synthesize(&self, text: &str, language: Language) -> Result<PathBuf>;
}

const ENDPOINT: &str = "https://translate.google.com/translate_tts";
/// Practical query-length cap of the endpoint.
const MAX_CHUNK_CHARS: usize = 180;

pub struct GoogleTranslateTts {
    client: Client,
    artifact_dir: PathBuf,
}

impl GoogleTranslateTts {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            client: Client::new(),
            artifact_dir: artifact_dir.into(),
        }
    }
}

#[async_trait]
impl SpeechSynthesizer for GoogleTranslateTts {
    async fn synthesize(&self, text: &str, language: Language) -> Result<PathBuf> {
        let text = text.trim();
        if text.is_empty() {
            return Err(AssistError::SynthesisFailed("nothing to narrate".to_string()));
        }

        let mut audio = Vec::new();
        for chunk in split_for_synthesis(text, MAX_CHUNK_CHARS) {
            let url = format!(
                "{ENDPOINT}?ie=UTF-8&client=tw-ob&tl={}&q={}",
                language.code(),
                urlencoding::encode(&chunk)
            );
            let bytes = self
                .client
                .get(&url)
                .send()
                .await
                .map_err(|e| AssistError::SynthesisFailed(e.to_string()))?
                .error_for_status()
                .map_err(|e| AssistError::SynthesisFailed(e.to_string()))?
                .bytes()
                .await
                .map_err(|e| AssistError::SynthesisFailed(e.to_string()))?;
            audio.extend_from_slice(&bytes);
        }

        tokio::fs::create_dir_all(&self.artifact_dir).await?;
        let path = self.artifact_dir.join(artifact_name());
        tokio::fs::write(&path, &audio).await?;
        info!(path = %path.display(), bytes = audio.len(), lang = language.code(), "wrote narration artifact");
        Ok(path)
    }
}

/// `tts_<6 hex>.mp3`, unique per call.
fn artifact_name() -> String {
    let uid = Uuid::new_v4().to_string();
    format!("tts_{}.mp3", &uid[..6])
}

/// Greedy word wrapping into chunks of at most `max_chars` characters.
/// An oversized single word becomes its own chunk rather than being cut.
fn split_for_synthesis(text: &str, max_chars: usize) -> Vec<String> {
    let mut chunks = Vec::new();
    let mut current = String::new();
    let mut count = 0usize;
    for word in text.split_whitespace() {
        let word_len = word.chars().count();
        if count > 0 && count + 1 + word_len > max_chars {
            chunks.push(std::mem::take(&mut current));
            count = 0;
        }
        if count > 0 {
            current.push(' ');
            count += 1;
        }
        current.push_str(word);
        count += word_len;
    }
    if !current.is_empty() {
        chunks.push(current);
    }
    chunks
}
