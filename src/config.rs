//! Runtime configuration.
//!
//! Everything tunable comes from the environment (or a `.env` file loaded
//! at startup): backend selection, model ids, credential, index location,
//! retrieval and concurrency knobs. Secrets are never baked into source.

use std::collections::HashMap;
use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use crate::error::{AssistError, Result};
use crate::types::Language;

pub const DEFAULT_MODEL: &str = "google/gemma-3-4b-it";
pub const DEFAULT_API_BASE_URL: &str = "https://openrouter.ai/api/v1";
pub const DEFAULT_EMBEDDING_MODEL: &str = "all-minilm-l6-v2";

/// Which completion backend to drive.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    OpenRouter,
    Ollama,
    LocalProcess,
}

impl FromStr for BackendKind {
    type Err = AssistError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_ascii_lowercase().as_str() {
            "openrouter" | "openai" => Ok(BackendKind::OpenRouter),
            "ollama" => Ok(BackendKind::Ollama),
            "local-process" | "process" => Ok(BackendKind::LocalProcess),
            other => Err(AssistError::Config(format!(
                "unknown backend '{other}' (expected openrouter, ollama, or local-process)"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Config {
    pub backend: BackendKind,
    pub model: String,
    pub api_base_url: String,
    /// Bearer credential for the hosted backend. Optional so unauthenticated
    /// OpenAI-compatible servers work too.
    pub api_key: Option<String>,
    pub ollama_host: String,
    pub ollama_port: u16,
    /// Argv for the local-process backend, e.g. `llama-cli -m model.gguf`.
    pub process_command: Vec<String>,
    pub embedding_model: String,
    pub index_path: PathBuf,
    pub laws_dir: PathBuf,
    pub chunk_size: usize,
    pub retrieval_k: usize,
    pub call_timeout: Duration,
    pub max_concurrency: usize,
    pub max_retries: u32,
    pub analysis_deadline: Duration,
    /// Output language when the caller does not pick one. The language
    /// set itself is closed; only the default is configurable.
    pub default_language: Language,
    pub artifact_dir: PathBuf,
    pub listen_addr: String,
}

impl Config {
    /// Read configuration from the process environment. Call
    /// `dotenv::dotenv().ok()` first if a `.env` file should apply.
    pub fn from_env() -> Result<Self> {
        let vars: HashMap<String, String> = std::env::vars().collect();
        Self::from_map(&vars)
    }

    pub fn from_map(vars: &HashMap<String, String>) -> Result<Self> {
        let backend = get_str(vars, "LEXPLAIN_BACKEND", "openrouter").parse()?;

        let config = Self {
            backend,
            model: get_str(vars, "LEXPLAIN_MODEL", DEFAULT_MODEL),
            api_base_url: get_str(vars, "LEXPLAIN_API_BASE_URL", DEFAULT_API_BASE_URL),
            api_key: get(vars, "OPENROUTER_API_KEY").filter(|k| !k.is_empty()),
            ollama_host: get_str(vars, "LEXPLAIN_OLLAMA_HOST", "http://localhost"),
            ollama_port: get_u16(vars, "LEXPLAIN_OLLAMA_PORT", 11434),
            process_command: get_str(vars, "LEXPLAIN_PROCESS_CMD", "")
                .split_whitespace()
                .map(str::to_string)
                .collect(),
            embedding_model: get_str(vars, "LEXPLAIN_EMBEDDING_MODEL", DEFAULT_EMBEDDING_MODEL),
            index_path: get_str(vars, "LEXPLAIN_INDEX_PATH", "laws.idx").into(),
            laws_dir: get_str(vars, "LEXPLAIN_LAWS_DIR", "laws").into(),
            chunk_size: get_usize(vars, "LEXPLAIN_CHUNK_SIZE", 500),
            retrieval_k: get_usize(vars, "LEXPLAIN_RETRIEVAL_K", 3),
            call_timeout: Duration::from_secs(get_u64(vars, "LEXPLAIN_TIMEOUT_S", 90)),
            max_concurrency: get_usize(vars, "LEXPLAIN_MAX_CONCURRENCY", 4),
            max_retries: get_u32(vars, "LEXPLAIN_MAX_RETRIES", 1),
            analysis_deadline: Duration::from_secs(get_u64(vars, "LEXPLAIN_DEADLINE_S", 600)),
            default_language: get_str(vars, "LEXPLAIN_LANGUAGE", "English").parse()?,
            artifact_dir: get_str(vars, "LEXPLAIN_ARTIFACT_DIR", ".").into(),
            listen_addr: get_str(vars, "LEXPLAIN_LISTEN_ADDR", "127.0.0.1:8080"),
        };
        config.validate()?;
        Ok(config)
    }

    fn validate(&self) -> Result<()> {
        if self.chunk_size == 0 {
            return Err(AssistError::Config("LEXPLAIN_CHUNK_SIZE must be >= 1".to_string()));
        }
        if self.max_concurrency == 0 {
            return Err(AssistError::Config(
                "LEXPLAIN_MAX_CONCURRENCY must be >= 1".to_string(),
            ));
        }
        if self.call_timeout.is_zero() || self.analysis_deadline.is_zero() {
            return Err(AssistError::Config(
                "timeout and deadline must be >= 1 second".to_string(),
            ));
        }
        Ok(())
    }
}

fn get(vars: &HashMap<String, String>, key: &str) -> Option<String> {
    vars.get(key).cloned()
}

fn get_str(vars: &HashMap<String, String>, key: &str, default: &str) -> String {
    get(vars, key).unwrap_or_else(|| default.to_string())
}

fn get_usize(vars: &HashMap<String, String>, key: &str, default: usize) -> usize {
    get(vars, key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_u64(vars: &HashMap<String, String>, key: &str, default: u64) -> u64 {
    get(vars, key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_u32(vars: &HashMap<String, String>, key: &str, default: u32) -> u32 {
    get(vars, key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

fn get_u16(vars: &HashMap<String, String>, key: &str, default: u16) -> u16 {
    get(vars, key).and_then(|v| v.parse().ok()).unwrap_or(default)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn map(pairs: &[(&str, &str)]) -> HashMap<String, String> {
        pairs.iter().map(|(k, v)| (k.to_string(), v.to_string())).collect()
    }

    #[test]
    fn defaults_are_sensible() {
        let config = Config::from_map(&HashMap::new()).unwrap();
        assert_eq!(config.backend, BackendKind::OpenRouter);
        assert_eq!(config.model, DEFAULT_MODEL);
        assert_eq!(config.api_key, None);
        assert_eq!(config.chunk_size, 500);
        assert_eq!(config.retrieval_k, 3);
        assert_eq!(config.call_timeout, Duration::from_secs(90));
        assert_eq!(config.max_concurrency, 4);
        assert_eq!(config.max_retries, 1);
    }

    #[test]
    fn overrides_apply() {
        let vars = map(&[
            ("LEXPLAIN_BACKEND", "ollama"),
            ("LEXPLAIN_MODEL", "llama3"),
            ("LEXPLAIN_RETRIEVAL_K", "5"),
            ("LEXPLAIN_TIMEOUT_S", "30"),
            ("OPENROUTER_API_KEY", "sk-test"),
        ]);
        let config = Config::from_map(&vars).unwrap();
        assert_eq!(config.backend, BackendKind::Ollama);
        assert_eq!(config.model, "llama3");
        assert_eq!(config.retrieval_k, 5);
        assert_eq!(config.call_timeout, Duration::from_secs(30));
        assert_eq!(config.api_key.as_deref(), Some("sk-test"));
    }

    #[test]
    fn unparseable_numbers_fall_back_to_defaults() {
        let vars = map(&[("LEXPLAIN_RETRIEVAL_K", "three")]);
        let config = Config::from_map(&vars).unwrap();
        assert_eq!(config.retrieval_k, 3);
    }

    #[test]
    fn unknown_backend_is_rejected() {
        let vars = map(&[("LEXPLAIN_BACKEND", "mainframe")]);
        assert!(matches!(Config::from_map(&vars), Err(AssistError::Config(_))));
    }

    #[test]
    fn default_language_is_english_and_overridable() {
        let config = Config::from_map(&HashMap::new()).unwrap();
        assert_eq!(config.default_language, Language::English);

        let vars = map(&[("LEXPLAIN_LANGUAGE", "hindi")]);
        let config = Config::from_map(&vars).unwrap();
        assert_eq!(config.default_language, Language::Hindi);

        let vars = map(&[("LEXPLAIN_LANGUAGE", "Esperanto")]);
        assert!(matches!(Config::from_map(&vars), Err(AssistError::Config(_))));
    }

    #[test]
    fn empty_api_key_counts_as_absent() {
        let vars = map(&[("OPENROUTER_API_KEY", "")]);
        let config = Config::from_map(&vars).unwrap();
        assert_eq!(config.api_key, None);
    }

    #[test]
    fn process_command_splits_into_argv() {
        let vars = map(&[
            ("LEXPLAIN_BACKEND", "local-process"),
            ("LEXPLAIN_PROCESS_CMD", "llama-cli -m model.gguf"),
        ]);
        let config = Config::from_map(&vars).unwrap();
        assert_eq!(config.backend, BackendKind::LocalProcess);
        assert_eq!(config.process_command, vec!["llama-cli", "-m", "model.gguf"]);
    }

    #[test]
    fn zero_sized_knobs_are_config_errors() {
        for (key, value) in [
            ("LEXPLAIN_CHUNK_SIZE", "0"),
            ("LEXPLAIN_MAX_CONCURRENCY", "0"),
            ("LEXPLAIN_TIMEOUT_S", "0"),
        ] {
            let vars = map(&[(key, value)]);
            assert!(
                matches!(Config::from_map(&vars), Err(AssistError::Config(_))),
                "{key}=0 should be rejected"
            );
        }
    }

    #[test]
    fn backend_names_parse_case_insensitively() {
        assert_eq!("OpenRouter".parse::<BackendKind>().unwrap(), BackendKind::OpenRouter);
        assert_eq!("OLLAMA".parse::<BackendKind>().unwrap(), BackendKind::Ollama);
        assert_eq!("process".parse::<BackendKind>().unwrap(), BackendKind::LocalProcess);
    }
}
