//! Completion backends.
//!
//! One trait over "send a role-tagged conversation, get generated text
//! back", with interchangeable implementations: a hosted OpenAI-compatible
//! HTTP endpoint, a local Ollama daemon, and a spawned model process
//! speaking stdin/stdout. Call sites never branch on which one is active.

use std::process::Stdio;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde_json::json;
use tokio::io::AsyncWriteExt;
use tokio::process::Command;
use tracing::{debug, warn};

use crate::config::{BackendKind, Config};
use crate::error::{AssistError, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Role {
    System,
    User,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::System => "system",
            Role::User => "user",
        }
    }
}

/// One turn of the conversation sent to a backend.
#[derive(Debug, Clone)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    pub fn system(content: impl Into<String>) -> Self {
        Self { role: Role::System, content: content.into() }
    }

    pub fn user(content: impl Into<String>) -> Self {
        Self { role: Role::User, content: content.into() }
    }
}

/// Collapse a conversation into one prompt for backends without native
/// role support. System text comes first, blocks separated by blank lines.
pub fn flatten_conversation(messages: &[ChatMessage]) -> String {
    let mut flat = String::new();
    for message in messages {
        if !flat.is_empty() {
            flat.push_str("\n\n");
        }
        flat.push_str(&message.content);
    }
    flat
}

/// The generation service behind the pipeline. Transport failures, bad
/// statuses, timeouts, and dead subprocesses all surface as
/// [`AssistError::GenerationFailed`]; retry policy belongs to the caller.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String>;

    /// Short name for logs.
    fn name(&self) -> &str;
}

/// Build the configured backend. Selection happens once, here.
pub fn from_config(config: &Config) -> Result<Arc<dyn CompletionBackend>> {
    match config.backend {
        BackendKind::OpenRouter => Ok(Arc::new(OpenRouterBackend::new(
            config.api_base_url.clone(),
            config.model.clone(),
            config.api_key.clone(),
            config.call_timeout,
        )?)),
        BackendKind::Ollama => Ok(Arc::new(OllamaBackend::new(
            config.ollama_host.clone(),
            config.ollama_port,
            config.model.clone(),
            config.call_timeout,
        ))),
        BackendKind::LocalProcess => {
            let (program, args) = config
                .process_command
                .split_first()
                .ok_or_else(|| {
                    AssistError::Config("local-process backend needs a command".to_string())
                })?;
            Ok(Arc::new(LocalProcessBackend::new(
                program.clone(),
                args.to_vec(),
                config.call_timeout,
            )))
        }
    }
}

/// Hosted OpenAI-compatible chat endpoint (OpenRouter by default).
pub struct OpenRouterBackend {
    client: Client,
    base_url: String,
    model: String,
    api_key: Option<String>,
}

impl OpenRouterBackend {
    pub fn new(
        base_url: String,
        model: String,
        api_key: Option<String>,
        timeout: Duration,
    ) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AssistError::Config(format!("http client init failed: {e}")))?;
        Ok(Self { client, base_url, model, api_key })
    }
}

#[async_trait]
impl CompletionBackend for OpenRouterBackend {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let body = json!({
            "model": self.model,
            "messages": messages
                .iter()
                .map(|m| json!({ "role": m.role.as_str(), "content": m.content }))
                .collect::<Vec<_>>(),
        });

        let url = format!("{}/chat/completions", self.base_url.trim_end_matches('/'));
        debug!(model = %self.model, turns = messages.len(), "remote completion call");

        let mut request = self.client.post(url).json(&body);
        if let Some(ref key) = self.api_key {
            request = request.bearer_auth(key);
        }

        let response = request
            .send()
            .await
            .map_err(|e| AssistError::GenerationFailed(e.to_string()))?
            .error_for_status()
            .map_err(|e| AssistError::GenerationFailed(e.to_string()))?;

        let payload: serde_json::Value = response
            .json()
            .await
            .map_err(|e| AssistError::GenerationFailed(e.to_string()))?;

        let content = payload["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| {
                AssistError::GenerationFailed("no content in completion response".to_string())
            })?;

        Ok(content.to_string())
    }

    fn name(&self) -> &str {
        "openrouter"
    }
}

/// Local Ollama daemon.
pub struct OllamaBackend {
    client: ollama_rs::Ollama,
    model: String,
    timeout: Duration,
}

impl OllamaBackend {
    pub fn new(host: String, port: u16, model: String, timeout: Duration) -> Self {
        Self {
            client: ollama_rs::Ollama::new(host, port),
            model,
            timeout,
        }
    }
}

#[async_trait]
impl CompletionBackend for OllamaBackend {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        use ollama_rs::generation::chat::{request::ChatMessageRequest, ChatMessage as OllamaMessage};

        let chat: Vec<OllamaMessage> = messages
            .iter()
            .map(|m| match m.role {
                Role::System => OllamaMessage::system(m.content.clone()),
                Role::User => OllamaMessage::user(m.content.clone()),
            })
            .collect();

        debug!(model = %self.model, turns = chat.len(), "ollama completion call");
        let request = ChatMessageRequest::new(self.model.clone(), chat);
        let response = tokio::time::timeout(self.timeout, self.client.send_chat_messages(request))
            .await
            .map_err(|_| {
                AssistError::GenerationFailed(format!(
                    "ollama call exceeded {}s",
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AssistError::GenerationFailed(e.to_string()))?;

        Ok(response.message.content)
    }

    fn name(&self) -> &str {
        "ollama"
    }
}

/// Locally spawned model process: flattened prompt on stdin, completion
/// on stdout. The child is killed if the call times out or is cancelled.
pub struct LocalProcessBackend {
    program: String,
    args: Vec<String>,
    timeout: Duration,
}

impl LocalProcessBackend {
    pub fn new(program: String, args: Vec<String>, timeout: Duration) -> Self {
        Self { program, args, timeout }
    }
}

#[async_trait]
impl CompletionBackend for LocalProcessBackend {
    async fn complete(&self, messages: &[ChatMessage]) -> Result<String> {
        let mut child = Command::new(&self.program)
            .args(&self.args)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| {
                AssistError::GenerationFailed(format!("failed to spawn {}: {e}", self.program))
            })?;

        let prompt = flatten_conversation(messages);
        if let Some(mut stdin) = child.stdin.take() {
            stdin
                .write_all(prompt.as_bytes())
                .await
                .map_err(|e| AssistError::GenerationFailed(format!("stdin write failed: {e}")))?;
            // Dropping stdin closes the pipe so the child sees EOF.
        }

        let output = tokio::time::timeout(self.timeout, child.wait_with_output())
            .await
            .map_err(|_| {
                AssistError::GenerationFailed(format!(
                    "{} exceeded {}s",
                    self.program,
                    self.timeout.as_secs()
                ))
            })?
            .map_err(|e| AssistError::GenerationFailed(format!("wait failed: {e}")))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            warn!(program = %self.program, status = %output.status, stderr = %stderr.trim(), "local model process failed");
            return Err(AssistError::GenerationFailed(format!(
                "{} exited with {}",
                self.program, output.status
            )));
        }

        let text = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if text.is_empty() {
            return Err(AssistError::GenerationFailed(format!(
                "{} produced no output",
                self.program
            )));
        }
        Ok(text)
    }

    fn name(&self) -> &str {
        "local-process"
    }
}
