//! HTTP service surface.
//!
//! Thin JSON endpoints over the analyzer and the speech synthesizer.
//! All domain behavior lives in the pipeline; handlers only decode
//! requests, pick a language, and map errors to status codes.

use std::path::PathBuf;
use std::sync::Arc;

use axum::{
    extract::{Json, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Router,
};
use base64::Engine;
use serde::{Deserialize, Serialize};
use tower_http::trace::TraceLayer;
use tracing::info;

use crate::error::{AssistError, Result};
use crate::pipeline::Analyzer;
use crate::speech::SpeechSynthesizer;
use crate::types::{ContractDocument, DocumentAnalysis, Language};

struct ServerError(AssistError);

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = match self.0 {
            AssistError::NoInputProvided | AssistError::Config(_) => StatusCode::BAD_REQUEST,
            AssistError::PdfExtraction(_) => StatusCode::UNPROCESSABLE_ENTITY,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        };
        (status, Json(serde_json::json!({ "error": self.0.to_string() }))).into_response()
    }
}

impl From<AssistError> for ServerError {
    fn from(err: AssistError) -> Self {
        Self(err)
    }
}

#[derive(Clone)]
pub struct AppState {
    pub analyzer: Arc<Analyzer>,
    pub synthesizer: Arc<dyn SpeechSynthesizer>,
    /// Applied when a request does not name a language.
    pub default_language: Language,
}

#[derive(Deserialize)]
struct AnalyzeRequest {
    /// Pasted contract text. Takes precedence when non-empty.
    #[serde(default)]
    text: Option<String>,
    /// Base64-encoded PDF upload.
    #[serde(default)]
    pdf_base64: Option<String>,
    /// Target language name; defaults to English.
    #[serde(default)]
    language: Option<String>,
}

#[derive(Deserialize)]
struct NarrateRequest {
    text: String,
    #[serde(default)]
    language: Option<String>,
}

#[derive(Serialize)]
struct NarrateResponse {
    audio_path: PathBuf,
}

#[derive(Serialize)]
struct LanguageEntry {
    name: &'static str,
    code: &'static str,
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}

async fn languages() -> Json<Vec<LanguageEntry>> {
    Json(
        Language::ALL
            .iter()
            .map(|l| LanguageEntry { name: l.name(), code: l.code() })
            .collect(),
    )
}

async fn analyze_contract(
    State(state): State<AppState>,
    Json(req): Json<AnalyzeRequest>,
) -> std::result::Result<Json<DocumentAnalysis>, ServerError> {
    let language = parse_language(req.language.as_deref(), state.default_language)?;

    let document = match (req.text, req.pdf_base64) {
        (Some(text), _) if !text.trim().is_empty() => ContractDocument::from_text(text),
        (_, Some(encoded)) => {
            let bytes = base64::engine::general_purpose::STANDARD
                .decode(encoded.trim())
                .map_err(|e| {
                    ServerError(AssistError::PdfExtraction(format!("invalid base64: {e}")))
                })?;
            ContractDocument::from_pdf_bytes(&bytes, "upload.pdf")?
        }
        _ => return Err(ServerError(AssistError::NoInputProvided)),
    };

    let analysis = state.analyzer.analyze(&document, language).await?;
    Ok(Json(analysis))
}

async fn narrate(
    State(state): State<AppState>,
    Json(req): Json<NarrateRequest>,
) -> std::result::Result<Json<NarrateResponse>, ServerError> {
    let language = parse_language(req.language.as_deref(), state.default_language)?;
    let audio_path = state.synthesizer.synthesize(&req.text, language).await?;
    Ok(Json(NarrateResponse { audio_path }))
}

fn parse_language(
    name: Option<&str>,
    default: Language,
) -> std::result::Result<Language, ServerError> {
    match name {
        Some(name) => Ok(name.parse()?),
        None => Ok(default),
    }
}

pub async fn run_server(state: AppState, addr: &str) -> Result<()> {
    let app = Router::new()
        .route("/health", get(health))
        .route("/languages", get(languages))
        .route("/analyze", post(analyze_contract))
        .route("/narrate", post(narrate))
        .layer(TraceLayer::new_for_http())
        .with_state(state);

    info!(%addr, "assistant API listening");
    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;
    Ok(())
}
