//! HTTP front-end for the contract assistant.
//!
//! Exposes the analysis pipeline and narration over JSON endpoints; see
//! `lexplain::server` for the routes.

use std::sync::Arc;

use anyhow::Result;
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use lexplain::config::Config;
use lexplain::pipeline::Analyzer;
use lexplain::server::{run_server, AppState};
use lexplain::speech::GoogleTranslateTts;
use lexplain::{provider, ReferenceIndex};

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so RUST_LOG set there reaches the filter.
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let config = Config::from_env()?;
    let backend = provider::from_config(&config)?;
    info!("Completion backend: {}", backend.name());

    let index = Arc::new(ReferenceIndex::open(&config.index_path, &config.embedding_model)?);
    info!("Reference index: {} chunks", index.count().await);

    let analyzer = Analyzer::from_config(backend, Some(index), &config);
    let state = AppState {
        analyzer: Arc::new(analyzer),
        synthesizer: Arc::new(GoogleTranslateTts::new(&config.artifact_dir)),
        default_language: config.default_language,
    };

    run_server(state, &config.listen_addr).await?;
    Ok(())
}
