//! Offline indexer: embeds reference law PDFs into the retrieval index.
//!
//! Walks the configured laws directory, extracts text from every PDF,
//! chunks it, and upserts the chunks into the on-disk index. Re-running
//! after replacing a PDF refreshes that document's chunks in place.

use anyhow::{bail, Result};
use tracing::{info, Level};
use tracing_subscriber::EnvFilter;

use lexplain::config::Config;
use lexplain::index::chunk_text;
use lexplain::{extract, ReferenceIndex};

#[tokio::main]
async fn main() -> Result<()> {
    // .env first so RUST_LOG set there reaches the filter.
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .init();

    let config = Config::from_env()?;
    if !config.laws_dir.is_dir() {
        bail!(
            "laws directory {} not found; set LEXPLAIN_LAWS_DIR or create it",
            config.laws_dir.display()
        );
    }

    let mut pdfs: Vec<_> = std::fs::read_dir(&config.laws_dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| p.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")))
        .collect();
    pdfs.sort();
    if pdfs.is_empty() {
        bail!("no PDF files in {}", config.laws_dir.display());
    }

    info!("Indexing {} PDF(s) from {}", pdfs.len(), config.laws_dir.display());
    let index = ReferenceIndex::open(&config.index_path, &config.embedding_model)?;

    for (i, path) in pdfs.iter().enumerate() {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| path.display().to_string());
        info!("[{}/{}] Extracting {}", i + 1, pdfs.len(), name);

        let text = extract::pdf_text_from_file(path)?;
        let slices = chunk_text(&text, config.chunk_size);
        info!("[{}/{}] Embedding {} chunks from {}", i + 1, pdfs.len(), slices.len(), name);

        let stored = index.upsert_document(&name, slices).await?;
        info!("[{}/{}] Stored {} chunks for {}", i + 1, pdfs.len(), stored, name);
    }

    index.persist().await?;
    info!("Ingestion complete. {} chunks in {}", index.count().await, config.index_path.display());
    Ok(())
}
