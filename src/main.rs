//! Contract assistant CLI
//!
//! Reads contract text from a file (PDF or plain text) or stdin, runs the
//! analysis pipeline, and prints a plain-language report. `--speak`
//! additionally narrates the summary and next steps to an MP3 artifact.

use std::io::Read;
use std::path::PathBuf;
use std::sync::Arc;

use anyhow::{bail, Result};
use tracing_subscriber::EnvFilter;

use lexplain::config::Config;
use lexplain::pipeline::Analyzer;
use lexplain::speech::{GoogleTranslateTts, SpeechSynthesizer};
use lexplain::types::{ContractDocument, DocumentAnalysis, Language};
use lexplain::{provider, ReferenceIndex};

struct CliArgs {
    input: Option<PathBuf>,
    /// None means "use the configured default".
    language: Option<Language>,
    json: bool,
    speak: bool,
}

fn print_usage() {
    eprintln!(
        "Usage: lexplain [FILE|-] [options]\n\n\
         Reads a contract (PDF or plain text; '-' or no FILE for stdin) and\n\
         prints a clause-by-clause plain-language analysis.\n\n\
         Options:\n\
           -l, --language NAME   Output language (English, Hindi, Tamil,\n\
                                 Malayalam, Kannada, Bengali)\n\
           --json                Print the raw analysis as JSON\n\
           --speak               Narrate summary and next steps to an MP3\n\
           -h, --help            Show this help"
    );
}

fn parse_args() -> Result<CliArgs> {
    let mut input = None;
    let mut language = None;
    let mut json = false;
    let mut speak = false;

    let mut args = std::env::args().skip(1);
    while let Some(arg) = args.next() {
        match arg.as_str() {
            "--language" | "-l" => {
                let Some(name) = args.next() else {
                    bail!("--language needs a value");
                };
                language = Some(name.parse::<Language>()?);
            }
            "--json" => json = true,
            "--speak" => speak = true,
            "--help" | "-h" => {
                print_usage();
                std::process::exit(0);
            }
            "-" => input = None,
            other if other.starts_with('-') => bail!("unknown flag: {other}"),
            path => input = Some(PathBuf::from(path)),
        }
    }

    Ok(CliArgs { input, language, json, speak })
}

async fn load_document(input: &Option<PathBuf>) -> Result<ContractDocument> {
    match input {
        Some(path) if path.extension().is_some_and(|e| e.eq_ignore_ascii_case("pdf")) => {
            let bytes = tokio::fs::read(path).await?;
            Ok(ContractDocument::from_pdf_bytes(&bytes, path.display().to_string())?)
        }
        Some(path) => {
            let text = tokio::fs::read_to_string(path).await?;
            Ok(ContractDocument::from_text(text).with_source(path.display().to_string()))
        }
        None => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text)?;
            Ok(ContractDocument::from_text(text))
        }
    }
}

fn print_analysis(analysis: &DocumentAnalysis) {
    println!("\n{}", "═".repeat(60));
    println!("📑 Summary");
    println!("{}", "═".repeat(60));
    println!("{}", analysis.summary);

    println!("\n⚠️  Clause-by-Clause Analysis");
    println!("{}", "─".repeat(60));
    for item in &analysis.clauses {
        println!("\nClause {} [Risk: {}]", item.clause.number, item.risk);
        println!("  Original:    {}", item.clause.text);
        println!("  Explanation: {}", item.explanation);
        if !item.example.is_empty() {
            println!("  Example:     {}", item.example);
        }
        if let Some(ref law) = item.law_reference {
            println!("  Law:         {}", law);
        }
    }

    println!("\n❓ Suggested Questions for Lawyers");
    println!("{}", "─".repeat(60));
    println!("{}", analysis.lawyer_questions);

    println!("\n📝 Next Steps Checklist");
    println!("{}", "─".repeat(60));
    println!("{}", analysis.next_steps);

    println!("\nDisclaimer: This is not legal advice.");
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenv::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .init();

    let args = parse_args()?;
    let config = Config::from_env()?;
    let language = args.language.unwrap_or(config.default_language);

    let document = load_document(&args.input).await?;
    let backend = provider::from_config(&config)?;
    let index = Arc::new(ReferenceIndex::open(&config.index_path, &config.embedding_model)?);
    let analyzer = Analyzer::from_config(backend, Some(index), &config);

    let analysis = analyzer.analyze(&document, language).await?;

    if analysis.fully_degraded() {
        eprintln!(
            "⚠️  The generation backend could not be reached; showing fallback records only."
        );
    }

    if args.json {
        println!("{}", serde_json::to_string_pretty(&analysis)?);
    } else {
        print_analysis(&analysis);
    }

    if args.speak {
        let narration = format!("{}\n\nNext Steps:\n{}", analysis.summary, analysis.next_steps);
        let tts = GoogleTranslateTts::new(&config.artifact_dir);
        match tts.synthesize(&narration, language).await {
            Ok(path) => println!("\n🎧 Narration written to {}", path.display()),
            Err(e) => eprintln!("⚠️  Narration failed: {e}"),
        }
    }

    Ok(())
}
