use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use indicatif::{ProgressBar, ProgressStyle};
use std::io::Write;
use std::path::PathBuf;
use tracing::{debug, warn};

use askdb_cli::render::{answer_json, format_source, PartialPrinter};
use askdb_cli::DataProcessor;
use askdb_core::config::{resolve_with_base, Config};
use askdb_core::logging;
use askdb_pipeline::{AnsweredQuery, Pipeline, PipelineHandle, QueryEvent};

#[derive(Parser)]
#[command(name = "askdb")]
#[command(about = "Ask questions about a folder of local documents")]
#[command(version)]
struct Cli {
    /// Directory holding config.toml and config.<env>.toml
    #[arg(long, global = true, default_value = ".")]
    config_dir: PathBuf,

    /// Environment name; defaults to RUST_ENV, then "dev"
    #[arg(long, global = true)]
    env: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Ingest every .txt file under a directory, replacing earlier versions
    Ingest {
        dir: PathBuf,

        /// Only the first N files
        #[arg(long)]
        limit: Option<usize>,
    },

    /// Answer a question from the ingested documents
    Ask {
        question: String,

        /// Print the final answer and sources as JSON
        #[arg(long)]
        json: bool,
    },

    /// Delete a document by id (its path under the ingested directory, without extension)
    Remove { doc_id: String },
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    let env_name = cli
        .env
        .or_else(|| std::env::var("RUST_ENV").ok())
        .unwrap_or_else(|| "dev".to_string());
    let config = Config::load_from(&cli.config_dir, &env_name)?;
    let mut settings = config.settings()?;
    settings.store.lancedb_dir =
        resolve_with_base(&cli.config_dir, &settings.store.lancedb_dir).to_string_lossy().into_owned();
    logging::init(&settings.logging)?;

    let handle = PipelineHandle::spawn(Pipeline::from_settings(&settings)?)?;
    let result = match cli.command {
        Commands::Ingest { dir, limit } => ingest(&handle, &dir, limit),
        Commands::Ask { question, json } => ask(&handle, &question, json),
        Commands::Remove { doc_id } => {
            let removed = handle.remove(doc_id.as_str())?;
            println!("Removed {removed} chunks of {doc_id}");
            Ok(())
        }
    };
    handle.shutdown();
    result
}

fn ingest(handle: &PipelineHandle, dir: &std::path::Path, limit: Option<usize>) -> Result<()> {
    let processed = DataProcessor::new()
        .process_directory(dir, limit)
        .with_context(|| format!("reading {}", dir.display()))?;
    if processed.documents.is_empty() && processed.failures.is_empty() {
        println!("No .txt files found under {}", dir.display());
        return Ok(());
    }

    let style = ProgressStyle::with_template("{spinner:.green} [{bar:40.cyan/blue}] {percent:>3}% {msg}")?
        .progress_chars("#>-");
    let (mut ingested, mut failed) = (0usize, 0usize);
    for failure in &processed.failures {
        eprintln!("{} failed: {:#}", failure.doc_id, failure.error);
        failed += 1;
    }
    for document in processed.documents {
        let bar = ProgressBar::new(100).with_style(style.clone()).with_message(document.doc_id.clone());
        let outcome = handle
            .ingest(document.doc_id.as_str(), document.chunks)?
            .wait_with_progress(|percent| bar.set_position(u64::from(percent)));
        match outcome {
            Ok(chunks) => {
                bar.finish_with_message(format!("{} ({chunks} chunks)", document.doc_id));
                ingested += 1;
            }
            Err(err) => {
                bar.abandon_with_message(format!("{} failed", document.doc_id));
                warn!(doc_id = %document.doc_id, path = %document.path.display(), error = %err, "ingestion failed");
                failed += 1;
            }
        }
    }
    println!("Ingested {ingested} documents, {failed} failed");
    Ok(())
}

fn ask(handle: &PipelineHandle, question: &str, json: bool) -> Result<()> {
    let stream = handle.ask(question)?;
    debug!(query_id = stream.query_id(), "question queued");
    if json {
        let answer = stream.wait()?;
        println!("{}", serde_json::to_string_pretty(&answer_json(&answer))?);
        return Ok(());
    }

    let mut printer = PartialPrinter::default();
    let mut stderr = std::io::stderr();
    for event in stream {
        match event {
            QueryEvent::SourcesReady { sources } => {
                for source in &sources {
                    eprintln!("{}", format_source(source));
                }
            }
            QueryEvent::PartialAnswer { text } => {
                if let Some(delta) = printer.delta(&text) {
                    write!(stderr, "{delta}")?;
                    stderr.flush()?;
                }
            }
            QueryEvent::FinalAnswer { text, sources, path } => {
                if printer.printed_anything() {
                    eprintln!();
                }
                print_final(&AnsweredQuery { text, sources, path, partials: Vec::new() });
                return Ok(());
            }
            QueryEvent::Error { message } => anyhow::bail!(message),
        }
    }
    anyhow::bail!("pipeline stopped before answering")
}

fn print_final(answer: &AnsweredQuery) {
    println!("{}", answer.text);
    if !answer.sources.is_empty() {
        println!();
        println!("Sources:");
        for source in &answer.sources {
            println!("  {}", format_source(source));
        }
    }
}
