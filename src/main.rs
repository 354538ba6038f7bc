//! agentrag - Main CLI Entry Point

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use rustyline::{error::ReadlineError, DefaultEditor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;
use uuid::Uuid;

use agentrag::cli::{display, Args, Commands, Doctor, Verbosity};
use agentrag::config::{Config, StoreKind};
use agentrag::ingest::{build_memory_store, ingest_into_qdrant, load_corpus, MarkdownChunker};
use agentrag::llm::OllamaClient;
use agentrag::store::{DocumentStore, InMemoryStore, MetadataFilter, OllamaEmbedder, QdrantStore};
use agentrag::telemetry::TelemetryCollector;
use agentrag::{AnswerReport, Query, RagError, WorkflowOrchestrator};

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    if let Err(e) = args.validate() {
        display::show_error(&e);
        std::process::exit(2);
    }

    let filter = match args.metadata_filter() {
        Ok(filter) => filter,
        Err(e) => {
            display::show_error(&e.to_string());
            std::process::exit(2);
        }
    };

    let mut config = Config::load(args.config.as_deref())?;
    args.apply_to(&mut config);
    config.validate()?;

    init_tracing(&config.logging.level, config.logging.json);

    match &args.command {
        Some(Commands::Start) => run_repl(&args, &config, &filter).await?,
        Some(Commands::Doctor) => run_doctor(config).await?,
        Some(Commands::Config) => show_config(&args, &config)?,
        Some(Commands::Ingest { dir, max_chars }) => run_ingest(&config, dir, *max_chars).await?,
        None => {
            if let Some(question) = &args.question {
                run_question(&args, &config, question, &filter).await?;
            }
        }
    }

    Ok(())
}

/// Logs go to stderr so answers on stdout stay pipeable
fn init_tracing(level: &str, json: bool) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(format!("agentrag={}", level)));

    let builder = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .with_target(false);

    if json {
        builder.json().init();
    } else {
        builder.init();
    }
}

fn ollama_client(config: &Config) -> Result<OllamaClient> {
    Ok(OllamaClient::with_config(&config.ollama_url(), &config.ollama.model)?)
}

fn connect_qdrant(config: &Config, client: &OllamaClient) -> Result<QdrantStore> {
    let embedder = Arc::new(OllamaEmbedder::new(
        client.clone(),
        config.ollama.embedding_model.clone(),
    ));
    let store = QdrantStore::connect(
        &config.store.qdrant_url,
        &config.store.collection,
        embedder,
        config.store.min_score,
    )?;
    Ok(store)
}

fn build_store(config: &Config, client: &OllamaClient) -> Result<Arc<dyn DocumentStore>> {
    let store: Arc<dyn DocumentStore> = match config.store.kind {
        StoreKind::Memory => match config.corpus_dir() {
            Some(dir) => Arc::new(build_memory_store(&dir, &MarkdownChunker::default())?),
            None => {
                warn!("no corpus configured; queries will be answered without evidence");
                Arc::new(InMemoryStore::new())
            }
        },
        StoreKind::Qdrant => Arc::new(connect_qdrant(config, client)?),
    };
    Ok(store)
}

fn build_orchestrator(config: &Config, telemetry: &TelemetryCollector) -> Result<WorkflowOrchestrator> {
    let client = ollama_client(config)?;
    let store = build_store(config, &client)?;
    info!(
        model = %config.ollama.model,
        store = ?config.store.kind,
        retry_budget = config.workflow.retry_budget,
        "workflow ready"
    );

    Ok(WorkflowOrchestrator::new(
        Arc::new(client),
        store,
        config.workflow.clone(),
        config.role_models(),
    )
    .with_telemetry(telemetry.clone()))
}

/// Run one query; Ctrl-C cancels it instead of killing the process
async fn ask(
    orchestrator: &WorkflowOrchestrator,
    query: Query,
    verbosity: Verbosity,
) -> agentrag::Result<AnswerReport> {
    let cancel = CancellationToken::new();
    let pb = display::spinner("Thinking...", verbosity);

    let run = orchestrator.run_with_cancel(query, cancel.clone());
    tokio::pin!(run);

    let result = tokio::select! {
        result = &mut run => result,
        _ = tokio::signal::ctrl_c() => {
            cancel.cancel();
            run.await
        }
    };

    pb.finish_and_clear();
    result
}

async fn run_question(
    args: &Args,
    config: &Config,
    question: &str,
    filter: &MetadataFilter,
) -> Result<()> {
    let telemetry = TelemetryCollector::new();
    let orchestrator = build_orchestrator(config, &telemetry)?;
    let verbosity = args.verbosity();

    let query = Query::new(question).with_filter(filter.clone());
    match ask(&orchestrator, query, verbosity).await {
        Ok(report) => {
            display::render_report(&report, verbosity);
            if verbosity == Verbosity::VeryVerbose {
                eprintln!("{}", telemetry.summary().dimmed());
            }
            Ok(())
        }
        Err(RagError::Cancelled) => {
            display::show_warning("Query cancelled");
            std::process::exit(130);
        }
        Err(e) => {
            display::show_error(&e.to_string());
            std::process::exit(1);
        }
    }
}

fn history_path() -> PathBuf {
    dirs::home_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join(".agentrag")
        .join("history")
}

/// Run interactive REPL mode
async fn run_repl(args: &Args, config: &Config, filter: &MetadataFilter) -> Result<()> {
    let telemetry = TelemetryCollector::new();
    let orchestrator = build_orchestrator(config, &telemetry)?;
    let verbosity = args.verbosity();
    let session_id = Uuid::new_v4().to_string();

    let mut editor = DefaultEditor::new().context("Failed to initialize line editor")?;
    let history = history_path();
    if editor.load_history(&history).is_err() {
        info!(path = %history.display(), "no previous history");
    }

    let store_label = match config.store.kind {
        StoreKind::Memory => "memory",
        StoreKind::Qdrant => "qdrant",
    };
    display::show_banner(VERSION, &config.ollama.model, store_label);

    loop {
        match editor.readline(&"agentrag> ".cyan().to_string()) {
            Ok(line) => {
                let input = line.trim();
                if input.is_empty() {
                    continue;
                }
                let _ = editor.add_history_entry(input);

                match input {
                    "/exit" | "/quit" => break,
                    "/stats" => {
                        println!("{}", telemetry.summary());
                        continue;
                    }
                    "/help" => {
                        println!("  /stats   Query statistics for this session");
                        println!("  /exit    Leave interactive mode");
                        continue;
                    }
                    _ => {}
                }

                let query = Query::new(input)
                    .with_session(session_id.clone())
                    .with_filter(filter.clone());
                match ask(&orchestrator, query, verbosity).await {
                    Ok(report) => display::render_report(&report, verbosity),
                    Err(RagError::Cancelled) => display::show_warning("Query cancelled"),
                    Err(e) => display::show_error(&e.to_string()),
                }
                println!();
            }
            Err(ReadlineError::Interrupted) => {
                println!("Use /exit or Ctrl-D to quit");
            }
            Err(ReadlineError::Eof) => break,
            Err(e) => return Err(e).context("Failed to read input"),
        }
    }

    if let Some(parent) = history.parent() {
        std::fs::create_dir_all(parent)
            .with_context(|| format!("Failed to create {}", parent.display()))?;
    }
    if let Err(e) = editor.save_history(&history) {
        warn!(error = %e, "failed to save history");
    }

    println!("{}", telemetry.summary().dimmed());
    Ok(())
}

async fn run_doctor(config: Config) -> Result<()> {
    let doctor = Doctor::new(config)?;
    let checks = doctor.run_diagnostics().await;
    Doctor::display_results(&checks);

    std::process::exit(if Doctor::overall_status(&checks) { 0 } else { 1 });
}

fn show_config(args: &Args, config: &Config) -> Result<()> {
    let source = args
        .config
        .clone()
        .or_else(Config::default_path)
        .filter(|p| p.exists());

    match source {
        Some(path) => println!("{} {}\n", "Loaded from:".bold(), path.display()),
        None => println!("{}\n", "Using built-in defaults".bold()),
    }

    let rendered = toml::to_string_pretty(config).context("Failed to render configuration")?;
    println!("{}", rendered);
    Ok(())
}

async fn run_ingest(config: &Config, dir: &std::path::Path, max_chars: usize) -> Result<()> {
    let chunker = MarkdownChunker::new(max_chars);

    match config.store.kind {
        StoreKind::Qdrant => {
            let client = ollama_client(config)?;
            let store = connect_qdrant(config, &client)?;
            let pb = display::spinner("Embedding chunks...", Verbosity::Normal);
            let written = ingest_into_qdrant(&store, dir, &chunker).await;
            pb.finish_and_clear();

            let written = written?;
            println!(
                "{} {} chunks into collection {}",
                "✓ Ingested".green(),
                written,
                store.collection()
            );
        }
        StoreKind::Memory => {
            let chunks = load_corpus(dir, &chunker)?;
            println!(
                "{} chunks from {} (the in-memory store is rebuilt on every run; use --store qdrant to persist)",
                chunks.len(),
                dir.display()
            );
        }
    }

    Ok(())
}
