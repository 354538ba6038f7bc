//! Command-line argument parsing for agentrag
//!
//! Provides clap-based CLI with subcommands and verbosity control.

use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;

use crate::config::{Config, StoreKind};
use crate::errors::Result;
use crate::ingest::DEFAULT_MAX_CHUNK_CHARS;
use crate::store::MetadataFilter;

/// agentrag - Answer questions over your documents with an agentic RAG workflow
#[derive(Parser, Debug)]
#[command(name = "agentrag")]
#[command(version)]
#[command(about = "Answer questions over a private document corpus with local Ollama models", long_about = None)]
pub struct Args {
    /// Question to answer
    #[arg(value_name = "QUESTION")]
    pub question: Option<String>,

    /// Ollama model for every role without its own override
    #[arg(short, long)]
    pub model: Option<String>,

    /// Ollama host
    #[arg(long)]
    pub host: Option<String>,

    /// Ollama port
    #[arg(long)]
    pub port: Option<u16>,

    /// Configuration file path
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Document store backend
    #[arg(long, value_enum)]
    pub store: Option<StoreArg>,

    /// Markdown/text corpus loaded into the in-memory store
    #[arg(long)]
    pub corpus: Option<PathBuf>,

    /// Passages per retrieval
    #[arg(long)]
    pub top_k: Option<usize>,

    /// Shared retry budget per query
    #[arg(long)]
    pub retry_budget: Option<usize>,

    /// Only search documents of this version
    #[arg(long, value_name = "VERSION")]
    pub doc_version: Option<String>,

    /// Only search documents of this type, e.g. "Test Protocol"
    #[arg(long)]
    pub protocol_type: Option<String>,

    /// Only search documents in force on this date (YYYY-MM-DD)
    #[arg(long, value_name = "DATE")]
    pub effective_date: Option<String>,

    /// Verbosity level: -q (quiet), default (normal), -v (verbose), -vv (very verbose)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Quiet mode (suppress all output except the answer)
    #[arg(short, long)]
    pub quiet: bool,

    /// Emit logs as JSON
    #[arg(long)]
    pub log_json: bool,

    /// Subcommand
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available subcommands
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Start interactive REPL mode
    Start,

    /// Run system diagnostics and health checks
    Doctor,

    /// Display current configuration
    Config,

    /// Chunk a markdown/text directory into the Qdrant collection
    Ingest {
        /// Corpus directory
        dir: PathBuf,

        /// Maximum characters per chunk
        #[arg(long, default_value_t = DEFAULT_MAX_CHUNK_CHARS)]
        max_chars: usize,
    },
}

/// Store selection on the command line
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreArg {
    Memory,
    Qdrant,
}

impl From<StoreArg> for StoreKind {
    fn from(arg: StoreArg) -> Self {
        match arg {
            StoreArg::Memory => StoreKind::Memory,
            StoreArg::Qdrant => StoreKind::Qdrant,
        }
    }
}

/// Verbosity level enum
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Verbosity {
    Quiet,
    Normal,
    Verbose,
    VeryVerbose,
}

impl Args {
    /// Get verbosity level based on flags
    pub fn verbosity(&self) -> Verbosity {
        if self.quiet {
            Verbosity::Quiet
        } else {
            match self.verbose {
                0 => Verbosity::Normal,
                1 => Verbosity::Verbose,
                _ => Verbosity::VeryVerbose,
            }
        }
    }

    /// Metadata scope from the filter flags; empty when none are given
    pub fn metadata_filter(&self) -> Result<MetadataFilter> {
        let mut filter = MetadataFilter::new();
        if let Some(version) = &self.doc_version {
            filter = filter.version(version.as_str());
        }
        if let Some(protocol_type) = &self.protocol_type {
            filter = filter.protocol_type(protocol_type.as_str());
        }
        if let Some(date) = &self.effective_date {
            filter = filter.effective_on(date)?;
        }
        Ok(filter)
    }

    /// Check that a question and a subcommand are not mixed
    pub fn validate(&self) -> std::result::Result<(), String> {
        if self.command.is_none() && self.question.is_none() {
            return Err(
                "Question required. Use 'agentrag <QUESTION>' or run a subcommand.".to_string(),
            );
        }

        if self.command.is_some() && self.question.is_some() {
            return Err("Cannot specify a question with a subcommand.".to_string());
        }

        Ok(())
    }

    /// Apply command-line overrides on top of file configuration
    pub fn apply_to(&self, config: &mut Config) {
        if let Some(model) = &self.model {
            config.ollama.model = model.clone();
        }
        if let Some(host) = &self.host {
            config.ollama.host = host.clone();
        }
        if let Some(port) = self.port {
            config.ollama.port = port;
        }
        if let Some(store) = self.store {
            config.store.kind = store.into();
        }
        if let Some(corpus) = &self.corpus {
            config.store.corpus_dir = Some(corpus.to_string_lossy().into_owned());
        }
        if let Some(top_k) = self.top_k {
            config.workflow.top_k = top_k;
        }
        if let Some(retry_budget) = self.retry_budget {
            config.workflow.retry_budget = retry_budget;
            let needed = crate::config::WorkflowConfig::worst_case_transitions(retry_budget) + 1;
            config.workflow.max_iterations = config.workflow.max_iterations.max(needed);
        }
        if self.log_json {
            config.logging.json = true;
        }
        if self.verbosity() != Verbosity::Normal {
            config.logging.level = self.verbosity().log_level().to_string();
        }
    }
}

impl Verbosity {
    pub fn as_str(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "quiet",
            Verbosity::Normal => "normal",
            Verbosity::Verbose => "verbose",
            Verbosity::VeryVerbose => "very_verbose",
        }
    }

    /// Log level this verbosity maps to
    pub fn log_level(&self) -> &'static str {
        match self {
            Verbosity::Quiet => "warn",
            Verbosity::Normal => "info",
            Verbosity::Verbose => "debug",
            Verbosity::VeryVerbose => "trace",
        }
    }

    /// Check if should show the spinner
    pub fn show_progress(&self) -> bool {
        !matches!(self, Verbosity::Quiet)
    }

    /// Check if should show the stage trace under each answer
    pub fn show_trace(&self) -> bool {
        matches!(self, Verbosity::Verbose | Verbosity::VeryVerbose)
    }
}
