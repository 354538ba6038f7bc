//! Configuration management for agentrag
//!
//! TOML-based configuration with defaults and validation.
//! Location: ~/.agentrag/config.toml (or `--config <path>`)

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::errors::{RagError, Result};
use crate::llm::{CompletionOptions, DEFAULT_MODEL};
use crate::store::embedding::DEFAULT_EMBEDDING_MODEL;
use crate::store::qdrant::{DEFAULT_COLLECTION, DEFAULT_QDRANT_URL};

/// Complete configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub ollama: OllamaConfig,
    pub models: ModelsConfig,
    pub workflow: WorkflowConfig,
    pub store: StoreConfig,
    pub logging: LoggingConfig,
}

/// Ollama connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OllamaConfig {
    pub host: String,
    pub port: u16,
    pub model: String,
    pub embedding_model: String,
}

/// Generation options for one reasoning role
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RoleOptions {
    /// Overrides `ollama.model` when set
    #[serde(default)]
    pub model: Option<String>,
    pub temperature: f32,
    pub max_tokens: u32,
}

impl RoleOptions {
    fn new(temperature: f32, max_tokens: u32) -> Self {
        Self {
            model: None,
            temperature,
            max_tokens,
        }
    }

    pub fn to_options(&self, default_model: &str) -> CompletionOptions {
        CompletionOptions::new(
            self.model.as_deref().unwrap_or(default_model),
            self.temperature,
            self.max_tokens,
        )
    }
}

/// Per-role model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    pub router: RoleOptions,
    pub grader: RoleOptions,
    pub synthesizer: RoleOptions,
    pub checker: RoleOptions,
}

/// Resolved options for every reasoning role
#[derive(Debug, Clone, PartialEq)]
pub struct RoleModels {
    pub router: CompletionOptions,
    pub grader: CompletionOptions,
    pub synthesizer: CompletionOptions,
    pub checker: CompletionOptions,
}

impl Default for RoleModels {
    fn default() -> Self {
        ModelsConfig::default().resolve(DEFAULT_MODEL)
    }
}

/// Workflow tuning
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Cap on stage transitions per query
    pub max_iterations: usize,
    /// Shared budget for reformulation, re-synthesis, and synthesis retry
    pub retry_budget: usize,
    /// Passages per retrieval
    pub top_k: usize,
    /// Per external call
    pub call_timeout_secs: u64,
    /// Concurrent grading calls
    pub grading_concurrency: usize,
    /// Candidates fetched per passage kept, for re-ranking
    pub overfetch: usize,
}

/// Store backend selection
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreKind {
    Memory,
    Qdrant,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    pub kind: StoreKind,
    /// Markdown/text directory loaded into the memory store
    pub corpus_dir: Option<String>,
    pub qdrant_url: String,
    pub collection: String,
    /// Minimum similarity for Qdrant hits
    pub min_score: f32,
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    pub level: String,
    pub json: bool,
}

impl Default for OllamaConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 11434,
            model: DEFAULT_MODEL.to_string(),
            embedding_model: DEFAULT_EMBEDDING_MODEL.to_string(),
        }
    }
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            router: RoleOptions::new(0.0, 64),
            grader: RoleOptions::new(0.0, 16),
            synthesizer: RoleOptions::new(0.1, 1024),
            checker: RoleOptions::new(0.0, 16),
        }
    }
}

impl ModelsConfig {
    pub fn resolve(&self, default_model: &str) -> RoleModels {
        RoleModels {
            router: self.router.to_options(default_model),
            grader: self.grader.to_options(default_model),
            synthesizer: self.synthesizer.to_options(default_model),
            checker: self.checker.to_options(default_model),
        }
    }

    fn roles(&self) -> [(&'static str, &RoleOptions); 4] {
        [
            ("router", &self.router),
            ("grader", &self.grader),
            ("synthesizer", &self.synthesizer),
            ("checker", &self.checker),
        ]
    }
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            max_iterations: 16,
            retry_budget: 2,
            top_k: 4,
            call_timeout_secs: 60,
            grading_concurrency: 4,
            overfetch: 2,
        }
    }
}

impl WorkflowConfig {
    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    /// Most stage transitions a run can take with a given retry budget
    ///
    /// ROUTING→RETRIEVING→GRADING→SYNTHESIZING→CHECKING→DONE is five; every
    /// budget unit adds at most three (REFORMULATING→RETRIEVING→GRADING).
    pub fn worst_case_transitions(retry_budget: usize) -> usize {
        5 + 3 * retry_budget
    }

    pub fn validate(&self) -> Result<()> {
        if self.top_k == 0 {
            return Err(RagError::Config("top_k must be at least 1".to_string()));
        }
        if self.max_iterations == 0 {
            return Err(RagError::Config("max_iterations must be at least 1".to_string()));
        }
        if self.grading_concurrency == 0 {
            return Err(RagError::Config(
                "grading_concurrency must be at least 1".to_string(),
            ));
        }
        if self.call_timeout_secs == 0 {
            return Err(RagError::Config(
                "call_timeout_secs must be at least 1".to_string(),
            ));
        }
        if self.overfetch == 0 {
            return Err(RagError::Config("overfetch must be at least 1".to_string()));
        }
        let needed = Self::worst_case_transitions(self.retry_budget) + 1;
        if self.max_iterations < needed {
            return Err(RagError::Config(format!(
                "max_iterations ({}) must be at least {} for retry_budget {}",
                self.max_iterations, needed, self.retry_budget
            )));
        }
        Ok(())
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            kind: StoreKind::Memory,
            corpus_dir: None,
            qdrant_url: DEFAULT_QDRANT_URL.to_string(),
            collection: DEFAULT_COLLECTION.to_string(),
            min_score: 0.3,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl Config {
    /// Load configuration from file or use defaults
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(config_path) => Self::load_from_file(config_path),
            None => Self::load_default(),
        }
    }

    pub fn load_from_file(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)
            .map_err(|e| RagError::Config(format!("Failed to read config: {}", e)))?;

        let config: Config = toml::from_str(&contents)
            .map_err(|e| RagError::Config(format!("Failed to parse config: {}", e)))?;

        config.validate()?;
        Ok(config)
    }

    /// Standard location if present, otherwise built-in defaults
    pub fn load_default() -> Result<Self> {
        match Self::default_path() {
            Some(path) if path.exists() => Self::load_from_file(&path),
            _ => Ok(Config::default()),
        }
    }

    pub fn default_path() -> Option<PathBuf> {
        dirs::home_dir().map(|home| home.join(".agentrag").join("config.toml"))
    }

    pub fn validate(&self) -> Result<()> {
        self.workflow.validate()?;

        for (role, options) in self.models.roles() {
            if !(0.0..=2.0).contains(&options.temperature) {
                return Err(RagError::Config(format!(
                    "models.{}.temperature must be between 0.0 and 2.0",
                    role
                )));
            }
            if options.max_tokens == 0 {
                return Err(RagError::Config(format!(
                    "models.{}.max_tokens must be at least 1",
                    role
                )));
            }
        }

        if self.store.kind == StoreKind::Qdrant && self.store.collection.trim().is_empty() {
            return Err(RagError::Config("store.collection must not be empty".to_string()));
        }

        match self.logging.level.as_str() {
            "error" | "warn" | "info" | "debug" | "trace" => {}
            other => {
                return Err(RagError::Config(format!("Invalid log level: {}", other)));
            }
        }

        Ok(())
    }

    pub fn save(&self, path: &Path) -> Result<()> {
        let contents = toml::to_string_pretty(self)
            .map_err(|e| RagError::Config(format!("Failed to serialize config: {}", e)))?;

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .map_err(|e| RagError::Config(format!("Failed to create config dir: {}", e)))?;
        }

        std::fs::write(path, contents)
            .map_err(|e| RagError::Config(format!("Failed to write config: {}", e)))?;
        Ok(())
    }

    pub fn ollama_url(&self) -> String {
        format!("http://{}:{}", self.ollama.host, self.ollama.port)
    }

    pub fn role_models(&self) -> RoleModels {
        self.models.resolve(&self.ollama.model)
    }

    /// Expand a leading `~/`
    pub fn expand_path(path: &str) -> PathBuf {
        if let Some(rest) = path.strip_prefix("~/") {
            if let Some(home) = dirs::home_dir() {
                return home.join(rest);
            }
        }
        PathBuf::from(path)
    }

    pub fn corpus_dir(&self) -> Option<PathBuf> {
        self.store.corpus_dir.as_deref().map(Self::expand_path)
    }
}
