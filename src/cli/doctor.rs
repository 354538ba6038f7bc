//! Doctor command for system diagnostics
//!
//! Checks that the model server, the configured models, and the document
//! store are reachable before any query runs.

use colored::*;
use std::sync::Arc;

use crate::config::{Config, StoreKind};
use crate::errors::Result;
use crate::llm::OllamaClient;
use crate::store::{OllamaEmbedder, QdrantStore};

/// Health check result
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HealthStatus {
    Pass,
    Warn(String),
    Fail(String),
}

/// Individual health check
#[derive(Debug)]
pub struct HealthCheck {
    pub name: String,
    pub status: HealthStatus,
}

impl HealthCheck {
    fn new(name: &str, status: HealthStatus) -> Self {
        Self {
            name: name.to_string(),
            status,
        }
    }
}

/// Doctor diagnostics system
pub struct Doctor {
    config: Config,
    client: OllamaClient,
}

impl Doctor {
    pub fn new(config: Config) -> Result<Self> {
        let client = OllamaClient::with_config(&config.ollama_url(), &config.ollama.model)?;
        Ok(Self { config, client })
    }

    /// Run all health checks
    pub async fn run_diagnostics(&self) -> Vec<HealthCheck> {
        let mut checks = Vec::new();

        let reachable = self.client.health_check().await.unwrap_or(false);
        checks.push(self.check_ollama_api(reachable));
        if reachable {
            checks.push(self.check_models().await);
        }
        checks.push(self.check_store().await);

        checks
    }

    fn check_ollama_api(&self, reachable: bool) -> HealthCheck {
        let status = if reachable {
            HealthStatus::Pass
        } else {
            HealthStatus::Fail(format!(
                "Ollama not reachable at {} (start with: ollama serve)",
                self.client.base_url()
            ))
        };
        HealthCheck::new("Ollama API", status)
    }

    /// Every model a role will ask for must be installed
    fn required_models(&self) -> Vec<String> {
        let roles = self.config.role_models();
        let mut models = vec![
            roles.router.model,
            roles.grader.model,
            roles.synthesizer.model,
            roles.checker.model,
        ];
        if self.config.store.kind == StoreKind::Qdrant {
            models.push(self.config.ollama.embedding_model.clone());
        }
        models.sort();
        models.dedup();
        models
    }

    async fn check_models(&self) -> HealthCheck {
        match self.client.list_models().await {
            Ok(installed) => {
                let missing = missing_models(&self.required_models(), &installed);
                let status = if missing.is_empty() {
                    HealthStatus::Pass
                } else {
                    HealthStatus::Fail(format!(
                        "Missing: {} (install with: ollama pull <model>)",
                        missing.join(", ")
                    ))
                };
                HealthCheck::new("Models Available", status)
            }
            Err(e) => HealthCheck::new(
                "Models Available",
                HealthStatus::Fail(format!("Cannot check models: {}", e)),
            ),
        }
    }

    async fn check_store(&self) -> HealthCheck {
        match self.config.store.kind {
            StoreKind::Memory => match self.config.corpus_dir() {
                Some(dir) if dir.is_dir() => HealthCheck::new("Document Store", HealthStatus::Pass),
                Some(dir) => HealthCheck::new(
                    "Document Store",
                    HealthStatus::Fail(format!("Corpus directory not found: {}", dir.display())),
                ),
                None => HealthCheck::new(
                    "Document Store",
                    HealthStatus::Warn(
                        "No corpus configured; every query will answer without evidence".to_string(),
                    ),
                ),
            },
            StoreKind::Qdrant => {
                let embedder = Arc::new(OllamaEmbedder::new(
                    self.client.clone(),
                    self.config.ollama.embedding_model.clone(),
                ));
                let store = match QdrantStore::connect(
                    &self.config.store.qdrant_url,
                    &self.config.store.collection,
                    embedder,
                    self.config.store.min_score,
                ) {
                    Ok(store) => store,
                    Err(e) => {
                        return HealthCheck::new("Document Store", HealthStatus::Fail(e.to_string()))
                    }
                };

                if !store.health_check().await {
                    return HealthCheck::new(
                        "Document Store",
                        HealthStatus::Fail(format!(
                            "Qdrant not reachable at {}",
                            self.config.store.qdrant_url
                        )),
                    );
                }
                match store.count().await {
                    Ok(0) => HealthCheck::new(
                        "Document Store",
                        HealthStatus::Warn(format!(
                            "Collection {} is empty (run: agentrag ingest <DIR>)",
                            store.collection()
                        )),
                    ),
                    Ok(_) => HealthCheck::new("Document Store", HealthStatus::Pass),
                    Err(_) => HealthCheck::new(
                        "Document Store",
                        HealthStatus::Warn(format!(
                            "Collection {} does not exist yet",
                            store.collection()
                        )),
                    ),
                }
            }
        }
    }

    /// Display diagnostics results
    pub fn display_results(checks: &[HealthCheck]) {
        println!("\n{}\n", "agentrag System Diagnostics".bold());
        println!("{:<20} Status", "Check");
        println!("{}", "=".repeat(50));

        for check in checks {
            let line = match &check.status {
                HealthStatus::Pass => "PASS".green().to_string(),
                HealthStatus::Warn(msg) => format!("WARN: {}", msg).yellow().to_string(),
                HealthStatus::Fail(msg) => format!("FAIL: {}", msg).red().to_string(),
            };
            println!("{:<20} {}", check.name, line);
        }

        println!();
    }

    /// Get overall health status
    pub fn overall_status(checks: &[HealthCheck]) -> bool {
        !checks
            .iter()
            .any(|c| matches!(c.status, HealthStatus::Fail(_)))
    }
}

/// Required models not installed; a bare name matches any installed tag
fn missing_models(required: &[String], installed: &[String]) -> Vec<String> {
    required
        .iter()
        .filter(|model| {
            !installed.iter().any(|i| {
                i == *model || (!model.contains(':') && i.split(':').next() == Some(model.as_str()))
            })
        })
        .cloned()
        .collect()
}
