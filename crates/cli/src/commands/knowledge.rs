//! Knowledge command handler.
//!
//! Exposes the knowledge store operations to an operator.

use clap::{Args, Subcommand};
use pitchsim_core::{config::AppConfig, AppError, AppResult};
use pitchsim_knowledge::{parser, FederatedHit, KnowledgeStore};
use std::path::PathBuf;

/// Knowledge table management
#[derive(Args, Debug)]
pub struct KnowledgeCommand {
    #[command(subcommand)]
    pub action: KnowledgeAction,
}

#[derive(Subcommand, Debug)]
pub enum KnowledgeAction {
    /// Replace a table's contents with documents from disk
    Ingest(KnowledgeIngestCommand),
    /// Search one table or all known tables
    Query(KnowledgeQueryCommand),
    /// Drop a table
    Clear(KnowledgeClearCommand),
    /// Show per-table status
    Stats(KnowledgeStatsCommand),
}

impl KnowledgeCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        match &self.action {
            KnowledgeAction::Ingest(cmd) => cmd.execute(config).await,
            KnowledgeAction::Query(cmd) => cmd.execute(config).await,
            KnowledgeAction::Clear(cmd) => cmd.execute(config).await,
            KnowledgeAction::Stats(cmd) => cmd.execute(config).await,
        }
    }
}

/// Open the store with the configured embedding provider.
fn open_store(config: &AppConfig) -> AppResult<KnowledgeStore> {
    let api_key = config.resolve_api_key();
    KnowledgeStore::from_config(config, api_key.as_deref())
}

/// Open the store for commands that never embed text.
///
/// Swaps in the offline provider so maintenance works without an API key.
fn open_store_without_embeddings(config: &AppConfig) -> AppResult<KnowledgeStore> {
    let mut offline = config.clone();
    offline.knowledge.embedding.provider = "mock".to_string();
    KnowledgeStore::from_config(&offline, None)
}

fn print_json(value: &impl serde::Serialize) -> AppResult<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

/// Ingest documents into a table
#[derive(Args, Debug)]
pub struct KnowledgeIngestCommand {
    /// Table name (e.g. website, documentation)
    pub bucket: String,

    /// Files or directories to ingest
    #[arg(long, required = true)]
    pub path: Vec<PathBuf>,

    /// File extensions to include when walking directories
    #[arg(long, value_delimiter = ',')]
    pub ext: Vec<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeIngestCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        tracing::info!("Ingesting into knowledge table '{}'", self.bucket);

        let store = open_store(config)?;
        let documents = parser::collect_documents(&self.path, &self.ext)?;

        let report = store
            .ingest_documents(&self.bucket, &documents, &config.knowledge.chunking)
            .await?;

        if self.json {
            print_json(&report)?;
        } else {
            println!(
                "Ingested {} documents into '{}' ({} chunks)",
                report.documents_processed, report.table, report.chunks_created
            );
        }

        Ok(())
    }
}

/// Query the knowledge tables
#[derive(Args, Debug)]
pub struct KnowledgeQueryCommand {
    /// Query text
    pub query: String,

    /// Number of results (default: knowledge.topK from config)
    #[arg(short = 'k', long)]
    pub top_k: Option<usize>,

    /// Restrict the search to one table
    #[arg(long)]
    pub bucket: Option<String>,

    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeQueryCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let top_k = self.top_k.unwrap_or(config.knowledge.top_k);
        if top_k == 0 {
            return Err(AppError::Config("--top-k must be at least 1".to_string()));
        }

        let store = open_store(config)?;

        let hits: Vec<FederatedHit> = match &self.bucket {
            Some(bucket) => store
                .query(bucket, &self.query, top_k)
                .await
                .into_iter()
                .map(|hit| FederatedHit {
                    text: hit.text,
                    source: hit.source,
                    table: bucket.clone(),
                    score: hit.score,
                })
                .collect(),
            None => store.query_all(&self.query, top_k).await,
        };

        tracing::debug!("Query returned {} results", hits.len());

        if self.json {
            return print_json(&hits);
        }

        if hits.is_empty() {
            println!("No knowledge found.");
            return Ok(());
        }

        for (rank, hit) in hits.iter().enumerate() {
            println!(
                "{}. [{}] {} (distance {:.4})",
                rank + 1,
                hit.table,
                hit.source,
                hit.score
            );
            println!("   {}", preview(&hit.text, 200));
        }

        Ok(())
    }
}

/// First `max_chars` characters of `text` on one line.
fn preview(text: &str, max_chars: usize) -> String {
    let flat = text.split_whitespace().collect::<Vec<_>>().join(" ");
    if flat.chars().count() <= max_chars {
        flat
    } else {
        let cut: String = flat.chars().take(max_chars).collect();
        format!("{}...", cut)
    }
}

/// Drop a table
#[derive(Args, Debug)]
pub struct KnowledgeClearCommand {
    /// Table name
    pub bucket: String,
}

impl KnowledgeClearCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = open_store_without_embeddings(config)?;
        store.clear(&self.bucket).await;

        println!("Knowledge table '{}' cleared", self.bucket);

        Ok(())
    }
}

/// Show table statistics
#[derive(Args, Debug)]
pub struct KnowledgeStatsCommand {
    /// Output as JSON
    #[arg(long)]
    pub json: bool,
}

impl KnowledgeStatsCommand {
    pub async fn execute(&self, config: &AppConfig) -> AppResult<()> {
        let store = open_store_without_embeddings(config)?;
        let stats = store.stats().await;

        if self.json {
            let output = serde_json::json!({
                "dbPath": config.db_path(),
                "tables": stats,
            });
            return print_json(&output);
        }

        println!("Database: {}", config.db_path().display());
        for table in &stats {
            if table.has_content {
                println!("  {:<16} {} chunks", table.name, table.rows);
            } else {
                println!("  {:<16} (empty)", table.name);
            }
        }

        Ok(())
    }
}
