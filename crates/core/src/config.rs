//! Configuration management for pitchsim.
//!
//! Configuration is merged from several sources, later ones winning:
//! - Built-in defaults
//! - Environment variables
//! - The workspace config file (`.pitchsim/config.yaml`)
//! - Command-line flags
//!
//! The configuration is workspace-centric, with all state stored in `.pitchsim/`.

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::error::{AppError, AppResult};

/// Name of the per-workspace state directory.
pub const STATE_DIR: &str = ".pitchsim";

/// Knowledge-source tables every store knows about unless configured otherwise.
pub const DEFAULT_TABLES: [&str; 2] = ["website", "documentation"];

/// Main application configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Path to the workspace root (contains .pitchsim/)
    pub workspace: PathBuf,

    /// Optional config file path
    pub config_file: Option<PathBuf>,

    /// Log level override
    pub log_level: Option<String>,

    /// Verbose mode (enables debug logging)
    pub verbose: bool,

    /// Disable colored output
    pub no_color: bool,

    /// Knowledge pipeline settings
    pub knowledge: KnowledgeConfig,
}

/// Knowledge pipeline configuration (the `knowledge:` section of config.yaml).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct KnowledgeConfig {
    /// Vector database directory; relative paths resolve against the workspace
    pub db_path: PathBuf,

    /// Fixed set of knowledge-source tables the store owns
    pub tables: Vec<String>,

    /// Default number of results for federated queries
    pub top_k: usize,

    /// Chunking parameters
    pub chunking: ChunkingSettings,

    /// Embedding provider parameters
    pub embedding: EmbeddingSettings,
}

impl Default for KnowledgeConfig {
    fn default() -> Self {
        Self {
            db_path: PathBuf::from(STATE_DIR).join("lancedb"),
            tables: DEFAULT_TABLES.iter().map(|t| t.to_string()).collect(),
            top_k: 5,
            chunking: ChunkingSettings::default(),
            embedding: EmbeddingSettings::default(),
        }
    }
}

impl KnowledgeConfig {
    /// Validate the knowledge section.
    pub fn validate(&self) -> AppResult<()> {
        if self.tables.is_empty() {
            return Err(AppError::Config(
                "At least one knowledge table must be configured".to_string(),
            ));
        }
        if let Some(bad) = self.tables.iter().find(|t| !is_valid_table_name(t)) {
            return Err(AppError::Config(format!(
                "Invalid table name '{}': use letters, digits, '-' or '_'",
                bad
            )));
        }
        if self.top_k == 0 {
            return Err(AppError::Config("topK must be at least 1".to_string()));
        }
        self.chunking.validate()?;
        self.embedding.validate()
    }
}

fn is_valid_table_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
}

/// Character-based chunking parameters.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default, rename_all = "camelCase")]
pub struct ChunkingSettings {
    /// Target chunk size in characters (about 375 tokens)
    pub chunk_size: usize,

    /// Characters carried over from the end of one chunk into the next
    pub chunk_overlap: usize,

    /// Chunks shorter than this are not emitted
    pub min_chunk_size: usize,
}

impl Default for ChunkingSettings {
    fn default() -> Self {
        Self {
            chunk_size: 1500,
            chunk_overlap: 200,
            min_chunk_size: 100,
        }
    }
}

impl ChunkingSettings {
    /// Reject parameter combinations the chunker cannot honor.
    pub fn validate(&self) -> AppResult<()> {
        if self.chunk_size == 0 {
            return Err(AppError::Config("chunkSize must be positive".to_string()));
        }
        if self.chunk_overlap >= self.chunk_size {
            return Err(AppError::Config(format!(
                "chunkOverlap ({}) must be smaller than chunkSize ({})",
                self.chunk_overlap, self.chunk_size
            )));
        }
        Ok(())
    }
}

/// Embedding provider configuration.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default, rename_all = "camelCase")]
pub struct EmbeddingSettings {
    /// Provider name: "openai" or "mock"
    pub provider: String,

    /// Model identifier (provider-specific)
    pub model: String,

    /// Embedding vector dimensions
    pub dimensions: usize,

    /// Maximum inputs per provider request
    pub batch_size: usize,

    /// Environment variable holding the provider API key
    pub api_key_env: String,

    /// Custom API base URL
    pub endpoint: Option<String>,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for EmbeddingSettings {
    fn default() -> Self {
        Self {
            provider: "openai".to_string(),
            model: "text-embedding-3-small".to_string(),
            dimensions: 1536,
            batch_size: 100,
            api_key_env: "OPENAI_API_KEY".to_string(),
            endpoint: None,
            timeout_secs: 30,
        }
    }
}

impl EmbeddingSettings {
    fn validate(&self) -> AppResult<()> {
        if self.dimensions == 0 {
            return Err(AppError::Config(
                "Embedding dimensions must be positive".to_string(),
            ));
        }
        if self.batch_size == 0 {
            return Err(AppError::Config(
                "Embedding batchSize must be positive".to_string(),
            ));
        }
        Ok(())
    }
}

/// Full configuration file structure.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct ConfigFile {
    knowledge: Option<KnowledgeConfig>,
    logging: Option<LoggingConfig>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct LoggingConfig {
    level: Option<String>,
    color: Option<bool>,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            workspace: std::env::current_dir().unwrap_or_else(|_| PathBuf::from(".")),
            config_file: None,
            log_level: None,
            verbose: false,
            no_color: false,
            knowledge: KnowledgeConfig::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables and defaults.
    ///
    /// Environment variables:
    /// - `PITCHSIM_WORKSPACE`: Override workspace path
    /// - `PITCHSIM_CONFIG`: Path to config file
    /// - `RUST_LOG`: Log level
    /// - `NO_COLOR`: Disable colored output
    pub fn load() -> AppResult<Self> {
        let workspace = std::env::var_os("PITCHSIM_WORKSPACE").map(PathBuf::from);
        let config_file = std::env::var_os("PITCHSIM_CONFIG").map(PathBuf::from);
        Self::load_from(workspace, config_file)
    }

    /// Load configuration for an explicit workspace and config file.
    ///
    /// Missing arguments fall back to the current directory and
    /// `<workspace>/.pitchsim/config.yaml` respectively.
    pub fn load_from(workspace: Option<PathBuf>, config_file: Option<PathBuf>) -> AppResult<Self> {
        let mut config = Self::default();

        if let Some(workspace) = workspace {
            config.workspace = workspace;
        }
        config.config_file = config_file;

        if !config.workspace.exists() {
            return Err(AppError::Config(format!(
                "Workspace directory does not exist: {:?}",
                config.workspace
            )));
        }

        let config_path = match config.config_file {
            Some(ref cf) => cf.clone(),
            None => config.state_dir().join("config.yaml"),
        };

        if config_path.exists() {
            config.merge_yaml(&config_path)?;
        } else if config.config_file.is_some() {
            return Err(AppError::Config(format!(
                "Config file not found: {:?}",
                config_path
            )));
        }

        if let Ok(level) = std::env::var("RUST_LOG") {
            config.log_level = Some(level);
        }

        if std::env::var_os("NO_COLOR").is_some() {
            config.no_color = true;
        }

        config.knowledge.validate()?;

        Ok(config)
    }

    /// Merge a YAML configuration file into this config.
    fn merge_yaml(&mut self, path: &Path) -> AppResult<()> {
        let contents = std::fs::read_to_string(path).map_err(|e| {
            AppError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        let file: ConfigFile = serde_yaml::from_str(&contents).map_err(|e| {
            AppError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })?;

        if let Some(logging) = file.logging {
            if let Some(level) = logging.level {
                self.log_level = Some(level);
            }
            if let Some(color) = logging.color {
                self.no_color = !color;
            }
        }

        if let Some(knowledge) = file.knowledge {
            self.knowledge = knowledge;
        }

        tracing::debug!("Merged configuration from {:?}", path);
        Ok(())
    }

    /// Apply CLI overrides to the configuration.
    ///
    /// Flags take precedence over environment variables and the config file.
    pub fn with_overrides(mut self, log_level: Option<String>, verbose: bool, no_color: bool) -> Self {
        if let Some(log_level) = log_level {
            self.log_level = Some(log_level);
        }

        if verbose {
            self.verbose = true;
            if self.log_level.is_none() {
                self.log_level = Some("debug".to_string());
            }
        }

        if no_color {
            self.no_color = true;
        }

        self
    }

    /// Get the path to the .pitchsim directory.
    pub fn state_dir(&self) -> PathBuf {
        self.workspace.join(STATE_DIR)
    }

    /// Ensure the .pitchsim directory exists.
    pub fn ensure_state_dir(&self) -> AppResult<()> {
        let dir = self.state_dir();
        if !dir.exists() {
            std::fs::create_dir_all(&dir).map_err(|e| {
                AppError::Config(format!("Failed to create {} directory: {}", STATE_DIR, e))
            })?;
        }
        Ok(())
    }

    /// Vector database location, resolved against the workspace.
    pub fn db_path(&self) -> PathBuf {
        if self.knowledge.db_path.is_absolute() {
            self.knowledge.db_path.clone()
        } else {
            self.workspace.join(&self.knowledge.db_path)
        }
    }

    /// Resolve the embedding API key from the configured environment variable.
    ///
    /// Returns `None` when the variable is unset or empty; the provider
    /// factory turns that into a "not configured" error.
    pub fn resolve_api_key(&self) -> Option<String> {
        std::env::var(&self.knowledge.embedding.api_key_env)
            .ok()
            .filter(|key| !key.trim().is_empty())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn write_config(dir: &Path, yaml: &str) -> PathBuf {
        let state = dir.join(STATE_DIR);
        std::fs::create_dir_all(&state).unwrap();
        let path = state.join("config.yaml");
        std::fs::write(&path, yaml).unwrap();
        path
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert!(!config.verbose);
        assert!(!config.no_color);
        assert_eq!(config.knowledge.tables, vec!["website", "documentation"]);
        assert_eq!(config.knowledge.top_k, 5);
        assert_eq!(config.knowledge.chunking.chunk_size, 1500);
        assert_eq!(config.knowledge.chunking.chunk_overlap, 200);
        assert_eq!(config.knowledge.chunking.min_chunk_size, 100);
        assert_eq!(config.knowledge.embedding.batch_size, 100);
        assert_eq!(config.knowledge.embedding.api_key_env, "OPENAI_API_KEY");
    }

    #[test]
    fn test_state_dir_and_db_path() {
        let temp = TempDir::new().unwrap();
        let config = AppConfig::load_from(Some(temp.path().to_path_buf()), None).unwrap();

        assert!(config.state_dir().ends_with(STATE_DIR));
        assert_eq!(config.db_path(), temp.path().join(".pitchsim").join("lancedb"));
    }

    #[test]
    fn test_yaml_merge() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            r#"
knowledge:
  dbPath: /var/lib/pitchsim/vectors
  tables: [website, documentation, faq]
  topK: 8
  chunking:
    chunkSize: 800
    chunkOverlap: 100
  embedding:
    provider: mock
    dimensions: 64
logging:
  level: warn
  color: false
"#,
        );

        let config = AppConfig::load_from(Some(temp.path().to_path_buf()), None).unwrap();

        assert_eq!(config.knowledge.tables.len(), 3);
        assert_eq!(config.knowledge.top_k, 8);
        assert_eq!(config.knowledge.chunking.chunk_size, 800);
        assert_eq!(config.knowledge.chunking.chunk_overlap, 100);
        // Unset fields keep their defaults
        assert_eq!(config.knowledge.chunking.min_chunk_size, 100);
        assert_eq!(config.knowledge.embedding.provider, "mock");
        assert_eq!(config.knowledge.embedding.model, "text-embedding-3-small");
        assert_eq!(config.db_path(), PathBuf::from("/var/lib/pitchsim/vectors"));
        assert!(config.no_color);
    }

    #[test]
    fn test_overlap_not_smaller_than_size_is_rejected() {
        let temp = TempDir::new().unwrap();
        write_config(
            temp.path(),
            "knowledge:\n  chunking:\n    chunkSize: 200\n    chunkOverlap: 200\n",
        );

        let err = AppConfig::load_from(Some(temp.path().to_path_buf()), None).unwrap_err();
        assert!(matches!(err, AppError::Config(_)));
        assert!(err.to_string().contains("chunkOverlap"));
    }

    #[test]
    fn test_invalid_table_name_is_rejected() {
        let mut knowledge = KnowledgeConfig::default();
        knowledge.tables.push("drop table;".to_string());
        assert!(knowledge.validate().is_err());
    }

    #[test]
    fn test_missing_explicit_config_file() {
        let temp = TempDir::new().unwrap();
        let result = AppConfig::load_from(
            Some(temp.path().to_path_buf()),
            Some(temp.path().join("nope.yaml")),
        );
        assert!(matches!(result, Err(AppError::Config(_))));
    }

    #[test]
    fn test_missing_workspace() {
        let result = AppConfig::load_from(Some(PathBuf::from("/definitely/not/here")), None);
        assert!(result.is_err());
    }

    #[test]
    fn test_with_overrides() {
        let config = AppConfig::default().with_overrides(None, true, true);

        assert!(config.verbose);
        assert!(config.no_color);
        assert_eq!(config.log_level, Some("debug".to_string()));
    }

    #[test]
    fn test_resolve_api_key_from_configured_env() {
        let mut config = AppConfig::default();
        config.knowledge.embedding.api_key_env = "PITCHSIM_TEST_KEY_UNSET_42".to_string();
        assert_eq!(config.resolve_api_key(), None);
    }
}
