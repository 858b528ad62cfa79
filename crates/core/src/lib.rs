//! Pitchsim Core Library
//!
//! Foundational utilities shared by the knowledge pipeline and the CLI:
//! - Error handling (`AppError`, `AppResult`)
//! - Logging infrastructure
//! - Configuration management

pub mod config;
pub mod error;
pub mod logging;

// Re-export commonly used types
pub use config::{AppConfig, ChunkingSettings, EmbeddingSettings, KnowledgeConfig};
pub use error::{AppError, AppResult};
