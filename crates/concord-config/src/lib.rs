// ============================================================================
// Concord Config - Centralized configuration management
// ============================================================================
//
// This crate provides centralized configuration for the Concord transaction
// manager. Supports loading from environment variables with sensible
// defaults.
//
// ============================================================================

mod constants;
mod coordinator;
mod database;
mod kafka;

// Re-export all public types
pub use constants::{
    DEFAULT_DISPATCH_TIMEOUT_MS, DEFAULT_MSG_RETENTION_DAYS, SECONDS_PER_DAY, SECONDS_PER_HOUR,
    SECONDS_PER_MINUTE,
};
pub use coordinator::CoordinatorConfig;
pub use database::DbConfig;
pub use kafka::KafkaConfig;

use anyhow::Result;

/// Main configuration structure for the Concord server
#[derive(Clone, Debug)]
pub struct Config {
    pub database_url: String,
    pub rust_log: String,

    // Sub-configurations
    pub db: DbConfig,
    pub kafka: KafkaConfig,
    pub coordinator: CoordinatorConfig,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        dotenvy::dotenv().ok();

        Ok(Self {
            database_url: std::env::var("DATABASE_URL")?,
            rust_log: std::env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            db: DbConfig::from_env(),
            kafka: KafkaConfig::from_env(),
            coordinator: CoordinatorConfig::from_env(),
        })
    }
}
