//! Configuration management

use std::path::PathBuf;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ============================================================================
// Server Configuration Constants
// ============================================================================

/// Default server host binding.
pub const DEFAULT_SERVER_HOST: &str = "127.0.0.1";

/// Default server port.
pub const DEFAULT_SERVER_PORT: u16 = 8080;

/// Default shutdown timeout in seconds.
pub const DEFAULT_SHUTDOWN_TIMEOUT_SECS: u64 = 30;

/// Default database URL for local development.
pub const DEFAULT_DATABASE_URL: &str = "postgresql://localhost/roster";

pub const DEFAULT_DATABASE_MAX_CONNECTIONS: u32 = 20;
pub const DEFAULT_DATABASE_MIN_CONNECTIONS: u32 = 2;
pub const DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS: u64 = 10;
pub const DEFAULT_DATABASE_IDLE_TIMEOUT_SECS: u64 = 600;

pub const DEFAULT_CORS_ALLOWED_ORIGIN: &str = "http://localhost:3000";

// ============================================================================
// Ingestion Constants
// ============================================================================

/// Rows buffered per file before a bulk write.
pub const DEFAULT_INGEST_BATCH_SIZE: usize = 2000;

/// Files decoded concurrently within one upload.
pub const DEFAULT_INGEST_MAX_WORKERS: usize = 10;

/// Concurrent shard writes per bulk write.
pub const DEFAULT_INGEST_SHARD_COUNT: usize = 10;

/// Progress events buffered per upload on top of the reserved terminal events.
pub const DEFAULT_INGEST_CONDUIT_CAPACITY: usize = 256;

/// Seconds a finished, unclaimed upload session is kept before pruning.
pub const DEFAULT_INGEST_SESSION_RETENTION_SECS: u64 = 600;

/// Largest accepted multipart body (512 MiB).
pub const DEFAULT_INGEST_MAX_UPLOAD_BYTES: usize = 512 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server: ServerConfig,
    pub store: StoreBackend,
    pub database: DatabaseConfig,
    pub ingest: IngestConfig,
    pub cors: CorsConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub shutdown_timeout_secs: u64,
}

/// Where student records are persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
    Postgres,
    /// Process-local store, for demos and tests.
    Memory,
}

impl FromStr for StoreBackend {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "postgres" | "postgresql" => Ok(StoreBackend::Postgres),
            "memory" => Ok(StoreBackend::Memory),
            other => anyhow::bail!("Unknown ROSTER_STORE backend: {other}"),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub connect_timeout_secs: u64,
    pub idle_timeout_secs: u64,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    pub batch_size: usize,
    pub max_workers: usize,
    pub shard_count: usize,
    pub conduit_capacity: usize,
    pub session_retention_secs: u64,
    /// Directory for spooled uploads, the system temp dir when unset.
    pub spool_dir: Option<PathBuf>,
    pub max_upload_bytes: usize,
}

impl IngestConfig {
    pub fn session_retention(&self) -> Duration {
        Duration::from_secs(self.session_retention_secs)
    }

    pub fn spool_dir(&self) -> PathBuf {
        self.spool_dir.clone().unwrap_or_else(std::env::temp_dir)
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            batch_size: DEFAULT_INGEST_BATCH_SIZE,
            max_workers: DEFAULT_INGEST_MAX_WORKERS,
            shard_count: DEFAULT_INGEST_SHARD_COUNT,
            conduit_capacity: DEFAULT_INGEST_CONDUIT_CAPACITY,
            session_retention_secs: DEFAULT_INGEST_SESSION_RETENTION_SECS,
            spool_dir: None,
            max_upload_bytes: DEFAULT_INGEST_MAX_UPLOAD_BYTES,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CorsConfig {
    pub allowed_origins: Vec<String>,
    pub allow_credentials: bool,
}

/// Reads and parses `key`, falling back to `default` when unset or unparsable.
fn env_or<T: FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|value| value.parse().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment and defaults
    pub fn load() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let store = match std::env::var("ROSTER_STORE") {
            Ok(raw) => raw.parse()?,
            Err(_) => StoreBackend::Postgres,
        };

        let config = Config {
            server: ServerConfig {
                host: env_or("ROSTER_HOST", DEFAULT_SERVER_HOST.to_string()),
                port: env_or("ROSTER_PORT", DEFAULT_SERVER_PORT),
                shutdown_timeout_secs: env_or(
                    "ROSTER_SHUTDOWN_TIMEOUT",
                    DEFAULT_SHUTDOWN_TIMEOUT_SECS,
                ),
            },
            store,
            database: DatabaseConfig {
                url: env_or("DATABASE_URL", DEFAULT_DATABASE_URL.to_string()),
                max_connections: env_or(
                    "DATABASE_MAX_CONNECTIONS",
                    DEFAULT_DATABASE_MAX_CONNECTIONS,
                ),
                min_connections: env_or(
                    "DATABASE_MIN_CONNECTIONS",
                    DEFAULT_DATABASE_MIN_CONNECTIONS,
                ),
                connect_timeout_secs: env_or(
                    "DATABASE_CONNECT_TIMEOUT",
                    DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                ),
                idle_timeout_secs: env_or(
                    "DATABASE_IDLE_TIMEOUT",
                    DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
                ),
            },
            ingest: IngestConfig {
                batch_size: env_or("INGEST_BATCH_SIZE", DEFAULT_INGEST_BATCH_SIZE),
                max_workers: env_or("INGEST_MAX_WORKERS", DEFAULT_INGEST_MAX_WORKERS),
                shard_count: env_or("INGEST_SHARD_COUNT", DEFAULT_INGEST_SHARD_COUNT),
                conduit_capacity: env_or(
                    "INGEST_CONDUIT_CAPACITY",
                    DEFAULT_INGEST_CONDUIT_CAPACITY,
                ),
                session_retention_secs: env_or(
                    "INGEST_SESSION_RETENTION",
                    DEFAULT_INGEST_SESSION_RETENTION_SECS,
                ),
                spool_dir: std::env::var("INGEST_SPOOL_DIR").ok().map(PathBuf::from),
                max_upload_bytes: env_or(
                    "INGEST_MAX_UPLOAD_BYTES",
                    DEFAULT_INGEST_MAX_UPLOAD_BYTES,
                ),
            },
            cors: CorsConfig {
                allowed_origins: std::env::var("CORS_ALLOWED_ORIGINS")
                    .unwrap_or_else(|_| DEFAULT_CORS_ALLOWED_ORIGIN.to_string())
                    .split(',')
                    .map(|s| s.trim().to_string())
                    .filter(|s| !s.is_empty())
                    .collect(),
                allow_credentials: env_or("CORS_ALLOW_CREDENTIALS", false),
            },
        };

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.server.port == 0 {
            anyhow::bail!("Server port must be greater than 0");
        }

        if self.store == StoreBackend::Postgres {
            if self.database.url.is_empty() {
                anyhow::bail!("Database URL cannot be empty");
            }
            if self.database.max_connections == 0 {
                anyhow::bail!("Database max_connections must be greater than 0");
            }
            if self.database.min_connections > self.database.max_connections {
                anyhow::bail!(
                    "Database min_connections ({}) cannot be greater than max_connections ({})",
                    self.database.min_connections,
                    self.database.max_connections
                );
            }
        }

        let ingest = &self.ingest;
        if ingest.batch_size == 0 {
            anyhow::bail!("INGEST_BATCH_SIZE must be greater than 0");
        }
        if ingest.max_workers == 0 {
            anyhow::bail!("INGEST_MAX_WORKERS must be greater than 0");
        }
        if ingest.shard_count == 0 {
            anyhow::bail!("INGEST_SHARD_COUNT must be greater than 0");
        }
        if ingest.conduit_capacity == 0 {
            anyhow::bail!("INGEST_CONDUIT_CAPACITY must be greater than 0");
        }
        if ingest.max_upload_bytes == 0 {
            anyhow::bail!("INGEST_MAX_UPLOAD_BYTES must be greater than 0");
        }

        let wildcard = self.cors.allowed_origins.iter().any(|o| o == "*");
        if self.cors.allow_credentials && (wildcard || self.cors.allowed_origins.is_empty()) {
            anyhow::bail!("CORS credentials require an explicit list of allowed origins");
        }
        if self.cors.allowed_origins.is_empty() {
            tracing::warn!("No CORS origins configured - all origins will be allowed");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server: ServerConfig {
                host: DEFAULT_SERVER_HOST.to_string(),
                port: DEFAULT_SERVER_PORT,
                shutdown_timeout_secs: DEFAULT_SHUTDOWN_TIMEOUT_SECS,
            },
            store: StoreBackend::Postgres,
            database: DatabaseConfig {
                url: DEFAULT_DATABASE_URL.to_string(),
                max_connections: DEFAULT_DATABASE_MAX_CONNECTIONS,
                min_connections: DEFAULT_DATABASE_MIN_CONNECTIONS,
                connect_timeout_secs: DEFAULT_DATABASE_CONNECT_TIMEOUT_SECS,
                idle_timeout_secs: DEFAULT_DATABASE_IDLE_TIMEOUT_SECS,
            },
            ingest: IngestConfig::default(),
            cors: CorsConfig {
                allowed_origins: vec![DEFAULT_CORS_ALLOWED_ORIGIN.to_string()],
                allow_credentials: false,
            },
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serial_test::serial;

    #[test]
    fn test_default_config_is_valid() {
        assert!(Config::default().validate().is_ok());
    }

    #[test]
    fn test_zero_batch_size_rejected() {
        let mut config = Config::default();
        config.ingest.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_zero_workers_rejected() {
        let mut config = Config::default();
        config.ingest.max_workers = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_pool_bounds_ignored_for_memory_store() {
        let mut config = Config::default();
        config.store = StoreBackend::Memory;
        config.database.max_connections = 0;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_credentials_with_wildcard_rejected() {
        let mut config = Config::default();
        config.cors.allowed_origins = vec!["*".to_string()];
        config.cors.allow_credentials = true;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_store_backend_parse() {
        assert_eq!("memory".parse::<StoreBackend>().unwrap(), StoreBackend::Memory);
        assert_eq!("PostgreSQL".parse::<StoreBackend>().unwrap(), StoreBackend::Postgres);
        assert!("sqlite".parse::<StoreBackend>().is_err());
    }

    #[test]
    #[serial]
    fn test_load_reads_ingest_overrides() {
        std::env::set_var("ROSTER_STORE", "memory");
        std::env::set_var("INGEST_BATCH_SIZE", "50");
        std::env::set_var("INGEST_MAX_WORKERS", "3");

        let config = Config::load().unwrap();

        std::env::remove_var("ROSTER_STORE");
        std::env::remove_var("INGEST_BATCH_SIZE");
        std::env::remove_var("INGEST_MAX_WORKERS");

        assert_eq!(config.store, StoreBackend::Memory);
        assert_eq!(config.ingest.batch_size, 50);
        assert_eq!(config.ingest.max_workers, 3);
        assert_eq!(config.ingest.shard_count, DEFAULT_INGEST_SHARD_COUNT);
    }
}
