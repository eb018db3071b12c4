//! Environment-driven configuration. Reading `.env` files / cloud-platform
//! detection is a thin external collaborator (out of scope); this module
//! only reads already-materialized process environment variables.

use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },
    #[error("priority weights must be non-negative and sum to a positive total")]
    InvalidPriorityWeights,
}

#[derive(Debug, Clone)]
pub struct Config {
    pub server: ServerConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub websocket: WebsocketConfig,
    pub backup: BackupConfig,
    pub priority_weights: PriorityWeights,
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub path: String,
    /// Page cache budget, bytes. Maps to SQLite's `cache_size` pragma.
    pub memory_limit_bytes: u64,
    pub busy_timeout: Duration,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub api_key_secret: String,
    pub api_keys: Vec<String>,
}

#[derive(Debug, Clone)]
pub struct WebsocketConfig {
    pub port: u16,
    pub max_connections: usize,
    pub heartbeat_interval: Duration,
    pub heartbeat_timeout: Duration,
    pub write_queue_capacity: usize,
    pub max_inbound_per_minute: u32,
    pub max_subscriptions: usize,
}

#[derive(Debug, Clone)]
pub struct BackupConfig {
    pub enabled: bool,
    /// 6-field cron expression (seconds first), default "0 0 2 * * *" (02:00 daily).
    pub schedule: String,
    pub retention_days: u32,
    pub max_count: u32,
    pub dir: String,
}

/// Weighted factors feeding `priority_score`. Defaults from the glossary:
/// age 0.15, dependency 0.30, deadline 0.25, manual 0.20, context 0.10.
#[derive(Debug, Clone, Copy, Deserialize)]
pub struct PriorityWeights {
    pub age: f64,
    pub dependency: f64,
    pub deadline: f64,
    pub manual: f64,
    pub context: f64,
    /// Age, in days, beyond which the age factor saturates at 1.0.
    pub stale_threshold_days: f64,
}

impl Default for PriorityWeights {
    fn default() -> Self {
        Self {
            age: 0.15,
            dependency: 0.30,
            deadline: 0.25,
            manual: 0.20,
            context: 0.10,
            stale_threshold_days: 7.0,
        }
    }
}

impl PriorityWeights {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let weights = [self.age, self.dependency, self.deadline, self.manual, self.context];
        if weights.iter().any(|w| *w < 0.0) {
            return Err(ConfigError::InvalidPriorityWeights);
        }
        if weights.iter().sum::<f64>() <= 0.0 {
            return Err(ConfigError::InvalidPriorityWeights);
        }
        Ok(())
    }

    pub fn total(&self) -> f64 {
        self.age + self.dependency + self.deadline + self.manual + self.context
    }
}

fn env_or(key: &str, default: &str) -> String {
    std::env::var(key).unwrap_or_else(|_| default.to_string())
}

fn parse_env<T: std::str::FromStr>(key: &'static str, default: T) -> Result<T, ConfigError> {
    match std::env::var(key) {
        Ok(v) => v
            .parse()
            .map_err(|_| ConfigError::InvalidValue { key, value: v }),
        Err(_) => Ok(default),
    }
}

impl Config {
    pub fn from_env() -> Result<Self, ConfigError> {
        let priority_weights = match std::env::var("PRIORITY_FACTORS") {
            Ok(raw) => serde_json::from_str(&raw)
                .map_err(|_| ConfigError::InvalidValue { key: "PRIORITY_FACTORS", value: raw })?,
            Err(_) => PriorityWeights::default(),
        };
        priority_weights.validate()?;

        let api_keys = std::env::var("API_KEYS")
            .map(|v| v.split(',').map(|s| s.trim().to_string()).filter(|s| !s.is_empty()).collect())
            .unwrap_or_default();

        Ok(Self {
            server: ServerConfig {
                host: env_or("HOST", "0.0.0.0"),
                port: parse_env("PORT", 3000)?,
            },
            database: DatabaseConfig {
                path: env_or("DATABASE_PATH", "./data/kanban.db"),
                memory_limit_bytes: parse_env("DATABASE_MEMORY_LIMIT", 64 * 1024 * 1024)?,
                busy_timeout: Duration::from_secs(parse_env("DATABASE_TIMEOUT", 30)?),
            },
            auth: AuthConfig {
                api_key_secret: env_or("API_KEY_SECRET", "dev-secret-change-me"),
                api_keys,
            },
            websocket: WebsocketConfig {
                port: parse_env("WEBSOCKET_PORT", 3001)?,
                max_connections: parse_env("WEBSOCKET_MAX_CONNECTIONS", 1000)?,
                heartbeat_interval: Duration::from_secs(25),
                heartbeat_timeout: Duration::from_secs(60),
                write_queue_capacity: 256,
                max_inbound_per_minute: 100,
                max_subscriptions: 50,
            },
            backup: BackupConfig {
                enabled: parse_env("BACKUP_ENABLED", true)?,
                schedule: env_or("BACKUP_SCHEDULE", "0 0 2 * * *"),
                retention_days: parse_env("BACKUP_RETENTION_DAYS", 30)?,
                max_count: parse_env("BACKUP_MAX_COUNT", 100)?,
                dir: env_or("BACKUP_DIR", "./data/backups"),
            },
            priority_weights,
        })
    }
}
