//! Configuration management for the notification service
//!
//! Loads settings from environment variables (and a `.env` file when present),
//! with defaults tuned for a single-region deployment.

use std::env;
use std::time::Duration;
use thiserror::Error;

/// Configuration errors
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingEnvVar(String),

    #[error("Invalid environment value: {0}")]
    InvalidValue(String),

    #[error("Invalid port number: {0}")]
    InvalidPort(String),
}

/// Application environment
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    /// Parse environment from string
    pub fn parse(s: &str) -> Result<Self, ConfigError> {
        match s.to_lowercase().as_str() {
            "dev" | "development" => Ok(Environment::Development),
            "staging" => Ok(Environment::Staging),
            "prod" | "production" => Ok(Environment::Production),
            _ => Err(ConfigError::InvalidValue(format!(
                "Invalid environment: '{}'. Expected: dev, staging, or prod",
                s
            ))),
        }
    }

    pub fn is_production(&self) -> bool {
        matches!(self, Environment::Production)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Environment::Development => "development",
            Environment::Staging => "staging",
            Environment::Production => "production",
        }
    }
}

/// Tunables for the reminder engine and notification cache
#[derive(Debug, Clone)]
pub struct NotificationSettings {
    /// How long a fetched notification list is served from memory
    pub cache_ttl: Duration,

    /// Days ahead of an installment during which a reminder is raised
    pub due_soon_window_days: i64,

    /// Days back searched for reminders that already exist
    pub reminder_lookback_days: i64,

    /// Cron expression (with seconds field) for the periodic reconciliation run
    pub reconcile_cron: String,

    /// Number of loans reconciled concurrently in an all-owners run
    pub reconcile_concurrency: usize,

    /// Upper bound on the store connectivity probe
    pub connectivity_timeout: Duration,

    /// Feed size when the caller gives no limit
    pub default_limit: usize,
}

impl Default for NotificationSettings {
    fn default() -> Self {
        Self {
            cache_ttl: Duration::from_secs(300),
            due_soon_window_days: 3,
            reminder_lookback_days: 3,
            reconcile_cron: "0 0 */6 * * *".to_string(),
            reconcile_concurrency: 4,
            connectivity_timeout: Duration::from_secs(10),
            default_limit: 50,
        }
    }
}

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Current environment
    pub environment: Environment,

    /// Server port
    pub port: u16,

    /// Maximum database connections
    pub db_max_connections: u32,

    /// CORS allowed origins
    pub cors_allowed_origins: Option<String>,

    /// Log level (RUST_LOG)
    pub log_level: String,

    pub notifications: NotificationSettings,
}

fn env_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        dotenvy::dotenv().ok();

        let environment = env::var("ENVIRONMENT")
            .map(|s| Environment::parse(&s))
            .unwrap_or(Ok(Environment::Development))?;

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| ConfigError::MissingEnvVar("DATABASE_URL".to_string()))?;

        let port = env::var("PORT")
            .unwrap_or_else(|_| "3001".to_string())
            .parse::<u16>()
            .map_err(|_| ConfigError::InvalidPort("PORT must be a valid number".to_string()))?;

        let defaults = NotificationSettings::default();
        let notifications = NotificationSettings {
            cache_ttl: Duration::from_secs(env_or(
                "NOTIFICATION_CACHE_TTL_SECONDS",
                defaults.cache_ttl.as_secs(),
            )),
            due_soon_window_days: env_or("DUE_SOON_WINDOW_DAYS", defaults.due_soon_window_days),
            reminder_lookback_days: env_or(
                "REMINDER_LOOKBACK_DAYS",
                defaults.reminder_lookback_days,
            ),
            reconcile_cron: env::var("RECONCILE_CRON").unwrap_or(defaults.reconcile_cron),
            reconcile_concurrency: env_or("RECONCILE_CONCURRENCY", defaults.reconcile_concurrency)
                .max(1),
            connectivity_timeout: Duration::from_secs(env_or(
                "CONNECTIVITY_TIMEOUT_SECONDS",
                defaults.connectivity_timeout.as_secs(),
            )),
            default_limit: env_or("DEFAULT_NOTIFICATION_LIMIT", defaults.default_limit).max(1),
        };

        Ok(Config {
            database_url,
            environment,
            port,
            db_max_connections: env_or("DB_MAX_CONNECTIONS", 5),
            cors_allowed_origins: env::var("CORS_ALLOWED_ORIGINS").ok(),
            log_level: env::var("RUST_LOG").unwrap_or_else(|_| "info".to_string()),
            notifications,
        })
    }

    /// Database URL with the password replaced, for logging
    pub fn database_url_masked(&self) -> String {
        if let Some(at_pos) = self.database_url.find('@') {
            if let Some(colon_pos) = self.database_url[..at_pos].rfind(':') {
                let prefix = &self.database_url[..colon_pos + 1];
                let suffix = &self.database_url[at_pos..];
                return format!("{}****{}", prefix, suffix);
            }
        }
        self.database_url.clone()
    }
}
