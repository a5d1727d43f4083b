//! Application configuration structs
//!
//! Loads configuration from environment variables (and a `.env` file when present).

use serde::Deserialize;
use std::env;
use std::time::Duration;

/// Main application configuration
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub app: AppSettings,
    pub gateway: ServerConfig,
    /// `None` runs the gateway with the in-memory message store
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub realtime: RealtimeConfig,
}

/// General application settings
#[derive(Debug, Clone, Deserialize)]
pub struct AppSettings {
    #[serde(default = "default_app_name")]
    pub name: String,
    #[serde(default)]
    pub env: Environment,
}

/// Environment type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Environment {
    #[default]
    Development,
    Staging,
    Production,
}

impl Environment {
    #[must_use]
    pub fn is_production(&self) -> bool {
        matches!(self, Self::Production)
    }

    fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "production" => Some(Self::Production),
            "staging" => Some(Self::Staging),
            "development" => Some(Self::Development),
            _ => None,
        }
    }
}

/// Server configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    #[serde(default = "default_host")]
    pub host: String,
    pub port: u16,
}

impl ServerConfig {
    #[must_use]
    pub fn address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// Database configuration
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
    #[serde(default = "default_min_connections")]
    pub min_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    #[serde(default = "default_access_token_expiry")]
    pub access_token_expiry: i64,
}

/// Whether a sender's own connection receives the lines it broadcasts
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum EchoPolicy {
    /// Every member present at broadcast time receives the line, sender included
    #[default]
    Include,
    /// The originating connection is skipped
    Exclude,
}

impl EchoPolicy {
    fn parse(raw: &str) -> Option<Self> {
        match raw.to_lowercase().as_str() {
            "include" | "on" | "true" => Some(Self::Include),
            "exclude" | "off" | "false" => Some(Self::Exclude),
            _ => None,
        }
    }
}

/// Real-time delivery limits and policies
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RealtimeConfig {
    /// Largest inbound frame accepted from a peer
    pub max_frame_bytes: usize,
    /// Deadline for a single socket write
    pub write_wait: Duration,
    /// Read deadline; only a pong from the peer extends it
    pub pong_wait: Duration,
    /// Ping period, strictly shorter than `pong_wait`
    pub ping_period: Duration,
    /// Capacity of each connection's outbound queue
    pub queue_capacity: usize,
    pub echo_policy: EchoPolicy,
    /// Send `new_message` notifications through the global registry
    pub notify_global: bool,
    /// Tell the sender when its line could not be persisted
    pub surface_persistence_errors: bool,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        let pong_wait = Duration::from_secs(60);
        Self {
            max_frame_bytes: 512,
            write_wait: Duration::from_secs(10),
            pong_wait,
            ping_period: pong_wait * 9 / 10,
            queue_capacity: 256,
            echo_policy: EchoPolicy::Include,
            notify_global: true,
            surface_persistence_errors: true,
        }
    }
}

impl RealtimeConfig {
    /// Check the liveness and sizing invariants
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.ping_period >= self.pong_wait {
            return Err(ConfigError::InvalidValue(
                "CHAT_PING_PERIOD_SECS",
                format!(
                    "ping period {:?} must be shorter than pong wait {:?}",
                    self.ping_period, self.pong_wait
                ),
            ));
        }
        if self.ping_period.is_zero() {
            return Err(ConfigError::InvalidValue(
                "CHAT_PING_PERIOD_SECS",
                "must be greater than zero".to_string(),
            ));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::InvalidValue(
                "CHAT_QUEUE_CAPACITY",
                "must be greater than zero".to_string(),
            ));
        }
        if self.max_frame_bytes == 0 {
            return Err(ConfigError::InvalidValue(
                "CHAT_MAX_FRAME_BYTES",
                "must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }
}

// Default value functions
fn default_app_name() -> String {
    "chat-gateway".to_string()
}

fn default_host() -> String {
    "127.0.0.1".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_max_connections() -> u32 {
    20
}

fn default_min_connections() -> u32 {
    5
}

fn default_access_token_expiry() -> i64 {
    900 // 15 minutes
}

fn parse_var<T: std::str::FromStr>(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
) -> Result<Option<T>, ConfigError> {
    match lookup(key) {
        None => Ok(None),
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue(key, raw)),
    }
}

fn parse_bool(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &'static str,
    default: bool,
) -> Result<bool, ConfigError> {
    match lookup(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue(key, raw)),
        },
    }
}

impl AppConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    /// Returns an error if required environment variables are missing or invalid
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors if not found)
        let _ = dotenvy::dotenv();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let defaults = RealtimeConfig::default();

        let pong_wait = parse_var::<u64>(&lookup, "CHAT_PONG_WAIT_SECS")?
            .map_or(defaults.pong_wait, Duration::from_secs);
        let ping_period = parse_var::<u64>(&lookup, "CHAT_PING_PERIOD_SECS")?
            .map_or(pong_wait * 9 / 10, Duration::from_secs);

        let echo_policy = match lookup("CHAT_ECHO_POLICY") {
            None => defaults.echo_policy,
            Some(raw) => EchoPolicy::parse(&raw)
                .ok_or(ConfigError::InvalidValue("CHAT_ECHO_POLICY", raw))?,
        };

        let realtime = RealtimeConfig {
            max_frame_bytes: parse_var(&lookup, "CHAT_MAX_FRAME_BYTES")?
                .unwrap_or(defaults.max_frame_bytes),
            write_wait: parse_var::<u64>(&lookup, "CHAT_WRITE_WAIT_SECS")?
                .map_or(defaults.write_wait, Duration::from_secs),
            pong_wait,
            ping_period,
            queue_capacity: parse_var(&lookup, "CHAT_QUEUE_CAPACITY")?
                .unwrap_or(defaults.queue_capacity),
            echo_policy,
            notify_global: parse_bool(&lookup, "CHAT_NOTIFY_GLOBAL", defaults.notify_global)?,
            surface_persistence_errors: parse_bool(
                &lookup,
                "CHAT_SURFACE_PERSISTENCE_ERRORS",
                defaults.surface_persistence_errors,
            )?,
        };
        realtime.validate()?;

        let database = match lookup("DATABASE_URL") {
            Some(url) if !url.trim().is_empty() => Some(DatabaseConfig {
                url,
                max_connections: parse_var(&lookup, "DATABASE_MAX_CONNECTIONS")?
                    .unwrap_or_else(default_max_connections),
                min_connections: parse_var(&lookup, "DATABASE_MIN_CONNECTIONS")?
                    .unwrap_or_else(default_min_connections),
            }),
            _ => None,
        };

        Ok(Self {
            app: AppSettings {
                name: lookup("APP_NAME").unwrap_or_else(default_app_name),
                env: lookup("APP_ENV")
                    .as_deref()
                    .and_then(Environment::parse)
                    .unwrap_or_default(),
            },
            gateway: ServerConfig {
                host: lookup("GATEWAY_HOST").unwrap_or_else(default_host),
                port: parse_var(&lookup, "GATEWAY_PORT")?.unwrap_or_else(default_port),
            },
            database,
            jwt: JwtConfig {
                secret: lookup("JWT_SECRET").ok_or(ConfigError::MissingVar("JWT_SECRET"))?,
                access_token_expiry: parse_var(&lookup, "JWT_ACCESS_TOKEN_EXPIRY")?
                    .unwrap_or_else(default_access_token_expiry),
            },
            realtime,
        })
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {0}: {1}")]
    InvalidValue(&'static str, String),
}
