//! Tracing subscriber setup
//!
//! `RUST_LOG` wins when set. Otherwise the filter is built from the configured
//! level with the noisy dependency targets held back.

use tracing::Level;
use tracing_subscriber::{
    fmt::{self, format::FmtSpan},
    layer::SubscriberExt,
    util::SubscriberInitExt,
    EnvFilter,
};

use crate::config::Environment;

/// Targets capped below the application level
const QUIET_TARGETS: &[(&str, Level)] = &[
    ("sqlx", Level::WARN),
    ("tower_http", Level::INFO),
    ("hyper", Level::WARN),
    ("tungstenite", Level::WARN),
];

/// Log output settings
#[derive(Debug, Clone)]
pub struct TracingConfig {
    pub level: Level,
    /// One JSON object per line
    pub json: bool,
    /// Emit span open/close events
    pub span_events: bool,
    pub file_line: bool,
}

impl TracingConfig {
    /// Settings for a deployment environment
    ///
    /// Development gets debug output with span events; production gets JSON.
    #[must_use]
    pub fn for_environment(env: Environment) -> Self {
        match env {
            Environment::Development => Self {
                level: Level::DEBUG,
                json: false,
                span_events: true,
                file_line: true,
            },
            Environment::Staging => Self {
                level: Level::INFO,
                json: false,
                span_events: false,
                file_line: true,
            },
            Environment::Production => Self {
                level: Level::INFO,
                json: true,
                span_events: false,
                file_line: false,
            },
        }
    }

    /// Filter directives used when `RUST_LOG` is unset
    #[must_use]
    pub fn default_directives(&self) -> String {
        let mut directives = self.level.to_string().to_lowercase();
        for (target, cap) in QUIET_TARGETS {
            // A cap never raises verbosity above the configured level
            let level = if *cap > self.level { self.level } else { *cap };
            directives.push_str(&format!(",{target}={}", level.to_string().to_lowercase()));
        }
        directives
    }

    fn span_events(&self) -> FmtSpan {
        if self.span_events {
            FmtSpan::NEW | FmtSpan::CLOSE
        } else {
            FmtSpan::NONE
        }
    }
}

impl Default for TracingConfig {
    fn default() -> Self {
        Self::for_environment(Environment::Staging)
    }
}

/// Install the global subscriber
///
/// Fails without panicking if one is already installed.
pub fn try_init_tracing_with_config(config: TracingConfig) -> Result<(), TracingError> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(config.default_directives()));

    let fmt_layer = fmt::layer()
        .with_file(config.file_line)
        .with_line_number(config.file_line)
        .with_span_events(config.span_events());

    let registry = tracing_subscriber::registry().with(env_filter);

    let result = if config.json {
        registry.with(fmt_layer.json()).try_init()
    } else {
        registry.with(fmt_layer).try_init()
    };

    result.map_err(|_| TracingError::AlreadyInitialized)
}

#[derive(Debug, thiserror::Error)]
pub enum TracingError {
    #[error("Tracing subscriber already initialized")]
    AlreadyInitialized,
}
