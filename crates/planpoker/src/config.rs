//! Server configuration loaded from environment variables.

use std::str::FromStr;
use std::time::Duration;

use planpoker_room::RoomConfig;

use crate::PlanpokerError;

/// Output format for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" => Ok(Self::Text),
            "json" => Ok(Self::Json),
            other => Err(format!("expected `text` or `json`, got `{other}`")),
        }
    }
}

/// Everything the `planpoker` binary needs to start.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// WebSocket listener address.
    pub bind_addr: String,
    /// HTTP liveness listener address.
    pub health_addr: String,
    /// Redis-compatible store URL. `None` selects the in-memory store.
    pub redis_url: Option<String>,
    /// Sliding room expiry.
    pub room_ttl: Duration,
    /// Connect and per-command store timeout.
    pub store_timeout: Duration,
    /// Inbound silence after which a connection is closed.
    pub idle_timeout: Duration,
    /// Deployment name reported by `/health`.
    pub environment: String,
    /// Default tracing filter. `RUST_LOG` takes precedence.
    pub log_level: String,
    pub log_format: LogFormat,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: "0.0.0.0:8000".to_owned(),
            health_addr: "0.0.0.0:8001".to_owned(),
            redis_url: None,
            room_ttl: Duration::from_secs(86_400),
            store_timeout: Duration::from_millis(5_000),
            idle_timeout: Duration::from_secs(60),
            environment: "development".to_owned(),
            log_level: "info".to_owned(),
            log_format: LogFormat::Text,
        }
    }
}

impl ServerConfig {
    /// Loads configuration from the process environment.
    ///
    /// # Errors
    ///
    /// Returns [`PlanpokerError::Config`] if a variable is set to a value
    /// that does not parse.
    pub fn from_env() -> Result<Self, PlanpokerError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Loads configuration through `lookup`, which maps a variable name to
    /// its value. Unset variables fall back to [`ServerConfig::default`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, PlanpokerError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let room_ttl_secs: u64 = parse_var(&lookup, "ROOM_TTL", defaults.room_ttl.as_secs())?;
        let store_timeout_ms: u64 = parse_var(
            &lookup,
            "STORE_TIMEOUT_MS",
            defaults.store_timeout.as_millis() as u64,
        )?;
        let idle_timeout_secs: u64 = parse_var(
            &lookup,
            "IDLE_TIMEOUT_SECS",
            defaults.idle_timeout.as_secs(),
        )?;
        for (name, value) in [
            ("ROOM_TTL", room_ttl_secs),
            ("STORE_TIMEOUT_MS", store_timeout_ms),
            ("IDLE_TIMEOUT_SECS", idle_timeout_secs),
        ] {
            if value == 0 {
                return Err(PlanpokerError::Config(format!(
                    "invalid {name}: must be positive"
                )));
            }
        }

        Ok(Self {
            bind_addr: lookup("BIND_ADDR").unwrap_or(defaults.bind_addr),
            health_addr: lookup("HEALTH_ADDR").unwrap_or(defaults.health_addr),
            redis_url: lookup("REDIS_URL").filter(|url| !url.trim().is_empty()),
            room_ttl: Duration::from_secs(room_ttl_secs),
            store_timeout: Duration::from_millis(store_timeout_ms),
            idle_timeout: Duration::from_secs(idle_timeout_secs),
            environment: lookup("ENVIRONMENT").unwrap_or(defaults.environment),
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format: parse_var(&lookup, "LOG_FORMAT", defaults.log_format)?,
        })
    }

    /// Room engine settings derived from this configuration.
    pub fn room_config(&self) -> RoomConfig {
        RoomConfig {
            room_ttl: self.room_ttl,
            ..RoomConfig::default()
        }
    }
}

fn parse_var<F, T>(lookup: &F, name: &str, default: T) -> Result<T, PlanpokerError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| PlanpokerError::Config(format!("invalid {name}: {e}"))),
        None => Ok(default),
    }
}
