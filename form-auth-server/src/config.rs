use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;

use thiserror::Error;

/// Environment variable key for the listen address
pub const ENV_BIND: &str = "ETH_AUTH_BIND";

/// Environment variable key for the user database path
pub const ENV_DB_PATH: &str = "ETH_AUTH_DB_PATH";

/// Environment variable key for the token signing secret
pub const ENV_TOKEN_SECRET: &str = "ETH_AUTH_TOKEN_SECRET";

/// Environment variable key for the token lifetime in seconds
pub const ENV_TOKEN_TTL: &str = "ETH_AUTH_TOKEN_TTL";

/// Environment variable key for the log level
pub const ENV_LOG_LEVEL: &str = "ETH_AUTH_LOG_LEVEL";

pub const DEFAULT_BIND: &str = "0.0.0.0:3010";
pub const DEFAULT_DB_PATH: &str = "/var/lib/formation/db/eth-auth.db";

/// Default token lifetime: 14 days
pub const DEFAULT_TOKEN_TTL: u64 = 1_209_600;

pub const DEFAULT_LOG_LEVEL: log::LevelFilter = log::LevelFilter::Info;

/// Shortest HS256 secret we accept
pub const MIN_SECRET_LEN: usize = 32;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{0} environment variable not set")]
    Missing(&'static str),

    #[error("invalid value for {key}: {reason}")]
    Invalid { key: &'static str, reason: String },
}

/// Service configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Address the HTTP server listens on
    pub bind: SocketAddr,

    /// Path of the redb user database
    pub db_path: PathBuf,

    /// Secret used to sign session tokens
    pub token_secret: Option<String>,

    /// Session token lifetime in seconds
    pub token_ttl: u64,

    /// Log level for the process logger
    pub log_level: log::LevelFilter,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: SocketAddr::from(([0, 0, 0, 0], 3010)),
            db_path: PathBuf::from(DEFAULT_DB_PATH),
            token_secret: None,
            token_ttl: DEFAULT_TOKEN_TTL,
            log_level: DEFAULT_LOG_LEVEL,
        }
    }
}

impl ServerConfig {
    /// Load configuration from the environment.
    ///
    /// Unset keys fall back to defaults; malformed values are errors rather
    /// than silently ignored.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();

        let bind = match env::var(ENV_BIND) {
            Ok(raw) => raw.parse::<SocketAddr>().map_err(|e| ConfigError::Invalid {
                key: ENV_BIND,
                reason: e.to_string(),
            })?,
            Err(_) => defaults.bind,
        };

        let db_path = env::var(ENV_DB_PATH)
            .map(PathBuf::from)
            .unwrap_or(defaults.db_path);

        let token_secret = env::var(ENV_TOKEN_SECRET).ok().filter(|s| !s.is_empty());

        let token_ttl = match env::var(ENV_TOKEN_TTL) {
            Ok(raw) => raw.parse::<u64>().map_err(|e| ConfigError::Invalid {
                key: ENV_TOKEN_TTL,
                reason: e.to_string(),
            })?,
            Err(_) => defaults.token_ttl,
        };

        let log_level = match env::var(ENV_LOG_LEVEL) {
            Ok(raw) => parse_log_level(&raw)?,
            Err(_) => defaults.log_level,
        };

        Ok(Self {
            bind,
            db_path,
            token_secret,
            token_ttl,
            log_level,
        })
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        let secret = self
            .token_secret
            .as_deref()
            .ok_or(ConfigError::Missing(ENV_TOKEN_SECRET))?;

        if secret.len() < MIN_SECRET_LEN {
            return Err(ConfigError::Invalid {
                key: ENV_TOKEN_SECRET,
                reason: format!("must be at least {} bytes", MIN_SECRET_LEN),
            });
        }

        if self.token_ttl == 0 {
            return Err(ConfigError::Invalid {
                key: ENV_TOKEN_TTL,
                reason: "must be greater than zero".to_string(),
            });
        }

        Ok(())
    }
}

/// Parse a log level name such as `debug` or `WARN`
pub fn parse_log_level(raw: &str) -> Result<log::LevelFilter, ConfigError> {
    raw.trim().parse::<log::LevelFilter>().map_err(|_| ConfigError::Invalid {
        key: ENV_LOG_LEVEL,
        reason: format!("unknown level {}", raw),
    })
}
