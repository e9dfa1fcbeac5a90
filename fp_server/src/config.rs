//! Server configuration management.
//!
//! Consolidates all environment variable reads and provides validated configuration.

use chrono::Duration;
use funpot::{AuthConfig, db::DatabaseConfig};
use std::collections::BTreeMap;
use std::net::SocketAddr;

/// Environment name that relaxes secret strength checks
pub const DEVELOPMENT_ENV: &str = "development";

/// Minimum JWT secret length outside development
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete server configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// Deployment environment name
    pub environment: String,
    /// Server bind address
    pub bind: SocketAddr,
    /// Time allowed for in-flight requests after a shutdown signal
    pub shutdown_timeout_secs: u64,
    /// Default log filter when `RUST_LOG` is unset
    pub log_level: String,
    /// Metrics exporter configuration
    pub telemetry: TelemetryConfig,
    /// Authentication configuration
    pub auth: AuthSettings,
    /// Flags exposed to authenticated clients
    pub features: BTreeMap<String, bool>,
    /// Database configuration; `None` selects the in-memory store
    pub database: Option<DatabaseConfig>,
}

#[derive(Debug, Clone)]
pub struct TelemetryConfig {
    pub metrics_enabled: bool,
    pub metrics_address: SocketAddr,
}

/// Authentication configuration
#[derive(Clone)]
pub struct AuthSettings {
    /// Messaging platform bot token (required)
    pub bot_token: String,
    /// JWT signing secret (required)
    pub jwt_secret: String,
    pub jwt_ttl_secs: i64,
    /// Zero disables the launch payload freshness check
    pub init_data_max_age_secs: i64,
}

impl std::fmt::Debug for AuthSettings {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthSettings")
            .field("bot_token", &"<redacted>")
            .field("jwt_secret", &"<redacted>")
            .field("jwt_ttl_secs", &self.jwt_ttl_secs)
            .field("init_data_max_age_secs", &self.init_data_max_age_secs)
            .finish()
    }
}

impl AuthSettings {
    /// Convert into the library's auth configuration
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::Invalid` if a lifetime does not fit a `Duration`
    pub fn to_auth_config(&self) -> Result<AuthConfig, ConfigError> {
        let mut config = AuthConfig::new(self.bot_token.clone(), self.jwt_secret.clone());
        config.jwt_ttl = seconds_var("FUNPOT_AUTH_JWT_TTL_SECS", self.jwt_ttl_secs)?;
        config.init_data_max_age = seconds_var(
            "FUNPOT_AUTH_INIT_DATA_MAX_AGE_SECS",
            self.init_data_max_age_secs,
        )?;
        Ok(config)
    }
}

fn seconds_var(var: &str, secs: i64) -> Result<Duration, ConfigError> {
    Duration::try_seconds(secs).ok_or_else(|| ConfigError::Invalid {
        var: var.to_string(),
        reason: format!("{secs} seconds is out of range"),
    })
}

/// Values given on the command line, which win over the environment
#[derive(Debug, Clone, Default)]
pub struct CliOverrides {
    pub bind: Option<SocketAddr>,
    pub database_url: Option<String>,
    pub in_memory: bool,
}

impl ServerConfig {
    /// Load configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns error if required variables are missing or invalid
    pub fn from_env(overrides: CliOverrides) -> Result<Self, ConfigError> {
        Self::from_source(|key| std::env::var(key).ok(), overrides)
    }

    /// Load configuration from an arbitrary variable source
    pub fn from_source<F>(lookup: F, overrides: CliOverrides) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let environment = var("FUNPOT_ENV").unwrap_or_else(|| DEVELOPMENT_ENV.to_string());

        let bind = match overrides.bind {
            Some(bind) => bind,
            None => parse_var(&var, "FUNPOT_SERVER_ADDRESS", default_addr(8080))?,
        };

        let telemetry = TelemetryConfig {
            metrics_enabled: parse_bool_var(&var, "FUNPOT_TELEMETRY_METRICS_ENABLED", true)?,
            metrics_address: parse_var(&var, "FUNPOT_METRICS_ADDRESS", default_addr(9090))?,
        };

        // Authentication (REQUIRED)
        let bot_token =
            var("FUNPOT_AUTH_TELEGRAM_BOT_TOKEN").ok_or_else(|| ConfigError::MissingRequired {
                var: "FUNPOT_AUTH_TELEGRAM_BOT_TOKEN".to_string(),
                hint: "Use the token issued by @BotFather".to_string(),
            })?;

        let jwt_secret = var("FUNPOT_AUTH_JWT_SECRET").ok_or_else(|| ConfigError::MissingRequired {
            var: "FUNPOT_AUTH_JWT_SECRET".to_string(),
            hint: "Generate with: openssl rand -hex 32".to_string(),
        })?;

        let auth = AuthSettings {
            bot_token,
            jwt_secret,
            jwt_ttl_secs: parse_var(&var, "FUNPOT_AUTH_JWT_TTL_SECS", 15 * 60)?,
            init_data_max_age_secs: parse_var(
                &var,
                "FUNPOT_AUTH_INIT_DATA_MAX_AGE_SECS",
                24 * 60 * 60,
            )?,
        };

        let features = match var("FUNPOT_FEATURE_FLAGS") {
            Some(raw) => parse_feature_flags(&raw)?,
            None => BTreeMap::new(),
        };

        let database_url = if overrides.in_memory {
            None
        } else {
            overrides.database_url.or_else(|| var("DATABASE_URL"))
        };

        let database = match database_url {
            Some(database_url) => Some(DatabaseConfig {
                database_url,
                max_connections: parse_var(&var, "DB_MAX_CONNECTIONS", 20)?,
                min_connections: parse_var(&var, "DB_MIN_CONNECTIONS", 2)?,
                connection_timeout_secs: parse_var(&var, "DB_CONNECTION_TIMEOUT_SECS", 5)?,
                idle_timeout_secs: parse_var(&var, "DB_IDLE_TIMEOUT_SECS", 300)?,
                max_lifetime_secs: parse_var(&var, "DB_MAX_LIFETIME_SECS", 1800)?,
            }),
            None => None,
        };

        let config = ServerConfig {
            environment,
            bind,
            shutdown_timeout_secs: parse_var(&var, "FUNPOT_SERVER_SHUTDOWN_TIMEOUT_SECS", 15)?,
            log_level: var("FUNPOT_LOG_LEVEL").unwrap_or_else(|| "info".to_string()),
            telemetry,
            auth,
            features,
            database,
        };

        config.validate()?;
        Ok(config)
    }

    pub fn is_development(&self) -> bool {
        self.environment.eq_ignore_ascii_case(DEVELOPMENT_ENV)
    }

    /// Validate configuration after loading
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.is_development() && self.auth.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::Invalid {
                var: "FUNPOT_AUTH_JWT_SECRET".to_string(),
                reason: format!(
                    "Must be at least {MIN_JWT_SECRET_LEN} characters outside development"
                ),
            });
        }

        if self.auth.jwt_ttl_secs <= 0 {
            return Err(ConfigError::Invalid {
                var: "FUNPOT_AUTH_JWT_TTL_SECS".to_string(),
                reason: "Must be greater than 0".to_string(),
            });
        }

        if self.auth.init_data_max_age_secs < 0 {
            return Err(ConfigError::Invalid {
                var: "FUNPOT_AUTH_INIT_DATA_MAX_AGE_SECS".to_string(),
                reason: "Must not be negative (0 disables the check)".to_string(),
            });
        }

        self.auth.to_auth_config()?;

        if let Some(database) = &self.database {
            if database.min_connections > database.max_connections {
                return Err(ConfigError::Invalid {
                    var: "DB_MIN_CONNECTIONS".to_string(),
                    reason: format!(
                        "Cannot exceed max connections ({})",
                        database.max_connections
                    ),
                });
            }
        }

        Ok(())
    }
}

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {var}\nHint: {hint}")]
    MissingRequired { var: String, hint: String },

    #[error("Invalid configuration for {var}: {reason}")]
    Invalid { var: String, reason: String },
}

fn default_addr(port: u16) -> SocketAddr {
    SocketAddr::from(([127, 0, 0, 1], port))
}

/// Helper to parse a variable, falling back to `default` when unset
fn parse_var<T, F>(var: &F, key: &str, default: T) -> Result<T, ConfigError>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => raw.trim().parse().map_err(|e: T::Err| ConfigError::Invalid {
            var: key.to_string(),
            reason: e.to_string(),
        }),
        None => Ok(default),
    }
}

fn parse_bool_var<F>(var: &F, key: &str, default: bool) -> Result<bool, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match var(key) {
        Some(raw) => parse_bool(&raw).ok_or_else(|| ConfigError::Invalid {
            var: key.to_string(),
            reason: format!("'{raw}' is not a boolean"),
        }),
        None => Ok(default),
    }
}

/// Accepts the usual spellings: `1`/`0`, `t`/`f`, `true`/`false` in any case
fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "t" | "true" => Some(true),
        "0" | "f" | "false" => Some(false),
        _ => None,
    }
}

/// Parse `name=bool` pairs separated by commas
fn parse_feature_flags(raw: &str) -> Result<BTreeMap<String, bool>, ConfigError> {
    let invalid = |reason: String| ConfigError::Invalid {
        var: "FUNPOT_FEATURE_FLAGS".to_string(),
        reason,
    };

    let mut flags = BTreeMap::new();
    for entry in raw.split(',').map(str::trim).filter(|e| !e.is_empty()) {
        let (key, value) = entry
            .split_once('=')
            .ok_or_else(|| invalid(format!("invalid feature flag pair: {entry}")))?;

        let key = key.trim();
        if key.is_empty() {
            return Err(invalid(format!("feature flag key missing in pair: {entry}")));
        }

        let enabled = parse_bool(value)
            .ok_or_else(|| invalid(format!("invalid feature flag value for {key}")))?;
        flags.insert(key.to_string(), enabled);
    }
    Ok(flags)
}
