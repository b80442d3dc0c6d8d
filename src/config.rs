//! Runtime configuration loaded from the environment
//!
//! The core reads everything it needs from process environment variables;
//! there is no config file. `DATABASE_URL` is the only hard requirement.

use std::collections::HashMap;

use thiserror::Error;

/// Process exit codes for the server binary.
pub mod exit_codes {
    /// Clean shutdown
    pub const OK: i32 = 0;
    /// Configuration error (missing/invalid environment)
    pub const CONFIG_ERROR: i32 = 1;
    /// Database unreachable at startup
    pub const DB_UNREACHABLE: i32 = 2;
    /// Interrupted (SIGINT)
    pub const INTERRUPTED: i32 = 130;
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required environment variable: {0}")]
    MissingVar(&'static str),

    #[error("Invalid value for {var}: {reason}")]
    InvalidVar { var: &'static str, reason: String },
}

/// HMAC key pair for webhook signing. Opaque to the core: parsed and carried,
/// never used to sign anything here (webhook gateways are external).
#[derive(Debug, Clone)]
pub struct HmacKeys {
    pub primary: String,
    pub secondary: Option<String>,
}

/// Output format for the file log sink
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Text,
    Json,
}

impl LogFormat {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "text" => Some(LogFormat::Text),
            "json" => Some(LogFormat::Json),
            _ => None,
        }
    }
}

/// Rotation policy for the log file
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogRotation {
    Never,
    Hourly,
    Daily,
}

impl LogRotation {
    fn parse(raw: &str) -> Option<Self> {
        match raw {
            "never" => Some(LogRotation::Never),
            "hourly" => Some(LogRotation::Hourly),
            "daily" => Some(LogRotation::Daily),
            _ => None,
        }
    }
}

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL connection string (required)
    pub database_url: String,
    /// JWT signing secret - opaque to the core, consumed by the auth layer
    pub jwt_secret: Option<String>,
    /// Webhook HMAC keys - opaque to the core
    pub hmac_keys: Option<HmacKeys>,
    /// HTTP listen port
    pub port: u16,
    /// tracing env-filter default (e.g. "info", "loyalty_core=debug")
    pub log_level: String,
    /// Log file directory
    pub log_dir: String,
    /// Log file name
    pub log_file: String,
    /// Log file rotation policy
    pub rotation: LogRotation,
    /// File sink format
    pub log_format: LogFormat,
}

impl AppConfig {
    /// Load configuration from the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        let database_url =
            std::env::var("DATABASE_URL").map_err(|_| ConfigError::MissingVar("DATABASE_URL"))?;

        let port = match std::env::var("PORT") {
            Ok(v) => v.parse::<u16>().map_err(|e| ConfigError::InvalidVar {
                var: "PORT",
                reason: e.to_string(),
            })?,
            Err(_) => 8080,
        };

        let hmac_keys = match std::env::var("HMAC_KEYS") {
            Ok(raw) => Some(parse_hmac_keys(&raw)?),
            Err(_) => None,
        };

        let rotation = match std::env::var("LOG_ROTATION") {
            Ok(raw) => LogRotation::parse(&raw).ok_or_else(|| ConfigError::InvalidVar {
                var: "LOG_ROTATION",
                reason: format!("expected never|hourly|daily, got {raw}"),
            })?,
            Err(_) => LogRotation::Daily,
        };

        let log_format = match std::env::var("LOG_FORMAT") {
            Ok(raw) => LogFormat::parse(&raw).ok_or_else(|| ConfigError::InvalidVar {
                var: "LOG_FORMAT",
                reason: format!("expected text|json, got {raw}"),
            })?,
            Err(_) => LogFormat::Text,
        };

        Ok(Self {
            database_url,
            jwt_secret: std::env::var("JWT_SECRET").ok(),
            hmac_keys,
            port,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| "info".to_string()),
            log_dir: std::env::var("LOG_DIR").unwrap_or_else(|_| "logs".to_string()),
            log_file: std::env::var("LOG_FILE").unwrap_or_else(|_| "loyalty_core.log".to_string()),
            rotation,
            log_format,
        })
    }
}

/// Parse the `HMAC_KEYS` JSON document: `{"primary": "...", "secondary": "..."}`.
fn parse_hmac_keys(raw: &str) -> Result<HmacKeys, ConfigError> {
    let map: HashMap<String, String> =
        serde_json::from_str(raw).map_err(|e| ConfigError::InvalidVar {
            var: "HMAC_KEYS",
            reason: e.to_string(),
        })?;

    let primary = map.get("primary").cloned().ok_or(ConfigError::InvalidVar {
        var: "HMAC_KEYS",
        reason: "missing \"primary\" key".to_string(),
    })?;

    Ok(HmacKeys {
        primary,
        secondary: map.get("secondary").cloned(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hmac_keys() {
        let keys = parse_hmac_keys(r#"{"primary": "k1", "secondary": "k2"}"#).unwrap();
        assert_eq!(keys.primary, "k1");
        assert_eq!(keys.secondary.as_deref(), Some("k2"));

        let keys = parse_hmac_keys(r#"{"primary": "k1"}"#).unwrap();
        assert!(keys.secondary.is_none());
    }

    #[test]
    fn test_parse_hmac_keys_rejects_missing_primary() {
        assert!(parse_hmac_keys(r#"{"secondary": "k2"}"#).is_err());
        assert!(parse_hmac_keys("not json").is_err());
    }

    #[test]
    fn test_parse_log_format() {
        assert_eq!(LogFormat::parse("text"), Some(LogFormat::Text));
        assert_eq!(LogFormat::parse("json"), Some(LogFormat::Json));
        assert_eq!(LogFormat::parse("yaml"), None);
    }

    #[test]
    fn test_parse_log_rotation() {
        assert_eq!(LogRotation::parse("never"), Some(LogRotation::Never));
        assert_eq!(LogRotation::parse("hourly"), Some(LogRotation::Hourly));
        assert_eq!(LogRotation::parse("daily"), Some(LogRotation::Daily));
        assert_eq!(LogRotation::parse("weekly"), None);
    }
}
