//! Configuration loading and representation.
//!
//! Non-secret settings come from a JSON file (`config/config.json` unless
//! `MOTICO_CONFIG` points elsewhere). Secrets only ever come from the
//! environment, optionally seeded from a `.env` file:
//!
//! - `JWT_SECRET_KEY` (required)
//! - `DB_PASSWORD` (required when persistent stores are enabled)
//!
//! Connection settings can be overridden with `DB_HOST`, `DB_PORT`, `DB_USER`,
//! `DB_NAME` and `DB_SSLMODE`. `USE_PERSISTENT_STORES=false` selects the
//! in-memory database.

use std::path::Path;
use std::time::Duration;

use secrecy::SecretString;
use serde::Deserialize;
use thiserror::Error;

use motico_inventory::NameRules;
use motico_observability::LoggingConfig;

pub const DEFAULT_CONFIG_PATH: &str = "config/config.json";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config file {path}: {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },
    #[error("failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("Missing environment variable: {0}")]
    MissingEnvVar(String),
    #[error("Invalid environment variable {0}: {1}")]
    InvalidEnvVar(String, String),
    #[error("invalid configuration: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub database: DatabaseConfig,
    #[serde(default)]
    pub pagination: PaginationConfig,
    #[serde(default)]
    pub validation: ValidationConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
    #[serde(default)]
    pub jwt: JwtConfig,
    /// Postgres when true, in-memory otherwise.
    #[serde(default = "default_true")]
    pub use_persistent_stores: bool,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Deadline for receiving a request body, in seconds.
    pub read_timeout_secs: u64,
    /// Deadline for producing a response, in seconds.
    pub write_timeout_secs: u64,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            read_timeout_secs: 15,
            write_timeout_secs: 15,
        }
    }
}

impl ServerConfig {
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    pub fn read_timeout(&self) -> Duration {
        Duration::from_secs(self.read_timeout_secs)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub host: String,
    pub port: u16,
    pub user: String,
    pub name: String,
    pub ssl_mode: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
    #[serde(skip)]
    pub password: Option<SecretString>,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: "localhost".to_string(),
            port: 5432,
            user: "postgres".to_string(),
            name: "motico".to_string(),
            ssl_mode: "prefer".to_string(),
            max_connections: 10,
            min_connections: 2,
            acquire_timeout_secs: 10,
            password: None,
        }
    }
}

/// Page size limits for list endpoints.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct PaginationConfig {
    pub default_limit: u32,
    pub max_limit: u32,
}

impl Default for PaginationConfig {
    fn default() -> Self {
        Self {
            default_limit: 20,
            max_limit: 100,
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct ValidationConfig {
    pub max_name_length: usize,
    pub max_description_length: usize,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        let rules = NameRules::default();
        Self {
            max_name_length: rules.max_name_length,
            max_description_length: rules.max_description_length,
        }
    }
}

impl From<ValidationConfig> for NameRules {
    fn from(value: ValidationConfig) -> Self {
        NameRules {
            max_name_length: value.max_name_length,
            max_description_length: value.max_description_length,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct JwtConfig {
    /// Lifetime of issued tokens, in seconds.
    pub expiration_secs: i64,
    #[serde(skip)]
    pub secret: Option<SecretString>,
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            expiration_secs: 24 * 60 * 60,
            secret: None,
        }
    }
}

fn default_true() -> bool {
    true
}

impl AppConfig {
    /// Load configuration from the default locations and the process environment.
    pub fn load() -> Result<Self, ConfigError> {
        // Missing .env is fine; real deployments set variables directly.
        let _ = dotenvy::dotenv();

        let path =
            std::env::var("MOTICO_CONFIG").unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());
        Self::load_from(Path::new(&path), |key| std::env::var(key).ok())
    }

    /// Load from an explicit file, resolving environment lookups through `env`.
    pub fn load_from(
        path: &Path,
        env: impl Fn(&str) -> Option<String>,
    ) -> Result<Self, ConfigError> {
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.display().to_string(),
            source,
        })?;
        let mut config = Self::from_json_str(&raw)?;
        config.apply_env(env)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        Ok(serde_json::from_str(raw)?)
    }

    /// Apply environment overrides and pull secrets.
    pub fn apply_env(&mut self, env: impl Fn(&str) -> Option<String>) -> Result<(), ConfigError> {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        if let Some(v) = non_empty("DB_HOST") {
            self.database.host = v;
        }
        if let Some(v) = non_empty("DB_PORT") {
            self.database.port = v
                .parse()
                .map_err(|e| ConfigError::InvalidEnvVar("DB_PORT".to_string(), format!("{e}")))?;
        }
        if let Some(v) = non_empty("DB_USER") {
            self.database.user = v;
        }
        if let Some(v) = non_empty("DB_NAME") {
            self.database.name = v;
        }
        if let Some(v) = non_empty("DB_SSLMODE") {
            self.database.ssl_mode = v;
        }
        if let Some(v) = non_empty("USE_PERSISTENT_STORES") {
            self.use_persistent_stores = v.parse().map_err(|_| {
                ConfigError::InvalidEnvVar(
                    "USE_PERSISTENT_STORES".to_string(),
                    format!("expected true or false, got '{v}'"),
                )
            })?;
        }

        // Checked when the pool is built, so token minting works without it.
        self.database.password = non_empty("DB_PASSWORD").map(SecretString::from);

        self.jwt.secret = Some(
            non_empty("JWT_SECRET_KEY")
                .map(SecretString::from)
                .ok_or_else(|| ConfigError::MissingEnvVar("JWT_SECRET_KEY".to_string()))?,
        );

        Ok(())
    }

    fn validate(&self) -> Result<(), ConfigError> {
        let p = &self.pagination;
        if p.default_limit == 0 || p.max_limit == 0 {
            return Err(ConfigError::Invalid(
                "pagination limits must be greater than zero".to_string(),
            ));
        }
        if p.default_limit > p.max_limit {
            return Err(ConfigError::Invalid(
                "pagination.default_limit cannot exceed pagination.max_limit".to_string(),
            ));
        }
        if self.validation.max_name_length == 0 {
            return Err(ConfigError::Invalid(
                "validation.max_name_length must be greater than zero".to_string(),
            ));
        }
        if self.server.read_timeout_secs == 0 || self.server.write_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "server timeouts must be greater than zero".to_string(),
            ));
        }
        if self.jwt.expiration_secs <= 0 {
            return Err(ConfigError::Invalid(
                "jwt.expiration_secs must be positive".to_string(),
            ));
        }
        Ok(())
    }

    pub fn name_rules(&self) -> NameRules {
        self.validation.into()
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use secrecy::ExposeSecret;

    use super::*;

    const SAMPLE: &str = r#"{
        "server": { "host": "127.0.0.1", "port": 9000, "read_timeout_secs": 5, "write_timeout_secs": 30 },
        "database": { "host": "db", "port": 5432, "user": "motico", "name": "inventory", "ssl_mode": "disable" },
        "pagination": { "default_limit": 10, "max_limit": 50 },
        "validation": { "max_name_length": 100, "max_description_length": 500 },
        "logging": { "level": "debug", "format": "text" },
        "jwt": { "expiration_secs": 3600 }
    }"#;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn file_values_and_env_overrides_are_merged() {
        let mut cfg = AppConfig::from_json_str(SAMPLE).unwrap();
        cfg.apply_env(env(&[
            ("DB_HOST", "override-host"),
            ("DB_PORT", "6543"),
            ("DB_PASSWORD", "pw"),
            ("JWT_SECRET_KEY", "jwt"),
        ]))
        .unwrap();
        cfg.validate().unwrap();

        assert_eq!(cfg.server.bind_address(), "127.0.0.1:9000");
        assert_eq!(cfg.server.read_timeout(), Duration::from_secs(5));
        assert_eq!(cfg.server.write_timeout(), Duration::from_secs(30));
        assert_eq!(cfg.database.host, "override-host");
        assert_eq!(cfg.database.port, 6543);
        assert_eq!(cfg.database.user, "motico");
        assert_eq!(cfg.pagination.max_limit, 50);
        assert_eq!(cfg.name_rules().max_name_length, 100);
        assert_eq!(
            cfg.jwt.secret.as_ref().map(|s| s.expose_secret().to_string()),
            Some("jwt".to_string())
        );
    }

    #[test]
    fn jwt_secret_is_required() {
        let mut cfg = AppConfig::from_json_str(SAMPLE).unwrap();
        let err = cfg.apply_env(env(&[("DB_PASSWORD", "pw")])).unwrap_err();
        match err {
            ConfigError::MissingEnvVar(name) if name == "JWT_SECRET_KEY" => {}
            other => panic!("expected missing JWT_SECRET_KEY, got {other:?}"),
        }
    }

    #[test]
    fn loads_without_db_password() {
        let mut cfg = AppConfig::from_json_str(SAMPLE).unwrap();
        cfg.apply_env(env(&[("JWT_SECRET_KEY", "jwt")])).unwrap();
        assert!(cfg.use_persistent_stores);
        assert!(cfg.database.password.is_none());

        let mut cfg = AppConfig::from_json_str(SAMPLE).unwrap();
        cfg.apply_env(env(&[
            ("JWT_SECRET_KEY", "jwt"),
            ("USE_PERSISTENT_STORES", "false"),
        ]))
        .unwrap();
        assert!(!cfg.use_persistent_stores);
    }

    #[test]
    fn invalid_port_override_is_reported() {
        let mut cfg = AppConfig::from_json_str(SAMPLE).unwrap();
        let err = cfg
            .apply_env(env(&[("DB_PORT", "not-a-port"), ("JWT_SECRET_KEY", "jwt")]))
            .unwrap_err();
        assert!(matches!(err, ConfigError::InvalidEnvVar(ref name, _) if name == "DB_PORT"));
    }

    #[test]
    fn default_limit_above_max_is_rejected() {
        let mut cfg = AppConfig::from_json_str(r#"{"pagination": {"default_limit": 80, "max_limit": 50}}"#)
            .unwrap();
        cfg.apply_env(env(&[("JWT_SECRET_KEY", "jwt"), ("DB_PASSWORD", "pw")]))
            .unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn missing_sections_fall_back_to_defaults() {
        let cfg = AppConfig::from_json_str("{}").unwrap();
        assert!(cfg.use_persistent_stores);
        assert_eq!(cfg.pagination, PaginationConfig::default());
        assert_eq!(cfg.server.port, 8080);
        assert_eq!(cfg.server.read_timeout_secs, 15);
    }

    #[test]
    fn zero_timeout_is_rejected() {
        let mut cfg = AppConfig::from_json_str(r#"{"server": {"write_timeout_secs": 0}}"#).unwrap();
        cfg.apply_env(env(&[("JWT_SECRET_KEY", "jwt")])).unwrap();
        assert!(matches!(cfg.validate(), Err(ConfigError::Invalid(_))));
    }

    #[test]
    fn debug_output_redacts_secrets() {
        let mut cfg = AppConfig::from_json_str(SAMPLE).unwrap();
        cfg.apply_env(env(&[("DB_PASSWORD", "hunter2"), ("JWT_SECRET_KEY", "s3cr3t")]))
            .unwrap();
        let rendered = format!("{cfg:?}");
        assert!(!rendered.contains("hunter2"));
        assert!(!rendered.contains("s3cr3t"));
    }
}
