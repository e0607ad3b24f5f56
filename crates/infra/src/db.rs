//! `PostgreSQL` connection pool and schema migrations.
//!
//! Migrations live in `crates/infra/migrations/` and are embedded at compile
//! time; the server applies them on startup when persistent stores are on.

use std::str::FromStr;
use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::migrate::{MigrateError, Migrator};
use sqlx::postgres::{PgConnectOptions, PgPoolOptions, PgSslMode};

use crate::config::{ConfigError, DatabaseConfig};

pub static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connection options built from config; the password comes from `DB_PASSWORD`.
///
/// # Errors
///
/// Returns `ConfigError` if `DB_PASSWORD` is unset or the SSL mode is not a
/// valid libpq mode.
pub fn connect_options(config: &DatabaseConfig) -> Result<PgConnectOptions, ConfigError> {
    let password = config
        .password
        .as_ref()
        .ok_or_else(|| ConfigError::MissingEnvVar("DB_PASSWORD".to_string()))?;
    let ssl_mode = PgSslMode::from_str(&config.ssl_mode).map_err(|e| {
        ConfigError::InvalidEnvVar("DB_SSLMODE".to_string(), e.to_string())
    })?;

    Ok(PgConnectOptions::new()
        .host(&config.host)
        .port(config.port)
        .username(&config.user)
        .password(password.expose_secret())
        .database(&config.name)
        .ssl_mode(ssl_mode))
}

/// Create a `PostgreSQL` connection pool sized from config.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(
    config: &DatabaseConfig,
    options: PgConnectOptions,
) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(config.max_connections)
        .min_connections(config.min_connections)
        .acquire_timeout(Duration::from_secs(config.acquire_timeout_secs))
        .connect_with(options)
        .await
}

/// Apply pending migrations.
///
/// # Errors
///
/// Returns `MigrateError` if a migration fails or the history diverges.
pub async fn run_migrations(pool: &PgPool) -> Result<(), MigrateError> {
    MIGRATOR.run(pool).await
}

#[cfg(test)]
mod tests {
    use secrecy::SecretString;

    use super::*;

    fn with_password(config: DatabaseConfig) -> DatabaseConfig {
        DatabaseConfig {
            password: Some(SecretString::from("pw")),
            ..config
        }
    }

    #[test]
    fn password_is_required() {
        assert!(matches!(
            connect_options(&DatabaseConfig::default()),
            Err(ConfigError::MissingEnvVar(name)) if name == "DB_PASSWORD"
        ));
    }

    #[test]
    fn rejects_unknown_ssl_mode() {
        let config = with_password(DatabaseConfig {
            ssl_mode: "sometimes".to_string(),
            ..DatabaseConfig::default()
        });
        assert!(matches!(
            connect_options(&config),
            Err(ConfigError::InvalidEnvVar(name, _)) if name == "DB_SSLMODE"
        ));
    }

    #[test]
    fn builds_options_from_config() {
        let config = with_password(DatabaseConfig {
            host: "db.internal".to_string(),
            port: 6543,
            ..DatabaseConfig::default()
        });
        let options = connect_options(&config).expect("valid options");
        assert_eq!(options.get_host(), "db.internal");
        assert_eq!(options.get_port(), 6543);
    }
}
