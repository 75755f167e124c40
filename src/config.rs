//! Startup configuration. Read from `.env` (if present) and the process environment.

use crate::error::ConfigError;
use std::fmt;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Used when `SECRET_KEY` is unset. Fine for local development only.
pub const DEV_SECRET_KEY: &str = "you-will-never-guess";

pub const DEFAULT_APP_NAME: &str = "appkit";
pub const DEFAULT_DATABASE_URL: &str = "postgres://localhost/app";
pub const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5000";
pub const DEFAULT_MIGRATIONS_DIR: &str = "migrations";

#[derive(Clone, PartialEq, Eq)]
pub struct Config {
    pub app_name: String,
    pub secret_key: String,
    pub database_url: String,
    pub max_connections: u32,
    pub acquire_timeout: Duration,
    pub bind_addr: SocketAddr,
    pub migrations_dir: PathBuf,
    /// Run pending migrations before serving.
    pub auto_migrate: bool,
    /// Create the target database if it does not exist before serving.
    pub create_database: bool,
}

impl Config {
    /// Load `.env` (a missing file is fine), then read the process environment.
    pub fn from_env() -> Result<Self, ConfigError> {
        match dotenvy::dotenv() {
            Ok(path) => tracing::debug!(path = %path.display(), "loaded .env"),
            Err(e) if e.not_found() => {}
            Err(e) => return Err(ConfigError::Load(e.to_string())),
        }
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build config from any key lookup. Unset keys fall back to defaults.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let secret_key = match get("SECRET_KEY") {
            Some(s) => s,
            None => {
                tracing::warn!("SECRET_KEY not set; using the development key");
                DEV_SECRET_KEY.to_string()
            }
        };

        let bind_raw = get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.into());
        let bind_addr = bind_raw
            .parse::<SocketAddr>()
            .map_err(|_| ConfigError::Invalid {
                key: "BIND_ADDR",
                value: bind_raw.clone(),
            })?;

        let config = Config {
            app_name: get("APP_NAME").unwrap_or_else(|| DEFAULT_APP_NAME.into()),
            secret_key,
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.into()),
            max_connections: parse_num(&get, "DATABASE_MAX_CONNECTIONS", 5)?,
            acquire_timeout: Duration::from_secs(parse_num(&get, "DATABASE_ACQUIRE_TIMEOUT_SECS", 5)?),
            bind_addr,
            migrations_dir: get("MIGRATIONS_DIR")
                .map(PathBuf::from)
                .unwrap_or_else(|| PathBuf::from(DEFAULT_MIGRATIONS_DIR)),
            auto_migrate: parse_bool(&get, "AUTO_MIGRATE", false)?,
            create_database: parse_bool(&get, "CREATE_DATABASE", true)?,
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.secret_key.is_empty() {
            return Err(ConfigError::Validation("SECRET_KEY must not be empty".into()));
        }
        if !(self.database_url.starts_with("postgres://") || self.database_url.starts_with("postgresql://")) {
            return Err(ConfigError::Validation(
                "DATABASE_URL must be a postgres:// or postgresql:// URL".into(),
            ));
        }
        if self.max_connections == 0 {
            return Err(ConfigError::Validation(
                "DATABASE_MAX_CONNECTIONS must be at least 1".into(),
            ));
        }
        Ok(())
    }

    pub fn uses_dev_secret(&self) -> bool {
        self.secret_key == DEV_SECRET_KEY
    }
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("app_name", &self.app_name)
            .field("secret_key", &"<redacted>")
            .field("database_url", &self.database_url)
            .field("max_connections", &self.max_connections)
            .field("acquire_timeout", &self.acquire_timeout)
            .field("bind_addr", &self.bind_addr)
            .field("migrations_dir", &self.migrations_dir)
            .field("auto_migrate", &self.auto_migrate)
            .field("create_database", &self.create_database)
            .finish()
    }
}

fn parse_num<G, T>(get: &G, key: &'static str, default: T) -> Result<T, ConfigError>
where
    G: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => raw.trim().parse::<T>().map_err(|_| ConfigError::Invalid { key, value: raw }),
    }
}

fn parse_bool<G>(get: &G, key: &'static str, default: bool) -> Result<bool, ConfigError>
where
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        None => Ok(default),
        Some(raw) => match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::Invalid { key, value: raw }),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_apply_when_env_is_empty() {
        let config = Config::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.app_name, DEFAULT_APP_NAME);
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
        assert_eq!(config.max_connections, 5);
        assert_eq!(config.acquire_timeout, Duration::from_secs(5));
        assert_eq!(config.bind_addr.port(), 5000);
        assert_eq!(config.migrations_dir, PathBuf::from("migrations"));
        assert!(!config.auto_migrate);
        assert!(config.create_database);
        assert!(config.uses_dev_secret());
    }

    #[test]
    fn overrides_are_read() {
        let config = Config::from_lookup(lookup(&[
            ("APP_NAME", "blog"),
            ("SECRET_KEY", "s3cret"),
            ("DATABASE_URL", "postgresql://db:5432/blog"),
            ("DATABASE_MAX_CONNECTIONS", "12"),
            ("DATABASE_ACQUIRE_TIMEOUT_SECS", "2"),
            ("BIND_ADDR", "0.0.0.0:8080"),
            ("MIGRATIONS_DIR", "db/migrations"),
            ("AUTO_MIGRATE", "Yes"),
            ("CREATE_DATABASE", "off"),
        ]))
        .unwrap();
        assert_eq!(config.app_name, "blog");
        assert!(!config.uses_dev_secret());
        assert_eq!(config.max_connections, 12);
        assert_eq!(config.acquire_timeout, Duration::from_secs(2));
        assert_eq!(config.bind_addr.to_string(), "0.0.0.0:8080");
        assert_eq!(config.migrations_dir, PathBuf::from("db/migrations"));
        assert!(config.auto_migrate);
        assert!(!config.create_database);
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = Config::from_lookup(lookup(&[("DATABASE_URL", "  ")])).unwrap();
        assert_eq!(config.database_url, DEFAULT_DATABASE_URL);
    }

    #[test]
    fn bad_number_names_the_key() {
        let err = Config::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "many")])).unwrap_err();
        match err {
            ConfigError::Invalid { key, value } => {
                assert_eq!(key, "DATABASE_MAX_CONNECTIONS");
                assert_eq!(value, "many");
            }
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn bad_bool_and_bind_addr_are_rejected() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("AUTO_MIGRATE", "maybe")])),
            Err(ConfigError::Invalid { key: "AUTO_MIGRATE", .. })
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("BIND_ADDR", "localhost")])),
            Err(ConfigError::Invalid { key: "BIND_ADDR", .. })
        ));
    }

    #[test]
    fn validation_rejects_non_postgres_url_and_empty_pool() {
        assert!(matches!(
            Config::from_lookup(lookup(&[("DATABASE_URL", "sqlite:///app.db")])),
            Err(ConfigError::Validation(_))
        ));
        assert!(matches!(
            Config::from_lookup(lookup(&[("DATABASE_MAX_CONNECTIONS", "0")])),
            Err(ConfigError::Validation(_))
        ));
    }

    #[test]
    fn debug_redacts_secret() {
        let config = Config::from_lookup(lookup(&[("SECRET_KEY", "hunter2")])).unwrap();
        let shown = format!("{:?}", config);
        assert!(!shown.contains("hunter2"));
        assert!(shown.contains("<redacted>"));
    }
}
