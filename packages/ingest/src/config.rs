//! Application configuration.
//!
//! Loaded from an optional TOML file, then overridden from the environment.
//! Every section and key is optional.
//!
//! ```toml
//! [database]
//! host = "db.internal"
//! password = "secret"
//!
//! [refresh]
//! live_table = "book"
//! concurrency = 20
//! swap = "atomic"
//!
//! [source]
//! base_url = "https://catalog.example.com/api"
//! records_path = "data.list"
//! ```

use std::path::{Path, PathBuf};

use catalog_refresh_database::schema::{retired_table_name, staging_table_name, validate_identifier};
use catalog_refresh_database_models::DatabaseConfig;
use catalog_refresh_ingest_models::RefreshConfig;
use catalog_refresh_source::http::HttpSourceConfig;
use serde::{Deserialize, Serialize};

/// Errors that can occur while loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("Failed to read config file {path}: {source}")]
    Io {
        /// Path that was read.
        path: PathBuf,
        /// Underlying I/O error.
        source: std::io::Error,
    },

    /// The config file is not valid TOML for [`AppConfig`].
    #[error("Failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// A value parsed but is not usable.
    #[error("Invalid config value for {key}: {message}")]
    Invalid {
        /// Offending key.
        key: String,
        /// What is wrong with it.
        message: String,
    },
}

impl ConfigError {
    fn invalid(key: &str, message: impl Into<String>) -> Self {
        Self::Invalid {
            key: key.to_string(),
            message: message.into(),
        }
    }
}

/// Overrides `database.host`.
pub const ENV_DB_HOST: &str = "CATALOG_DB_HOST";
/// Overrides `database.port`. Must parse as a port number.
pub const ENV_DB_PORT: &str = "CATALOG_DB_PORT";
/// Overrides `database.user`.
pub const ENV_DB_USER: &str = "CATALOG_DB_USER";
/// Overrides `database.password`.
pub const ENV_DB_PASSWORD: &str = "CATALOG_DB_PASSWORD";
/// Overrides `database.database`.
pub const ENV_DB_NAME: &str = "CATALOG_DB_NAME";
/// Overrides `refresh.live_table`.
pub const ENV_LIVE_TABLE: &str = "CATALOG_LIVE_TABLE";
/// Overrides `source.base_url`.
pub const ENV_SOURCE_URL: &str = "CATALOG_SOURCE_URL";

/// Everything a refresh run needs.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct AppConfig {
    /// Where the catalog table lives.
    pub database: DatabaseConfig,
    /// How the refresh runs.
    pub refresh: RefreshConfig,
    /// Where records come from.
    pub source: HttpSourceConfig,
}

impl AppConfig {
    /// Parses a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] if the document is malformed or has
    /// unknown keys.
    pub fn from_toml_str(contents: &str) -> Result<Self, ConfigError> {
        Ok(toml::from_str(contents)?)
    }

    /// Loads `path` (or the defaults when `None`), applies environment
    /// overrides, and validates the result.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if the file cannot be read or parsed, or a
    /// value is invalid.
    pub fn load(path: Option<&Path>) -> Result<Self, ConfigError> {
        let mut config = match path {
            Some(path) => {
                let contents = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
                    path: path.to_path_buf(),
                    source,
                })?;
                log::debug!("Loaded config from {}", path.display());
                Self::from_toml_str(&contents)?
            }
            None => Self::default(),
        };

        config.apply_overrides(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies overrides looked up by environment variable name.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if `CATALOG_DB_PORT` is not a port
    /// number.
    pub fn apply_overrides(
        &mut self,
        lookup: impl Fn(&str) -> Option<String>,
    ) -> Result<(), ConfigError> {
        if let Some(host) = lookup(ENV_DB_HOST) {
            self.database.host = host;
        }
        if let Some(port) = lookup(ENV_DB_PORT) {
            self.database.port = port
                .parse()
                .map_err(|_| ConfigError::invalid(ENV_DB_PORT, format!("{port:?} is not a port")))?;
        }
        if let Some(user) = lookup(ENV_DB_USER) {
            self.database.user = user;
        }
        if let Some(password) = lookup(ENV_DB_PASSWORD) {
            self.database.password = Some(password);
        }
        if let Some(name) = lookup(ENV_DB_NAME) {
            self.database.database = name;
        }
        if let Some(table) = lookup(ENV_LIVE_TABLE) {
            self.refresh.live_table = table;
        }
        if let Some(url) = lookup(ENV_SOURCE_URL) {
            self.source.base_url = url;
        }
        Ok(())
    }

    /// Checks values that parse fine but would fail later in the run.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first bad key.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let refresh = &self.refresh;

        validate_identifier(&refresh.live_table)
            .map_err(|e| ConfigError::invalid("refresh.live_table", e.to_string()))?;

        // Widest name a run can generate, including the retired suffix.
        let widest = retired_table_name(&staging_table_name(
            &refresh.staging_prefix,
            9_999_999_999_999,
            999,
        ));
        validate_identifier(&widest)
            .map_err(|e| ConfigError::invalid("refresh.staging_prefix", e.to_string()))?;
        if refresh.staging_prefix.is_empty() {
            return Err(ConfigError::invalid("refresh.staging_prefix", "must not be empty"));
        }

        if refresh.concurrency == 0 {
            return Err(ConfigError::invalid("refresh.concurrency", "must be at least 1"));
        }
        if refresh.batch_size == 0 {
            return Err(ConfigError::invalid("refresh.batch_size", "must be at least 1"));
        }
        if refresh.max_pages_per_category == Some(0) {
            return Err(ConfigError::invalid(
                "refresh.max_pages_per_category",
                "must be at least 1 when set",
            ));
        }
        if self.source.timeout_secs == 0 {
            return Err(ConfigError::invalid("source.timeout_secs", "must be at least 1"));
        }

        Ok(())
    }

    /// Serializes back to TOML.
    ///
    /// # Errors
    ///
    /// Returns [`toml::ser::Error`] if serialization fails.
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string_pretty(self)
    }

    /// Copy with the database password masked, for display.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        if config.database.password.is_some() {
            config.database.password = Some("***".to_string());
        }
        config
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use catalog_refresh_database_models::SwapStrategy;
    use catalog_refresh_ingest_models::DedupMode;

    use super::*;

    #[test]
    fn defaults() {
        let config = AppConfig::default();
        assert_eq!(config.database.host, "localhost");
        assert_eq!(config.database.port, 3306);
        assert_eq!(config.refresh.concurrency, 20);
        assert_eq!(config.refresh.book_categories, 3000);
        assert_eq!(config.refresh.magazine_categories, 1000);
        assert_eq!(config.refresh.batch_size, 10);
        assert_eq!(config.refresh.live_table, "book");
        assert!(config.validate().is_ok());
    }

    #[test]
    fn parses_every_section() {
        let config = AppConfig::from_toml_str(
            r#"
            [database]
            host = "db"
            port = 3307
            password = "pw"

            [refresh]
            concurrency = 8
            max_pages_per_category = 50
            swap = "drop-then-rename"
            dedup = "atomic"

            [source]
            base_url = "https://catalog.example.com"
            records_path = "data.list"
            "#,
        )
        .unwrap();

        assert_eq!(config.database.host, "db");
        assert_eq!(config.database.port, 3307);
        assert_eq!(config.database.password.as_deref(), Some("pw"));
        assert_eq!(config.database.user, "root");
        assert_eq!(config.refresh.concurrency, 8);
        assert_eq!(config.refresh.max_pages_per_category, Some(50));
        assert_eq!(config.refresh.swap, SwapStrategy::DropThenRename);
        assert_eq!(config.refresh.dedup, DedupMode::Atomic);
        assert_eq!(config.source.records_path.as_deref(), Some("data.list"));
        assert_eq!(config.source.book_path, "books");
    }

    #[test]
    fn empty_document_is_the_default() {
        assert_eq!(AppConfig::from_toml_str("").unwrap(), AppConfig::default());
    }

    #[test]
    fn rejects_unknown_section() {
        assert!(matches!(
            AppConfig::from_toml_str("[sorce]\nbase_url = \"x\""),
            Err(ConfigError::Parse(_))
        ));
    }

    #[test]
    fn environment_overrides_file_values() {
        let env: BTreeMap<&str, &str> = [
            (ENV_DB_HOST, "envhost"),
            (ENV_DB_PORT, "3310"),
            (ENV_DB_USER, "loader"),
            (ENV_DB_PASSWORD, "s3cret"),
            (ENV_DB_NAME, "shop"),
            (ENV_LIVE_TABLE, "catalog"),
            (ENV_SOURCE_URL, "http://source"),
        ]
        .into_iter()
        .collect();
        let mut config = AppConfig::from_toml_str("[database]\nhost = \"filehost\"").unwrap();

        config
            .apply_overrides(|key| env.get(key).map(ToString::to_string))
            .unwrap();

        assert_eq!(config.database.host, "envhost");
        assert_eq!(config.database.port, 3310);
        assert_eq!(config.database.user, "loader");
        assert_eq!(config.database.password.as_deref(), Some("s3cret"));
        assert_eq!(config.database.database, "shop");
        assert_eq!(config.refresh.live_table, "catalog");
        assert_eq!(config.source.base_url, "http://source");
    }

    #[test]
    fn bad_port_override_is_invalid() {
        let mut config = AppConfig::default();
        let err = config
            .apply_overrides(|key| (key == ENV_DB_PORT).then(|| "nope".to_string()))
            .unwrap_err();
        assert!(matches!(err, ConfigError::Invalid { ref key, .. } if key == ENV_DB_PORT));
    }

    #[test]
    fn validation_rejects_unusable_values() {
        let mut config = AppConfig::default();
        config.refresh.live_table = "book; DROP TABLE x".to_string();
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.refresh.staging_prefix = "p".repeat(60);
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.refresh.concurrency = 0;
        assert!(config.validate().is_err());

        let mut config = AppConfig::default();
        config.refresh.batch_size = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn missing_file_is_an_io_error() {
        let err = AppConfig::load(Some(Path::new("/nonexistent/catalog-refresh.toml"))).unwrap_err();
        assert!(matches!(err, ConfigError::Io { .. }));
    }

    #[test]
    fn round_trips_through_toml_without_password() {
        let mut config = AppConfig::default();
        config.database.password = Some("pw".to_string());

        let rendered = config.redacted().to_toml().unwrap();

        assert!(!rendered.contains("\"pw\""));
        assert!(rendered.contains("[refresh]"));
        let parsed = AppConfig::from_toml_str(&rendered).unwrap();
        assert_eq!(parsed.refresh, config.refresh);
    }
}
