#![cfg_attr(feature = "fail-on-warnings", deny(warnings))]
#![warn(clippy::all, clippy::pedantic, clippy::nursery, clippy::cargo)]
#![allow(clippy::multiple_crate_versions, clippy::cargo_common_metadata)]

//! Database connection settings and table promotion strategies.

use serde::{Deserialize, Serialize};
use strum_macros::{AsRefStr, Display, EnumString};

/// Default MySQL host.
pub const DEFAULT_HOST: &str = "localhost";

/// Default MySQL port.
pub const DEFAULT_PORT: u16 = 3306;

/// Connection parameters for the catalog database.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// Server host name.
    pub host: String,
    /// Server port.
    pub port: u16,
    /// Login user.
    pub user: String,
    /// Login password, if the account has one.
    pub password: Option<String>,
    /// Schema (database) name.
    pub database: String,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            user: "root".to_string(),
            password: None,
            database: "catalog".to_string(),
        }
    }
}

impl DatabaseConfig {
    /// Builds a `mysql://` connection URL. User and password are
    /// percent-encoded so reserved characters stay inside the userinfo.
    #[must_use]
    pub fn connection_url(&self) -> String {
        let user = urlencoding::encode(&self.user);
        let auth = self.password.as_ref().map_or_else(
            || user.to_string(),
            |password| format!("{user}:{}", urlencoding::encode(password)),
        );
        format!(
            "mysql://{auth}@{}:{}/{}",
            self.host, self.port, self.database
        )
    }

    /// Same as [`Self::connection_url`] with the password masked, for logs.
    #[must_use]
    pub fn redacted_url(&self) -> String {
        let user = urlencoding::encode(&self.user);
        let auth = if self.password.is_some() {
            format!("{user}:***")
        } else {
            user.to_string()
        };
        format!(
            "mysql://{auth}@{}:{}/{}",
            self.host, self.port, self.database
        )
    }
}

/// How a fully loaded staging table replaces the live table.
#[derive(
    Debug,
    Clone,
    Copy,
    Default,
    PartialEq,
    Eq,
    Hash,
    Serialize,
    Deserialize,
    Display,
    EnumString,
    AsRefStr,
)]
#[serde(rename_all = "kebab-case")]
#[strum(serialize_all = "kebab-case")]
pub enum SwapStrategy {
    /// Keep the old live table until a single multi-table `RENAME` swaps
    /// both names at once, then drop the old one. The live name always
    /// resolves to a table.
    #[default]
    Atomic,
    /// `DROP TABLE IF EXISTS live` followed by `RENAME TABLE staging TO
    /// live` as two separate statements. A failure between them leaves no
    /// live table.
    DropThenRename,
}
