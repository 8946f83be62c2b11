//! Database connection utilities.

use async_trait::async_trait;
use catalog_refresh_database_models::DatabaseConfig;
use switchy_database_connection::Credentials;

use crate::{Connector, DatabaseExecutor, DbError, SqlExecutor};

/// [`Connector`] that opens MySQL connections from a [`DatabaseConfig`].
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    config: DatabaseConfig,
}

impl MySqlConnector {
    #[must_use]
    pub const fn new(config: DatabaseConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn connect(&self) -> Result<Box<dyn SqlExecutor>, DbError> {
        connect(&self.config).await
    }
}

/// Opens a MySQL connection described by `config`.
///
/// The returned executor owns the connection; dropping it releases the
/// connection.
///
/// # Errors
///
/// Returns [`DbError::Connection`] if the URL cannot be parsed or the server
/// cannot be reached.
pub async fn connect(config: &DatabaseConfig) -> Result<Box<dyn SqlExecutor>, DbError> {
    log::info!("Connecting to {}", config.redacted_url());

    let creds =
        Credentials::from_url(&config.connection_url()).map_err(|e| DbError::Connection {
            message: e.to_string(),
        })?;

    let db = switchy_database_connection::init_mysql_sqlx(creds)
        .await
        .map_err(|e| DbError::Connection {
            message: e.to_string(),
        })?;

    Ok(Box::new(DatabaseExecutor::new(db)))
}
