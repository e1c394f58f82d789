//! MongoDB connection configuration.

use std::time::Duration;

use mongodb::options::ClientOptions;

use docrepo_core::{
    error::{RepositoryError, RepositoryResult},
    repository::DEFAULT_OPERATION_TIMEOUT,
};

use crate::connector::DEFAULT_CONNECT_TIMEOUT;

/// URI used when none is configured.
pub const DEFAULT_URI: &str = "mongodb://localhost:27017";

/// Environment variable holding the connection URI.
pub const URI_ENV: &str = "DOCREPO_MONGO_URI";
/// Environment variable holding the default database name.
pub const DATABASE_ENV: &str = "DOCREPO_DATABASE";
/// Environment variable holding the connect timeout, in whole seconds.
pub const CONNECT_TIMEOUT_ENV: &str = "DOCREPO_CONNECT_TIMEOUT_SECS";

/// MongoDB connection configuration.
#[derive(Debug, Clone, PartialEq)]
pub struct MongoConfig {
    /// MongoDB connection URI (`mongodb://` or `mongodb+srv://`).
    pub uri: String,
    /// Database repositories are bound to when the caller does not name one.
    pub database: Option<String>,
    /// Application name (shown in server logs).
    pub app_name: Option<String>,
    /// Minimum connection pool size.
    pub min_pool_size: Option<u32>,
    /// Maximum connection pool size.
    pub max_pool_size: Option<u32>,
    /// Bound on connection establishment, server selection and the initial ping.
    pub connect_timeout: Duration,
    /// Per-operation timeout for repositories created from this configuration.
    pub operation_timeout: Duration,
}

impl Default for MongoConfig {
    fn default() -> Self {
        Self {
            uri: DEFAULT_URI.to_string(),
            database: None,
            app_name: None,
            min_pool_size: None,
            max_pool_size: None,
            connect_timeout: DEFAULT_CONNECT_TIMEOUT,
            operation_timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }
}

impl MongoConfig {
    /// Create a new configuration from a MongoDB URI.
    pub fn from_uri(uri: impl Into<String>) -> Self {
        Self {
            uri: uri.into(),
            ..Self::default()
        }
    }

    /// Create a builder for configuration.
    pub fn builder() -> MongoConfigBuilder {
        MongoConfigBuilder::new()
    }

    /// Reads the configuration from `DOCREPO_MONGO_URI`, `DOCREPO_DATABASE` and
    /// `DOCREPO_CONNECT_TIMEOUT_SECS`. Unset variables keep their defaults.
    pub fn from_env() -> RepositoryResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Like [`MongoConfig::from_env`], reading variables through `lookup`.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> RepositoryResult<Self> {
        let mut builder = Self::builder();

        if let Some(uri) = lookup(URI_ENV) {
            builder = builder.uri(uri);
        }

        if let Some(database) = lookup(DATABASE_ENV) {
            builder = builder.database(database);
        }

        if let Some(secs) = lookup(CONNECT_TIMEOUT_ENV) {
            let secs = secs.trim().parse::<u64>().map_err(|e| {
                RepositoryError::Config(format!("{CONNECT_TIMEOUT_ENV} must be a whole number of seconds: {e}"))
            })?;
            builder = builder.connect_timeout(Duration::from_secs(secs));
        }

        builder.build()
    }

    /// Convert to MongoDB ClientOptions.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Connection`] when the URI cannot be parsed or resolved.
    pub async fn to_client_options(&self) -> RepositoryResult<ClientOptions> {
        let mut options = ClientOptions::parse(&self.uri)
            .await
            .map_err(|e| RepositoryError::connection(format!("failed to parse URI: {e}")))?;

        if let Some(ref app_name) = self.app_name {
            options.app_name = Some(app_name.clone());
        }

        if let Some(min_pool) = self.min_pool_size {
            options.min_pool_size = Some(min_pool);
        }

        if let Some(max_pool) = self.max_pool_size {
            options.max_pool_size = Some(max_pool);
        }

        options.connect_timeout = Some(self.connect_timeout);
        options.server_selection_timeout = Some(self.connect_timeout);

        Ok(options)
    }
}

/// Builder for MongoDB configuration.
#[derive(Debug, Default)]
pub struct MongoConfigBuilder {
    uri: Option<String>,
    database: Option<String>,
    app_name: Option<String>,
    min_pool_size: Option<u32>,
    max_pool_size: Option<u32>,
    connect_timeout: Option<Duration>,
    operation_timeout: Option<Duration>,
}

impl MongoConfigBuilder {
    /// Create a new builder.
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the MongoDB URI.
    pub fn uri(mut self, uri: impl Into<String>) -> Self {
        self.uri = Some(uri.into());
        self
    }

    /// Set the default database name.
    pub fn database(mut self, database: impl Into<String>) -> Self {
        self.database = Some(database.into());
        self
    }

    /// Set the application name.
    pub fn app_name(mut self, name: impl Into<String>) -> Self {
        self.app_name = Some(name.into());
        self
    }

    /// Set the minimum pool size.
    pub fn min_pool_size(mut self, size: u32) -> Self {
        self.min_pool_size = Some(size);
        self
    }

    /// Set the maximum pool size.
    pub fn max_pool_size(mut self, size: u32) -> Self {
        self.max_pool_size = Some(size);
        self
    }

    /// Set the connection timeout.
    pub fn connect_timeout(mut self, duration: Duration) -> Self {
        self.connect_timeout = Some(duration);
        self
    }

    /// Set the per-operation timeout.
    pub fn operation_timeout(mut self, duration: Duration) -> Self {
        self.operation_timeout = Some(duration);
        self
    }

    /// Build the configuration.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::Config`] when the URI scheme is not a MongoDB one,
    /// a timeout is zero, or the pool bounds are inverted.
    pub fn build(self) -> RepositoryResult<MongoConfig> {
        let uri = self.uri.unwrap_or_else(|| DEFAULT_URI.to_string());

        if !uri.starts_with("mongodb://") && !uri.starts_with("mongodb+srv://") {
            return Err(RepositoryError::Config(format!(
                "URI must start with mongodb:// or mongodb+srv://, got {uri:?}"
            )));
        }

        let connect_timeout = self.connect_timeout.unwrap_or(DEFAULT_CONNECT_TIMEOUT);
        let operation_timeout = self.operation_timeout.unwrap_or(DEFAULT_OPERATION_TIMEOUT);

        if connect_timeout.is_zero() || operation_timeout.is_zero() {
            return Err(RepositoryError::Config("timeouts must be greater than zero".into()));
        }

        if let (Some(min), Some(max)) = (self.min_pool_size, self.max_pool_size) {
            if min > max {
                return Err(RepositoryError::Config(format!(
                    "min_pool_size ({min}) exceeds max_pool_size ({max})"
                )));
            }
        }

        Ok(MongoConfig {
            uri,
            database: self.database,
            app_name: self.app_name,
            min_pool_size: self.min_pool_size,
            max_pool_size: self.max_pool_size,
            connect_timeout,
            operation_timeout,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use std::collections::HashMap;

    #[test]
    fn test_config_defaults() {
        let config = MongoConfig::default();
        assert_eq!(config.uri, DEFAULT_URI);
        assert_eq!(config.connect_timeout, Duration::from_secs(20));
        assert_eq!(config.operation_timeout, Duration::from_secs(20));
        assert_eq!(config.database, None);
    }

    #[test]
    fn test_config_builder() {
        let config = MongoConfig::builder()
            .uri("mongodb+srv://cluster0.example.net")
            .database("mongolang")
            .app_name("docrepo-demo")
            .max_pool_size(20)
            .connect_timeout(Duration::from_secs(5))
            .build()
            .unwrap();

        assert_eq!(config.database.as_deref(), Some("mongolang"));
        assert_eq!(config.app_name.as_deref(), Some("docrepo-demo"));
        assert_eq!(config.max_pool_size, Some(20));
        assert_eq!(config.connect_timeout, Duration::from_secs(5));
    }

    #[test]
    fn test_config_builder_rejects_invalid_values() {
        assert!(MongoConfig::builder().uri("postgres://localhost").build().is_err());
        assert!(MongoConfig::builder().connect_timeout(Duration::ZERO).build().is_err());
        assert!(
            MongoConfig::builder()
                .min_pool_size(10)
                .max_pool_size(2)
                .build()
                .is_err()
        );
    }

    #[test]
    fn test_config_from_lookup() {
        let vars = HashMap::from([
            (URI_ENV, "mongodb://db.internal:27017"),
            (DATABASE_ENV, "mongolang"),
            (CONNECT_TIMEOUT_ENV, " 7 "),
        ]);

        let config = MongoConfig::from_lookup(|key| vars.get(key).map(|v| v.to_string())).unwrap();

        assert_eq!(config.uri, "mongodb://db.internal:27017");
        assert_eq!(config.database.as_deref(), Some("mongolang"));
        assert_eq!(config.connect_timeout, Duration::from_secs(7));
    }

    #[test]
    fn test_config_from_lookup_defaults_and_errors() {
        let config = MongoConfig::from_lookup(|_| None).unwrap();
        assert_eq!(config, MongoConfig::default());

        let err = MongoConfig::from_lookup(|key| (key == CONNECT_TIMEOUT_ENV).then(|| "soon".to_string())).unwrap_err();
        assert!(matches!(err, RepositoryError::Config(_)));
    }

    #[tokio::test]
    async fn test_to_client_options_applies_timeouts() {
        let config = MongoConfig::builder()
            .uri("mongodb://localhost:27017")
            .app_name("docrepo")
            .connect_timeout(Duration::from_secs(3))
            .build()
            .unwrap();

        let options = config.to_client_options().await.unwrap();

        assert_eq!(options.connect_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.server_selection_timeout, Some(Duration::from_secs(3)));
        assert_eq!(options.app_name.as_deref(), Some("docrepo"));
    }

    #[tokio::test]
    async fn test_to_client_options_rejects_malformed_uri() {
        let config = MongoConfig::from_uri("mongodb://");
        let err = config.to_client_options().await.unwrap_err();
        assert!(err.is_connection_error());
    }
}
