//! Connection establishment with a bounded timeout.

use std::time::Duration;

use bson::doc;
use mongodb::Client;
use tracing::{debug, info};

use docrepo_core::error::{RepositoryError, RepositoryResult};

use crate::{config::MongoConfig, store::MongoDbStore};

/// Bound on connecting to a cluster when none is configured.
pub const DEFAULT_CONNECT_TIMEOUT: Duration = Duration::from_secs(20);

/// Connects to the cluster at `uri` and verifies it answers a `ping` within
/// `timeout`.
///
/// # Example
///
/// ```ignore
/// use docrepo::mongodb::{connect, DEFAULT_CONNECT_TIMEOUT};
///
/// let store = connect("mongodb://localhost:27017", DEFAULT_CONNECT_TIMEOUT).await?;
/// ```
///
/// # Errors
///
/// [`RepositoryError::Connection`] when the URI is rejected, the cluster is
/// unreachable, or the timeout elapses first. Nothing is retried.
pub async fn connect(uri: &str, timeout: Duration) -> RepositoryResult<MongoDbStore> {
    let config = MongoConfig {
        connect_timeout: timeout,
        ..MongoConfig::from_uri(uri)
    };

    Connector::from_config(config).connect().await
}

/// Opens connections described by a [`MongoConfig`].
#[derive(Debug, Clone)]
pub struct Connector {
    config: MongoConfig,
}

impl Connector {
    pub fn from_config(config: MongoConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &MongoConfig {
        &self.config
    }

    /// Builds a client and pings the `admin` database. URI resolution, server
    /// selection and the ping together are bounded by the connect timeout.
    pub async fn connect(&self) -> RepositoryResult<MongoDbStore> {
        let timeout = self.config.connect_timeout;

        tokio::time::timeout(timeout, self.establish())
            .await
            .map_err(|_| RepositoryError::connection(format!("cluster did not answer within {timeout:?}")))?
    }

    async fn establish(&self) -> RepositoryResult<MongoDbStore> {
        let options = self.config.to_client_options().await?;
        let hosts = options.hosts.clone();

        let client = Client::with_options(options)
            .map_err(|e| RepositoryError::connection(format!("failed to create client: {e}")))?;

        debug!(?hosts, "pinging cluster");

        client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(|e| RepositoryError::connection(format!("ping failed: {e}")))?;

        info!(?hosts, app_name = ?self.config.app_name, "connected to MongoDB");

        Ok(MongoDbStore::new(client))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_connect_rejects_malformed_uri() {
        let err = connect("not-a-uri", DEFAULT_CONNECT_TIMEOUT).await.unwrap_err();
        assert!(err.is_connection_error());
    }

    #[tokio::test]
    async fn test_connect_unreachable_cluster_fails_within_timeout() {
        let started = std::time::Instant::now();
        let err = connect("mongodb://127.0.0.1:1/?directConnection=true", Duration::from_millis(300))
            .await
            .unwrap_err();

        assert!(err.is_connection_error());
        assert!(started.elapsed() < Duration::from_secs(10));
    }
}
