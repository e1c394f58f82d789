use async_trait::async_trait;
use bson::{Bson, Document, doc};
use futures::TryStreamExt;
use mongodb::{
    Client, Collection as MongoCollection,
    error::{Error as MongoError, ErrorKind},
};
use tracing::debug;

use docrepo_core::{
    backend::{Namespace, StoreBackend, StoreBackendBuilder, UpdateOutcome},
    error::{RepositoryError, RepositoryResult},
};

use crate::{config::MongoConfig, connector::Connector};

/// [`StoreBackend`] over the official MongoDB driver.
///
/// The handle owns the driver's connection pool and can address any database
/// and collection on the cluster. Clone it, or share it by reference, to back
/// several repositories with one pool.
#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
}

impl MongoDbStore {
    pub fn new(client: Client) -> Self {
        Self { client }
    }

    pub fn builder(config: MongoConfig) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(config)
    }

    /// Get the underlying MongoDB client.
    pub fn inner(&self) -> &Client {
        &self.client
    }

    fn get_collection(&self, namespace: &Namespace) -> MongoCollection<Document> {
        self.client
            .database(&namespace.database)
            .collection(&namespace.collection)
    }
}

/// Maps a driver error onto the repository taxonomy.
fn map_error(err: MongoError) -> RepositoryError {
    let network = matches!(
        err.kind.as_ref(),
        ErrorKind::ServerSelection { .. } | ErrorKind::Io(_)
    );

    classify(err.to_string(), network)
}

fn classify(message: String, network: bool) -> RepositoryError {
    if message.contains("E11000") || message.contains("duplicate key") {
        return RepositoryError::DuplicateKey(message);
    }

    if network {
        return RepositoryError::Connection(message);
    }

    RepositoryError::Storage(message)
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    async fn find_one(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<Option<Document>> {
        self.get_collection(namespace)
            .find_one(filter)
            .await
            .map_err(map_error)
    }

    async fn find(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<Vec<Document>> {
        // The cursor is dropped, and closed server-side, on every exit path.
        self.get_collection(namespace)
            .find(filter)
            .await
            .map_err(map_error)?
            .try_collect::<Vec<Document>>()
            .await
            .map_err(map_error)
    }

    async fn count(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        self.get_collection(namespace)
            .count_documents(filter)
            .await
            .map_err(map_error)
    }

    async fn insert_one(&self, namespace: &Namespace, document: Document) -> RepositoryResult<Bson> {
        let result = self
            .get_collection(namespace)
            .insert_one(document)
            .await
            .map_err(map_error)?;

        debug!(%namespace, id = %result.inserted_id, "inserted document");

        Ok(result.inserted_id)
    }

    async fn insert_many(
        &self,
        namespace: &Namespace,
        documents: Vec<Document>,
        ordered: bool,
    ) -> RepositoryResult<Vec<Bson>> {
        let result = self
            .get_collection(namespace)
            .insert_many(documents)
            .ordered(ordered)
            .await
            .map_err(map_error)?;

        let mut ids = result.inserted_ids.into_iter().collect::<Vec<_>>();
        ids.sort_by_key(|(index, _)| *index);

        debug!(%namespace, count = ids.len(), "inserted documents");

        Ok(ids.into_iter().map(|(_, id)| id).collect())
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> RepositoryResult<UpdateOutcome> {
        let result = self
            .get_collection(namespace)
            .update_one(filter, update)
            .upsert(upsert)
            .await
            .map_err(map_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn update_many(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
    ) -> RepositoryResult<UpdateOutcome> {
        let result = self
            .get_collection(namespace)
            .update_many(filter, update)
            .await
            .map_err(map_error)?;

        Ok(UpdateOutcome {
            matched: result.matched_count,
            modified: result.modified_count,
            upserted_id: result.upserted_id,
        })
    }

    async fn delete_one(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        Ok(
            self.get_collection(namespace)
                .delete_one(filter)
                .await
                .map_err(map_error)?
                .deleted_count
        )
    }

    async fn delete_many(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        Ok(
            self.get_collection(namespace)
                .delete_many(filter)
                .await
                .map_err(map_error)?
                .deleted_count
        )
    }

    async fn ping(&self) -> RepositoryResult<()> {
        self.client
            .database("admin")
            .run_command(doc! { "ping": 1 })
            .await
            .map_err(map_error)?;

        Ok(())
    }

    async fn shutdown(self) -> RepositoryResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// Builder connecting a [`MongoDbStore`] from a [`MongoConfig`].
pub struct MongoDbStoreBuilder {
    config: MongoConfig,
}

impl MongoDbStoreBuilder {
    pub fn new(config: MongoConfig) -> Self {
        Self { config }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> RepositoryResult<Self::Backend> {
        Connector::from_config(self.config).connect().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_classify_duplicate_key() {
        let err = classify(
            "E11000 duplicate key error collection: mongolang.users index: _id_ dup key: { _id: 1 }".into(),
            false,
        );
        assert!(err.is_duplicate_key());
    }

    #[test]
    fn test_classify_network_and_storage_errors() {
        assert!(classify("Server selection timeout".into(), true).is_connection_error());
        assert!(matches!(
            classify("unknown operator: $foo".into(), false),
            RepositoryError::Storage(_)
        ));
    }

    #[tokio::test]
    async fn test_builder_surfaces_connection_errors() {
        let config = MongoConfig::from_uri("mongodb:/broken");
        let err = MongoDbStore::builder(config).build().await.unwrap_err();
        assert!(err.is_connection_error());
    }
}
