//! Storage backend abstraction for repositories.
//!
//! A [`StoreBackend`] exposes the handful of engine primitives a repository is
//! built from: single and bulk reads, inserts, updates and deletes, each scoped
//! to a [`Namespace`]. Backends hold the connection (or the data, for the
//! in-memory engine); repositories hold nothing but a backend handle and the
//! namespace they are bound to.
//!
//! # Examples
//!
//! ```ignore
//! use docrepo::backend::{Namespace, StoreBackend};
//! use bson::doc;
//!
//! let users = Namespace::new("mongolang", "users");
//! let id = backend.insert_one(&users, doc! { "username": "emmanuel" }).await?;
//! let found = backend.find_one(&users, doc! { "_id": id }).await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::{Bson, Document};
use std::{fmt, fmt::Debug, sync::Arc};

use crate::error::RepositoryResult;

/// A database and collection pair.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Namespace {
    /// The database name.
    pub database: String,
    /// The collection name.
    pub collection: String,
}

impl Namespace {
    pub fn new(database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            database: database.into(),
            collection: collection.into(),
        }
    }
}

impl fmt::Display for Namespace {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}", self.database, self.collection)
    }
}

/// What an update command reported back.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct UpdateOutcome {
    /// Number of documents that matched the filter.
    pub matched: u64,
    /// Number of documents actually changed.
    pub modified: u64,
    /// The `_id` of the document inserted by an upsert, if one was inserted.
    pub upserted_id: Option<Bson>,
}

/// Abstract interface over a document storage engine.
///
/// # Thread Safety
///
/// Implementations must be `Send + Sync`; one backend handle is shared by every
/// repository created from it and may be called from many tasks at once.
///
/// # Error Handling
///
/// Engine failures are reported as
/// [`RepositoryError::Storage`](crate::error::RepositoryError::Storage), unique
/// key violations as
/// [`RepositoryError::DuplicateKey`](crate::error::RepositoryError::DuplicateKey).
/// Backends never translate an empty result into an error; that is the
/// repository's job.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// Returns the first document matching the filter, if any.
    async fn find_one(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<Option<Document>>;

    /// Returns every document matching the filter.
    ///
    /// Any cursor opened for the query must be released before returning, on
    /// success and on failure.
    async fn find(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<Vec<Document>>;

    /// Counts the documents matching the filter.
    async fn count(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64>;

    /// Inserts a document and returns its `_id`. A document without `_id` is
    /// assigned a fresh ObjectId.
    async fn insert_one(&self, namespace: &Namespace, document: Document) -> RepositoryResult<Bson>;

    /// Inserts documents and returns their `_id`s in input order.
    ///
    /// With `ordered` set, the first failure aborts the remaining inserts.
    async fn insert_many(
        &self,
        namespace: &Namespace,
        documents: Vec<Document>,
        ordered: bool,
    ) -> RepositoryResult<Vec<Bson>>;

    /// Applies an update specification to the first matching document,
    /// inserting one when nothing matches and `upsert` is set.
    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> RepositoryResult<UpdateOutcome>;

    /// Applies an update specification to every matching document.
    async fn update_many(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
    ) -> RepositoryResult<UpdateOutcome>;

    /// Deletes the first matching document and returns the number deleted.
    async fn delete_one(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64>;

    /// Deletes every matching document and returns the number deleted.
    async fn delete_many(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64>;

    /// Verifies the engine is reachable.
    async fn ping(&self) -> RepositoryResult<()>;

    /// Cleanly shuts down the backend, releasing pooled connections.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> RepositoryResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

#[async_trait]
impl<B> StoreBackend for &B
where
    B: StoreBackend,
{
    async fn find_one(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<Option<Document>> {
        (*self).find_one(namespace, filter).await
    }

    async fn find(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<Vec<Document>> {
        (*self).find(namespace, filter).await
    }

    async fn count(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        (*self).count(namespace, filter).await
    }

    async fn insert_one(&self, namespace: &Namespace, document: Document) -> RepositoryResult<Bson> {
        (*self).insert_one(namespace, document).await
    }

    async fn insert_many(
        &self,
        namespace: &Namespace,
        documents: Vec<Document>,
        ordered: bool,
    ) -> RepositoryResult<Vec<Bson>> {
        (*self)
            .insert_many(namespace, documents, ordered)
            .await
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> RepositoryResult<UpdateOutcome> {
        (*self)
            .update_one(namespace, filter, update, upsert)
            .await
    }

    async fn update_many(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
    ) -> RepositoryResult<UpdateOutcome> {
        (*self)
            .update_many(namespace, filter, update)
            .await
    }

    async fn delete_one(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        (*self).delete_one(namespace, filter).await
    }

    async fn delete_many(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        (*self).delete_many(namespace, filter).await
    }

    async fn ping(&self) -> RepositoryResult<()> {
        (*self).ping().await
    }
}

#[async_trait]
impl<B> StoreBackend for Arc<B>
where
    B: StoreBackend,
{
    async fn find_one(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<Option<Document>> {
        (**self).find_one(namespace, filter).await
    }

    async fn find(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<Vec<Document>> {
        (**self).find(namespace, filter).await
    }

    async fn count(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        (**self).count(namespace, filter).await
    }

    async fn insert_one(&self, namespace: &Namespace, document: Document) -> RepositoryResult<Bson> {
        (**self).insert_one(namespace, document).await
    }

    async fn insert_many(
        &self,
        namespace: &Namespace,
        documents: Vec<Document>,
        ordered: bool,
    ) -> RepositoryResult<Vec<Bson>> {
        (**self)
            .insert_many(namespace, documents, ordered)
            .await
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> RepositoryResult<UpdateOutcome> {
        (**self)
            .update_one(namespace, filter, update, upsert)
            .await
    }

    async fn update_many(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
    ) -> RepositoryResult<UpdateOutcome> {
        (**self)
            .update_many(namespace, filter, update)
            .await
    }

    async fn delete_one(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        (**self).delete_one(namespace, filter).await
    }

    async fn delete_many(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        (**self).delete_many(namespace, filter).await
    }

    async fn ping(&self) -> RepositoryResult<()> {
        (**self).ping().await
    }
}

/// Factory trait for creating backend instances.
#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> RepositoryResult<Self::Backend>;
}
