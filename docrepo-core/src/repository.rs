//! Per-collection CRUD helpers.
//!
//! A [`Repository`] binds a [`StoreBackend`] to one [`Namespace`] and turns the
//! backend's primitives into the operations applications actually call: reads
//! that fail with [`RepositoryError::NotFound`] on an empty result, and writes
//! that re-read and return the post-mutation state.
//!
//! Every public operation runs under the repository's operation timeout
//! (20 seconds unless overridden with [`Repository::with_timeout`]). The timeout
//! bounds the whole operation, follow-up reads included.
//!
//! # Example
//!
//! ```ignore
//! use docrepo::{Repository, query::{Filter, Update}};
//! use docrepo::memory::InMemoryStore;
//! use bson::doc;
//!
//! let store = InMemoryStore::new();
//! let users = Repository::new(&store, "mongolang", "users");
//!
//! let user = users.insert_one(doc! { "username": "esnart" }).await?;
//! let user = users
//!     .update(Filter::eq("username", "esnart"), Update::push("phone", "0955404864"))
//!     .await?;
//! ```

use std::{fmt, future::Future, marker::PhantomData, time::Duration};

use bson::{Bson, Document, oid::ObjectId};
use chrono::Utc;
use tracing::{debug, warn};

use crate::{
    backend::{Namespace, StoreBackend},
    document::{ID_FIELD, Model, ModelExt, parse_object_id},
    error::{RepositoryError, RepositoryResult},
    query::{DELETED_AT_FIELD, Filter, Update},
};

/// Default bound applied to every repository operation.
pub const DEFAULT_OPERATION_TIMEOUT: Duration = Duration::from_secs(20);

/// CRUD operations over a single collection.
///
/// The repository holds only a backend handle, its namespace and the operation
/// timeout. Pass `&store` or an `Arc` of the store to share one client between
/// several repositories.
#[derive(Debug, Clone)]
pub struct Repository<B: StoreBackend> {
    backend: B,
    namespace: Namespace,
    timeout: Duration,
}

impl<B: StoreBackend> Repository<B> {
    pub fn new(backend: B, database: impl Into<String>, collection: impl Into<String>) -> Self {
        Self {
            backend,
            namespace: Namespace::new(database, collection),
            timeout: DEFAULT_OPERATION_TIMEOUT,
        }
    }

    /// Overrides the per-operation timeout.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    pub fn namespace(&self) -> &Namespace {
        &self.namespace
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    /// Finds the document whose `_id` is the given 24 character hex string.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::InvalidIdFormat`] when the string is not a valid object
    /// id, [`RepositoryError::NotFound`] when no document has that id.
    pub async fn find_by_id(&self, id: &str) -> RepositoryResult<Document> {
        let id = parse_object_id(id)?;
        self.find_by_object_id(id).await
    }

    /// Finds the document with the given `_id`.
    pub async fn find_by_object_id(&self, id: ObjectId) -> RepositoryResult<Document> {
        self.find_one(Filter::by_id(id)).await
    }

    /// Finds the first document whose field equals the value.
    pub async fn find_by_field(&self, field: &str, value: impl Into<Bson>) -> RepositoryResult<Document> {
        self.find_one(Filter::eq(field, value)).await
    }

    /// Finds the first document matching the filter.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] when nothing matches.
    pub async fn find_one(&self, filter: Document) -> RepositoryResult<Document> {
        self.bounded(async {
            debug!(namespace = %self.namespace, %filter, "find_one");
            self.fetch_one(filter).await
        })
        .await
    }

    /// Returns every document matching the filter, possibly none.
    pub async fn find_all(&self, filter: Document) -> RepositoryResult<Vec<Document>> {
        self.bounded(async {
            debug!(namespace = %self.namespace, %filter, "find_all");
            self.backend.find(&self.namespace, filter).await
        })
        .await
    }

    /// Like [`Repository::find_all`], skipping soft deleted documents.
    pub async fn find_all_active(&self, filter: Document) -> RepositoryResult<Vec<Document>> {
        let filter = if filter.is_empty() {
            Filter::active()
        } else {
            Filter::and([filter, Filter::active()])
        };

        self.find_all(filter).await
    }

    /// Counts the documents matching the filter.
    pub async fn count(&self, filter: Document) -> RepositoryResult<u64> {
        self.bounded(async {
            debug!(namespace = %self.namespace, %filter, "count");
            self.backend.count(&self.namespace, filter).await
        })
        .await
    }

    /// Inserts a document and returns it as stored, `_id` included.
    ///
    /// # Errors
    ///
    /// Insert failures such as [`RepositoryError::DuplicateKey`] propagate.
    pub async fn insert_one(&self, document: Document) -> RepositoryResult<Document> {
        self.bounded(async {
            debug!(namespace = %self.namespace, "insert_one");
            let id = self.backend.insert_one(&self.namespace, document).await?;
            self.reread(id).await
        })
        .await
    }

    /// Inserts a batch of documents in order and returns them as stored, in
    /// insertion order.
    ///
    /// The batch is ordered: the first failing document aborts the rest.
    pub async fn insert_many(&self, documents: Vec<Document>) -> RepositoryResult<Vec<Document>> {
        if documents.is_empty() {
            return Ok(Vec::new());
        }

        self.bounded(async {
            debug!(namespace = %self.namespace, count = documents.len(), "insert_many");
            let ids = self.backend.insert_many(&self.namespace, documents, true).await?;
            let mut inserted = self
                .backend
                .find(&self.namespace, Filter::by_ids(ids.iter().cloned()))
                .await?;

            let mut ordered = Vec::with_capacity(ids.len());

            for id in ids {
                match inserted.iter().position(|doc| doc.get(ID_FIELD) == Some(&id)) {
                    Some(position) => ordered.push(inserted.swap_remove(position)),
                    None => warn!(namespace = %self.namespace, %id, "inserted document vanished before re-read"),
                }
            }

            Ok(ordered)
        })
        .await
    }

    /// Applies an update specification to the first document matching the
    /// filter and returns the updated document.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::NotFound`] when nothing matches,
    /// [`RepositoryError::InvalidDocument`] when the specification is not made
    /// of update operators.
    pub async fn update(&self, filter: Document, update: Document) -> RepositoryResult<Document> {
        Self::validate_update(&update)?;

        self.bounded(async {
            debug!(namespace = %self.namespace, %filter, %update, "update");
            let id = self
                .resolve_id(&filter)
                .await?
                .ok_or_else(|| self.not_found(&filter))?;

            self.update_resolved(id, update).await
        })
        .await
    }

    /// Like [`Repository::update`], targeting the document with the given hex id.
    pub async fn update_by_id(&self, id: &str, update: Document) -> RepositoryResult<Document> {
        let id = parse_object_id(id)?;
        self.update(Filter::by_id(id), update).await
    }

    /// Applies an update specification to the first document matching the
    /// filter, inserting a new document when nothing matches. Returns the
    /// document as it is after the write.
    pub async fn upsert(&self, filter: Document, update: Document) -> RepositoryResult<Document> {
        Self::validate_update(&update)?;

        self.bounded(async {
            debug!(namespace = %self.namespace, %filter, %update, "upsert");

            // A pinned `_id` says nothing about whether the document exists yet.
            if let Some(id) = self.lookup_id(&filter).await? {
                return self.update_resolved(id, update).await;
            }

            let outcome = self
                .backend
                .update_one(&self.namespace, filter.clone(), update, true)
                .await?;

            match outcome.upserted_id {
                Some(id) => self.reread(id).await,
                // A concurrent writer created a match first and the update landed on it.
                None => self.fetch_one(filter).await,
            }
        })
        .await
    }

    /// Applies an update specification to every matching document and returns
    /// the number of documents matched.
    pub async fn update_many(&self, filter: Document, update: Document) -> RepositoryResult<u64> {
        Self::validate_update(&update)?;

        self.bounded(async {
            debug!(namespace = %self.namespace, %filter, %update, "update_many");
            let outcome = self.backend.update_many(&self.namespace, filter, update).await?;
            Ok(outcome.matched)
        })
        .await
    }

    /// Marks the first matching document as deleted by stamping `deletedAt`
    /// with the current time, and returns it.
    pub async fn soft_delete(&self, filter: Document) -> RepositoryResult<Document> {
        let now = bson::DateTime::from_chrono(Utc::now());
        self.update(filter, Update::set(DELETED_AT_FIELD, now)).await
    }

    /// Deletes the first matching document. Returns 0 or 1.
    pub async fn delete_one(&self, filter: Document) -> RepositoryResult<u64> {
        self.bounded(async {
            debug!(namespace = %self.namespace, %filter, "delete_one");
            self.backend.delete_one(&self.namespace, filter).await
        })
        .await
    }

    /// Deletes the document with the given hex id. Returns 0 or 1.
    pub async fn delete_by_id(&self, id: &str) -> RepositoryResult<u64> {
        let id = parse_object_id(id)?;
        self.delete_one(Filter::by_id(id)).await
    }

    /// Deletes every matching document and returns how many were removed.
    pub async fn delete_many(&self, filter: Document) -> RepositoryResult<u64> {
        self.bounded(async {
            debug!(namespace = %self.namespace, %filter, "delete_many");
            self.backend.delete_many(&self.namespace, filter).await
        })
        .await
    }

    async fn bounded<T>(&self, operation: impl Future<Output = RepositoryResult<T>>) -> RepositoryResult<T> {
        tokio::time::timeout(self.timeout, operation)
            .await
            .map_err(|_| RepositoryError::Timeout(self.timeout))?
    }

    async fn fetch_one(&self, filter: Document) -> RepositoryResult<Document> {
        let found = self.backend.find_one(&self.namespace, filter.clone()).await?;
        found.ok_or_else(|| self.not_found(&filter))
    }

    async fn reread(&self, id: Bson) -> RepositoryResult<Document> {
        let mut filter = Document::new();
        filter.insert(ID_FIELD, id);

        self.fetch_one(filter).await.inspect_err(|e| {
            if e.is_not_found() {
                warn!(namespace = %self.namespace, "written document vanished before re-read");
            }
        })
    }

    /// Returns the `_id` of the document an update on this filter would target.
    /// A filter that consists of an `_id` equality alone is answered without a
    /// round-trip.
    async fn resolve_id(&self, filter: &Document) -> RepositoryResult<Option<Bson>> {
        if filter.len() == 1 {
            match filter.get(ID_FIELD) {
                Some(Bson::Document(_)) | None => {}
                Some(id) => return Ok(Some(id.clone())),
            }
        }

        self.lookup_id(filter).await
    }

    /// Returns the `_id` of the first document matching the filter.
    async fn lookup_id(&self, filter: &Document) -> RepositoryResult<Option<Bson>> {
        let found = self.backend.find_one(&self.namespace, filter.clone()).await?;
        Ok(found.and_then(|mut doc| doc.remove(ID_FIELD)))
    }

    async fn update_resolved(&self, id: Bson, update: Document) -> RepositoryResult<Document> {
        let mut filter = Document::new();
        filter.insert(ID_FIELD, id.clone());

        let outcome = self
            .backend
            .update_one(&self.namespace, filter.clone(), update, false)
            .await?;

        if outcome.matched == 0 {
            return Err(self.not_found(&filter));
        }

        self.reread(id).await
    }

    fn validate_update(update: &Document) -> RepositoryResult<()> {
        if Update::is_operator_document(update) {
            return Ok(());
        }

        Err(RepositoryError::invalid_document(format!(
            "update specification must only contain operators, got {update}"
        )))
    }

    fn not_found(&self, filter: &Document) -> RepositoryError {
        RepositoryError::not_found(format!("no document in {} matches {filter}", self.namespace))
    }
}

/// A [`Repository`] that encodes inputs from and decodes results into a
/// [`Model`].
pub struct TypedRepository<B: StoreBackend, M: Model> {
    inner: Repository<B>,
    _model: PhantomData<fn() -> M>,
}

impl<B: StoreBackend, M: Model> TypedRepository<B, M> {
    /// Creates a repository bound to `M`'s collection in the given database.
    pub fn new(backend: B, database: impl Into<String>) -> Self {
        Self::from_repository(Repository::new(backend, database, M::collection_name()))
    }

    pub fn from_repository(inner: Repository<B>) -> Self {
        Self {
            inner,
            _model: PhantomData,
        }
    }

    pub fn with_timeout(self, timeout: Duration) -> Self {
        Self::from_repository(self.inner.with_timeout(timeout))
    }

    /// Returns the untyped repository underneath.
    pub fn untyped(&self) -> &Repository<B> {
        &self.inner
    }

    pub async fn find_by_id(&self, id: &str) -> RepositoryResult<M> {
        M::from_document(self.inner.find_by_id(id).await?)
    }

    pub async fn find_by_object_id(&self, id: ObjectId) -> RepositoryResult<M> {
        M::from_document(self.inner.find_by_object_id(id).await?)
    }

    pub async fn find_by_field(&self, field: &str, value: impl Into<Bson>) -> RepositoryResult<M> {
        M::from_document(self.inner.find_by_field(field, value).await?)
    }

    pub async fn find_one(&self, filter: Document) -> RepositoryResult<M> {
        M::from_document(self.inner.find_one(filter).await?)
    }

    /// Returns every matching document decoded as `M`. A single document that
    /// fails to decode fails the whole call.
    pub async fn find_all(&self, filter: Document) -> RepositoryResult<Vec<M>> {
        Self::decode_all(self.inner.find_all(filter).await?)
    }

    pub async fn find_all_active(&self, filter: Document) -> RepositoryResult<Vec<M>> {
        Self::decode_all(self.inner.find_all_active(filter).await?)
    }

    pub async fn count(&self, filter: Document) -> RepositoryResult<u64> {
        self.inner.count(filter).await
    }

    pub async fn insert_one(&self, model: &M) -> RepositoryResult<M> {
        M::from_document(self.inner.insert_one(model.to_document()?).await?)
    }

    pub async fn insert_many(&self, models: &[M]) -> RepositoryResult<Vec<M>> {
        let documents = models
            .iter()
            .map(ModelExt::to_document)
            .collect::<RepositoryResult<Vec<_>>>()?;

        Self::decode_all(self.inner.insert_many(documents).await?)
    }

    pub async fn update(&self, filter: Document, update: Document) -> RepositoryResult<M> {
        M::from_document(self.inner.update(filter, update).await?)
    }

    pub async fn update_by_id(&self, id: &str, update: Document) -> RepositoryResult<M> {
        M::from_document(self.inner.update_by_id(id, update).await?)
    }

    pub async fn upsert(&self, filter: Document, update: Document) -> RepositoryResult<M> {
        M::from_document(self.inner.upsert(filter, update).await?)
    }

    pub async fn update_many(&self, filter: Document, update: Document) -> RepositoryResult<u64> {
        self.inner.update_many(filter, update).await
    }

    pub async fn soft_delete(&self, filter: Document) -> RepositoryResult<M> {
        M::from_document(self.inner.soft_delete(filter).await?)
    }

    pub async fn delete_one(&self, filter: Document) -> RepositoryResult<u64> {
        self.inner.delete_one(filter).await
    }

    pub async fn delete_by_id(&self, id: &str) -> RepositoryResult<u64> {
        self.inner.delete_by_id(id).await
    }

    pub async fn delete_many(&self, filter: Document) -> RepositoryResult<u64> {
        self.inner.delete_many(filter).await
    }

    fn decode_all(documents: Vec<Document>) -> RepositoryResult<Vec<M>> {
        documents
            .into_iter()
            .map(M::from_document)
            .collect()
    }
}

impl<B: StoreBackend, M: Model> fmt::Debug for TypedRepository<B, M> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TypedRepository")
            .field("inner", &self.inner)
            .field("model", &std::any::type_name::<M>())
            .finish()
    }
}
