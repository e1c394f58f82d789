//! In-memory storage implementation for repositories.
//!
//! Documents are kept per namespace in insertion order behind an async-aware
//! read-write lock. Filters and update specifications are evaluated in process
//! by [`crate::evaluator`] and [`crate::update`].

use std::{collections::HashMap, sync::Arc};

use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use mea::rwlock::RwLock;
use tracing::debug;

use docrepo_core::{
    backend::{Namespace, StoreBackend, StoreBackendBuilder, UpdateOutcome},
    document::ID_FIELD,
    error::{RepositoryError, RepositoryResult},
};

use crate::{
    evaluator::DocumentEvaluator,
    update::{apply_update, seed_from_filter},
};

type Collection = Vec<Document>;
type StoreMap = HashMap<Namespace, Collection>;

/// Thread-safe in-memory document storage backend.
///
/// # Thread Safety
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, allowing
/// it to be safely shared across async tasks. Multiple clones of the same instance
/// share the same underlying data.
///
/// # Performance
///
/// Queries scan every document in the collection; there are no indexes. The
/// only uniqueness constraint enforced is the one on `_id`.
///
/// # Example
///
/// ```ignore
/// use docrepo_memory::InMemoryStore;
/// use docrepo::backend::{Namespace, StoreBackend};
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///     let users = Namespace::new("mongolang", "users");
///
///     let id = store.insert_one(&users, doc! { "username": "samuel" }).await?;
///     let found = store.find_one(&users, doc! { "_id": id }).await?;
///     assert!(found.is_some());
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    /// namespace -> documents in insertion order
    store: Arc<RwLock<StoreMap>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory document store.
    pub fn new() -> Self {
        Self {
            store: Arc::new(RwLock::new(StoreMap::new())),
        }
    }

    /// Creates a builder for constructing an `InMemoryStore`.
    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Assigns a fresh ObjectId when the document has no `_id`, and returns the
    /// document's `_id`.
    fn ensure_id(document: &mut Document) -> Bson {
        match document.get(ID_FIELD) {
            Some(id) => id.clone(),
            None => {
                let id = Bson::ObjectId(ObjectId::new());
                document.insert(ID_FIELD, id.clone());
                id
            }
        }
    }

    fn contains_id(collection: &Collection, id: &Bson) -> bool {
        collection.iter().any(|doc| doc.get(ID_FIELD) == Some(id))
    }

    fn duplicate_key(namespace: &Namespace, id: &Bson) -> RepositoryError {
        RepositoryError::DuplicateKey(format!(
            "E11000 duplicate key error collection: {namespace} index: _id_ dup key: {{ _id: {id} }}"
        ))
    }

    /// Positions of the documents matching the filter, at most `limit` of them.
    fn matching_positions(collection: &Collection, filter: &Document, limit: usize) -> RepositoryResult<Vec<usize>> {
        let mut positions = Vec::new();

        for (position, document) in collection.iter().enumerate() {
            if positions.len() == limit {
                break;
            }

            if DocumentEvaluator::new(document).evaluate(filter)? {
                positions.push(position);
            }
        }

        Ok(positions)
    }

    /// Applies the update to every listed position. Nothing is written unless
    /// every document updates cleanly.
    fn update_positions(collection: &mut Collection, positions: &[usize], update: &Document) -> RepositoryResult<u64> {
        let mut updated = Vec::with_capacity(positions.len());

        for &position in positions {
            updated.push((position, apply_update(&collection[position], update)?));
        }

        let mut modified = 0;

        for (position, document) in updated {
            if collection[position] != document {
                collection[position] = document;
                modified += 1;
            }
        }

        Ok(modified)
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    async fn find_one(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<Option<Document>> {
        let store = self.store.read().await;
        let Some(collection) = store.get(namespace) else {
            return Ok(None);
        };

        Ok(
            DocumentEvaluator::filter_documents(collection, &filter)?
                .into_iter()
                .next()
                .cloned()
        )
    }

    async fn find(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<Vec<Document>> {
        let store = self.store.read().await;
        let Some(collection) = store.get(namespace) else {
            return Ok(vec![]);
        };

        Ok(
            DocumentEvaluator::filter_documents(collection, &filter)?
                .into_iter()
                .cloned()
                .collect()
        )
    }

    async fn count(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        let store = self.store.read().await;
        let Some(collection) = store.get(namespace) else {
            return Ok(0);
        };

        Ok(DocumentEvaluator::filter_documents(collection, &filter)?.len() as u64)
    }

    async fn insert_one(&self, namespace: &Namespace, mut document: Document) -> RepositoryResult<Bson> {
        let mut store = self.store.write().await;
        let collection = store.entry(namespace.clone()).or_default();
        let id = Self::ensure_id(&mut document);

        if Self::contains_id(collection, &id) {
            return Err(Self::duplicate_key(namespace, &id));
        }

        debug!(%namespace, %id, "inserted document");
        collection.push(document);

        Ok(id)
    }

    /// Ordered batches are validated before anything is written, so a batch
    /// that would hit a duplicate `_id` inserts nothing. Unordered batches
    /// insert every valid document and report the first failure afterwards.
    async fn insert_many(
        &self,
        namespace: &Namespace,
        documents: Vec<Document>,
        ordered: bool,
    ) -> RepositoryResult<Vec<Bson>> {
        let mut store = self.store.write().await;
        let collection = store.entry(namespace.clone()).or_default();

        let mut batch = Vec::with_capacity(documents.len());
        let mut ids = Vec::with_capacity(documents.len());
        let mut failure = None;

        for mut document in documents {
            let id = Self::ensure_id(&mut document);

            if Self::contains_id(collection, &id) || ids.contains(&id) {
                if ordered {
                    return Err(Self::duplicate_key(namespace, &id));
                }
                failure.get_or_insert_with(|| Self::duplicate_key(namespace, &id));
                continue;
            }

            ids.push(id);
            batch.push(document);
        }

        debug!(%namespace, count = batch.len(), "inserted documents");
        collection.extend(batch);

        match failure {
            Some(err) => Err(err),
            None => Ok(ids),
        }
    }

    async fn update_one(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
        upsert: bool,
    ) -> RepositoryResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let collection = store.entry(namespace.clone()).or_default();
        let positions = Self::matching_positions(collection, &filter, 1)?;

        if !positions.is_empty() {
            let modified = Self::update_positions(collection, &positions, &update)?;

            return Ok(UpdateOutcome {
                matched: 1,
                modified,
                upserted_id: None,
            });
        }

        if !upsert {
            return Ok(UpdateOutcome::default());
        }

        let mut document = apply_update(&seed_from_filter(&filter)?, &update)?;
        let id = Self::ensure_id(&mut document);

        if Self::contains_id(collection, &id) {
            return Err(Self::duplicate_key(namespace, &id));
        }

        debug!(%namespace, %id, "upserted document");
        collection.push(document);

        Ok(UpdateOutcome {
            matched: 0,
            modified: 0,
            upserted_id: Some(id),
        })
    }

    async fn update_many(
        &self,
        namespace: &Namespace,
        filter: Document,
        update: Document,
    ) -> RepositoryResult<UpdateOutcome> {
        let mut store = self.store.write().await;
        let Some(collection) = store.get_mut(namespace) else {
            return Ok(UpdateOutcome::default());
        };

        let positions = Self::matching_positions(collection, &filter, usize::MAX)?;
        let modified = Self::update_positions(collection, &positions, &update)?;

        Ok(UpdateOutcome {
            matched: positions.len() as u64,
            modified,
            upserted_id: None,
        })
    }

    async fn delete_one(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection) = store.get_mut(namespace) else {
            return Ok(0);
        };

        match Self::matching_positions(collection, &filter, 1)?.first() {
            Some(&position) => {
                collection.remove(position);
                Ok(1)
            }
            None => Ok(0),
        }
    }

    async fn delete_many(&self, namespace: &Namespace, filter: Document) -> RepositoryResult<u64> {
        let mut store = self.store.write().await;
        let Some(collection) = store.get_mut(namespace) else {
            return Ok(0);
        };

        let positions = Self::matching_positions(collection, &filter, usize::MAX)?;

        for &position in positions.iter().rev() {
            collection.remove(position);
        }

        Ok(positions.len() as u64)
    }

    async fn ping(&self) -> RepositoryResult<()> {
        Ok(())
    }
}

/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    /// Builds and returns a new [`InMemoryStore`] instance.
    ///
    /// This always succeeds and returns a freshly initialized store.
    async fn build(self) -> RepositoryResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::doc;
    use pretty_assertions::assert_eq;

    fn users() -> Namespace {
        Namespace::new("mongolang", "users")
    }

    #[tokio::test]
    async fn test_insert_assigns_object_id() {
        let store = InMemoryStore::new();
        let id = store.insert_one(&users(), doc! { "username": "samuel" }).await.unwrap();

        assert!(matches!(id, Bson::ObjectId(_)));

        let found = store.find_one(&users(), doc! { "_id": id.clone() }).await.unwrap().unwrap();
        assert_eq!(found, doc! { "username": "samuel", "_id": id });
    }

    #[tokio::test]
    async fn test_insert_duplicate_id_fails() {
        let store = InMemoryStore::new();
        let id = ObjectId::new();

        store.insert_one(&users(), doc! { "_id": id }).await.unwrap();
        let err = store.insert_one(&users(), doc! { "_id": id }).await.unwrap_err();

        assert!(err.is_duplicate_key());
        assert!(err.to_string().contains("E11000"));
    }

    #[tokio::test]
    async fn test_namespaces_are_isolated() {
        let store = InMemoryStore::new();
        let other = Namespace::new("other", "users");

        store.insert_one(&users(), doc! { "username": "samuel" }).await.unwrap();

        assert_eq!(store.count(&users(), doc! {}).await.unwrap(), 1);
        assert_eq!(store.count(&other, doc! {}).await.unwrap(), 0);
        assert!(store.find(&other, doc! {}).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_ordered_insert_many_is_all_or_nothing() {
        let store = InMemoryStore::new();
        let id = ObjectId::new();
        let batch = vec![doc! { "username": "a" }, doc! { "_id": id }, doc! { "_id": id }];

        let err = store.insert_many(&users(), batch, true).await.unwrap_err();

        assert!(err.is_duplicate_key());
        assert_eq!(store.count(&users(), doc! {}).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn test_unordered_insert_many_keeps_valid_documents() {
        let store = InMemoryStore::new();
        let id = ObjectId::new();
        let batch = vec![doc! { "_id": id }, doc! { "_id": id }, doc! { "username": "b" }];

        let err = store.insert_many(&users(), batch, false).await.unwrap_err();

        assert!(err.is_duplicate_key());
        assert_eq!(store.count(&users(), doc! {}).await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_insert_many_returns_ids_in_order() {
        let store = InMemoryStore::new();
        let first = ObjectId::new();
        let batch = vec![doc! { "_id": first }, doc! { "username": "b" }];

        let ids = store.insert_many(&users(), batch, true).await.unwrap();

        assert_eq!(ids.len(), 2);
        assert_eq!(ids[0], Bson::ObjectId(first));

        let stored = store.find(&users(), doc! {}).await.unwrap();
        assert_eq!(stored[1].get(ID_FIELD), Some(&ids[1]));
    }

    #[tokio::test]
    async fn test_update_one_reports_counts() {
        let store = InMemoryStore::new();
        store.insert_one(&users(), doc! { "username": "kamuel" }).await.unwrap();

        let outcome = store
            .update_one(&users(), doc! { "username": "kamuel" }, doc! { "$set": { "age": 30 } }, false)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 1, upserted_id: None });

        let outcome = store
            .update_one(&users(), doc! { "username": "kamuel" }, doc! { "$set": { "age": 30 } }, false)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome { matched: 1, modified: 0, upserted_id: None });

        let outcome = store
            .update_one(&users(), doc! { "username": "nobody" }, doc! { "$set": { "age": 30 } }, false)
            .await
            .unwrap();
        assert_eq!(outcome, UpdateOutcome::default());
    }

    #[tokio::test]
    async fn test_upsert_seeds_from_filter() {
        let store = InMemoryStore::new();

        let outcome = store
            .update_one(&users(), doc! { "username": "esnart" }, doc! { "$push": { "phone": "0955404864" } }, true)
            .await
            .unwrap();

        let id = outcome.upserted_id.unwrap();
        let stored = store.find_one(&users(), doc! { "_id": id.clone() }).await.unwrap().unwrap();

        assert_eq!(stored.get_str("username").unwrap(), "esnart");
        assert_eq!(stored.get_array("phone").unwrap(), &vec![Bson::from("0955404864")]);
    }

    #[tokio::test]
    async fn test_failed_update_many_writes_nothing() {
        let store = InMemoryStore::new();
        store.insert_one(&users(), doc! { "n": 1 }).await.unwrap();
        store.insert_one(&users(), doc! { "n": "two" }).await.unwrap();

        let err = store
            .update_many(&users(), doc! {}, doc! { "$inc": { "n": 1 } })
            .await
            .unwrap_err();
        assert!(matches!(err, RepositoryError::InvalidDocument(_)));

        assert_eq!(store.count(&users(), doc! { "n": 1 }).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_delete_keeps_insertion_order() {
        let store = InMemoryStore::new();

        for n in 0..5 {
            store.insert_one(&users(), doc! { "n": n }).await.unwrap();
        }

        assert_eq!(store.delete_many(&users(), doc! { "n": { "$in": [1, 3] } }).await.unwrap(), 2);
        assert_eq!(store.delete_one(&users(), doc! { "n": 4 }).await.unwrap(), 1);
        assert_eq!(store.delete_one(&users(), doc! { "n": 4 }).await.unwrap(), 0);

        let remaining = store
            .find(&users(), doc! {})
            .await
            .unwrap()
            .iter()
            .map(|doc| doc.get_i32("n").unwrap())
            .collect::<Vec<_>>();
        assert_eq!(remaining, vec![0, 2]);
    }
}
