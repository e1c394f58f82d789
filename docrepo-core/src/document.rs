//! Core traits and helpers for document representation and typed projection.
//!
//! Repositories speak [`bson::Document`], an ordered map of field names to
//! dynamically typed [`Bson`] values. Types implementing [`Model`] can be
//! projected to and from that representation through serde, which is how typed
//! repositories encode their inputs and decode their results.

use bson::{
    Bson, Document,
    de::deserialize_from_document,
    oid::ObjectId,
    ser::serialize_to_document,
};
use serde::{Deserialize, Serialize};
use serde_json::{Value, from_value, to_value};

use crate::error::{RepositoryError, RepositoryResult};

/// Name of the primary key field.
pub const ID_FIELD: &str = "_id";

/// A typed document stored in a named collection.
///
/// The identifier is conventionally mapped onto `_id` and left out of the
/// serialized form until the store assigns one:
///
/// ```ignore
/// use docrepo::document::Model;
/// use bson::oid::ObjectId;
/// use serde::{Serialize, Deserialize};
///
/// #[derive(Debug, Clone, Serialize, Deserialize)]
/// pub struct User {
///     #[serde(rename = "_id", skip_serializing_if = "Option::is_none")]
///     pub id: Option<ObjectId>,
///     pub username: String,
/// }
///
/// impl Model for User {
///     fn collection_name() -> &'static str {
///         "users"
///     }
/// }
/// ```
pub trait Model: Serialize + for<'de> Deserialize<'de> + Send + Sync + 'static {
    /// Returns the name of the collection this model lives in.
    fn collection_name() -> &'static str;
}

/// Extension trait providing conversions between models and their document or
/// JSON representations.
///
/// This trait is automatically implemented for all types that implement [`Model`].
pub trait ModelExt: Model {
    /// Converts this model to a BSON document.
    ///
    /// # Errors
    ///
    /// Returns an error if serialization fails or the model does not serialize
    /// to a document (e.g. a newtype around a string).
    fn to_document(&self) -> RepositoryResult<Document>;

    /// Creates a model from a BSON document.
    fn from_document(document: Document) -> RepositoryResult<Self>;

    /// Converts this model to a JSON value.
    fn to_json(&self) -> RepositoryResult<Value>;

    /// Creates a model from a JSON value.
    fn from_json(value: Value) -> RepositoryResult<Self>;
}

impl<M: Model> ModelExt for M {
    fn to_document(&self) -> RepositoryResult<Document> {
        Ok(serialize_to_document(self)?)
    }

    fn from_document(document: Document) -> RepositoryResult<Self> {
        Ok(deserialize_from_document(document)?)
    }

    fn to_json(&self) -> RepositoryResult<Value> {
        Ok(to_value(self)?)
    }

    fn from_json(value: Value) -> RepositoryResult<Self> {
        Ok(from_value(value)?)
    }
}

/// Parses a 24 character hexadecimal string into an [`ObjectId`].
///
/// # Errors
///
/// Returns [`RepositoryError::InvalidIdFormat`] for any other input.
pub fn parse_object_id(hex: &str) -> RepositoryResult<ObjectId> {
    ObjectId::parse_str(hex)
        .map_err(|e| RepositoryError::InvalidIdFormat(format!("{hex:?}: {e}")))
}

/// Returns the `_id` of a document when it holds an [`ObjectId`].
pub fn object_id_of(document: &Document) -> Option<ObjectId> {
    match document.get(ID_FIELD) {
        Some(Bson::ObjectId(id)) => Some(*id),
        _ => None,
    }
}
