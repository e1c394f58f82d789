//! Filter and update document construction.
//!
//! Filters and update specifications are plain [`Document`]s, so anything the
//! engine understands can be passed straight through. The [`Filter`] and
//! [`Update`] helpers cover the common shapes:
//!
//! ```ignore
//! use docrepo::query::{Filter, Update};
//!
//! let filter = Filter::and([
//!     Filter::eq("username", "esnart"),
//!     Filter::not_exists("deletedAt"),
//! ]);
//!
//! let update = Update::combine([
//!     Update::set("address.road", "Great East"),
//!     Update::push("phone", "0955404864"),
//! ]);
//! ```

use bson::{Bson, Document, doc, oid::ObjectId};

use crate::document::ID_FIELD;

/// Field stamped by soft deletes.
pub const DELETED_AT_FIELD: &str = "deletedAt";

/// Helper struct for constructing filter documents.
pub struct Filter;

impl Filter {
    /// Matches every document.
    pub fn all() -> Document {
        doc! {}
    }

    /// Matches documents where the field equals the value. For array fields,
    /// any element may match.
    pub fn eq(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        let (field, value): (String, Bson) = (field.into(), value.into());
        let mut filter = Document::new();
        filter.insert(field, value);
        filter
    }

    /// Matches documents where the field does not equal the value.
    pub fn ne(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$ne", value)
    }

    /// Matches documents where the field is greater than the value.
    pub fn gt(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$gt", value)
    }

    /// Matches documents where the field is greater than or equal to the value.
    pub fn gte(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$gte", value)
    }

    /// Matches documents where the field is less than the value.
    pub fn lt(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$lt", value)
    }

    /// Matches documents where the field is less than or equal to the value.
    pub fn lte(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator(field, "$lte", value)
    }

    /// Matches documents where the field is a member of the given set.
    pub fn any_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        Self::operator(field, "$in", Self::array(values))
    }

    /// Matches documents where the field is not a member of the given set.
    pub fn none_of<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        Self::operator(field, "$nin", Self::array(values))
    }

    /// Matches documents where the field is present.
    pub fn exists(field: impl Into<String>) -> Document {
        Self::operator(field, "$exists", true)
    }

    /// Matches documents where the field is absent.
    pub fn not_exists(field: impl Into<String>) -> Document {
        Self::operator(field, "$exists", false)
    }

    /// Matches the document with the given `_id`.
    pub fn by_id(id: ObjectId) -> Document {
        doc! { ID_FIELD: id }
    }

    /// Matches the documents whose `_id` is one of the given values.
    pub fn by_ids(ids: impl IntoIterator<Item = Bson>) -> Document {
        Self::any_of(ID_FIELD, ids)
    }

    /// Matches documents that have not been soft deleted.
    pub fn active() -> Document {
        Self::not_exists(DELETED_AT_FIELD)
    }

    /// Combines filters such that all must match.
    pub fn and(filters: impl IntoIterator<Item = Document>) -> Document {
        doc! { "$and": filters.into_iter().collect::<Vec<_>>() }
    }

    /// Combines filters such that any can match.
    pub fn or(filters: impl IntoIterator<Item = Document>) -> Document {
        doc! { "$or": filters.into_iter().collect::<Vec<_>>() }
    }

    fn operator(field: impl Into<String>, op: &str, value: impl Into<Bson>) -> Document {
        let value: Bson = value.into();
        let mut condition = Document::new();
        condition.insert(op, value);
        Self::eq(field, condition)
    }

    fn array<V: Into<Bson>>(values: impl IntoIterator<Item = V>) -> Bson {
        Bson::Array(values.into_iter().map(Into::into).collect())
    }
}

/// Helper struct for constructing update specifications.
///
/// Each constructor returns a single-operator document. Use [`Update::combine`]
/// to apply several in one round-trip.
pub struct Update;

impl Update {
    /// Assigns a value to a field, creating it (and missing parents) if needed.
    pub fn set(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator("$set", field, value)
    }

    /// Assigns every field of the given document.
    pub fn set_all(fields: Document) -> Document {
        doc! { "$set": fields }
    }

    /// Removes a field. Unsetting an array element leaves a `null` in its slot.
    pub fn unset(field: impl Into<String>) -> Document {
        Self::operator("$unset", field, "")
    }

    /// Increments a numeric field.
    pub fn inc(field: impl Into<String>, by: impl Into<Bson>) -> Document {
        Self::operator("$inc", field, by)
    }

    /// Appends a single value to an array field.
    pub fn push(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator("$push", field, value)
    }

    /// Appends each of the given values to an array field.
    pub fn push_each<V: Into<Bson>>(field: impl Into<String>, values: impl IntoIterator<Item = V>) -> Document {
        let values = values.into_iter().map(Into::into).collect::<Vec<Bson>>();
        Self::operator("$push", field, doc! { "$each": values })
    }

    /// Removes every element equal to the value from an array field.
    pub fn pull(field: impl Into<String>, value: impl Into<Bson>) -> Document {
        Self::operator("$pull", field, value)
    }

    /// Merges several update specifications into one. Fields under the same
    /// operator are merged; a later field replaces an earlier one.
    pub fn combine(specs: impl IntoIterator<Item = Document>) -> Document {
        let mut combined = Document::new();

        for spec in specs {
            for (op, fields) in spec {
                let fields = match (combined.get_mut(&op), fields) {
                    (Some(Bson::Document(existing)), Bson::Document(fields)) => {
                        existing.extend(fields);
                        continue;
                    }
                    (_, fields) => fields,
                };
                combined.insert(op, fields);
            }
        }

        combined
    }

    /// Returns true when every top-level key is an update operator.
    pub fn is_operator_document(spec: &Document) -> bool {
        !spec.is_empty() && spec.keys().all(|key| key.starts_with('$'))
    }

    fn operator(op: &str, field: impl Into<String>, value: impl Into<Bson>) -> Document {
        doc! { op: Filter::eq(field, value) }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    #[test]
    fn test_filter_comparisons() {
        assert_eq!(Filter::eq("username", "esnart"), doc! { "username": "esnart" });
        assert_eq!(Filter::gte("age", 18), doc! { "age": { "$gte": 18 } });
        assert_eq!(Filter::ne("done", true), doc! { "done": { "$ne": true } });
        assert_eq!(Filter::all(), doc! {});
    }

    #[test]
    fn test_filter_membership() {
        assert_eq!(
            Filter::any_of("username", ["naile", "kamuel"]),
            doc! { "username": { "$in": ["naile", "kamuel"] } }
        );

        let (first, second) = (ObjectId::new(), ObjectId::new());
        assert_eq!(
            Filter::by_ids([Bson::ObjectId(first), Bson::ObjectId(second)]),
            doc! { "_id": { "$in": [first, second] } }
        );
    }

    #[test]
    fn test_filter_logical() {
        let filter = Filter::and([Filter::eq("a", 1), Filter::active()]);
        assert_eq!(filter, doc! { "$and": [{ "a": 1 }, { "deletedAt": { "$exists": false } }] });

        let filter = Filter::or([Filter::eq("a", 1), Filter::eq("b", 2)]);
        assert_eq!(filter, doc! { "$or": [{ "a": 1 }, { "b": 2 }] });
    }

    #[test]
    fn test_update_operators() {
        assert_eq!(Update::set("todos.2.done", true), doc! { "$set": { "todos.2.done": true } });
        assert_eq!(Update::unset("todos.1"), doc! { "$unset": { "todos.1": "" } });
        assert_eq!(
            Update::push_each("phone", ["0955404864", "0973827172"]),
            doc! { "$push": { "phone": { "$each": ["0955404864", "0973827172"] } } }
        );
        assert_eq!(Update::pull("todos", Bson::Null), doc! { "$pull": { "todos": null } });
    }

    #[test]
    fn test_update_combine_merges_same_operator() {
        let spec = Update::combine([
            Update::set("a", 1),
            Update::set("b", 2),
            Update::push("c", 3),
            Update::set("a", 4),
        ]);

        assert_eq!(spec, doc! { "$set": { "a": 4, "b": 2 }, "$push": { "c": 3 } });
    }

    #[test]
    fn test_is_operator_document() {
        assert!(Update::is_operator_document(&Update::set("a", 1)));
        assert!(!Update::is_operator_document(&doc! { "a": 1 }));
        assert!(!Update::is_operator_document(&doc! {}));
    }
}
