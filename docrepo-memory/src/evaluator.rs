//! Filter evaluation for in-memory document matching.
//!
//! Filters are evaluated with the same semantics the MongoDB server applies for
//! the supported subset: implicit equality that also matches array elements,
//! the comparison and membership operators, `$exists`, `$not`, and the
//! top-level `$and`, `$or` and `$nor` combinators. Field names may be dotted
//! paths; numeric segments index into arrays, other segments fan out over the
//! documents inside an array.

use std::{cmp::Ordering, collections::HashMap};

use bson::{Bson, DateTime, Document, oid::ObjectId};

use docrepo_core::error::{RepositoryError, RepositoryResult};

/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `1`, `1i64` and `1.0` compare
/// equal, as they do on the server.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    /// All integers and floats, normalized to f64
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Anything else, compared structurally
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null | Bson::Undefined => Comparable::Null,
            Bson::Boolean(value) => Comparable::Bool(*value),
            Bson::Int32(value) => Comparable::Number(*value as f64),
            Bson::Int64(value) => Comparable::Number(*value as f64),
            Bson::Double(value) => Comparable::Number(*value),
            Bson::DateTime(value) => Comparable::DateTime(*value),
            Bson::String(value) => Comparable::String(value),
            Bson::ObjectId(value) => Comparable::ObjectId(*value),
            Bson::Array(arr) => Comparable::Array(
                arr
                    .iter()
                    .map(Comparable::from)
                    .collect::<Vec<_>>()
            ),
            Bson::Document(doc) => Comparable::Map(
                doc
                    .iter()
                    .map(|(k, v)| (k.as_str(), Comparable::from(v)))
                    .collect::<HashMap<_, _>>()
            ),
            other => Comparable::Other(other),
        }
    }
}

impl<'a> PartialEq for Comparable<'a> {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Comparable::Null, Comparable::Null) => true,
            (Comparable::Bool(a), Comparable::Bool(b)) => a == b,
            (Comparable::Number(a), Comparable::Number(b)) => a == b,
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a == b,
            (Comparable::String(a), Comparable::String(b)) => a == b,
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a == b,
            (Comparable::Array(a), Comparable::Array(b)) => a == b,
            (Comparable::Map(a), Comparable::Map(b)) => a == b,
            (Comparable::Other(a), Comparable::Other(b)) => a == b,
            _ => false,
        }
    }
}

impl<'a> PartialOrd for Comparable<'a> {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        match (self, other) {
            (Comparable::Bool(a), Comparable::Bool(b)) => a.partial_cmp(b),
            (Comparable::Number(a), Comparable::Number(b)) => a.partial_cmp(b),
            (Comparable::DateTime(a), Comparable::DateTime(b)) => a.partial_cmp(b),
            (Comparable::String(a), Comparable::String(b)) => a.partial_cmp(b),
            (Comparable::ObjectId(a), Comparable::ObjectId(b)) => a.partial_cmp(b),
            _ => None,
        }
    }
}

/// Returns true when the value is a non-empty document made of `$` operators.
pub(crate) fn is_operator_document(value: &Bson) -> bool {
    match value {
        Bson::Document(doc) => !doc.is_empty() && doc.keys().all(|key| key.starts_with('$')),
        _ => false,
    }
}

/// Collects every value reachable through a dotted path.
pub(crate) fn resolve_path<'a>(document: &'a Document, path: &str) -> Vec<&'a Bson> {
    let segments = path.split('.').collect::<Vec<_>>();
    let mut found = Vec::new();

    if let Some((head, rest)) = segments.split_first() {
        if let Some(value) = document.get(*head) {
            collect(value, rest, &mut found);
        }
    }

    found
}

fn collect<'a>(value: &'a Bson, segments: &[&str], found: &mut Vec<&'a Bson>) {
    let Some((head, rest)) = segments.split_first() else {
        found.push(value);
        return;
    };

    match value {
        Bson::Document(doc) => {
            if let Some(child) = doc.get(*head) {
                collect(child, rest, found);
            }
        }
        Bson::Array(items) => {
            if let Some(item) = head.parse::<usize>().ok().and_then(|index| items.get(index)) {
                collect(item, rest, found);
            }

            for item in items.iter().filter(|item| matches!(item, Bson::Document(_))) {
                collect(item, segments, found);
            }
        }
        _ => {}
    }
}

pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Evaluates a filter document against the wrapped document.
    ///
    /// # Errors
    ///
    /// [`RepositoryError::InvalidDocument`] for unsupported or malformed
    /// operators.
    pub fn evaluate(&self, filter: &Document) -> RepositoryResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.all(Self::clauses(key, condition)?)?,
                "$or" => self.any(Self::clauses(key, condition)?)?,
                "$nor" => !self.any(Self::clauses(key, condition)?)?,
                op if op.starts_with('$') => {
                    return Err(RepositoryError::invalid_document(format!(
                        "unsupported top-level query operator {op}"
                    )));
                }
                field => self.field(field, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Returns the documents matching the filter, in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> RepositoryResult<Vec<&'a Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                matched.push(document);
            }
        }

        Ok(matched)
    }

    fn all(&self, clauses: Vec<&Document>) -> RepositoryResult<bool> {
        for clause in clauses {
            if !self.evaluate(clause)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, clauses: Vec<&Document>) -> RepositoryResult<bool> {
        for clause in clauses {
            if self.evaluate(clause)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn clauses<'f>(op: &str, condition: &'f Bson) -> RepositoryResult<Vec<&'f Document>> {
        let invalid = || RepositoryError::invalid_document(format!("{op} expects a non-empty array of documents"));

        match condition {
            Bson::Array(items) if !items.is_empty() => items
                .iter()
                .map(|item| item.as_document().ok_or_else(invalid))
                .collect(),
            _ => Err(invalid()),
        }
    }

    fn field(&self, field: &str, condition: &Bson) -> RepositoryResult<bool> {
        let candidates = resolve_path(self.document, field);

        match condition {
            Bson::Document(operators) if is_operator_document(condition) => {
                Self::operators(&candidates, operators)
            }
            expected => Ok(Self::equals(&candidates, expected)),
        }
    }

    fn operators(candidates: &[&Bson], operators: &Document) -> RepositoryResult<bool> {
        for (op, value) in operators {
            let matched = match op.as_str() {
                "$eq" => Self::equals(candidates, value),
                "$ne" => !Self::equals(candidates, value),
                "$gt" => Self::compare(candidates, value, |o| o == Ordering::Greater),
                "$gte" => Self::compare(candidates, value, |o| o != Ordering::Less),
                "$lt" => Self::compare(candidates, value, |o| o == Ordering::Less),
                "$lte" => Self::compare(candidates, value, |o| o != Ordering::Greater),
                "$in" => Self::member_of(candidates, op, value)?,
                "$nin" => !Self::member_of(candidates, op, value)?,
                "$exists" => candidates.is_empty() != Self::truthy(value),
                "$not" => match value {
                    Bson::Document(inner) if is_operator_document(value) => {
                        !Self::operators(candidates, inner)?
                    }
                    _ => {
                        return Err(RepositoryError::invalid_document(
                            "$not expects a document of operators",
                        ));
                    }
                },
                other => {
                    return Err(RepositoryError::invalid_document(format!(
                        "unsupported query operator {other}"
                    )));
                }
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Equality with array fan-out. A missing field equals `null`.
    fn equals(candidates: &[&Bson], expected: &Bson) -> bool {
        let expected = Comparable::from(expected);

        if candidates.is_empty() {
            return expected == Comparable::Null;
        }

        candidates.iter().any(|candidate| {
            let candidate = Comparable::from(*candidate);

            candidate == expected
                || matches!(&candidate, Comparable::Array(items) if items.contains(&expected))
        })
    }

    fn compare(candidates: &[&Bson], bound: &Bson, accept: impl Fn(Ordering) -> bool) -> bool {
        let bound = Comparable::from(bound);

        candidates.iter().any(|candidate| match Comparable::from(*candidate) {
            Comparable::Array(items) => items
                .iter()
                .any(|item| item.partial_cmp(&bound).is_some_and(&accept)),
            value => value.partial_cmp(&bound).is_some_and(&accept),
        })
    }

    fn member_of(candidates: &[&Bson], op: &str, values: &Bson) -> RepositoryResult<bool> {
        match values {
            Bson::Array(values) => Ok(values.iter().any(|value| Self::equals(candidates, value))),
            _ => Err(RepositoryError::invalid_document(format!("{op} expects an array"))),
        }
    }

    fn truthy(value: &Bson) -> bool {
        match value {
            Bson::Boolean(value) => *value,
            Bson::Int32(value) => *value != 0,
            Bson::Int64(value) => *value != 0,
            Bson::Double(value) => *value != 0.0,
            Bson::Null | Bson::Undefined => false,
            _ => true,
        }
    }
}
