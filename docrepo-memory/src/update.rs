//! Update operator application for the in-memory engine.
//!
//! Supports `$set`, `$unset`, `$inc`, `$push` (including `$each`) and `$pull`
//! (by equality) on dotted paths. Updates are applied to a copy, so a failing
//! operator leaves the stored document untouched.

use bson::{Bson, Document};

use docrepo_core::{
    document::ID_FIELD,
    error::{RepositoryError, RepositoryResult},
    query::Update,
};

use crate::evaluator::{Comparable, is_operator_document};

/// Most `null`s a positional write may append to reach its index.
const MAX_ARRAY_PADDING: usize = 1_500_000;

/// Applies an update specification to a document and returns the result.
///
/// # Errors
///
/// [`RepositoryError::InvalidDocument`] when the specification is not made of
/// supported operators, when an operator does not fit the value it targets, or
/// when the update would change `_id`.
pub(crate) fn apply_update(document: &Document, update: &Document) -> RepositoryResult<Document> {
    if !Update::is_operator_document(update) {
        return Err(RepositoryError::invalid_document(format!(
            "update specification must only contain operators, got {update}"
        )));
    }

    let mut target = Bson::Document(document.clone());

    for (op, fields) in update {
        let fields = fields.as_document().ok_or_else(|| {
            RepositoryError::invalid_document(format!("{op} expects a document of fields"))
        })?;

        for (path, value) in fields {
            let segments = path.split('.').collect::<Vec<_>>();

            match op.as_str() {
                "$set" => set(&mut target, &segments, value.clone())?,
                "$unset" => unset(&mut target, &segments)?,
                "$inc" => increment(&mut target, &segments, path, value)?,
                "$push" => push(&mut target, &segments, path, value)?,
                "$pull" => pull(&mut target, &segments, value)?,
                other => {
                    return Err(RepositoryError::invalid_document(format!(
                        "unsupported update operator {other}"
                    )));
                }
            }
        }
    }

    let Bson::Document(updated) = target else {
        return Err(RepositoryError::invalid_document("update replaced the document root"));
    };

    if updated.get(ID_FIELD) != document.get(ID_FIELD) {
        return Err(RepositoryError::invalid_document(format!(
            "performing an update on the path '{ID_FIELD}' would modify the immutable field '{ID_FIELD}'"
        )));
    }

    Ok(updated)
}

/// Seeds the document an upsert inserts from the equality predicates of its
/// filter.
pub(crate) fn seed_from_filter(filter: &Document) -> RepositoryResult<Document> {
    let mut seed = Bson::Document(Document::new());
    seed_into(&mut seed, filter)?;

    match seed {
        Bson::Document(seed) => Ok(seed),
        _ => Ok(Document::new()),
    }
}

fn seed_into(seed: &mut Bson, filter: &Document) -> RepositoryResult<()> {
    for (key, condition) in filter {
        if key == "$and" {
            for clause in condition.as_array().into_iter().flatten() {
                if let Some(clause) = clause.as_document() {
                    seed_into(seed, clause)?;
                }
            }
            continue;
        }

        if key.starts_with('$') {
            continue;
        }

        let value = match condition {
            Bson::Document(operators) if is_operator_document(condition) => match operators.get("$eq") {
                Some(value) => value.clone(),
                None => continue,
            },
            value => value.clone(),
        };

        let segments = key.split('.').collect::<Vec<_>>();
        set(seed, &segments, value)?;
    }

    Ok(())
}

/// Walks a dotted path and returns the slot it names. With `create`, missing
/// intermediate documents are created, arrays are padded with `null`, and a
/// missing leaf is created as `null`.
fn locate<'a>(value: &'a mut Bson, segments: &[&str], create: bool) -> RepositoryResult<Option<&'a mut Bson>> {
    let Some((head, rest)) = segments.split_first() else {
        return Ok(Some(value));
    };

    let child = match value {
        Bson::Document(doc) => {
            if !doc.contains_key(*head) {
                if !create {
                    return Ok(None);
                }
                doc.insert(*head, Bson::Null);
            }
            doc.get_mut(*head)
        }
        Bson::Array(items) => {
            let Ok(index) = head.parse::<usize>() else {
                if !create {
                    return Ok(None);
                }
                return Err(RepositoryError::invalid_document(format!(
                    "cannot create field {head:?} in an array"
                )));
            };

            if index >= items.len() {
                if !create {
                    return Ok(None);
                }
                if index - items.len() > MAX_ARRAY_PADDING {
                    return Err(RepositoryError::invalid_document(format!(
                        "cannot pad an array of {} elements to index {index}",
                        items.len()
                    )));
                }
                items.resize(index + 1, Bson::Null);
            }
            items.get_mut(index)
        }
        _ if create => {
            return Err(RepositoryError::invalid_document(format!(
                "cannot create field {head:?} in a non-container value"
            )));
        }
        _ => return Ok(None),
    };

    match child {
        Some(child) => {
            if create && !rest.is_empty() && matches!(child, Bson::Null) {
                *child = Bson::Document(Document::new());
            }
            locate(child, rest, create)
        }
        None => Ok(None),
    }
}

fn set(target: &mut Bson, segments: &[&str], value: Bson) -> RepositoryResult<()> {
    if let Some(slot) = locate(target, segments, true)? {
        *slot = value;
    }

    Ok(())
}

/// Removes a field. An array element is replaced by `null` so that the
/// positions of the other elements do not shift.
fn unset(target: &mut Bson, segments: &[&str]) -> RepositoryResult<()> {
    let Some((last, parents)) = segments.split_last() else {
        return Ok(());
    };

    match locate(target, parents, false)? {
        Some(Bson::Document(doc)) => {
            doc.remove(*last);
        }
        Some(Bson::Array(items)) => {
            if let Some(item) = last.parse::<usize>().ok().and_then(|index| items.get_mut(index)) {
                *item = Bson::Null;
            }
        }
        _ => {}
    }

    Ok(())
}

fn increment(target: &mut Bson, segments: &[&str], path: &str, by: &Bson) -> RepositoryResult<()> {
    let not_numeric = || RepositoryError::invalid_document(format!("cannot apply $inc to non-numeric field {path:?}"));

    if as_f64(by).is_none() {
        return Err(not_numeric());
    }

    let Some(slot) = locate(target, segments, false)? else {
        return set(target, segments, by.clone());
    };

    if as_f64(slot).is_none() {
        return Err(not_numeric());
    }

    *slot = add(slot, by).ok_or_else(|| {
        RepositoryError::invalid_document(format!("$inc on field {path:?} overflows a 64-bit integer"))
    })?;

    Ok(())
}

/// Adds two numeric values. Returns `None` when integer addition overflows
/// 64 bits.
fn add(current: &Bson, by: &Bson) -> Option<Bson> {
    match (current, by) {
        (Bson::Int32(a), Bson::Int32(b)) => Some(match a.checked_add(*b) {
            Some(sum) => Bson::Int32(sum),
            None => Bson::Int64(i64::from(*a) + i64::from(*b)),
        }),
        (Bson::Int32(_) | Bson::Int64(_), Bson::Int32(_) | Bson::Int64(_)) => {
            as_i64(current)?.checked_add(as_i64(by)?).map(Bson::Int64)
        }
        _ => Some(Bson::Double(as_f64(current)? + as_f64(by)?)),
    }
}

fn as_i64(value: &Bson) -> Option<i64> {
    match value {
        Bson::Int32(value) => Some(i64::from(*value)),
        Bson::Int64(value) => Some(*value),
        _ => None,
    }
}

fn as_f64(value: &Bson) -> Option<f64> {
    match value {
        Bson::Int32(value) => Some(f64::from(*value)),
        Bson::Int64(value) => Some(*value as f64),
        Bson::Double(value) => Some(*value),
        _ => None,
    }
}

fn push(target: &mut Bson, segments: &[&str], path: &str, value: &Bson) -> RepositoryResult<()> {
    let values = match value {
        Bson::Document(modifiers) if modifiers.contains_key("$each") => match modifiers.get("$each") {
            Some(Bson::Array(each)) => each.clone(),
            _ => {
                return Err(RepositoryError::invalid_document(format!(
                    "$each for {path:?} must be an array"
                )));
            }
        },
        value => vec![value.clone()],
    };

    let Some(slot) = locate(target, segments, true)? else {
        return Ok(());
    };

    if matches!(slot, Bson::Null) {
        *slot = Bson::Array(Vec::new());
    }

    match slot {
        Bson::Array(items) => {
            items.extend(values);
            Ok(())
        }
        _ => Err(RepositoryError::invalid_document(format!(
            "the field {path:?} must be an array to $push to it"
        ))),
    }
}

fn pull(target: &mut Bson, segments: &[&str], value: &Bson) -> RepositoryResult<()> {
    if let Some(Bson::Array(items)) = locate(target, segments, false)? {
        let expected = Comparable::from(value);
        items.retain(|item| Comparable::from(item) != expected);
    }

    Ok(())
}
