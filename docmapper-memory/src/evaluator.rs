//! Predicate evaluation for in-memory document filtering.
//!
//! This module evaluates native MongoDB predicate documents against stored documents. It
//! understands the subset of the query language the translation engine emits: `$and`,
//! `$or`, `$eq` and `$ne` over dotted field paths, plus implicit equality.

use std::collections::HashMap;
use bson::{Bson, Document, datetime::DateTime, oid::ObjectId};

use crate::error::{MemoryStoreError, MemoryStoreResult};


/// Type-erased, comparable representation of BSON values.
///
/// Numeric types are normalized to f64 so that `30_i32`, `30_i64` and `30.0` compare equal,
/// as they do in MongoDB.
#[derive(Debug)]
pub(crate) enum Comparable<'a> {
    Null,
    Bool(bool),
    /// Numeric value (all integers and floats normalized to f64)
    Number(f64),
    DateTime(DateTime),
    String(&'a str),
    ObjectId(ObjectId),
    Array(Vec<Comparable<'a>>),
    Map(HashMap<&'a str, Comparable<'a>>),
    /// Any other value, compared structurally
    Other(&'a Bson),
}

impl<'a> From<&'a Bson> for Comparable<'a> {
    fn from(bson: &'a Bson) -> Self {
        match bson {
            Bson::Null => Comparable::Null,
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

/// Resolves a dotted path such as `address.city` inside `document`.
pub(crate) fn lookup<'a>(document: &'a Document, path: &str) -> Option<&'a Bson> {
    let mut segments = path.split('.');
    let mut current = document.get(segments.next()?)?;

    for segment in segments {
        current = current.as_document()?.get(segment)?;
    }

    Some(current)
}


pub(crate) struct DocumentEvaluator<'a> {
    document: &'a Document,
}

impl<'a> DocumentEvaluator<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    /// Returns `true` if the document satisfies every clause of `filter`.
    ///
    /// The empty filter matches every document.
    pub fn evaluate(&self, filter: &Document) -> MemoryStoreResult<bool> {
        for (key, condition) in filter {
            let matched = match key.as_str() {
                "$and" => self.all(operands(key, condition)?)?,
                "$or" => self.any(operands(key, condition)?)?,
                operator if operator.starts_with('$') => {
                    return Err(MemoryStoreError::UnsupportedOperator(operator.to_string()));
                },
                path => self.field(path, condition)?,
            };

            if !matched {
                return Ok(false);
            }
        }

        Ok(true)
    }

    /// Keeps the documents of `documents` that satisfy `filter`, in their original order.
    pub fn filter_documents(
        documents: impl IntoIterator<Item = &'a Document>,
        filter: &Document,
    ) -> MemoryStoreResult<Vec<Document>> {
        let mut matched = Vec::new();

        for document in documents {
            if DocumentEvaluator::new(document).evaluate(filter)? {
                matched.push(document.clone());
            }
        }

        Ok(matched)
    }

    fn all(&self, filters: Vec<&Document>) -> MemoryStoreResult<bool> {
        for filter in filters {
            if !self.evaluate(filter)? {
                return Ok(false);
            }
        }

        Ok(true)
    }

    fn any(&self, filters: Vec<&Document>) -> MemoryStoreResult<bool> {
        for filter in filters {
            if self.evaluate(filter)? {
                return Ok(true);
            }
        }

        Ok(false)
    }

    fn field(&self, path: &str, condition: &Bson) -> MemoryStoreResult<bool> {
        let value = lookup(self.document, path);

        match condition {
            Bson::Document(operators) if is_operator_document(operators) => {
                for (operator, operand) in operators {
                    let matched = match operator.as_str() {
                        "$eq" => equals(value, operand),
                        "$ne" => !equals(value, operand),
                        other => return Err(MemoryStoreError::UnsupportedOperator(other.to_string())),
                    };

                    if !matched {
                        return Ok(false);
                    }
                }

                Ok(true)
            },
            literal => Ok(equals(value, literal)),
        }
    }
}

fn is_operator_document(document: &Document) -> bool {
    !document.is_empty() && document.keys().all(|key| key.starts_with('$'))
}

fn operands<'b>(operator: &str, condition: &'b Bson) -> MemoryStoreResult<Vec<&'b Document>> {
    let malformed = || MemoryStoreError::MalformedOperand {
        operator: operator.to_string(),
        expected: "an array of documents",
    };

    condition
        .as_array()
        .ok_or_else(malformed)?
        .iter()
        .map(|operand| operand.as_document().ok_or_else(malformed))
        .collect()
}

/// Equality as MongoDB applies it: a missing field equals null, and an array field matches
/// when it equals the operand or contains an element equal to it.
fn equals(value: Option<&Bson>, operand: &Bson) -> bool {
    let Some(value) = value else {
        return matches!(operand, Bson::Null);
    };
    let operand = Comparable::from(operand);

    match value {
        Bson::Array(items) => {
            Comparable::from(value) == operand
                || items.iter().any(|item| Comparable::from(item) == operand)
        },
        _ => Comparable::from(value) == operand,
    }
}
