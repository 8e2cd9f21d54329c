//! Conversion of abstract query values into BSON primitives.

use bson::{Bson, Document};
use tracing::warn;

use docmapper_core::{
    config::BindFailurePolicy,
    error::{DriverError, DriverResult},
    query::QueryValue,
};

/// Converts [`QueryValue`]s into the primitives stored by MongoDB.
///
/// A conversion yields `None` when the value has no primitive form: custom values, and bound
/// values that fail to encode under [`BindFailurePolicy::Absent`]. Containers drop such
/// members instead of padding them with nulls.
#[derive(Debug, Clone, Copy, Default)]
pub struct PrimitiveConverter {
    bind_failure: BindFailurePolicy,
}

impl PrimitiveConverter {
    pub fn new(bind_failure: BindFailurePolicy) -> Self {
        Self { bind_failure }
    }

    pub fn to_primitive(&self, value: &QueryValue) -> DriverResult<Option<Bson>> {
        Ok(match value {
            QueryValue::Array(values) => Some(Bson::Array(
                values
                    .iter()
                    .map(|value| self.to_primitive(value))
                    .filter_map(Result::transpose)
                    .collect::<DriverResult<Vec<_>>>()?,
            )),
            QueryValue::Null => Some(Bson::Null),
            QueryValue::Bind(bound) => match bound.encode() {
                Ok(primitive) => Some(primitive),
                Err(err) => match self.bind_failure {
                    BindFailurePolicy::Absent => {
                        warn!(target: "docmapper::query", value = ?bound, error = %err, "Bound value dropped");
                        None
                    }
                    BindFailurePolicy::Propagate => {
                        return Err(DriverError::Encoding(err.to_string()));
                    }
                },
            },
            QueryValue::Dictionary(entries) => {
                let mut document = Document::new();

                for (key, value) in entries {
                    if let Some(primitive) = self.to_primitive(value)? {
                        document.insert(key.clone(), primitive);
                    }
                }

                Some(Bson::Document(document))
            }
            QueryValue::Custom(_) => None,
        })
    }

    /// Converts a value written to a single document slot or compared against in a filter.
    ///
    /// Custom values are rejected here and absent primitives become null.
    pub(crate) fn to_slot(&self, value: &QueryValue) -> DriverResult<Bson> {
        match value {
            QueryValue::Custom(tag) => Err(DriverError::UnknownValue(tag.clone())),
            _ => Ok(self.to_primitive(value)?.unwrap_or(Bson::Null)),
        }
    }
}
