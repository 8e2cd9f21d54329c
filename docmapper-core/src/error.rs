//! Error types and result types for query translation and dispatch.
//!
//! Every failure raised while translating an abstract query, decoding a stored value,
//! or talking to a store surfaces as a [`DriverError`]. Use [`DriverResult<T>`] as the
//! return type for fallible operations.

use bson::{Bson, error::Error as BsonError};
use serde_json::Error as SerdeJsonError;
use std::error::Error as StdError;
use thiserror::Error;

/// Represents all possible errors raised by the translation engine and its store backends.
///
/// The `Unknown*` variants fire when translation meets a query variant this adapter does
/// not implement. Each carries a short string tag naming the offending variant.
#[derive(Error, Debug)]
pub enum DriverError {
    /// The query action is not supported (only create, read, update and delete are).
    #[error("Unknown operation: {0}")]
    UnknownOperation(String),
    /// The field cannot be mapped to a document path.
    #[error("Unknown field: {0}")]
    UnknownField(String),
    /// The filter variant is not supported.
    #[error("Unknown filter: {0}")]
    UnknownFilter(String),
    /// The filter group relation is not supported.
    #[error("Unknown relation: {0}")]
    UnknownRelation(String),
    /// The comparison method is not supported (only equality is).
    #[error("Unknown query method: {0}")]
    UnknownQueryMethod(String),
    /// The value variant cannot be converted to a stored primitive.
    #[error("Unknown value: {0}")]
    UnknownValue(String),
    /// A stored value was missing or did not have exactly the requested type.
    #[error("Value not found: needed {needed}, found {found:?}")]
    ValueNotFound {
        /// Name of the requested type.
        needed: &'static str,
        /// The stored primitive, if any.
        found: Option<Bson>,
    },
    /// The number of input values does not match the number of fields.
    #[error("Input mismatch: {fields} fields but {values} values")]
    InputMismatch {
        fields: usize,
        values: usize,
    },
    /// A write action was dispatched without any input rows.
    #[error("Missing input for {0}")]
    MissingInput(String),
    /// A bound value could not be encoded into a primitive.
    #[error("Encoding error: {0}")]
    Encoding(String),
    /// Serialization/deserialization error when converting between formats (BSON, JSON).
    #[error("Serialization error: {0}")]
    Serialization(String),
    /// Error during store initialization or connection setup.
    #[error("Initialization error: {0}")]
    Initialization(String),
    /// A transaction could not be started, committed or aborted.
    #[error("Transaction error: {0}")]
    Transaction(String),
    /// An error raised by the underlying store, passed through unchanged.
    #[error("Backend error: {0}")]
    Backend(#[source] Box<dyn StdError + Send + Sync>),
}

impl DriverError {
    /// Wraps a store-level error without reinterpreting it.
    pub fn backend(err: impl StdError + Send + Sync + 'static) -> Self {
        DriverError::Backend(Box::new(err))
    }
}

/// A specialized `Result` type for translation and dispatch operations.
pub type DriverResult<T> = Result<T, DriverError>;

impl From<BsonError> for DriverError {
    fn from(err: BsonError) -> Self {
        DriverError::Serialization(err.to_string())
    }
}

impl From<SerdeJsonError> for DriverError {
    fn from(err: SerdeJsonError) -> Self {
        DriverError::Serialization(err.to_string())
    }
}
