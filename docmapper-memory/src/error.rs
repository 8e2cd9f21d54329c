use thiserror::Error;

use docmapper_core::error::DriverError;

/// Errors raised by the in-memory store itself.
///
/// They reach callers wrapped in [`DriverError::Backend`], the same way driver errors do.
#[derive(Error, Debug)]
pub enum MemoryStoreError {
    #[error("Unsupported operator: {0}")]
    UnsupportedOperator(String),
    #[error("Malformed operand for {operator}: expected {expected}")]
    MalformedOperand {
        operator: String,
        expected: &'static str,
    },
    #[error("Duplicate key {id} in collection {collection}")]
    DuplicateKey {
        id: String,
        collection: String,
    },
}

pub type MemoryStoreResult<T> = Result<T, MemoryStoreError>;

impl From<MemoryStoreError> for DriverError {
    fn from(err: MemoryStoreError) -> Self {
        DriverError::backend(err)
    }
}
