//! Convenient re-exports of commonly used types from docmapper.
//!
//! Import this prelude module to quickly access the most frequently used types
//! and traits without needing to import from multiple sub-modules:
//!
//! ```ignore
//! use docmapper::prelude::*;
//! ```
//!
//! This provides access to:
//! - Query construction and filter trees
//! - The database interface and its outcomes
//! - Strict output decoding
//! - Store backends, builders and configuration
//! - Error types

pub use docmapper_core::{
    backend::{StoreBackend, StoreBackendBuilder, StoreTransaction},
    config::{BindFailurePolicy, DriverConfig},
    database::{Database, DatabaseSchema, QueryOutcome, SchemaAction},
    error::{DriverError, DriverResult},
    output::{DatabaseOutput, FromPrimitive},
    query::{
        DatabaseQuery, FieldKey, FilterMethod, FilterRelation, FilterVisitor, QueryAction,
        QueryBuilder, QueryField, QueryFilter, QueryValue,
    },
};
