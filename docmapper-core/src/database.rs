//! The interface a mapping layer drives a database through.
//!
//! [`Database`] is the capability set every store adapter exposes: run a query, run a
//! schema change, open a transaction and shut down. Results of a read are delivered one at a
//! time to an [`OutputHandler`] as [`DatabaseOutput`] views.

use async_trait::async_trait;
use std::future::Future;

use crate::{
    error::DriverResult,
    output::DatabaseOutput,
    query::DatabaseQuery,
};

/// Callback receiving each result document of a read, in store order.
///
/// Returning an error aborts the read.
pub type OutputHandler<'a> = dyn FnMut(&dyn DatabaseOutput) -> DriverResult<()> + Send + 'a;

/// What a dispatched query did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QueryOutcome {
    /// Number of documents inserted.
    Created(usize),
    /// Number of documents handed to the output handler.
    Read(usize),
    /// Number of documents modified.
    Updated(u64),
    /// Number of documents deleted.
    Deleted(u64),
}

/// The kind of change a schema statement describes.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SchemaAction {
    Create,
    Update,
    Delete,
}

/// A schema change requested by the mapping layer.
#[derive(Debug, Clone)]
pub struct DatabaseSchema {
    /// The collection the change applies to.
    pub schema: String,
    pub action: SchemaAction,
}

impl DatabaseSchema {
    pub fn new(schema: impl Into<String>, action: SchemaAction) -> Self {
        Self { schema: schema.into(), action }
    }
}

#[async_trait]
pub trait Database: Send + Sync {
    /// Translates and runs `query`, feeding read results to `on_output`.
    async fn execute(
        &self,
        query: &DatabaseQuery,
        on_output: &mut OutputHandler<'_>,
    ) -> DriverResult<QueryOutcome>;

    /// Applies a schema change.
    async fn execute_schema(&self, schema: &DatabaseSchema) -> DriverResult<()>;

    /// Runs `continuation` against a handle scoped to a new transaction.
    ///
    /// The transaction is committed when the continuation succeeds and aborted when it fails.
    /// If the transaction cannot be started, the continuation is never called.
    async fn transaction<T, F, Fut>(&self, continuation: F) -> DriverResult<T>
    where
        Self: Sized,
        T: Send,
        F: FnOnce(Box<dyn Database>) -> Fut + Send,
        Fut: Future<Output = DriverResult<T>> + Send;

    /// Closes the connections held by this database.
    async fn shutdown(self) -> DriverResult<()>
    where
        Self: Sized;
}
