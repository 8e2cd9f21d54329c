//! Store backend abstraction.
//!
//! The translation engine never talks to a driver directly. It issues native documents and
//! predicates through the [`StoreBackend`] trait, which a physical driver (MongoDB, or the
//! in-memory store used for development and tests) implements.
//!
//! # Traits
//!
//! - [`StoreBackend`]: insert, find, update and delete against a named collection
//! - [`StoreTransaction`]: a backend handle scoped to one transaction
//! - [`StoreBackendBuilder`]: factory trait for creating backend instances
//!
//! # Examples
//!
//! ```ignore
//! use docmapper::backend::StoreBackend;
//! use bson::doc;
//!
//! let backend = MyBackendImpl::new();
//!
//! backend.insert_documents(vec![doc! { "name": "Alice", "age": 30 }], "users").await?;
//! let deleted = backend.delete_documents(doc! { "name": { "$eq": "Alice" } }, "users").await?;
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```

use async_trait::async_trait;
use bson::Document;
use futures::stream::BoxStream;
use std::fmt::Debug;

use crate::error::DriverResult;

/// Documents yielded by a find, in the order the store's cursor produces them.
pub type DocumentStream = BoxStream<'static, DriverResult<Document>>;

/// Abstract interface for document store drivers.
///
/// Filters are native predicate documents (`{"age": {"$eq": 30}}`). Errors raised by the
/// driver are returned as [`DriverError::Backend`](crate::error::DriverError::Backend) with the
/// original error as their source.
#[async_trait]
pub trait StoreBackend: Send + Sync + Debug {
    /// The handle type operations run through while a transaction is open.
    type Transaction: StoreTransaction;

    /// Inserts documents into a collection, creating it if needed.
    ///
    /// # Arguments
    ///
    /// * `documents` - The documents to insert
    /// * `collection` - The name of the collection to insert into
    async fn insert_documents(
        &self,
        documents: Vec<Document>,
        collection: &str,
    ) -> DriverResult<()>;

    /// Finds the documents matching `filter`.
    ///
    /// The returned stream yields documents in store order. An empty filter matches every
    /// document of the collection.
    async fn query_documents(
        &self,
        filter: Document,
        collection: &str,
    ) -> DriverResult<DocumentStream>;

    /// Applies `update` (an operator document such as `{"$set": {...}}`) to every document
    /// matching `filter`.
    ///
    /// # Returns
    ///
    /// The number of documents that were modified.
    async fn update_documents(
        &self,
        filter: Document,
        update: Document,
        collection: &str,
    ) -> DriverResult<u64>;

    /// Deletes every document matching `filter`.
    ///
    /// # Returns
    ///
    /// The number of documents that were deleted.
    async fn delete_documents(&self, filter: Document, collection: &str) -> DriverResult<u64>;

    /// Opens a session and starts a transaction on it.
    async fn start_transaction(&self) -> DriverResult<Self::Transaction>;

    /// Cleanly shuts down the backend, closing its connections.
    ///
    /// The default implementation is a no-op.
    async fn shutdown(self) -> DriverResult<()>
    where
        Self: Sized,
    {
        Ok(())
    }
}

/// A backend handle whose operations all run inside one open transaction.
///
/// Clones share the same underlying session.
#[async_trait]
pub trait StoreTransaction: StoreBackend + Clone + 'static {
    /// Commits the transaction and releases its session.
    async fn commit(&self) -> DriverResult<()>;

    /// Aborts the transaction and releases its session.
    async fn abort(&self) -> DriverResult<()>;
}

#[async_trait]
pub trait StoreBackendBuilder {
    type Backend: StoreBackend;

    async fn build(self) -> DriverResult<Self::Backend>;
}
