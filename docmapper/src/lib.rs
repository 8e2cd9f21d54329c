//! Main docmapper crate providing a unified interface for query translation.
//!
//! This crate is the primary entry point for users of docmapper. It re-exports the core
//! query model and interfaces along with the available store backends.
//!
//! # Features
//!
//! - **Abstract queries** - Describe create, read, update and delete operations once
//! - **MongoDB translation** - Field paths, filter trees and values become native documents
//! - **Strict decoding** - Stored values decode only into their exact type
//! - **Transactions** - Run a block of queries that commits or aborts as a unit
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryStore, mongodb::MongoDatabase};
//!
//! #[tokio::main]
//! async fn main() -> DriverResult<()> {
//!     let database = MongoDatabase::new(InMemoryStore::builder().build().await?);
//!
//!     // Insert a user
//!     let create = DatabaseQuery::builder("users")
//!         .action(QueryAction::Create)
//!         .field(QueryField::path(["name"]))
//!         .field(QueryField::path(["address", "city"]))
//!         .input([QueryValue::bind("Alice"), QueryValue::bind("NYC")])
//!         .build();
//!
//!     database.execute(&create, &mut |_| Ok(())).await?;
//!
//!     // Read it back
//!     let read = DatabaseQuery::builder("users")
//!         .filter(QueryFilter::eq(QueryField::path(["address", "city"]), QueryValue::bind("NYC")))
//!         .build();
//!
//!     database.execute(&read, &mut |output| {
//!         println!("Found {}", output.decode::<String>("name")?);
//!         Ok(())
//!     }).await?;
//!
//!     database.shutdown().await
//! }
//! ```
//!
//! # Transactions
//!
//! The continuation receives a database scoped to the transaction. Returning `Ok` commits
//! it and returning an error aborts it.
//!
//! ```ignore
//! let count = database
//!     .transaction(|scoped| async move {
//!         let outcome = scoped.execute(&delete_inactive, &mut |_| Ok(())).await?;
//!         Ok(outcome)
//!     })
//!     .await?;
//! ```
//!
//! # Backends
//!
//! - [`memory`] - In-memory storage for development and testing
//! - [`mongodb`] - The MongoDB translation engine and driver (requires `mongodb` feature)

pub mod prelude;

pub use docmapper_core::{backend, config, database, error, output, query};

// Re-export BSON types for convenience
pub use bson;

/// In-memory storage backend implementations.
pub mod memory {
    pub use docmapper_memory::{InMemoryStore, InMemoryStoreBuilder, InMemoryTransaction};
}

/// MongoDB translation engine and storage backend.
///
/// This module is only available when the `mongodb` feature is enabled.
#[cfg(feature = "mongodb")]
pub mod mongodb {
    pub use docmapper_mongodb::{
        DocumentBuilder, DocumentOutput, FilterCompiler, MongoDatabase, MongoDbStore,
        MongoDbStoreBuilder, MongoDbTransaction, NativeQuery, PrimitiveConverter,
    };
}
