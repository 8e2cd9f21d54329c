//! In-memory store backend for docmapper.
//!
//! This crate provides a thread-safe, in-memory implementation of the `StoreBackend` trait.
//! It evaluates the native predicates the MongoDB translation engine emits, so translated
//! queries can be run end to end without a database server. It is meant for development
//! and testing.
//!
//! # Features
//!
//! - **Thread-safe access** - Concurrent reads and writes using async-aware RwLock
//! - **Native predicates** - Evaluates `$and`, `$or`, `$eq` and `$ne` over dotted paths
//! - **Snapshot transactions** - Writes stay private until commit
//!
//! # Quick Start
//!
//! ```ignore
//! use docmapper::{prelude::*, memory::InMemoryStore, mongodb::MongoDatabase};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let database = MongoDatabase::new(InMemoryStore::builder().build().await?);
//!
//!     let query = DatabaseQuery::builder("users")
//!         .action(QueryAction::Create)
//!         .field(QueryField::path(["name"]))
//!         .input([QueryValue::bind("Alice")])
//!         .build();
//!
//!     database.execute(&query, &mut |_| Ok(())).await?;
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_memory;

pub mod error;
pub mod evaluator;
pub mod store;

pub use error::{MemoryStoreError, MemoryStoreResult};
pub use store::{InMemoryStore, InMemoryStoreBuilder, InMemoryTransaction};
