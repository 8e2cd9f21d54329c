//! MongoDB translation engine for docmapper.
//!
//! This crate turns the abstract queries of `docmapper-core` into MongoDB documents and
//! predicates, dispatches them to a [`StoreBackend`](docmapper_core::backend::StoreBackend),
//! and hands result documents back as strictly typed outputs.
//!
//! To use it, include the `mongodb` feature in your `Cargo.toml`:
//!
//! ```toml
//! [dependencies]
//! docmapper = { version = "x.y.z", features = ["mongodb"] }
//! ```
//!
//! # Translation
//!
//! - Field paths become nested documents on write and dotted keys in predicates
//! - Filters support equality and inequality, combined with AND and OR groups
//! - Bound values are encoded through BSON serialization
//! - Result values decode only into their exact stored type
//!
//! # Example
//!
//! ```ignore
//! use docmapper::{backend::StoreBackendBuilder, mongodb::{MongoDatabase, MongoDbStore}};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let store = MongoDbStore::builder("mongodb://localhost:27017", "my_database")
//!         .build()
//!         .await?;
//!     let database = MongoDatabase::new(store);
//!
//!     Ok(())
//! }
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_mongodb;

pub mod database;
pub mod document;
pub mod filter;
pub mod output;
pub mod primitive;
pub mod store;

pub use database::MongoDatabase;
pub use document::DocumentBuilder;
pub use filter::{FilterCompiler, NativeQuery};
pub use output::DocumentOutput;
pub use primitive::PrimitiveConverter;
pub use store::{MongoDbStore, MongoDbStoreBuilder, MongoDbTransaction};
