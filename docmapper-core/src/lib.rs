//! Storage-agnostic query model and store interfaces for docmapper.
//!
//! This crate is the core of the docmapper project and provides:
//!
//! - **Query model** ([`query`]) - Abstract CRUD queries, fields, filter trees and values
//! - **Database interface** ([`database`]) - The capability set a store adapter exposes
//! - **Output decoding** ([`output`]) - Strict, non-coercive decoding of stored values
//! - **Store backend abstraction** ([`backend`]) - Traits physical drivers implement
//! - **Configuration** ([`config`]) - Translation settings
//! - **Error handling** ([`error`]) - Error types and result types
//!
//! # Example
//!
//! ```ignore
//! use docmapper::query::{DatabaseQuery, QueryAction, QueryField, QueryValue};
//!
//! let query = DatabaseQuery::builder("users")
//!     .action(QueryAction::Create)
//!     .field(QueryField::path(["name"]))
//!     .input([QueryValue::bind("Alice")])
//!     .build();
//!
//! database.execute(&query, &mut |_| Ok(())).await?;
//! ```

#[allow(unused_extern_crates)]
extern crate self as docmapper_core;

pub mod backend;
pub mod config;
pub mod database;
pub mod error;
pub mod output;
pub mod query;
