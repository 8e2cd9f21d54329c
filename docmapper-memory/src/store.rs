//! In-memory storage implementation for store backends.
//!
//! This module provides a backend that keeps every collection as an ordered list of BSON
//! documents behind an async-safe read-write lock, with snapshot transactions on top.

use std::{collections::HashMap, sync::Arc};
use async_trait::async_trait;
use bson::{Bson, Document, oid::ObjectId};
use futures::{StreamExt, stream};
use mea::rwlock::RwLock;
use tracing::debug;

use docmapper_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder, StoreTransaction},
    error::{DriverError, DriverResult},
};

use crate::{
    error::{MemoryStoreError, MemoryStoreResult},
    evaluator::{DocumentEvaluator, lookup},
};


/// Collections by name, each holding documents in insertion order.
#[derive(Debug, Default, Clone)]
struct StoreState {
    collections: HashMap<String, Vec<Document>>,
}

impl StoreState {
    fn insert(&mut self, documents: Vec<Document>, collection: &str) -> MemoryStoreResult<()> {
        let stored = self.collections
            .entry(collection.to_string())
            .or_default();

        let mut prepared = Vec::with_capacity(documents.len());
        for document in documents {
            let document = with_id(document);
            let id = document.get("_id").cloned().unwrap_or(Bson::Null);

            let duplicate = stored.iter().chain(prepared.iter())
                .any(|existing: &Document| existing.get("_id") == Some(&id));
            if duplicate {
                return Err(MemoryStoreError::DuplicateKey {
                    id: id.to_string(),
                    collection: collection.to_string(),
                });
            }

            prepared.push(document);
        }

        stored.extend(prepared);

        Ok(())
    }

    fn find(&self, filter: &Document, collection: &str) -> MemoryStoreResult<Vec<Document>> {
        match self.collections.get(collection) {
            Some(documents) => DocumentEvaluator::filter_documents(documents, filter),
            None => Ok(vec![]),
        }
    }

    fn update(&mut self, filter: &Document, update: &Document, collection: &str) -> MemoryStoreResult<u64> {
        let assignments = set_assignments(update)?;
        let Some(documents) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let matched = matches(documents, filter)?;

        let mut modified = 0;
        for (document, _) in documents.iter_mut().zip(matched).filter(|(_, matched)| *matched) {
            let mut updated = document.clone();
            for (path, value) in assignments {
                set_path(&mut updated, path, value.clone());
            }

            if updated != *document {
                *document = updated;
                modified += 1;
            }
        }

        Ok(modified)
    }

    fn delete(&mut self, filter: &Document, collection: &str) -> MemoryStoreResult<u64> {
        let Some(documents) = self.collections.get_mut(collection) else {
            return Ok(0);
        };
        let mut matched = matches(documents, filter)?.into_iter();

        let before = documents.len();
        documents.retain(|_| !matched.next().unwrap_or(false));

        Ok((before - documents.len()) as u64)
    }
}

/// Evaluates `filter` against every document before anything is changed, so a failing
/// filter leaves the collection untouched.
fn matches(documents: &[Document], filter: &Document) -> MemoryStoreResult<Vec<bool>> {
    documents
        .iter()
        .map(|document| DocumentEvaluator::new(document).evaluate(filter))
        .collect()
}

/// Returns `document` with a generated `_id` placed first if it has none.
fn with_id(document: Document) -> Document {
    if document.contains_key("_id") {
        return document;
    }

    let mut identified = Document::new();
    identified.insert("_id", ObjectId::new());
    for (key, value) in document {
        identified.insert(key, value);
    }

    identified
}

fn set_assignments(update: &Document) -> MemoryStoreResult<&Document> {
    if let Some(operator) = update.keys().find(|key| key.as_str() != "$set") {
        return Err(MemoryStoreError::UnsupportedOperator(operator.clone()));
    }

    match update.get("$set") {
        Some(Bson::Document(assignments)) => Ok(assignments),
        Some(_) => Err(MemoryStoreError::MalformedOperand {
            operator: "$set".to_string(),
            expected: "a document",
        }),
        None => Err(MemoryStoreError::MalformedOperand {
            operator: "update".to_string(),
            expected: "a $set document",
        }),
    }
}

/// Writes `value` at a dotted `path`, replacing non-document intermediates.
fn set_path(document: &mut Document, path: &str, value: Bson) {
    match path.split_once('.') {
        None => {
            document.insert(path, value);
        },
        Some((head, rest)) => {
            if !matches!(document.get(head), Some(Bson::Document(_))) {
                document.insert(head, Document::new());
            }
            if let Some(Bson::Document(child)) = document.get_mut(head) {
                set_path(child, rest, value);
            }
        },
    }
}


/// Thread-safe in-memory store backend.
///
/// `InMemoryStore` is cloneable and uses an `Arc`-wrapped internal state, so clones share
/// the same collections. Finds scan the whole collection and yield documents in insertion
/// order.
///
/// Transactions work on a snapshot of every collection taken when they start. Commit replaces
/// the store's contents with the snapshot; abort drops it.
///
/// Transactions are not isolated from concurrent writers: anything written to the store
/// outside the transaction while it is open is lost when it commits.
///
/// # Example
///
/// ```ignore
/// use docmapper_memory::InMemoryStore;
/// use docmapper::backend::StoreBackend;
/// use bson::doc;
///
/// #[tokio::main]
/// async fn main() -> Result<(), Box<dyn std::error::Error>> {
///     let store = InMemoryStore::new();
///
///     store.insert_documents(vec![doc! { "name": "Alice", "age": 30 }], "users").await?;
///     assert_eq!(store.documents("users").await.len(), 1);
///
///     Ok(())
/// }
/// ```
#[derive(Default, Clone, Debug)]
pub struct InMemoryStore {
    state: Arc<RwLock<StoreState>>,
}

impl InMemoryStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    pub fn builder() -> InMemoryStoreBuilder {
        InMemoryStoreBuilder::default()
    }

    /// Returns a copy of every document in `collection`, in insertion order.
    pub async fn documents(&self, collection: &str) -> Vec<Document> {
        self.state
            .read()
            .await
            .collections
            .get(collection)
            .cloned()
            .unwrap_or_default()
    }

    /// Returns the value at a dotted `path` of every document in `collection`.
    pub async fn values(&self, collection: &str, path: &str) -> Vec<Option<Bson>> {
        self.documents(collection)
            .await
            .iter()
            .map(|document| lookup(document, path).cloned())
            .collect()
    }
}

#[async_trait]
impl StoreBackend for InMemoryStore {
    type Transaction = InMemoryTransaction;

    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DriverResult<()> {
        Ok(self.state.write().await.insert(documents, collection)?)
    }

    async fn query_documents(&self, filter: Document, collection: &str) -> DriverResult<DocumentStream> {
        let documents = self.state.read().await.find(&filter, collection)?;

        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn update_documents(&self, filter: Document, update: Document, collection: &str) -> DriverResult<u64> {
        Ok(self.state.write().await.update(&filter, &update, collection)?)
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> DriverResult<u64> {
        Ok(self.state.write().await.delete(&filter, collection)?)
    }

    async fn start_transaction(&self) -> DriverResult<Self::Transaction> {
        let snapshot = self.state.read().await.clone();
        debug!(target: "docmapper::txn", "Snapshot taken for in-memory transaction");

        Ok(InMemoryTransaction {
            parent: self.state.clone(),
            staged: Arc::new(RwLock::new(Some(snapshot))),
        })
    }
}

/// A transaction over an [`InMemoryStore`].
///
/// Writes go to a private snapshot and become visible to the store only on commit. Once the
/// transaction is committed or aborted every further operation fails.
#[derive(Clone, Debug)]
pub struct InMemoryTransaction {
    parent: Arc<RwLock<StoreState>>,
    staged: Arc<RwLock<Option<StoreState>>>,
}

fn closed() -> DriverError {
    DriverError::Transaction("transaction is no longer open".to_string())
}

#[async_trait]
impl StoreBackend for InMemoryTransaction {
    type Transaction = InMemoryTransaction;

    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DriverResult<()> {
        let mut staged = self.staged.write().await;
        let state = staged.as_mut().ok_or_else(closed)?;

        Ok(state.insert(documents, collection)?)
    }

    async fn query_documents(&self, filter: Document, collection: &str) -> DriverResult<DocumentStream> {
        let staged = self.staged.read().await;
        let documents = staged
            .as_ref()
            .ok_or_else(closed)?
            .find(&filter, collection)?;

        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn update_documents(&self, filter: Document, update: Document, collection: &str) -> DriverResult<u64> {
        let mut staged = self.staged.write().await;
        let state = staged.as_mut().ok_or_else(closed)?;

        Ok(state.update(&filter, &update, collection)?)
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> DriverResult<u64> {
        let mut staged = self.staged.write().await;
        let state = staged.as_mut().ok_or_else(closed)?;

        Ok(state.delete(&filter, collection)?)
    }

    async fn start_transaction(&self) -> DriverResult<Self::Transaction> {
        Err(DriverError::Transaction("nested transactions are not supported".to_string()))
    }
}

#[async_trait]
impl StoreTransaction for InMemoryTransaction {
    async fn commit(&self) -> DriverResult<()> {
        let state = self.staged.write().await.take().ok_or_else(closed)?;
        *self.parent.write().await = state;

        Ok(())
    }

    async fn abort(&self) -> DriverResult<()> {
        self.staged.write().await.take().ok_or_else(closed)?;

        Ok(())
    }
}


/// Builder for constructing [`InMemoryStore`] instances.
#[derive(Default)]
pub struct InMemoryStoreBuilder;

#[async_trait]
impl StoreBackendBuilder for InMemoryStoreBuilder {
    type Backend = InMemoryStore;

    async fn build(self) -> DriverResult<Self::Backend> {
        Ok(InMemoryStore::new())
    }
}
