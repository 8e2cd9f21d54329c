use async_trait::async_trait;
use bson::Document;
use futures::{StreamExt, TryStreamExt, stream};
use mea::mutex::Mutex;
use mongodb::{Client, ClientSession, Collection as MongoCollection, options::ClientOptions};
use std::{fmt, sync::Arc};

use docmapper_core::{
    backend::{DocumentStream, StoreBackend, StoreBackendBuilder, StoreTransaction},
    error::{DriverError, DriverResult},
};


#[derive(Debug, Clone)]
pub struct MongoDbStore {
    client: Client,
    database: String,
}

impl MongoDbStore {
    pub fn new(client: Client, database: String) -> Self {
        Self { client, database }
    }

    pub fn builder(dsn: &str, database: &str) -> MongoDbStoreBuilder {
        MongoDbStoreBuilder::new(dsn, database)
    }

    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        get_collection(&self.client, &self.database, collection_name)
    }
}

fn get_collection(client: &Client, database: &str, collection_name: &str) -> MongoCollection<Document> {
    client
        .database(database)
        .collection(collection_name)
}

#[async_trait]
impl StoreBackend for MongoDbStore {
    type Transaction = MongoDbTransaction;

    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DriverResult<()> {
        self.get_collection(collection)
            .insert_many(documents)
            .await
            .map_err(DriverError::backend)?;

        Ok(())
    }

    async fn query_documents(&self, filter: Document, collection: &str) -> DriverResult<DocumentStream> {
        Ok(
            self.get_collection(collection)
                .find(filter)
                .await
                .map_err(DriverError::backend)?
                .map_err(DriverError::backend)
                .boxed()
        )
    }

    async fn update_documents(&self, filter: Document, update: Document, collection: &str) -> DriverResult<u64> {
        Ok(
            self.get_collection(collection)
                .update_many(filter, update)
                .await
                .map_err(DriverError::backend)?
                .modified_count
        )
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> DriverResult<u64> {
        Ok(
            self.get_collection(collection)
                .delete_many(filter)
                .await
                .map_err(DriverError::backend)?
                .deleted_count
        )
    }

    async fn start_transaction(&self) -> DriverResult<Self::Transaction> {
        let mut session = self.client
            .start_session()
            .await
            .map_err(DriverError::backend)?;

        session
            .start_transaction()
            .await
            .map_err(DriverError::backend)?;

        Ok(MongoDbTransaction {
            client: self.client.clone(),
            database: self.database.clone(),
            session: Arc::new(Mutex::new(session)),
        })
    }

    async fn shutdown(self) -> DriverResult<()> {
        self.client.shutdown().await;

        Ok(())
    }
}

/// A [`StoreBackend`] whose operations all run in one MongoDB session and transaction.
///
/// Operations on clones are serialized through the shared session. Find results are read to
/// the end before they are returned, since a session cursor borrows its session.
#[derive(Clone)]
pub struct MongoDbTransaction {
    client: Client,
    database: String,
    session: Arc<Mutex<ClientSession>>,
}

impl fmt::Debug for MongoDbTransaction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("MongoDbTransaction")
            .field("database", &self.database)
            .finish_non_exhaustive()
    }
}

impl MongoDbTransaction {
    fn get_collection(&self, collection_name: &str) -> MongoCollection<Document> {
        get_collection(&self.client, &self.database, collection_name)
    }
}

#[async_trait]
impl StoreBackend for MongoDbTransaction {
    type Transaction = MongoDbTransaction;

    async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DriverResult<()> {
        let mut session = self.session.lock().await;

        self.get_collection(collection)
            .insert_many(documents)
            .session(&mut *session)
            .await
            .map_err(DriverError::backend)?;

        Ok(())
    }

    async fn query_documents(&self, filter: Document, collection: &str) -> DriverResult<DocumentStream> {
        let mut session = self.session.lock().await;

        let documents = self.get_collection(collection)
            .find(filter)
            .session(&mut *session)
            .await
            .map_err(DriverError::backend)?
            .stream(&mut *session)
            .try_collect::<Vec<Document>>()
            .await
            .map_err(DriverError::backend)?;

        Ok(stream::iter(documents.into_iter().map(Ok)).boxed())
    }

    async fn update_documents(&self, filter: Document, update: Document, collection: &str) -> DriverResult<u64> {
        let mut session = self.session.lock().await;

        Ok(
            self.get_collection(collection)
                .update_many(filter, update)
                .session(&mut *session)
                .await
                .map_err(DriverError::backend)?
                .modified_count
        )
    }

    async fn delete_documents(&self, filter: Document, collection: &str) -> DriverResult<u64> {
        let mut session = self.session.lock().await;

        Ok(
            self.get_collection(collection)
                .delete_many(filter)
                .session(&mut *session)
                .await
                .map_err(DriverError::backend)?
                .deleted_count
        )
    }

    async fn start_transaction(&self) -> DriverResult<Self::Transaction> {
        Err(DriverError::Transaction("nested transactions are not supported".to_string()))
    }
}

#[async_trait]
impl StoreTransaction for MongoDbTransaction {
    async fn commit(&self) -> DriverResult<()> {
        self.session
            .lock()
            .await
            .commit_transaction()
            .await
            .map_err(DriverError::backend)
    }

    async fn abort(&self) -> DriverResult<()> {
        self.session
            .lock()
            .await
            .abort_transaction()
            .await
            .map_err(DriverError::backend)
    }
}

pub struct MongoDbStoreBuilder {
    dsn: String,
    database: String,
}

impl MongoDbStoreBuilder {
    pub fn new(dsn: &str, database: &str) -> Self {
        Self {
            dsn: dsn.to_string(),
            database: database.to_string(),
        }
    }
}

#[async_trait]
impl StoreBackendBuilder for MongoDbStoreBuilder {
    type Backend = MongoDbStore;

    async fn build(self) -> DriverResult<Self::Backend> {
        Ok(MongoDbStore::new(
            Client::with_options(
                ClientOptions::parse(&self.dsn)
                    .await
                    .map_err(|e| DriverError::Initialization(e.to_string()))?,
            )
            .map_err(|e| DriverError::Initialization(e.to_string()))?,
            self.database,
        ))
    }
}
