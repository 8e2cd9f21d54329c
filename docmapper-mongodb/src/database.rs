//! Query dispatch and transactions over a store backend.

use async_trait::async_trait;
use bson::doc;
use futures::TryStreamExt;
use std::future::Future;
use tracing::{debug, warn};

use docmapper_core::{
    backend::{StoreBackend, StoreTransaction},
    config::DriverConfig,
    database::{Database, DatabaseSchema, OutputHandler, QueryOutcome},
    error::{DriverError, DriverResult},
    query::{DatabaseQuery, QueryAction},
};

use crate::{
    document::DocumentBuilder,
    filter::FilterCompiler,
    output::DocumentOutput,
    primitive::PrimitiveConverter,
};

/// A [`Database`] adapter that translates abstract queries into MongoDB documents and
/// predicates and runs them on a [`StoreBackend`].
///
/// Translation always completes before the backend is called, so a query that cannot be
/// translated never reaches the store.
///
/// # Example
///
/// ```ignore
/// use docmapper::{prelude::*, mongodb::{MongoDatabase, MongoDbStore}};
///
/// let store = MongoDbStore::builder("mongodb://localhost:27017", "app").build().await?;
/// let database = MongoDatabase::new(store);
///
/// database.execute(&query, &mut |output| {
///     println!("{}", output.decode::<String>("name")?);
///     Ok(())
/// }).await?;
/// ```
#[derive(Debug, Clone)]
pub struct MongoDatabase<B> {
    backend: B,
    config: DriverConfig,
}

impl<B: StoreBackend> MongoDatabase<B> {
    /// Creates a database over `backend` with the default settings.
    pub fn new(backend: B) -> Self {
        Self::with_config(backend, DriverConfig::default())
    }

    pub fn with_config(backend: B, config: DriverConfig) -> Self {
        Self { backend, config }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub fn config(&self) -> &DriverConfig {
        &self.config
    }

    fn converter(&self) -> PrimitiveConverter {
        PrimitiveConverter::new(self.config.bind_failure)
    }

    fn document_builder(&self) -> DocumentBuilder {
        DocumentBuilder::new(self.converter())
    }

    fn filter_compiler(&self) -> FilterCompiler {
        FilterCompiler::new(self.converter())
    }
}

#[async_trait]
impl<B: StoreBackend> Database for MongoDatabase<B> {
    async fn execute(
        &self,
        query: &DatabaseQuery,
        on_output: &mut OutputHandler<'_>,
    ) -> DriverResult<QueryOutcome> {
        debug!(
            target: "docmapper::query",
            collection = %query.collection,
            action = ?query.action,
            "Dispatching query"
        );

        match &query.action {
            QueryAction::Create => {
                if query.input.is_empty() {
                    return Err(DriverError::MissingInput("create".to_string()));
                }

                let builder = self.document_builder();
                let documents = query
                    .input
                    .iter()
                    .map(|row| builder.build(&query.fields, row))
                    .collect::<DriverResult<Vec<_>>>()?;
                let created = documents.len();

                self.backend
                    .insert_documents(documents, &query.collection)
                    .await?;

                Ok(QueryOutcome::Created(created))
            }
            QueryAction::Read => {
                let filter = self.filter_compiler().compile(&query.filters)?;
                let mut documents = self
                    .backend
                    .query_documents(filter.into_document(), &query.collection)
                    .await?;

                let mut read = 0;
                while let Some(document) = documents.try_next().await? {
                    on_output(&DocumentOutput::new(&document))?;
                    read += 1;
                }

                Ok(QueryOutcome::Read(read))
            }
            QueryAction::Update => {
                let filter = self.filter_compiler().compile(&query.filters)?;
                let row = query
                    .input
                    .first()
                    .ok_or_else(|| DriverError::MissingInput("update".to_string()))?;
                let document = self.document_builder().build(&query.fields, row)?;

                let updated = self
                    .backend
                    .update_documents(
                        filter.into_document(),
                        doc! { "$set": document },
                        &query.collection,
                    )
                    .await?;

                Ok(QueryOutcome::Updated(updated))
            }
            QueryAction::Delete => {
                let filter = self.filter_compiler().compile(&query.filters)?;
                let deleted = self
                    .backend
                    .delete_documents(filter.into_document(), &query.collection)
                    .await?;

                Ok(QueryOutcome::Deleted(deleted))
            }
            QueryAction::Custom(tag) => Err(DriverError::UnknownOperation(tag.clone())),
        }
    }

    async fn execute_schema(&self, schema: &DatabaseSchema) -> DriverResult<()> {
        // Collections are created implicitly on first insert.
        debug!(
            target: "docmapper::schema",
            schema = %schema.schema,
            action = ?schema.action,
            "Schema change accepted"
        );

        Ok(())
    }

    async fn transaction<T, F, Fut>(&self, continuation: F) -> DriverResult<T>
    where
        Self: Sized,
        T: Send,
        F: FnOnce(Box<dyn Database>) -> Fut + Send,
        Fut: Future<Output = DriverResult<T>> + Send,
    {
        let transaction = self.backend.start_transaction().await?;
        debug!(target: "docmapper::txn", "Transaction started");

        let scoped = MongoDatabase::with_config(transaction.clone(), self.config.clone());

        match continuation(Box::new(scoped)).await {
            Ok(value) => {
                transaction.commit().await?;
                debug!(target: "docmapper::txn", "Transaction committed");

                Ok(value)
            }
            Err(err) => {
                match transaction.abort().await {
                    Ok(()) => debug!(target: "docmapper::txn", error = %err, "Transaction aborted"),
                    Err(abort_err) => warn!(
                        target: "docmapper::txn",
                        error = %err,
                        abort_error = %abort_err,
                        "Transaction abort failed"
                    ),
                }

                Err(err)
            }
        }
    }

    async fn shutdown(self) -> DriverResult<()>
    where
        Self: Sized,
    {
        self.backend.shutdown().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::Document;
    use docmapper_core::{
        backend::DocumentStream,
        query::{QueryField, QueryFilter, QueryValue},
    };
    use futures::stream;
    use std::sync::{Arc, Mutex};

    /// Records every call and serves a fixed set of documents.
    #[derive(Debug, Clone, Default)]
    struct RecordingBackend {
        calls: Arc<Mutex<Vec<String>>>,
        served: Vec<Document>,
        failing: Option<&'static str>,
    }

    impl RecordingBackend {
        fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }

        fn record(&self, call: String) {
            self.calls.lock().unwrap().push(call);
        }

        fn lifecycle(&self, step: &'static str) -> DriverResult<()> {
            self.record(step.to_string());

            match self.failing {
                Some(failing) if failing == step => Err(DriverError::Transaction(format!("{step} failed"))),
                _ => Ok(()),
            }
        }
    }

    #[async_trait]
    impl StoreBackend for RecordingBackend {
        type Transaction = RecordingBackend;

        async fn insert_documents(&self, documents: Vec<Document>, collection: &str) -> DriverResult<()> {
            self.record(format!("insert {collection} {documents:?}"));
            Ok(())
        }

        async fn query_documents(&self, filter: Document, collection: &str) -> DriverResult<DocumentStream> {
            self.record(format!("find {collection} {filter}"));
            Ok(Box::pin(stream::iter(self.served.clone().into_iter().map(Ok))))
        }

        async fn update_documents(&self, filter: Document, update: Document, collection: &str) -> DriverResult<u64> {
            self.record(format!("update {collection} {filter} {update}"));
            Ok(2)
        }

        async fn delete_documents(&self, filter: Document, collection: &str) -> DriverResult<u64> {
            self.record(format!("delete {collection} {filter}"));
            Ok(3)
        }

        async fn start_transaction(&self) -> DriverResult<Self::Transaction> {
            self.lifecycle("start")?;
            Ok(self.clone())
        }
    }

    #[async_trait]
    impl StoreTransaction for RecordingBackend {
        async fn commit(&self) -> DriverResult<()> {
            self.lifecycle("commit")
        }

        async fn abort(&self) -> DriverResult<()> {
            self.lifecycle("abort")
        }
    }

    async fn run(database: &MongoDatabase<RecordingBackend>, query: &DatabaseQuery) -> DriverResult<QueryOutcome> {
        database.execute(query, &mut |_| Ok(())).await
    }

    #[tokio::test]
    async fn create_builds_one_document_per_row() {
        let database = MongoDatabase::new(RecordingBackend::default());
        let query = DatabaseQuery::builder("users")
            .action(QueryAction::Create)
            .field(QueryField::path(["name"]))
            .input([QueryValue::bind("Alice")])
            .input([QueryValue::bind("Bob")])
            .build();

        assert_eq!(run(&database, &query).await.unwrap(), QueryOutcome::Created(2));
        assert_eq!(database.backend().calls().len(), 1);
        assert!(database.backend().calls()[0].starts_with("insert users"));
    }

    #[tokio::test]
    async fn create_without_input_fails_before_the_store() {
        let database = MongoDatabase::new(RecordingBackend::default());
        let query = DatabaseQuery::builder("users")
            .action(QueryAction::Create)
            .field(QueryField::path(["name"]))
            .build();

        assert!(matches!(run(&database, &query).await, Err(DriverError::MissingInput(_))));
        assert!(database.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn update_without_input_fails_before_the_store() {
        let database = MongoDatabase::new(RecordingBackend::default());
        let query = DatabaseQuery::builder("users")
            .action(QueryAction::Update)
            .field(QueryField::path(["name"]))
            .filter(QueryFilter::eq(QueryField::path(["name"]), QueryValue::bind("Alice")))
            .build();

        assert!(matches!(
            run(&database, &query).await,
            Err(DriverError::MissingInput(action)) if action == "update"
        ));
        assert!(database.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn read_streams_documents_in_order() {
        let backend = RecordingBackend {
            served: vec![doc! { "name": "Alice" }, doc! { "name": "Bob" }],
            ..Default::default()
        };
        let database = MongoDatabase::new(backend);
        let query = DatabaseQuery::builder("users").build();

        let mut names = Vec::new();
        let outcome = database
            .execute(&query, &mut |output| {
                names.push(output.decode::<String>("name")?);
                Ok(())
            })
            .await
            .unwrap();

        assert_eq!(outcome, QueryOutcome::Read(2));
        assert_eq!(names, ["Alice", "Bob"]);
    }

    #[tokio::test]
    async fn read_stops_at_the_first_decode_failure() {
        let backend = RecordingBackend {
            served: vec![doc! { "age": 1 }, doc! { "age": "two" }, doc! { "age": 3 }],
            ..Default::default()
        };
        let database = MongoDatabase::new(backend);
        let query = DatabaseQuery::builder("users").build();

        let mut ages = Vec::new();
        let result = database
            .execute(&query, &mut |output| {
                ages.push(output.decode::<i32>("age")?);
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(DriverError::ValueNotFound { .. })));
        assert_eq!(ages, [1]);
    }

    #[tokio::test]
    async fn update_sets_the_built_document() {
        let database = MongoDatabase::new(RecordingBackend::default());
        let query = DatabaseQuery::builder("users")
            .action(QueryAction::Update)
            .field(QueryField::path(["address", "city"]))
            .filter(QueryFilter::eq(QueryField::path(["name"]), QueryValue::bind("Alice")))
            .input([QueryValue::bind("NYC")])
            .build();

        assert_eq!(run(&database, &query).await.unwrap(), QueryOutcome::Updated(2));

        let expected = format!(
            "update users {} {}",
            doc! { "name": { "$eq": "Alice" } },
            doc! { "$set": { "address": { "city": "NYC" } } },
        );
        assert_eq!(database.backend().calls(), [expected]);
    }

    #[tokio::test]
    async fn delete_reports_the_deleted_count() {
        let database = MongoDatabase::new(RecordingBackend::default());
        let query = DatabaseQuery::builder("users")
            .action(QueryAction::Delete)
            .filter(QueryFilter::ne(QueryField::path(["age"]), QueryValue::bind(30)))
            .build();

        assert_eq!(run(&database, &query).await.unwrap(), QueryOutcome::Deleted(3));
    }

    #[tokio::test]
    async fn custom_actions_never_reach_the_store() {
        let database = MongoDatabase::new(RecordingBackend::default());
        let query = DatabaseQuery::builder("users")
            .action(QueryAction::Custom("aggregateSum".into()))
            .build();

        assert!(matches!(
            run(&database, &query).await,
            Err(DriverError::UnknownOperation(tag)) if tag == "aggregateSum"
        ));
        assert!(database.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn translation_failures_never_reach_the_store() {
        let database = MongoDatabase::new(RecordingBackend::default());
        let query = DatabaseQuery::builder("users")
            .action(QueryAction::Delete)
            .filter(QueryFilter::Custom("near".into()))
            .build();

        assert!(matches!(run(&database, &query).await, Err(DriverError::UnknownFilter(_))));
        assert!(database.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn schema_changes_are_accepted() {
        let database = MongoDatabase::new(RecordingBackend::default());
        let schema = DatabaseSchema::new("users", docmapper_core::database::SchemaAction::Create);

        database.execute_schema(&schema).await.unwrap();
        assert!(database.backend().calls().is_empty());
    }

    #[tokio::test]
    async fn transaction_commits_on_success() {
        let database = MongoDatabase::new(RecordingBackend::default());
        let query = DatabaseQuery::builder("users")
            .action(QueryAction::Delete)
            .build();

        let outcome = database
            .transaction(move |tx| async move { tx.execute(&query, &mut |_| Ok(())).await })
            .await
            .unwrap();

        assert_eq!(outcome, QueryOutcome::Deleted(3));
        assert_eq!(
            database.backend().calls(),
            ["start".to_string(), format!("delete users {}", doc! {}), "commit".to_string()]
        );
    }

    #[tokio::test]
    async fn transaction_aborts_on_failure() {
        let database = MongoDatabase::new(RecordingBackend::default());

        let result: DriverResult<()> = database
            .transaction(|_tx| async { Err(DriverError::Transaction("rolled back".into())) })
            .await;

        assert!(matches!(result, Err(DriverError::Transaction(_))));
        assert_eq!(database.backend().calls(), ["start", "abort"]);
    }

    fn failing_on(step: &'static str) -> MongoDatabase<RecordingBackend> {
        MongoDatabase::new(RecordingBackend { failing: Some(step), ..Default::default() })
    }

    #[tokio::test]
    async fn failed_start_skips_the_continuation() {
        let database = failing_on("start");
        let called = Arc::new(Mutex::new(false));
        let flag = called.clone();

        let result = database
            .transaction(move |_tx| async move {
                *flag.lock().unwrap() = true;
                Ok(())
            })
            .await;

        assert!(matches!(result, Err(DriverError::Transaction(msg)) if msg == "start failed"));
        assert!(!*called.lock().unwrap());
        assert_eq!(database.backend().calls(), ["start"]);
    }

    #[tokio::test]
    async fn failed_commit_is_reported() {
        let database = failing_on("commit");

        let result = database.transaction(|_tx| async { Ok(1) }).await;

        assert!(matches!(result, Err(DriverError::Transaction(msg)) if msg == "commit failed"));
        assert_eq!(database.backend().calls(), ["start", "commit"]);
    }

    #[tokio::test]
    async fn failed_abort_keeps_the_original_error() {
        let database = failing_on("abort");

        let result: DriverResult<()> = database
            .transaction(|_tx| async { Err(DriverError::UnknownOperation("upsert".into())) })
            .await;

        assert!(matches!(result, Err(DriverError::UnknownOperation(tag)) if tag == "upsert"));
        assert_eq!(database.backend().calls(), ["start", "abort"]);
    }
}
