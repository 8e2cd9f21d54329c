//! The abstract, storage-agnostic query model.
//!
//! A [`DatabaseQuery`] describes one CRUD operation against a collection: which action to
//! run, which fields to write, which filters to apply and which input rows to store. Store
//! adapters translate it into their own document and query language.
//!
//! # Query Building
//!
//! Queries can be constructed using the fluent builder API:
//!
//! ```ignore
//! use docmapper::query::{DatabaseQuery, QueryAction, QueryField, QueryFilter, QueryValue};
//!
//! let query = DatabaseQuery::builder("users")
//!     .action(QueryAction::Read)
//!     .filter(QueryFilter::eq(QueryField::path(["age"]), QueryValue::bind(30)))
//!     .build();
//! ```

use bson::{Bson, ser::serialize_to_bson};
use std::{collections::BTreeMap, fmt, sync::Arc};

use crate::error::DriverResult;

/// The operation a query performs.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryAction {
    /// Insert new documents.
    Create,
    /// Find documents matching the filters.
    Read,
    /// Update documents matching the filters.
    Update,
    /// Delete documents matching the filters.
    Delete,
    /// An adapter-specific action identified by a tag.
    Custom(String),
}

/// A single segment of a field path.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FieldKey {
    /// The document identifier.
    Id,
    /// A named key.
    Name(String),
    /// The result of an aggregate function.
    Aggregate,
    /// Two keys joined into one, e.g. `address` + `_city`.
    Prefix(Box<FieldKey>, Box<FieldKey>),
}

impl FieldKey {
    /// Creates a named key.
    pub fn name(name: impl Into<String>) -> Self {
        FieldKey::Name(name.into())
    }

    /// Creates a key made of `prefix` immediately followed by `key`.
    pub fn prefix(prefix: FieldKey, key: FieldKey) -> Self {
        FieldKey::Prefix(Box::new(prefix), Box::new(key))
    }
}

impl From<&str> for FieldKey {
    fn from(value: &str) -> Self {
        FieldKey::Name(value.to_string())
    }
}

impl From<String> for FieldKey {
    fn from(value: String) -> Self {
        FieldKey::Name(value)
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldKey::Id => f.write_str("id"),
            FieldKey::Name(name) => f.write_str(name),
            FieldKey::Aggregate => f.write_str("aggregate"),
            FieldKey::Prefix(prefix, key) => write!(f, "{prefix}{key}"),
        }
    }
}

/// A field referenced by a query, either as a write target or a filter subject.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueryField {
    /// An aggregate over a field (count, sum, ...), identified by a tag.
    Aggregate(String),
    /// A (possibly nested) path inside a document.
    Path {
        /// Segments from the document root to the target key.
        path: Vec<FieldKey>,
        /// Entity the path is qualified with, if any.
        schema: Option<String>,
        /// Alias of the qualifying entity, if any.
        alias: Option<String>,
    },
    /// An adapter-specific field identified by a tag.
    Custom(String),
}

impl QueryField {
    /// Creates an unqualified path field.
    pub fn path<K: Into<FieldKey>>(path: impl IntoIterator<Item = K>) -> Self {
        QueryField::Path {
            path: path.into_iter().map(Into::into).collect(),
            schema: None,
            alias: None,
        }
    }

    /// Creates a path field qualified with an entity name.
    pub fn qualified<K: Into<FieldKey>>(
        schema: impl Into<String>,
        path: impl IntoIterator<Item = K>,
    ) -> Self {
        QueryField::Path {
            path: path.into_iter().map(Into::into).collect(),
            schema: Some(schema.into()),
            alias: None,
        }
    }
}

/// Where a `Contains` comparison looks for its operand.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ContainsLocation {
    Prefix,
    Suffix,
    Anywhere,
}

/// The comparison a basic filter applies.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterMethod {
    /// `==`, or `!=` when inverted.
    Equality { inverse: bool },
    /// `<`, `<=`, `>`, `>=`.
    Order { inverse: bool, equality: bool },
    /// Membership in a set of values.
    Subset { inverse: bool },
    /// Substring containment.
    Contains { inverse: bool, location: ContainsLocation },
    /// An adapter-specific comparison identified by a tag.
    Custom(String),
}

impl FilterMethod {
    /// Short tag naming the method, used in error diagnostics.
    pub fn tag(&self) -> String {
        match self {
            FilterMethod::Equality { inverse: false } => "equal".to_string(),
            FilterMethod::Equality { inverse: true } => "notEqual".to_string(),
            FilterMethod::Order { inverse: false, equality: false } => "greaterThan".to_string(),
            FilterMethod::Order { inverse: false, equality: true } => "greaterThanOrEqual".to_string(),
            FilterMethod::Order { inverse: true, equality: false } => "lessThan".to_string(),
            FilterMethod::Order { inverse: true, equality: true } => "lessThanOrEqual".to_string(),
            FilterMethod::Subset { inverse: false } => "subset".to_string(),
            FilterMethod::Subset { inverse: true } => "notSubset".to_string(),
            FilterMethod::Contains { inverse, location } => format!(
                "{}contains({:?})",
                if *inverse { "not" } else { "" },
                location,
            ),
            FilterMethod::Custom(tag) => tag.clone(),
        }
    }
}

/// How the members of a filter group are combined.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FilterRelation {
    And,
    Or,
    /// An adapter-specific relation identified by a tag.
    Custom(String),
}

/// A node of a filter tree.
#[derive(Debug, Clone)]
pub enum QueryFilter {
    /// Compares one field against one value.
    Value {
        field: QueryField,
        method: FilterMethod,
        value: QueryValue,
    },
    /// Combines member filters with a relation.
    Group {
        filters: Vec<QueryFilter>,
        relation: FilterRelation,
    },
    /// An adapter-specific filter identified by a tag.
    Custom(String),
}

impl QueryFilter {
    /// Creates an equality filter.
    pub fn eq(field: QueryField, value: QueryValue) -> Self {
        QueryFilter::Value {
            field,
            method: FilterMethod::Equality { inverse: false },
            value,
        }
    }

    /// Creates an inequality filter.
    pub fn ne(field: QueryField, value: QueryValue) -> Self {
        QueryFilter::Value {
            field,
            method: FilterMethod::Equality { inverse: true },
            value,
        }
    }

    /// Creates a group whose members must all match.
    pub fn all(filters: impl IntoIterator<Item = QueryFilter>) -> Self {
        QueryFilter::Group {
            filters: filters.into_iter().collect(),
            relation: FilterRelation::And,
        }
    }

    /// Creates a group where any member may match.
    pub fn any(filters: impl IntoIterator<Item = QueryFilter>) -> Self {
        QueryFilter::Group {
            filters: filters.into_iter().collect(),
            relation: FilterRelation::Or,
        }
    }
}

/// A value that can be encoded into a stored primitive.
///
/// Implemented for every `Serialize` type through the `bson` serializer. Encoding can fail,
/// e.g. for unsigned integers that do not fit a signed 64-bit primitive.
pub trait Encodable: fmt::Debug + Send + Sync {
    /// Encodes this value into a primitive.
    fn encode_primitive(&self) -> DriverResult<Bson>;
}

impl<T> Encodable for T
where
    T: serde::Serialize + fmt::Debug + Send + Sync,
{
    fn encode_primitive(&self) -> DriverResult<Bson> {
        Ok(serialize_to_bson(self)?)
    }
}

/// An opaque, cheaply cloneable handle over a bound [`Encodable`] value.
#[derive(Debug, Clone)]
pub struct BoundValue(Arc<dyn Encodable>);

impl BoundValue {
    pub fn new(value: impl Encodable + 'static) -> Self {
        BoundValue(Arc::new(value))
    }

    /// Encodes the bound value into a primitive.
    pub fn encode(&self) -> DriverResult<Bson> {
        self.0.encode_primitive()
    }
}

/// An abstract value supplied by the mapping layer.
#[derive(Debug, Clone)]
pub enum QueryValue {
    Array(Vec<QueryValue>),
    Null,
    /// An application value that is encoded when the query is translated.
    Bind(BoundValue),
    Dictionary(BTreeMap<String, QueryValue>),
    /// An adapter-specific value identified by a tag.
    Custom(String),
}

impl QueryValue {
    /// Binds an application value.
    pub fn bind(value: impl Encodable + 'static) -> Self {
        QueryValue::Bind(BoundValue::new(value))
    }

    /// Creates a dictionary value from key/value pairs.
    pub fn dictionary<K: Into<String>>(entries: impl IntoIterator<Item = (K, QueryValue)>) -> Self {
        QueryValue::Dictionary(
            entries
                .into_iter()
                .map(|(key, value)| (key.into(), value))
                .collect(),
        )
    }
}

/// A complete abstract query against one collection.
#[derive(Debug, Clone)]
pub struct DatabaseQuery {
    /// The target collection.
    pub collection: String,
    /// The operation to perform.
    pub action: QueryAction,
    /// Write targets, positionally matched with each input row.
    pub fields: Vec<QueryField>,
    /// Filters, implicitly combined with AND.
    pub filters: Vec<QueryFilter>,
    /// Rows of values to write.
    pub input: Vec<Vec<QueryValue>>,
}

impl DatabaseQuery {
    /// Creates a read query with no filters against `collection`.
    pub fn new(collection: impl Into<String>) -> Self {
        DatabaseQuery {
            collection: collection.into(),
            action: QueryAction::Read,
            fields: Vec::new(),
            filters: Vec::new(),
            input: Vec::new(),
        }
    }

    /// Creates a new query builder for fluent construction.
    pub fn builder(collection: impl Into<String>) -> QueryBuilder {
        QueryBuilder::new(collection)
    }
}

#[derive(Debug, Clone)]
pub struct QueryBuilder {
    query: DatabaseQuery,
}

impl QueryBuilder {
    /// Creates a new query builder.
    pub fn new(collection: impl Into<String>) -> Self {
        QueryBuilder { query: DatabaseQuery::new(collection) }
    }

    /// Sets the action for this query.
    pub fn action(mut self, action: QueryAction) -> Self {
        self.query.action = action;
        self
    }

    /// Appends a write target.
    pub fn field(mut self, field: QueryField) -> Self {
        self.query.fields.push(field);
        self
    }

    /// Appends a filter. Filters are combined with AND in the order they are added.
    pub fn filter(mut self, filter: QueryFilter) -> Self {
        self.query.filters.push(filter);
        self
    }

    /// Appends an input row.
    pub fn input(mut self, row: impl IntoIterator<Item = QueryValue>) -> Self {
        self.query.input.push(row.into_iter().collect());
        self
    }

    /// Builds and returns the final query.
    pub fn build(self) -> DatabaseQuery {
        self.query
    }
}

/// Visits the nodes of a filter tree.
///
/// Translators implement the per-variant methods and call [`FilterVisitor::visit_filter`]
/// to dispatch on a node.
pub trait FilterVisitor {
    type Output;

    fn visit_value(
        &mut self,
        field: &QueryField,
        method: &FilterMethod,
        value: &QueryValue,
    ) -> DriverResult<Self::Output>;
    fn visit_group(
        &mut self,
        filters: &[QueryFilter],
        relation: &FilterRelation,
    ) -> DriverResult<Self::Output>;
    fn visit_custom(&mut self, tag: &str) -> DriverResult<Self::Output>;

    fn visit_filter(&mut self, filter: &QueryFilter) -> DriverResult<Self::Output> {
        match filter {
            QueryFilter::Value { field, method, value } => self.visit_value(field, method, value),
            QueryFilter::Group { filters, relation } => self.visit_group(filters, relation),
            QueryFilter::Custom(tag) => self.visit_custom(tag),
        }
    }
}
