//! Query translation from filter trees to MongoDB query syntax.
//!
//! This module compiles the abstract [`QueryFilter`] tree into a MongoDB predicate document.
//! Top-level filters are conjunctive: every filter is ANDed into the predicate accumulated so
//! far, and an OR relation only combines the members of one group.

use bson::{Bson, Document, doc};

use docmapper_core::{
    error::{DriverError, DriverResult},
    query::{FilterMethod, FilterRelation, FilterVisitor, QueryField, QueryFilter, QueryValue},
};

use crate::{document::mongo_path, primitive::PrimitiveConverter};

/// A MongoDB predicate that composes with AND and OR.
///
/// The empty predicate matches every document.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct NativeQuery(Document);

impl NativeQuery {
    /// The predicate matching every document.
    pub fn all() -> Self {
        NativeQuery(Document::new())
    }

    /// Wraps a raw predicate document.
    pub fn from_document(document: Document) -> Self {
        NativeQuery(document)
    }

    /// Returns `true` if this predicate matches every document.
    pub fn is_all(&self) -> bool {
        self.0.is_empty()
    }

    pub fn as_document(&self) -> &Document {
        &self.0
    }

    pub fn into_document(self) -> Document {
        self.0
    }

    /// Combines this predicate with another using logical AND.
    ///
    /// If this predicate is already an AND, the other one is appended to its list.
    pub fn and(self, other: NativeQuery) -> Self {
        if self.is_all() {
            return other;
        }
        if other.is_all() {
            return self;
        }

        self.combine("$and", other)
    }

    /// Combines this predicate with another using logical OR.
    ///
    /// If this predicate is already an OR, the other one is appended to its list.
    pub fn or(self, other: NativeQuery) -> Self {
        if self.is_all() || other.is_all() {
            return NativeQuery::all();
        }

        self.combine("$or", other)
    }

    fn combine(self, operator: &str, other: NativeQuery) -> Self {
        let mut document = self.0;
        let other = other.0;

        if document.len() == 1 {
            if let Ok(list) = document.get_array_mut(operator) {
                list.push(Bson::Document(other));
                return NativeQuery(document);
            }
        }

        NativeQuery(doc! { operator: [document, other] })
    }
}

impl From<NativeQuery> for Document {
    fn from(query: NativeQuery) -> Self {
        query.0
    }
}

/// Compiles filter lists into a [`NativeQuery`].
#[derive(Debug, Clone, Copy, Default)]
pub struct FilterCompiler {
    converter: PrimitiveConverter,
}

impl FilterCompiler {
    pub fn new(converter: PrimitiveConverter) -> Self {
        Self { converter }
    }

    /// Compiles `filters` left to right, ANDing each one into the result.
    pub fn compile(&self, filters: &[QueryFilter]) -> DriverResult<NativeQuery> {
        let mut visitor = MongoFilterTranslator { converter: self.converter };

        filters.iter().try_fold(NativeQuery::all(), |query, filter| {
            Ok(query.and(visitor.visit_filter(filter)?))
        })
    }
}

/// Translates single filter nodes into predicate fragments.
struct MongoFilterTranslator {
    converter: PrimitiveConverter,
}

impl FilterVisitor for MongoFilterTranslator {
    type Output = NativeQuery;

    fn visit_value(
        &mut self,
        field: &QueryField,
        method: &FilterMethod,
        value: &QueryValue,
    ) -> DriverResult<Self::Output> {
        let operator = match method {
            FilterMethod::Equality { inverse: false } => "$eq",
            FilterMethod::Equality { inverse: true } => "$ne",
            other => return Err(DriverError::UnknownQueryMethod(other.tag())),
        };
        let key = mongo_path(field)?.join(".");
        let primitive = self.converter.to_slot(value)?;

        Ok(NativeQuery(doc! { key: { operator: primitive } }))
    }

    fn visit_group(
        &mut self,
        filters: &[QueryFilter],
        relation: &FilterRelation,
    ) -> DriverResult<Self::Output> {
        let fragments = filters
            .iter()
            .map(|filter| self.visit_filter(filter))
            .collect::<DriverResult<Vec<_>>>()?;

        let reduced = match relation {
            FilterRelation::And => fragments.into_iter().reduce(NativeQuery::and),
            FilterRelation::Or => fragments.into_iter().reduce(NativeQuery::or),
            FilterRelation::Custom(tag) => return Err(DriverError::UnknownRelation(tag.clone())),
        };

        Ok(reduced.unwrap_or_default())
    }

    fn visit_custom(&mut self, tag: &str) -> DriverResult<Self::Output> {
        Err(DriverError::UnknownFilter(tag.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use docmapper_core::query::ContainsLocation;
    use proptest::prelude::*;

    fn compile(filters: &[QueryFilter]) -> DriverResult<Document> {
        FilterCompiler::default().compile(filters).map(Into::into)
    }

    fn eq(key: &str, value: QueryValue) -> QueryFilter {
        QueryFilter::eq(QueryField::path([key]), value)
    }

    #[test]
    fn no_filters_match_everything() {
        assert_eq!(compile(&[]).unwrap(), doc! {});
    }

    #[test]
    fn single_equality() {
        assert_eq!(
            compile(&[eq("age", QueryValue::bind(30))]).unwrap(),
            doc! { "age": { "$eq": 30 } }
        );
    }

    #[test]
    fn inverted_equality() {
        let filter = QueryFilter::ne(QueryField::path(["age"]), QueryValue::bind(30));

        assert_eq!(compile(&[filter]).unwrap(), doc! { "age": { "$ne": 30 } });
    }

    #[test]
    fn nested_paths_use_dot_notation() {
        let filter = QueryFilter::eq(QueryField::path(["address", "city"]), QueryValue::bind("NYC"));

        assert_eq!(compile(&[filter]).unwrap(), doc! { "address.city": { "$eq": "NYC" } });
    }

    #[test]
    fn qualified_paths_ignore_their_schema() {
        let filter = QueryFilter::eq(
            QueryField::qualified("users", ["address", "city"]),
            QueryValue::bind("NYC"),
        );

        assert_eq!(compile(&[filter]).unwrap(), doc! { "address.city": { "$eq": "NYC" } });
    }

    #[test]
    fn dotted_segments_are_not_split() {
        let filter = QueryFilter::eq(QueryField::path(["address.city"]), QueryValue::bind("NYC"));

        assert!(matches!(
            compile(&[filter]),
            Err(DriverError::UnknownField(tag)) if tag == "address.city"
        ));
    }

    #[test]
    fn siblings_are_conjunctive_in_order() {
        let compiled = compile(&[
            eq("name", QueryValue::bind("Alice")),
            eq("age", QueryValue::bind(30)),
            eq("active", QueryValue::bind(true)),
        ])
        .unwrap();

        assert_eq!(
            compiled,
            doc! { "$and": [
                { "name": { "$eq": "Alice" } },
                { "age": { "$eq": 30 } },
                { "active": { "$eq": true } },
            ] }
        );
    }

    #[test]
    fn or_group_is_anded_with_its_siblings() {
        let compiled = compile(&[
            eq("active", QueryValue::bind(true)),
            QueryFilter::any([
                eq("name", QueryValue::bind("Alice")),
                eq("name", QueryValue::bind("Bob")),
            ]),
        ])
        .unwrap();

        assert_eq!(
            compiled,
            doc! { "$and": [
                { "active": { "$eq": true } },
                { "$or": [
                    { "name": { "$eq": "Alice" } },
                    { "name": { "$eq": "Bob" } },
                ] },
            ] }
        );
    }

    #[test]
    fn lone_or_group() {
        let compiled = compile(&[QueryFilter::any([
            eq("name", QueryValue::bind("Alice")),
            eq("name", QueryValue::bind("Bob")),
        ])])
        .unwrap();

        assert_eq!(
            compiled,
            doc! { "$or": [
                { "name": { "$eq": "Alice" } },
                { "name": { "$eq": "Bob" } },
            ] }
        );
    }

    #[test]
    fn and_group_inside_or_group() {
        let compiled = compile(&[QueryFilter::any([
            QueryFilter::all([
                eq("name", QueryValue::bind("Alice")),
                eq("age", QueryValue::bind(30)),
            ]),
            eq("name", QueryValue::bind("Bob")),
        ])])
        .unwrap();

        assert_eq!(
            compiled,
            doc! { "$or": [
                { "$and": [
                    { "name": { "$eq": "Alice" } },
                    { "age": { "$eq": 30 } },
                ] },
                { "name": { "$eq": "Bob" } },
            ] }
        );
    }

    #[test]
    fn empty_group_matches_everything() {
        assert_eq!(compile(&[QueryFilter::any([])]).unwrap(), doc! {});
        assert_eq!(
            compile(&[QueryFilter::all([]), eq("age", QueryValue::bind(30))]).unwrap(),
            doc! { "age": { "$eq": 30 } }
        );
    }

    #[test]
    fn null_compares_against_null() {
        assert_eq!(
            compile(&[eq("deleted_at", QueryValue::Null)]).unwrap(),
            doc! { "deleted_at": { "$eq": null } }
        );
    }

    #[test]
    fn unsupported_methods_fail() {
        let filter = QueryFilter::Value {
            field: QueryField::path(["age"]),
            method: FilterMethod::Order { inverse: false, equality: false },
            value: QueryValue::bind(30),
        };

        assert!(matches!(
            compile(&[filter]),
            Err(DriverError::UnknownQueryMethod(tag)) if tag == "greaterThan"
        ));

        let filter = QueryFilter::Value {
            field: QueryField::path(["name"]),
            method: FilterMethod::Contains { inverse: false, location: ContainsLocation::Prefix },
            value: QueryValue::bind("Al"),
        };
        assert!(matches!(compile(&[filter]), Err(DriverError::UnknownQueryMethod(_))));
    }

    #[test]
    fn unsupported_relations_fail() {
        let filter = QueryFilter::Group {
            filters: vec![eq("a", QueryValue::bind(1))],
            relation: FilterRelation::Custom("xor".into()),
        };

        assert!(matches!(
            compile(&[filter]),
            Err(DriverError::UnknownRelation(tag)) if tag == "xor"
        ));
    }

    #[test]
    fn custom_filters_fail_even_when_nested() {
        let filter = QueryFilter::any([
            eq("a", QueryValue::bind(1)),
            QueryFilter::Custom("near".into()),
        ]);

        assert!(matches!(
            compile(&[filter]),
            Err(DriverError::UnknownFilter(tag)) if tag == "near"
        ));
    }

    #[test]
    fn unmappable_fields_fail() {
        let filter = QueryFilter::eq(QueryField::Aggregate("count".into()), QueryValue::bind(1));

        assert!(matches!(compile(&[filter]), Err(DriverError::UnknownField(_))));
    }

    #[test]
    fn raw_predicates_compose() {
        let query = NativeQuery::from_document(doc! { "a": 1 })
            .or(NativeQuery::from_document(doc! { "b": 2 }))
            .or(NativeQuery::from_document(doc! { "c": 3 }));

        assert_eq!(query.into_document(), doc! { "$or": [{ "a": 1 }, { "b": 2 }, { "c": 3 }] });
        assert!(NativeQuery::from_document(doc! { "a": 1 }).or(NativeQuery::all()).is_all());
    }

    proptest! {
        #[test]
        fn equality_lists_compile_to_an_ordered_conjunction(
            clauses in prop::collection::vec(("[a-z]{1,6}", any::<i32>()), 2..8),
        ) {
            let filters = clauses
                .iter()
                .map(|(key, value)| eq(key, QueryValue::bind(*value)))
                .collect::<Vec<_>>();

            let expected = clauses
                .iter()
                .map(|(key, value)| Bson::Document(doc! { key: { "$eq": *value } }))
                .collect::<Vec<_>>();

            prop_assert_eq!(compile(&filters).unwrap(), doc! { "$and": expected });
        }
    }
}
