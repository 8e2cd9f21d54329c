//! Result documents exposed to the mapping layer.

use bson::{Bson, Document};

use docmapper_core::{
    error::DriverResult,
    output::{DatabaseOutput, FromPrimitive, decode_primitive},
    query::FieldKey,
};

use crate::document::mongo_key;

/// A read-only [`DatabaseOutput`] view over a BSON document.
#[derive(Debug, Clone, Copy)]
pub struct DocumentOutput<'a> {
    document: &'a Document,
}

impl<'a> DocumentOutput<'a> {
    pub fn new(document: &'a Document) -> Self {
        Self { document }
    }

    pub fn document(&self) -> &'a Document {
        self.document
    }

    /// Decodes the value stored under `key` as exactly `T`.
    pub fn decode<T: FromPrimitive>(&self, key: impl Into<FieldKey>) -> DriverResult<T> {
        decode_primitive(self.primitive(&key.into())?)
    }
}

impl DatabaseOutput for DocumentOutput<'_> {
    fn contains(&self, key: &FieldKey) -> bool {
        mongo_key(key)
            .map(|key| self.document.contains_key(key))
            .unwrap_or(false)
    }

    fn primitive(&self, key: &FieldKey) -> DriverResult<Option<&Bson>> {
        Ok(self.document.get(mongo_key(key)?))
    }

    fn nested(&self, key: &FieldKey) -> Option<Box<dyn DatabaseOutput + '_>> {
        let key = mongo_key(key).ok()?;

        match self.document.get(key) {
            Some(Bson::Document(document)) => Some(Box::new(DocumentOutput::new(document))),
            _ => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::{doc, oid::ObjectId};
    use docmapper_core::error::DriverError;

    #[test]
    fn decodes_exact_types() {
        let document = doc! { "name": "Alice", "age": 30, "score": 1.5 };
        let output = DocumentOutput::new(&document);

        assert_eq!(output.decode::<String>("name").unwrap(), "Alice");
        assert_eq!(output.decode::<i32>("age").unwrap(), 30);
        assert_eq!(output.decode::<f64>("score").unwrap(), 1.5);
        assert_eq!(output.document(), &document);
    }

    #[test]
    fn refuses_to_coerce() {
        let document = doc! { "age": 30_i32, "zip": "10001" };
        let output = DocumentOutput::new(&document);

        assert!(matches!(
            output.decode::<i64>("age"),
            Err(DriverError::ValueNotFound { found: Some(Bson::Int32(30)), .. })
        ));
        assert!(matches!(
            output.decode::<i32>("zip"),
            Err(DriverError::ValueNotFound { .. })
        ));
        assert!(matches!(
            output.decode::<String>("missing"),
            Err(DriverError::ValueNotFound { found: None, .. })
        ));
    }

    #[test]
    fn id_key_reads_underscore_id() {
        let id = ObjectId::new();
        let document = doc! { "_id": id };
        let output = DocumentOutput::new(&document);

        assert!(output.contains(&FieldKey::Id));
        assert_eq!(output.decode::<ObjectId>(FieldKey::Id).unwrap(), id);
    }

    #[test]
    fn aggregate_keys_fail() {
        let document = doc! {};
        let output = DocumentOutput::new(&document);

        assert!(!output.contains(&FieldKey::Aggregate));
        assert!(matches!(
            output.decode::<i32>(FieldKey::Aggregate),
            Err(DriverError::UnknownField(_))
        ));
    }

    #[test]
    fn nested_documents_are_views_too() {
        let document = doc! { "address": { "city": "NYC" }, "name": "Alice" };
        let output = DocumentOutput::new(&document);
        let address = output.nested(&FieldKey::name("address")).unwrap();

        assert_eq!(address.decode::<String>("city").unwrap(), "NYC");
        assert!(output.nested(&FieldKey::name("name")).is_none());
    }

    #[test]
    fn decodes_through_the_trait_object() {
        let document = doc! { "nickname": null };
        let output = DocumentOutput::new(&document);
        let output: &dyn DatabaseOutput = &output;

        assert!(output.contains(&FieldKey::name("nickname")));
        assert_eq!(output.decode::<Option<String>>("nickname").unwrap(), None);
    }
}
