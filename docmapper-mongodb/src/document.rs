//! Building stored documents from field assignments.

use bson::{Bson, Document};

use docmapper_core::{
    error::{DriverError, DriverResult},
    query::{FieldKey, QueryField, QueryValue},
};

use crate::primitive::PrimitiveConverter;

/// Maps a key segment to the key MongoDB stores it under.
///
/// Segments containing `.` are rejected, since filters address nested keys with dot notation.
pub(crate) fn mongo_key(key: &FieldKey) -> DriverResult<String> {
    match key {
        FieldKey::Id => Ok("_id".to_string()),
        FieldKey::Name(name) if name.contains('.') => Err(DriverError::UnknownField(key.to_string())),
        FieldKey::Name(name) => Ok(name.clone()),
        FieldKey::Aggregate => Err(DriverError::UnknownField(key.to_string())),
        FieldKey::Prefix(prefix, key) => Ok(mongo_key(prefix)? + &mongo_key(key)?),
    }
}

/// Resolves a field into its stored key segments, root first.
pub(crate) fn mongo_path(field: &QueryField) -> DriverResult<Vec<String>> {
    match field {
        QueryField::Path { path, .. } => path.iter().map(mongo_key).collect(),
        QueryField::Aggregate(tag) => Err(DriverError::UnknownField(format!("aggregate({tag})"))),
        QueryField::Custom(tag) => Err(DriverError::UnknownField(tag.clone())),
    }
}

/// Writes field assignments into nested documents.
///
/// Each field is paired with the value at the same position. Intermediate path segments are
/// materialized as empty sub-documents, replacing any non-document value already there, and
/// the converted value is written at the final segment. Later assignments overwrite earlier
/// ones on overlapping paths.
#[derive(Debug, Clone, Copy, Default)]
pub struct DocumentBuilder {
    converter: PrimitiveConverter,
}

impl DocumentBuilder {
    pub fn new(converter: PrimitiveConverter) -> Self {
        Self { converter }
    }

    /// Builds a new document from `fields` and the matching `values`.
    pub fn build(&self, fields: &[QueryField], values: &[QueryValue]) -> DriverResult<Document> {
        let mut document = Document::new();
        self.apply(&mut document, fields, values)?;

        Ok(document)
    }

    /// Writes `fields` and the matching `values` onto `target`.
    pub fn apply(
        &self,
        target: &mut Document,
        fields: &[QueryField],
        values: &[QueryValue],
    ) -> DriverResult<()> {
        if fields.len() != values.len() {
            return Err(DriverError::InputMismatch {
                fields: fields.len(),
                values: values.len(),
            });
        }

        for (field, value) in fields.iter().zip(values) {
            let path = mongo_path(field)?;
            let primitive = self.converter.to_slot(value)?;

            write_path(target, &path, primitive)?;
        }

        Ok(())
    }
}

fn write_path(target: &mut Document, path: &[String], primitive: Bson) -> DriverResult<()> {
    let Some((last, parents)) = path.split_last() else {
        return Ok(());
    };

    let mut current = target;
    for segment in parents {
        if !matches!(current.get(segment), Some(Bson::Document(_))) {
            current.insert(segment.clone(), Document::new());
        }
        current = current.get_document_mut(segment)?;
    }
    current.insert(last.clone(), primitive);

    Ok(())
}
