//! Typed access to stored documents.
//!
//! A store adapter hands each result document to the caller as a [`DatabaseOutput`]. Values
//! are decoded with [`FromPrimitive`], which only accepts a primitive whose runtime type is
//! exactly the requested one: a stored 32-bit integer never decodes as `i64`, a string never
//! parses into a number.

use bson::{
    Binary, Bson, DateTime, Decimal128, Document, Timestamp,
    oid::ObjectId,
    spec::BinarySubtype,
};
use std::{any::type_name, fmt::Debug};

use crate::{
    error::{DriverError, DriverResult},
    query::FieldKey,
};

/// A value that can be decoded from a stored primitive without coercion.
pub trait FromPrimitive: Sized {
    /// Decodes the primitive stored under a key, or `None` if it is missing or has another type.
    fn from_primitive(primitive: Option<&Bson>) -> Option<Self>;

    /// Name of this type, reported when decoding fails.
    fn type_name() -> &'static str {
        type_name::<Self>()
    }
}

/// Decodes `primitive` as `T`, failing with [`DriverError::ValueNotFound`] on any mismatch.
pub fn decode_primitive<T: FromPrimitive>(primitive: Option<&Bson>) -> DriverResult<T> {
    T::from_primitive(primitive).ok_or_else(|| DriverError::ValueNotFound {
        needed: T::type_name(),
        found: primitive.cloned(),
    })
}

macro_rules! strict_primitive {
    ($($ty:ty => $variant:ident),* $(,)?) => {
        $(
            impl FromPrimitive for $ty {
                fn from_primitive(primitive: Option<&Bson>) -> Option<Self> {
                    match primitive {
                        Some(Bson::$variant(value)) => Some(value.clone()),
                        _ => None,
                    }
                }
            }
        )*
    };
}

strict_primitive! {
    bool => Boolean,
    i32 => Int32,
    i64 => Int64,
    f64 => Double,
    String => String,
    Document => Document,
    Vec<Bson> => Array,
    Binary => Binary,
    ObjectId => ObjectId,
    DateTime => DateTime,
    Timestamp => Timestamp,
    Decimal128 => Decimal128,
}

impl FromPrimitive for Bson {
    fn from_primitive(primitive: Option<&Bson>) -> Option<Self> {
        primitive.cloned()
    }
}

impl FromPrimitive for chrono::DateTime<chrono::Utc> {
    fn from_primitive(primitive: Option<&Bson>) -> Option<Self> {
        match primitive {
            Some(Bson::DateTime(value)) => Some(value.to_chrono()),
            _ => None,
        }
    }
}

impl FromPrimitive for bson::Uuid {
    fn from_primitive(primitive: Option<&Bson>) -> Option<Self> {
        match primitive {
            Some(Bson::Binary(binary)) if binary.subtype == BinarySubtype::Uuid => {
                binary.to_uuid().ok()
            }
            _ => None,
        }
    }
}

impl FromPrimitive for uuid::Uuid {
    fn from_primitive(primitive: Option<&Bson>) -> Option<Self> {
        bson::Uuid::from_primitive(primitive).map(Into::into)
    }
}

/// Missing keys and stored nulls decode as `None`; anything else must match `T` exactly.
impl<T: FromPrimitive> FromPrimitive for Option<T> {
    fn from_primitive(primitive: Option<&Bson>) -> Option<Self> {
        match primitive {
            None | Some(Bson::Null) => Some(None),
            Some(_) => T::from_primitive(primitive).map(Some),
        }
    }
}

/// A read-only view over one result document.
pub trait DatabaseOutput: Send + Sync + Debug {
    /// Returns `true` if the document has a value (possibly null) under `key`.
    fn contains(&self, key: &FieldKey) -> bool;

    /// Returns the primitive stored under `key`.
    ///
    /// Fails if `key` cannot be mapped to a stored key.
    fn primitive(&self, key: &FieldKey) -> DriverResult<Option<&Bson>>;

    /// Returns a view over the sub-document stored under `key`.
    fn nested(&self, key: &FieldKey) -> Option<Box<dyn DatabaseOutput + '_>>;
}

impl dyn DatabaseOutput + '_ {
    /// Decodes the value stored under `key` as `T`.
    ///
    /// # Example
    ///
    /// ```ignore
    /// let name: String = output.decode("name")?;
    /// let nickname: Option<String> = output.decode("nickname")?;
    /// ```
    pub fn decode<T: FromPrimitive>(&self, key: impl Into<FieldKey>) -> DriverResult<T> {
        decode_primitive(self.primitive(&key.into())?)
    }
}
