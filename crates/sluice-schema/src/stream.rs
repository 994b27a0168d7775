//! Stream schemas as declared by upstream producers.

use indexmap::IndexMap;
use thiserror::Error;

use crate::{JsonType, PropertySchema, normalize};

/// Why a stream's schema cannot be synchronized.
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("schema is not valid JSON schema: {0}")]
    Malformed(#[from] serde_json::Error),

    #[error("root schema must be of type object, found {found:?}")]
    NotAnObject { found: Vec<JsonType> },

    #[error("root schema has no `properties`")]
    MissingProperties,

    #[error("stream declares no key properties")]
    NoKeyProperties,

    #[error("key property '{0}' is not a declared property")]
    UndeclaredKeyProperty(String),

    #[error("properties '{first}' and '{second}' both map to column '{column}'")]
    ColumnCollision {
        first: String,
        second: String,
        column: String,
    },
}

/// A stream's name, ordered key properties and ordered property schemas.
///
/// Only built through [`StreamSchema::new`], so the key properties are
/// always non-empty and declared.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamSchema {
    stream_name: String,
    key_properties: Vec<String>,
    properties: IndexMap<String, PropertySchema>,
}

impl StreamSchema {
    /// Build a stream schema from its root JSON-schema object.
    ///
    /// The root must be object-typed (or untyped) and carry `properties`;
    /// every key property must be one of them.
    pub fn new(
        stream_name: impl Into<String>,
        key_properties: impl IntoIterator<Item = impl Into<String>>,
        root: PropertySchema,
    ) -> Result<Self, SchemaError> {
        let types = root.types();
        if !types.is_empty() && !types.contains(&JsonType::Object) {
            return Err(SchemaError::NotAnObject {
                found: types.to_vec(),
            });
        }

        let properties = root.properties.ok_or(SchemaError::MissingProperties)?;
        let key_properties: Vec<String> = key_properties.into_iter().map(Into::into).collect();

        if key_properties.is_empty() {
            return Err(SchemaError::NoKeyProperties);
        }
        if let Some(undeclared) = key_properties
            .iter()
            .find(|key| !properties.contains_key(key.as_str()))
        {
            return Err(SchemaError::UndeclaredKeyProperty(undeclared.clone()));
        }

        Ok(Self {
            stream_name: stream_name.into(),
            key_properties,
            properties,
        })
    }

    /// Build a stream schema from a raw JSON document.
    pub fn from_value(
        stream_name: impl Into<String>,
        key_properties: impl IntoIterator<Item = impl Into<String>>,
        value: &serde_json::Value,
    ) -> Result<Self, SchemaError> {
        let root = PropertySchema::from_value(value)?;
        Self::new(stream_name, key_properties, root)
    }

    pub fn stream_name(&self) -> &str {
        &self.stream_name
    }

    pub fn key_properties(&self) -> &[String] {
        &self.key_properties
    }

    /// Property schemas in declared order.
    pub fn properties(&self) -> &IndexMap<String, PropertySchema> {
        &self.properties
    }

    /// A copy with every property schema normalized.
    pub fn normalized(&self) -> Self {
        Self {
            stream_name: self.stream_name.clone(),
            key_properties: self.key_properties.clone(),
            properties: self
                .properties
                .iter()
                .map(|(name, prop)| (name.clone(), normalize(prop)))
                .collect(),
        }
    }
}
