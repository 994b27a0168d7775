//! Schema types for sluice.
//!
//! This crate contains the types shared between the migration engine and the
//! dialect backends:
//!
//! - [`PropertySchema`]: the JSON-schema-like description of one record property
//! - [`StreamSchema`]: a whole stream (name, key properties, ordered properties)
//! - [`TableSchema`]: an ordered column → type map, either live or desired
//!
//! plus the [`normalize`] pass that puts every `type` keyword in list form.

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use sluice_sql::ColumnName;

mod normalize;
mod stream;

pub use normalize::{is_normalized, normalize};
pub use stream::{SchemaError, StreamSchema};


/// A primitive JSON-schema type tag.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JsonType {
    Null,
    String,
    Number,
    Integer,
    Boolean,
    Object,
    Array,
    /// A tag outside the seven primitives. Never matches a mapping rule.
    #[serde(untagged)]
    Other(String),
}

/// The `type` keyword: either a bare tag or a list of tags.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TypeSpec {
    One(JsonType),
    Many(Vec<JsonType>),
}

impl TypeSpec {
    pub fn as_slice(&self) -> &[JsonType] {
        match self {
            TypeSpec::One(ty) => std::slice::from_ref(ty),
            TypeSpec::Many(tys) => tys,
        }
    }

    /// Canonical list form.
    pub fn into_list(self) -> Self {
        match self {
            TypeSpec::One(ty) => TypeSpec::Many(vec![ty]),
            many => many,
        }
    }
}

/// A recursive property descriptor.
///
/// Only the keywords that influence table shape are modelled; anything else
/// in the source document (`description`, `maxLength`, ...) is ignored.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PropertySchema {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub ty: Option<TypeSpec>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<IndexMap<String, PropertySchema>>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub items: Option<Box<PropertySchema>>,

    #[serde(rename = "oneOf", default, skip_serializing_if = "Option::is_none")]
    pub one_of: Option<Vec<PropertySchema>>,

    #[serde(rename = "anyOf", default, skip_serializing_if = "Option::is_none")]
    pub any_of: Option<Vec<PropertySchema>>,

    #[serde(rename = "allOf", default, skip_serializing_if = "Option::is_none")]
    pub all_of: Option<Vec<PropertySchema>>,
}

impl PropertySchema {
    /// Schema with a single type tag.
    pub fn of(ty: JsonType) -> Self {
        Self {
            ty: Some(TypeSpec::One(ty)),
            ..Default::default()
        }
    }

    /// Schema with a list of type tags.
    pub fn of_any(tys: impl IntoIterator<Item = JsonType>) -> Self {
        Self {
            ty: Some(TypeSpec::Many(tys.into_iter().collect())),
            ..Default::default()
        }
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }

    /// The declared type tags; empty when `type` is absent.
    pub fn types(&self) -> &[JsonType] {
        self.ty.as_ref().map(TypeSpec::as_slice).unwrap_or_default()
    }

    pub fn has_type(&self, ty: &JsonType) -> bool {
        self.types().contains(ty)
    }

    /// True when `format` is present and equal to `format`.
    pub fn has_format(&self, format: &str) -> bool {
        self.format.as_deref() == Some(format)
    }

    pub fn from_value(value: &serde_json::Value) -> Result<Self, serde_json::Error> {
        Self::deserialize(value)
    }
}

/// An ordered column → type mapping.
///
/// Iteration follows insertion order, which for a desired schema is the
/// stream's declared property order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableSchema<T> {
    columns: IndexMap<ColumnName, T>,
}

impl<T> TableSchema<T> {
    pub fn new() -> Self {
        Self {
            columns: IndexMap::new(),
        }
    }

    /// Insert a column, returning the previous type if the name was taken.
    pub fn insert(&mut self, name: ColumnName, ty: T) -> Option<T> {
        self.columns.insert(name, ty)
    }

    pub fn get(&self, name: &ColumnName) -> Option<&T> {
        self.columns.get(name)
    }

    pub fn contains(&self, name: &ColumnName) -> bool {
        self.columns.contains_key(name)
    }

    pub fn iter(&self) -> indexmap::map::Iter<'_, ColumnName, T> {
        self.columns.iter()
    }

    pub fn column_names(&self) -> impl Iterator<Item = &ColumnName> {
        self.columns.keys()
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }
}

impl<T> Default for TableSchema<T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<T> FromIterator<(ColumnName, T)> for TableSchema<T> {
    fn from_iter<I: IntoIterator<Item = (ColumnName, T)>>(iter: I) -> Self {
        Self {
            columns: iter.into_iter().collect(),
        }
    }
}

impl<'a, T> IntoIterator for &'a TableSchema<T> {
    type Item = (&'a ColumnName, &'a T);
    type IntoIter = indexmap::map::Iter<'a, ColumnName, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.iter()
    }
}

impl<T> IntoIterator for TableSchema<T> {
    type Item = (ColumnName, T);
    type IntoIter = indexmap::map::IntoIter<ColumnName, T>;

    fn into_iter(self) -> Self::IntoIter {
        self.columns.into_iter()
    }
}
