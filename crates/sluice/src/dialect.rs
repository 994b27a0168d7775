//! Capabilities a database backend provides to the migration engine.
//!
//! A backend is split into four narrow traits so each can be tested (or
//! faked) on its own:
//!
//! - [`TypeMapper`]: property schema to column type, pure
//! - [`Introspector`]: read the live table shape
//! - [`DdlEmitter`]: create the namespace and tables, add and rename columns
//! - [`NamingStrategy`]: stream and property names to SQL identifiers
//!
//! [`Dialect`] is the union the engine is generic over.

use std::fmt;
use std::future::Future;

use sluice_schema::{PropertySchema, TableSchema};
use sluice_sql::{ColumnName, TableName};

use crate::connection::BoxError;
use crate::config::ConflictPolicy;

/// A dialect's column type vocabulary.
///
/// The engine only ever compares types for equality and renders them for
/// logs and errors.
pub trait ColumnType: Clone + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {}

impl<T> ColumnType for T where T: Clone + Eq + fmt::Debug + fmt::Display + Send + Sync + 'static {}

pub trait TypeMapper {
    type ColumnType: ColumnType;

    /// Map a normalized property schema to a column type. Never fails.
    fn map_type(&self, schema: &PropertySchema) -> Self::ColumnType;
}

pub trait Introspector: TypeMapper {
    /// The live columns of `table` with canonicalized types, or `None` when
    /// the table does not exist in the target namespace.
    fn get_table(
        &self,
        table: &TableName,
    ) -> impl Future<Output = Result<Option<TableSchema<Self::ColumnType>>, BoxError>> + Send;
}

pub trait DdlEmitter: TypeMapper {
    /// Create the target namespace if it does not exist yet. Idempotent.
    fn ensure_namespace(&self) -> impl Future<Output = Result<(), BoxError>> + Send;

    fn create_table(
        &self,
        table: &TableName,
        key_columns: &[ColumnName],
        columns: &TableSchema<Self::ColumnType>,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    fn add_column(
        &self,
        table: &TableName,
        column: &ColumnName,
        ty: &Self::ColumnType,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;

    fn rename_column(
        &self,
        table: &TableName,
        from: &ColumnName,
        to: &ColumnName,
    ) -> impl Future<Output = Result<(), BoxError>> + Send;
}

/// How stream and property names become identifiers. Identity by default.
pub trait NamingStrategy {
    fn table_name(&self, stream_name: &str) -> TableName {
        TableName::from(stream_name)
    }

    fn column_name(&self, property_name: &str) -> ColumnName {
        ColumnName::from(property_name)
    }
}

/// Everything the engine needs from a backend.
pub trait Dialect: Introspector + DdlEmitter + NamingStrategy + Send + Sync {
    /// Force a conflict policy regardless of configuration.
    fn conflict_policy_override(&self) -> Option<ConflictPolicy> {
        None
    }
}
