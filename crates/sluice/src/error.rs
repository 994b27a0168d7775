use sluice_schema::SchemaError;
use sluice_sql::TableName;
use thiserror::Error;

use crate::connection::BoxError;

#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid schema for stream '{stream}': {source}")]
    SchemaNormalization {
        stream: String,
        #[source]
        source: SchemaError,
    },

    #[error("failed to introspect table '{table}': {source}")]
    Introspection {
        table: TableName,
        #[source]
        source: BoxError,
    },

    #[error("column '{column}' on table '{table}' changed from {from} to {to}")]
    MigrationConflict {
        table: TableName,
        column: String,
        from: String,
        to: String,
    },

    #[error("failed to {change} on table '{table}': {source}")]
    DdlExecution {
        table: TableName,
        change: String,
        #[source]
        source: BoxError,
    },

    #[error("invalid configuration: {0}")]
    Config(String),
}
