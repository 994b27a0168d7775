//! Schema synchronization for the load stage of an extract-load pipeline.
//!
//! Upstream producers describe their records with JSON-schema-like
//! documents. Given a stream's schema, sluice makes sure a backing table
//! exists with compatible columns and grows it as the schema changes from
//! run to run:
//!
//! - missing tables are created, with the stream's key properties as the
//!   primary key
//! - new properties become new columns
//! - a property whose type changed gets a fresh column; the old one is
//!   renamed to `<column>_<YYYYMMDD>_<HHMM>` so no data is lost (or, in
//!   strict mode, the sync stops with [`Error::MigrationConflict`])
//!
//! Columns and tables are never dropped.
//!
//! # Dialects
//!
//! The engine is generic over a [`Dialect`]. Two are provided:
//! [`PostgresDialect`] (identity naming, `jsonb` for documents) and
//! [`SnowflakeDialect`] (uppercased names, `ARRAY`/`VARIANT`).
//!
//! ```ignore
//! let (client, connection) = tokio_postgres::connect(url, NoTls).await?;
//! tokio::spawn(connection);
//!
//! let config = TargetConfig::from_json_str(&config_json)?;
//! let dialect = PostgresDialect::new(client.traced(), config.postgres.unwrap_or_default());
//! let engine = MigrationEngine::new(dialect).with_config(config.sync);
//!
//! let columns = engine.sync_stream("users", ["id"], &schema).await?;
//! ```

mod clock;
mod config;
mod connection;
mod dialect;
mod engine;
mod error;
mod events;
mod plan;
pub mod postgres;
pub mod snowflake;

#[cfg(test)]
mod testing;

pub use clock::{Clock, FixedClock, SystemClock, versioned_column_name};
pub use config::{ConflictPolicy, PostgresConfig, SnowflakeConfig, SyncConfig, TargetConfig};
pub use connection::{BoxError, BoxFuture, Connection, ConnectionExt, Row, TracedConn};
pub use dialect::{ColumnType, DdlEmitter, Dialect, Introspector, NamingStrategy, TypeMapper};
pub use engine::MigrationEngine;
pub use error::Error;
pub use events::{Logger, SyncEvent, TracingLogger};
pub use plan::{Change, ColumnConflict, MigrationPlan, diff_table};
pub use postgres::{PgType, PostgresDialect};
pub use snowflake::{SnowflakeDialect, SnowflakeType};

pub use sluice_schema::{JsonType, PropertySchema, SchemaError, StreamSchema, TableSchema};
pub use sluice_sql::{ColumnName, TableName};

pub type Result<T> = std::result::Result<T, Error>;
