//! Progress events emitted while a table is synchronized.

use std::fmt;

use sluice_sql::{ColumnName, TableName};

/// Something that happened during a sync.
///
/// Types are carried already rendered, so one logger serves every dialect.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    /// The table did not exist and is being created.
    CreatingTable { table: TableName, columns: usize },
    /// A desired column is missing from the live table.
    AddingColumn {
        table: TableName,
        column: ColumnName,
        ty: String,
    },
    /// A column's type changed; the old column is renamed out of the way.
    VersioningColumn {
        table: TableName,
        column: ColumnName,
        renamed_to: ColumnName,
        from: String,
        to: String,
    },
    /// A column already has the desired type.
    ColumnUpToDate { table: TableName, column: ColumnName },
}

impl fmt::Display for SyncEvent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SyncEvent::CreatingTable { table, columns } => {
                write!(f, "creating table {table} with {columns} columns")
            }
            SyncEvent::AddingColumn { table, column, ty } => {
                write!(f, "adding column {column} ({ty}) to {table}")
            }
            SyncEvent::VersioningColumn {
                table,
                column,
                renamed_to,
                from,
                to,
            } => write!(
                f,
                "column {column} on {table} changed from {from} to {to}, renaming it to {renamed_to}"
            ),
            SyncEvent::ColumnUpToDate { table, column } => {
                write!(f, "column {column} on {table} is up to date")
            }
        }
    }
}

/// Receives [`SyncEvent`]s.
pub trait Logger: Send + Sync {
    fn emit(&self, event: &SyncEvent);
}

impl<L: Logger + ?Sized> Logger for &L {
    fn emit(&self, event: &SyncEvent) {
        (**self).emit(event)
    }
}

/// Forwards events to `tracing`: schema changes at info, no-ops at debug.
#[derive(Debug, Clone, Copy, Default)]
pub struct TracingLogger;

impl Logger for TracingLogger {
    fn emit(&self, event: &SyncEvent) {
        match event {
            SyncEvent::CreatingTable { table, columns } => {
                tracing::info!(%table, columns, "creating table");
            }
            SyncEvent::AddingColumn { table, column, ty } => {
                tracing::info!(%table, %column, %ty, "adding column");
            }
            SyncEvent::VersioningColumn {
                table,
                column,
                renamed_to,
                from,
                to,
            } => {
                tracing::info!(%table, %column, %renamed_to, %from, %to, "versioning column");
            }
            SyncEvent::ColumnUpToDate { table, column } => {
                tracing::debug!(%table, %column, "column up to date");
            }
        }
    }
}
