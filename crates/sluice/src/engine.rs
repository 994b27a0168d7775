//! The migration engine: keep a table in step with its stream's schema.

use std::collections::HashMap;

use sluice_schema::{SchemaError, StreamSchema, TableSchema};
use sluice_sql::{ColumnName, TableName};
use tracing::Instrument;

use crate::clock::{Clock, SystemClock};
use crate::config::{ConflictPolicy, SyncConfig};
use crate::dialect::Dialect;
use crate::events::{Logger, SyncEvent, TracingLogger};
use crate::plan::{Change, MigrationPlan, diff_table};
use crate::{BoxError, Error, Result};

/// The table shape a stream asks for.
struct DesiredTable<T> {
    table: TableName,
    key_columns: Vec<ColumnName>,
    columns: TableSchema<T>,
}

/// Synchronizes stream schemas into tables of one dialect.
///
/// Every call re-reads the live table; nothing is cached between calls.
///
/// ```ignore
/// let engine = MigrationEngine::new(PostgresDialect::new(client, PostgresConfig::default()))
///     .with_config(config.sync);
/// let columns = engine.sync_stream("users", ["id"], &schema).await?;
/// ```
pub struct MigrationEngine<D, C = SystemClock, L = TracingLogger> {
    dialect: D,
    config: SyncConfig,
    clock: C,
    logger: L,
}

impl<D: Dialect> MigrationEngine<D> {
    pub fn new(dialect: D) -> Self {
        Self {
            dialect,
            config: SyncConfig::default(),
            clock: SystemClock,
            logger: TracingLogger,
        }
    }
}

impl<D: Dialect, C: Clock, L: Logger> MigrationEngine<D, C, L> {
    pub fn with_config(mut self, config: SyncConfig) -> Self {
        self.config = config;
        self
    }

    pub fn with_clock<C2: Clock>(self, clock: C2) -> MigrationEngine<D, C2, L> {
        MigrationEngine {
            dialect: self.dialect,
            config: self.config,
            clock,
            logger: self.logger,
        }
    }

    pub fn with_logger<L2: Logger>(self, logger: L2) -> MigrationEngine<D, C, L2> {
        MigrationEngine {
            dialect: self.dialect,
            config: self.config,
            clock: self.clock,
            logger,
        }
    }

    pub fn dialect(&self) -> &D {
        &self.dialect
    }

    /// The dialect's override if it has one, else the configured policy.
    pub fn conflict_policy(&self) -> ConflictPolicy {
        self.dialect
            .conflict_policy_override()
            .unwrap_or_else(|| self.config.conflict_policy())
    }

    /// Parse `schema` and synchronize the stream's table.
    pub async fn sync_stream(
        &self,
        stream_name: &str,
        key_properties: impl IntoIterator<Item = impl Into<String>>,
        schema: &serde_json::Value,
    ) -> Result<TableSchema<D::ColumnType>> {
        let stream = StreamSchema::from_value(stream_name, key_properties, schema).map_err(
            |source| Error::SchemaNormalization {
                stream: stream_name.to_string(),
                source,
            },
        )?;
        self.sync_table(&stream).await
    }

    /// Bring the stream's table up to date and return its desired columns.
    ///
    /// The target namespace is created first if it is missing.
    /// Changes are applied one statement at a time. If a statement fails,
    /// the ones before it stay applied. Under [`ConflictPolicy::Strict`] the
    /// changes planned before the conflicting column are applied before the
    /// conflict is reported.
    pub async fn sync_table(&self, stream: &StreamSchema) -> Result<TableSchema<D::ColumnType>> {
        let span = tracing::info_span!(
            "sync_table",
            stream = %stream.stream_name(),
            table = tracing::field::Empty,
            changes = tracing::field::Empty,
        );
        async move {
            let desired = self.desired_table(stream)?;
            tracing::Span::current().record("table", desired.table.as_str());

            self.dialect
                .ensure_namespace()
                .await
                .map_err(|source| Error::DdlExecution {
                    table: desired.table.clone(),
                    change: "create schema".to_string(),
                    source,
                })?;

            let live = self.introspect(&desired.table).await?;
            let plan = self.diff(&desired, live.as_ref());
            tracing::Span::current().record("changes", plan.changes.len());

            self.apply(&plan, &desired, live.as_ref()).await?;

            if let Some(conflict) = plan.conflict {
                return Err(Error::MigrationConflict {
                    table: plan.table,
                    column: conflict.column.to_string(),
                    from: conflict.from.to_string(),
                    to: conflict.to.to_string(),
                });
            }

            Ok(desired.columns)
        }
        .instrument(span)
        .await
    }

    /// Work out what [`sync_table`](Self::sync_table) would do without
    /// issuing any DDL, not even for the namespace.
    ///
    /// Versioned column names use the clock reading taken now, so a later
    /// sync may pick a different suffix.
    pub async fn plan(&self, stream: &StreamSchema) -> Result<MigrationPlan<D::ColumnType>> {
        let desired = self.desired_table(stream)?;
        let live = self.introspect(&desired.table).await?;
        Ok(self.diff(&desired, live.as_ref()))
    }

    fn desired_table(&self, stream: &StreamSchema) -> Result<DesiredTable<D::ColumnType>> {
        let stream = stream.normalized();
        let table = self.dialect.table_name(stream.stream_name());

        let mut owners: HashMap<ColumnName, &str> = HashMap::new();
        let mut columns = TableSchema::new();
        for (property, schema) in stream.properties() {
            let column = self.dialect.column_name(property);
            if let Some(first) = owners.insert(column.clone(), property.as_str()) {
                return Err(Error::SchemaNormalization {
                    stream: stream.stream_name().to_string(),
                    source: SchemaError::ColumnCollision {
                        first: first.to_string(),
                        second: property.clone(),
                        column: column.to_string(),
                    },
                });
            }
            columns.insert(column, self.dialect.map_type(schema));
        }

        let key_columns = stream
            .key_properties()
            .iter()
            .map(|key| self.dialect.column_name(key))
            .collect();

        Ok(DesiredTable {
            table,
            key_columns,
            columns,
        })
    }

    async fn introspect(&self, table: &TableName) -> Result<Option<TableSchema<D::ColumnType>>> {
        self.dialect
            .get_table(table)
            .await
            .map_err(|source| Error::Introspection {
                table: table.clone(),
                source,
            })
    }

    fn diff(
        &self,
        desired: &DesiredTable<D::ColumnType>,
        live: Option<&TableSchema<D::ColumnType>>,
    ) -> MigrationPlan<D::ColumnType> {
        diff_table(
            desired.table.clone(),
            &desired.key_columns,
            &desired.columns,
            live,
            self.conflict_policy(),
            &self.clock,
        )
    }

    async fn apply(
        &self,
        plan: &MigrationPlan<D::ColumnType>,
        desired: &DesiredTable<D::ColumnType>,
        live: Option<&TableSchema<D::ColumnType>>,
    ) -> Result<()> {
        let table = &plan.table;

        if let Some(live) = live {
            let conflicting = plan.conflict.as_ref().map(|c| &c.column);
            for (column, ty) in desired
                .columns
                .iter()
                .take_while(|(column, _)| Some(*column) != conflicting)
            {
                if live.get(column) == Some(ty) {
                    self.logger.emit(&SyncEvent::ColumnUpToDate {
                        table: table.clone(),
                        column: column.clone(),
                    });
                }
            }
        }

        for change in &plan.changes {
            let result = match change {
                Change::CreateTable {
                    key_columns,
                    columns,
                } => {
                    self.logger.emit(&SyncEvent::CreatingTable {
                        table: table.clone(),
                        columns: columns.len(),
                    });
                    self.dialect.create_table(table, key_columns, columns).await
                }
                Change::AddColumn { name, ty } => {
                    self.logger.emit(&SyncEvent::AddingColumn {
                        table: table.clone(),
                        column: name.clone(),
                        ty: ty.to_string(),
                    });
                    self.dialect.add_column(table, name, ty).await
                }
                Change::RenameColumn { from, to } => {
                    let old = live.and_then(|live| live.get(from));
                    let new = desired.columns.get(from);
                    self.logger.emit(&SyncEvent::VersioningColumn {
                        table: table.clone(),
                        column: from.clone(),
                        renamed_to: to.clone(),
                        from: old.map(ToString::to_string).unwrap_or_default(),
                        to: new.map(ToString::to_string).unwrap_or_default(),
                    });
                    self.dialect.rename_column(table, from, to).await
                }
            };
            result.map_err(|source| ddl_error(table, change, source))?;
        }

        Ok(())
    }
}

fn ddl_error<T>(table: &TableName, change: &Change<T>, source: BoxError) -> Error {
    let change = match change {
        Change::CreateTable { .. } => "create table".to_string(),
        Change::AddColumn { name, .. } => format!("add column {name}"),
        Change::RenameColumn { from, to } => format!("rename column {from} to {to}"),
    };
    Error::DdlExecution {
        table: table.clone(),
        change,
        source,
    }
}
