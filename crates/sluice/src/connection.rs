//! Database sessions.
//!
//! Backends talk to the database through the [`Connection`] trait: one
//! statement at a time, text in, text rows out. It is implemented here for
//! `tokio_postgres::Client`; a Snowflake session is supplied by the caller
//! (connection management is not our business).
//!
//! [`TracedConn`] wraps any connection and logs every statement via tracing.

use std::future::Future;
use std::pin::Pin;

use tokio_postgres::types::ToSql;
use tracing::Instrument;

/// Boxed error returned by sessions.
pub type BoxError = Box<dyn std::error::Error + Send + Sync + 'static>;

/// Boxed future returned by sessions.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// A result row with every value fetched as text, by position.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Row(pub Vec<Option<String>>);

impl Row {
    /// The value at `idx`, or `None` if it is NULL or out of range.
    pub fn get(&self, idx: usize) -> Option<&str> {
        self.0.get(idx).and_then(|v| v.as_deref())
    }
}

impl<S: Into<String>> FromIterator<Option<S>> for Row {
    fn from_iter<I: IntoIterator<Item = Option<S>>>(iter: I) -> Self {
        Row(iter.into_iter().map(|v| v.map(Into::into)).collect())
    }
}

/// A database session that can run statements.
pub trait Connection: Send + Sync {
    /// Execute a statement, returning the number of rows affected.
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64, BoxError>>;

    /// Execute a query with positional text parameters, returning all rows.
    ///
    /// The placeholder syntax (`$1`, `?`) is the backend's.
    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<Row>, BoxError>>;
}

impl<C: Connection + ?Sized> Connection for &C {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64, BoxError>> {
        (**self).execute(sql)
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<Row>, BoxError>> {
        (**self).query(sql, params)
    }
}

impl Connection for tokio_postgres::Client {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64, BoxError>> {
        Box::pin(async move {
            let affected = tokio_postgres::Client::execute(self, sql, &[]).await?;
            Ok(affected)
        })
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<Row>, BoxError>> {
        Box::pin(async move {
            let params: Vec<&(dyn ToSql + Sync)> =
                params.iter().map(|p| p as &(dyn ToSql + Sync)).collect();
            let rows = tokio_postgres::Client::query(self, sql, &params).await?;

            let mut out = Vec::with_capacity(rows.len());
            for row in &rows {
                let mut values = Vec::with_capacity(row.len());
                for idx in 0..row.len() {
                    values.push(row.try_get::<_, Option<String>>(idx)?);
                }
                out.push(Row(values));
            }
            Ok(out)
        })
    }
}

/// A wrapper around a connection that logs all statements via tracing.
///
/// # Example
///
/// ```ignore
/// use sluice::ConnectionExt;
///
/// let dialect = PostgresDialect::new(client.traced(), config);
/// ```
pub struct TracedConn<C: Connection> {
    conn: C,
}

impl<C: Connection> TracedConn<C> {
    pub fn new(conn: C) -> Self {
        Self { conn }
    }

    /// Get the inner connection.
    pub fn inner(&self) -> &C {
        &self.conn
    }
}

impl<C: Connection> Connection for TracedConn<C> {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64, BoxError>> {
        let span = tracing::debug_span!(
            "db.execute",
            sql = %sql,
            affected = tracing::field::Empty,
        );
        Box::pin(
            async move {
                let affected = self.conn.execute(sql).await?;
                tracing::Span::current().record("affected", affected);
                Ok(affected)
            }
            .instrument(span),
        )
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<Row>, BoxError>> {
        let span = tracing::debug_span!(
            "db.query",
            sql = %sql,
            params = params.len(),
            rows = tracing::field::Empty,
        );
        Box::pin(
            async move {
                let rows = self.conn.query(sql, params).await?;
                tracing::Span::current().record("rows", rows.len());
                Ok(rows)
            }
            .instrument(span),
        )
    }
}

/// Extension trait to get a traced wrapper from a connection.
pub trait ConnectionExt: Connection + Sized {
    /// Wrap this connection in a [`TracedConn`] for statement logging.
    fn traced(self) -> TracedConn<Self> {
        TracedConn::new(self)
    }
}

impl<C: Connection> ConnectionExt for C {}
