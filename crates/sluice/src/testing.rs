use std::collections::VecDeque;
use std::sync::Mutex;

use crate::connection::{BoxError, BoxFuture, Connection, Row};

/// A connection that records statements and answers queries with canned
/// rows: queued answers first, in order, then `rows` for every query after.
#[derive(Default)]
pub(crate) struct FakeConn {
    rows: Vec<Row>,
    answers: Mutex<VecDeque<Vec<Row>>>,
    error: Option<String>,
    executed: Mutex<Vec<String>>,
    queries: Mutex<Vec<(String, Vec<String>)>>,
}

impl FakeConn {
    pub(crate) fn with_rows<R, V>(rows: R) -> Self
    where
        R: IntoIterator<Item = V>,
        V: IntoIterator<Item = Option<&'static str>>,
    {
        Self {
            rows: rows.into_iter().map(|row| row.into_iter().collect()).collect(),
            ..Default::default()
        }
    }

    pub(crate) fn answering<A, R, V>(answers: A) -> Self
    where
        A: IntoIterator<Item = R>,
        R: IntoIterator<Item = V>,
        V: IntoIterator<Item = Option<&'static str>>,
    {
        let answers: VecDeque<Vec<Row>> = answers
            .into_iter()
            .map(|rows| rows.into_iter().map(|row| row.into_iter().collect()).collect())
            .collect();
        Self {
            answers: Mutex::new(answers),
            ..Default::default()
        }
    }

    pub(crate) fn failing(message: &str) -> Self {
        Self {
            error: Some(message.to_string()),
            ..Default::default()
        }
    }

    pub(crate) fn executed(&self) -> Vec<String> {
        self.executed.lock().unwrap().clone()
    }

    pub(crate) fn queries(&self) -> Vec<(String, Vec<String>)> {
        self.queries.lock().unwrap().clone()
    }

    fn check(&self) -> Result<(), BoxError> {
        match &self.error {
            Some(message) => Err(message.clone().into()),
            None => Ok(()),
        }
    }
}

impl Connection for FakeConn {
    fn execute<'a>(&'a self, sql: &'a str) -> BoxFuture<'a, Result<u64, BoxError>> {
        Box::pin(async move {
            self.check()?;
            self.executed.lock().unwrap().push(sql.to_string());
            Ok(0)
        })
    }

    fn query<'a>(
        &'a self,
        sql: &'a str,
        params: &'a [&'a str],
    ) -> BoxFuture<'a, Result<Vec<Row>, BoxError>> {
        Box::pin(async move {
            self.check()?;
            self.queries.lock().unwrap().push((
                sql.to_string(),
                params.iter().map(|p| p.to_string()).collect(),
            ));
            let answer = self.answers.lock().unwrap().pop_front();
            Ok(answer.unwrap_or_else(|| self.rows.clone()))
        })
    }
}
