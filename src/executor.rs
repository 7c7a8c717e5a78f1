// Copyright (c) 2025 Opteryx Driver Contributors
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.

//! Statement execution: submit, poll to completion, assemble results.
//!
//! The executor owns the full life cycle of one statement. It submits the
//! SQL, polls asynchronous statements on a bounded backoff schedule until
//! a terminal state, fetches every result page in server order, and maps
//! all rows through the type mapper before handing anything back. A
//! partially assembled result is never returned.

use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};

use tracing::debug;

use crate::client::QueryService;
use crate::error::{Error, Result};
use crate::protocol::{
    ColumnDescriptor, PageData, PageRequest, ResultPage, StatementResponse, StatementState,
    SubmitStatementRequest,
};
use crate::result::{QueryResult, Row};
use crate::value::Value;

/// Backoff schedule and deadline for status polling.
#[derive(Debug, Clone)]
pub struct PollPolicy {
    /// Overall deadline across all polls of one statement.
    pub timeout: Duration,
    /// Delay before the first re-poll.
    pub initial_interval: Duration,
    /// Cap on the poll interval.
    pub max_interval: Duration,
    /// Multiplier applied to the interval after each poll.
    pub backoff: f64,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(300),
            initial_interval: Duration::from_millis(500),
            max_interval: Duration::from_secs(5),
            backoff: 1.5,
        }
    }
}

/// Executor tuning.
#[derive(Debug, Clone)]
pub struct ExecutorConfig {
    pub poll: PollPolicy,
    /// Rows requested per result-fetch call.
    pub page_size: usize,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        Self {
            poll: PollPolicy::default(),
            page_size: 1000,
        }
    }
}

/// Drives one statement at a time end to end against a [`QueryService`].
///
/// Submit, poll and fetch are strictly sequential for one statement; the
/// executor never overlaps calls for the same handle.
#[derive(Debug)]
pub struct QueryExecutor {
    service: Arc<dyn QueryService>,
    config: ExecutorConfig,
}

impl QueryExecutor {
    pub fn new(service: Arc<dyn QueryService>, config: ExecutorConfig) -> Self {
        Self { service, config }
    }

    /// Execute a statement end to end and return the realized result.
    ///
    /// `cancelled` is consulted between polls: once it reports true, the
    /// next loop iteration requests best-effort server cancellation and
    /// aborts.
    pub fn execute(
        &self,
        sql: &str,
        parameters: Option<serde_json::Map<String, serde_json::Value>>,
        cancelled: &dyn Fn() -> bool,
    ) -> Result<QueryResult> {
        let request = SubmitStatementRequest {
            sql_text: sql.to_string(),
            parameters,
        };

        let started = Instant::now();
        let response = self.service.submit(&request)?;
        let response = self.wait_for_completion(response, cancelled)?;
        let (columns, raw_rows) = self.collect_pages(response)?;
        let rows = Self::map_rows(&columns, raw_rows)?;

        debug!(
            "statement complete: {} columns, {} rows in {:?}",
            columns.len(),
            rows.len(),
            started.elapsed()
        );

        Ok(QueryResult::new(columns, rows))
    }

    /// Poll until the statement reaches a terminal state.
    ///
    /// One status call per iteration; the interval grows by the policy's
    /// backoff factor up to its cap. Timeout and caller cancellation both
    /// attempt a best-effort server-side cancel before failing.
    fn wait_for_completion(
        &self,
        response: StatementResponse,
        cancelled: &dyn Fn() -> bool,
    ) -> Result<StatementResponse> {
        let policy = &self.config.poll;
        let started = Instant::now();
        let mut interval = policy.initial_interval;
        let mut current = response;

        loop {
            match current.state() {
                StatementState::Succeeded => return Ok(current),
                StatementState::Failed => {
                    let detail = current
                        .status
                        .as_ref()
                        .and_then(|s| s.description.clone())
                        .unwrap_or_else(|| "statement execution failed".to_string());
                    return Err(Error::Query(detail));
                }
                StatementState::Cancelled => {
                    return Err(Error::Query("statement was cancelled".to_string()));
                }
                StatementState::Unknown => {
                    return Err(Error::Internal(
                        "service reported an unrecognized statement state".to_string(),
                    ));
                }
                state => {
                    debug_assert!(!state.is_terminal());
                    let handle = current.statement_handle.clone().ok_or_else(|| {
                        Error::Internal("pending response carries no statement handle".to_string())
                    })?;

                    if cancelled() {
                        self.try_cancel(&handle);
                        return Err(Error::Query("statement cancelled by caller".to_string()));
                    }

                    if started.elapsed() >= policy.timeout {
                        self.try_cancel(&handle);
                        return Err(Error::Timeout(policy.timeout));
                    }

                    thread::sleep(interval);
                    interval = Duration::from_secs_f64(
                        (interval.as_secs_f64() * policy.backoff)
                            .min(policy.max_interval.as_secs_f64()),
                    );

                    debug!("polling statement {}", handle);
                    current = self.service.status(&handle)?;
                }
            }
        }
    }

    fn try_cancel(&self, handle: &str) {
        if let Err(e) = self.service.cancel(handle) {
            debug!("cancel request for {} failed: {}", handle, e);
        }
    }

    /// Gather every page of the result, preserving server row order.
    ///
    /// Inline responses are consumed directly; otherwise pages are pulled
    /// from the results endpoint until the service signals no more rows.
    fn collect_pages(
        &self,
        response: StatementResponse,
    ) -> Result<(Vec<ColumnDescriptor>, Vec<Vec<serde_json::Value>>)> {
        let mut columns: Vec<ColumnDescriptor> = Vec::new();
        let mut rows: Vec<Vec<serde_json::Value>> = Vec::new();
        let mut total_rows: Option<u64> = None;

        let handle = response.statement_handle.clone();
        let inline = response.has_inline_result();
        let mut need_fetch = !inline;

        if inline {
            let next_page =
                Self::append_page(&mut columns, &mut rows, &mut total_rows, response.page)?;
            let total_pending = total_rows.is_some_and(|t| (rows.len() as u64) < t);
            need_fetch = next_page || total_pending;
        }

        if need_fetch {
            let handle = handle.ok_or_else(|| {
                Error::Internal(
                    "successful response carries neither results nor a statement handle"
                        .to_string(),
                )
            })?;

            loop {
                let before = rows.len();
                let page = self.service.fetch_page(
                    &handle,
                    &PageRequest {
                        num_rows: self.config.page_size,
                        offset: rows.len() as u64,
                    },
                )?;
                let next_page =
                    Self::append_page(&mut columns, &mut rows, &mut total_rows, page)?;

                // An empty page means the server has nothing further,
                // regardless of what the counters claim.
                if rows.len() == before {
                    break;
                }
                if let Some(total) = total_rows {
                    if rows.len() as u64 >= total {
                        break;
                    }
                }
                if !next_page && total_rows.is_none() {
                    break;
                }
            }
        }

        Ok((columns, rows))
    }

    /// Fold one page into the accumulated columns and raw rows. Returns
    /// whether the page advertises a continuation.
    fn append_page(
        columns: &mut Vec<ColumnDescriptor>,
        rows: &mut Vec<Vec<serde_json::Value>>,
        total_rows: &mut Option<u64>,
        page: ResultPage,
    ) -> Result<bool> {
        if total_rows.is_none() {
            *total_rows = page.total_rows;
        }
        if columns.is_empty() && !page.columns.is_empty() {
            *columns = page.columns;
        }
        let has_more = page.next_page.is_some();

        match page.data {
            None => {}
            Some(PageData::Rows(mut page_rows)) => rows.append(&mut page_rows),
            Some(PageData::Columnar(page_columns)) => {
                // The columnar form carries its own descriptors.
                if columns.is_empty() {
                    *columns = page_columns
                        .iter()
                        .map(|c| ColumnDescriptor {
                            name: c.name.clone(),
                            type_tag: c.type_tag.clone(),
                        })
                        .collect();
                }

                let height = page_columns.first().map_or(0, |c| c.values.len());
                if page_columns.iter().any(|c| c.values.len() != height) {
                    return Err(Error::Data(
                        "columnar page has ragged value vectors".to_string(),
                    ));
                }
                for i in 0..height {
                    rows.push(page_columns.iter().map(|c| c.values[i].clone()).collect());
                }
            }
        }

        Ok(has_more)
    }

    /// Apply the type mapper to every cell of every row.
    ///
    /// Runs after all pages are gathered so the cursor only ever sees a
    /// uniformly typed result.
    fn map_rows(
        columns: &[ColumnDescriptor],
        raw_rows: Vec<Vec<serde_json::Value>>,
    ) -> Result<Vec<Row>> {
        let mut rows = Vec::with_capacity(raw_rows.len());
        for raw in raw_rows {
            if raw.len() != columns.len() {
                return Err(Error::Data(format!(
                    "row has {} cells but the result has {} columns",
                    raw.len(),
                    columns.len()
                )));
            }
            rows.push(
                raw.iter()
                    .zip(columns)
                    .map(|(cell, column)| Value::from_raw(&column.type_tag, cell))
                    .collect(),
            );
        }
        Ok(rows)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::value::TypeTag;
    use serde_json::json;

    fn descriptor(name: &str, tag: TypeTag) -> ColumnDescriptor {
        ColumnDescriptor {
            name: name.to_string(),
            type_tag: tag,
        }
    }

    #[test]
    fn test_map_rows_applies_tags_uniformly() {
        let columns = vec![
            descriptor("id", TypeTag::Integer),
            descriptor("name", TypeTag::Varchar),
        ];
        let rows = QueryExecutor::map_rows(
            &columns,
            vec![vec![json!(1), json!("mercury")], vec![json!(2), json!("venus")]],
        )
        .unwrap();

        assert_eq!(rows[0], vec![Value::Integer(1), Value::Text("mercury".into())]);
        assert_eq!(rows[1], vec![Value::Integer(2), Value::Text("venus".into())]);
    }

    #[test]
    fn test_map_rows_rejects_arity_mismatch() {
        let columns = vec![descriptor("id", TypeTag::Integer)];
        let err = QueryExecutor::map_rows(&columns, vec![vec![json!(1), json!(2)]]);
        assert!(matches!(err, Err(Error::Data(_))));
    }

    #[test]
    fn test_append_page_pivots_columnar_data() {
        let page: ResultPage = serde_json::from_str(
            r#"{
                "data": [
                    {"name": "id", "type": "INTEGER", "values": [1, 2]},
                    {"name": "name", "type": "VARCHAR", "values": ["a", "b"]}
                ]
            }"#,
        )
        .unwrap();

        let mut columns = Vec::new();
        let mut rows = Vec::new();
        let mut total = None;
        let more = QueryExecutor::append_page(&mut columns, &mut rows, &mut total, page).unwrap();

        assert!(!more);
        assert_eq!(columns.len(), 2);
        assert_eq!(columns[0].type_tag, TypeTag::Integer);
        assert_eq!(rows, vec![vec![json!(1), json!("a")], vec![json!(2), json!("b")]]);
    }

    #[test]
    fn test_append_page_rejects_ragged_columns() {
        let page: ResultPage = serde_json::from_str(
            r#"{
                "data": [
                    {"name": "id", "type": "INTEGER", "values": [1, 2]},
                    {"name": "name", "type": "VARCHAR", "values": ["a"]}
                ]
            }"#,
        )
        .unwrap();

        let mut columns = Vec::new();
        let mut rows = Vec::new();
        let mut total = None;
        let err = QueryExecutor::append_page(&mut columns, &mut rows, &mut total, page);
        assert!(matches!(err, Err(Error::Data(_))));
    }

    #[test]
    fn test_append_page_keeps_first_descriptors() {
        let first: ResultPage = serde_json::from_str(
            r#"{"columns": [{"name": "x", "type": "INTEGER"}], "data": [[1]]}"#,
        )
        .unwrap();
        let second: ResultPage =
            serde_json::from_str(r#"{"data": [[2]], "next_page": "p2"}"#).unwrap();

        let mut columns = Vec::new();
        let mut rows = Vec::new();
        let mut total = None;
        QueryExecutor::append_page(&mut columns, &mut rows, &mut total, first).unwrap();
        let more = QueryExecutor::append_page(&mut columns, &mut rows, &mut total, second).unwrap();

        assert!(more);
        assert_eq!(columns.len(), 1);
        assert_eq!(rows.len(), 2);
    }
}
