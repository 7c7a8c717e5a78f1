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

//! Per-statement cursor over assembled results.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::client::QueryService;
use crate::error::{Error, Result};
use crate::executor::{ExecutorConfig, QueryExecutor};
use crate::protocol::ColumnDescriptor;
use crate::result::Row;

/// Cloneable handle that aborts a cursor's in-flight poll loop.
///
/// Obtained via [`Cursor::cancel_handle`] and safe to trigger from another
/// thread while the owning thread is blocked in `execute`.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    cancelled: Arc<AtomicBool>,
}

impl CancelHandle {
    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::Release);
    }
}

/// Cursor over one statement execution.
///
/// Created per [`crate::Connection::cursor`] call. `execute` runs the
/// statement to completion; the fetch methods then iterate the realized
/// rows. All rows are uniformly typed before the first fetch can succeed.
#[derive(Debug)]
pub struct Cursor {
    executor: QueryExecutor,
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
    position: usize,
    row_count: Option<usize>,
    array_size: usize,
    closed: bool,
    cancelled: Arc<AtomicBool>,
    connection_closed: Arc<AtomicBool>,
}

impl Cursor {
    pub(crate) fn new(
        service: Arc<dyn QueryService>,
        executor_config: ExecutorConfig,
        connection_closed: Arc<AtomicBool>,
    ) -> Self {
        Self {
            executor: QueryExecutor::new(service, executor_config),
            columns: Vec::new(),
            rows: Vec::new(),
            position: 0,
            row_count: None,
            array_size: 1,
            closed: false,
            cancelled: Arc::new(AtomicBool::new(false)),
            connection_closed,
        }
    }

    /// Execute a statement with optional named parameters.
    ///
    /// Blocks until the statement is terminal and the full result is
    /// assembled; on failure the cursor holds no rows and no description.
    pub fn execute(
        &mut self,
        sql: &str,
        parameters: Option<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<()> {
        self.check_closed()?;
        if self.connection_closed.load(Ordering::Acquire) {
            return Err(Error::Connection("connection is closed".to_string()));
        }

        self.columns.clear();
        self.rows.clear();
        self.position = 0;
        self.row_count = None;
        self.cancelled.store(false, Ordering::Release);

        let cancelled = self.cancelled.clone();
        let connection_closed = self.connection_closed.clone();
        let cancel_check = move || {
            cancelled.load(Ordering::Acquire) || connection_closed.load(Ordering::Acquire)
        };

        let result = self.executor.execute(sql, parameters, &cancel_check)?;
        let (columns, rows) = result.into_parts();
        self.columns = columns;
        self.row_count = Some(rows.len());
        self.rows = rows;
        Ok(())
    }

    /// Execute a statement with positional parameters.
    ///
    /// Each `?` placeholder is rewritten, left to right, to a named
    /// parameter `:p0`, `:p1`, ... and the values are sent structurally.
    pub fn execute_positional(
        &mut self,
        sql: &str,
        values: &[serde_json::Value],
    ) -> Result<()> {
        let mut rewritten = sql.to_string();
        let mut parameters = serde_json::Map::new();
        for (i, value) in values.iter().enumerate() {
            rewritten = rewritten.replacen('?', &format!(":p{i}"), 1);
            parameters.insert(format!("p{i}"), value.clone());
        }
        let parameters = (!parameters.is_empty()).then_some(parameters);
        self.execute(&rewritten, parameters)
    }

    /// Execute the same statement once per parameter set, keeping the last
    /// result.
    pub fn execute_many(
        &mut self,
        sql: &str,
        parameter_sets: Vec<serde_json::Map<String, serde_json::Value>>,
    ) -> Result<()> {
        for parameters in parameter_sets {
            self.execute(sql, Some(parameters))?;
        }
        Ok(())
    }

    /// Column descriptors of the last result; `None` before any execute.
    pub fn description(&self) -> Option<&[ColumnDescriptor]> {
        self.row_count.map(|_| self.columns.as_slice())
    }

    /// Number of rows in the last result; `None` before any execute.
    pub fn row_count(&self) -> Option<usize> {
        self.row_count
    }

    /// Default batch size for [`Cursor::fetch_many`].
    pub fn array_size(&self) -> usize {
        self.array_size
    }

    pub fn set_array_size(&mut self, size: usize) {
        self.array_size = size.max(1);
    }

    /// Fetch the next row, or `None` once the result is exhausted.
    pub fn fetch_one(&mut self) -> Result<Option<Row>> {
        self.check_closed()?;
        if self.position >= self.rows.len() {
            return Ok(None);
        }
        let row = self.rows[self.position].clone();
        self.position += 1;
        Ok(Some(row))
    }

    /// Fetch up to `size` rows (defaulting to the array size).
    pub fn fetch_many(&mut self, size: Option<usize>) -> Result<Vec<Row>> {
        self.check_closed()?;
        let size = size.unwrap_or(self.array_size);
        let end = (self.position + size).min(self.rows.len());
        let batch = self.rows[self.position..end].to_vec();
        self.position = end;
        Ok(batch)
    }

    /// Fetch all remaining rows. After exhaustion this returns an empty
    /// vector, not an error.
    pub fn fetch_all(&mut self) -> Result<Vec<Row>> {
        self.check_closed()?;
        let batch = self.rows[self.position..].to_vec();
        self.position = self.rows.len();
        Ok(batch)
    }

    /// Handle for aborting an in-flight execution from another thread.
    pub fn cancel_handle(&self) -> CancelHandle {
        CancelHandle {
            cancelled: self.cancelled.clone(),
        }
    }

    /// Close the cursor and discard buffered rows. Idempotent; an
    /// in-flight poll loop observes the cancellation on its next
    /// iteration.
    pub fn close(&mut self) {
        self.closed = true;
        self.cancelled.store(true, Ordering::Release);
        self.rows.clear();
        self.columns.clear();
        self.position = 0;
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    fn check_closed(&self) -> Result<()> {
        if self.closed {
            return Err(Error::Connection("cursor is closed".to_string()));
        }
        Ok(())
    }
}

impl Iterator for Cursor {
    type Item = Row;

    fn next(&mut self) -> Option<Row> {
        self.fetch_one().ok().flatten()
    }
}
