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

//! Realized query results.

use crate::protocol::ColumnDescriptor;
use crate::value::{TypeTag, Value};

/// One result row, uniformly typed.
pub type Row = Vec<Value>;

/// A fully assembled, immutable query result.
///
/// Produced once per successful execution. Every row has already been
/// through type mapping, so consumers never observe mixed raw and typed
/// cells.
#[derive(Debug, Clone)]
pub struct QueryResult {
    columns: Vec<ColumnDescriptor>,
    rows: Vec<Row>,
}

impl QueryResult {
    pub(crate) fn new(columns: Vec<ColumnDescriptor>, rows: Vec<Row>) -> Self {
        Self { columns, rows }
    }

    /// Column descriptors in result order.
    pub fn columns(&self) -> &[ColumnDescriptor] {
        &self.columns
    }

    /// DBAPI-style description: one `(name, type tag)` pair per column.
    pub fn description(&self) -> Vec<(String, TypeTag)> {
        self.columns
            .iter()
            .map(|c| (c.name.clone(), c.type_tag.clone()))
            .collect()
    }

    pub fn rows(&self) -> &[Row] {
        &self.rows
    }

    pub fn row_count(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub(crate) fn into_parts(self) -> (Vec<ColumnDescriptor>, Vec<Row>) {
        (self.columns, self.rows)
    }
}
