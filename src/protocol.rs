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

//! Request/response types for the Opteryx statement API.
//!
//! These types map directly to the JSON structures exchanged with the
//! service's `/api/v1/statements` endpoints. They are primarily used by
//! the HTTP client and the executor.

use serde::{Deserialize, Serialize};

use crate::value::TypeTag;

/// Request body for statement submission.
#[derive(Debug, Clone, Serialize)]
pub struct SubmitStatementRequest {
    #[serde(rename = "sqlText")]
    pub sql_text: String,
    /// Named bind parameters, sent structurally alongside the SQL text.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parameters: Option<serde_json::Map<String, serde_json::Value>>,
}

/// Response from statement submission or status polling.
///
/// The service may answer synchronously, in which case the result page is
/// embedded directly in this response and no handle is issued.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementResponse {
    #[serde(rename = "statementHandle", default)]
    pub statement_handle: Option<String>,
    #[serde(default)]
    pub status: Option<StatementStatus>,
    #[serde(flatten)]
    pub page: ResultPage,
}

impl StatementResponse {
    /// Whether the response carries inline result data (synchronous mode).
    pub fn has_inline_result(&self) -> bool {
        !self.page.columns.is_empty() || self.page.data.is_some()
    }

    /// Execution state, treating an absent status on a data-bearing
    /// response as success (synchronous mode does not always echo one).
    pub fn state(&self) -> StatementState {
        match self.status {
            Some(ref status) => status.state,
            None if self.has_inline_result() => StatementState::Succeeded,
            None => StatementState::Unknown,
        }
    }
}

/// Nested execution status.
#[derive(Debug, Clone, Deserialize)]
pub struct StatementStatus {
    pub state: StatementState,
    #[serde(default)]
    pub description: Option<String>,
}

/// Possible states of a statement during execution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum StatementState {
    Submitted,
    Pending,
    Running,
    Executing,
    #[serde(alias = "SUCCESS", alias = "COMPLETED")]
    Succeeded,
    #[serde(alias = "ERROR")]
    Failed,
    #[serde(alias = "CANCELED")]
    Cancelled,
    /// Any state the service reports that this driver does not know.
    #[serde(other)]
    Unknown,
}

impl StatementState {
    pub fn is_terminal(self) -> bool {
        !matches!(
            self,
            StatementState::Submitted
                | StatementState::Pending
                | StatementState::Running
                | StatementState::Executing
        )
    }
}

/// Descriptor for a single result column.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ColumnDescriptor {
    pub name: String,
    #[serde(rename = "type", alias = "type_name", default)]
    pub type_tag: TypeTag,
}

/// One page of a (possibly paginated) result set.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ResultPage {
    #[serde(default)]
    pub columns: Vec<ColumnDescriptor>,
    #[serde(default)]
    pub data: Option<PageData>,
    #[serde(default)]
    pub total_rows: Option<u64>,
    /// Continuation token; absent on the final page.
    #[serde(default)]
    pub next_page: Option<String>,
}

/// Row payload of a page. The service emits either row-oriented arrays or
/// a columnar form with one values vector per column.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum PageData {
    Columnar(Vec<ColumnValues>),
    Rows(Vec<Vec<serde_json::Value>>),
}

/// One column of a columnar page payload.
#[derive(Debug, Clone, Deserialize)]
pub struct ColumnValues {
    pub name: String,
    #[serde(rename = "type", default)]
    pub type_tag: TypeTag,
    #[serde(default)]
    pub values: Vec<serde_json::Value>,
}

/// Paging window for a result-fetch call.
#[derive(Debug, Clone, Copy)]
pub struct PageRequest {
    pub num_rows: usize,
    pub offset: u64,
}

/// Response from the token-exchange endpoint.
///
/// Deployments differ on the key the issued token is returned under.
#[derive(Debug, Clone, Deserialize)]
pub struct TokenResponse {
    #[serde(default)]
    pub access_token: Option<String>,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub jwt: Option<String>,
}

impl TokenResponse {
    /// The issued token, preferring `access_token` over the legacy keys.
    pub fn into_token(self) -> Option<String> {
        self.access_token.or(self.token).or(self.jwt)
    }
}

/// Error payload the service attaches to failed requests.
#[derive(Debug, Clone, Deserialize)]
pub struct ErrorBody {
    #[serde(default)]
    pub detail: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

impl ErrorBody {
    /// Parse an error payload, tolerating non-JSON bodies.
    pub fn parse(body: &str) -> Option<ErrorBody> {
        serde_json::from_str(body).ok()
    }

    /// Preferred human-readable detail from the payload.
    pub fn detail(&self) -> Option<String> {
        self.detail.clone().or_else(|| self.message.clone())
    }
}
