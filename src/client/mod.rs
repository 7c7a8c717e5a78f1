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

//! Client abstraction for the Opteryx statement API.
//!
//! This module provides:
//! - `QueryService` trait: the seam between the executor and the wire
//! - `HttpQueryService`: the blocking HTTP implementation

pub mod http;

use crate::error::Result;
use crate::protocol::{PageRequest, ResultPage, StatementResponse, SubmitStatementRequest};

pub use http::{HttpClientConfig, HttpQueryService};

/// Stateless request issuer for the statement API.
///
/// Each method is a single HTTP round trip with the connection's
/// per-request timeout applied; the executor layers the overall polling
/// deadline across repeated calls. Implementations must be safe to share
/// across threads: the executor drives one statement strictly
/// sequentially, but separate cursors may run on separate threads.
pub trait QueryService: Send + Sync + std::fmt::Debug {
    /// Submit a statement for execution.
    ///
    /// The response either embeds an inline result (synchronous mode) or
    /// carries a statement handle to poll (asynchronous mode).
    fn submit(&self, request: &SubmitStatementRequest) -> Result<StatementResponse>;

    /// Poll the status of a submitted statement.
    fn status(&self, handle: &str) -> Result<StatementResponse>;

    /// Fetch one page of results for a completed statement.
    fn fetch_page(&self, handle: &str, page: &PageRequest) -> Result<ResultPage>;

    /// Request cancellation of a running statement. Best effort; the
    /// server may already have finished the work.
    fn cancel(&self, handle: &str) -> Result<()>;
}
