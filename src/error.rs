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

//! Error taxonomy for the Opteryx driver.
//!
//! Every failure the driver surfaces is one of the closed set of variants
//! below. Transport and parsing failures are translated at the boundary
//! where they occur; callers never observe a raw `reqwest` or `serde_json`
//! error.

use std::time::Duration;
use thiserror::Error;

use crate::protocol::ErrorBody;

/// Result alias used throughout the driver.
pub type Result<T> = std::result::Result<T, Error>;

/// Closed set of driver error kinds.
#[derive(Error, Debug)]
pub enum Error {
    /// The backend could not be reached (DNS, TCP, TLS, request timeout).
    #[error("connection error: {0}")]
    Connection(String),

    /// The backend rejected the supplied credentials or token.
    #[error("authentication failed: {0}")]
    Authentication(String),

    /// Polling exceeded the configured overall deadline.
    #[error("query timed out after {0:?}")]
    Timeout(Duration),

    /// The backend reported a malformed statement or execution failure,
    /// or the statement was cancelled.
    #[error("query failed: {0}")]
    Query(String),

    /// Result assembly found rows inconsistent with the column descriptors.
    #[error("data error: {0}")]
    Data(String),

    /// The backend responded with an unexpected shape or state.
    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    /// Translate an HTTP error status plus (optional) error payload into a
    /// driver error.
    ///
    /// The mapping is deterministic:
    /// - 401/403 → [`Error::Authentication`]
    /// - other 4xx → [`Error::Query`] (the request itself was rejected)
    /// - 5xx and anything else → [`Error::Internal`]
    pub fn from_http_status(status: u16, body: &str) -> Error {
        let detail = ErrorBody::parse(body)
            .and_then(|b| b.detail())
            .unwrap_or_else(|| format!("HTTP {status}"));

        match status {
            401 | 403 => Error::Authentication(detail),
            400..=499 => Error::Query(detail),
            _ => Error::Internal(detail),
        }
    }

    /// Translate a transport-level failure into a driver error.
    ///
    /// Everything reqwest reports before an HTTP status is available
    /// (refused connection, TLS handshake, per-request timeout) is a
    /// connection failure. The overall polling deadline is enforced by the
    /// executor and surfaces separately as [`Error::Timeout`].
    pub fn from_transport(err: reqwest::Error) -> Error {
        Error::Connection(err.to_string())
    }

    /// Translate a response body that failed to deserialize.
    pub fn from_malformed_body(context: &str, err: serde_json::Error) -> Error {
        Error::Internal(format!("{context}: {err}"))
    }
}
