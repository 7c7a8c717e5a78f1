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

//! Logical connection to the Opteryx service.
//!
//! A connection holds the parsed configuration and the shared transport;
//! there is no server-side session, so every statement is an independent
//! HTTP exchange. The backend is read-only, so `commit` and `rollback`
//! are no-ops kept for DBAPI-shaped callers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use tracing::debug;

use crate::client::{HttpClientConfig, HttpQueryService, QueryService};
use crate::config::ConnectionConfig;
use crate::cursor::Cursor;
use crate::error::{Error, Result};
use crate::executor::ExecutorConfig;

/// Open a connection from a connection URL.
///
/// Convenience for [`ConnectionConfig::from_url`] plus [`Connection::open`].
pub fn connect(url: &str) -> Result<Connection> {
    Connection::open(ConnectionConfig::from_url(url)?)
}

/// One logical session bound to a [`ConnectionConfig`].
///
/// The configuration is read-only after construction, so a connection may
/// be shared across threads; each [`Cursor`] must stay on the thread that
/// drives it. Closing the connection flips a flag every in-flight cursor
/// poll loop observes on its next iteration.
#[derive(Debug)]
pub struct Connection {
    config: ConnectionConfig,
    service: Arc<dyn QueryService>,
    executor_config: ExecutorConfig,
    closed: Arc<AtomicBool>,
}

impl Connection {
    /// Open a connection with default HTTP and executor tuning.
    pub fn open(config: ConnectionConfig) -> Result<Self> {
        Self::open_with(config, HttpClientConfig::default(), ExecutorConfig::default())
    }

    /// Open a connection with explicit transport and executor tuning.
    pub fn open_with(
        config: ConnectionConfig,
        http: HttpClientConfig,
        executor_config: ExecutorConfig,
    ) -> Result<Self> {
        let service = Arc::new(HttpQueryService::new(config.clone(), http)?);
        Ok(Self::with_service(config, service, executor_config))
    }

    /// Build a connection over an arbitrary [`QueryService`].
    ///
    /// This is the seam for alternative transports and for driving the
    /// full surface against a scripted service in tests.
    pub fn with_service(
        config: ConnectionConfig,
        service: Arc<dyn QueryService>,
        executor_config: ExecutorConfig,
    ) -> Self {
        debug!("opening connection to {}", config.to_url());
        Self {
            config,
            service,
            executor_config,
            closed: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn config(&self) -> &ConnectionConfig {
        &self.config
    }

    /// Create a cursor for executing statements.
    pub fn cursor(&self) -> Result<Cursor> {
        self.check_closed()?;
        Ok(Cursor::new(
            self.service.clone(),
            self.executor_config.clone(),
            self.closed.clone(),
        ))
    }

    /// No-op; the backend is read-only.
    pub fn commit(&self) -> Result<()> {
        self.check_closed()
    }

    /// No-op; the backend is read-only.
    pub fn rollback(&self) -> Result<()> {
        self.check_closed()
    }

    /// Close the connection. Idempotent; in-flight cursor poll loops
    /// observe the closure on their next iteration and abort.
    pub fn close(&self) {
        if !self.closed.swap(true, Ordering::AcqRel) {
            debug!("connection to {} closed", self.config.host);
        }
    }

    pub fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }

    fn check_closed(&self) -> Result<()> {
        if self.is_closed() {
            return Err(Error::Connection("connection is closed".to_string()));
        }
        Ok(())
    }
}

impl Drop for Connection {
    fn drop(&mut self) {
        self.close();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_connection() -> Connection {
        let config = ConnectionConfig::from_url("opteryx://localhost:8000").unwrap();
        Connection::open(config).unwrap()
    }

    #[test]
    fn test_close_is_idempotent() {
        let connection = test_connection();
        assert!(!connection.is_closed());
        connection.close();
        connection.close();
        assert!(connection.is_closed());
    }

    #[test]
    fn test_closed_connection_rejects_use() {
        let connection = test_connection();
        connection.close();
        assert!(matches!(connection.cursor(), Err(Error::Connection(_))));
        assert!(matches!(connection.commit(), Err(Error::Connection(_))));
        assert!(matches!(connection.rollback(), Err(Error::Connection(_))));
    }

    #[test]
    fn test_commit_and_rollback_are_noops() {
        let connection = test_connection();
        connection.commit().unwrap();
        connection.rollback().unwrap();
    }
}
