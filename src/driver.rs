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

//! Driver entry point and scheme registry.
//!
//! The registry replaces implicit import-time dialect registration: the
//! host application constructs a [`DriverRegistry`] once at startup,
//! registers the drivers it wants, and resolves connection URLs through
//! it explicitly.

use std::collections::HashMap;
use std::sync::Arc;

use crate::client::HttpClientConfig;
use crate::config::ConnectionConfig;
use crate::connection::Connection;
use crate::error::{Error, Result};
use crate::executor::ExecutorConfig;

/// Entry point for creating connections, holding transport and executor
/// tuning applied to every connection it opens.
#[derive(Debug, Default)]
pub struct Driver {
    http: HttpClientConfig,
    executor: ExecutorConfig,
}

impl Driver {
    pub fn new() -> Self {
        Self::default()
    }

    /// Override the HTTP transport tuning.
    pub fn with_http_config(mut self, http: HttpClientConfig) -> Self {
        self.http = http;
        self
    }

    /// Override the polling/paging tuning.
    pub fn with_executor_config(mut self, executor: ExecutorConfig) -> Self {
        self.executor = executor;
        self
    }

    /// Open a connection from a connection URL.
    pub fn connect(&self, url: &str) -> Result<Connection> {
        let config = ConnectionConfig::from_url(url)?;
        Connection::open_with(config, self.http.clone(), self.executor.clone())
    }
}

/// Explicit scheme → driver mapping.
///
/// Built once at process start by the host; no global state, no
/// side-effect registration.
#[derive(Debug, Default)]
pub struct DriverRegistry {
    drivers: HashMap<String, Arc<Driver>>,
}

impl DriverRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a driver for a URL scheme, replacing any previous entry.
    pub fn register(&mut self, scheme: impl Into<String>, driver: Arc<Driver>) {
        self.drivers.insert(scheme.into(), driver);
    }

    /// Resolve a connection URL against the registered drivers.
    pub fn connect(&self, url: &str) -> Result<Connection> {
        let scheme = url.split("://").next().unwrap_or_default();
        let driver = self.drivers.get(scheme).ok_or_else(|| {
            Error::Connection(format!("no driver registered for scheme '{scheme}'"))
        })?;
        driver.connect(url)
    }
}
