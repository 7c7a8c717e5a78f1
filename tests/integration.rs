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

//! End-to-end tests for the driver surface, driven through a scripted
//! in-process service so every protocol path is deterministic.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use opteryx_driver::protocol::{
    PageRequest, ResultPage, StatementResponse, SubmitStatementRequest,
};
use opteryx_driver::{
    Connection, ConnectionConfig, Error, ExecutorConfig, PollPolicy, QueryService, Result,
    TypeTag, Value,
};

/// Scripted service: canned submit response, a queue of status responses
/// (repeating the last entry once drained) and a queue of result pages.
#[derive(Debug)]
struct ScriptedService {
    submit_json: String,
    status_script: Mutex<VecDeque<String>>,
    page_script: Mutex<VecDeque<String>>,
    status_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
    cancel_calls: AtomicUsize,
    submitted: Mutex<Vec<SubmitStatementRequest>>,
}

impl ScriptedService {
    fn new(submit_json: &str) -> Self {
        Self {
            submit_json: submit_json.to_string(),
            status_script: Mutex::new(VecDeque::new()),
            page_script: Mutex::new(VecDeque::new()),
            status_calls: AtomicUsize::new(0),
            fetch_calls: AtomicUsize::new(0),
            cancel_calls: AtomicUsize::new(0),
            submitted: Mutex::new(Vec::new()),
        }
    }

    fn with_statuses(self, statuses: &[&str]) -> Self {
        *self.status_script.lock().unwrap() =
            statuses.iter().map(|s| s.to_string()).collect();
        self
    }

    fn with_pages(self, pages: &[&str]) -> Self {
        *self.page_script.lock().unwrap() = pages.iter().map(|s| s.to_string()).collect();
        self
    }

    fn status_calls(&self) -> usize {
        self.status_calls.load(Ordering::SeqCst)
    }

    fn cancel_calls(&self) -> usize {
        self.cancel_calls.load(Ordering::SeqCst)
    }
}

const RUNNING: &str = r#"{"statementHandle": "stmt-1", "status": {"state": "RUNNING"}}"#;

impl QueryService for ScriptedService {
    fn submit(&self, request: &SubmitStatementRequest) -> Result<StatementResponse> {
        self.submitted.lock().unwrap().push(request.clone());
        Ok(serde_json::from_str(&self.submit_json).unwrap())
    }

    fn status(&self, _handle: &str) -> Result<StatementResponse> {
        self.status_calls.fetch_add(1, Ordering::SeqCst);
        let mut script = self.status_script.lock().unwrap();
        let raw = if script.len() > 1 {
            script.pop_front().unwrap()
        } else {
            script.front().cloned().unwrap_or_else(|| RUNNING.to_string())
        };
        Ok(serde_json::from_str(&raw).unwrap())
    }

    fn fetch_page(&self, _handle: &str, _page: &PageRequest) -> Result<ResultPage> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        let raw = self
            .page_script
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| "{}".to_string());
        Ok(serde_json::from_str(&raw).unwrap())
    }

    fn cancel(&self, _handle: &str) -> Result<()> {
        self.cancel_calls.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

fn connection_over(service: Arc<ScriptedService>, poll: PollPolicy) -> Connection {
    let config = ConnectionConfig::from_url("opteryx://localhost:8000/analytics").unwrap();
    let executor_config = ExecutorConfig {
        poll,
        ..ExecutorConfig::default()
    };
    Connection::with_service(config, service, executor_config)
}

fn fast_poll() -> PollPolicy {
    PollPolicy {
        timeout: Duration::from_secs(5),
        initial_interval: Duration::from_millis(1),
        max_interval: Duration::from_millis(5),
        backoff: 1.5,
    }
}

#[test]
fn synchronous_select_one() {
    let service = Arc::new(ScriptedService::new(
        r#"{"columns": [{"name": "x", "type": "INTEGER"}], "data": [[1]], "total_rows": 1}"#,
    ));
    let connection = connection_over(service.clone(), fast_poll());

    let mut cursor = connection.cursor().unwrap();
    cursor.execute("SELECT 1 AS x", None).unwrap();

    let description = cursor.description().unwrap();
    assert_eq!(description.len(), 1);
    assert_eq!(description[0].name, "x");
    assert_eq!(description[0].type_tag, TypeTag::Integer);

    assert_eq!(cursor.fetch_all().unwrap(), vec![vec![Value::Integer(1)]]);
    // Synchronous mode never touches the status endpoint.
    assert_eq!(service.status_calls(), 0);
}

#[test]
fn asynchronous_execution_polls_until_terminal() {
    let service = Arc::new(
        ScriptedService::new(RUNNING)
            .with_statuses(&[
                RUNNING,
                RUNNING,
                RUNNING,
                r#"{"statementHandle": "stmt-1", "status": {"state": "SUCCEEDED"}}"#,
            ])
            .with_pages(&[r#"{
                "columns": [{"name": "id", "type": "INTEGER"}, {"name": "name", "type": "VARCHAR"}],
                "data": [[1, "mercury"], [2, "venus"]],
                "total_rows": 2
            }"#]),
    );
    let connection = connection_over(service.clone(), fast_poll());

    let mut cursor = connection.cursor().unwrap();
    cursor.execute("SELECT id, name FROM planets", None).unwrap();

    // Three intermediate polls observe RUNNING, the fourth is terminal.
    assert_eq!(service.status_calls(), 4);
    assert_eq!(cursor.row_count(), Some(2));
    assert_eq!(
        cursor.fetch_one().unwrap(),
        Some(vec![Value::Integer(1), Value::Text("mercury".to_string())])
    );
}

#[test]
fn pagination_concatenates_pages_in_order() {
    let service = Arc::new(
        ScriptedService::new(
            r#"{"statementHandle": "stmt-1", "status": {"state": "SUCCEEDED"}}"#,
        )
        .with_pages(&[
            r#"{"columns": [{"name": "n", "type": "INTEGER"}], "data": [[1], [2]], "total_rows": 4, "next_page": "p2"}"#,
            r#"{"data": [[3], [4]], "total_rows": 4}"#,
        ]),
    );
    let connection = connection_over(service.clone(), fast_poll());

    let mut cursor = connection.cursor().unwrap();
    cursor.execute("SELECT n FROM numbers", None).unwrap();

    let rows = cursor.fetch_all().unwrap();
    let values: Vec<Value> = rows.into_iter().map(|mut r| r.remove(0)).collect();
    assert_eq!(
        values,
        vec![
            Value::Integer(1),
            Value::Integer(2),
            Value::Integer(3),
            Value::Integer(4)
        ]
    );
}

#[test]
fn empty_result_is_success() {
    let service = Arc::new(ScriptedService::new(
        r#"{"columns": [{"name": "id", "type": "INTEGER"}], "data": [], "total_rows": 0}"#,
    ));
    let connection = connection_over(service, fast_poll());

    let mut cursor = connection.cursor().unwrap();
    cursor.execute("SELECT id FROM empty_table", None).unwrap();

    // Valid descriptors, zero rows; never an error and never `None`.
    assert!(!cursor.description().unwrap().is_empty());
    assert!(cursor.fetch_all().unwrap().is_empty());
    // Fetching again after exhaustion stays empty rather than failing.
    assert!(cursor.fetch_all().unwrap().is_empty());
}

#[test]
fn fetch_all_after_exhaustion_is_empty() {
    let service = Arc::new(ScriptedService::new(
        r#"{"columns": [{"name": "x", "type": "INTEGER"}], "data": [[1], [2]]}"#,
    ));
    let connection = connection_over(service, fast_poll());

    let mut cursor = connection.cursor().unwrap();
    cursor.execute("SELECT x FROM t", None).unwrap();

    assert_eq!(cursor.fetch_all().unwrap().len(), 2);
    assert!(cursor.fetch_all().unwrap().is_empty());
    assert_eq!(cursor.fetch_one().unwrap(), None);
}

#[test]
fn fetch_many_respects_batch_size() {
    let service = Arc::new(ScriptedService::new(
        r#"{"columns": [{"name": "x", "type": "INTEGER"}], "data": [[1], [2], [3]]}"#,
    ));
    let connection = connection_over(service, fast_poll());

    let mut cursor = connection.cursor().unwrap();
    cursor.set_array_size(2);
    cursor.execute("SELECT x FROM t", None).unwrap();

    assert_eq!(cursor.fetch_many(None).unwrap().len(), 2);
    assert_eq!(cursor.fetch_many(None).unwrap().len(), 1);
    assert!(cursor.fetch_many(None).unwrap().is_empty());
}

#[test]
fn poll_timeout_is_distinct_from_query_failure() {
    // Statement never leaves RUNNING: the executor must give up with a
    // timeout, not a query error.
    let service = Arc::new(ScriptedService::new(RUNNING));
    let connection = connection_over(
        service.clone(),
        PollPolicy {
            timeout: Duration::from_millis(30),
            initial_interval: Duration::from_millis(1),
            max_interval: Duration::from_millis(5),
            backoff: 1.5,
        },
    );

    let mut cursor = connection.cursor().unwrap();
    let err = cursor.execute("SELECT slow()", None).unwrap_err();
    assert!(matches!(err, Error::Timeout(_)));
    // The abandoned statement is cancelled server-side, best effort.
    assert_eq!(service.cancel_calls(), 1);
}

#[test]
fn backend_failure_is_a_query_error() {
    let service = Arc::new(ScriptedService::new(RUNNING).with_statuses(&[
        r#"{"statementHandle": "stmt-1", "status": {"state": "FAILED", "description": "table does not exist"}}"#,
    ]));
    let connection = connection_over(service, fast_poll());

    let mut cursor = connection.cursor().unwrap();
    let err = cursor.execute("SELECT * FROM nope", None).unwrap_err();
    assert!(matches!(err, Error::Query(m) if m.contains("table does not exist")));
}

#[test]
fn unknown_state_is_an_internal_error() {
    let service = Arc::new(ScriptedService::new(
        r#"{"statementHandle": "stmt-1", "status": {"state": "DAYDREAMING"}}"#,
    ));
    let connection = connection_over(service, fast_poll());

    let mut cursor = connection.cursor().unwrap();
    let err = cursor.execute("SELECT 1", None).unwrap_err();
    assert!(matches!(err, Error::Internal(_)));
}

#[test]
fn named_parameters_travel_as_literals() {
    let service = Arc::new(ScriptedService::new(
        r#"{"columns": [{"name": "id", "type": "INTEGER"}], "data": [[123]]}"#,
    ));
    let connection = connection_over(service.clone(), fast_poll());

    let mut parameters = serde_json::Map::new();
    parameters.insert("uid".to_string(), serde_json::json!(123));

    let mut cursor = connection.cursor().unwrap();
    cursor
        .execute("SELECT id FROM users WHERE id = :uid", Some(parameters))
        .unwrap();

    let submitted = service.submitted.lock().unwrap();
    let body = serde_json::to_string(&submitted[0]).unwrap();
    assert!(body.contains("\"uid\":123"));
}

#[test]
fn closing_connection_aborts_inflight_poll() {
    let service = Arc::new(ScriptedService::new(RUNNING));
    let connection = connection_over(service.clone(), fast_poll());
    let mut cursor = connection.cursor().unwrap();

    std::thread::scope(|scope| {
        scope.spawn(|| {
            std::thread::sleep(Duration::from_millis(20));
            connection.close();
        });

        let err = cursor.execute("SELECT slow()", None).unwrap_err();
        assert!(matches!(err, Error::Query(m) if m.contains("cancelled")));
    });

    assert_eq!(service.cancel_calls(), 1);
}

#[test]
fn cancel_handle_aborts_inflight_poll() {
    let service = Arc::new(ScriptedService::new(RUNNING));
    let connection = connection_over(service.clone(), fast_poll());
    let mut cursor = connection.cursor().unwrap();
    let handle = cursor.cancel_handle();

    std::thread::scope(|scope| {
        scope.spawn(move || {
            std::thread::sleep(Duration::from_millis(20));
            handle.cancel();
        });

        let err = cursor.execute("SELECT slow()", None).unwrap_err();
        assert!(matches!(err, Error::Query(m) if m.contains("cancelled")));
    });
}

#[test]
fn columnar_pages_are_pivoted_to_rows() {
    let service = Arc::new(ScriptedService::new(
        r#"{
            "data": [
                {"name": "id", "type": "INTEGER", "values": [1, 2]},
                {"name": "name", "type": "VARCHAR", "values": ["mercury", "venus"]}
            ]
        }"#,
    ));
    let connection = connection_over(service, fast_poll());

    let mut cursor = connection.cursor().unwrap();
    cursor.execute("SELECT id, name FROM planets", None).unwrap();

    let description = cursor.description().unwrap();
    assert_eq!(description[0].name, "id");
    assert_eq!(description[1].name, "name");
    assert_eq!(
        cursor.fetch_all().unwrap(),
        vec![
            vec![Value::Integer(1), Value::Text("mercury".to_string())],
            vec![Value::Integer(2), Value::Text("venus".to_string())],
        ]
    );
}
