//! Shared helpers for integration tests.
//!
//! [`MockDriver`] records every call the gateway makes and can be scripted to fail
//! (or panic) at any stage, so tests can check what happened to the session.

#![allow(dead_code)]

use axum::Router;
use serde_json::Value as JsonValue;
use sql_gateway::db::{Driver, Session};
use sql_gateway::error::{DbError, DbResult};
use sql_gateway::gateway::Gateway;
use sql_gateway::models::{ConnectionConfig, QueryParam, Row};
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Event {
    Attach,
    Begin,
    Fetch(String),
    Execute(String),
    Commit,
    Detach,
}

/// What the mock driver should do at each stage.
#[derive(Debug, Clone, Default)]
pub struct Script {
    pub attach_error: Option<DbError>,
    pub begin_error: Option<DbError>,
    pub statement_error: Option<DbError>,
    pub commit_error: Option<DbError>,
    pub panic_on_statement: bool,
    pub rows: Vec<Row>,
    pub rows_affected: Option<u64>,
}

#[derive(Clone, Default)]
pub struct MockDriver {
    script: Arc<Script>,
    events: Arc<Mutex<Vec<Event>>>,
}

impl MockDriver {
    pub fn new(script: Script) -> Self {
        Self {
            script: Arc::new(script),
            events: Arc::default(),
        }
    }

    pub fn events(&self) -> Vec<Event> {
        self.events.lock().unwrap().clone()
    }

    pub fn count(&self, event: &Event) -> usize {
        self.events().iter().filter(|e| *e == event).count()
    }

    pub fn attached(&self) -> bool {
        self.count(&Event::Attach) > 0
    }

    /// Wait for a background detach (from a dropped guard) to be recorded.
    pub async fn wait_for_detach(&self) {
        for _ in 0..100 {
            if self.count(&Event::Detach) > 0 {
                return;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
    }

    fn record(&self, event: Event) {
        self.events.lock().unwrap().push(event);
    }
}

impl Driver for MockDriver {
    type Session = MockSession;

    async fn attach(&self) -> DbResult<MockSession> {
        self.record(Event::Attach);
        if let Some(e) = &self.script.attach_error {
            return Err(e.clone());
        }
        Ok(MockSession {
            driver: self.clone(),
        })
    }
}

pub struct MockSession {
    driver: MockDriver,
}

impl MockSession {
    fn statement(&self, event: Event) -> DbResult<()> {
        self.driver.record(event);
        if self.driver.script.panic_on_statement {
            panic!("driver exploded");
        }
        match &self.driver.script.statement_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }
}

impl Session for MockSession {
    async fn fetch_rows(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<Vec<Row>> {
        self.statement(Event::Fetch(sql.to_string()))?;
        Ok(self.driver.script.rows.clone())
    }

    async fn execute(&mut self, sql: &str, _params: &[QueryParam]) -> DbResult<Option<u64>> {
        self.statement(Event::Execute(sql.to_string()))?;
        Ok(self.driver.script.rows_affected)
    }

    async fn begin(&mut self) -> DbResult<()> {
        self.driver.record(Event::Begin);
        match &self.driver.script.begin_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn commit(&mut self) -> DbResult<()> {
        self.driver.record(Event::Commit);
        match &self.driver.script.commit_error {
            Some(e) => Err(e.clone()),
            None => Ok(()),
        }
    }

    async fn detach(self) -> DbResult<()> {
        self.driver.record(Event::Detach);
        Ok(())
    }
}

/// Build a row from column/value pairs, preserving order.
pub fn row(pairs: &[(&str, JsonValue)]) -> Row {
    pairs
        .iter()
        .map(|(k, v)| (k.to_string(), v.clone()))
        .collect()
}

pub fn mock_config() -> Arc<ConnectionConfig> {
    Arc::new(ConnectionConfig::sqlite("mock.db").unwrap())
}

/// A gateway over a scripted driver, plus a handle for inspecting its calls.
pub fn mock_gateway(script: Script) -> (Gateway<MockDriver>, MockDriver) {
    let driver = MockDriver::new(script);
    (Gateway::new(mock_config(), driver.clone()), driver)
}

/// Serve `router` on an ephemeral loopback port.
pub async fn spawn_server(router: Router) -> SocketAddr {
    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    addr
}

/// Minimal HTTP/1.1 client: one request per connection, JSON body in and out.
pub async fn send(
    addr: SocketAddr,
    method: &str,
    path: &str,
    body: Option<&str>,
) -> (u16, JsonValue) {
    let mut stream = TcpStream::connect(addr).await.unwrap();

    let mut request = format!(
        "{} {} HTTP/1.1\r\nHost: {}\r\nConnection: close\r\n",
        method, path, addr
    );
    if let Some(body) = body {
        request.push_str("Content-Type: application/json\r\n");
        request.push_str(&format!("Content-Length: {}\r\n\r\n{}", body.len(), body));
    } else {
        request.push_str("Content-Length: 0\r\n\r\n");
    }
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut raw = Vec::new();
    stream.read_to_end(&mut raw).await.unwrap();
    let raw = String::from_utf8(raw).unwrap();

    let (head, payload) = raw.split_once("\r\n\r\n").unwrap();
    let status = head
        .split_whitespace()
        .nth(1)
        .and_then(|code| code.parse().ok())
        .unwrap();
    let json = if payload.is_empty() {
        JsonValue::Null
    } else {
        serde_json::from_str(payload).unwrap()
    };
    (status, json)
}
