//! Shared helpers for integration tests.
//!
//! `CannedServer` is a minimal HTTP/1.1 responder standing in for the
//! ClickHouse HTTP interface: it records every request and answers through a
//! caller-supplied routing closure. Each connection serves one request,
//! matching the client's no-pooling behavior.

#![allow(dead_code)]

use flatbridge_core::adapters::{ConnectionConfig, Endpoint, FileFormat};
use flatbridge_core::security::Credentials;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One request as seen by the server.
#[derive(Debug, Clone)]
pub struct Recorded {
    pub method: String,
    pub target: String,
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl Recorded {
    /// Decoded query string parameter.
    pub fn param(&self, name: &str) -> Option<String> {
        let url = url::Url::parse(&format!("http://canned{}", self.target)).ok()?;
        url.query_pairs()
            .find(|(k, _)| k == name)
            .map(|(_, v)| v.into_owned())
    }

    /// Statement text, whether sent in the body or the `query` parameter.
    pub fn sql(&self) -> String {
        self.param("query").unwrap_or_else(|| self.body.clone())
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }
}

/// A reply to send back.
#[derive(Debug, Clone)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: Vec<u8>,
}

impl Reply {
    pub fn ok(body: impl Into<String>) -> Self {
        Self::ok_bytes(body.into().into_bytes())
    }

    /// A 200 reply with a body that need not be valid UTF-8.
    pub fn ok_bytes(body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: Vec::new(),
            body,
        }
    }

    pub fn error(status: u16, code: u32, message: &str) -> Self {
        Self {
            status,
            headers: vec![("X-ClickHouse-Exception-Code".into(), code.to_string())],
            body: format!("Code: {}. DB::Exception: {}", code, message).into_bytes(),
        }
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.push((name.to_string(), value.to_string()));
        self
    }
}

type Router = dyn Fn(&Recorded) -> Reply + Send + Sync;

/// In-process HTTP responder on an ephemeral local port.
pub struct CannedServer {
    pub port: u16,
    requests: Arc<Mutex<Vec<Recorded>>>,
    task: tokio::task::JoinHandle<()>,
}

impl CannedServer {
    pub async fn start<F>(route: F) -> Self
    where
        F: Fn(&Recorded) -> Reply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let route: Arc<Router> = Arc::new(route);

        let log = Arc::clone(&requests);
        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let log = Arc::clone(&log);
                let route = Arc::clone(&route);
                tokio::spawn(async move {
                    let _ = serve_one(stream, &log, route.as_ref()).await;
                });
            }
        });

        Self {
            port,
            requests,
            task,
        }
    }

    /// Requests received so far, in arrival order.
    pub fn requests(&self) -> Vec<Recorded> {
        self.requests.lock().unwrap().clone()
    }

    /// Connection settings pointing at this server.
    pub fn config(&self, table: Option<&str>) -> ConnectionConfig {
        let config = ConnectionConfig::new("127.0.0.1".to_string()).with_port(self.port);
        match table {
            Some(t) => config.with_table(t.to_string()),
            None => config,
        }
    }

    pub fn endpoint(&self, table: Option<&str>, credentials: Credentials) -> Endpoint {
        Endpoint::database(self.config(table), credentials)
    }
}

impl Drop for CannedServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn serve_one(
    mut stream: TcpStream,
    log: &Mutex<Vec<Recorded>>,
    route: &Router,
) -> Option<()> {
    let mut raw = Vec::new();
    let mut chunk = [0u8; 8192];
    let head_end = loop {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            return None;
        }
        raw.extend_from_slice(&chunk[..n]);
        if let Some(pos) = raw.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&raw[..head_end]).to_string();
    let mut lines = head.split("\r\n");
    let mut request_line = lines.next()?.split_whitespace();
    let method = request_line.next()?.to_string();
    let target = request_line.next()?.to_string();
    let headers: HashMap<String, String> = lines
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    let length: usize = headers
        .get("content-length")
        .and_then(|v| v.parse().ok())
        .unwrap_or(0);
    while raw.len() - head_end < length {
        let n = stream.read(&mut chunk).await.ok()?;
        if n == 0 {
            break;
        }
        raw.extend_from_slice(&chunk[..n]);
    }
    let body = String::from_utf8_lossy(&raw[head_end..]).to_string();

    let request = Recorded {
        method,
        target,
        headers,
        body,
    };
    let reply = route(&request);
    log.lock().unwrap().push(request);

    let mut response = format!(
        "HTTP/1.1 {} Canned\r\nContent-Length: {}\r\nContent-Type: text/plain\r\nConnection: close\r\n",
        reply.status,
        reply.body.len()
    );
    for (name, value) in &reply.headers {
        response.push_str(&format!("{}: {}\r\n", name, value));
    }
    response.push_str("\r\n");

    let mut bytes = response.into_bytes();
    bytes.extend_from_slice(&reply.body);
    stream.write_all(&bytes).await.ok()?;
    stream.shutdown().await.ok()?;
    Some(())
}

/// Routes the catalog queries for one table with the given `(name, type)`
/// columns, and answers everything else through `fallback`.
pub fn catalog_router<F>(
    columns: &'static [(&'static str, &'static str)],
    rows_in_table: u64,
    fallback: F,
) -> impl Fn(&Recorded) -> Reply + Send + Sync + 'static
where
    F: Fn(&Recorded) -> Reply + Send + Sync + 'static,
{
    move |request: &Recorded| {
        let sql = request.sql();
        if sql.contains("FROM system.columns") {
            let body: String = columns
                .iter()
                .map(|(name, ty)| format!("[\"{}\",\"{}\"]\n", name, ty))
                .collect();
            Reply::ok(body)
        } else if sql.contains("FROM system.tables") && sql.contains("count()") {
            Reply::ok(if columns.is_empty() { "[0]\n" } else { "[1]\n" })
        } else if sql.starts_with("SELECT count() FROM `") {
            Reply::ok(format!("[{}]\n", rows_in_table))
        } else {
            fallback(request)
        }
    }
}

/// Counts `JSONCompactEachRow` lines in an insert body.
pub fn inserted_lines(request: &Recorded) -> usize {
    request.body.lines().filter(|l| !l.trim().is_empty()).count()
}

/// Writes `text` to `name` inside `dir`.
pub fn write_file(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, text).unwrap();
    path
}

pub fn csv_endpoint(path: &Path) -> Endpoint {
    Endpoint::file(path, FileFormat::default())
}
