//! Common test utilities for the OTA updater integration tests
//!
//! [`TestServer`] is a minimal HTTP/1.1 server on a local port. It serves
//! canned responses by path (query strings are ignored for routing) and
//! records every request so tests can assert on query parameters and
//! headers. It runs on its own thread and runtime, so it works both from
//! `#[tokio::test]` functions and from blocking `assert_cmd` tests.

// Not every test file uses every helper
#![allow(dead_code)]

use assert_cmd::Command;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};

/// One canned response.
#[derive(Debug, Clone)]
pub struct Route {
    pub status: u16,
    pub body: Vec<u8>,
    pub content_type: &'static str,
}

/// A request as seen by the server.
#[derive(Debug, Clone)]
pub struct RecordedRequest {
    pub path: String,
    pub query: Option<String>,
    /// Header names are lowercased.
    pub headers: HashMap<String, String>,
}

impl RecordedRequest {
    /// Decoded value of query parameter `name`.
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query.as_deref()?.split('&').find_map(|pair| {
            let (key, value) = pair.split_once('=')?;
            (key == name).then(|| value.replace("%2F", "/").replace('+', " "))
        })
    }
}

type Routes = Arc<Mutex<HashMap<String, Route>>>;
type Requests = Arc<Mutex<Vec<RecordedRequest>>>;

/// Local HTTP server for update-check and bundle-download tests.
pub struct TestServer {
    addr: SocketAddr,
    routes: Routes,
    requests: Requests,
}

impl TestServer {
    pub fn start() -> Self {
        let listener = std::net::TcpListener::bind("127.0.0.1:0").expect("bind test server");
        listener.set_nonblocking(true).expect("set nonblocking");
        let addr = listener.local_addr().expect("local addr");

        let routes: Routes = Arc::default();
        let requests: Requests = Arc::default();
        let (routes_clone, requests_clone) = (Arc::clone(&routes), Arc::clone(&requests));

        std::thread::spawn(move || {
            let runtime = tokio::runtime::Builder::new_current_thread()
                .enable_all()
                .build()
                .expect("test server runtime");
            runtime.block_on(async move {
                let listener = TcpListener::from_std(listener).expect("tokio listener");
                loop {
                    let Ok((stream, _)) = listener.accept().await else {
                        continue;
                    };
                    let routes = Arc::clone(&routes_clone);
                    let requests = Arc::clone(&requests_clone);
                    tokio::spawn(async move {
                        let _ = serve(stream, routes, requests).await;
                    });
                }
            });
        });

        Self {
            addr,
            routes,
            requests,
        }
    }

    /// `http://127.0.0.1:<port><path>`
    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }

    pub fn route(&self, path: &str, status: u16, body: impl Into<Vec<u8>>) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                status,
                body: body.into(),
                content_type: "application/octet-stream",
            },
        );
    }

    pub fn json(&self, path: &str, value: &serde_json::Value) {
        self.routes.lock().unwrap().insert(
            path.to_string(),
            Route {
                status: 200,
                body: value.to_string().into_bytes(),
                content_type: "application/json",
            },
        );
    }

    /// Publishes `archive` at `/bundles/<filename>` and answers `/check`
    /// with an available update pointing at it.
    pub fn publish(&self, filename: &str, archive: Vec<u8>) {
        let path = format!("/bundles/{filename}");
        self.route(&path, 200, archive);
        self.json(
            "/check",
            &serde_json::json!({
                "updateAvailable": true,
                "signedUrl": self.url(&format!("{path}?signature=abc123")),
                "filename": filename,
            }),
        );
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn requests_to(&self, path: &str) -> Vec<RecordedRequest> {
        self.requests().into_iter().filter(|r| r.path == path).collect()
    }
}

async fn serve(mut stream: TcpStream, routes: Routes, requests: Requests) -> std::io::Result<()> {
    let mut buffer = Vec::new();
    let mut chunk = [0u8; 1024];
    while !buffer.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut chunk).await?;
        if n == 0 || buffer.len() > 64 * 1024 {
            return Ok(());
        }
        buffer.extend_from_slice(&chunk[..n]);
    }

    let head = String::from_utf8_lossy(&buffer).to_string();
    let mut lines = head.split("\r\n");
    let target = lines.next().and_then(|l| l.split_whitespace().nth(1)).unwrap_or("/");
    let (path, query) = match target.split_once('?') {
        Some((path, query)) => (path.to_string(), Some(query.to_string())),
        None => (target.to_string(), None),
    };
    let headers = lines
        .take_while(|l| !l.is_empty())
        .filter_map(|l| l.split_once(':'))
        .map(|(k, v)| (k.trim().to_ascii_lowercase(), v.trim().to_string()))
        .collect();

    requests.lock().unwrap().push(RecordedRequest {
        path: path.clone(),
        query,
        headers,
    });

    let route = routes.lock().unwrap().get(&path).cloned().unwrap_or(Route {
        status: 404,
        body: b"not found".to_vec(),
        content_type: "text/plain",
    });

    let head = format!(
        "HTTP/1.1 {} {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        route.status,
        if route.status < 400 { "OK" } else { "Error" },
        route.content_type,
        route.body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&route.body).await?;
    stream.shutdown().await
}

/// The `ota` binary with an isolated environment.
pub fn ota_cmd(config_dir: &Path) -> Command {
    let mut cmd = Command::cargo_bin("ota").unwrap();
    cmd.env_remove("RUST_LOG")
        .env_remove("OTA_APP_VERSION")
        .env_remove("OTA_PACKAGE_ID")
        .env_remove("OTA_UPDATE_URL")
        .env_remove("OTA_API_KEY")
        .env("NO_COLOR", "1")
        .env("OTA_NO_PROGRESS", "1")
        .env("OTA_CONFIG", config_dir.join("config.toml"));
    cmd
}
