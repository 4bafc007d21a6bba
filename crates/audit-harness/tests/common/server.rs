//! HTTP helpers: a throwaway static server for fault tests, and a lookup for
//! the audited app.

#![allow(dead_code)]

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

/// Where the audited app is expected unless `AUDIT_BASE_URL` says otherwise
pub const DEFAULT_APP_URL: &str = "http://localhost:8000";

/// Markup the audited app must serve for the full audit to be meaningful
const APP_MARKERS: [&str; 3] = ["Kenshō", "settings-button", "start-button"];

/// Static pages served from memory on an ephemeral port
pub struct StaticServer {
    addr: SocketAddr,
    task: JoinHandle<()>,
}

impl StaticServer {
    /// Serve `routes` (path to body); unknown paths get a 404
    pub async fn start(routes: &[(&str, &str)]) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let routes: HashMap<String, String> = routes
            .iter()
            .map(|(path, body)| (path.to_string(), body.to_string()))
            .collect();

        let task = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let routes = routes.clone();
                tokio::spawn(async move {
                    let _ = respond(stream, &routes).await;
                });
            }
        });

        Self { addr, task }
    }

    pub fn url(&self, path: &str) -> String {
        format!("http://{}{}", self.addr, path)
    }
}

impl Drop for StaticServer {
    fn drop(&mut self) {
        self.task.abort();
    }
}

async fn respond(mut stream: TcpStream, routes: &HashMap<String, String>) -> std::io::Result<()> {
    let mut request = Vec::new();
    let mut buf = [0u8; 1024];
    while !request.windows(4).any(|w| w == b"\r\n\r\n") {
        let n = stream.read(&mut buf).await?;
        if n == 0 {
            return Ok(());
        }
        request.extend_from_slice(&buf[..n]);
    }

    let head = String::from_utf8_lossy(&request);
    let path = head.split_whitespace().nth(1).unwrap_or("/");
    let (status, body) = match routes.get(path) {
        Some(body) => ("200 OK", body.as_str()),
        None => ("404 Not Found", ""),
    };
    let content_type = if path.ends_with(".mp3") {
        "audio/mpeg"
    } else if path.ends_with(".txt") {
        "text/plain"
    } else {
        "text/html; charset=utf-8"
    };

    let response = format!(
        "HTTP/1.1 {}\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
        status,
        content_type,
        body.len(),
        body
    );
    stream.write_all(response.as_bytes()).await?;
    stream.shutdown().await
}

/// URL of the audited app when it is up and looks like the timer app.
///
/// Prints why the caller should skip otherwise.
pub async fn audited_app() -> Option<String> {
    let url = std::env::var("AUDIT_BASE_URL").unwrap_or_else(|_| DEFAULT_APP_URL.to_string());

    let body = match reqwest::get(&url).await {
        Ok(resp) if resp.status().is_success() => resp.text().await.unwrap_or_default(),
        Ok(resp) => {
            eprintln!("Skipping: {} answered {}", url, resp.status());
            return None;
        }
        Err(_) => {
            eprintln!("Skipping: nothing is serving the app at {}", url);
            eprintln!("  Start it with: python3 -m http.server 8000");
            return None;
        }
    };

    match APP_MARKERS.iter().find(|marker| !body.contains(*marker)) {
        Some(missing) => {
            eprintln!("Skipping: {} does not look like the timer app (no {})", url, missing);
            None
        }
        None => Some(url),
    }
}
