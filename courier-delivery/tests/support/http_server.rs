//! Mock HTTP endpoint for testing transports over a real socket
//!
//! This module provides a configurable mock endpoint that can:
#![allow(dead_code)] // Test utility module - not all methods used in every test
//! - Record received requests (method, path, headers, body) for verification
//! - Respond with a configurable status code
//! - Fail the first N requests to exercise retry paths
//! - Delay responses to test timeout handling

use std::{
    collections::HashMap,
    net::SocketAddr,
    sync::{
        Arc,
        atomic::{AtomicBool, AtomicUsize, Ordering},
    },
    time::Duration,
};

use tokio::{
    io::{AsyncBufReadExt, AsyncReadExt, AsyncWriteExt, BufReader},
    net::{TcpListener, TcpStream},
    sync::RwLock,
    time::timeout,
};

/// One HTTP request as the mock endpoint saw it
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
    pub method: String,
    pub path: String,
    /// Header names lowercased
    pub headers: HashMap<String, String>,
    pub body: String,
}

impl ReceivedRequest {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .get(&name.to_ascii_lowercase())
            .map(String::as_str)
    }

    pub fn json_body(&self) -> serde_json::Value {
        serde_json::from_str(&self.body).unwrap_or(serde_json::Value::Null)
    }
}

#[derive(Clone)]
struct MockServerConfig {
    status: u16,
    fail_first: usize,
    response_delay: Option<Duration>,
}

impl Default for MockServerConfig {
    fn default() -> Self {
        Self {
            status: 200,
            fail_first: 0,
            response_delay: None,
        }
    }
}

/// Mock HTTP server for testing
pub struct MockHttpServer {
    addr: SocketAddr,
    requests: Arc<RwLock<Vec<ReceivedRequest>>>,
    shutdown: Arc<AtomicBool>,
    hits: Arc<AtomicUsize>,
}

impl MockHttpServer {
    /// Create a new builder for configuring the mock server
    #[must_use]
    pub fn builder() -> MockHttpServerBuilder {
        MockHttpServerBuilder::new()
    }

    /// Start a server that accepts everything with 200
    pub async fn start() -> Result<Self, std::io::Error> {
        Self::builder().build().await
    }

    /// Get the address the server is listening on
    #[must_use]
    pub const fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Base URL for pointing a transport at this server
    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// Get all requests received by the server
    pub async fn requests(&self) -> Vec<ReceivedRequest> {
        self.requests.read().await.clone()
    }

    /// Get the number of requests received
    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Wait until the server has seen `count` requests
    pub async fn wait_for_requests(&self, count: usize, wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + wait;

        while self.hits() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        true
    }

    /// Shutdown the server
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    /// Handle a single client connection
    async fn handle_client(
        mut stream: TcpStream,
        config: Arc<MockServerConfig>,
        requests: Arc<RwLock<Vec<ReceivedRequest>>>,
        hits: Arc<AtomicUsize>,
    ) -> Result<(), std::io::Error> {
        let (reader, mut writer) = stream.split();
        let mut reader = BufReader::new(reader);

        let mut request_line = String::new();
        let Ok(read_result) =
            timeout(Duration::from_secs(5), reader.read_line(&mut request_line)).await
        else {
            return Ok(());
        };
        if read_result? == 0 {
            return Ok(());
        }

        let mut parts = request_line.trim().split(' ');
        let method = parts.next().unwrap_or("").to_string();
        let path = parts.next().unwrap_or("").to_string();

        let mut headers = HashMap::new();
        loop {
            let mut line = String::new();
            let bytes_read = reader.read_line(&mut line).await?;
            if bytes_read == 0 || line.trim().is_empty() {
                break;
            }
            if let Some((name, value)) = line.split_once(':') {
                headers.insert(name.trim().to_ascii_lowercase(), value.trim().to_string());
            }
        }

        let length = headers
            .get("content-length")
            .and_then(|v| v.parse::<usize>().ok())
            .unwrap_or(0);
        let mut body = vec![0u8; length];
        if length > 0 {
            reader.read_exact(&mut body).await?;
        }

        requests.write().await.push(ReceivedRequest {
            method,
            path,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
        let index = hits.fetch_add(1, Ordering::SeqCst);

        if let Some(delay) = config.response_delay {
            tokio::time::sleep(delay).await;
        }

        let status = if index < config.fail_first {
            500
        } else {
            config.status
        };
        let reason = match status {
            200 => "OK",
            400 => "Bad Request",
            404 => "Not Found",
            422 => "Unprocessable Entity",
            500 => "Internal Server Error",
            503 => "Service Unavailable",
            _ => "Response",
        };

        let response =
            format!("HTTP/1.1 {status} {reason}\r\nContent-Length: 0\r\nConnection: close\r\n\r\n");
        writer.write_all(response.as_bytes()).await?;
        writer.flush().await?;

        Ok(())
    }
}

/// Builder for configuring a `MockHttpServer`
pub struct MockHttpServerBuilder {
    config: MockServerConfig,
}

impl MockHttpServerBuilder {
    fn new() -> Self {
        Self {
            config: MockServerConfig::default(),
        }
    }

    /// Set the status code returned to every request
    #[must_use]
    pub const fn with_status(mut self, status: u16) -> Self {
        self.config.status = status;
        self
    }

    /// Respond 500 to the first N requests, then the configured status
    #[must_use]
    pub const fn with_fail_first(mut self, count: usize) -> Self {
        self.config.fail_first = count;
        self
    }

    /// Add a delay before sending each response
    #[must_use]
    pub const fn with_response_delay(mut self, delay: Duration) -> Self {
        self.config.response_delay = Some(delay);
        self
    }

    /// Build and start the mock server
    ///
    /// # Errors
    ///
    /// Returns an error if the server fails to bind to a port
    pub async fn build(self) -> Result<MockHttpServer, std::io::Error> {
        // Bind to a random available port
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let config = Arc::new(self.config);
        let requests = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let hits = Arc::new(AtomicUsize::new(0));

        let config_clone = Arc::clone(&config);
        let requests_clone = Arc::clone(&requests);
        let shutdown_clone = Arc::clone(&shutdown);
        let hits_clone = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                // Accept with a timeout to allow checking the shutdown flag
                let accept_result = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok((stream, _peer))) = accept_result {
                    let config = Arc::clone(&config_clone);
                    let requests = Arc::clone(&requests_clone);
                    let hits = Arc::clone(&hits_clone);

                    tokio::spawn(async move {
                        let _ =
                            MockHttpServer::handle_client(stream, config, requests, hits).await;
                    });
                }
            }
        });

        Ok(MockHttpServer {
            addr,
            requests,
            shutdown,
            hits,
        })
    }
}
