//! Minimal webhook receiver for end-to-end tests
#![allow(dead_code)] // Test utility module - not all methods used in every test

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

/// One request as the receiver saw it
#[derive(Debug, Clone)]
pub struct ReceivedRequest {
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

/// Accepts every POST with a 200 and records what arrived
pub struct WebhookReceiver {
    addr: SocketAddr,
    requests: Arc<RwLock<Vec<ReceivedRequest>>>,
    shutdown: Arc<AtomicBool>,
    hits: Arc<AtomicUsize>,
}

impl WebhookReceiver {
    /// Bind to a random port and start accepting
    ///
    /// # Errors
    ///
    /// Returns an error if the receiver fails to bind to a port
    pub async fn start() -> Result<Self, std::io::Error> {
        let listener = TcpListener::bind("127.0.0.1:0").await?;
        let addr = listener.local_addr()?;

        let requests = Arc::new(RwLock::new(Vec::new()));
        let shutdown = Arc::new(AtomicBool::new(false));
        let hits = Arc::new(AtomicUsize::new(0));

        let requests_clone = Arc::clone(&requests);
        let shutdown_clone = Arc::clone(&shutdown);
        let hits_clone = Arc::clone(&hits);

        tokio::spawn(async move {
            loop {
                if shutdown_clone.load(Ordering::Relaxed) {
                    break;
                }

                let accept_result = timeout(Duration::from_millis(100), listener.accept()).await;

                if let Ok(Ok((stream, _peer))) = accept_result {
                    let requests = Arc::clone(&requests_clone);
                    let hits = Arc::clone(&hits_clone);

                    tokio::spawn(async move {
                        let _ = Self::handle(stream, requests, hits).await;
                    });
                }
            }
        });

        Ok(Self {
            addr,
            requests,
            shutdown,
            hits,
        })
    }

    #[must_use]
    pub fn url(&self) -> String {
        format!("http://{}/hooks/ingest", self.addr)
    }

    pub async fn requests(&self) -> Vec<ReceivedRequest> {
        self.requests.read().await.clone()
    }

    #[must_use]
    pub fn hits(&self) -> usize {
        self.hits.load(Ordering::Relaxed)
    }

    /// Wait until the receiver has seen `count` requests
    pub async fn wait_for(&self, count: usize, wait: Duration) -> bool {
        let deadline = tokio::time::Instant::now() + wait;

        while self.hits() < count {
            if tokio::time::Instant::now() >= deadline {
                return false;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }

        true
    }

    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn handle(
        mut stream: TcpStream,
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

        let path = request_line
            .trim()
            .split(' ')
            .nth(1)
            .unwrap_or("")
            .to_string();

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
            path,
            headers,
            body: String::from_utf8_lossy(&body).into_owned(),
        });
        hits.fetch_add(1, Ordering::SeqCst);

        writer
            .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
            .await?;
        writer.flush().await?;

        Ok(())
    }
}
