//! Test doubles: an in-memory backend and a minimal HTTP stub.
//!
//! Enabled for this crate's tests and, through the `testing` feature, for
//! downstream crates' tests.

use async_trait::async_trait;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpListener, TcpStream};
use tokio::task::JoinHandle;

use crate::backend::{Backend, GenerationParams, InferenceSession, LanguageModel};
use crate::error::LocalModelError;

/// Call counters shared between a [`FakeBackend`] and the test.
#[derive(Default)]
pub struct Calls {
    pub loads: AtomicUsize,
    pub closes: AtomicUsize,
    pub prompts: Mutex<Vec<(String, GenerationParams)>>,
}

impl Calls {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn loads(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }

    pub fn closes(&self) -> usize {
        self.closes.load(Ordering::SeqCst)
    }
}

/// Backend whose model answers with a fixed reply.
pub struct FakeBackend {
    pub calls: Arc<Calls>,
    /// The first `fail_loads` load attempts fail.
    pub fail_loads: usize,
    pub fail_generation: bool,
    pub delay: Duration,
    pub reply: String,
}

impl FakeBackend {
    pub fn new(calls: Arc<Calls>) -> Self {
        Self {
            calls,
            fail_loads: 0,
            fail_generation: false,
            delay: Duration::ZERO,
            reply: "  resposta  \n".to_string(),
        }
    }

    /// Every load attempt fails.
    pub fn failing_load(mut self) -> Self {
        self.fail_loads = usize::MAX;
        self
    }

    pub fn failing_generation(mut self) -> Self {
        self.fail_generation = true;
        self
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn load(&self) -> Result<Arc<dyn LanguageModel>, LocalModelError> {
        let attempt = self.calls.loads.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if attempt < self.fail_loads {
            return Err(LocalModelError::ModelNotFound("fake.gguf".to_string()));
        }
        Ok(Arc::new(FakeModel {
            calls: Arc::clone(&self.calls),
            fail: self.fail_generation,
            reply: self.reply.clone(),
        }))
    }
}

struct FakeModel {
    calls: Arc<Calls>,
    fail: bool,
    reply: String,
}

#[async_trait]
impl LanguageModel for FakeModel {
    async fn open_session(&self) -> Result<Box<dyn InferenceSession>, LocalModelError> {
        Ok(Box::new(FakeSession {
            calls: Arc::clone(&self.calls),
            fail: self.fail,
            reply: self.reply.clone(),
        }))
    }
}

struct FakeSession {
    calls: Arc<Calls>,
    fail: bool,
    reply: String,
}

#[async_trait]
impl InferenceSession for FakeSession {
    async fn generate(
        &mut self,
        prompt: &str,
        params: GenerationParams,
    ) -> Result<String, LocalModelError> {
        self.calls
            .prompts
            .lock()
            .unwrap()
            .push((prompt.to_string(), params));
        if self.fail {
            return Err(LocalModelError::Api("500: context overflow".to_string()));
        }
        Ok(self.reply.clone())
    }

    async fn close(self: Box<Self>) {
        self.calls.closes.fetch_add(1, Ordering::SeqCst);
    }
}

/// One request seen by a [`StubServer`].
#[derive(Debug, Clone)]
pub struct StubRequest {
    pub method: String,
    pub path: String,
    pub body: String,
}

/// Status and body a [`StubServer`] answers with.
pub type StubReply = (u16, Vec<u8>);

type Responder = dyn Fn(&StubRequest) -> StubReply + Send + Sync;

/// HTTP/1.1 listener on an ephemeral localhost port, one response per
/// connection.
pub struct StubServer {
    port: u16,
    requests: Arc<Mutex<Vec<StubRequest>>>,
    handle: JoinHandle<()>,
}

impl StubServer {
    pub async fn start<F>(respond: F) -> Self
    where
        F: Fn(&StubRequest) -> StubReply + Send + Sync + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();
        let requests = Arc::new(Mutex::new(Vec::new()));
        let respond: Arc<Responder> = Arc::new(respond);

        let seen = Arc::clone(&requests);
        let handle = tokio::spawn(async move {
            while let Ok((stream, _)) = listener.accept().await {
                let seen = Arc::clone(&seen);
                let respond = Arc::clone(&respond);
                tokio::spawn(async move {
                    let _ = serve_one(stream, &seen, respond.as_ref()).await;
                });
            }
        });

        Self {
            port,
            requests,
            handle,
        }
    }

    pub fn port(&self) -> u16 {
        self.port
    }

    pub fn url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }

    pub fn requests(&self) -> Vec<StubRequest> {
        self.requests.lock().unwrap().clone()
    }
}

impl Drop for StubServer {
    fn drop(&mut self) {
        self.handle.abort();
    }
}

async fn serve_one(
    mut stream: TcpStream,
    seen: &Mutex<Vec<StubRequest>>,
    respond: &Responder,
) -> std::io::Result<()> {
    let mut buf = Vec::new();
    let mut chunk = [0u8; 4096];

    let header_end = loop {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            return Ok(());
        }
        buf.extend_from_slice(&chunk[..n]);
        if let Some(pos) = buf.windows(4).position(|w| w == b"\r\n\r\n") {
            break pos + 4;
        }
    };

    let head = String::from_utf8_lossy(&buf[..header_end]).to_string();
    let content_length = head
        .lines()
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .and_then(|(_, value)| value.trim().parse::<usize>().ok())
        .unwrap_or(0);

    while buf.len() < header_end + content_length {
        let n = stream.read(&mut chunk).await?;
        if n == 0 {
            break;
        }
        buf.extend_from_slice(&chunk[..n]);
    }

    let mut request_line = head.lines().next().unwrap_or_default().split_whitespace();
    let request = StubRequest {
        method: request_line.next().unwrap_or_default().to_string(),
        path: request_line.next().unwrap_or_default().to_string(),
        body: String::from_utf8_lossy(&buf[header_end..]).to_string(),
    };

    let (status, body) = respond(&request);
    seen.lock().unwrap().push(request);

    let head = format!(
        "HTTP/1.1 {} Stub\r\nContent-Type: application/json\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
        status,
        body.len()
    );
    stream.write_all(head.as_bytes()).await?;
    stream.write_all(&body).await?;
    stream.shutdown().await
}
