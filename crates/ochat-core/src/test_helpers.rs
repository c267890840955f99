//! Shared test helpers.
//!
//! Provides `ScriptedClient` (a [`GenerationClient`] that replays canned
//! fragments), `RecordingStorage` (an in-memory [`StorageBackend`] that keeps
//! every write) and `MockHttpServer` (a one-shot local HTTP server for the
//! reqwest-based clients).
use std::collections::VecDeque;
use std::net::SocketAddr;

use async_trait::async_trait;
use futures::{StreamExt, TryStreamExt, stream};
use parking_lot::Mutex;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;

use crate::repositories::{BoxFuture, InMemoryStorage, RepositoryResult, StorageBackend};
use crate::services::{
    Fragment, FragmentStream, GenerationClient, GenerationError, GenerationRequest,
};

/// What a `ScriptedClient` does for one `stream` call.
pub enum Script {
    /// Yield these fragments, then end.
    Reply(Vec<Fragment>),
    /// Yield these fragments, then a transport error.
    FailAfter(Vec<Fragment>, String),
    /// Refuse the request before any fragment.
    Reject(String),
    /// Yield these fragments, then never finish.
    Hang(Vec<Fragment>),
    /// Never answer the request at all.
    Stall,
}

impl Script {
    pub fn reply(parts: &[&str]) -> Self {
        Script::Reply(parts.iter().map(|p| p.as_bytes().to_vec()).collect())
    }
}

/// In-memory mock of [`GenerationClient`]. Scripts are consumed in order;
/// once they run out every call replies with nothing.
pub struct ScriptedClient {
    scripts: Mutex<VecDeque<Script>>,
    /// Captures every request passed to `stream`.
    pub requests: Mutex<Vec<GenerationRequest>>,
}

impl ScriptedClient {
    pub fn new(scripts: Vec<Script>) -> Self {
        Self {
            scripts: Mutex::new(scripts.into()),
            requests: Mutex::new(Vec::new()),
        }
    }

    pub fn replying(parts: &[&str]) -> Self {
        Self::new(vec![Script::reply(parts)])
    }

    pub fn last_request(&self) -> Option<GenerationRequest> {
        self.requests.lock().last().cloned()
    }
}

fn ok_items(fragments: Vec<Fragment>) -> impl futures::Stream<Item = Result<Fragment, GenerationError>> {
    stream::iter(fragments.into_iter().map(Ok))
}

#[async_trait]
impl GenerationClient for ScriptedClient {
    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, GenerationError> {
        self.requests.lock().push(request);
        let script = self
            .scripts
            .lock()
            .pop_front()
            .unwrap_or(Script::Reply(Vec::new()));

        match script {
            Script::Reply(fragments) => Ok(Box::pin(ok_items(fragments))),
            Script::FailAfter(fragments, message) => Ok(Box::pin(
                ok_items(fragments).chain(stream::once(async move {
                    Err(GenerationError::Backend(message))
                })),
            )),
            Script::Reject(message) => Err(GenerationError::Backend(message)),
            Script::Hang(fragments) => Ok(Box::pin(ok_items(fragments).chain(stream::pending()))),
            Script::Stall => {
                std::future::pending::<()>().await;
                Ok(Box::pin(stream::empty()))
            }
        }
    }

    fn name(&self) -> &str {
        "scripted"
    }
}

/// In-memory storage that records every successful `set`.
#[derive(Clone, Default)]
pub struct RecordingStorage {
    inner: InMemoryStorage,
    writes: std::sync::Arc<Mutex<Vec<(String, String)>>>,
}

impl RecordingStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn writes(&self) -> Vec<(String, String)> {
        self.writes.lock().clone()
    }

    pub fn write_count(&self) -> usize {
        self.writes.lock().len()
    }
}

impl StorageBackend for RecordingStorage {
    fn get(&self, key: &str) -> BoxFuture<'static, RepositoryResult<Option<String>>> {
        self.inner.get(key)
    }

    fn set(&self, key: &str, value: String) -> BoxFuture<'static, RepositoryResult<()>> {
        let inner = self.inner.set(key, value.clone());
        let writes = self.writes.clone();
        let key = key.to_string();
        Box::pin(async move {
            inner.await?;
            writes.lock().push((key, value));
            Ok(())
        })
    }

    fn remove(&self, key: &str) -> BoxFuture<'static, RepositoryResult<()>> {
        self.inner.remove(key)
    }

    fn keys(&self) -> BoxFuture<'static, RepositoryResult<Vec<String>>> {
        self.inner.keys()
    }
}

pub async fn collect_fragments(stream: FragmentStream) -> Result<Vec<Fragment>, GenerationError> {
    stream.try_collect().await
}

/// Accepts exactly one connection, captures the raw request and answers
/// with a fixed response.
pub struct MockHttpServer {
    addr: SocketAddr,
    request: JoinHandle<String>,
}

impl MockHttpServer {
    pub async fn respond(status: u16, content_type: &str, body: &str) -> Self {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let response = format!(
            "HTTP/1.1 {} MOCK\r\nContent-Type: {}\r\nContent-Length: {}\r\nConnection: close\r\n\r\n{}",
            status,
            content_type,
            body.len(),
            body
        );

        let request = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            let raw = read_request(&mut socket).await;
            socket.write_all(response.as_bytes()).await.unwrap();
            let _ = socket.shutdown().await;
            raw
        });

        Self { addr, request }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    /// The raw request (head and body) the server received.
    pub async fn request(self) -> String {
        self.request.await.unwrap()
    }
}

async fn read_request(socket: &mut tokio::net::TcpStream) -> String {
    let mut data = Vec::new();
    let mut buf = [0u8; 4096];

    loop {
        let n = socket.read(&mut buf).await.unwrap();
        if n == 0 {
            break;
        }
        data.extend_from_slice(&buf[..n]);

        let text = String::from_utf8_lossy(&data);
        if let Some(head_end) = text.find("\r\n\r\n") {
            let content_length = text[..head_end]
                .lines()
                .filter_map(|line| line.split_once(':'))
                .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
                .and_then(|(_, value)| value.trim().parse::<usize>().ok())
                .unwrap_or(0);
            if data.len() >= head_end + 4 + content_length {
                break;
            }
        }
    }

    String::from_utf8_lossy(&data).into_owned()
}
