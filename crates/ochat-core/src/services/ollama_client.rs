use async_trait::async_trait;
use futures::StreamExt;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::generation_client::{
    Fragment, FragmentStream, GenerationClient, GenerationError, GenerationRequest,
};

pub const DEFAULT_OLLAMA_URL: &str = "http://localhost:11434";

#[derive(Debug, Serialize)]
struct OllamaChatRequest<'a> {
    model: &'a str,
    messages: Vec<OllamaMessage<'a>>,
    stream: bool,
}

#[derive(Debug, Serialize)]
struct OllamaMessage<'a> {
    role: &'static str,
    content: &'a str,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    images: Vec<&'a str>,
}

#[derive(Debug, Deserialize)]
struct OllamaChatChunk {
    #[serde(default)]
    message: Option<OllamaChunkMessage>,
    #[serde(default)]
    done: bool,
    #[serde(default)]
    error: Option<String>,
}

#[derive(Debug, Deserialize)]
struct OllamaChunkMessage {
    #[serde(default)]
    content: String,
}

/// What one NDJSON line of `/api/chat` contributes to the reply.
#[derive(Debug, PartialEq, Eq)]
pub(crate) enum ChatLine {
    Content(Fragment),
    /// The final line, with whatever trailing content it carried.
    Done(Fragment),
}

/// Splits a byte stream into newline-terminated lines. Chunk boundaries from
/// the transport fall anywhere, including inside a multi-byte character.
#[derive(Debug, Default)]
pub(crate) struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Feed a chunk, returning every line it completed (without the newline).
    pub(crate) fn push(&mut self, chunk: &[u8]) -> Vec<Vec<u8>> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let mut line: Vec<u8> = self.pending.drain(..=pos).collect();
            line.pop();
            if line.last() == Some(&b'\r') {
                line.pop();
            }
            lines.push(line);
        }
        lines
    }

    /// Whatever is left once the body ended without a trailing newline.
    pub(crate) fn finish(self) -> Option<Vec<u8>> {
        if self.pending.iter().all(u8::is_ascii_whitespace) {
            None
        } else {
            Some(self.pending)
        }
    }
}

/// Parse one NDJSON line. Blank lines yield `None`.
pub(crate) fn parse_chat_line(line: &[u8]) -> Result<Option<ChatLine>, GenerationError> {
    if line.iter().all(u8::is_ascii_whitespace) {
        return Ok(None);
    }

    let chunk: OllamaChatChunk = serde_json::from_slice(line)
        .map_err(|e| GenerationError::Protocol(format!("invalid chat line: {}", e)))?;

    if let Some(error) = chunk.error {
        return Err(GenerationError::Backend(error));
    }

    if chunk.done {
        let tail = chunk.message.map(|m| m.content.into_bytes()).unwrap_or_default();
        return Ok(Some(ChatLine::Done(tail)));
    }

    Ok(chunk
        .message
        .map(|m| ChatLine::Content(m.content.into_bytes())))
}

/// Strip a `data:<mime>;base64,` prefix; Ollama wants the bare payload.
fn base64_payload(url: &str) -> &str {
    match url.split_once(',') {
        Some((prefix, payload)) if prefix.starts_with("data:") => payload,
        _ => url,
    }
}

/// Direct client for a local Ollama server's `/api/chat` endpoint.
pub struct OllamaClient {
    client: reqwest::Client,
    base_url: String,
}

impl OllamaClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!(base_url = %base_url, "Created Ollama client");
        Self {
            client: reqwest::Client::new(),
            base_url,
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn build_body<'a>(request: &'a GenerationRequest) -> OllamaChatRequest<'a> {
        let image_turn = request.image_turn_index();
        let messages = request
            .turns
            .iter()
            .enumerate()
            .map(|(index, turn)| OllamaMessage {
                role: turn.role.as_str(),
                content: &turn.content,
                images: if Some(index) == image_turn {
                    request.images.iter().map(|i| base64_payload(i)).collect()
                } else {
                    Vec::new()
                },
            })
            .collect();

        OllamaChatRequest {
            model: &request.model,
            messages,
            stream: true,
        }
    }
}

#[async_trait]
impl GenerationClient for OllamaClient {
    async fn stream(&self, request: GenerationRequest) -> Result<FragmentStream, GenerationError> {
        let url = format!("{}/api/chat", self.base_url);
        debug!(url = %url, model = %request.model, turns = request.turns.len(), "Starting Ollama chat stream");

        let response = self
            .client
            .post(&url)
            .json(&Self::build_body(&request))
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Ollama rejected chat request");
            return Err(GenerationError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let mut body = Box::pin(response.bytes_stream());

        let stream = async_stream::stream! {
            let mut lines = LineBuffer::default();

            while let Some(chunk) = body.next().await {
                let chunk = match chunk {
                    Ok(chunk) => chunk,
                    Err(e) => {
                        yield Err(GenerationError::Request(e));
                        return;
                    }
                };

                for line in lines.push(&chunk) {
                    match parse_chat_line(&line) {
                        Ok(Some(ChatLine::Content(fragment))) => {
                            if !fragment.is_empty() {
                                yield Ok(fragment);
                            }
                        }
                        Ok(Some(ChatLine::Done(tail))) => {
                            if !tail.is_empty() {
                                yield Ok(tail);
                            }
                            return;
                        }
                        Ok(None) => {}
                        Err(e) => {
                            yield Err(e);
                            return;
                        }
                    }
                }
            }

            // An unterminated last line still counts if it is the done line
            if let Some(rest) = lines.finish() {
                match parse_chat_line(&rest) {
                    Ok(Some(ChatLine::Done(tail))) => {
                        if !tail.is_empty() {
                            yield Ok(tail);
                        }
                        return;
                    }
                    Ok(Some(ChatLine::Content(fragment))) => {
                        if !fragment.is_empty() {
                            yield Ok(fragment);
                        }
                    }
                    Ok(None) => {}
                    Err(e) => {
                        yield Err(e);
                        return;
                    }
                }
            }

            // The body closed early, so the reply is incomplete
            warn!("Ollama stream ended before the done line");
            yield Err(GenerationError::Protocol("stream ended before done".into()));
        };

        Ok(Box::pin(stream))
    }

    fn name(&self) -> &str {
        "Ollama"
    }
}
