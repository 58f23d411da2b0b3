use crate::config::AgentConfig;
use crate::error::AgentError;
use futures::{Stream, StreamExt};
use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;
use tokio::time::Duration;

/// Events emitted during LLM streaming
#[derive(Debug, Clone, PartialEq)]
pub enum LlmEvent {
    /// Text delta from streaming response
    TextDelta(String),
    /// Stream completed
    StreamComplete,
    /// Error occurred
    Error(String),
}

/// Request to send to LLM
#[derive(Debug, Clone)]
pub struct LlmRequest {
    pub messages: Vec<LlmMessage>,
}

impl LlmRequest {
    pub fn new(messages: Vec<LlmMessage>) -> Self {
        Self { messages }
    }
}

/// Message in conversation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LlmMessage {
    pub role: String,
    pub content: String,
}

impl LlmMessage {
    pub fn new(role: impl Into<String>, content: impl Into<String>) -> Self {
        Self {
            role: role.into(),
            content: content.into(),
        }
    }
}

/// What a single SSE `data:` payload means for the stream
#[derive(Debug, Clone, PartialEq)]
pub enum SseChunk {
    Delta(String),
    Done,
    Ignored,
}

/// LLM client for streaming chat completions from an OpenAI-compatible API
#[derive(Clone)]
pub struct LlmClient {
    config: AgentConfig,
    api_key: Option<String>,
    client: reqwest::Client,
}

impl LlmClient {
    pub fn new(config: AgentConfig, api_key: Option<String>) -> Result<Self, AgentError> {
        let client = reqwest::Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            config,
            api_key,
            client,
        })
    }

    /// Start streaming a response.
    ///
    /// Rejections that happen before the HTTP exchange starts are returned as
    /// errors; everything after that arrives as `LlmEvent`s on the channel.
    pub async fn stream_response(
        &self,
        request: LlmRequest,
    ) -> Result<mpsc::Receiver<LlmEvent>, AgentError> {
        let api_key = self.api_key.clone().ok_or_else(|| {
            AgentError::Rejected(format!(
                "No API key configured. Set {} or agent.api_key in config.toml.",
                self.config.api_key_env
            ))
        })?;

        let (tx, rx) = mpsc::channel(1000);
        let client = self.client.clone();
        let config = self.config.clone();

        tokio::spawn(async move {
            let tx_err = tx.clone();
            if let Err(e) = Self::stream_chat_completions(client, config, api_key, request, tx).await {
                tracing::warn!(error = %e, "chat completion stream failed");
                let _ = tx_err.send(LlmEvent::Error(e.to_string())).await;
            }
        });

        Ok(rx)
    }

    async fn stream_chat_completions(
        client: reqwest::Client,
        config: AgentConfig,
        api_key: String,
        request: LlmRequest,
        tx: mpsc::Sender<LlmEvent>,
    ) -> Result<(), AgentError> {
        let url = format!("{}/chat/completions", config.base_url.trim_end_matches('/'));

        let payload = serde_json::json!({
            "model": config.model,
            "messages": request.messages,
            "stream": true,
            "temperature": config.temperature,
            "max_tokens": config.max_tokens
        });

        tracing::debug!(%url, model = %config.model, messages = request.messages.len(), "sending chat completion request");

        let response = client
            .post(&url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .header("X-Title", "chatdeck")
            .json(&payload)
            .send()
            .await?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            return Err(AgentError::Rejected(format!("{status}: {error_text}")));
        }

        Self::process_sse_stream(response, tx).await
    }

    /// Process a Server-Sent Events body
    async fn process_sse_stream(
        response: reqwest::Response,
        tx: mpsc::Sender<LlmEvent>,
    ) -> Result<(), AgentError> {
        forward_sse_body(response.bytes_stream(), &tx).await
    }
}

/// Split an SSE body into lines and forward its deltas.
///
/// Bytes are buffered until a full line is available, so multibyte
/// characters split across network chunks are decoded intact. A final line
/// without a trailing newline is still processed.
async fn forward_sse_body<S, B, E>(body: S, tx: &mpsc::Sender<LlmEvent>) -> Result<(), AgentError>
where
    S: Stream<Item = Result<B, E>>,
    B: AsRef<[u8]>,
    E: std::fmt::Display,
{
    futures::pin_mut!(body);
    let mut buffer: Vec<u8> = Vec::new();

    while let Some(chunk) = body.next().await {
        let chunk = chunk.map_err(|e| AgentError::Stream(e.to_string()))?;
        buffer.extend_from_slice(chunk.as_ref());

        while let Some(newline_pos) = buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = buffer.drain(..=newline_pos).collect();
            if !forward_sse_line(&line, tx).await? {
                return Ok(());
            }
        }
    }

    // Flush any remaining buffer line (without newline)
    if !buffer.is_empty() && !forward_sse_line(&buffer, tx).await? {
        return Ok(());
    }

    // Some providers close the body without a [DONE] marker.
    let _ = tx.send(LlmEvent::StreamComplete).await;
    Ok(())
}

/// Handle one complete SSE line. Returns `false` once the stream is over.
async fn forward_sse_line(line: &[u8], tx: &mpsc::Sender<LlmEvent>) -> Result<bool, AgentError> {
    let line = std::str::from_utf8(line)
        .map_err(|e| AgentError::Stream(format!("invalid UTF-8 in event stream: {e}")))?;

    let Some(data) = line.trim().strip_prefix("data:") else {
        return Ok(true);
    };

    match parse_sse_data(data.trim()) {
        // A closed receiver means nobody is listening anymore.
        SseChunk::Delta(content) => Ok(tx.send(LlmEvent::TextDelta(content)).await.is_ok()),
        SseChunk::Done => {
            let _ = tx.send(LlmEvent::StreamComplete).await;
            Ok(false)
        }
        SseChunk::Ignored => Ok(true),
    }
}

/// Interpret one SSE `data:` payload of a chat completions stream
pub fn parse_sse_data(data: &str) -> SseChunk {
    if data == "[DONE]" {
        return SseChunk::Done;
    }

    let Ok(chunk) = serde_json::from_str::<serde_json::Value>(data) else {
        return SseChunk::Ignored;
    };

    let content = chunk
        .get("choices")
        .and_then(|c| c.get(0))
        .and_then(|choice| choice.get("delta"))
        .and_then(|delta| delta.get("content"))
        .and_then(|c| c.as_str());

    match content {
        Some(content) if !content.is_empty() => SseChunk::Delta(content.to_string()),
        _ => SseChunk::Ignored,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_content_delta() {
        let data = r#"{"choices":[{"delta":{"content":"Sure,"},"finish_reason":null}]}"#;
        assert_eq!(parse_sse_data(data), SseChunk::Delta("Sure,".into()));
    }

    #[test]
    fn done_marker_ends_stream() {
        assert_eq!(parse_sse_data("[DONE]"), SseChunk::Done);
    }

    #[test]
    fn role_only_and_garbage_chunks_are_ignored() {
        let role_only = r#"{"choices":[{"delta":{"role":"assistant"}}]}"#;
        assert_eq!(parse_sse_data(role_only), SseChunk::Ignored);
        assert_eq!(parse_sse_data(": keep-alive"), SseChunk::Ignored);
        let empty = r#"{"choices":[{"delta":{"content":""}}]}"#;
        assert_eq!(parse_sse_data(empty), SseChunk::Ignored);
    }

    async fn forward_chunks(chunks: Vec<&'static [u8]>) -> (Result<(), AgentError>, Vec<LlmEvent>) {
        let (tx, mut rx) = mpsc::channel(16);
        let body = futures::stream::iter(chunks.into_iter().map(Ok::<_, std::io::Error>));
        let result = forward_sse_body(body, &tx).await;
        drop(tx);

        let mut events = Vec::new();
        while let Some(event) = rx.recv().await {
            events.push(event);
        }
        (result, events)
    }

    #[tokio::test]
    async fn character_split_across_chunks_is_decoded_intact() {
        let (result, events) = forward_chunks(vec![
            &b"data: {\"choices\":[{\"delta\":{\"content\":\"caf\xC3"[..],
            &b"\xA9\"}}]}\n\ndata: [DONE]\n"[..],
        ])
        .await;

        assert!(result.is_ok());
        assert_eq!(
            events,
            vec![LlmEvent::TextDelta("café".into()), LlmEvent::StreamComplete]
        );
    }

    #[tokio::test]
    async fn last_line_without_newline_is_flushed() {
        let (result, events) = forward_chunks(vec![
            &b"data: {\"choices\":[{\"delta\":{\"content\":\"Hel"[..],
            &b"lo\"}}]}"[..],
        ])
        .await;

        assert!(result.is_ok());
        assert_eq!(
            events,
            vec![LlmEvent::TextDelta("Hello".into()), LlmEvent::StreamComplete]
        );
    }

    #[tokio::test]
    async fn invalid_utf8_line_fails_the_stream() {
        let (result, events) = forward_chunks(vec![&b"data: \xFF\xFE\n"[..]]).await;

        assert!(matches!(result, Err(AgentError::Stream(_))));
        assert!(events.is_empty());
    }

    #[tokio::test]
    async fn done_marker_stops_reading() {
        let (_, events) = forward_chunks(vec![
            &b"data: [DONE]\n"[..],
            &b"data: {\"choices\":[{\"delta\":{\"content\":\"late\"}}]}\n"[..],
        ])
        .await;

        assert_eq!(events, vec![LlmEvent::StreamComplete]);
    }

    /// Read one HTTP request, headers and body
    async fn read_request(socket: &mut tokio::net::TcpStream) {
        use tokio::io::AsyncReadExt;

        let mut data = Vec::new();
        let mut buf = [0u8; 4096];
        loop {
            let n = socket.read(&mut buf).await.unwrap();
            if n == 0 {
                return;
            }
            data.extend_from_slice(&buf[..n]);
            if let Some(end) = data.windows(4).position(|w| w == b"\r\n\r\n") {
                let headers = String::from_utf8_lossy(&data[..end]).to_lowercase();
                let body_len = headers
                    .lines()
                    .find_map(|line| line.strip_prefix("content-length:"))
                    .and_then(|value| value.trim().parse::<usize>().ok())
                    .unwrap_or(0);
                if data.len() >= end + 4 + body_len {
                    return;
                }
            }
        }
    }

    #[tokio::test]
    async fn chunked_http_response_streams_deltas() {
        use tokio::io::AsyncWriteExt;

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        let server = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            read_request(&mut socket).await;
            socket
                .write_all(
                    b"HTTP/1.1 200 OK\r\ncontent-type: text/event-stream\r\n\
                      transfer-encoding: chunked\r\nconnection: close\r\n\r\n",
                )
                .await
                .unwrap();

            let parts: [&[u8]; 3] = [
                b"data: {\"choices\":[{\"delta\":{\"content\":\"caf\xC3",
                b"\xA9 ol\"}}]}\n\n",
                b"data: {\"choices\":[{\"delta\":{\"content\":\"\xC3\xA9\"}}]}",
            ];
            for part in parts {
                socket.write_all(format!("{:x}\r\n", part.len()).as_bytes()).await.unwrap();
                socket.write_all(part).await.unwrap();
                socket.write_all(b"\r\n").await.unwrap();
                socket.flush().await.unwrap();
                tokio::time::sleep(Duration::from_millis(20)).await;
            }
            socket.write_all(b"0\r\n\r\n").await.unwrap();
            socket.flush().await.unwrap();
        });

        let config = AgentConfig {
            base_url: format!("http://{addr}"),
            ..AgentConfig::default()
        };
        let client = LlmClient::new(config, Some("test-key".into())).unwrap();
        let mut rx = client
            .stream_response(LlmRequest::new(vec![LlmMessage::new("user", "hi")]))
            .await
            .unwrap();

        let mut text = String::new();
        let mut last = None;
        while let Some(event) = rx.recv().await {
            if let LlmEvent::TextDelta(delta) = &event {
                text.push_str(delta);
            }
            last = Some(event);
        }

        assert_eq!(text, "café olé");
        assert_eq!(last, Some(LlmEvent::StreamComplete));
        server.await.unwrap();
    }

    #[tokio::test]
    async fn missing_api_key_is_rejected_up_front() {
        let client = LlmClient::new(AgentConfig::default(), None).unwrap();
        let result = client.stream_response(LlmRequest::new(vec![])).await;
        assert!(matches!(result, Err(AgentError::Rejected(_))));
    }
}
