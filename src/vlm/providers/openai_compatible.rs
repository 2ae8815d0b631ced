use std::time::Duration;

use async_trait::async_trait;
use futures_util::StreamExt;

use crate::config::OpenAiConfig;
use crate::errors::{AgentError, AgentResult};
use crate::perception::types::Frame;
use crate::vlm::encode::{encode_jpeg, jpeg_data_uri};
use crate::vlm::provider::VisionModel;
use crate::vlm::sse_parser;
use crate::vlm::types::{ChatMessage, ContentPart, ImageUrl, MessageContent, StreamChunkKind};

/// Chat-completions client for any OpenAI-compatible vision endpoint
/// (vLLM, Ollama, llama.cpp server, hosted APIs).
pub struct OpenAiCompatibleProvider {
    config: OpenAiConfig,
    api_key: String,
    client: reqwest::Client,
}

impl OpenAiCompatibleProvider {
    pub fn new(config: OpenAiConfig) -> AgentResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;
        Ok(Self::with_client(config, client))
    }

    pub fn with_client(config: OpenAiConfig, client: reqwest::Client) -> Self {
        let api_key = config.resolved_api_key();
        Self {
            config,
            api_key,
            client,
        }
    }

    fn request_body(&self, image_url: String, instruction: &str) -> serde_json::Value {
        let messages = vec![ChatMessage {
            role: "user".into(),
            content: MessageContent::Parts(vec![
                ContentPart::ImageUrl {
                    image_url: ImageUrl { url: image_url },
                },
                ContentPart::Text {
                    text: instruction.to_string(),
                },
            ]),
        }];
        serde_json::json!({
            "model": self.config.model,
            "messages": messages,
            "stream": self.config.stream,
            "temperature": self.config.temperature,
            "max_tokens": self.config.max_tokens,
        })
    }

    /// Accumulates content deltas from an SSE response.
    ///
    /// Bytes are buffered until a full line arrives, so a UTF-8 sequence split
    /// across network chunks is decoded whole.
    async fn handle_stream(&self, response: reqwest::Response) -> AgentResult<String> {
        let mut byte_stream = response.bytes_stream();
        let mut line_buf: Vec<u8> = Vec::new();
        let mut stream = StreamText::default();

        'stream: while let Some(result) = byte_stream.next().await {
            line_buf.extend_from_slice(&result?);

            while let Some(pos) = line_buf.iter().position(|b| *b == b'\n') {
                let line: Vec<u8> = line_buf.drain(..=pos).collect();
                if stream.push_line(&line)? {
                    break 'stream;
                }
            }
        }
        if !line_buf.is_empty() {
            stream.push_line(&line_buf)?;
        }

        tracing::info!(
            content_len = stream.content.len(),
            reasoning_len = stream.reasoning_len,
            "VLM stream complete"
        );
        Ok(stream.content)
    }

    async fn handle_json(&self, response: reqwest::Response) -> AgentResult<String> {
        let json: serde_json::Value = response.json().await?;
        let content = json["choices"][0]["message"]["content"]
            .as_str()
            .ok_or_else(|| AgentError::Model("response has no message content".into()))?
            .to_string();
        tracing::info!(content_len = content.len(), "VLM JSON response received");
        Ok(content)
    }
}

#[derive(Default)]
struct StreamText {
    content: String,
    reasoning_len: usize,
}

impl StreamText {
    /// Feeds one raw SSE line. Returns `true` once the stream reports completion.
    fn push_line(&mut self, raw: &[u8]) -> AgentResult<bool> {
        let line = std::str::from_utf8(raw)
            .map_err(|e| AgentError::SseParsing(format!("invalid UTF-8 in stream: {e}")))?
            .trim();
        if line.is_empty() {
            return Ok(false);
        }
        match sse_parser::parse_sse_line(line) {
            Ok(Some(chunk)) => match chunk.kind {
                StreamChunkKind::Content => self.content.push_str(&chunk.content),
                StreamChunkKind::Reasoning => self.reasoning_len += chunk.content.len(),
                StreamChunkKind::Done => return Ok(true),
            },
            Ok(None) => {}
            Err(e) => tracing::debug!("SSE parse skipped: {e}"),
        }
        Ok(false)
    }
}

#[async_trait]
impl VisionModel for OpenAiCompatibleProvider {
    fn name(&self) -> &str {
        "openai"
    }

    async fn predict(&self, frame: &Frame, instruction: &str) -> AgentResult<String> {
        let jpeg = encode_jpeg(frame, self.config.max_width)?;
        let body = self.request_body(jpeg_data_uri(&jpeg), instruction);

        tracing::debug!(
            api_base = %self.config.api_base,
            model = %self.config.model,
            stream = self.config.stream,
            image_bytes = jpeg.len(),
            "sending VLM request"
        );

        let mut request = self.client.post(&self.config.api_base).json(&body);
        if !self.api_key.is_empty() {
            request = request.bearer_auth(&self.api_key);
        }
        let response = request.send().await?;

        if !response.status().is_success() {
            let status = response.status();
            let err_body = response.text().await.unwrap_or_default();
            return Err(AgentError::Model(format!("{status}: {err_body}")));
        }

        if self.config.stream {
            self.handle_stream(response).await
        } else {
            self.handle_json(response).await
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vlm::test_server::{
        direct_client, direct_client_with_timeout, serve_once, serve_scripted,
    };

    fn config(url: &str, stream: bool) -> OpenAiConfig {
        OpenAiConfig {
            api_base: format!("{url}/v1/chat/completions"),
            model: "test-vl".into(),
            api_key: Some("secret".into()),
            stream,
            ..OpenAiConfig::default()
        }
    }

    fn frame() -> Frame {
        Frame::new(image::RgbaImage::new(16, 16), None)
    }

    #[test]
    fn body_carries_image_then_instruction() {
        let provider = OpenAiCompatibleProvider::with_client(
            config("http://localhost:1", false),
            direct_client(),
        );
        let body = provider.request_body("data:image/jpeg;base64,AAAA".into(), "go left");
        let parts = &body["messages"][0]["content"];
        assert_eq!(body["model"], "test-vl");
        assert_eq!(parts[0]["type"], "image_url");
        assert_eq!(parts[0]["image_url"]["url"], "data:image/jpeg;base64,AAAA");
        assert_eq!(parts[1]["type"], "text");
        assert_eq!(parts[1]["text"], "go left");
    }

    #[tokio::test]
    async fn json_response_content_is_returned() {
        let (url, server) = serve_once(
            200,
            "application/json",
            r#"{"choices":[{"message":{"role":"assistant","content":"{\"type\": \"wait\"}"}}]}"#
                .to_string(),
        )
        .await;
        let provider =
            OpenAiCompatibleProvider::with_client(config(&url, false), direct_client());

        let text = provider.predict(&frame(), "go").await.unwrap();
        assert_eq!(text, r#"{"type": "wait"}"#);

        let request = server.await.unwrap().to_ascii_lowercase();
        assert!(request.starts_with("post /v1/chat/completions "));
        assert!(request.contains("authorization: bearer secret"));
    }

    #[tokio::test]
    async fn stream_deltas_are_joined() {
        let sse = [
            r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"{\"type\": "}}]}"#,
            r#"data: {"choices":[{"delta":{"content":"\"click\"}"}}]}"#,
            "data: [DONE]",
            "",
        ]
        .join("\n\n");
        let (url, _server) = serve_once(200, "text/event-stream", sse).await;
        let provider = OpenAiCompatibleProvider::with_client(config(&url, true), direct_client());

        let text = provider.predict(&frame(), "go").await.unwrap();
        assert_eq!(text, r#"{"type": "click"}"#);
    }

    #[tokio::test]
    async fn http_errors_propagate() {
        let (url, _server) =
            serve_once(500, "application/json", r#"{"error":"boom"}"#.to_string()).await;
        let provider =
            OpenAiCompatibleProvider::with_client(config(&url, false), direct_client());
        assert!(matches!(
            provider.predict(&frame(), "go").await,
            Err(AgentError::Model(_))
        ));
    }

    #[tokio::test]
    async fn stream_split_inside_a_character_is_decoded_whole() {
        let body = "data: {\"choices\":[{\"delta\":{\"content\":\"Привет\"}}]}\n\ndata: [DONE]\n\n"
            .as_bytes()
            .to_vec();
        // Cut between the two bytes of the leading 'П'.
        let cut = body.iter().position(|b| *b == 0xD0).unwrap() + 1;
        let chunks = vec![body[..cut].to_vec(), body[cut..].to_vec()];
        let (url, _server) = serve_scripted(
            200,
            "text/event-stream",
            chunks,
            Duration::ZERO,
            Duration::from_millis(50),
        )
        .await;
        let provider = OpenAiCompatibleProvider::with_client(config(&url, true), direct_client());

        let text = provider.predict(&frame(), "go").await.unwrap();
        assert_eq!(text, "Привет");
    }

    #[test]
    fn stream_lines_accumulate_until_done() {
        let mut stream = StreamText::default();
        assert!(!stream
            .push_line(br#"data: {"choices":[{"delta":{"content":"{\"type\": \"wait\"}"}}]}"#)
            .unwrap());
        assert!(!stream.push_line(b"\r\n").unwrap());
        assert!(stream.push_line(b"data: [DONE]\n").unwrap());
        assert_eq!(stream.content, r#"{"type": "wait"}"#);
        assert!(matches!(
            stream.push_line(&[b'd', 0xFF, b'\n']),
            Err(AgentError::SseParsing(_))
        ));
    }

    #[tokio::test]
    async fn slow_server_times_out() {
        let (url, _server) = serve_scripted(
            200,
            "application/json",
            vec![b"{}".to_vec()],
            Duration::from_secs(2),
            Duration::ZERO,
        )
        .await;
        let provider = OpenAiCompatibleProvider::with_client(
            config(&url, false),
            direct_client_with_timeout(Duration::from_millis(200)),
        );

        let started = std::time::Instant::now();
        assert!(matches!(
            provider.predict(&frame(), "go").await,
            Err(AgentError::Http(_))
        ));
        assert!(started.elapsed() < Duration::from_secs(2));
    }

    #[test]
    fn configured_timeout_builds_a_client() {
        let cfg = OpenAiConfig {
            timeout_secs: 5,
            ..OpenAiConfig::default()
        };
        assert_eq!(OpenAiConfig::default().timeout_secs, 60);
        assert!(OpenAiCompatibleProvider::new(cfg).is_ok());
    }
}
