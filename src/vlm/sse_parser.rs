use crate::errors::{AgentError, AgentResult};
use crate::vlm::types::{StreamChunk, StreamChunkKind};

/// Parses a raw SSE line (OpenAI-compatible format) into a StreamChunk.
/// Returns None for keep-alives, non-data lines and empty deltas.
pub fn parse_sse_line(line: &str) -> AgentResult<Option<StreamChunk>> {
    if line.is_empty() || line.starts_with(':') {
        return Ok(None);
    }

    let data = if let Some(d) = line.strip_prefix("data:") {
        d.trim()
    } else {
        return Ok(None);
    };

    if data == "[DONE]" {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    let json: serde_json::Value =
        serde_json::from_str(data).map_err(|e| AgentError::SseParsing(e.to_string()))?;

    let Some(first) = json["choices"].as_array().and_then(|c| c.first()) else {
        return Ok(None);
    };
    let delta = &first["delta"];

    // Some servers (DeepSeek-style) stream reasoning separately.
    if let Some(reasoning) = delta["reasoning_content"].as_str() {
        if !reasoning.is_empty() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Reasoning,
                content: reasoning.to_string(),
            }));
        }
    }

    if let Some(content) = delta["content"].as_str() {
        if !content.is_empty() {
            return Ok(Some(StreamChunk {
                kind: StreamChunkKind::Content,
                content: content.to_string(),
            }));
        }
    }

    if first["finish_reason"].as_str().is_some() {
        return Ok(Some(StreamChunk {
            kind: StreamChunkKind::Done,
            content: String::new(),
        }));
    }

    Ok(None)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn content_delta() {
        let chunk = parse_sse_line(r#"data: {"choices":[{"delta":{"content":"{\"type\""}}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(chunk.kind, StreamChunkKind::Content);
        assert_eq!(chunk.content, "{\"type\"");
    }

    #[test]
    fn done_marker_and_finish_reason() {
        let done = parse_sse_line("data: [DONE]").unwrap().unwrap();
        assert_eq!(done.kind, StreamChunkKind::Done);
        let finished = parse_sse_line(r#"data: {"choices":[{"delta":{},"finish_reason":"stop"}]}"#)
            .unwrap()
            .unwrap();
        assert_eq!(finished.kind, StreamChunkKind::Done);
    }

    #[test]
    fn ignores_comments_and_other_fields() {
        assert!(parse_sse_line(": keep-alive").unwrap().is_none());
        assert!(parse_sse_line("event: ping").unwrap().is_none());
        assert!(parse_sse_line(r#"data: {"choices":[{"delta":{"role":"assistant"}}]}"#)
            .unwrap()
            .is_none());
    }

    #[test]
    fn bad_json_is_an_error() {
        assert!(matches!(
            parse_sse_line("data: {oops"),
            Err(AgentError::SseParsing(_))
        ));
    }
}
