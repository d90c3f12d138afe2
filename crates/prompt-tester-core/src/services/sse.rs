use bytes::Bytes;
use futures::stream::{BoxStream, Stream, StreamExt};
use serde_json::Value;
use tracing::debug;

use crate::models::TokenUsage;

use super::provider_error::ProviderError;

/// Raw response body chunks
pub type ByteStream = BoxStream<'static, Result<Bytes, ProviderError>>;

#[derive(Clone, Debug, PartialEq)]
pub enum StreamEvent {
    /// Next fragment of assistant text
    Delta(String),
    /// Latest usage report; replaces earlier ones
    Usage(TokenUsage),
    /// In-band provider error
    Error(String),
    /// `[DONE]` sentinel
    Done,
}

/// Text and usage of a finished stream
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Completion {
    pub content: String,
    pub usage: Option<TokenUsage>,
}

/// Incremental decoder for OpenAI-style `data:` event streams.
///
/// Input may be split at any byte, including inside a multi-byte UTF-8
/// sequence; bytes stay buffered until a full line is available. After
/// `[DONE]` all further input is ignored.
#[derive(Debug, Default)]
pub struct SseDecoder {
    buffer: Vec<u8>,
    done: bool,
}

impl SseDecoder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_done(&self) -> bool {
        self.done
    }

    pub fn feed(&mut self, chunk: &[u8]) -> Vec<StreamEvent> {
        if self.done {
            return Vec::new();
        }
        self.buffer.extend_from_slice(chunk);

        let mut events = Vec::new();
        while let Some(newline) = self.buffer.iter().position(|&b| b == b'\n') {
            let line: Vec<u8> = self.buffer.drain(..=newline).collect();
            self.decode_line(&line[..line.len() - 1], &mut events);
            if self.done {
                self.buffer.clear();
                break;
            }
        }
        events
    }

    /// Decode a final line that was not newline-terminated
    pub fn finish(&mut self) -> Vec<StreamEvent> {
        let mut events = Vec::new();
        if !self.done && !self.buffer.is_empty() {
            let line = std::mem::take(&mut self.buffer);
            self.decode_line(&line, &mut events);
        }
        self.buffer.clear();
        events
    }

    fn decode_line(&mut self, line: &[u8], events: &mut Vec<StreamEvent>) {
        let line = line.strip_suffix(b"\r").unwrap_or(line);
        let Some(payload) = line.strip_prefix(b"data:") else {
            // Blank separators, `:` comments and other fields
            return;
        };
        let payload = String::from_utf8_lossy(payload);
        let payload = payload.trim();

        if payload == "[DONE]" {
            self.done = true;
            events.push(StreamEvent::Done);
            return;
        }

        match serde_json::from_str::<Value>(payload) {
            Ok(value) => decode_payload(&value, events),
            Err(e) => debug!(error = %e, payload, "Skipping malformed stream payload"),
        }
    }
}

fn decode_payload(value: &Value, events: &mut Vec<StreamEvent>) {
    if let Some(error) = value.get("error").filter(|e| !e.is_null()) {
        let message = error
            .get("message")
            .and_then(Value::as_str)
            .map(str::to_string)
            .unwrap_or_else(|| error.to_string());
        events.push(StreamEvent::Error(message));
        return;
    }

    if let Some(content) = value
        .pointer("/choices/0/delta/content")
        .and_then(Value::as_str)
        .filter(|c| !c.is_empty())
    {
        events.push(StreamEvent::Delta(content.to_string()));
    }

    if let Some(usage) = value.get("usage").filter(|u| u.is_object()) {
        let count = |key: &str| usage.get(key).and_then(Value::as_u64).unwrap_or(0) as u32;
        events.push(StreamEvent::Usage(TokenUsage::new(
            count("prompt_tokens"),
            count("completion_tokens"),
        )));
    }
}

/// Decode a byte stream into events. Ends after `[DONE]` or when the body
/// ends; transport errors are yielded and end the stream.
pub fn events(mut body: ByteStream) -> impl Stream<Item = Result<StreamEvent, ProviderError>> {
    async_stream::stream! {
        let mut decoder = SseDecoder::new();
        while let Some(chunk) = body.next().await {
            match chunk {
                Ok(bytes) => {
                    for event in decoder.feed(&bytes) {
                        yield Ok(event);
                    }
                    if decoder.is_done() {
                        return;
                    }
                }
                Err(e) => {
                    yield Err(e);
                    return;
                }
            }
        }
        for event in decoder.finish() {
            yield Ok(event);
        }
    }
}

/// Drive a response body to completion, reporting each text fragment to
/// `on_delta` as it arrives.
pub async fn decode_stream(
    body: ByteStream,
    mut on_delta: impl FnMut(&str),
) -> Result<Completion, ProviderError> {
    let mut completion = Completion::default();
    let events = events(body);
    futures::pin_mut!(events);

    while let Some(event) = events.next().await {
        match event? {
            StreamEvent::Delta(text) => {
                on_delta(&text);
                completion.content.push_str(&text);
            }
            StreamEvent::Usage(usage) => completion.usage = Some(usage),
            StreamEvent::Error(message) => return Err(ProviderError::Upstream(message)),
            StreamEvent::Done => break,
        }
    }

    Ok(completion)
}
