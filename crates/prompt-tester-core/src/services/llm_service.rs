use async_trait::async_trait;
use futures::StreamExt;
use serde::Serialize;
use tracing::{debug, warn};

use crate::models::ChatMessage;
use crate::settings::Settings;

use super::provider_error::ProviderError;
use super::sse::ByteStream;

/// One streaming chat completion request
#[derive(Clone, Debug)]
pub struct ChatRequest {
    pub model_id: String,
    pub messages: Vec<ChatMessage>,
    pub api_key: String,
}

/// A source of streamed chat completions.
///
/// Implementations return the raw event-stream body once the upstream has
/// accepted the request; decoding happens in `sse::decode_stream`.
#[async_trait]
pub trait ChatProvider: Send + Sync {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ByteStream, ProviderError>;
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    stream: bool,
}

/// Client for an OpenRouter-compatible `/chat/completions` endpoint
#[derive(Clone)]
pub struct OpenRouterClient {
    http: reqwest::Client,
    base_url: String,
    referer: String,
    title: String,
}

impl OpenRouterClient {
    pub fn new(settings: &Settings) -> Self {
        Self::with_client(reqwest::Client::new(), settings)
    }

    pub fn with_client(http: reqwest::Client, settings: &Settings) -> Self {
        Self {
            http,
            base_url: settings.api_base_url.trim_end_matches('/').to_string(),
            referer: settings.http_referer.clone(),
            title: settings.app_title.clone(),
        }
    }

    fn completions_url(&self) -> String {
        format!("{}/chat/completions", self.base_url)
    }
}

#[async_trait]
impl ChatProvider for OpenRouterClient {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ByteStream, ProviderError> {
        debug!(model = %request.model_id, messages = request.messages.len(), "Sending chat request");

        let response = self
            .http
            .post(self.completions_url())
            .bearer_auth(&request.api_key)
            .header("HTTP-Referer", &self.referer)
            .header("X-Title", &self.title)
            .json(&CompletionBody {
                model: &request.model_id,
                messages: &request.messages,
                stream: true,
            })
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            warn!(model = %request.model_id, status = status.as_u16(), "Chat request rejected");
            return Err(ProviderError::Status {
                status: status.as_u16(),
                body,
            });
        }

        Ok(response
            .bytes_stream()
            .map(|chunk| chunk.map_err(ProviderError::from))
            .boxed())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::sse::decode_stream;
    use wiremock::matchers::{body_partial_json, header, method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    fn client(server: &MockServer) -> OpenRouterClient {
        let settings = Settings {
            api_base_url: format!("{}/api/v1/", server.uri()),
            ..Default::default()
        };
        OpenRouterClient::new(&settings)
    }

    fn request() -> ChatRequest {
        ChatRequest {
            model_id: "openai/gpt-4o".into(),
            messages: vec![ChatMessage::system("Be brief."), ChatMessage::user("Hello")],
            api_key: "sk-test".into(),
        }
    }

    #[tokio::test]
    async fn test_streams_completion() {
        let server = MockServer::start().await;
        let body = concat!(
            "data: {\"choices\":[{\"delta\":{\"content\":\"Hi\"}}]}\n\n",
            "data: {\"choices\":[{\"delta\":{\"content\":\" there\"}}],\"usage\":{\"prompt_tokens\":5,\"completion_tokens\":2}}\n\n",
            "data: [DONE]\n\n",
        );

        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .and(header("authorization", "Bearer sk-test"))
            .and(header("x-title", "Prompt Tester"))
            .and(header("http-referer", "http://localhost:3000"))
            .and(body_partial_json(serde_json::json!({
                "model": "openai/gpt-4o",
                "stream": true,
                "messages": [
                    {"role": "system", "content": "Be brief."},
                    {"role": "user", "content": "Hello"}
                ]
            })))
            .respond_with(ResponseTemplate::new(200).set_body_raw(body, "text/event-stream"))
            .expect(1)
            .mount(&server)
            .await;

        let stream = client(&server).stream_chat(request()).await.unwrap();
        let completion = decode_stream(stream, |_| {}).await.unwrap();

        assert_eq!(completion.content, "Hi there");
        assert_eq!(completion.usage.unwrap().total_tokens(), 7);
    }

    #[tokio::test]
    async fn test_non_success_status_short_circuits() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .and(path("/api/v1/chat/completions"))
            .respond_with(ResponseTemplate::new(401).set_body_string("{\"error\":\"bad key\"}"))
            .mount(&server)
            .await;

        match client(&server).stream_chat(request()).await {
            Err(ProviderError::Status { status, body }) => {
                assert_eq!(status, 401);
                assert!(body.contains("bad key"));
            }
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("expected a status error"),
        }
    }

    #[tokio::test]
    async fn test_unreachable_host_is_transport_error() {
        let settings = Settings {
            api_base_url: "http://127.0.0.1:1".into(),
            ..Default::default()
        };
        let result = OpenRouterClient::new(&settings).stream_chat(request()).await;
        assert!(matches!(result, Err(ProviderError::Transport(_))));
    }
}
