use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use bytes::Bytes;
use futures::StreamExt;
use parking_lot::Mutex;

use prompt_tester_core::chat::{
    ChatEngine, ChatEvent, ChatStore, DispatchError, EngineConfig, EngineServices,
    ModelSelection, Submission,
};
use prompt_tester_core::models::{ChatRole, CredentialRef, MessageRole, PersistedThread};
use prompt_tester_core::repositories::{
    BoxFuture, InMemoryCatalogRepository, InMemoryCredentialRepository,
    InMemorySessionRepository, NewMessage, NewSession, RepositoryError, RepositoryResult,
    SessionRepository,
};
use prompt_tester_core::services::{
    ByteStream, ChatProvider, ChatRequest, CredentialCipher, CredentialService, ModelPricing,
    PricingCache, ProviderError,
};
use prompt_tester_core::settings::Settings;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

const API_KEY: &str = "sk-or-v1-0123456789abcdef";

#[derive(Clone)]
enum Reply {
    Text {
        chunks: Vec<&'static str>,
        usage: (u32, u32),
        delay: Duration,
    },
    Status(u16),
    Pending,
}

fn text(chunks: Vec<&'static str>, usage: (u32, u32)) -> Reply {
    Reply::Text {
        chunks,
        usage,
        delay: Duration::ZERO,
    }
}

fn sse_body(chunks: &[&str], usage: (u32, u32)) -> Vec<Result<Bytes, ProviderError>> {
    let mut frames: Vec<String> = chunks
        .iter()
        .map(|chunk| {
            format!(
                "data: {}\n\n",
                serde_json::json!({"choices": [{"delta": {"content": chunk}}]})
            )
        })
        .collect();
    frames.push(format!(
        "data: {}\n\n",
        serde_json::json!({
            "choices": [],
            "usage": {"prompt_tokens": usage.0, "completion_tokens": usage.1}
        })
    ));
    frames.push("data: [DONE]\n\n".to_string());
    frames.into_iter().map(|f| Ok(Bytes::from(f))).collect()
}

/// Provider that answers from a per-model script, repeating the last reply
#[derive(Default)]
struct ScriptedProvider {
    scripts: Mutex<HashMap<String, Vec<Reply>>>,
    requests: Mutex<Vec<ChatRequest>>,
}

impl ScriptedProvider {
    fn script(&self, model_id: &str, replies: Vec<Reply>) {
        self.scripts.lock().insert(model_id.to_string(), replies);
    }

    fn calls(&self) -> usize {
        self.requests.lock().len()
    }

    fn requests_for(&self, model_id: &str) -> Vec<ChatRequest> {
        self.requests
            .lock()
            .iter()
            .filter(|r| r.model_id == model_id)
            .cloned()
            .collect()
    }

    fn next_reply(&self, model_id: &str) -> Reply {
        let mut scripts = self.scripts.lock();
        match scripts.get_mut(model_id) {
            Some(replies) if replies.len() > 1 => replies.remove(0),
            Some(replies) if !replies.is_empty() => replies[0].clone(),
            _ => text(vec!["ok"], (1, 1)),
        }
    }
}

#[async_trait]
impl ChatProvider for ScriptedProvider {
    async fn stream_chat(&self, request: ChatRequest) -> Result<ByteStream, ProviderError> {
        let reply = self.next_reply(&request.model_id);
        self.requests.lock().push(request);

        match reply {
            Reply::Text {
                chunks,
                usage,
                delay,
            } => {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                Ok(futures::stream::iter(sse_body(&chunks, usage)).boxed())
            }
            Reply::Status(status) => Err(ProviderError::Status {
                status,
                body: "upstream rejected the request".into(),
            }),
            Reply::Pending => Ok(futures::stream::pending().boxed()),
        }
    }
}

/// Session store whose thread inserts are slow or fail
#[derive(Clone, Default)]
struct ThreadInsertRepository {
    inner: InMemorySessionRepository,
    delay: Duration,
    fail: bool,
}

impl ThreadInsertRepository {
    fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    fn slow(delay: Duration) -> Self {
        Self {
            delay,
            ..Self::default()
        }
    }
}

impl SessionRepository for ThreadInsertRepository {
    fn create_session(
        &self,
        session: NewSession,
    ) -> BoxFuture<'static, RepositoryResult<prompt_tester_core::models::Session>> {
        self.inner.create_session(session)
    }

    fn list_sessions(
        &self,
    ) -> BoxFuture<'static, RepositoryResult<Vec<prompt_tester_core::models::SessionSummary>>> {
        self.inner.list_sessions()
    }

    fn get_session(
        &self,
        id: i64,
    ) -> BoxFuture<'static, RepositoryResult<Option<prompt_tester_core::models::SessionDetail>>>
    {
        self.inner.get_session(id)
    }

    fn rename_session(
        &self,
        id: i64,
        name: Option<String>,
    ) -> BoxFuture<'static, RepositoryResult<bool>> {
        self.inner.rename_session(id, name)
    }

    fn delete_session(&self, id: i64) -> BoxFuture<'static, RepositoryResult<bool>> {
        self.inner.delete_session(id)
    }

    fn create_thread(
        &self,
        session_id: i64,
        model_id: &str,
        iteration: Option<u32>,
    ) -> BoxFuture<'static, RepositoryResult<PersistedThread>> {
        let insert = self.inner.create_thread(session_id, model_id, iteration);
        let delay = self.delay;
        let fail = self.fail;
        Box::pin(async move {
            tokio::time::sleep(delay).await;
            if fail {
                return Err(RepositoryError::InvalidData {
                    message: "disk full".into(),
                });
            }
            insert.await
        })
    }

    fn append_message(
        &self,
        message: NewMessage,
    ) -> BoxFuture<'static, RepositoryResult<prompt_tester_core::models::PersistedMessage>> {
        self.inner.append_message(message)
    }
}

struct Harness {
    engine: Arc<ChatEngine>,
    provider: Arc<ScriptedProvider>,
    sessions: Arc<dyn SessionRepository>,
}

impl Harness {
    async fn new() -> Self {
        Self::with_sessions(Arc::new(InMemorySessionRepository::new()), EngineConfig::default())
            .await
    }

    async fn with_sessions(sessions: Arc<dyn SessionRepository>, config: EngineConfig) -> Self {
        let pricing = PricingCache::with_prices(HashMap::from([(
            "a/x".to_string(),
            ModelPricing {
                prompt: 0.001,
                completion: 0.002,
            },
        )]));
        Self::build(sessions, pricing, config).await
    }

    async fn with_pricing(pricing: PricingCache, config: EngineConfig) -> Self {
        Self::build(Arc::new(InMemorySessionRepository::new()), pricing, config).await
    }

    async fn build(
        sessions: Arc<dyn SessionRepository>,
        pricing: PricingCache,
        config: EngineConfig,
    ) -> Self {
        let credentials = CredentialService::new(
            Arc::new(InMemoryCredentialRepository::new()),
            CredentialCipher::new(None),
        );
        credentials.create("main", API_KEY, true).await.unwrap();

        let provider = Arc::new(ScriptedProvider::default());
        let services = EngineServices {
            credentials,
            catalog: Arc::new(InMemoryCatalogRepository::new()),
            sessions: sessions.clone(),
            provider: provider.clone(),
            pricing,
        };

        Self {
            engine: Arc::new(ChatEngine::new(Arc::new(ChatStore::new()), services, config)),
            provider,
            sessions,
        }
    }

    fn submission(&self, user_prompt: &str, selection: ModelSelection) -> Submission {
        Submission {
            system_prompt: "Be brief.".into(),
            user_prompt: user_prompt.into(),
            selection,
            credential: CredentialRef::Default,
        }
    }

    fn multi(models: &[&str]) -> ModelSelection {
        ModelSelection::MultiModel {
            model_ids: models.iter().map(|m| m.to_string()).collect(),
        }
    }

    async fn wait_for_calls(&self, count: usize) {
        while self.provider.calls() < count {
            tokio::task::yield_now().await;
        }
    }
}

#[tokio::test]
async fn test_failure_is_isolated_to_its_thread() {
    let harness = Harness::new().await;
    harness.provider.script("a/x", vec![Reply::Status(500)]);
    harness.provider.script("b/y", vec![text(vec!["H", "i"], (12, 2))]);

    let report = harness
        .engine
        .submit(Submission {
            system_prompt: String::new(),
            ..harness.submission("Hello", Harness::multi(&["a/x", "b/y"]))
        })
        .await
        .unwrap();

    assert_eq!(report.thread_ids.len(), 2);
    for model_id in ["a/x", "b/y"] {
        let request = &harness.provider.requests_for(model_id)[0];
        assert_eq!(request.messages.len(), 1);
        assert_eq!(request.messages[0].role, ChatRole::User);
        assert_eq!(request.messages[0].content, "Hello");
    }
    let state = harness.engine.store().snapshot();
    assert!(!state.is_loading);

    let failed = state.thread(&report.thread_ids[0]).unwrap();
    assert!(!failed.is_loading);
    assert!(failed.error.as_deref().unwrap().contains("500"));
    assert_eq!(failed.messages.last().unwrap().role, ChatRole::User);

    let answered = state.thread(&report.thread_ids[1]).unwrap();
    assert!(answered.error.is_none());
    assert_eq!(answered.messages.last().unwrap().content, "Hi");
    assert_eq!(answered.stats.input_tokens, 12);
    assert_eq!(answered.stats.output_tokens, 2);

    let outcomes: Vec<bool> = report.outcomes.iter().map(|o| o.is_success()).collect();
    assert_eq!(outcomes.iter().filter(|ok| **ok).count(), 1);
}

#[tokio::test]
async fn test_request_carries_history_and_key() {
    let harness = Harness::new().await;
    harness
        .engine
        .submit(harness.submission("  hello  ", Harness::multi(&["a/x"])))
        .await
        .unwrap();

    let requests = harness.provider.requests_for("a/x");
    assert_eq!(requests.len(), 1);
    assert_eq!(requests[0].api_key, API_KEY);
    let roles: Vec<ChatRole> = requests[0].messages.iter().map(|m| m.role).collect();
    assert_eq!(roles, vec![ChatRole::System, ChatRole::User]);
    assert_eq!(requests[0].messages[1].content, "hello");
}

#[tokio::test]
async fn test_single_repeat_creates_numbered_threads() {
    let harness = Harness::new().await;
    let report = harness
        .engine
        .submit(harness.submission("hello", ModelSelection::single("openai/gpt-4o", 3)))
        .await
        .unwrap();

    let state = harness.engine.store().snapshot();
    let names: Vec<&str> = state.threads.iter().map(|t| t.display_name.as_str()).collect();
    assert_eq!(names, vec!["GPT-4o #1", "GPT-4o #2", "GPT-4o #3"]);
    assert_eq!(harness.provider.calls(), 3);

    harness.engine.flush().await;
    let detail = harness
        .sessions
        .get_session(report.session_id)
        .await
        .unwrap()
        .unwrap();
    let iterations: Vec<Option<u32>> = detail.threads.iter().map(|t| t.thread.iteration).collect();
    assert_eq!(iterations, vec![Some(1), Some(2), Some(3)]);
    assert_eq!(detail.session.system_prompt.as_deref(), Some("Be brief."));
}

#[tokio::test]
async fn test_invalid_input_is_rejected_before_any_work() {
    let harness = Harness::new().await;

    let err = harness
        .engine
        .submit(harness.submission("   ", Harness::multi(&["a/x"])))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::EmptyPrompt));

    let err = harness
        .engine
        .submit(harness.submission("hi", Harness::multi(&[])))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::NoModelSelected));

    let err = harness
        .engine
        .submit(harness.submission("hi", ModelSelection::single("a/x", 11)))
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::InvalidRepeatCount { got: 11, max: 10 }));

    assert_eq!(harness.provider.calls(), 0);
    assert!(harness.sessions.list_sessions().await.unwrap().is_empty());
}

#[tokio::test]
async fn test_missing_credential_aborts_submission() {
    let harness = Harness::new().await;
    let err = harness
        .engine
        .submit(Submission {
            credential: CredentialRef::Id(42),
            ..harness.submission("hello", Harness::multi(&["a/x"]))
        })
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::CredentialNotFound(42)));
    assert!(harness.engine.store().snapshot().threads.is_empty());
    assert!(harness.sessions.list_sessions().await.unwrap().is_empty());
    assert_eq!(harness.provider.calls(), 0);
}

#[tokio::test]
async fn test_thread_insert_failure_keeps_thread_in_memory() {
    let sessions = Arc::new(ThreadInsertRepository::failing());
    let harness = Harness::with_sessions(sessions.clone(), EngineConfig::default()).await;

    let report = harness
        .engine
        .submit(harness.submission("hello", Harness::multi(&["a/x"])))
        .await
        .unwrap();
    harness.engine.flush().await;

    let thread = harness.engine.store().thread(&report.thread_ids[0]).unwrap();
    assert_eq!(thread.persisted_id, None);
    assert!(thread.error.is_none());
    assert_eq!(thread.messages.last().unwrap().content, "ok");

    let detail = sessions.get_session(report.session_id).await.unwrap().unwrap();
    assert!(detail.threads.is_empty());
}

#[tokio::test(start_paused = true)]
async fn test_follow_up_accumulates_stats() {
    let harness = Harness::new().await;
    harness.provider.script(
        "a/x",
        vec![
            Reply::Text {
                chunks: vec!["first"],
                usage: (100, 10),
                delay: Duration::from_millis(100),
            },
            Reply::Text {
                chunks: vec!["second"],
                usage: (200, 20),
                delay: Duration::from_millis(300),
            },
        ],
    );

    let report = harness
        .engine
        .submit(harness.submission("one", Harness::multi(&["a/x"])))
        .await
        .unwrap();
    let thread_id = &report.thread_ids[0];

    let outcome = harness
        .engine
        .continue_thread(thread_id, "two", CredentialRef::Default)
        .await
        .unwrap();
    assert!(outcome.is_success());

    let thread = harness.engine.store().thread(thread_id).unwrap();
    assert_eq!(thread.stats.input_tokens, 300);
    assert_eq!(thread.stats.output_tokens, 30);
    assert!((thread.stats.cost - (0.12 + 0.24)).abs() < 1e-9);
    assert_eq!(thread.stats.latency_ms, 200.0);

    let second = &harness.provider.requests_for("a/x")[1];
    let contents: Vec<&str> = second.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Be brief.", "one", "first", "two"]);
}

#[tokio::test]
async fn test_busy_thread_rejects_second_turn() {
    let harness = Harness::new().await;
    harness.provider.script("a/x", vec![text(vec!["ok"], (1, 1)), Reply::Pending]);

    let report = harness
        .engine
        .submit(harness.submission("one", Harness::multi(&["a/x"])))
        .await
        .unwrap();
    let thread_id = report.thread_ids[0].clone();

    let engine = harness.engine.clone();
    let id = thread_id.clone();
    let pending = tokio::spawn(async move {
        engine
            .continue_thread(&id, "two", CredentialRef::Default)
            .await
    });
    harness.wait_for_calls(2).await;

    let err = harness
        .engine
        .continue_thread(&thread_id, "three", CredentialRef::Default)
        .await
        .unwrap_err();
    assert!(matches!(err, DispatchError::ThreadBusy(_)));

    harness.engine.cancel();
    let outcome = pending.await.unwrap().unwrap();
    assert_eq!(outcome.error.as_deref(), Some("request cancelled"));

    let thread = harness.engine.store().thread(&thread_id).unwrap();
    assert!(!thread.is_loading);
    let users = thread
        .messages
        .iter()
        .filter(|m| m.role == ChatRole::User)
        .count();
    assert_eq!(users, 2);
}

#[tokio::test]
async fn test_send_to_all_skips_errored_threads() {
    let harness = Harness::new().await;
    harness.provider.script("a/x", vec![Reply::Status(429)]);

    let report = harness
        .engine
        .submit(harness.submission("one", Harness::multi(&["a/x", "b/y", "c/z"])))
        .await
        .unwrap();

    let outcomes = harness
        .engine
        .send_to_all("two", CredentialRef::Default)
        .await
        .unwrap();
    let targets: Vec<&str> = outcomes.iter().map(|o| o.thread_id.as_str()).collect();
    assert_eq!(targets, vec![report.thread_ids[1].as_str(), report.thread_ids[2].as_str()]);
    assert!(outcomes.iter().all(|o| o.is_success()));
    assert_eq!(harness.provider.requests_for("a/x").len(), 1);
}

#[tokio::test]
async fn test_persisted_session_round_trip() {
    let harness = Harness::new().await;
    harness.provider.script("a/x", vec![text(vec!["A1"], (10, 1)), text(vec!["A2"], (20, 2))]);
    harness.provider.script("b/y", vec![text(vec!["B1"], (5, 5))]);

    let report = harness
        .engine
        .submit(harness.submission("q1", Harness::multi(&["a/x", "b/y"])))
        .await
        .unwrap();
    harness
        .engine
        .continue_thread(&report.thread_ids[0], "q2", CredentialRef::Default)
        .await
        .unwrap();
    harness.engine.flush().await;

    harness.engine.new_session();
    assert!(harness.engine.store().snapshot().threads.is_empty());

    harness.engine.load_session(report.session_id).await.unwrap();
    let state = harness.engine.store().snapshot();
    assert_eq!(state.current_session_id, Some(report.session_id));
    assert_eq!(state.system_prompt, "Be brief.");
    assert_eq!(state.threads.len(), 2);

    let first = &state.threads[0];
    let contents: Vec<&str> = first.messages.iter().map(|m| m.content.as_str()).collect();
    assert_eq!(contents, vec!["Be brief.", "q1", "A1", "q2", "A2"]);
    assert_eq!(first.stats.input_tokens, 30);
    assert_eq!(first.stats.output_tokens, 3);

    let detail = harness
        .sessions
        .get_session(report.session_id)
        .await
        .unwrap()
        .unwrap();
    let roles: Vec<MessageRole> = detail.threads[0].messages.iter().map(|m| m.role).collect();
    assert_eq!(
        roles,
        vec![
            MessageRole::User,
            MessageRole::Assistant,
            MessageRole::User,
            MessageRole::Assistant
        ]
    );

    // A loaded session takes follow-ups like a live one.
    let outcome = harness
        .engine
        .continue_thread(&state.threads[1].id, "q3", CredentialRef::Default)
        .await
        .unwrap();
    assert!(outcome.is_success());
}

#[tokio::test]
async fn test_second_submission_reuses_session() {
    let harness = Harness::new().await;
    let first = harness
        .engine
        .submit(harness.submission("one", Harness::multi(&["a/x"])))
        .await
        .unwrap();
    let second = harness
        .engine
        .submit(harness.submission("two", Harness::multi(&["b/y"])))
        .await
        .unwrap();

    assert_eq!(first.session_id, second.session_id);
    assert_eq!(harness.engine.store().snapshot().threads.len(), 2);
    assert_eq!(harness.sessions.list_sessions().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_cancel_fails_in_flight_threads() {
    let harness = Harness::new().await;
    harness.provider.script("a/x", vec![Reply::Pending]);

    let engine = harness.engine.clone();
    let submission = harness.submission("hello", Harness::multi(&["a/x", "b/y"]));
    let running = tokio::spawn(async move { engine.submit(submission).await });
    harness.wait_for_calls(2).await;

    harness.engine.cancel();
    let report = running.await.unwrap().unwrap();

    let state = harness.engine.store().snapshot();
    assert!(!state.is_loading);
    assert!(state.threads.iter().all(|t| !t.is_loading));
    let pending = state.thread(&report.thread_ids[0]).unwrap();
    assert_eq!(pending.error.as_deref(), Some("request cancelled"));
}

#[tokio::test(start_paused = true)]
async fn test_stalled_stream_times_out() {
    let config = EngineConfig {
        max_stream_duration: Duration::from_secs(5),
        ..EngineConfig::default()
    };
    let harness =
        Harness::with_sessions(Arc::new(InMemorySessionRepository::new()), config).await;
    harness.provider.script("a/x", vec![Reply::Pending]);

    let report = harness
        .engine
        .submit(harness.submission("hello", Harness::multi(&["a/x"])))
        .await
        .unwrap();

    assert_eq!(report.outcomes[0].error.as_deref(), Some("stream exceeded 5s"));
    assert!(!harness.engine.store().thread(&report.thread_ids[0]).unwrap().is_loading);
}

#[tokio::test(start_paused = true)]
async fn test_cancel_during_setup_stops_the_turn() {
    let sessions = Arc::new(ThreadInsertRepository::slow(Duration::from_millis(500)));
    let harness = Harness::with_sessions(sessions, EngineConfig::default()).await;

    let engine = harness.engine.clone();
    let submission = harness.submission("hello", Harness::multi(&["a/x"]));
    let running = tokio::spawn(async move { engine.submit(submission).await });

    tokio::time::sleep(Duration::from_millis(100)).await;
    harness.engine.cancel();
    let report = running.await.unwrap().unwrap();

    assert_eq!(harness.provider.calls(), 0);
    assert_eq!(report.outcomes[0].error.as_deref(), Some("request cancelled"));
    let state = harness.engine.store().snapshot();
    assert!(!state.is_loading);
    assert!(!state.thread(&report.thread_ids[0]).unwrap().is_loading);
}

#[tokio::test]
async fn test_cancel_before_a_later_operation_is_ignored() {
    let harness = Harness::new().await;
    harness.engine.cancel();

    let report = harness
        .engine
        .submit(harness.submission("hello", Harness::multi(&["a/x"])))
        .await
        .unwrap();

    assert!(report.outcomes[0].is_success());
    assert_eq!(harness.provider.calls(), 1);
}

#[tokio::test]
async fn test_hung_pricing_does_not_block_completion() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(serde_json::json!({"data": []}))
                .set_delay(Duration::from_secs(3600)),
        )
        .mount(&server)
        .await;

    let pricing = PricingCache::new(&Settings {
        pricing_url: format!("{}/api/v1/models", server.uri()),
        ..Settings::default()
    });
    let config = EngineConfig {
        pricing_wait: Duration::from_millis(200),
        ..EngineConfig::default()
    };
    let harness = Harness::with_pricing(pricing, config).await;
    harness.provider.script("a/x", vec![text(vec!["Hi"], (3, 1))]);

    let report = tokio::time::timeout(
        Duration::from_secs(5),
        harness
            .engine
            .submit(harness.submission("hello", Harness::multi(&["a/x"]))),
    )
    .await
    .expect("submit should not wait on pricing")
    .unwrap();

    assert!(report.outcomes[0].is_success());
    let thread = harness.engine.store().thread(&report.thread_ids[0]).unwrap();
    assert!(!thread.is_loading);
    assert_eq!(thread.messages.last().unwrap().content, "Hi");
    assert_eq!(thread.stats.cost, 0.0);
}

#[tokio::test]
async fn test_empty_reply_is_an_error() {
    let harness = Harness::new().await;
    harness.provider.script("a/x", vec![text(vec![], (3, 0))]);

    let report = harness
        .engine
        .submit(harness.submission("hello", Harness::multi(&["a/x"])))
        .await
        .unwrap();
    harness.engine.flush().await;

    assert_eq!(
        report.outcomes[0].error.as_deref(),
        Some("model returned an empty response")
    );
    let detail = harness
        .sessions
        .get_session(report.session_id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(detail.threads[0].messages.len(), 1);
}

#[tokio::test]
async fn test_session_events() {
    let harness = Harness::new().await;
    let mut events = harness.engine.store().subscribe();

    let report = harness
        .engine
        .submit(harness.submission("hello", Harness::multi(&["a/x"])))
        .await
        .unwrap();
    let session_id = report.session_id;

    harness
        .engine
        .rename_session(session_id, Some("  Haiku test "))
        .await
        .unwrap();
    harness.engine.delete_session(session_id).await.unwrap();

    let mut seen = Vec::new();
    while let Ok(event) = events.try_recv() {
        seen.push(event);
    }
    assert_eq!(seen.first(), Some(&ChatEvent::SessionCreated { session_id }));
    assert!(seen.contains(&ChatEvent::SessionRenamed {
        session_id,
        name: Some("Haiku test".into()),
    }));
    assert_eq!(seen.last(), Some(&ChatEvent::SessionDeleted { session_id }));
    assert!(seen.contains(&ChatEvent::ThreadsCleared));

    assert_eq!(harness.engine.store().snapshot().current_session_id, None);
    assert!(matches!(
        harness.engine.delete_session(session_id).await,
        Err(DispatchError::SessionNotFound(_))
    ));
}
