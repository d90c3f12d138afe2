use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use futures::future::join_all;
use tokio::sync::watch;
use tokio::time::Instant;
use tracing::{debug, error, info, warn};

use crate::models::{
    CatalogModel, ChatMessage, CredentialRef, MessageRole, Thread, TokenUsage,
};
use crate::repositories::{CatalogRepository, NewMessage, NewSession, SessionRepository};
use crate::services::{
    ChatProvider, ChatRequest, CredentialService, PricingCache, ProviderError, decode_stream,
};
use crate::settings::Settings;

use super::error::DispatchError;
use super::events::ChatEvent;
use super::persistence::PersistenceWriter;
use super::rehydrate::rehydrate;
use super::selection::ModelSelection;
use super::store::{ChatAction, ChatStore};

/// Longest a finished turn waits on a price lookup before recording cost 0
const DEFAULT_PRICING_WAIT: Duration = Duration::from_secs(2);

#[derive(Clone, Debug)]
pub struct EngineConfig {
    pub max_repeat: u32,
    pub max_stream_duration: Duration,
    pub pricing_wait: Duration,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self::from(&Settings::default())
    }
}

impl From<&Settings> for EngineConfig {
    fn from(settings: &Settings) -> Self {
        Self {
            max_repeat: settings.max_repeat_count,
            max_stream_duration: settings.max_stream_duration(),
            pricing_wait: DEFAULT_PRICING_WAIT,
        }
    }
}

/// Collaborators the engine drives
pub struct EngineServices {
    pub credentials: CredentialService,
    pub catalog: Arc<dyn CatalogRepository>,
    pub sessions: Arc<dyn SessionRepository>,
    pub provider: Arc<dyn ChatProvider>,
    pub pricing: PricingCache,
}

/// One user turn fanned out over a model selection
#[derive(Clone, Debug)]
pub struct Submission {
    pub system_prompt: String,
    pub user_prompt: String,
    pub selection: ModelSelection,
    pub credential: CredentialRef,
}

/// Result of one thread's turn. `error` is the message recorded on the thread.
#[derive(Clone, Debug, PartialEq)]
pub struct TurnOutcome {
    pub thread_id: String,
    pub error: Option<String>,
}

impl TurnOutcome {
    pub fn is_success(&self) -> bool {
        self.error.is_none()
    }
}

#[derive(Clone, Debug)]
pub struct SubmitReport {
    pub session_id: i64,
    /// Threads created by the submission, in selection order
    pub thread_ids: Vec<String>,
    pub outcomes: Vec<TurnOutcome>,
}

/// Everything a single model request needs, captured when the turn begins
struct Turn {
    thread_id: String,
    model_id: String,
    persisted_id: Option<i64>,
    history: Vec<ChatMessage>,
    api_key: String,
}

/// Fans user turns out to model threads and folds the streamed replies into
/// the `ChatStore`.
///
/// Each thread's request is independent: a failure marks only that thread.
/// Every started turn ends in either an appended assistant message or a
/// thread error, including on cancellation and timeout.
pub struct ChatEngine {
    store: Arc<ChatStore>,
    services: EngineServices,
    writer: PersistenceWriter,
    cancel: watch::Sender<u64>,
    config: EngineConfig,
}

impl ChatEngine {
    /// Must be called inside a tokio runtime; starts the persistence worker.
    pub fn new(store: Arc<ChatStore>, services: EngineServices, config: EngineConfig) -> Self {
        let writer = PersistenceWriter::spawn(services.sessions.clone());
        let (cancel, _) = watch::channel(0);
        Self {
            store,
            services,
            writer,
            cancel,
            config,
        }
    }

    pub fn store(&self) -> &Arc<ChatStore> {
        &self.store
    }

    async fn resolve_credential(
        &self,
        reference: CredentialRef,
    ) -> Result<(i64, String), DispatchError> {
        match self.services.credentials.get(reference).await {
            Ok(Some(credential)) => Ok((credential.id, self.services.credentials.reveal(&credential))),
            Ok(None) => Err(match reference {
                CredentialRef::Id(id) => DispatchError::CredentialNotFound(id),
                CredentialRef::Default => DispatchError::NoDefaultCredential,
            }),
            Err(e) => Err(DispatchError::CredentialStore(e)),
        }
    }

    async fn catalog_snapshot(&self) -> Vec<CatalogModel> {
        match self.services.catalog.list_models(true).await {
            Ok(models) => models,
            Err(e) => {
                warn!(error = %e, "Failed to load catalog; using raw model ids");
                Vec::new()
            }
        }
    }

    /// Append the user message and mark the thread loading, atomically
    /// rejecting a thread that already has a turn in flight.
    fn begin_turn(
        &self,
        thread_id: &str,
        content: &str,
        api_key: &str,
    ) -> Result<Turn, DispatchError> {
        let state = self.store.dispatch_checked(|state| {
            let thread = state
                .thread(thread_id)
                .ok_or_else(|| DispatchError::ThreadNotFound(thread_id.to_string()))?;
            if thread.is_loading {
                return Err(DispatchError::ThreadBusy(thread_id.to_string()));
            }
            Ok(ChatAction::BeginTurn {
                thread_id: thread_id.to_string(),
                message: ChatMessage::user(content),
            })
        })?;

        let thread = state
            .thread(thread_id)
            .ok_or_else(|| DispatchError::ThreadNotFound(thread_id.to_string()))?;

        if let Some(persisted_id) = thread.persisted_id {
            self.writer.enqueue(NewMessage::user(persisted_id, content));
        }

        Ok(Turn {
            thread_id: thread.id.clone(),
            model_id: thread.model_id.clone(),
            persisted_id: thread.persisted_id,
            history: thread.messages.clone(),
            api_key: api_key.to_string(),
        })
    }

    /// Receiver that reports every `cancel()` issued after this call
    fn cancel_signal(&self) -> watch::Receiver<u64> {
        self.cancel.subscribe()
    }

    /// Cost from the price table, bounded by `pricing_wait`. A slow or
    /// failing refresh falls back to the cached prices.
    async fn turn_cost(&self, model_id: &str, usage: TokenUsage) -> f64 {
        let pricing = &self.services.pricing;
        match tokio::time::timeout(self.config.pricing_wait, pricing.cost(model_id, usage)).await {
            Ok(cost) => cost,
            Err(_) => {
                warn!(model = %model_id, "Pricing lookup timed out; using cached prices");
                pricing.cached_cost(model_id, usage)
            }
        }
    }

    /// Stream one model reply into the thread. Never leaves it loading.
    ///
    /// `cancelled` is taken when the calling operation starts, so a cancel
    /// issued during setup still stops the turn.
    async fn run_turn(&self, turn: Turn, mut cancelled: watch::Receiver<u64>) -> TurnOutcome {
        if cancelled.has_changed().unwrap_or(false) {
            return self.fail_turn(turn, ProviderError::Cancelled);
        }

        let limit = self.config.max_stream_duration;
        let started = Instant::now();

        let stream = async {
            let body = self
                .services
                .provider
                .stream_chat(ChatRequest {
                    model_id: turn.model_id.clone(),
                    messages: turn.history.clone(),
                    api_key: turn.api_key.clone(),
                })
                .await?;
            decode_stream(body, |text| {
                self.store.dispatch(ChatAction::AppendStreaming {
                    thread_id: turn.thread_id.clone(),
                    text: text.to_string(),
                });
            })
            .await
        };

        let result = tokio::select! {
            result = tokio::time::timeout(limit, stream) => {
                result.unwrap_or(Err(ProviderError::TimedOut(limit.as_secs())))
            }
            _ = cancelled.changed() => Err(ProviderError::Cancelled),
        };
        let latency_ms = started.elapsed().as_millis() as u64;

        let completion = match result {
            Ok(completion) if completion.content.is_empty() => Err(ProviderError::EmptyResponse),
            other => other,
        };

        let completion = match completion {
            Ok(completion) => completion,
            Err(e) => return self.fail_turn(turn, e),
        };

        let usage = completion.usage.unwrap_or_default();
        let cost = self.turn_cost(&turn.model_id, usage).await;
        debug!(
            thread_id = %turn.thread_id,
            model = %turn.model_id,
            input_tokens = usage.input_tokens,
            output_tokens = usage.output_tokens,
            latency_ms,
            "Model reply complete"
        );

        if let Some(persisted_id) = turn.persisted_id {
            self.writer.enqueue(assistant_message(
                persisted_id,
                &completion.content,
                usage,
                cost,
                latency_ms,
            ));
        }

        self.store.dispatch(ChatAction::CompleteTurn {
            thread_id: turn.thread_id.clone(),
            content: completion.content,
            usage,
            cost,
            latency_ms,
        });

        TurnOutcome {
            thread_id: turn.thread_id,
            error: None,
        }
    }

    fn fail_turn(&self, turn: Turn, e: ProviderError) -> TurnOutcome {
        warn!(thread_id = %turn.thread_id, model = %turn.model_id, error = %e, "Model request failed");
        let message = e.to_string();
        self.store.dispatch(ChatAction::FailTurn {
            thread_id: turn.thread_id.clone(),
            error: message.clone(),
        });
        TurnOutcome {
            thread_id: turn.thread_id,
            error: Some(message),
        }
    }

    /// Fan one user turn out over the selection and wait for every thread to
    /// settle.
    pub async fn submit(&self, submission: Submission) -> Result<SubmitReport, DispatchError> {
        let cancelled = self.cancel_signal();
        let user_prompt = submission.user_prompt.trim().to_string();
        if user_prompt.is_empty() {
            return Err(DispatchError::EmptyPrompt);
        }
        submission.selection.validate(self.config.max_repeat)?;

        let (credential_id, api_key) = self
            .resolve_credential(submission.credential)
            .await
            .inspect_err(|e| error!(error = %e, "Submission aborted: credential unavailable"))?;

        let system_prompt = submission.system_prompt.trim().to_string();
        let mode = submission.selection.mode();
        self.store
            .dispatch(ChatAction::SetSystemPrompt(system_prompt.clone()));
        self.store
            .dispatch(ChatAction::SetCredential(Some(credential_id)));
        self.store
            .dispatch(ChatAction::SetSelection(submission.selection.clone()));

        let session_id = match self.store.snapshot().current_session_id {
            Some(id) => id,
            None => {
                let session = self
                    .services
                    .sessions
                    .create_session(NewSession {
                        name: None,
                        credential_id: Some(credential_id),
                        system_prompt: (!system_prompt.is_empty()).then(|| system_prompt.clone()),
                        mode,
                    })
                    .await
                    .map_err(|e| {
                        error!(error = %e, "Submission aborted: session not created");
                        DispatchError::SessionCreation(e)
                    })?;
                self.store.dispatch(ChatAction::SetSession(Some(session.id)));
                self.store.publish(ChatEvent::SessionCreated {
                    session_id: session.id,
                });
                info!(session_id = session.id, mode = %mode, "Created session");
                session.id
            }
        };

        self.store.dispatch(ChatAction::SetLoading(true));
        let catalog = self.catalog_snapshot().await;

        let mut thread_ids = Vec::new();
        let mut turns = Vec::new();
        let mut outcomes = Vec::new();
        for (model_id, iteration) in submission.selection.expand() {
            let persisted_id = match self
                .services
                .sessions
                .create_thread(session_id, &model_id, iteration)
                .await
            {
                Ok(thread) => Some(thread.id),
                Err(e) => {
                    warn!(session_id, model = %model_id, error = %e, "Thread not persisted; continuing in memory");
                    None
                }
            };

            let base_name = CatalogModel::display_name_for(&catalog, &model_id);
            let display_name = match iteration {
                Some(i) => format!("{} #{}", base_name, i),
                None => base_name.to_string(),
            };

            let mut thread = Thread::new(model_id.clone(), display_name);
            thread.persisted_id = persisted_id;
            if !system_prompt.is_empty() {
                thread.messages.push(ChatMessage::system(system_prompt.clone()));
            }
            let thread_id = thread.id.clone();
            self.store.dispatch(ChatAction::AddThread(thread));
            thread_ids.push(thread_id.clone());

            match self.begin_turn(&thread_id, &user_prompt, &api_key) {
                Ok(turn) => turns.push(turn),
                Err(e) => {
                    self.store.dispatch(ChatAction::FailTurn {
                        thread_id: thread_id.clone(),
                        error: e.to_string(),
                    });
                    outcomes.push(TurnOutcome {
                        thread_id,
                        error: Some(e.to_string()),
                    });
                }
            }
        }

        info!(session_id, threads = thread_ids.len(), "Dispatching submission");

        outcomes.extend(
            join_all(
                turns
                    .into_iter()
                    .map(|turn| self.run_turn(turn, cancelled.clone())),
            )
            .await,
        );
        self.store.dispatch(ChatAction::SetLoading(false));

        Ok(SubmitReport {
            session_id,
            thread_ids,
            outcomes,
        })
    }

    /// Send a follow-up message on one thread, replaying its history
    pub async fn continue_thread(
        &self,
        thread_id: &str,
        message: &str,
        credential: CredentialRef,
    ) -> Result<TurnOutcome, DispatchError> {
        let cancelled = self.cancel_signal();
        let message = message.trim();
        if message.is_empty() {
            return Err(DispatchError::EmptyPrompt);
        }
        let thread = self
            .store
            .thread(thread_id)
            .ok_or_else(|| DispatchError::ThreadNotFound(thread_id.to_string()))?;
        if thread.is_loading {
            return Err(DispatchError::ThreadBusy(thread_id.to_string()));
        }

        let (_, api_key) = self.resolve_credential(credential).await?;
        let turn = self.begin_turn(thread_id, message, &api_key)?;
        Ok(self.run_turn(turn, cancelled).await)
    }

    /// Send a follow-up message on every thread that is neither loading nor
    /// errored
    pub async fn send_to_all(
        &self,
        message: &str,
        credential: CredentialRef,
    ) -> Result<Vec<TurnOutcome>, DispatchError> {
        let cancelled = self.cancel_signal();
        let message = message.trim();
        if message.is_empty() {
            return Err(DispatchError::EmptyPrompt);
        }
        let (_, api_key) = self.resolve_credential(credential).await?;

        let targets: Vec<String> = self
            .store
            .snapshot()
            .threads
            .iter()
            .filter(|t| t.is_idle())
            .map(|t| t.id.clone())
            .collect();

        self.store.dispatch(ChatAction::SetLoading(true));
        let outcomes = join_all(targets.iter().map(|thread_id| {
            let api_key = api_key.as_str();
            let cancelled = cancelled.clone();
            async move {
                match self.begin_turn(thread_id, message, api_key) {
                    Ok(turn) => self.run_turn(turn, cancelled).await,
                    Err(e) => TurnOutcome {
                        thread_id: thread_id.clone(),
                        error: Some(e.to_string()),
                    },
                }
            }
        }))
        .await;
        self.store.dispatch(ChatAction::SetLoading(false));

        Ok(outcomes)
    }

    /// Start over: no threads and no current session
    pub fn new_session(&self) {
        self.store.dispatch(ChatAction::Reset);
    }

    pub async fn load_session(&self, session_id: i64) -> Result<(), DispatchError> {
        let detail = self
            .services
            .sessions
            .get_session(session_id)
            .await?
            .ok_or(DispatchError::SessionNotFound(session_id))?;
        let catalog = self.services.catalog.list_models(false).await?;

        let restored = rehydrate(&detail, &catalog);
        info!(session_id, threads = restored.threads.len(), "Loaded session");
        self.store.dispatch(ChatAction::Restore(restored));
        self.store.publish(ChatEvent::SessionLoaded { session_id });
        Ok(())
    }

    /// Blank names clear the name
    pub async fn rename_session(
        &self,
        session_id: i64,
        name: Option<&str>,
    ) -> Result<(), DispatchError> {
        let name = name
            .map(str::trim)
            .filter(|n| !n.is_empty())
            .map(str::to_string);
        if !self
            .services
            .sessions
            .rename_session(session_id, name.clone())
            .await?
        {
            return Err(DispatchError::SessionNotFound(session_id));
        }
        self.store
            .publish(ChatEvent::SessionRenamed { session_id, name });
        Ok(())
    }

    pub async fn delete_session(&self, session_id: i64) -> Result<(), DispatchError> {
        if !self.services.sessions.delete_session(session_id).await? {
            return Err(DispatchError::SessionNotFound(session_id));
        }
        if self.store.snapshot().current_session_id == Some(session_id) {
            self.store.dispatch(ChatAction::Reset);
        }
        info!(session_id, "Deleted session");
        self.store.publish(ChatEvent::SessionDeleted { session_id });
        Ok(())
    }

    /// Abort every in-flight stream; affected threads end with an error
    pub fn cancel(&self) {
        self.cancel.send_modify(|generation| *generation = generation.wrapping_add(1));
        info!("Cancelled in-flight requests");
    }

    /// Wait until queued message writes were attempted
    pub async fn flush(&self) {
        self.writer.flush().await;
    }
}

fn assistant_message(
    thread_id: i64,
    content: &str,
    usage: TokenUsage,
    cost: f64,
    latency_ms: u64,
) -> NewMessage {
    NewMessage {
        thread_id,
        role: MessageRole::Assistant,
        content: content.to_string(),
        attachments: None,
        input_tokens: Some(usage.input_tokens),
        output_tokens: Some(usage.output_tokens),
        cost: Some(cost),
        latency_ms: Some(latency_ms),
        created_at: Utc::now(),
    }
}
