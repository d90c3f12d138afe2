use std::sync::Arc;

use parking_lot::RwLock;
use tokio::sync::broadcast;

use crate::models::{ChatMessage, SessionMode, SessionTotals, Thread, TokenUsage};

use super::events::ChatEvent;
use super::rehydrate::RehydratedSession;
use super::selection::ModelSelection;

const EVENT_CAPACITY: usize = 256;

/// Immutable snapshot of the chat workspace.
///
/// Threads are shared between snapshots; a transition copies only the
/// threads it touches.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct ChatState {
    pub threads: Vec<Arc<Thread>>,
    pub active_thread_id: Option<String>,
    pub current_session_id: Option<i64>,
    pub mode: SessionMode,
    pub selection: Option<ModelSelection>,
    pub system_prompt: String,
    pub credential_id: Option<i64>,
    /// A submission is in progress
    pub is_loading: bool,
}

impl ChatState {
    pub fn thread(&self, thread_id: &str) -> Option<&Thread> {
        self.threads
            .iter()
            .find(|t| t.id == thread_id)
            .map(|t| t.as_ref())
    }

    pub fn totals(&self) -> SessionTotals {
        self.threads
            .iter()
            .fold(SessionTotals::default(), |mut totals, thread| {
                totals.input_tokens += thread.stats.input_tokens;
                totals.output_tokens += thread.stats.output_tokens;
                totals.cost += thread.stats.cost;
                totals.thread_count += 1;
                totals
            })
    }
}

#[derive(Clone, Debug)]
pub enum ChatAction {
    SetLoading(bool),
    SetSession(Option<i64>),
    SetSystemPrompt(String),
    SetCredential(Option<i64>),
    /// Also switches the mode to match
    SetSelection(ModelSelection),
    /// Append a thread and make it active
    AddThread(Thread),
    /// Append a user turn, clear any previous error and mark the thread loading
    BeginTurn {
        thread_id: String,
        message: ChatMessage,
    },
    AppendStreaming {
        thread_id: String,
        text: String,
    },
    CompleteTurn {
        thread_id: String,
        content: String,
        usage: TokenUsage,
        cost: f64,
        latency_ms: u64,
    },
    FailTurn {
        thread_id: String,
        error: String,
    },
    /// Replace the workspace with a loaded session
    Restore(RehydratedSession),
    /// Drop all threads and forget the current session
    Reset,
}

fn update_thread(state: &mut ChatState, thread_id: &str, f: impl FnOnce(&mut Thread)) {
    if let Some(thread) = state.threads.iter_mut().find(|t| t.id == thread_id) {
        f(Arc::make_mut(thread));
    }
}

/// Pure state transition. Actions naming an unknown thread leave the state
/// unchanged.
pub fn reduce(state: &ChatState, action: ChatAction) -> ChatState {
    let mut next = state.clone();
    match action {
        ChatAction::SetLoading(loading) => next.is_loading = loading,
        ChatAction::SetSession(id) => next.current_session_id = id,
        ChatAction::SetSystemPrompt(prompt) => next.system_prompt = prompt,
        ChatAction::SetCredential(id) => next.credential_id = id,
        ChatAction::SetSelection(selection) => {
            next.mode = selection.mode();
            next.selection = Some(selection);
        }
        ChatAction::AddThread(thread) => {
            next.active_thread_id = Some(thread.id.clone());
            next.threads.push(Arc::new(thread));
        }
        ChatAction::BeginTurn { thread_id, message } => {
            update_thread(&mut next, &thread_id, |thread| {
                thread.messages.push(message);
                thread.is_loading = true;
                thread.error = None;
                thread.streaming.clear();
            });
        }
        ChatAction::AppendStreaming { thread_id, text } => {
            update_thread(&mut next, &thread_id, |thread| {
                thread.streaming.push_str(&text);
            });
        }
        ChatAction::CompleteTurn {
            thread_id,
            content,
            usage,
            cost,
            latency_ms,
        } => {
            update_thread(&mut next, &thread_id, |thread| {
                let previous_turns = thread.assistant_turns();
                thread.stats = thread
                    .stats
                    .record_turn(usage, cost, latency_ms, previous_turns);
                thread.messages.push(ChatMessage::assistant(content));
                thread.is_loading = false;
                thread.streaming.clear();
            });
        }
        ChatAction::FailTurn { thread_id, error } => {
            update_thread(&mut next, &thread_id, |thread| {
                thread.is_loading = false;
                thread.error = Some(error);
                thread.streaming.clear();
            });
        }
        ChatAction::Restore(session) => {
            next.threads = session.threads.into_iter().map(Arc::new).collect();
            next.active_thread_id = session.active_thread_id;
            next.current_session_id = Some(session.session_id);
            next.mode = session.mode;
            if session.selection.is_some() {
                next.selection = session.selection;
            }
            next.system_prompt = session.system_prompt;
            if session.credential_id.is_some() {
                next.credential_id = session.credential_id;
            }
            next.is_loading = false;
        }
        ChatAction::Reset => {
            next.threads.clear();
            next.active_thread_id = None;
            next.current_session_id = None;
            next.is_loading = false;
        }
    }
    next
}

fn event_for(action: &ChatAction) -> Option<ChatEvent> {
    match action {
        ChatAction::AddThread(thread) => Some(ChatEvent::ThreadAdded {
            thread_id: thread.id.clone(),
        }),
        ChatAction::AppendStreaming { thread_id, .. } => Some(ChatEvent::ThreadStreaming {
            thread_id: thread_id.clone(),
        }),
        ChatAction::BeginTurn { thread_id, .. }
        | ChatAction::CompleteTurn { thread_id, .. }
        | ChatAction::FailTurn { thread_id, .. } => Some(ChatEvent::ThreadUpdated {
            thread_id: thread_id.clone(),
        }),
        ChatAction::Reset => Some(ChatEvent::ThreadsCleared),
        _ => None,
    }
}

/// Owner of the chat state.
///
/// Every change replaces the whole snapshot under a write lock, so a
/// `snapshot()` is always internally consistent. Subscribers receive
/// `ChatEvent`s after the corresponding snapshot is visible.
///
/// Per-delta `ThreadStreaming` events go to their own channel so a burst of
/// tokens cannot push session and thread events out of `subscribe()`.
pub struct ChatStore {
    state: RwLock<Arc<ChatState>>,
    events: broadcast::Sender<ChatEvent>,
    deltas: broadcast::Sender<ChatEvent>,
}

impl ChatStore {
    pub fn new() -> Self {
        let (events, _) = broadcast::channel(EVENT_CAPACITY);
        let (deltas, _) = broadcast::channel(EVENT_CAPACITY);
        Self {
            state: RwLock::new(Arc::new(ChatState::default())),
            events,
            deltas,
        }
    }

    pub fn snapshot(&self) -> Arc<ChatState> {
        self.state.read().clone()
    }

    pub fn dispatch(&self, action: ChatAction) -> Arc<ChatState> {
        let event = event_for(&action);
        let next = {
            let mut state = self.state.write();
            let next = Arc::new(reduce(&state, action));
            *state = next.clone();
            next
        };
        if let Some(event) = event {
            self.publish(event);
        }
        next
    }

    /// Derive an action from the current state and apply it under one write
    /// lock. Nothing changes when `check` fails.
    pub fn dispatch_checked<E>(
        &self,
        check: impl FnOnce(&ChatState) -> Result<ChatAction, E>,
    ) -> Result<Arc<ChatState>, E> {
        let (next, event) = {
            let mut state = self.state.write();
            let action = check(&state)?;
            let event = event_for(&action);
            let next = Arc::new(reduce(&state, action));
            *state = next.clone();
            (next, event)
        };
        if let Some(event) = event {
            self.publish(event);
        }
        Ok(next)
    }

    /// Session and thread lifecycle events
    pub fn subscribe(&self) -> broadcast::Receiver<ChatEvent> {
        self.events.subscribe()
    }

    /// One `ThreadStreaming` event per received text fragment. Lagging here
    /// only skips redraws; the snapshot always holds the full text.
    pub fn subscribe_streaming(&self) -> broadcast::Receiver<ChatEvent> {
        self.deltas.subscribe()
    }

    /// Send an event; having no subscribers is fine
    pub fn publish(&self, event: ChatEvent) {
        let channel = match event {
            ChatEvent::ThreadStreaming { .. } => &self.deltas,
            _ => &self.events,
        };
        let _ = channel.send(event);
    }

    pub fn thread(&self, thread_id: &str) -> Option<Thread> {
        self.snapshot().thread(thread_id).cloned()
    }
}

impl Default for ChatStore {
    fn default() -> Self {
        Self::new()
    }
}
