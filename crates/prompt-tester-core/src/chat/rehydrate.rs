use crate::models::{
    CatalogModel, ChatMessage, MessageRole, PersistedMessage, SessionDetail, SessionMode, Thread,
    ThreadStats,
};

use super::selection::ModelSelection;

/// A persisted session rebuilt as live workspace state
#[derive(Clone, Debug, PartialEq)]
pub struct RehydratedSession {
    pub session_id: i64,
    pub mode: SessionMode,
    pub system_prompt: String,
    pub credential_id: Option<i64>,
    pub selection: Option<ModelSelection>,
    pub threads: Vec<Thread>,
    pub active_thread_id: Option<String>,
}

fn stats_for(messages: &[PersistedMessage]) -> ThreadStats {
    let assistant: Vec<&PersistedMessage> = messages
        .iter()
        .filter(|m| m.role == MessageRole::Assistant)
        .collect();

    let mut stats = ThreadStats::default();
    for message in &assistant {
        stats.input_tokens += u64::from(message.input_tokens.unwrap_or(0));
        stats.output_tokens += u64::from(message.output_tokens.unwrap_or(0));
        stats.cost += message.cost.unwrap_or(0.0);
    }
    if !assistant.is_empty() {
        let total: u64 = assistant.iter().map(|m| m.latency_ms.unwrap_or(0)).sum();
        stats.latency_ms = total as f64 / assistant.len() as f64;
    }
    stats
}

fn infer_selection(mode: SessionMode, threads: &[Thread]) -> Option<ModelSelection> {
    let first = threads.first()?;
    match mode {
        SessionMode::SingleRepeat => Some(ModelSelection::SingleRepeat {
            model_id: first.model_id.clone(),
            repeat: threads
                .iter()
                .filter(|t| t.model_id == first.model_id)
                .count() as u32,
        }),
        SessionMode::MultiModel => {
            let mut model_ids: Vec<String> = Vec::new();
            for thread in threads {
                if !model_ids.contains(&thread.model_id) {
                    model_ids.push(thread.model_id.clone());
                }
            }
            Some(ModelSelection::MultiModel { model_ids })
        }
    }
}

/// Rebuild in-memory threads from a stored session.
///
/// Messages are ordered by `(created_at, id)`. A non-empty system prompt is
/// prepended to every thread as a synthetic message. Stats come from the
/// assistant messages only.
pub fn rehydrate(detail: &SessionDetail, catalog: &[CatalogModel]) -> RehydratedSession {
    let system_prompt = detail.session.system_prompt.clone().unwrap_or_default();

    let threads: Vec<Thread> = detail
        .threads
        .iter()
        .map(|thread_detail| {
            let persisted = &thread_detail.thread;
            let base_name = CatalogModel::display_name_for(catalog, &persisted.model_id);
            let display_name = match persisted.iteration {
                Some(iteration) => format!("{} #{}", base_name, iteration),
                None => base_name.to_string(),
            };

            let mut ordered: Vec<&PersistedMessage> = thread_detail.messages.iter().collect();
            ordered.sort_by_key(|m| (m.created_at, m.id));

            let mut messages = Vec::with_capacity(ordered.len() + 1);
            if !system_prompt.trim().is_empty() {
                messages.push(ChatMessage::system(system_prompt.clone()));
            }
            messages.extend(ordered.iter().map(|m| match m.role {
                MessageRole::User => ChatMessage::user(m.content.clone()),
                MessageRole::Assistant => ChatMessage::assistant(m.content.clone()),
            }));

            Thread {
                id: format!("thread-{}", persisted.id),
                persisted_id: Some(persisted.id),
                model_id: persisted.model_id.clone(),
                display_name,
                messages,
                is_loading: false,
                error: None,
                streaming: String::new(),
                stats: stats_for(&thread_detail.messages),
            }
        })
        .collect();

    RehydratedSession {
        session_id: detail.session.id,
        mode: detail.session.mode,
        system_prompt,
        credential_id: detail.session.credential_id,
        selection: infer_selection(detail.session.mode, &threads),
        active_thread_id: threads.first().map(|t| t.id.clone()),
        threads,
    }
}
