/// Notifications published by `ChatStore` after state changes.
/// Thread events carry the in-memory thread id so subscribers can filter.
#[derive(Clone, Debug, PartialEq)]
pub enum ChatEvent {
    SessionCreated { session_id: i64 },
    SessionLoaded { session_id: i64 },
    SessionRenamed { session_id: i64, name: Option<String> },
    SessionDeleted { session_id: i64 },
    ThreadAdded { thread_id: String },
    ThreadUpdated { thread_id: String },
    /// New streamed text; delivered through `ChatStore::subscribe_streaming`
    ThreadStreaming { thread_id: String },
    ThreadsCleared,
}
