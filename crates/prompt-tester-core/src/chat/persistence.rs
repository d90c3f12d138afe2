use std::sync::Arc;

use tokio::sync::{mpsc, oneshot};
use tracing::{debug, warn};

use crate::repositories::{NewMessage, SessionRepository};

enum Command {
    Write(NewMessage),
    Flush(oneshot::Sender<()>),
}

/// Background writer for message rows.
///
/// Writes run one at a time in the order they were queued. Each is attempted
/// once; failures are logged and dropped. Queuing never waits on the store.
#[derive(Clone)]
pub struct PersistenceWriter {
    tx: mpsc::UnboundedSender<Command>,
}

impl PersistenceWriter {
    /// Start the worker task on the current tokio runtime
    pub fn spawn(repository: Arc<dyn SessionRepository>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Command>();

        tokio::spawn(async move {
            while let Some(command) = rx.recv().await {
                match command {
                    Command::Write(message) => {
                        let thread_id = message.thread_id;
                        let role = message.role;
                        match repository.append_message(message).await {
                            Ok(saved) => debug!(thread_id, message_id = saved.id, "Saved message"),
                            Err(e) => warn!(
                                thread_id,
                                role = role.as_str(),
                                error = %e,
                                "Failed to save message"
                            ),
                        }
                    }
                    Command::Flush(done) => {
                        let _ = done.send(());
                    }
                }
            }
        });

        Self { tx }
    }

    pub fn enqueue(&self, message: NewMessage) {
        if self.tx.send(Command::Write(message)).is_err() {
            warn!("Persistence worker stopped; dropping message");
        }
    }

    /// Resolves once every write queued before this call was attempted
    pub async fn flush(&self) {
        let (done_tx, done_rx) = oneshot::channel();
        if self.tx.send(Command::Flush(done_tx)).is_ok() {
            let _ = done_rx.await;
        }
    }
}
