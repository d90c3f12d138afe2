use anyhow::{Context, Result};
use clap::Subcommand;

use prompt_tester_core::models::{ChatRole, CredentialRef};

use crate::app::App;

use super::run::print_outcomes;

#[derive(Subcommand)]
pub enum SessionsAction {
    /// List sessions, newest first
    List,
    /// Print every thread of a session
    Show { id: i64 },
    /// Rename a session; omit the name to clear it
    Rename { id: i64, name: Option<String> },
    Delete { id: i64 },
    /// Continue a session on one thread or on every thread
    Reply {
        id: i64,
        message: String,
        /// Stored thread id from `sessions show`
        #[arg(long)]
        thread: Option<i64>,
        /// API key id; the session's key when omitted
        #[arg(long)]
        key: Option<i64>,
    },
}

pub async fn handle(app: &App, action: SessionsAction) -> Result<()> {
    match action {
        SessionsAction::List => {
            for summary in app.sessions.list_sessions().await? {
                let session = &summary.session;
                println!(
                    "{:>4}  {}  {:<13} {:>2} threads  {}",
                    session.id,
                    session.created_at.format("%Y-%m-%d %H:%M"),
                    session.mode.as_str(),
                    summary.thread_count,
                    session.title()
                );
            }
        }
        SessionsAction::Show { id } => {
            app.engine.load_session(id).await?;
            let state = app.engine.store().snapshot();
            for thread in &state.threads {
                println!("== {} ({})", thread.display_name, thread.id);
                for message in &thread.messages {
                    let label = match message.role {
                        ChatRole::System => "system",
                        ChatRole::User => "user",
                        ChatRole::Assistant => "assistant",
                    };
                    println!("[{}] {}", label, message.content);
                }
                println!(
                    "-- {} in / {} out, ${:.6}, avg {:.0} ms",
                    thread.stats.input_tokens,
                    thread.stats.output_tokens,
                    thread.stats.cost,
                    thread.stats.latency_ms
                );
                println!();
            }
        }
        SessionsAction::Rename { id, name } => {
            app.engine.rename_session(id, name.as_deref()).await?;
        }
        SessionsAction::Delete { id } => {
            app.engine.delete_session(id).await?;
            println!("Deleted session {}", id);
        }
        SessionsAction::Reply {
            id,
            message,
            thread,
            key,
        } => {
            app.engine.load_session(id).await?;
            let credential = match key {
                Some(key) => CredentialRef::Id(key),
                None => CredentialRef::from(app.engine.store().snapshot().credential_id),
            };

            let outcomes = match thread {
                Some(thread) => {
                    let thread_id = format!("thread-{}", thread);
                    vec![
                        app.engine
                            .continue_thread(&thread_id, &message, credential)
                            .await
                            .with_context(|| format!("Cannot reply on thread {}", thread))?,
                    ]
                }
                None => app.engine.send_to_all(&message, credential).await?,
            };
            print_outcomes(&app.engine.store().snapshot(), &outcomes);
        }
    }
    Ok(())
}
