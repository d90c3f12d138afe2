use anyhow::{Context, Result};
use clap::{ArgGroup, Args};

use prompt_tester_core::chat::{
    ChatState, ModelSelection, Submission, TurnOutcome, parse_model_list,
};
use prompt_tester_core::models::{ChatRole, CredentialRef};

use crate::app::App;

#[derive(Args)]
#[command(group(ArgGroup::new("selection").required(true).args(["model", "models"])))]
pub struct RunArgs {
    /// User prompt
    pub prompt: String,

    #[arg(long, default_value = "")]
    pub system: String,

    /// API key id; the default key when omitted
    #[arg(long)]
    pub key: Option<i64>,

    /// Call one model several times
    #[arg(long)]
    pub model: Option<String>,

    #[arg(long, default_value_t = 1, requires = "model")]
    pub repeat: u32,

    /// Comma-separated catalog models to call once each
    #[arg(long)]
    pub models: Option<String>,

    /// Extra comma-separated model ids outside the catalog
    #[arg(long, requires = "models", default_value = "")]
    pub extra: String,
}

impl RunArgs {
    fn selection(&self) -> ModelSelection {
        match &self.model {
            Some(model_id) => ModelSelection::single(model_id.clone(), self.repeat),
            None => ModelSelection::multi(
                parse_model_list(self.models.as_deref().unwrap_or("")),
                &self.extra,
            ),
        }
    }
}

pub async fn handle(app: &App, args: RunArgs) -> Result<()> {
    let submission = Submission {
        system_prompt: args.system.clone(),
        user_prompt: args.prompt.clone(),
        selection: args.selection(),
        credential: CredentialRef::from(args.key),
    };

    let report = app
        .engine
        .submit(submission)
        .await
        .context("Submission failed")?;

    println!("Session {}", report.session_id);
    print_outcomes(&app.engine.store().snapshot(), &report.outcomes);
    Ok(())
}

/// Latest reply or error of each thread, then the session totals
pub fn print_outcomes(state: &ChatState, outcomes: &[TurnOutcome]) {
    for outcome in outcomes {
        let Some(thread) = state.thread(&outcome.thread_id) else {
            continue;
        };
        println!();
        println!("== {} ({})", thread.display_name, thread.id);
        match &outcome.error {
            Some(error) => println!("error: {}", error),
            None => {
                if let Some(reply) = thread
                    .messages
                    .iter()
                    .rev()
                    .find(|m| m.role == ChatRole::Assistant)
                {
                    println!("{}", reply.content);
                }
                println!(
                    "-- {} in / {} out, ${:.6}, avg {:.0} ms",
                    thread.stats.input_tokens,
                    thread.stats.output_tokens,
                    thread.stats.cost,
                    thread.stats.latency_ms
                );
            }
        }
    }

    let totals = state.totals();
    println!();
    println!(
        "Total: {} threads, {} in / {} out, ${:.6}",
        totals.thread_count, totals.input_tokens, totals.output_tokens, totals.cost
    );
}
