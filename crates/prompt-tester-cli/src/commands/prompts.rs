use anyhow::{Result, bail};
use clap::Subcommand;

use prompt_tester_core::models::PromptKind;
use prompt_tester_core::repositories::{NewPrompt, PromptFilter};

use crate::app::App;

#[derive(Subcommand)]
pub enum PromptsAction {
    /// List saved prompts, most recently updated first
    List {
        #[arg(long)]
        kind: Option<PromptKind>,
        #[arg(long)]
        category: Option<String>,
    },
    Add {
        name: String,
        /// `system` or `user`
        kind: PromptKind,
        content: String,
        #[arg(long)]
        category: Option<String>,
    },
    Remove { id: i64 },
}

pub async fn handle(app: &App, action: PromptsAction) -> Result<()> {
    match action {
        PromptsAction::List { kind, category } => {
            let prompts = app
                .catalog
                .list_prompts(PromptFilter { kind, category })
                .await?;
            for prompt in prompts {
                let category = prompt.category.as_deref().unwrap_or("-");
                println!(
                    "{:>3}  [{}] {} ({})",
                    prompt.id, prompt.kind, prompt.name, category
                );
                println!("     {}", prompt.content.replace('\n', "\n     "));
            }
        }
        PromptsAction::Add {
            name,
            kind,
            content,
            category,
        } => {
            let prompt = app
                .catalog
                .create_prompt(NewPrompt {
                    name,
                    kind,
                    content,
                    category: category.filter(|c| !c.trim().is_empty()),
                })
                .await?;
            println!("Saved {} prompt {}", prompt.kind, prompt.id);
        }
        PromptsAction::Remove { id } => {
            if !app.catalog.delete_prompt(id).await? {
                bail!("prompt {} not found", id);
            }
        }
    }
    Ok(())
}
