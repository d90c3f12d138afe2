use anyhow::{Context, Result, bail};
use clap::Subcommand;

use prompt_tester_core::repositories::ModelUpdate;

use crate::app::App;

#[derive(Subcommand)]
pub enum ModelsAction {
    /// List catalog models in display order
    List {
        /// Include inactive models
        #[arg(long)]
        all: bool,
    },
    Add { model_id: String, display_name: String },
    /// Flip a model between active and inactive
    Toggle { id: i64 },
    /// Set sort orders, e.g. `reorder 3=1 1=2`
    Reorder {
        #[arg(required = true, value_parser = parse_order)]
        orders: Vec<(i64, i64)>,
    },
    Remove { id: i64 },
}

fn parse_order(raw: &str) -> Result<(i64, i64), String> {
    let (id, order) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <id>=<order>, got '{}'", raw))?;
    let id = id.trim().parse().map_err(|_| format!("invalid id '{}'", id))?;
    let order = order
        .trim()
        .parse()
        .map_err(|_| format!("invalid order '{}'", order))?;
    Ok((id, order))
}

pub async fn handle(app: &App, action: ModelsAction) -> Result<()> {
    match action {
        ModelsAction::List { all } => {
            for model in app.catalog.list_models(all).await? {
                let state = if model.is_active { "" } else { " (inactive)" };
                println!(
                    "{:>3}  {:<40} {}{}",
                    model.id, model.model_id, model.display_name, state
                );
            }
        }
        ModelsAction::Add {
            model_id,
            display_name,
        } => {
            let model = app.catalog.add_model(&model_id, &display_name).await?;
            println!("Added {} at position {}", model.model_id, model.sort_order);
        }
        ModelsAction::Toggle { id } => {
            let current = app
                .catalog
                .list_models(true)
                .await?
                .into_iter()
                .find(|m| m.id == id)
                .with_context(|| format!("model {} not found", id))?;
            app.catalog
                .update_model(
                    id,
                    ModelUpdate {
                        is_active: Some(!current.is_active),
                        ..Default::default()
                    },
                )
                .await?;
            println!(
                "{} is now {}",
                current.model_id,
                if current.is_active { "inactive" } else { "active" }
            );
        }
        ModelsAction::Reorder { orders } => {
            app.catalog
                .reorder_models(orders)
                .await
                .context("Reorder rejected; no changes applied")?;
        }
        ModelsAction::Remove { id } => {
            if !app.catalog.delete_model(id).await? {
                bail!("model {} not found", id);
            }
        }
    }
    Ok(())
}
