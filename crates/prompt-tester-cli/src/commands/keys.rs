use anyhow::{Result, bail};
use clap::Subcommand;

use crate::app::App;

#[derive(Subcommand)]
pub enum KeysAction {
    /// List stored keys with masked secrets
    List,
    /// Store a new key
    Add {
        name: String,
        secret: String,
        /// Use this key when none is given
        #[arg(long)]
        default: bool,
    },
    /// Make a key the default
    SetDefault { id: i64 },
    Rename { id: i64, name: String },
    Remove { id: i64 },
}

pub async fn handle(app: &App, action: KeysAction) -> Result<()> {
    match action {
        KeysAction::List => {
            let keys = app.credentials.list().await?;
            if keys.is_empty() {
                println!("No API keys stored. Add one with `prompt-tester keys add`.");
            }
            for key in keys {
                let marker = if key.is_default { "*" } else { " " };
                println!("{} {:>3}  {:<20} {}", marker, key.id, key.name, key.masked_secret);
            }
        }
        KeysAction::Add {
            name,
            secret,
            default,
        } => {
            let key = app.credentials.create(&name, &secret, default).await?;
            println!("Stored key {} ({})", key.id, key.masked_secret);
        }
        KeysAction::SetDefault { id } => {
            if app.credentials.set_default(id).await?.is_none() {
                bail!("API key {} not found", id);
            }
            println!("Key {} is now the default", id);
        }
        KeysAction::Rename { id, name } => {
            if app
                .credentials
                .update(id, Some(name), None, None)
                .await?
                .is_none()
            {
                bail!("API key {} not found", id);
            }
        }
        KeysAction::Remove { id } => {
            if !app.credentials.delete(id).await? {
                bail!("API key {} not found", id);
            }
            println!("Removed key {}", id);
        }
    }
    Ok(())
}
