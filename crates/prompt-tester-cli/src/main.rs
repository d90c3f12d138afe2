use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};

mod app;
mod commands;

use commands::{keys::KeysAction, models::ModelsAction, prompts::PromptsAction};
use commands::{run::RunArgs, sessions::SessionsAction};

#[derive(Parser)]
#[command(name = "prompt-tester")]
#[command(about = "Send one prompt to many LLMs and compare the answers", long_about = None)]
struct Cli {
    /// SQLite database file
    #[arg(long, global = true, env = "PROMPT_TESTER_DB")]
    db: Option<PathBuf>,

    /// Base URL of the OpenAI-compatible API
    #[arg(long, global = true, env = "PROMPT_TESTER_API_BASE")]
    api_base: Option<String>,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Manage API keys
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },
    /// Manage the model catalog
    Models {
        #[command(subcommand)]
        action: ModelsAction,
    },
    /// Manage saved prompts
    Prompts {
        #[command(subcommand)]
        action: PromptsAction,
    },
    /// Send a prompt to one model repeatedly or to several models
    Run(RunArgs),
    /// Browse and continue saved sessions
    Sessions {
        #[command(subcommand)]
        action: SessionsAction,
    },
    /// Show per-token prices for a model
    Pricing {
        model_id: String,
        #[arg(long, default_value_t = 0)]
        prompt_tokens: u32,
        #[arg(long, default_value_t = 0)]
        completion_tokens: u32,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    prompt_tester_core::logging::init_logging();

    let cli = Cli::parse();
    let app = app::App::open(cli.db, cli.api_base).await?;

    let result = match cli.command {
        Commands::Keys { action } => commands::keys::handle(&app, action).await,
        Commands::Models { action } => commands::models::handle(&app, action).await,
        Commands::Prompts { action } => commands::prompts::handle(&app, action).await,
        Commands::Run(args) => commands::run::handle(&app, args).await,
        Commands::Sessions { action } => commands::sessions::handle(&app, action).await,
        Commands::Pricing {
            model_id,
            prompt_tokens,
            completion_tokens,
        } => commands::pricing::handle(&app, &model_id, prompt_tokens, completion_tokens).await,
    };

    app.shutdown().await;
    result
}
