use std::path::PathBuf;

use anyhow::Result;
use clap::{Parser, Subcommand};
use ochat_core::factories::StorageFactory;
use ochat_core::settings::{
    BackendMode, ChatSettings, SettingsJsonRepository, SettingsRepository, StorageKind,
};
use tracing_subscriber::EnvFilter;

mod repl;

#[derive(Parser)]
#[command(name = "ochat")]
#[command(about = "Chat with a local Ollama model from the terminal", long_about = None)]
struct Cli {
    /// Settings file (defaults to <config dir>/ochat/settings.json)
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Backend mode: direct or route_handler
    #[arg(long, global = true)]
    mode: Option<BackendMode>,

    /// Model to chat with
    #[arg(long, global = true)]
    model: Option<String>,

    /// Storage backend: json_files, sqlite or memory
    #[arg(long, global = true)]
    storage: Option<StorageKind>,

    /// Directory for stored conversations
    #[arg(long, global = true)]
    storage_dir: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Interactive chat (the default)
    Chat {
        /// Resume a stored conversation
        #[arg(long)]
        conversation: Option<String>,
    },
    /// List stored conversations
    List,
    /// Print a stored conversation
    Show { id: String },
    /// Delete a stored conversation
    Delete { id: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    // Logs go to stderr so they never interleave with the reply on stdout
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let settings = load_settings(&cli).await?;
    let stores = StorageFactory::open(&settings).await?;

    match cli.command.unwrap_or(Commands::Chat { conversation: None }) {
        Commands::Chat { conversation } => {
            let username = stores.preferences.ensure_username().await?;
            repl::run(stores, settings, username, conversation).await?;
        }
        Commands::List => {
            for id in stores.conversations.list_ids().await? {
                let messages = stores.conversations.load(&id).await;
                let preview = messages
                    .first()
                    .map(|m| repl::preview(&m.content))
                    .unwrap_or_default();
                println!("{}  ({} messages)  {}", id, messages.len(), preview);
            }
        }
        Commands::Show { id } => {
            let messages = stores.conversations.load(&id).await;
            if messages.is_empty() {
                anyhow::bail!("No conversation stored under {}", id);
            }
            for message in messages {
                println!("{}> {}", message.role.as_str(), message.content);
            }
        }
        Commands::Delete { id } => {
            stores.conversations.delete(&id).await?;
            println!("Deleted {}", id);
        }
    }

    Ok(())
}

async fn load_settings(cli: &Cli) -> Result<ChatSettings> {
    let repository = match &cli.config {
        Some(path) => SettingsJsonRepository::with_path(path),
        None => SettingsJsonRepository::new()?,
    };

    let mut settings = repository.load().await?.with_env_overrides();

    if let Some(mode) = cli.mode {
        settings.backend_mode = mode;
    }
    if let Some(model) = &cli.model {
        settings.default_model = model.clone();
    }
    if let Some(storage) = cli.storage {
        settings.storage = storage;
    }
    if let Some(dir) = &cli.storage_dir {
        settings.storage_dir = Some(dir.clone());
    }

    tracing::debug!(?settings, "Settings loaded");
    Ok(settings)
}
