//! Poizon order CLI - database migrations and bot management.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! poizon-cli migrate
//!
//! # Register the Telegram webhook
//! poizon-cli webhook set --url https://example.com/api/telegram/webhook
//!
//! # Remove the Telegram webhook
//! poizon-cli webhook delete
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "poizon-cli")]
#[command(author, version, about = "Poizon order CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Manage the Telegram bot webhook
    Webhook {
        #[command(subcommand)]
        action: WebhookAction,
    },
}

#[derive(Subcommand)]
enum WebhookAction {
    /// Register the webhook URL with Telegram
    Set {
        /// Public https URL of `/api/telegram/webhook`
        #[arg(short, long)]
        url: String,
    },
    /// Remove the webhook
    Delete,
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Webhook { action } => match action {
            WebhookAction::Set { url } => commands::webhook::set(&url).await?,
            WebhookAction::Delete => commands::webhook::delete().await?,
        },
    }
    Ok(())
}
