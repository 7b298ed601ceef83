//! Rackz CLI - Database migrations and account tools.
//!
//! # Usage
//!
//! ```bash
//! # Create the account-document and session tables
//! rackz-cli migrate
//!
//! # Print a user's account document
//! rackz-cli account show -u usr_123
//!
//! # Reset a user's account document
//! rackz-cli account clear -u usr_123
//!
//! # Move a setup request along its status machine
//! rackz-cli setup advance -u usr_123 -r setup_5f0c9e7a2b8d4c1e9a6f3b2d1c0e8a7f -s in_review
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `account show|clear` - Inspect or reset account documents
//! - `setup advance` - Change a setup request's status

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(name = "rackz-cli")]
#[command(author, version, about = "Rackz CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Inspect and reset account documents
    Account {
        #[command(subcommand)]
        action: AccountAction,
    },
    /// Manage setup requests
    Setup {
        #[command(subcommand)]
        action: SetupAction,
    },
}

#[derive(Subcommand)]
enum AccountAction {
    /// Print a user's account document as JSON
    Show {
        /// User id from the payments API
        #[arg(short, long)]
        user: String,
    },
    /// Delete a user's account document
    Clear {
        /// User id from the payments API
        #[arg(short, long)]
        user: String,
    },
}

#[derive(Subcommand)]
enum SetupAction {
    /// Move a setup request to a new status
    Advance {
        /// User id from the payments API
        #[arg(short, long)]
        user: String,

        /// Setup request id
        #[arg(short, long)]
        request: String,

        /// Target status (`in_review`, `in_progress`, `testing`, `completed`, `on_hold`)
        #[arg(short, long)]
        status: String,
    },
}

#[tokio::main]
async fn main() {
    // Initialize tracing
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
        Commands::Account { action } => match action {
            AccountAction::Show { user } => commands::account::show(&user).await?,
            AccountAction::Clear { user } => commands::account::clear(&user).await?,
        },
        Commands::Setup { action } => match action {
            SetupAction::Advance {
                user,
                request,
                status,
            } => commands::account::advance_setup(&user, &request, &status).await?,
        },
    }
    Ok(())
}
