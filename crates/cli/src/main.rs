//! Synclune CLI - database migrations, maintenance jobs and admin accounts.
//!
//! # Usage
//!
//! ```bash
//! # Apply database migrations
//! synclune-cli migrate
//!
//! # Run a maintenance job once and print its report
//! synclune-cli jobs run cleanup-expired-carts
//!
//! # Give a registered account back-office access
//! synclune-cli admin promote -e gerante@synclune.fr
//! ```
//!
//! # Commands
//!
//! - `migrate` - Run database migrations
//! - `jobs list` / `jobs run <job>` - Maintenance jobs
//! - `admin promote` / `admin demote` - Back-office access

#![cfg_attr(not(test), forbid(unsafe_code))]

use clap::{Parser, Subcommand};
use synclune_core::UserRole;

mod commands;

#[derive(Parser)]
#[command(name = "synclune-cli")]
#[command(author, version, about = "Synclune CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Run maintenance jobs
    Jobs {
        #[command(subcommand)]
        action: JobsAction,
    },
    /// Manage back-office access
    Admin {
        #[command(subcommand)]
        action: AdminAction,
    },
}

#[derive(Subcommand)]
enum JobsAction {
    /// List job names
    List,
    /// Run one job and print its report as JSON
    Run {
        /// Job name, e.g. `release-stale-orders`
        job: String,
    },
}

#[derive(Subcommand)]
enum AdminAction {
    /// Grant the admin role to a registered account
    Promote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
    /// Revoke the admin role
    Demote {
        /// Account email address
        #[arg(short, long)]
        email: String,
    },
}

#[tokio::main]
async fn main() {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();

    let result: Result<(), Box<dyn std::error::Error>> = run(cli).await;

    if let Err(e) = result {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

#[allow(clippy::print_stdout)]
async fn run(cli: Cli) -> Result<(), Box<dyn std::error::Error>> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Jobs { action } => match action {
            JobsAction::List => {
                for name in commands::jobs::names() {
                    println!("{name}");
                }
            }
            JobsAction::Run { job } => {
                let report = commands::jobs::run(&job).await?;
                println!("{report}");
            }
        },
        Commands::Admin { action } => match action {
            AdminAction::Promote { email } => {
                commands::admin::set_role(&email, UserRole::Admin).await?;
            }
            AdminAction::Demote { email } => {
                commands::admin::set_role(&email, UserRole::Customer).await?;
            }
        },
    }
    Ok(())
}
