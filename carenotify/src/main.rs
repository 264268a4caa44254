// carenotify - reminders, notification feed and emergency alerts
// Entry point: runs either the notification server or a reminder agent

use anyhow::Context;
use carenotify::app;
use carenotify::config::Settings;
use clap::{Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "carenotify", version, about)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run the notification server
    Serve,
    /// Run the reminder agent for one user
    Agent {
        /// User whose schedules and medicines are checked
        #[arg(long)]
        user: i64,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // A missing .env file is fine
    let _ = dotenvy::dotenv();

    // Initialize logging
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "carenotify=debug,info".into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let cli = Cli::parse();
    let settings = Settings::from_env().context("invalid configuration")?;

    match cli.command {
        Command::Serve => {
            tracing::info!("Starting carenotify server");
            app::serve(settings).await?;
        }
        Command::Agent { user } => {
            tracing::info!("Starting carenotify agent");
            app::run_agent(settings, user).await?;
        }
    }

    Ok(())
}
