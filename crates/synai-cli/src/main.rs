mod client;
mod commands;

use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use client::RelayClient;
use commands::{boss, report, worker};

#[derive(Parser)]
#[command(name = "synai", about = "Demo buyer and worker agents for the SYNAI relay")]
struct Cli {
    /// Relay base URL
    #[arg(long, env = "SYNAI_RELAY_URL", default_value = "http://127.0.0.1:5005", global = true)]
    base_url: String,

    /// Seconds between polls while waiting for jobs
    #[arg(long, default_value_t = 5, global = true)]
    poll_interval_secs: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Post and fund the demo summarization job
    Post {
        #[arg(long, default_value = boss::DEFAULT_BUYER_ID)]
        buyer_id: String,
    },
    /// Claim the first funded job and submit a result
    Work {
        #[arg(long, default_value = worker::DEFAULT_AGENT_ID)]
        agent_id: String,
    },
    /// Confirm submitted jobs once, releasing payment
    Confirm {
        #[arg(long, default_value = boss::DEFAULT_BUYER_ID)]
        buyer_id: String,
    },
    /// Show the agent and owner leaderboards
    Ranking,
    /// Show an agent's balance
    Balance {
        /// Agent ID
        agent_id: String,
    },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_target(false)
        .init();

    let cli = Cli::parse();
    let client = RelayClient::new(&cli.base_url)?;
    let poll_interval = Duration::from_secs(cli.poll_interval_secs);

    match cli.command {
        Commands::Post { buyer_id } => boss::post(&client, &buyer_id).await,
        Commands::Work { agent_id } => worker::work(&client, &agent_id, poll_interval).await,
        Commands::Confirm { buyer_id } => boss::confirm(&client, &buyer_id, poll_interval).await,
        Commands::Ranking => report::ranking(&client).await,
        Commands::Balance { agent_id } => report::balance(&client, &agent_id).await,
    }
}
