mod commands;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Parser)]
#[command(name = "raffle-sim")]
#[command(about = "Operator harness for the self-operating lottery")]
#[command(version)]
struct Cli {
    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run rounds against the local mock coordinator on a simulated clock
    Simulate {
        /// Network preset (localhost, ganache)
        #[arg(short, long, default_value = "localhost")]
        network: String,
        /// Entrants per round
        #[arg(short, long, default_value_t = 3)]
        players: usize,
        /// Rounds to settle
        #[arg(short, long, default_value_t = 1)]
        rounds: usize,
        /// Reject the first payout to exercise the retry path
        #[arg(long)]
        fail_first_payout: bool,
        /// Write the final round snapshot here
        #[arg(long)]
        snapshot: Option<PathBuf>,
    },
    /// Show the preset configuration for a network
    Config {
        /// Network preset (localhost, ganache, sepolia)
        #[arg(short, long, default_value = "localhost")]
        network: String,
        /// Print as JSON
        #[arg(long)]
        json: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "raffle_sim={},raffle_core={}",
            log_level, log_level
        )))
        .with(tracing_subscriber::fmt::layer())
        .init();

    let result = match cli.command {
        Commands::Simulate {
            network,
            players,
            rounds,
            fail_first_payout,
            snapshot,
        } => {
            commands::simulate(&network, players, rounds, fail_first_payout, snapshot.as_deref())
                .await
        }
        Commands::Config { network, json } => commands::show_config(&network, json),
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }

    Ok(())
}
