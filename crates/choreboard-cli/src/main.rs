use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod commands;

#[derive(Parser)]
#[command(name = "choreboard-cli", version, about = "Choreboard CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Kid management
    Kid {
        #[command(subcommand)]
        action: commands::kid::KidAction,
    },
    /// Chore management and the claim/approve workflow
    Chore {
        #[command(subcommand)]
        action: commands::chore::ChoreAction,
    },
    /// Rewards, bonuses and penalties
    Reward {
        #[command(subcommand)]
        action: commands::reward::RewardAction,
    },
    /// Badges, achievements and challenges
    Badge {
        #[command(subcommand)]
        action: commands::badge::BadgeAction,
    },
    /// Point and chore statistics
    Stats {
        #[command(subcommand)]
        action: commands::stats::StatsAction,
    },
    /// Configuration management
    Config {
        #[command(subcommand)]
        action: commands::config::ConfigAction,
    },
    /// Run one sweep and evaluation pass, then exit
    Tick {
        /// Evaluate every dirty kid now instead of waiting for the debounce
        #[arg(long)]
        evaluate: bool,
    },
    /// Keep running the background ticker and print events as they happen
    Serve,
}

fn main() {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")),
        )
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let result = match cli.command {
        Commands::Kid { action } => commands::kid::run(action),
        Commands::Chore { action } => commands::chore::run(action),
        Commands::Reward { action } => commands::reward::run(action),
        Commands::Badge { action } => commands::badge::run(action),
        Commands::Stats { action } => commands::stats::run(action),
        Commands::Config { action } => commands::config::run(action),
        Commands::Tick { evaluate } => commands::serve::tick(evaluate),
        Commands::Serve => commands::serve::serve(),
    };

    if let Err(e) = result {
        eprintln!("error: {e}");
        std::process::exit(1);
    }
}
