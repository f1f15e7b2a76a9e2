//! Jam pantry binary.
//!
//! # Usage
//!
//! ```bash
//! # Count rooms and identities in Redis
//! jam-pantry --redis-url redis://localhost:6379 stats
//!
//! # Read a room
//! jam-pantry get rooms/lobby
//!
//! # Seed a room in the in-process store (useful for smoke tests)
//! jam-pantry --local set rooms/lobby '{"moderators":[],"speakers":[]}'
//! ```

use std::io;

use clap::{Parser, Subcommand};
use jam_pantry::{Command, execute};
use jam_store::{DEFAULT_REDIS_URL, StoreConfig};
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt};

/// Jam backing store tool
#[derive(Parser, Debug)]
#[command(name = "jam-pantry")]
#[command(about = "Inspect and seed the Jam backing store")]
#[command(version)]
struct Args {
    /// Use the in-process store instead of Redis
    #[arg(long)]
    local: bool,

    /// Redis connection URL
    #[arg(long, default_value = DEFAULT_REDIS_URL)]
    redis_url: String,

    /// Log level (trace, debug, info, warn, error)
    #[arg(long, default_value = "info")]
    log_level: String,

    #[command(subcommand)]
    command: Action,
}

#[derive(Subcommand, Debug)]
enum Action {
    /// Count rooms and identities
    Stats,
    /// Print the value stored under KEY
    Get {
        /// Key, e.g. rooms/lobby
        key: String,
    },
    /// Store a JSON value under KEY
    Set {
        /// Key, e.g. rooms/lobby
        key: String,
        /// JSON value
        value: String,
    },
}

impl From<Action> for Command {
    fn from(action: Action) -> Self {
        match action {
            Action::Stats => Self::Stats,
            Action::Get { key } => Self::Get { key },
            Action::Set { key, value } => Self::Set { key, value },
        }
    }
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&args.log_level));

    tracing_subscriber::registry().with(fmt::layer().with_writer(io::stderr)).with(filter).init();

    let config = StoreConfig { local: args.local, redis_url: args.redis_url };
    if config.local {
        tracing::warn!("Using the in-process store - nothing is persisted");
    }
    let store = config.open().await?;

    execute(store.as_ref(), args.command.into(), &mut io::stdout().lock()).await?;

    Ok(())
}
