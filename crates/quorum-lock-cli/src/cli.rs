// Command line arguments

use std::path::PathBuf;

use clap::{Args, Parser, Subcommand};

#[derive(Debug, Parser)]
#[command(name = "quorum-lock", version, about = "Quorum-based distributed lock driver")]
pub struct Cli {
    /// Lock settings file (TOML, YAML or JSON), overlaid by QUORUM_LOCK_* variables
    #[arg(short = 'c', long = "config", global = true)]
    pub config: Option<PathBuf>,

    /// Log filter used when RUST_LOG is not set
    #[arg(long = "log-level", default_value = "info", global = true)]
    pub log_level: String,

    #[command(subcommand)]
    pub command: Command,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run contending lock holders against in-memory replicas
    Simulate(SimulateArgs),

    /// Acquire a lock on Redis nodes, keep it extended, then release it
    #[cfg(feature = "redis")]
    Hold(HoldArgs),
}

#[derive(Debug, Clone, Args)]
pub struct SimulateArgs {
    /// Number of in-memory replicas
    #[arg(short = 'n', long, default_value_t = 5)]
    pub replicas: usize,

    /// Number of concurrent lock holders
    #[arg(short = 'm', long, default_value_t = 8)]
    pub contenders: usize,

    /// Critical sections entered by each holder
    #[arg(short = 'r', long, default_value_t = 10)]
    pub rounds: u64,

    /// Replicas taken offline before the run
    #[arg(short = 'k', long, default_value_t = 0)]
    pub offline: usize,

    /// Lock identifier shared by all holders
    #[arg(long, default_value = "simulation")]
    pub id: String,

    /// Upper bound of the random wait between attempts, in milliseconds
    #[arg(long = "max-delay-ms", default_value_t = 20)]
    pub max_delay_ms: u64,
}

#[cfg(feature = "redis")]
#[derive(Debug, Clone, Args)]
pub struct HoldArgs {
    /// Redis endpoints, one per replica (e.g. redis://127.0.0.1:6379/)
    #[arg(short = 'e', long = "endpoint", required = true, num_args = 1..)]
    pub endpoints: Vec<String>,

    /// Lock identifier
    #[arg(long)]
    pub id: String,

    /// How long to hold the lock, in milliseconds
    #[arg(long = "hold-ms", default_value_t = 30_000)]
    pub hold_ms: u64,
}
