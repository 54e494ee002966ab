use clap::{Args, Parser, Subcommand};
use pulsewatch::StrategyKind;

/// device liveness monitoring with phased reconnect and status polling
#[derive(Parser)]
#[command(name = "pulsewatch")]
pub struct Cli {
    /// Path to configuration file (supports `~`)
    #[arg(short, long, global = true, env = "PULSEWATCH_CONFIG")]
    pub config: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

/// Settings that override the configuration file
#[derive(Args, Clone, Default)]
pub struct Overrides {
    /// Seconds between liveness checks
    #[arg(long)]
    pub check_interval: Option<u64>,
    /// Phase after which a silent device is declared offline
    #[arg(long)]
    pub deadline_phase: Option<u32>,
    /// Liveness strategy
    #[arg(long, value_enum)]
    pub strategy: Option<StrategyKind>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Show the escalation a silent device goes through
    Plan {
        /// Seconds of silence to simulate
        #[arg(short, long)]
        silence: u64,
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Monitor devices from newline-delimited JSON on stdin
    Watch {
        #[command(flatten)]
        overrides: Overrides,
    },

    /// Configuration management (show, set)
    Config {
        #[command(subcommand)]
        action: ConfigAction,
    },
}

#[derive(Subcommand)]
pub enum ConfigAction {
    /// Show current configuration
    Show,
    /// Persist settings to the configuration file
    Set {
        #[command(flatten)]
        overrides: Overrides,
    },
}
