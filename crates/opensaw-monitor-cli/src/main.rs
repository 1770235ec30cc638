//! CLI for opensaw-monitor: watch a concolic job while it runs.

mod commands;
mod tui;

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use opensaw_monitor_core::{DEFAULT_BASE_URL, MonitorConfig};

#[derive(Parser)]
#[command(name = "opensaw-monitor")]
#[command(about = "opensaw-monitor: live statistics and trace graph for an OpenSAW job")]
#[command(version = opensaw_monitor_core::VERSION)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

/// Which job to watch and how often to ask it.
#[derive(Args)]
struct TargetArgs {
    /// Base URL of the job's API server
    #[arg(long, default_value = DEFAULT_BASE_URL)]
    url: String,

    /// Delay between statistics polls, in milliseconds
    #[arg(long, default_value = "3000")]
    stats_interval_ms: u64,

    /// Delay between trace graph polls, in milliseconds
    #[arg(long, default_value = "2000")]
    graph_interval_ms: u64,
}

impl TargetArgs {
    fn into_config(self) -> MonitorConfig {
        MonitorConfig {
            base_url: self.url,
            statistics_interval: Duration::from_millis(self.stats_interval_ms),
            tracegraph_interval: Duration::from_millis(self.graph_interval_ms),
        }
    }
}

#[derive(Subcommand)]
enum Commands {
    /// Live dashboard (TUI): statistics charts and the trace graph
    Monitor {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Poll both endpoints and log changes until the job completes
    Watch {
        #[command(flatten)]
        target: TargetArgs,
    },

    /// Publish statistics/tracegraph JSON files as a job API (re-read per request)
    Serve {
        /// Port to listen on
        #[arg(long, default_value = "8080")]
        port: u16,

        /// Bind address
        #[arg(long, default_value = "127.0.0.1")]
        host: String,

        /// File served as /api/statistics.json
        #[arg(long)]
        statistics: Option<PathBuf>,

        /// File served as /api/tracegraph.json
        #[arg(long)]
        tracegraph: Option<PathBuf>,
    },
}

/// Log output would corrupt the dashboard's alternate screen, so it is off
/// there unless RUST_LOG asks for it.
fn init_logging(command: &Commands) {
    let default_filter = match command {
        Commands::Monitor { .. } => "off",
        Commands::Watch { .. } | Commands::Serve { .. } => "info",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(default_filter))
        .init();
}

fn main() {
    let cli = Cli::parse();
    init_logging(&cli.command);

    match cli.command {
        Commands::Monitor { target } => commands::monitor::run(target.into_config()),
        Commands::Watch { target } => commands::watch::run(target.into_config()),
        Commands::Serve {
            port,
            host,
            statistics,
            tracegraph,
        } => commands::serve::run(&host, port, statistics, tracegraph),
    }
}
