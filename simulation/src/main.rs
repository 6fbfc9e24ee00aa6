//! Wirepair - single-wire pairing simulation
//!
//! Runs pre-built scenarios of controllers negotiating initiator/responder
//! roles over shared duration-coded signal lines.

use std::time::Duration;

use clap::{Parser, Subcommand};

use wirepair_core::SignalTiming;
use wirepair_logging::{LogConfig, WirepairSubscriberBuilder};
use wirepair_simulation::scenarios::{
    self, ScenarioOptions,
};

#[derive(Parser)]
#[command(
    name = "wirepair",
    about = "Contention-based pairing over shared duration-coded signal lines",
    version
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use full-speed protocol timings instead of the accelerated preset
    #[arg(long, global = true)]
    real_time: bool,

    /// Upper bound on scenario runtime in seconds
    #[arg(long, global = true, default_value = "60")]
    max_seconds: u64,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Two controllers pairing over shared reliable lines
    Pairing {
        /// Number of shared lines
        #[arg(short, long, default_value = "3")]
        lines: usize,
    },

    /// Two controllers over a line that drops reads
    Unreliable {
        /// Probability that a read of a driven line returns low
        #[arg(short, long, default_value = "1.0")]
        failure_rate: f64,
    },

    /// One controller probing a line only an absent peer could drive
    OneWay,

    /// One controller against a latched interference source
    Disturbed,

    /// Two controllers forced into the same contention slot
    Collision,

    /// Two controllers on separate lines joined by a bridge
    Bridged,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let log_config = if cli.verbose {
        LogConfig::development()
    } else {
        LogConfig {
            default_level: "info".to_string(),
            console: wirepair_logging::ConsoleConfig {
                pretty: true,
                ansi: true,
            },
        }
    };
    WirepairSubscriberBuilder::new()
        .with_config(log_config)
        .init();

    let opts = ScenarioOptions {
        timing: if cli.real_time {
            SignalTiming::default()
        } else {
            SignalTiming::accelerated()
        },
        max_duration: Duration::from_secs(cli.max_seconds),
    };

    let outcome = match cli.command {
        Commands::Pairing { lines } => scenarios::run_pairing(lines, &opts).await?,
        Commands::Unreliable { failure_rate } => {
            scenarios::run_unreliable(failure_rate, &opts).await?
        }
        Commands::OneWay => scenarios::run_one_way(&opts).await?,
        Commands::Disturbed => scenarios::run_disturbed(&opts).await?,
        Commands::Collision => scenarios::run_collision(&opts).await?,
        Commands::Bridged => scenarios::run_bridged(&opts).await?,
    };

    println!("{}", outcome.summary());
    Ok(())
}
