//! Flowscope CLI — Command-line interface for the flow pipeline.
//!
//! Usage:
//!   flowscope run [OPTIONS]              Run the live pipeline on a frame source
//!   flowscope flow <REFERENCE> <CURRENT> Compare two images once
//!   flowscope check                      Check kernel and config status

use std::path::PathBuf;

use clap::{Parser, Subcommand};

mod commands;

#[derive(Parser)]
#[command(
    name = "flowscope",
    about = "Real-time optical-flow visualization against a frozen reference frame",
    version,
    author
)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the pipeline over a synthetic or on-disk frame source
    Run {
        /// Directory of PNG frames to feed in sorted order
        /// (synthetic drifting pattern when omitted)
        #[arg(long)]
        frames: Option<PathBuf>,

        /// Number of synthetic frames to generate
        #[arg(long, default_value = "90")]
        count: u64,

        /// Raw buffer width for synthetic frames
        #[arg(long, default_value = "480")]
        width: u32,

        /// Raw buffer height for synthetic frames
        #[arg(long, default_value = "640")]
        height: u32,

        /// Source pacing in frames per second (0 = unpaced)
        #[arg(long, default_value = "30")]
        fps: u32,

        /// Freeze the reference after this many delivered frames
        #[arg(long)]
        monitor_after: Option<u64>,

        /// Directory to write published overlays into
        #[arg(short, long, default_value = "flow-out")]
        output: PathBuf,

        /// Kernel descriptor path (config default when omitted)
        #[arg(long)]
        kernel: Option<PathBuf>,
    },

    /// Estimate and visualize flow between two images once
    Flow {
        /// The baseline image
        reference: PathBuf,

        /// The image to compare against the baseline
        current: PathBuf,

        /// Output overlay path
        #[arg(short, long, default_value = "flow.png")]
        output: PathBuf,

        /// Kernel descriptor path (config default when omitted)
        #[arg(long)]
        kernel: Option<PathBuf>,
    },

    /// Check kernel asset and configuration status
    Check,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    flowscope_common::logging::init_logging(&flowscope_common::config::LoggingConfig {
        level: log_level.to_string(),
        json: false,
        ansi: true,
    });

    match cli.command {
        Commands::Run {
            frames,
            count,
            width,
            height,
            fps,
            monitor_after,
            output,
            kernel,
        } => {
            commands::run::run(
                frames,
                count,
                width,
                height,
                fps,
                monitor_after,
                output,
                kernel,
            )
            .await
        }
        Commands::Flow {
            reference,
            current,
            output,
            kernel,
        } => commands::flow::run(reference, current, output, kernel),
        Commands::Check => commands::check::run(),
    }
}
