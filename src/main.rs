//! Hivelog CLI - run, sweep and watch shared-log simulations.

// Allow print in the CLI binary
#![allow(clippy::print_stdout, clippy::print_stderr)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

mod cli;

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

/// Hivelog - a bounded broadcast log over one shared array
#[derive(Parser, Debug)]
#[command(name = "hivelog")]
#[command(author, version, about, long_about = None)]
struct Args {
    #[command(subcommand)]
    command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug)]
enum Commands {
    /// Run a single simulation
    Run {
        /// Random seed (default: random)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Ticks to simulate (default: from config)
        #[arg(short, long)]
        ticks: Option<u32>,

        /// JSON simulation config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,

        /// Suppress the preamble
        #[arg(short, long)]
        quiet: bool,
    },

    /// Run many seeds in parallel and aggregate statistics
    Sweep {
        /// Number of simulations (default: 100)
        #[arg(short = 'n', long, default_value = "100")]
        runs: u64,

        /// Starting seed (increments for each run)
        #[arg(short, long)]
        seed: Option<u64>,

        /// Ticks per simulation (default: from config)
        #[arg(short, long)]
        ticks: Option<u32>,

        /// JSON simulation config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Parallel threads (default: CPU count)
        #[arg(short = 'j', long)]
        threads: Option<usize>,

        /// Output format: text, json, or csv
        #[arg(short, long, default_value = "text")]
        format: cli::SweepFormat,

        /// Show progress bar
        #[arg(short, long)]
        progress: bool,
    },

    /// Interactive TUI stepping a simulation
    Watch {
        /// Random seed
        #[arg(short, long)]
        seed: Option<u64>,

        /// Ticks to simulate (default: from config)
        #[arg(short, long)]
        ticks: Option<u32>,

        /// JSON simulation config
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Tick delay in milliseconds (default: 300)
        #[arg(long, default_value = "300")]
        speed: u64,
    },

    /// Print and validate the shared array layout
    Layout {
        /// JSON simulation config (default: built-in)
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Show the reference million-cell layout instead
        #[arg(long)]
        reference: bool,

        /// Output format: text or json
        #[arg(short, long, default_value = "text")]
        format: cli::OutputFormat,
    },
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let args = Args::parse();

    let result = match args.command {
        Commands::Run {
            seed,
            ticks,
            config,
            format,
            quiet,
        } => cli::run::execute(seed, ticks, config, format, quiet),

        Commands::Sweep {
            runs,
            seed,
            ticks,
            config,
            threads,
            format,
            progress,
        } => cli::sweep::execute(runs, seed, ticks, config, threads, format, progress),

        Commands::Watch {
            seed,
            ticks,
            config,
            speed,
        } => cli::watch::execute(seed, ticks, config, speed),

        Commands::Layout {
            config,
            reference,
            format,
        } => cli::layout::execute(config, reference, format),
    };

    match result {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {e}");
            ExitCode::FAILURE
        }
    }
}
