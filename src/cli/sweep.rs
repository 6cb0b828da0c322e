//! Sweep command implementation.

use super::output::{JsonSweepResult, SweepStats, format_sweep_csv, format_sweep_text};
use super::{CliError, SweepFormat, load_config, resolve_seed};
use hivelog::run_sim;
use indicatif::{ProgressBar, ProgressStyle};
use rayon::prelude::*;
use std::path::PathBuf;
use std::time::Instant;

/// Execute the sweep command.
///
/// # Errors
///
/// Returns an error if the config is invalid or output fails.
#[allow(clippy::too_many_arguments, clippy::needless_pass_by_value)]
pub(crate) fn execute(
    runs: u64,
    seed: Option<u64>,
    ticks: Option<u32>,
    config: Option<PathBuf>,
    threads: Option<usize>,
    format: SweepFormat,
    progress: bool,
) -> Result<(), CliError> {
    let config = load_config(config.as_deref(), ticks)?;

    // Set thread pool size if specified
    if let Some(num_threads) = threads {
        rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build_global()
            .ok(); // Ignore error if already initialized
    }

    let base_seed = resolve_seed(seed);

    let pb = progress.then(|| {
        let pb = ProgressBar::new(runs);
        let style = ProgressStyle::default_bar()
            .template("{spinner:.green} [{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} runs ({per_sec})")
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-");
        pb.set_style(style);
        pb
    });

    let start = Instant::now();

    // Each thread folds into its own SweepStats; merged at the end
    let stats = (0..runs)
        .into_par_iter()
        .fold(SweepStats::default, |mut local, i| {
            let run_seed = base_seed.wrapping_add(i);
            match run_sim(run_seed, &config) {
                Ok(result) => local.add_result(&result),
                Err(err) => {
                    tracing::warn!(seed = run_seed, error = %err, "simulation failed");
                    local.add_failure();
                }
            }
            if let Some(pb) = &pb {
                pb.inc(1);
            }
            local
        })
        .reduce(SweepStats::default, |mut a, b| {
            a.merge(&b);
            a
        });

    if let Some(pb) = pb {
        pb.finish_with_message("done");
    }

    let duration = start.elapsed();
    #[allow(clippy::cast_precision_loss)]
    let runs_per_sec = if duration.as_secs_f64() > 0.0 {
        stats.runs as f64 / duration.as_secs_f64()
    } else {
        0.0
    };

    match format {
        SweepFormat::Text => {
            println!();
            print!("{}", format_sweep_text(&stats));
            println!();
            println!("Duration: {:.2}s ({runs_per_sec:.0} runs/sec)", duration.as_secs_f64());
        }
        SweepFormat::Json => {
            let json = serde_json::to_string_pretty(&JsonSweepResult::from_stats(&stats))?;
            println!("{json}");
        }
        SweepFormat::Csv => {
            print!("{}", format_sweep_csv(&stats));
        }
    }

    if stats.failed > 0 {
        return Err(CliError::new(format!("{} of {runs} simulations failed", stats.failed)));
    }
    Ok(())
}
