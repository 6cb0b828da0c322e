//! Run command implementation.

use super::output::format_text;
use super::{CliError, OutputFormat, load_config, resolve_seed};
use hivelog::run_sim;
use std::path::PathBuf;

/// Execute the run command.
///
/// # Errors
///
/// Returns an error if the config is invalid or the simulation fails.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn execute(
    seed: Option<u64>,
    ticks: Option<u32>,
    config: Option<PathBuf>,
    format: OutputFormat,
    quiet: bool,
) -> Result<(), CliError> {
    let config = load_config(config.as_deref(), ticks)?;
    let seed = resolve_seed(seed);

    if !quiet && format == OutputFormat::Text {
        println!("Running simulation with seed {seed}...");
        println!(
            "Grid {}x{}, {} ticks, maintenance {:?}",
            config.width, config.height, config.ticks, config.maintenance_order
        );
        println!();
    }

    let result = run_sim(seed, &config)?;

    match format {
        OutputFormat::Text => {
            print!("{}", format_text(&result));
        }
        OutputFormat::Json => {
            let json = serde_json::to_string_pretty(&result)?;
            println!("{json}");
        }
    }

    Ok(())
}
