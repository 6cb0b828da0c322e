//! Layout command implementation.

use super::output::format_layout;
use super::{CliError, OutputFormat, load_config};
use hivelog::Layout;
use std::path::PathBuf;

/// Execute the layout command.
///
/// # Errors
///
/// Returns an error if the config cannot be loaded or the layout is invalid.
#[allow(clippy::needless_pass_by_value)]
pub(crate) fn execute(
    config: Option<PathBuf>,
    reference: bool,
    format: OutputFormat,
) -> Result<(), CliError> {
    let layout = if reference {
        Layout::reference()
    } else {
        load_config(config.as_deref(), None)?.layout
    };
    layout.validate()?;

    match format {
        OutputFormat::Text => print!("{}", format_layout(&layout)),
        OutputFormat::Json => println!("{}", serde_json::to_string_pretty(&layout)?),
    }

    Ok(())
}
