use miette::Result;

use super::utils::write_output;
use crate::helpers::{all_names, dependency_closure, render_definitions};

/// Run the helpers subcommand: print the requested helpers (all when none are
/// named) with their dependencies resolved
pub fn helpers(requested: &[String], names_only: bool) -> Result<()> {
    let requested: Vec<&str> = if requested.is_empty() {
        all_names()
    } else {
        requested.iter().map(String::as_str).collect()
    };
    let text = if names_only {
        dependency_closure(&requested)?.join("\n")
    } else {
        render_definitions(&requested)?
    };
    write_output(&text, None)?;
    Ok(())
}
