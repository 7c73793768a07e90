//! Command-line interface module
//!
//! This module contains the implementations for the CLI subcommands.

pub mod analyze;
pub mod helpers;
pub mod transform;

/// Common CLI utilities
pub mod utils {
    use std::path::Path;

    use miette::{NamedSource, Report};

    use crate::error::{Error, Result};

    /// Read a source file as UTF-8 text
    pub fn read_source(path: &Path) -> Result<String> {
        std::fs::read_to_string(path).map_err(|err| Error::Io(format!("{}: {}", path.display(), err)))
    }

    /// Write output to file or stdout
    pub fn write_output(content: &str, output_path: Option<&Path>) -> Result<()> {
        match output_path {
            Some(path) => {
                if let Some(parent) = path.parent().filter(|parent| !parent.as_os_str().is_empty()) {
                    std::fs::create_dir_all(parent)?;
                }
                std::fs::write(path, content).map_err(|err| Error::Io(format!("{}: {}", path.display(), err)))
            }
            None => {
                print!("{}", content);
                if !content.ends_with('\n') {
                    println!();
                }
                Ok(())
            }
        }
    }

    /// Attach the source text so labeled spans render with context
    pub fn report(error: Error, path: &Path, source: &str) -> Report {
        Report::new(error).with_source_code(NamedSource::new(path.display().to_string(), source.to_string()))
    }
}
