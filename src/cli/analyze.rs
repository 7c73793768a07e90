use std::fmt::Write as _;
use std::path::Path;
use std::str::FromStr;

use miette::{IntoDiagnostic, Result};
use serde::Serialize;

use super::utils::{read_source, report, write_output};
use crate::ast::FunctionReport;
use crate::options::TransformOptions;
use crate::transformer::Transformer;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AnalyzeFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for AnalyzeFormat {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s {
            "text" => Ok(AnalyzeFormat::Text),
            "json" => Ok(AnalyzeFormat::Json),
            other => Err(format!("unknown format '{}', expected text or json", other)),
        }
    }
}

#[derive(Serialize)]
struct Analysis<'r> {
    file: String,
    helpers: &'r [&'static str],
    functions: &'r [FunctionReport],
}

/// Run the analyze subcommand
pub fn analyze(input: &Path, format: AnalyzeFormat, options: &TransformOptions) -> Result<()> {
    let source = read_source(input)?;
    let output = Transformer::new(options.clone())
        .transform(&source)
        .map_err(|error| report(error, input, &source))?;

    let rendered = match format {
        AnalyzeFormat::Json => serde_json::to_string_pretty(&Analysis {
            file: input.display().to_string(),
            helpers: &output.helpers,
            functions: &output.functions,
        })
        .into_diagnostic()?,
        AnalyzeFormat::Text => render_text(input, &output.functions, &output.helpers),
    };
    write_output(&rendered, None)?;
    Ok(())
}

fn render_text(input: &Path, functions: &[FunctionReport], helpers: &[&'static str]) -> String {
    let mut text = String::new();
    let _ = writeln!(text, "{}: {} async functions", input.display(), functions.len());
    for function in functions {
        let _ = writeln!(
            text,
            "  {} ({}) at {}:{}: {} suspension points, {}",
            function.name,
            function.form,
            function.line,
            function.column,
            function.suspensions,
            if function.always_returns {
                "always returns"
            } else {
                "may complete without returning"
            }
        );
        if !function.helpers.is_empty() {
            let _ = writeln!(text, "    helpers: {}", function.helpers.join(", "));
        }
    }
    if !helpers.is_empty() {
        let _ = writeln!(text, "helpers used: {}", helpers.join(", "));
    }
    text
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_format_parsing() {
        assert_eq!("json".parse::<AnalyzeFormat>().unwrap(), AnalyzeFormat::Json);
        assert!("yaml".parse::<AnalyzeFormat>().is_err());
    }

    #[test]
    fn test_text_report_lists_functions() {
        let output = Transformer::default()
            .transform("async function load() { return await fetch(url); }")
            .unwrap();
        let text = render_text(Path::new("load.js"), &output.functions, &output.helpers);
        assert!(text.contains("load.js: 1 async functions"), "{}", text);
        assert!(text.contains("load (declaration) at 1:1: 1 suspension points"), "{}", text);
    }
}
