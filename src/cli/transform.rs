use std::path::{Path, PathBuf};

use indicatif::{ProgressBar, ProgressStyle};
use log::{info, warn};
use miette::{miette, Report, Result};
use rayon::prelude::*;

use super::utils::{read_source, report, write_output};
use crate::error::Error;
use crate::options::{Target, TransformOptions};
use crate::transformer::Transformer;

/// Arguments for the transform command
#[derive(Debug, Clone, Default)]
pub struct TransformArgs {
    pub inputs: Vec<PathBuf>,
    pub output: Option<PathBuf>,
    pub out_dir: Option<PathBuf>,
    pub config: Option<PathBuf>,
    pub external_helpers: bool,
    pub hoist: bool,
    pub inline_helpers: bool,
    pub minify: bool,
    pub target: Option<Target>,
    pub helper_module: Option<String>,
}

impl TransformArgs {
    /// Options from the config file, with command-line flags layered on top
    pub fn to_options(&self) -> crate::error::Result<TransformOptions> {
        let mut options = match &self.config {
            Some(path) => TransformOptions::from_file(path)?,
            None => TransformOptions::default(),
        };
        options.external_helpers |= self.external_helpers;
        options.hoist |= self.hoist;
        options.inline_helpers |= self.inline_helpers;
        options.minify |= self.minify;
        if let Some(target) = self.target {
            options.target = target;
        }
        if let Some(module) = &self.helper_module {
            options.helper_module = module.clone();
        }
        Ok(options)
    }
}

/// Run the transform subcommand
pub fn transform(args: &TransformArgs) -> Result<()> {
    if args.inputs.is_empty() {
        return Err(miette!("no input files given"));
    }
    if args.output.is_some() && args.inputs.len() > 1 {
        return Err(Report::new(Error::Config {
            message: "--output takes a single input; use --out-dir for several".to_string(),
        }));
    }
    let options = args.to_options()?;
    let transformer = Transformer::new(options);

    if args.inputs.len() == 1 && args.out_dir.is_none() {
        let input = &args.inputs[0];
        let code = transform_file(&transformer, input)?;
        write_output(&code, args.output.as_deref())?;
        return Ok(());
    }

    let out_dir = args.out_dir.as_deref();
    let bar = ProgressBar::new(args.inputs.len() as u64);
    bar.set_style(
        ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_bar()),
    );

    let results: Vec<(PathBuf, Result<String>)> = args
        .inputs
        .par_iter()
        .map(|input| {
            let result = transform_file(&transformer, input);
            bar.inc(1);
            (input.clone(), result)
        })
        .collect();
    bar.finish_and_clear();

    let mut failures = Vec::new();
    for (input, result) in results {
        match result {
            Ok(code) => {
                let destination = out_dir.map(|dir| output_path(dir, &input));
                write_output(&code, destination.as_deref())?;
            }
            Err(report) => {
                warn!("{} failed", input.display());
                failures.push(report);
            }
        }
    }
    info!(
        "transformed {} of {} files",
        args.inputs.len() - failures.len(),
        args.inputs.len()
    );

    let failed = failures.len();
    let mut failures = failures.into_iter();
    match failures.next() {
        None => Ok(()),
        Some(first) => {
            for report in failures {
                eprintln!("{:?}", report);
            }
            if failed > 1 {
                eprintln!("{} files failed", failed);
            }
            Err(first)
        }
    }
}

fn transform_file(transformer: &Transformer, input: &Path) -> Result<String> {
    let source = read_source(input)?;
    transformer
        .transform(&source)
        .map(|output| output.code)
        .map_err(|error| report(error, input, &source))
}

fn output_path(out_dir: &Path, input: &Path) -> PathBuf {
    match input.file_name() {
        Some(name) => out_dir.join(name),
        None => out_dir.join("out.js"),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn test_flags_override_config_file() {
        let mut config = tempfile::NamedTempFile::new().unwrap();
        write!(config, r#"{{"hoist": true, "target": "es6"}}"#).unwrap();
        let args = TransformArgs {
            config: Some(config.path().to_path_buf()),
            minify: true,
            target: Some(Target::Es5),
            ..TransformArgs::default()
        };
        let options = args.to_options().unwrap();
        assert!(options.hoist);
        assert!(options.minify);
        assert_eq!(options.target, Target::Es5);
    }

    #[test]
    fn test_output_path_keeps_file_name() {
        let path = output_path(Path::new("out"), Path::new("src/app/main.js"));
        assert_eq!(path, PathBuf::from("out/main.js"));
    }
}
