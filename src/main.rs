use clap::{Parser, Subcommand};
use miette::Result;
use std::path::PathBuf;

use async_to_promises::cli;
use async_to_promises::cli::analyze::AnalyzeFormat;
use async_to_promises::cli::transform::TransformArgs;
use async_to_promises::{Target, TransformOptions};

#[derive(Parser)]
#[command(name = "async-to-promises")]
#[command(about = "Lowers JavaScript async functions into promise-chaining code")]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Transform JavaScript modules
    Transform {
        /// Input files
        #[arg(required = true)]
        inputs: Vec<PathBuf>,

        /// Output file (defaults to stdout, single input only)
        #[arg(short, long, conflicts_with = "out_dir")]
        output: Option<PathBuf>,

        /// Directory to write transformed files into
        #[arg(long)]
        out_dir: Option<PathBuf>,

        /// JSON options file (camelCase keys); flags override it
        #[arg(short, long)]
        config: Option<PathBuf>,

        /// Import helpers instead of inlining their definitions
        #[arg(long)]
        external_helpers: bool,

        /// Module external helpers are imported from
        #[arg(long)]
        helper_module: Option<String>,

        /// Hoist self-contained continuations to the top level
        #[arg(long)]
        hoist: bool,

        /// Expand simple helpers into native Promise calls
        #[arg(long)]
        inline_helpers: bool,

        /// Minify output
        #[arg(long)]
        minify: bool,

        /// Language level of synthesized continuations (es5, es6)
        #[arg(long)]
        target: Option<Target>,
    },

    /// Report what the transform does to each async function
    Analyze {
        /// Input file
        input: PathBuf,

        /// Output format (text, json)
        #[arg(short, long, default_value = "text")]
        format: AnalyzeFormat,

        /// Language level of synthesized continuations (es5, es6)
        #[arg(long)]
        target: Option<Target>,
    },

    /// Print runtime helper definitions
    Helpers {
        /// Helpers to print (all when omitted)
        names: Vec<String>,

        /// Print names with dependencies resolved instead of definitions
        #[arg(long = "names")]
        names_only: bool,
    },
}

fn main() -> Result<()> {
    // Initialize logging
    env_logger::init();

    let cli = Cli::parse();

    match cli.command {
        Commands::Transform {
            inputs,
            output,
            out_dir,
            config,
            external_helpers,
            helper_module,
            hoist,
            inline_helpers,
            minify,
            target,
        } => {
            let args = TransformArgs {
                inputs,
                output,
                out_dir,
                config,
                external_helpers,
                hoist,
                inline_helpers,
                minify,
                target,
                helper_module,
            };
            cli::transform::transform(&args)
        }
        Commands::Analyze { input, format, target } => {
            let mut options = TransformOptions::default();
            if let Some(target) = target {
                options.target = target;
            }
            cli::analyze::analyze(&input, format, &options)
        }
        Commands::Helpers { names, names_only } => cli::helpers::helpers(&names, names_only),
    }
}
