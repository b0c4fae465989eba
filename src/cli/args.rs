//! CLI argument parsing

use clap::{ArgAction, Parser, Subcommand};
use std::path::PathBuf;

/// Generate a static HTML documentation site from per-package extractor output
#[derive(Parser, Debug)]
#[command(name = "pkgdoc")]
#[command(about = "Generate a static HTML documentation site from per-package extractor output")]
#[command(version)]
pub struct Args {
    /// Verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = ArgAction::Count, global = true)]
    pub verbose: u8,

    /// Config file path
    #[arg(short, long, default_value = "pkgdoc.toml", global = true)]
    pub config: PathBuf,

    #[command(subcommand)]
    pub command: Command,
}

impl Args {
    pub fn parse_args() -> Self {
        Parser::parse()
    }
}

#[derive(Subcommand, Debug)]
pub enum Command {
    /// Generate every package page and the index page
    Generate {
        /// Output directory
        #[arg(short, long)]
        output: Option<PathBuf>,

        /// Extractor program to run instead of the configured one
        #[arg(long)]
        extractor: Option<String>,

        /// Per-package extractor timeout in seconds (0 disables it)
        #[arg(long)]
        timeout: Option<u64>,

        /// License file embedded in every footer
        #[arg(long)]
        license: Option<PathBuf>,

        /// Show a progress bar
        #[arg(long)]
        progress: bool,
    },

    /// List the registered packages in order
    List {
        /// Print JSON instead of text
        #[arg(long)]
        json: bool,
    },

    /// Rewrite links of an already generated page
    FixLinks {
        /// Page to rewrite
        file: PathBuf,

        /// Package the page documents
        package: String,
    },

    /// Write the default configuration
    Init {
        /// Destination (defaults to the --config path)
        path: Option<PathBuf>,

        /// Overwrite an existing file
        #[arg(long)]
        force: bool,
    },

    /// Show version information
    Version,
}
