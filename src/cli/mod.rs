//! CLI module for pkgdoc

mod args;

pub use args::{Args, Command};

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::{LinkFixer, SiteGenerator};
use crate::registry;
use crate::runner::SystemRunner;
use serde::Serialize;
use std::path::Path;
use std::process::ExitCode;

/// Run the CLI application
pub fn run() -> ExitCode {
    let args = Args::parse_args();
    setup_logging(args.verbose);

    match execute(args) {
        Ok(_) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("Error: {}", e);
            ExitCode::FAILURE
        }
    }
}

fn setup_logging(verbosity: u8) {
    use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

    let level = match verbosity {
        0 => tracing::Level::WARN,
        1 => tracing::Level::INFO,
        2 => tracing::Level::DEBUG,
        _ => tracing::Level::TRACE,
    };

    let filter = tracing_subscriber::EnvFilter::from_default_env().add_directive(level.into());

    let fmt_layer = tracing_subscriber::fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .with_line_number(false);

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .init();
}

fn execute(args: Args) -> Result<()> {
    match args.command {
        Command::Generate {
            output,
            extractor,
            timeout,
            license,
            progress,
        } => {
            let mut cfg = Config::load_or_default(&args.config)?;

            // Merge CLI arguments (CLI takes precedence)
            cfg.merge_cli(output, extractor, timeout, license);
            cfg.validate()?;

            tracing::info!("Output: {}", cfg.output.directory.display());
            tracing::info!("Extractor: {} {:?}", cfg.extractor.program, cfg.extractor.args);
            tracing::info!("Packages: {}", cfg.packages.len());

            let runner = SystemRunner::new()
                .with_timeout(cfg.extractor.timeout())
                .with_echo(args.verbose >= 3);

            let generator = SiteGenerator::new(cfg, runner)?.with_progress(progress && args.verbose == 0);
            let report = generator.generate()?;

            println!("{}", report.summary());
            println!(
                "Documentation written to: {}",
                generator.output_dir().display()
            );
            Ok(())
        }

        Command::List { json } => {
            let cfg = Config::load_or_default(&args.config)?;
            print!("{}", render_listing(&cfg, json)?);
            Ok(())
        }

        Command::FixLinks { file, package } => {
            let cfg = Config::load_or_default(&args.config)?;
            if cfg.find_package(&package).is_none() {
                return Err(Error::UnknownPackage(package));
            }
            if !file.exists() {
                return Err(Error::PathNotFound(file));
            }

            let subdirs = cfg.subdirs.for_package(&package);
            let report = LinkFixer::new(&cfg).fix_file(&file, &package, &subdirs)?;

            if report.changed() {
                println!("Rewrote {} links in {}", report.total(), file.display());
            } else {
                println!("No links to rewrite in {}", file.display());
            }
            Ok(())
        }

        Command::Init { path, force } => {
            let path = path.unwrap_or(args.config);
            write_default_config(&path, force)?;
            println!("Wrote {}", path.display());
            Ok(())
        }

        Command::Version => {
            println!("pkgdoc {}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}

/// One registry line as printed by `list --json`
#[derive(Debug, Serialize)]
struct ListEntry<'a> {
    id: &'a str,
    description: &'a str,
    page: String,
    subdirs: Vec<&'a str>,
}

fn render_listing(cfg: &Config, json: bool) -> Result<String> {
    let entries: Vec<ListEntry> = cfg
        .packages
        .iter()
        .map(|p| ListEntry {
            id: &p.id,
            description: &p.description,
            page: registry::page_file_name(&cfg.output.page_prefix, &p.id, cfg.output.separator),
            subdirs: cfg.subdirs.for_package(&p.id),
        })
        .collect();

    if json {
        let mut out = serde_json::to_string_pretty(&entries)?;
        out.push('\n');
        return Ok(out);
    }

    let mut out = String::new();
    for entry in &entries {
        out.push_str(&format!(
            "{}: {} ({})\n",
            entry.id, entry.description, entry.page
        ));
    }
    Ok(out)
}

fn write_default_config(path: &Path, force: bool) -> Result<()> {
    if path.exists() && !force {
        return Err(Error::other(format!(
            "{} already exists (use --force to overwrite)",
            path.display()
        )));
    }

    if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    std::fs::write(path, Config::default().to_toml()?)?;
    Ok(())
}
