//! pkgdoc - Generate a static HTML documentation site from per-package extractor output
//!
//! For every package in an ordered registry, runs an external documentation
//! extractor, wraps its HTML fragment in a shared page template, rewrites
//! build-time links into repository URLs, and writes an index page listing
//! every package.

pub mod cli;
pub mod config;
pub mod error;
pub mod output;
pub mod registry;
pub mod runner;

// Re-export main types
pub use config::Config;
pub use error::{Error, Result};
pub use output::{FixReport, GenerationReport, LinkFixer, SiteGenerator, TemplateEngine};
pub use registry::{ModuleRecord, SubdirRules};
pub use runner::{CommandOutput, ProcessRunner, SystemRunner};
