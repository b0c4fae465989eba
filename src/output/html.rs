// HTML site generator
//
// Drives the whole pipeline: one page per registered package (header,
// extractor output, footer, then link fixing) and the index page listing
// every package in registry order. Packages are processed strictly one
// after another.

use crate::config::Config;
use crate::error::{Error, Result};
use crate::output::links::{FixReport, LinkFixer};
use crate::output::templates::TemplateEngine;
use crate::registry::ModuleRecord;
use crate::runner::ProcessRunner;
use indicatif::{ProgressBar, ProgressStyle};
use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Static site generator
pub struct SiteGenerator<R> {
    config: Config,
    runner: R,
    templates: TemplateEngine,
    fixer: LinkFixer,
    license: String,
    progress: bool,
}

/// What happened to a single package page
#[derive(Debug, Clone)]
pub struct PageOutcome {
    pub path: PathBuf,
    /// False when the extractor could not be started, exited non-zero or timed out
    pub extracted: bool,
    pub links: FixReport,
}

impl<R: ProcessRunner> SiteGenerator<R> {
    /// Create a generator, reading the license text named in the config
    pub fn new(config: Config, runner: R) -> Result<Self> {
        let license_file = &config.site.license_file;
        if !license_file.exists() {
            return Err(Error::PathNotFound(license_file.clone()));
        }
        let license = fs::read_to_string(license_file)?;
        Self::with_license(config, runner, license)
    }

    /// Create a generator with license text supplied directly
    pub fn with_license(config: Config, runner: R, license: impl Into<String>) -> Result<Self> {
        let templates = TemplateEngine::new(
            config.site.name.clone(),
            config.output.page_prefix.clone(),
            config.output.separator,
        )?;
        let fixer = LinkFixer::new(&config);

        Ok(Self {
            config,
            runner,
            templates,
            fixer,
            license: license.into(),
            progress: false,
        })
    }

    /// Show a progress bar while generating
    pub fn with_progress(mut self, progress: bool) -> Self {
        self.progress = progress;
        self
    }

    /// Generate every package page and the index page
    pub fn generate(&self) -> Result<GenerationReport> {
        let mut report = GenerationReport::default();

        fs::create_dir_all(&self.config.output.directory)?;

        if let Some(static_dir) = &self.config.site.static_dir {
            report.static_files_copied = self.copy_static(static_dir)?;
        }

        let index_path = self.config.index_path();
        write_chunk(&index_path, &self.templates.render_index_header()?)?;

        let progress = if self.progress {
            let pb = ProgressBar::new(self.config.packages.len() as u64);
            pb.set_style(
                ProgressStyle::default_bar()
                    .template("{spinner:.green} [{bar:40.cyan/blue}] {pos}/{len} {msg}")
                    .map_err(|e| Error::other(e.to_string()))?
                    .progress_chars("#>-"),
            );
            Some(pb)
        } else {
            None
        };

        for package in &self.config.packages {
            if let Some(ref pb) = progress {
                pb.set_message(package.id.clone());
            }

            let (path, extracted) = self.write_page(package)?;
            append_chunk(&index_path, &self.templates.render_index_entry(package)?)?;
            let links = self.fix_page(package, &path)?;

            report.pages_generated += 1;
            if !extracted {
                report.extractor_failures += 1;
            }
            if links.changed() {
                report.pages_relinked += 1;
            }
            report.links_rewritten += links.total();

            if let Some(ref pb) = progress {
                pb.inc(1);
            }
        }

        append_chunk(&index_path, &self.templates.render_index_close()?)?;
        append_chunk(&index_path, &self.templates.render_footer(&self.license)?)?;

        if let Some(pb) = progress {
            pb.finish_with_message("done");
        }

        Ok(report)
    }

    /// Generate the page of one package, without touching the index
    pub fn generate_page(&self, package: &ModuleRecord) -> Result<PageOutcome> {
        fs::create_dir_all(&self.config.output.directory)?;

        let (path, extracted) = self.write_page(package)?;
        let links = self.fix_page(package, &path)?;

        Ok(PageOutcome {
            path,
            extracted,
            links,
        })
    }

    /// Write header, extractor output and footer; returns the page path and
    /// whether extraction succeeded
    fn write_page(&self, package: &ModuleRecord) -> Result<(PathBuf, bool)> {
        let path = self.config.page_path(&package.id);
        tracing::info!("{}", path.display());

        write_chunk(&path, &self.templates.render_page_header(package)?)?;

        let extracted = match self.extract(package) {
            Some(fragment) => {
                append_chunk(&path, &fragment.stdout)?;
                fragment.success()
            }
            None => false,
        };

        append_chunk(&path, &self.templates.render_footer(&self.license)?)?;

        Ok((path, extracted))
    }

    fn fix_page(&self, package: &ModuleRecord, path: &Path) -> Result<FixReport> {
        let subdirs = self.config.subdirs.for_package(&package.id);
        self.fixer.fix_file(path, &package.id, &subdirs)
    }

    /// Run the extractor; failing to start it is reported and yields no fragment
    fn extract(&self, package: &ModuleRecord) -> Option<crate::runner::CommandOutput> {
        let args = self
            .config
            .extractor
            .args_for(&self.config.site.package_path(&package.id));

        match self.runner.run(&self.config.extractor.program, &args) {
            Ok(output) => Some(output),
            Err(e) => {
                tracing::info!("{}: {}", package.id, e);
                None
            }
        }
    }

    /// Copy the static assets directory to `<output>/static`
    fn copy_static(&self, source: &Path) -> Result<usize> {
        if !source.is_dir() {
            return Err(Error::PathNotFound(source.to_path_buf()));
        }

        let target = self.config.output.directory.join("static");
        let mut copied = 0;

        for entry in WalkDir::new(source) {
            let entry = entry?;
            let relative = entry
                .path()
                .strip_prefix(source)
                .map_err(|e| Error::other(e.to_string()))?;
            let dest = target.join(relative);

            if entry.file_type().is_dir() {
                fs::create_dir_all(&dest)?;
            } else {
                fs::copy(entry.path(), &dest)?;
                copied += 1;
            }
        }

        tracing::debug!("copied {} static files", copied);
        Ok(copied)
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Get the output directory
    pub fn output_dir(&self) -> &Path {
        &self.config.output.directory
    }
}

/// Create or truncate `path` and write `chunk`
fn write_chunk(path: &Path, chunk: &str) -> Result<()> {
    fs::write(path, chunk)?;
    Ok(())
}

/// Append `chunk` to `path`, creating it if needed
fn append_chunk(path: &Path, chunk: &str) -> Result<()> {
    let mut file = OpenOptions::new().create(true).append(true).open(path)?;
    file.write_all(chunk.as_bytes())?;
    Ok(())
}

/// Report of what was generated
#[derive(Debug, Default)]
pub struct GenerationReport {
    pub pages_generated: usize,
    pub extractor_failures: usize,
    pub pages_relinked: usize,
    pub links_rewritten: usize,
    pub static_files_copied: usize,
}

impl GenerationReport {
    pub fn summary(&self) -> String {
        format!(
            "Generated {} pages ({} extractor failures), rewrote {} links in {} pages, copied {} static files",
            self.pages_generated,
            self.extractor_failures,
            self.links_rewritten,
            self.pages_relinked,
            self.static_files_copied
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::runner::CommandOutput;
    use std::cell::RefCell;
    use tempfile::TempDir;

    /// Extractor stand-in that answers from a fixed fragment and records calls
    struct StubRunner {
        fragment: String,
        calls: RefCell<Vec<(String, Vec<String>)>>,
    }

    impl StubRunner {
        fn new(fragment: &str) -> Self {
            Self {
                fragment: fragment.to_string(),
                calls: RefCell::new(Vec::new()),
            }
        }
    }

    impl ProcessRunner for StubRunner {
        fn run(&self, program: &str, args: &[String]) -> Result<CommandOutput> {
            self.calls
                .borrow_mut()
                .push((program.to_string(), args.to_vec()));
            Ok(CommandOutput {
                stdout: self.fragment.clone(),
                status: Some(0),
                ..Default::default()
            })
        }
    }

    struct MissingRunner;

    impl ProcessRunner for MissingRunner {
        fn run(&self, program: &str, _args: &[String]) -> Result<CommandOutput> {
            Err(Error::extractor(program, "not found"))
        }
    }

    fn config_in(dir: &Path, packages: &[(&str, &str)]) -> Config {
        let mut config = Config::default();
        config.output.directory = dir.join("doc");
        config.packages = packages
            .iter()
            .map(|(id, description)| ModuleRecord::new(*id, *description))
            .collect();
        config.subdirs = Default::default();
        config
    }

    #[test]
    fn test_page_is_header_fragment_footer() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), &[("ana", "analytical solutions")]);
        let generator = SiteGenerator::with_license(config, StubRunner::new("<p>stub</p>"), "MIT").unwrap();

        let outcome = generator.generate_page(&generator.config().packages[0]).unwrap();
        assert!(outcome.extracted);
        assert!(!outcome.links.changed());

        let templates = TemplateEngine::new("Gofem", "xx", '-').unwrap();
        let expected = format!(
            "{}<p>stub</p>{}",
            templates.render_page_header(&ModuleRecord::new("ana", "analytical solutions")).unwrap(),
            templates.render_footer("MIT").unwrap()
        );
        assert_eq!(fs::read_to_string(&outcome.path).unwrap(), expected);
    }

    #[test]
    fn test_generate_page_creates_output_directory() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path(), &[("fem", "f")]);
        config.output.directory = dir.path().join("nested/doc");
        config.subdirs.insert("fem", ["data"]);
        let generator =
            SiteGenerator::with_license(config, StubRunner::new(r#"<a href="data/">data</a>"#), "").unwrap();

        let outcome = generator.generate_page(&generator.config().packages[0]).unwrap();
        assert_eq!(outcome.path, dir.path().join("nested/doc/xxfem.html"));
        assert_eq!(outcome.links.subdirs, 1);
        assert!(!dir.path().join("nested/doc/index.html").exists());
    }

    #[test]
    fn test_index_entry_written_for_every_page() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path(), &[("fem", "f"), ("ana", "a")]);
        config.subdirs.insert("fem", ["data"]);
        let generator =
            SiteGenerator::with_license(config, StubRunner::new(r#"<a href="data/">data</a>"#), "").unwrap();

        let report = generator.generate().unwrap();
        assert_eq!(report.links_rewritten, 1);

        let index = fs::read_to_string(dir.path().join("doc/index.html")).unwrap();
        let fem = index.find("xxfem.html").unwrap();
        let ana = index.find("xxana.html").unwrap();
        assert!(fem < ana);
    }

    #[test]
    fn test_extractor_invocation() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), &[("mdl/sld", "models for solids")]);
        let generator = SiteGenerator::with_license(config, StubRunner::new(""), "").unwrap();
        generator.generate().unwrap();

        let calls = generator.runner.calls.borrow();
        assert_eq!(calls.len(), 1);
        assert_eq!(calls[0].0, "godoc");
        assert_eq!(
            calls[0].1,
            vec!["-html".to_string(), "github.com/cpmech/gofem/mdl/sld".to_string()]
        );
    }

    #[test]
    fn test_missing_extractor_continues() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), &[("ana", "a"), ("shp", "b")]);
        let generator = SiteGenerator::with_license(config, MissingRunner, "").unwrap();

        let report = generator.generate().unwrap();
        assert_eq!(report.pages_generated, 2);
        assert_eq!(report.extractor_failures, 2);
        assert!(dir.path().join("doc/xxana.html").exists());
        assert!(dir.path().join("doc/xxshp.html").exists());
    }

    #[test]
    fn test_regeneration_truncates_pages() {
        let dir = TempDir::new().unwrap();
        let config = config_in(dir.path(), &[("ana", "a")]);
        let generator = SiteGenerator::with_license(config, StubRunner::new("<p>x</p>"), "").unwrap();

        generator.generate().unwrap();
        let first = fs::read_to_string(dir.path().join("doc/xxana.html")).unwrap();
        let first_index = fs::read_to_string(dir.path().join("doc/index.html")).unwrap();
        generator.generate().unwrap();

        assert_eq!(fs::read_to_string(dir.path().join("doc/xxana.html")).unwrap(), first);
        assert_eq!(fs::read_to_string(dir.path().join("doc/index.html")).unwrap(), first_index);
    }

    #[test]
    fn test_subdir_links_fixed_per_package() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path(), &[("fem", "f"), ("ana", "a")]);
        config.subdirs.insert("fem", ["data"]);
        let generator =
            SiteGenerator::with_license(config, StubRunner::new(r#"<a href="data/">data</a>"#), "").unwrap();

        let report = generator.generate().unwrap();
        assert_eq!(report.pages_relinked, 1);

        let fem = fs::read_to_string(dir.path().join("doc/xxfem.html")).unwrap();
        assert!(fem.contains(r#"<a href="https://github.com/cpmech/gofem/tree/master/fem/data">"#));
        let ana = fs::read_to_string(dir.path().join("doc/xxana.html")).unwrap();
        assert!(ana.contains(r#"<a href="data/">data</a>"#));
    }

    #[test]
    fn test_copy_static() {
        let dir = TempDir::new().unwrap();
        let static_dir = dir.path().join("static-src");
        fs::create_dir_all(static_dir.join("img")).unwrap();
        fs::write(static_dir.join("style.css"), "body {}").unwrap();
        fs::write(static_dir.join("img/logo.png"), [0u8, 1, 2]).unwrap();

        let mut config = config_in(dir.path(), &[("ana", "a")]);
        config.site.static_dir = Some(static_dir);
        let generator = SiteGenerator::with_license(config, StubRunner::new(""), "").unwrap();

        let report = generator.generate().unwrap();
        assert_eq!(report.static_files_copied, 2);
        assert!(dir.path().join("doc/static/style.css").exists());
        assert!(dir.path().join("doc/static/img/logo.png").exists());
    }

    #[test]
    fn test_missing_static_dir_is_error() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path(), &[("ana", "a")]);
        config.site.static_dir = Some(dir.path().join("nope"));
        let generator = SiteGenerator::with_license(config, StubRunner::new(""), "").unwrap();
        assert!(matches!(generator.generate(), Err(Error::PathNotFound(_))));
    }

    #[test]
    fn test_missing_license_file() {
        let dir = TempDir::new().unwrap();
        let mut config = config_in(dir.path(), &[("ana", "a")]);
        config.site.license_file = dir.path().join("LICENSE");
        let result = SiteGenerator::new(config, StubRunner::new(""));
        assert!(matches!(result, Err(Error::PathNotFound(_))));
    }

    #[test]
    fn test_generation_report_summary() {
        let report = GenerationReport {
            pages_generated: 11,
            extractor_failures: 1,
            pages_relinked: 10,
            links_rewritten: 42,
            static_files_copied: 0,
        };

        let summary = report.summary();
        assert!(summary.contains("11 pages"));
        assert!(summary.contains("1 extractor failures"));
        assert!(summary.contains("42 links in 10 pages"));
    }
}
