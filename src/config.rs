use crate::error::{Error, Result};
use crate::registry::{self, ModuleRecord, SubdirRules};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Placeholder in extractor arguments replaced by the full package import path
pub const PACKAGE_PLACEHOLDER: &str = "{package}";

/// Main configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub site: SiteConfig,
    pub extractor: ExtractorConfig,
    pub output: OutputConfig,
    pub links: LinksConfig,
    pub packages: Vec<ModuleRecord>,
    /// Empty when a config file omits it, since the built-in rules name built-in packages
    #[serde(default)]
    pub subdirs: SubdirRules,
}

/// Site identity and repository location
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SiteConfig {
    pub name: String,
    pub repository_url: String,
    pub import_path: String,
    pub branch: String,
    pub license_file: PathBuf,
    pub static_dir: Option<PathBuf>,
}

/// External documentation extractor invocation
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ExtractorConfig {
    pub program: String,
    pub args: Vec<String>,
    /// Per-invocation limit in seconds, 0 disables it
    pub timeout_secs: u64,
}

/// Output layout
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    pub directory: PathBuf,
    pub index_file: String,
    pub page_prefix: String,
    pub separator: char,
}

/// Link rewriting patterns
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LinksConfig {
    pub source_marker: String,
    /// Defaults to `/src/<import_path>/`
    pub source_root: Option<String>,
    pub parent_row: String,
    pub parent_row_replacement: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            site: SiteConfig::default(),
            extractor: ExtractorConfig::default(),
            output: OutputConfig::default(),
            links: LinksConfig::default(),
            packages: registry::default_registry(),
            subdirs: registry::default_subdirs(),
        }
    }
}

impl Default for SiteConfig {
    fn default() -> Self {
        Self {
            name: "Gofem".to_string(),
            repository_url: "https://github.com/cpmech/gofem".to_string(),
            import_path: "github.com/cpmech/gofem".to_string(),
            branch: "master".to_string(),
            license_file: PathBuf::from("LICENSE"),
            static_dir: None,
        }
    }
}

impl Default for ExtractorConfig {
    fn default() -> Self {
        Self {
            program: "godoc".to_string(),
            args: vec!["-html".to_string(), PACKAGE_PLACEHOLDER.to_string()],
            timeout_secs: 300,
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: PathBuf::from("doc"),
            index_file: "index.html".to_string(),
            page_prefix: "xx".to_string(),
            separator: '-',
        }
    }
}

impl Default for LinksConfig {
    fn default() -> Self {
        Self {
            source_marker: "/src/target".to_string(),
            source_root: None,
            parent_row: r#"<tr><td><a href="..">..</a></td><td></td></tr>"#.to_string(),
            parent_row_replacement: "<tr><td></td><td></td></tr>".to_string(),
        }
    }
}

impl SiteConfig {
    /// Import path of a package as the extractor expects it
    pub fn package_path(&self, id: &str) -> String {
        format!("{}/{}", self.import_path.trim_end_matches('/'), id)
    }
}

impl ExtractorConfig {
    /// Arguments for one invocation, with the placeholder expanded
    pub fn args_for(&self, package_path: &str) -> Vec<String> {
        self.args
            .iter()
            .map(|arg| arg.replace(PACKAGE_PLACEHOLDER, package_path))
            .collect()
    }

    pub fn timeout(&self) -> Option<Duration> {
        (self.timeout_secs > 0).then(|| Duration::from_secs(self.timeout_secs))
    }
}

impl Config {
    /// Load config from a TOML file
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let config: Config = toml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Load config from file, or return defaults if the file does not exist
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            tracing::debug!("no config at {}, using defaults", path.display());
            Ok(Self::default())
        }
    }

    /// Serialize to pretty TOML
    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// Merge CLI arguments into config (CLI takes precedence)
    pub fn merge_cli(
        &mut self,
        output: Option<PathBuf>,
        extractor: Option<String>,
        timeout_secs: Option<u64>,
        license_file: Option<PathBuf>,
    ) {
        if let Some(out) = output {
            self.output.directory = out;
        }

        if let Some(program) = extractor {
            self.extractor.program = program;
        }

        if let Some(secs) = timeout_secs {
            self.extractor.timeout_secs = secs;
        }

        if let Some(license) = license_file {
            self.site.license_file = license;
        }
    }

    /// The source root prefix the extractor writes into its links
    pub fn source_root(&self) -> String {
        self.links
            .source_root
            .clone()
            .unwrap_or_else(|| format!("/src/{}/", self.site.import_path.trim_end_matches('/')))
    }

    /// Path of the generated page for `id`
    pub fn page_path(&self, id: &str) -> PathBuf {
        self.output.directory.join(registry::page_file_name(
            &self.output.page_prefix,
            id,
            self.output.separator,
        ))
    }

    pub fn index_path(&self) -> PathBuf {
        self.output.directory.join(&self.output.index_file)
    }

    pub fn find_package(&self, id: &str) -> Option<&ModuleRecord> {
        self.packages.iter().find(|p| p.id == id)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<()> {
        registry::validate_registry(&self.packages)?;
        registry::validate_subdirs(&self.subdirs, &self.packages)?;

        if self.output.separator == '/' || self.output.separator.is_whitespace() {
            return Err(Error::config_validation(
                "separator must be a visible character other than '/'",
            ));
        }

        if self.output.index_file.is_empty() {
            return Err(Error::config_validation("index_file cannot be empty"));
        }

        // Pages are flat files next to the index, so flattened names must not clash
        let mut pages: HashMap<String, &str> = HashMap::new();
        for package in &self.packages {
            let name = registry::page_file_name(
                &self.output.page_prefix,
                &package.id,
                self.output.separator,
            );
            if name == self.output.index_file {
                return Err(Error::config_validation(format!(
                    "page for package '{}' would overwrite index file '{}'",
                    package.id, name
                )));
            }
            if let Some(other) = pages.insert(name.clone(), &package.id) {
                return Err(Error::config_validation(format!(
                    "packages '{}' and '{}' both map to page '{}'",
                    other, package.id, name
                )));
            }
        }

        if self.extractor.program.trim().is_empty() {
            return Err(Error::config_validation("extractor program cannot be empty"));
        }

        if !self
            .extractor
            .args
            .iter()
            .any(|arg| arg.contains(PACKAGE_PLACEHOLDER))
        {
            return Err(Error::config_validation(format!(
                "extractor args must contain {}",
                PACKAGE_PLACEHOLDER
            )));
        }

        if self.site.repository_url.is_empty() {
            return Err(Error::config_validation("repository_url cannot be empty"));
        }

        // A replacement that still contains its own pattern would be rewritten again on every pass
        let source_root = self.source_root();
        for pattern in [self.links.source_marker.as_str(), source_root.as_str()] {
            if pattern.is_empty() {
                return Err(Error::config_validation("link patterns cannot be empty"));
            }
            if self.site.repository_url.contains(pattern) {
                return Err(Error::config_validation(format!(
                    "repository_url contains link pattern '{}'",
                    pattern
                )));
            }
        }

        if self.links.parent_row.is_empty()
            || self
                .links
                .parent_row_replacement
                .contains(&self.links.parent_row)
        {
            return Err(Error::config_validation(
                "parent_row must be non-empty and absent from its replacement",
            ));
        }

        Ok(())
    }
}
