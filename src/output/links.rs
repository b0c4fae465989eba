// Link fixer
//
// The extractor emits links relative to the build machine's source tree. Each
// rule below is a plain textual substitution that turns one kind of those
// links into a stable repository URL. Rules are applied in order, and none of
// their replacements contains its own pattern, so a second pass is a no-op.

use crate::config::Config;
use crate::error::Result;
use std::fs;
use std::path::Path;

/// Patterns and targets shared by every page
#[derive(Debug, Clone)]
pub struct LinkFixer {
    repository_url: String,
    branch: String,
    source_marker: String,
    source_root: String,
    parent_row: String,
    parent_row_replacement: String,
}

/// Number of replacements made by each rule
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FixReport {
    pub source_marker: usize,
    pub source_root: usize,
    pub subdirs: usize,
    pub parent_rows: usize,
}

impl FixReport {
    pub fn total(&self) -> usize {
        self.source_marker + self.source_root + self.subdirs + self.parent_rows
    }

    pub fn changed(&self) -> bool {
        self.total() > 0
    }
}

impl LinkFixer {
    pub fn new(config: &Config) -> Self {
        Self {
            repository_url: config.site.repository_url.trim_end_matches('/').to_string(),
            branch: config.site.branch.clone(),
            source_marker: config.links.source_marker.clone(),
            source_root: config.source_root(),
            parent_row: config.links.parent_row.clone(),
            parent_row_replacement: config.links.parent_row_replacement.clone(),
        }
    }

    /// Rule 1: the placeholder source path becomes the package's blob URL
    pub fn fix_source_marker(&self, text: &str, package: &str) -> (String, usize) {
        let target = format!("{}/blob/{}/{}", self.repository_url, self.branch, package);
        replace_counted(text, &self.source_marker, &target)
    }

    /// Rule 2: the extractor's source root becomes the repository blob root
    pub fn fix_source_root(&self, text: &str) -> (String, usize) {
        let target = format!("{}/blob/{}/", self.repository_url, self.branch);
        replace_counted(text, &self.source_root, &target)
    }

    /// Rule 3: a listing anchor `<a href="name/">` becomes the tree URL of `package/name`
    pub fn fix_subdir(&self, text: &str, package: &str, name: &str) -> (String, usize) {
        let pattern = format!("<a href=\"{}/\">", name);
        let target = format!(
            "<a href=\"{}/tree/{}/{}/{}\">",
            self.repository_url, self.branch, package, name
        );
        replace_counted(text, &pattern, &target)
    }

    /// Rule 4: the parent directory row is replaced by an empty row
    pub fn hide_parent_row(&self, text: &str) -> (String, usize) {
        replace_counted(text, &self.parent_row, &self.parent_row_replacement)
    }

    /// Apply all rules in order
    pub fn fix_text(&self, text: &str, package: &str, subdirs: &[&str]) -> (String, FixReport) {
        let mut report = FixReport::default();

        let (text, n) = self.fix_source_marker(text, package);
        report.source_marker = n;

        let (mut text, n) = self.fix_source_root(&text);
        report.source_root = n;

        for name in subdirs {
            let (fixed, n) = self.fix_subdir(&text, package, name);
            text = fixed;
            report.subdirs += n;
        }

        let (text, n) = self.hide_parent_row(&text);
        report.parent_rows = n;

        (text, report)
    }

    /// Rewrite a generated page in place; the file is only written when something changed
    pub fn fix_file(&self, path: &Path, package: &str, subdirs: &[&str]) -> Result<FixReport> {
        let contents = fs::read_to_string(path)?;
        let (fixed, report) = self.fix_text(&contents, package, subdirs);

        if report.changed() {
            fs::write(path, fixed)?;
        }
        tracing::debug!("{}: {} links rewritten", path.display(), report.total());

        Ok(report)
    }
}

fn replace_counted(text: &str, pattern: &str, replacement: &str) -> (String, usize) {
    let count = text.matches(pattern).count();
    if count == 0 {
        return (text.to_string(), 0);
    }
    (text.replace(pattern, replacement), count)
}
