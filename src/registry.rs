// Package registry: the ordered list of documented packages and the
// per-package subdirectory rules used when rewriting listing links.

use crate::error::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashSet};

/// One documented package: a slash-delimited identifier and a one-line description
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ModuleRecord {
    pub id: String,
    pub description: String,
}

impl ModuleRecord {
    pub fn new(id: impl Into<String>, description: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            description: description.into(),
        }
    }

    /// Identifier with every `/` replaced by `separator`
    pub fn flat_id(&self, separator: char) -> String {
        flatten_id(&self.id, separator)
    }
}

/// Flatten a package identifier into a single path component.
pub fn flatten_id(id: &str, separator: char) -> String {
    id.chars()
        .map(|c| if c == '/' { separator } else { c })
        .collect()
}

/// File name of the generated page for `id`, e.g. `mdl/sld` -> `xxmdl-sld.html`.
pub fn page_file_name(prefix: &str, id: &str, separator: char) -> String {
    format!("{}{}.html", prefix, flatten_id(id, separator))
}

/// Subdirectory names, per package, whose listing anchors must point at the repository tree.
///
/// A package without an entry needs no subdirectory rewriting.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SubdirRules(BTreeMap<String, BTreeSet<String>>);

impl SubdirRules {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a rule, returning self for chaining
    pub fn with(mut self, id: &str, subdirs: &[&str]) -> Self {
        self.insert(id, subdirs.iter().copied());
        self
    }

    pub fn insert<I, S>(&mut self, id: &str, subdirs: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.0
            .entry(id.to_string())
            .or_default()
            .extend(subdirs.into_iter().map(Into::into));
    }

    /// Subdirectories configured for `id` (empty when none are)
    pub fn for_package(&self, id: &str) -> Vec<&str> {
        self.0
            .get(id)
            .map(|set| set.iter().map(String::as_str).collect())
            .unwrap_or_default()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&String, &BTreeSet<String>)> {
        self.0.iter()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

/// The registry shipped with the default configuration.
pub fn default_registry() -> Vec<ModuleRecord> {
    [
        ("ana", "analytical solutions for comparisons"),
        ("shp", "shape structures and quadrature points"),
        ("mdl/sld", "models for solids"),
        ("mdl/cnd", "models for liquid/gas conductivity in porous media"),
        ("mdl/lrm", "models for liquid retention in porous media"),
        ("mdl/fld", "models for fluids"),
        ("mdl/por", "models for porous media"),
        ("inp", "input data structures. simulation, materials, meshes"),
        ("ele", "finite elements"),
        ("fem", "finite element method"),
        ("out", "results analyses and plotting"),
    ]
    .into_iter()
    .map(|(id, description)| ModuleRecord::new(id, description))
    .collect()
}

/// Subdirectory rules matching [`default_registry`].
pub fn default_subdirs() -> SubdirRules {
    SubdirRules::new()
        .with(
            "ele",
            &["diffusion", "porous", "seepage", "solid", "thermomech"],
        )
        .with("fem", &["data"])
}

/// Check that a registry is usable: non-empty, well-formed identifiers, no duplicates.
pub fn validate_registry(records: &[ModuleRecord]) -> Result<()> {
    if records.is_empty() {
        return Err(Error::config_validation("at least one package is required"));
    }

    let mut seen = HashSet::new();
    for record in records {
        let id = record.id.as_str();
        if id.is_empty() {
            return Err(Error::config_validation("package id cannot be empty"));
        }
        if id.chars().any(char::is_whitespace) {
            return Err(Error::config_validation(format!(
                "package id '{}' contains whitespace",
                id
            )));
        }
        if id.starts_with('/') || id.ends_with('/') || id.contains("//") {
            return Err(Error::config_validation(format!(
                "package id '{}' has an empty path segment",
                id
            )));
        }
        if !seen.insert(id) {
            return Err(Error::config_validation(format!(
                "duplicate package id '{}'",
                id
            )));
        }
    }

    Ok(())
}

/// Check that every rule names a registered package and plain directory names.
pub fn validate_subdirs(rules: &SubdirRules, records: &[ModuleRecord]) -> Result<()> {
    for (id, subdirs) in rules.iter() {
        if !records.iter().any(|r| &r.id == id) {
            return Err(Error::config_validation(format!(
                "subdirectory rule for unknown package '{}'",
                id
            )));
        }
        for name in subdirs {
            if name.is_empty() || name.contains('/') {
                return Err(Error::config_validation(format!(
                    "invalid subdirectory '{}' for package '{}'",
                    name, id
                )));
            }
        }
    }
    Ok(())
}
