//! Test catalog
//!
//! Loads unit definitions from a manifest file and selects the units a run
//! should execute.

mod bodies;

pub use bodies::BuiltinResolver;

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::debug;

use crate::config::FilterConfig;
use crate::models::{Locator, TestCategory, TestUnit};

/// Catalog loading errors
#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Failed to read manifest {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse manifest {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("Unit #{0} has an empty name")]
    EmptyName(usize),

    #[error("Duplicate unit name: {0}")]
    DuplicateName(String),
}

/// Manifest written by `init`
pub const SAMPLE_MANIFEST: &str = r#"units:
  - name: login page title
    locator: ui.title
    params:
      url: https://www.saucedemo.com
      title: Swag Labs
  - name: login button present
    locator: ui.element
    params:
      url: https://www.saucedemo.com
      selector: login-button
  - name: post has id and title
    locator: api.json_fields
    params:
      url: https://jsonplaceholder.typicode.com/posts/1
      fields: id,title
  - name: users endpoint
    locator: api.status
    params:
      url: https://jsonplaceholder.typicode.com/users
      status: "200"
"#;

/// One manifest entry
#[derive(Clone, Debug, Serialize, Deserialize)]
struct ManifestEntry {
    name: String,
    locator: String,
    #[serde(default, rename = "type", alias = "category")]
    category: Option<TestCategory>,
    #[serde(default)]
    params: BTreeMap<String, String>,
}

impl ManifestEntry {
    fn into_unit(self) -> TestUnit {
        let locator = Locator {
            kind: self.locator,
            params: self.params,
        };
        match self.category {
            Some(category) => TestUnit::new(self.name, locator, category),
            None => TestUnit::inferred(self.name, locator),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Manifest {
    #[serde(default)]
    units: Vec<ManifestEntry>,
}

/// Discovered units in manifest order
#[derive(Clone, Debug, Default)]
pub struct TestCatalog {
    units: Vec<TestUnit>,
}

impl TestCatalog {
    /// Build a catalog from already constructed units
    pub fn from_units(units: Vec<TestUnit>) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        for (index, unit) in units.iter().enumerate() {
            if unit.name.trim().is_empty() {
                return Err(CatalogError::EmptyName(index + 1));
            }
            if !seen.insert(unit.name.as_str()) {
                return Err(CatalogError::DuplicateName(unit.name.clone()));
            }
        }
        Ok(Self { units })
    }

    /// Load a YAML or JSON manifest
    pub fn load(path: impl AsRef<Path>) -> Result<Self, CatalogError> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|source| CatalogError::Io {
            path: path.to_path_buf(),
            source,
        })?;

        let manifest: Manifest = if is_json_file(path) {
            serde_json::from_str(&content).map_err(|e| parse_error(path, e))?
        } else {
            serde_yaml::from_str(&content).map_err(|e| parse_error(path, e))?
        };

        let units = manifest
            .units
            .into_iter()
            .map(ManifestEntry::into_unit)
            .collect();
        let catalog = Self::from_units(units)?;
        debug!("Loaded {} units from {}", catalog.len(), path.display());
        Ok(catalog)
    }

    pub fn units(&self) -> &[TestUnit] {
        &self.units
    }

    pub fn len(&self) -> usize {
        self.units.len()
    }

    pub fn is_empty(&self) -> bool {
        self.units.is_empty()
    }

    /// Units passing the filters, in manifest order
    pub fn select(&self, filters: &FilterConfig) -> Vec<TestUnit> {
        self.units
            .iter()
            .filter(|unit| matches(unit, filters))
            .cloned()
            .collect()
    }

    /// Units grouped by category, in first-seen order
    pub fn grouped(&self, filters: &FilterConfig) -> Vec<(TestCategory, Vec<TestUnit>)> {
        let mut groups: Vec<(TestCategory, Vec<TestUnit>)> = Vec::new();
        for unit in self.select(filters) {
            match groups.iter_mut().find(|(category, _)| *category == unit.category) {
                Some((_, units)) => units.push(unit),
                None => groups.push((unit.category, vec![unit])),
            }
        }
        groups
    }
}

fn matches(unit: &TestUnit, filters: &FilterConfig) -> bool {
    if !filters.include.is_empty() && !filters.include.contains(&unit.category) {
        return false;
    }
    if filters.exclude.iter().any(|name| name == &unit.name) {
        return false;
    }
    match &filters.grep {
        Some(pattern) => unit.name.to_lowercase().contains(&pattern.to_lowercase()),
        None => true,
    }
}

fn parse_error(path: &Path, err: impl std::fmt::Display) -> CatalogError {
    CatalogError::Parse {
        path: path.to_path_buf(),
        message: err.to_string(),
    }
}

fn is_json_file(path: &Path) -> bool {
    path.extension().map(|e| e == "json").unwrap_or(false)
}
