//! Test unit models
//!
//! Defines the immutable description of a discovered test unit.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;

/// Category a unit belongs to
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TestCategory {
    Ui,
    Api,
    #[default]
    Unknown,
}

impl TestCategory {
    /// Get category name
    pub fn name(&self) -> &'static str {
        match self {
            TestCategory::Ui => "ui",
            TestCategory::Api => "api",
            TestCategory::Unknown => "unknown",
        }
    }

    /// Parse from string
    pub fn from_str(s: &str) -> Option<TestCategory> {
        match s.to_lowercase().as_str() {
            "ui" => Some(TestCategory::Ui),
            "api" => Some(TestCategory::Api),
            "unknown" => Some(TestCategory::Unknown),
            _ => None,
        }
    }

    /// Infer a category from a locator or file-like name.
    ///
    /// Only whole `/` or `.` separated segments count (`tests/ui/login`,
    /// `login.ui.test`, `api.status`); a `ui` segment wins over an `api` one.
    pub fn infer(hint: &str) -> TestCategory {
        let hint = hint.to_lowercase();
        let has_segment = |tag: &str| hint.split(['/', '\\', '.']).any(|segment| segment == tag);
        if has_segment("ui") {
            TestCategory::Ui
        } else if has_segment("api") {
            TestCategory::Api
        } else {
            TestCategory::Unknown
        }
    }
}

impl fmt::Display for TestCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.name())
    }
}

/// Opaque handle used to resolve a unit into an executable body
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Locator {
    /// Registry key of the body (e.g. `api.status`)
    pub kind: String,
    /// Body parameters
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub params: BTreeMap<String, String>,
}

impl Locator {
    pub fn new(kind: impl Into<String>) -> Self {
        Self {
            kind: kind.into(),
            params: BTreeMap::new(),
        }
    }

    #[cfg(test)]
    pub fn param(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.params.insert(key.into(), value.into());
        self
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }
}

impl fmt::Display for Locator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.kind)
    }
}

/// One independently executable test
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TestUnit {
    pub name: String,
    pub locator: Locator,
    #[serde(rename = "type")]
    pub category: TestCategory,
}

impl TestUnit {
    pub fn new(name: impl Into<String>, locator: Locator, category: TestCategory) -> Self {
        Self {
            name: name.into(),
            locator,
            category,
        }
    }

    /// Create a unit whose category is inferred from its locator and name
    pub fn inferred(name: impl Into<String>, locator: Locator) -> Self {
        let name = name.into();
        let category = match TestCategory::infer(&locator.kind) {
            TestCategory::Unknown => TestCategory::infer(&name),
            category => category,
        };
        Self::new(name, locator, category)
    }
}

impl fmt::Display for TestUnit {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({})", self.name, self.category)
    }
}
