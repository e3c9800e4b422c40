//! Failure models
//!
//! Structured failure kinds attached where a unit fails, so retry decisions
//! switch on a tag rather than on message text.

use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Message fragments that identify a transient failure when only text is available
const TRANSIENT_PATTERNS: &[(&str, FailureKind)] = &[
    ("timeout", FailureKind::Timeout),
    ("timed out", FailureKind::Timeout),
    ("econnreset", FailureKind::ConnectionReset),
    ("connection reset", FailureKind::ConnectionReset),
    ("enotfound", FailureKind::NameResolution),
    ("not clickable", FailureKind::NotInteractable),
    ("not interactable", FailureKind::NotInteractable),
    ("network", FailureKind::Network),
];

/// Kind of failure raised by a unit execution
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Timeout,
    Network,
    ConnectionReset,
    NameResolution,
    NotInteractable,
    Assertion,
    Malformed,
    Panicked,
    Other,
}

impl FailureKind {
    /// Whether a failure of this kind is worth retrying
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            FailureKind::Timeout
                | FailureKind::Network
                | FailureKind::ConnectionReset
                | FailureKind::NameResolution
                | FailureKind::NotInteractable
        )
    }

    /// Classify free text (case-insensitive substring match)
    pub fn classify(message: &str) -> FailureKind {
        let message = message.to_lowercase();
        TRANSIENT_PATTERNS
            .iter()
            .find(|(pattern, _)| message.contains(pattern))
            .map(|(_, kind)| *kind)
            .unwrap_or(FailureKind::Other)
    }
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            FailureKind::Timeout => "timeout",
            FailureKind::Network => "network",
            FailureKind::ConnectionReset => "connection reset",
            FailureKind::NameResolution => "name resolution",
            FailureKind::NotInteractable => "not interactable",
            FailureKind::Assertion => "assertion",
            FailureKind::Malformed => "malformed unit",
            FailureKind::Panicked => "panicked",
            FailureKind::Other => "other",
        };
        write!(f, "{name}")
    }
}

/// Error raised by one attempt of a unit
#[derive(Error, Clone, Debug, PartialEq, Eq)]
#[error("{message}")]
pub struct UnitError {
    pub kind: FailureKind,
    pub message: String,
    pub detail: Option<String>,
}

impl UnitError {
    pub fn new(kind: FailureKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            detail: None,
        }
    }

    /// Build an error whose kind is classified from its message
    pub fn from_message(message: impl Into<String>) -> Self {
        let message = message.into();
        Self::new(FailureKind::classify(&message), message)
    }

    pub fn assertion(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Assertion, message)
    }

    pub fn malformed(message: impl Into<String>) -> Self {
        Self::new(FailureKind::Malformed, message)
    }

    pub fn with_detail(mut self, detail: impl Into<String>) -> Self {
        self.detail = Some(detail.into());
        self
    }

    pub fn is_transient(&self) -> bool {
        self.kind.is_transient()
    }
}

impl From<anyhow::Error> for UnitError {
    fn from(err: anyhow::Error) -> Self {
        UnitError::from_message(err.to_string()).with_detail(format!("{err:?}"))
    }
}

/// Error summary recorded on a failed outcome
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorSummary {
    pub kind: FailureKind,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
}

impl From<UnitError> for ErrorSummary {
    fn from(err: UnitError) -> Self {
        Self {
            kind: err.kind,
            message: err.message,
            detail: err.detail,
        }
    }
}
