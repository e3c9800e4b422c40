//! Data models for test orchestration
//!
//! This module contains the data structures shared by the catalog, scheduler,
//! aggregator and reporter.

mod failure;
mod outcome;
mod unit;

pub use failure::{FailureKind, UnitError};
pub use outcome::{OutcomeStatus, Summary, TestOutcome};
pub use unit::{Locator, TestCategory, TestUnit};
