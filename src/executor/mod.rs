//! Unit execution engine
//!
//! Runs units under a concurrency bound with retries for transient failures.

mod retry;
mod runner;
mod scheduler;

pub use retry::RetryPolicy;
pub use runner::{unit_body, UnitBody, UnitContext, UnitResolver, UnitRunner};
pub use scheduler::Scheduler;
