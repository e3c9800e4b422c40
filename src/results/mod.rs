//! Result aggregation and reporting

mod aggregate;
mod report;

pub use aggregate::ResultAggregator;
pub use report::{Reporter, RunReport};
