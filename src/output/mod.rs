//! Output formatting module
//!
//! Console rendering of run reports and unit listings.

mod formatter;

pub use formatter::{format_unit_list, OutputFormat, ResultFormatter};
