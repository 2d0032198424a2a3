//! Daily report generation.
//!
//! A report is rendered to markdown from the cycle's aggregated view and its star
//! deltas, then stored in a directory of date-named files that is pruned to a
//! configured retention.

mod archive;
mod common;
mod markdown;

pub use archive::ReportArchive;
pub use markdown::{DailyReport, generate as generate_markdown};
