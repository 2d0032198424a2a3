//! One fetch-aggregate-commit pass.
//!
//! A cycle checks the API quota, runs the three sources concurrently under per-source
//! timeouts and an overall deadline, aggregates their output, applies it to the project
//! table under the store lock, and writes the day's report.

mod quota;
mod tracker;

pub use quota::{LowQuotaPolicy, QuotaDecision, QuotaGate};
pub use tracker::{CycleOptions, CycleOutcome, Tracker};

/// How much work a cycle does.
#[derive(Debug, Clone, Copy, PartialEq, Eq, strum::Display)]
#[strum(serialize_all = "lowercase")]
pub enum CycleMode {
    /// All sources with watchlist enrichment.
    Full,

    /// Keyword search and watchlist enrichment are skipped to save API quota.
    Degraded,
}
