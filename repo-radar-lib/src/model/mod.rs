//! Data model shared by the sources, the aggregator, and the history engine.
//!
//! A [`RepoSnapshot`] is one immutable observation produced by a source. The
//! [`ProjectRecord`] is what survives across runs: the latest attributes of an
//! identity plus its append-only growth history.

mod record;
mod repo_id;
mod snapshot;

pub use record::{HistoryEntry, ProjectRecord};
pub use repo_id::RepoId;
pub use snapshot::{Annotations, CommitSummary, ContributorSummary, Provenance, RepoSnapshot};
