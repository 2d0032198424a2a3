//! Persistent per-project records and star growth between cycles.

mod atomic;
mod delta;
mod store;
mod table;

pub use atomic::write_atomically;
pub use delta::{Delta, compute_delta};
pub use store::{ProjectStore, StoreLock};
pub use table::{CycleChanges, ProjectTable};
