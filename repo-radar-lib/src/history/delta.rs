use super::ProjectTable;
use crate::model::{Provenance, RepoId, RepoSnapshot};
use chrono::NaiveDate;

/// Star growth of one identity since it was last persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Delta {
    pub id: RepoId,
    pub name: String,
    pub description: Option<String>,
    pub provenance: Provenance,
    pub previous_stars: u64,
    pub current_stars: u64,
    pub delta: u64,
}

/// Growth of `snapshot` against the table, surfaced only when strictly positive.
///
/// Works for snapshots from any source. Unknown identities have no delta.
#[must_use]
pub fn compute_delta(snapshot: &RepoSnapshot, table: &ProjectTable, today: NaiveDate) -> Option<Delta> {
    let previous = table.last_persisted_stars(&snapshot.id, today)?;
    let delta = snapshot.stars.checked_sub(previous).filter(|d| *d > 0)?;

    Some(Delta {
        id: snapshot.id.clone(),
        name: snapshot.name.clone(),
        description: snapshot.description.clone(),
        provenance: snapshot.provenance,
        previous_stars: previous,
        current_stars: snapshot.stars,
        delta,
    })
}
