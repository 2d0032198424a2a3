use crate::model::{RepoId, RepoSnapshot};
use std::collections::HashMap;

/// Deduplicate snapshots by identity, keeping the first occurrence's position and provenance.
///
/// Later duplicates are folded into the kept snapshot with [`merge_into`].
#[must_use]
pub fn dedup(snapshots: impl IntoIterator<Item = RepoSnapshot>) -> Vec<RepoSnapshot> {
    let mut out: Vec<RepoSnapshot> = Vec::new();
    let mut index: HashMap<RepoId, usize> = HashMap::new();

    for snapshot in snapshots {
        if let Some(&i) = index.get(&snapshot.id) {
            merge_into(&mut out[i], snapshot);
        } else {
            let _ = index.insert(snapshot.id.clone(), out.len());
            out.push(snapshot);
        }
    }

    out
}

/// Fold a later snapshot of the same identity into the kept one.
///
/// The kept snapshot's provenance survives. Annotations are unioned and missing attributes
/// are filled in. Approximate trending counts are replaced by exact API counts.
pub fn merge_into(kept: &mut RepoSnapshot, later: RepoSnapshot) {
    fn fill<T>(slot: &mut Option<T>, value: Option<T>) {
        if slot.is_none() {
            *slot = value;
        }
    }

    if !kept.provenance.has_exact_counts() && later.provenance.has_exact_counts() {
        kept.stars = later.stars;
        if later.forks.is_some() {
            kept.forks = later.forks;
        }
    }

    fill(&mut kept.forks, later.forks);
    fill(&mut kept.description, later.description);
    fill(&mut kept.language, later.language);
    fill(&mut kept.created_at, later.created_at);
    fill(&mut kept.updated_at, later.updated_at);
    fill(&mut kept.license, later.license);
    fill(&mut kept.html_url, later.html_url);

    if kept.topics.is_empty() {
        kept.topics = later.topics;
    }

    kept.annotations.union(later.annotations);
}

/// Sort by stars, most first; ties keep their order.
#[must_use]
pub fn rank(mut snapshots: Vec<RepoSnapshot>) -> Vec<RepoSnapshot> {
    snapshots.sort_by(|a, b| b.stars.cmp(&a.stars));
    snapshots
}
