use super::delta::{Delta, compute_delta};
use crate::model::{HistoryEntry, ProjectRecord, RepoId, RepoSnapshot};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

const LOG_TARGET: &str = "   history";

/// The persisted document: one record per identity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ProjectTable {
    records: BTreeMap<RepoId, ProjectRecord>,
}

/// What applying one cycle's snapshots did to the table.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct CycleChanges {
    /// Positive star deltas, largest first.
    pub changes: Vec<Delta>,

    /// Identities seen for the first time.
    pub created: usize,

    /// Existing identities that received a history entry.
    pub updated: usize,

    /// Identities already observed on this date; attributes overlaid, history untouched.
    pub refreshed: usize,
}

impl ProjectTable {
    #[must_use]
    pub fn get(&self, id: &RepoId) -> Option<&ProjectRecord> {
        self.records.get(id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &ProjectRecord> {
        self.records.values()
    }

    /// Record an observation.
    ///
    /// A new identity gets a record with an empty history. An existing record first gets a
    /// history entry dated `today` holding its previous stars and forks, then the snapshot's
    /// known attributes are overlaid.
    pub fn upsert(&mut self, snapshot: &RepoSnapshot, today: NaiveDate) -> &ProjectRecord {
        let record = self
            .records
            .entry(snapshot.id.clone())
            .and_modify(|record| {
                record.history.push(HistoryEntry {
                    date: today,
                    stars: record.stars,
                    forks: record.forks,
                });
                record.overlay(snapshot);
            })
            .or_insert_with(|| ProjectRecord::from_snapshot(snapshot));

        record.observed_on = Some(today);
        record
    }

    /// The star count a delta for `id` is measured against on `today`.
    ///
    /// For a record already observed on `today`, that is the count before today's first
    /// observation, so a rerun reports the same deltas as the first run. A record created
    /// today has no earlier count.
    #[must_use]
    pub fn last_persisted_stars(&self, id: &RepoId, today: NaiveDate) -> Option<u64> {
        let record = self.records.get(id)?;

        if record.observed_on == Some(today) {
            return record.history.iter().find(|e| e.date == today).map(|e| e.stars);
        }

        Some(record.stars)
    }

    /// Apply one cycle's deduplicated snapshots.
    ///
    /// Deltas are computed against the table as it was before any of this cycle's changes.
    /// A record already observed on `today` is only overlaid, so rerunning a date never adds
    /// a second history entry.
    pub fn apply_cycle(&mut self, snapshots: &[RepoSnapshot], today: NaiveDate) -> CycleChanges {
        let mut result = CycleChanges {
            changes: snapshots.iter().filter_map(|s| compute_delta(s, self, today)).collect(),
            ..CycleChanges::default()
        };

        // stable, so equal deltas keep ranking order
        result.changes.sort_by(|a, b| b.delta.cmp(&a.delta));

        for snapshot in snapshots {
            let observed_on = self.records.get(&snapshot.id).map(|r| r.observed_on);
            match observed_on {
                Some(date) if date == Some(today) => {
                    if let Some(record) = self.records.get_mut(&snapshot.id) {
                        record.overlay(snapshot);
                    }
                    result.refreshed += 1;
                }
                Some(_) => {
                    let _ = self.upsert(snapshot, today);
                    result.updated += 1;
                }
                None => {
                    let _ = self.upsert(snapshot, today);
                    result.created += 1;
                }
            }
        }

        log::debug!(
            target: LOG_TARGET,
            "Applied {} snapshot(s): {} new, {} updated, {} refreshed, {} growing",
            snapshots.len(),
            result.created,
            result.updated,
            result.refreshed,
            result.changes.len()
        );

        result
    }
}
