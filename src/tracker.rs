//! Jobs the user has asked to cancel.
//!
//! `scancel` returns before Slurm drops the job, so for a few refreshes a
//! cancelled job is still listed. The pending set remembers those ids so the
//! table can flag them, and forgets each id as soon as a successful snapshot
//! no longer contains it.

use std::collections::BTreeSet;

use crate::models::Record;
use crate::slurm::Snapshot;

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PendingDeleteSet {
    ids: BTreeSet<u64>,
}

impl PendingDeleteSet {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Drop every id the snapshot no longer lists.
    ///
    /// Call only with successful snapshots; a failed fetch says nothing
    /// about which jobs are gone.
    pub fn reconcile(&mut self, snapshot: &Snapshot) {
        let before = self.ids.len();
        self.ids.retain(|id| snapshot.contains(*id));
        let dropped = before - self.ids.len();
        if dropped > 0 {
            tracing::debug!(dropped, remaining = self.ids.len(), "pending deletes settled");
        }
    }

    /// Add one job. Returns false if it was already pending.
    pub fn mark_pending(&mut self, job_id: u64) -> bool {
        self.ids.insert(job_id)
    }

    /// Add every job in `snapshot` that shares `representative`'s array id.
    ///
    /// Returns the number of newly marked jobs.
    pub fn mark_pending_array(&mut self, representative: &Record, snapshot: &Snapshot) -> usize {
        let array_id = match representative.array_job_id {
            Some(id) if id != 0 => id,
            _ => return usize::from(self.mark_pending(representative.job_id)),
        };
        snapshot
            .records()
            .iter()
            .filter(|r| r.array_job_id == Some(array_id))
            .filter(|r| self.ids.insert(r.job_id))
            .count()
    }

    #[must_use]
    pub fn contains(&self, job_id: u64) -> bool {
        self.ids.contains(&job_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.ids.len()
    }

    #[cfg(test)]
    pub fn iter(&self) -> impl Iterator<Item = u64> + '_ {
        self.ids.iter().copied()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.ids.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStateSet;
    use crate::slurm::SnapshotKind;

    fn snapshot(ids: &[u64]) -> Snapshot {
        let records = ids
            .iter()
            .map(|id| Record::new(*id, JobStateSet::parse("RUNNING")))
            .collect();
        Snapshot::new(SnapshotKind::Current, records, &[])
    }

    fn array_member(job_id: u64, array_id: u64, task: u64) -> Record {
        let mut r = Record::new(job_id, JobStateSet::parse("RUNNING"));
        r.array_job_id = Some(array_id);
        r.array_task_id = Some(task);
        r
    }

    #[test]
    fn test_reconcile_keeps_only_listed_ids() {
        let mut pending = PendingDeleteSet::new();
        pending.mark_pending(10);
        pending.mark_pending(20);
        pending.mark_pending(30);

        pending.reconcile(&snapshot(&[10, 30, 40]));
        assert_eq!(pending.iter().collect::<Vec<_>>(), vec![10, 30]);
    }

    #[test]
    fn test_reconcile_is_subset_of_both_inputs() {
        let cases: [(&[u64], &[u64]); 4] = [
            (&[], &[1, 2]),
            (&[1, 2], &[]),
            (&[1, 2, 3], &[2, 3, 4]),
            (&[5], &[5]),
        ];
        for (marked, listed) in cases {
            let mut pending = PendingDeleteSet::new();
            for id in marked {
                pending.mark_pending(*id);
            }
            let snap = snapshot(listed);
            pending.reconcile(&snap);

            let expected: Vec<u64> = marked
                .iter()
                .copied()
                .filter(|id| listed.contains(id))
                .collect();
            assert_eq!(pending.iter().collect::<Vec<_>>(), expected);
        }
    }

    #[test]
    fn test_mark_pending_reports_duplicates() {
        let mut pending = PendingDeleteSet::new();
        assert!(pending.mark_pending(42));
        assert!(!pending.mark_pending(42));
        assert_eq!(pending.len(), 1);
    }

    #[test]
    fn test_mark_pending_array_adds_all_members() {
        let records = vec![
            array_member(100, 100, 0),
            array_member(101, 100, 1),
            array_member(102, 100, 2),
            Record::new(200, JobStateSet::parse("RUNNING")),
        ];
        let snap = Snapshot::new(SnapshotKind::Current, records, &[]);
        let representative = snap.get(101).cloned().unwrap();

        let mut pending = PendingDeleteSet::new();
        assert_eq!(pending.mark_pending_array(&representative, &snap), 3);
        assert_eq!(pending.iter().collect::<Vec<_>>(), vec![100, 101, 102]);
        assert!(!pending.contains(200));
    }
}
