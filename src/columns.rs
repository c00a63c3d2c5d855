//! Which table columns are shown.
//!
//! Each view has a fixed column layout. Some columns are conditional: the
//! array columns appear only when some job belongs to an array, the reason
//! column only when some job has a reason, and the user column only when
//! listing every user's jobs. Visibility is recomputed from scratch on every
//! refresh and depends on nothing but [`SnapshotFacts`].

use crate::slurm::{Snapshot, SnapshotKind};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Column {
    JobId,
    ArrayId,
    ArrayIndex,
    Name,
    NodeName,
    Partition,
    StartOrSubmit,
    SubmitTime,
    StartTime,
    EndTime,
    State,
    StateReason,
    Account,
    User,
}

impl Column {
    #[must_use]
    pub fn header(self) -> &'static str {
        match self {
            Column::JobId => "Job id",
            Column::ArrayId => "Arr. ID",
            Column::ArrayIndex => "Arr. Idx",
            Column::Name => "Name",
            Column::NodeName => "Node Name",
            Column::Partition => "Partition",
            Column::StartOrSubmit => "Start/Sub. Time",
            Column::SubmitTime => "Submit Time",
            Column::StartTime => "Start Time",
            Column::EndTime => "End Time",
            Column::State => "State",
            Column::StateReason => "State Reason",
            Column::Account => "Account",
            Column::User => "User",
        }
    }
}

/// When a column is shown.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    Always,
    WhenArray,
    WhenReason,
    WhenAllUsers,
}

const CURRENT_LAYOUT: &[(Column, Policy)] = &[
    (Column::JobId, Policy::Always),
    (Column::ArrayId, Policy::WhenArray),
    (Column::ArrayIndex, Policy::WhenArray),
    (Column::Name, Policy::Always),
    (Column::NodeName, Policy::Always),
    (Column::Partition, Policy::Always),
    (Column::StartOrSubmit, Policy::Always),
    (Column::EndTime, Policy::Always),
    (Column::State, Policy::Always),
    (Column::StateReason, Policy::WhenReason),
    (Column::Account, Policy::Always),
    (Column::User, Policy::WhenAllUsers),
];

const HISTORICAL_LAYOUT: &[(Column, Policy)] = &[
    (Column::JobId, Policy::Always),
    (Column::ArrayId, Policy::WhenArray),
    (Column::ArrayIndex, Policy::WhenArray),
    (Column::Name, Policy::Always),
    (Column::NodeName, Policy::Always),
    (Column::Partition, Policy::Always),
    (Column::SubmitTime, Policy::Always),
    (Column::StartTime, Policy::Always),
    (Column::EndTime, Policy::Always),
    (Column::State, Policy::Always),
    (Column::Account, Policy::Always),
];

#[must_use]
pub fn layout(kind: SnapshotKind) -> &'static [(Column, Policy)] {
    match kind {
        SnapshotKind::Current => CURRENT_LAYOUT,
        SnapshotKind::Historical => HISTORICAL_LAYOUT,
    }
}

/// The inputs column visibility depends on.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SnapshotFacts {
    pub has_array: bool,
    pub has_reason: bool,
    pub all_users: bool,
}

impl SnapshotFacts {
    /// Derive facts from a snapshot; `None` (failed fetch) has no records.
    #[must_use]
    pub fn from_snapshot(snapshot: Option<&Snapshot>, all_users: bool) -> Self {
        let records = snapshot.map(Snapshot::records).unwrap_or_default();
        Self {
            has_array: records
                .iter()
                .any(|r| r.has_array_job_id() || r.array_task_id.is_some()),
            has_reason: records.iter().any(|r| r.state_reason.is_some()),
            all_users,
        }
    }
}

impl Policy {
    fn admits(self, facts: &SnapshotFacts) -> bool {
        match self {
            Policy::Always => true,
            Policy::WhenArray => facts.has_array,
            Policy::WhenReason => facts.has_reason,
            Policy::WhenAllUsers => facts.all_users,
        }
    }
}

/// Ordered visible columns for `kind` given `facts`.
#[must_use]
pub fn visible_columns(kind: SnapshotKind, facts: &SnapshotFacts) -> Vec<Column> {
    layout(kind)
        .iter()
        .filter(|(_, policy)| policy.admits(facts))
        .map(|(column, _)| *column)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{JobStateSet, Record};

    fn headers(columns: &[Column]) -> Vec<&'static str> {
        columns.iter().map(|c| c.header()).collect()
    }

    #[test]
    fn test_current_defaults() {
        let columns = visible_columns(SnapshotKind::Current, &SnapshotFacts::default());
        assert_eq!(
            headers(&columns),
            vec![
                "Job id",
                "Name",
                "Node Name",
                "Partition",
                "Start/Sub. Time",
                "End Time",
                "State",
                "Account"
            ]
        );
    }

    #[test]
    fn test_all_flags_show_every_current_column() {
        let facts = SnapshotFacts {
            has_array: true,
            has_reason: true,
            all_users: true,
        };
        let columns = visible_columns(SnapshotKind::Current, &facts);
        assert_eq!(columns.len(), CURRENT_LAYOUT.len());
        assert_eq!(columns[1], Column::ArrayId);
        assert_eq!(columns.last(), Some(&Column::User));
    }

    #[test]
    fn test_history_has_no_reason_or_user_column() {
        let facts = SnapshotFacts {
            has_array: false,
            has_reason: true,
            all_users: true,
        };
        let columns = visible_columns(SnapshotKind::Historical, &facts);
        assert!(!columns.contains(&Column::StateReason));
        assert!(!columns.contains(&Column::User));
        assert!(columns.contains(&Column::SubmitTime));
    }

    #[test]
    fn test_visibility_depends_only_on_facts() {
        // Two different snapshots with the same facts give the same columns.
        let mut a = Record::new(1, JobStateSet::parse("PENDING"));
        a.state_reason = Some("Priority".into());
        let mut b = Record::new(99, JobStateSet::parse("RUNNING"));
        b.state_reason = Some("Resources".into());
        b.name = "other".into();

        let snap_a = Snapshot::new(SnapshotKind::Current, vec![a], &[]);
        let snap_b = Snapshot::new(SnapshotKind::Current, vec![b], &[]);
        let facts_a = SnapshotFacts::from_snapshot(Some(&snap_a), false);
        let facts_b = SnapshotFacts::from_snapshot(Some(&snap_b), false);

        assert_eq!(facts_a, facts_b);
        assert_eq!(
            visible_columns(SnapshotKind::Current, &facts_a),
            visible_columns(SnapshotKind::Current, &facts_b)
        );
    }

    #[test]
    fn test_array_fact_ignores_zero_array_id() {
        let mut plain = Record::new(1, JobStateSet::parse("RUNNING"));
        plain.array_job_id = Some(0);
        let snap = Snapshot::new(SnapshotKind::Current, vec![plain], &[]);
        assert!(!SnapshotFacts::from_snapshot(Some(&snap), false).has_array);

        let mut task = Record::new(2, JobStateSet::parse("RUNNING"));
        task.array_task_id = Some(0);
        let snap = Snapshot::new(SnapshotKind::Current, vec![task], &[]);
        assert!(SnapshotFacts::from_snapshot(Some(&snap), false).has_array);
    }

    #[test]
    fn test_failed_fetch_keeps_config_driven_columns() {
        let facts = SnapshotFacts::from_snapshot(None, true);
        let columns = visible_columns(SnapshotKind::Current, &facts);
        assert!(columns.contains(&Column::User));
        assert!(!columns.contains(&Column::ArrayId));
    }
}
