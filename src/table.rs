//! Table reconciliation.
//!
//! Every refresh replaces the snapshot wholesale. [`TableModel`] rebuilds the
//! columns and rows from it, settles the pending-delete set, recomputes the
//! title counters and keeps the cursor on the same row *index* (clamped to
//! the new row count). Keeping the index rather than the job id means the
//! cursor stays put on screen while jobs finish above it.

use crate::columns::{Column, SnapshotFacts, visible_columns};
use crate::formatting::{
    JobTimes, current_time_strings, historical_time_strings, layout, truncate_string,
};
use crate::models::{JobState, Record};
use crate::slurm::{Snapshot, SnapshotKind};
use crate::tracker::PendingDeleteSet;

const PENDING_DELETE_SUFFIX: &str = " (To be Deleted)";

/// Keep `old` if it still points at a row, otherwise select the last row.
#[must_use]
pub fn clamp_cursor(old: usize, row_count: usize) -> usize {
    if old < row_count {
        old
    } else {
        row_count.saturating_sub(1)
    }
}

/// Per-refresh rendering inputs.
#[derive(Debug, Clone, Copy)]
pub struct RenderContext {
    pub now: i64,
    pub all_users: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TableRow {
    /// `None` for the placeholder row.
    pub job_id: Option<u64>,
    pub cells: Vec<String>,
    pub state: JobState,
    pub pending_delete: bool,
}

impl TableRow {
    fn placeholder(kind: SnapshotKind, width: usize) -> Self {
        let mut cells = vec![String::new(); width.max(1)];
        cells[0] = kind.placeholder().to_string();
        Self {
            job_id: None,
            cells,
            state: JobState::Unknown,
            pending_delete: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct TableModel {
    kind: SnapshotKind,
    columns: Vec<Column>,
    rows: Vec<TableRow>,
    title: String,
    cursor: usize,
    snapshot: Option<Snapshot>,
    pending: PendingDeleteSet,
    loaded: bool,
}

impl TableModel {
    #[must_use]
    pub fn new(kind: SnapshotKind) -> Self {
        Self {
            kind,
            columns: visible_columns(kind, &SnapshotFacts::default()),
            rows: Vec::new(),
            title: String::new(),
            cursor: 0,
            snapshot: None,
            pending: PendingDeleteSet::new(),
            loaded: false,
        }
    }

    /// Apply a successful fetch: settle pending deletes and rebuild.
    pub fn apply_snapshot(&mut self, snapshot: Snapshot, ctx: &RenderContext) {
        self.pending.reconcile(&snapshot);
        self.snapshot = Some(snapshot);
        self.loaded = true;
        self.rebuild(ctx);
    }

    /// Apply a failed fetch: show the placeholder, leave pending deletes alone.
    pub fn apply_failure(&mut self, ctx: &RenderContext) {
        self.snapshot = None;
        self.loaded = true;
        self.rebuild(ctx);
    }

    /// Rebuild columns, rows, title and cursor from the current snapshot.
    pub fn rebuild(&mut self, ctx: &RenderContext) {
        let old_cursor = self.cursor;
        let snapshot = self.snapshot.as_ref();

        let facts = SnapshotFacts::from_snapshot(snapshot, ctx.all_users);
        self.columns = visible_columns(self.kind, &facts);

        self.rows = match snapshot {
            Some(snap) if !snap.is_empty() => snap
                .records()
                .iter()
                .map(|record| self.build_row(record, ctx))
                .collect(),
            _ => vec![TableRow::placeholder(self.kind, self.columns.len())],
        };

        self.title = self.build_title();
        self.cursor = clamp_cursor(old_cursor, self.rows.len());
    }

    fn build_row(&self, record: &Record, ctx: &RenderContext) -> TableRow {
        let pending_delete = self.pending.contains(record.job_id);
        let times = JobTimes {
            submit: record.submit_time,
            start: record.start_time,
            end: record.end_time,
        };
        let (start_cell, end_cell, submit_cell) = match self.kind {
            SnapshotKind::Current => {
                let (start, end) = current_time_strings(times, record.is_pending(), ctx.now);
                (start, end, String::new())
            }
            SnapshotKind::Historical => {
                let (submit, start, end) = historical_time_strings(times);
                (start, end, submit)
            }
        };

        let cells = self
            .columns
            .iter()
            .map(|column| match column {
                Column::JobId => record.job_id.to_string(),
                Column::ArrayId => match record.array_job_id {
                    Some(id) if id != 0 => id.to_string(),
                    _ => String::new(),
                },
                Column::ArrayIndex => record
                    .array_task_id
                    .map(|id| id.to_string())
                    .unwrap_or_default(),
                Column::Name => truncate_string(&record.name, layout::NAME_MAX_LEN),
                Column::NodeName => truncate_string(&record.node_list, layout::NODE_LIST_MAX_LEN),
                Column::Partition => record.partition.clone(),
                Column::StartOrSubmit | Column::StartTime => start_cell.clone(),
                Column::SubmitTime => submit_cell.clone(),
                Column::EndTime => end_cell.clone(),
                Column::State => {
                    let mut state = record.state.to_string();
                    if pending_delete {
                        state.push_str(PENDING_DELETE_SUFFIX);
                    }
                    state
                }
                Column::StateReason => record.state_reason.clone().unwrap_or_default(),
                Column::Account => record.account.clone(),
                Column::User => record.user_name.clone(),
            })
            .collect();

        TableRow {
            job_id: Some(record.job_id),
            cells,
            state: record.state.primary(),
            pending_delete,
        }
    }

    fn build_title(&self) -> String {
        let total = self.snapshot.as_ref().map_or(0, Snapshot::len);
        match self.kind {
            SnapshotKind::Current => {
                let running = self.snapshot.as_ref().map_or(0, Snapshot::running_count);
                let mut title = format!("{total} jobs ({running} running");
                if !self.pending.is_empty() {
                    title.push_str(&format!(", {} to be deleted", self.pending.len()));
                }
                title.push(')');
                title
            }
            SnapshotKind::Historical => format!("{total} jobs"),
        }
    }

    // ------------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------------

    #[must_use]
    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    #[must_use]
    pub fn rows(&self) -> &[TableRow] {
        &self.rows
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn cursor(&self) -> usize {
        self.cursor
    }

    /// True once the first fetch result (success or failure) was applied.
    #[must_use]
    pub fn is_loaded(&self) -> bool {
        self.loaded
    }

    #[must_use]
    pub fn snapshot(&self) -> Option<&Snapshot> {
        self.snapshot.as_ref()
    }

    #[must_use]
    pub fn pending(&self) -> &PendingDeleteSet {
        &self.pending
    }

    /// The snapshot and pending set together, for marking deletes.
    pub fn snapshot_and_pending_mut(&mut self) -> (Option<&Snapshot>, &mut PendingDeleteSet) {
        (self.snapshot.as_ref(), &mut self.pending)
    }

    /// Record under the cursor. `None` when only the placeholder is shown.
    #[must_use]
    pub fn selected_record(&self) -> Option<&Record> {
        self.snapshot.as_ref()?.records().get(self.cursor)
    }

    // ------------------------------------------------------------------------
    // Cursor movement
    // ------------------------------------------------------------------------

    pub fn move_up(&mut self) {
        self.cursor = self.cursor.saturating_sub(1);
    }

    pub fn move_down(&mut self) {
        self.cursor = clamp_cursor(self.cursor + 1, self.rows.len());
    }

    pub fn move_to_top(&mut self) {
        self.cursor = 0;
    }

    pub fn move_to_bottom(&mut self) {
        self.cursor = self.rows.len().saturating_sub(1);
    }

    pub fn page_up(&mut self, page: usize) {
        self.cursor = self.cursor.saturating_sub(page.max(1));
    }

    pub fn page_down(&mut self, page: usize) {
        self.cursor = clamp_cursor(self.cursor + page.max(1), self.rows.len());
    }
}
