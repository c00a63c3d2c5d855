//! User actions on the selected job.
//!
//! Planning is pure: `plan_*` functions check preconditions against the
//! record and return the [`ExternalCommand`] to run, or an [`ActionError`]
//! explaining why nothing will be run. Running the command (blocking, with
//! the terminal handed over) is left to the caller.

use std::fmt;
use std::io::{self, Write};
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use owo_colors::OwoColorize;
use serde_json::Value;
use thiserror::Error;

use crate::models::Record;
use crate::slurm::Snapshot;
use crate::tracker::PendingDeleteSet;

/// Lines of history `tail` prints before following.
const TAIL_LINES: &str = "10000";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogStream {
    Stdout,
    Stderr,
}

impl LogStream {
    #[must_use]
    pub fn label(self) -> &'static str {
        match self {
            LogStream::Stdout => "standard output",
            LogStream::Stderr => "standard error",
        }
    }

    fn path(self, record: &Record) -> Option<&str> {
        match self {
            LogStream::Stdout => record.log_stdout_path.as_deref(),
            LogStream::Stderr => record.log_stderr_path.as_deref(),
        }
    }
}

/// Why an action was refused. Nothing is executed for any of these.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ActionError {
    #[error("No jobs running")]
    NoJobs,

    #[error("Job {job_id} is in Waiting state, you cannot connect to it!!")]
    ConnectPending { job_id: u64 },

    #[error("Job {job_id} has no batch host to connect to")]
    NoBatchHost { job_id: u64 },

    #[error("Job {job_id} is in Pending state, no logs available!")]
    LogsPending { job_id: u64 },

    #[error("Job {job_id} has no {}!. This may be due to slurm version being < 24.05", .stream.label())]
    NoLogField { job_id: u64, stream: LogStream },

    #[error("Log file not created yet or not found!\n{}", .path.display())]
    LogMissing { path: PathBuf },

    #[error("Job {job_id} is already in the queue to be deleted!!")]
    AlreadyPending { job_id: u64 },
}

impl ActionError {
    /// True for the duplicate-request family (as opposed to a failed precondition).
    #[must_use]
    pub fn is_duplicate(&self) -> bool {
        matches!(self, ActionError::AlreadyPending { .. })
    }
}

/// A command handed to the outside world.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ExternalCommand {
    Ssh { host: String },
    Tail { path: PathBuf },
    Cancel { program: PathBuf, target: u64 },
    PrintJson { json: String },
}

impl ExternalCommand {
    /// Program and arguments. `PrintJson` has no process and returns an empty list.
    #[must_use]
    pub fn argv(&self) -> Vec<String> {
        match self {
            ExternalCommand::Ssh { host } => vec![
                "ssh".to_string(),
                "-o".to_string(),
                "StrictHostKeyChecking=no".to_string(),
                host.clone(),
            ],
            ExternalCommand::Tail { path } => vec![
                "tail".to_string(),
                "-n".to_string(),
                TAIL_LINES.to_string(),
                "-f".to_string(),
                path.display().to_string(),
            ],
            ExternalCommand::Cancel { program, target } => {
                vec![program.display().to_string(), target.to_string()]
            }
            ExternalCommand::PrintJson { .. } => Vec::new(),
        }
    }

    /// Run with the terminal handed over. Blocks until the child exits.
    ///
    /// In mock mode the command line is printed instead of executed.
    pub fn run_foreground(&self, mock: bool) -> Result<()> {
        if let ExternalCommand::PrintJson { json } = self {
            let value: Value = serde_json::from_str(json).context("Failed to re-read job JSON")?;
            println!("{}", colorize_json(&value));
            return wait_for_enter();
        }

        let argv = self.argv();
        if mock {
            println!("{self}");
            return wait_for_enter();
        }

        let Some((program, args)) = argv.split_first() else {
            return Ok(());
        };
        let status = Command::new(program)
            .args(args)
            .status()
            .with_context(|| format!("Failed to run {program}"))?;
        if !status.success() {
            tracing::info!(command = %self, code = ?status.code(), "foreground command exited non-zero");
        }
        Ok(())
    }

    /// Run without a terminal and return a status message.
    ///
    /// In mock mode nothing is executed.
    pub fn run_captured(&self, mock: bool) -> Result<String> {
        if mock {
            return Ok(format!("mock: {self}"));
        }
        let argv = self.argv();
        let Some((program, args)) = argv.split_first() else {
            return Ok(String::new());
        };
        let output = Command::new(program)
            .args(args)
            .output()
            .with_context(|| format!("Failed to run {program}"))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("{} failed: {}", program, stderr.trim());
        }
        Ok(match self {
            ExternalCommand::Cancel { target, .. } => format!("Cancel requested for job {target}"),
            _ => format!("{self} finished"),
        })
    }
}

/// Keep printed output on screen until the user is done reading it.
fn wait_for_enter() -> Result<()> {
    print!("\nPress Enter to return to slurmtui");
    io::stdout().flush()?;
    io::stdin()
        .read_line(&mut String::new())
        .context("Failed to read from stdin")?;
    Ok(())
}

impl fmt::Display for ExternalCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ExternalCommand::PrintJson { .. } => write!(f, "print job info"),
            _ => write!(f, "{}", self.argv().join(" ")),
        }
    }
}

// ============================================================================
// Planning
// ============================================================================

/// `ssh` into the job's batch host.
pub fn plan_connect(record: &Record) -> Result<ExternalCommand, ActionError> {
    if record.is_pending() {
        return Err(ActionError::ConnectPending {
            job_id: record.job_id,
        });
    }
    let host = record.batch_host.clone().ok_or(ActionError::NoBatchHost {
        job_id: record.job_id,
    })?;
    Ok(ExternalCommand::Ssh { host })
}

/// Follow one of the job's log files. `exists` is injected for testing.
pub fn plan_tail(
    record: &Record,
    stream: LogStream,
    exists: impl Fn(&Path) -> bool,
) -> Result<ExternalCommand, ActionError> {
    if record.is_pending() {
        return Err(ActionError::LogsPending {
            job_id: record.job_id,
        });
    }
    let path = stream.path(record).ok_or(ActionError::NoLogField {
        job_id: record.job_id,
        stream,
    })?;
    let path = PathBuf::from(path);
    if !exists(&path) {
        return Err(ActionError::LogMissing { path });
    }
    Ok(ExternalCommand::Tail { path })
}

/// Confirmation text for a delete request.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeletePrompt {
    pub message: String,
    /// Ask a second question about the whole array on "yes".
    pub is_array: bool,
}

pub const ARRAY_DELETE_QUESTION: &str =
    "This is an array job, do you want to delete all the jobs in the array?";

/// Check that a delete may be requested and build its confirmation prompt.
pub fn plan_delete(record: &Record, pending: &PendingDeleteSet) -> Result<DeletePrompt, ActionError> {
    if pending.contains(record.job_id) {
        return Err(ActionError::AlreadyPending {
            job_id: record.job_id,
        });
    }

    let mut message = format!(
        "\nAre you sure you want to delete this job?\n\nJob ID: {}\nJob Name: {}\n",
        record.job_id, record.name
    );
    if !record.node_list.is_empty() {
        message.push_str(&format!("Node Name: {}\n", record.node_list));
    }

    Ok(DeletePrompt {
        message,
        is_array: is_array_member(record),
    })
}

/// True if the job is one task of a job array.
///
/// A job whose array id is 0 is not in an array. Otherwise it is a member if
/// its task index is above 1 or its own id differs from the array id.
#[must_use]
pub fn is_array_member(record: &Record) -> bool {
    match record.array_job_id {
        None | Some(0) => false,
        Some(array_id) => record.array_task_id.is_some_and(|t| t > 1) || array_id != record.job_id,
    }
}

/// Mark the job (or its whole array) pending and return the `scancel` to run.
pub fn commit_delete(
    record: &Record,
    whole_array: bool,
    snapshot: Option<&Snapshot>,
    pending: &mut PendingDeleteSet,
    scancel: &Path,
) -> ExternalCommand {
    let target = match (whole_array, record.array_job_id, snapshot) {
        (true, Some(array_id), Some(snapshot)) if array_id != 0 => {
            pending.mark_pending_array(record, snapshot);
            array_id
        }
        _ => {
            pending.mark_pending(record.job_id);
            record.job_id
        }
    };
    tracing::info!(job_id = record.job_id, target, whole_array, "delete confirmed");
    ExternalCommand::Cancel {
        program: scancel.to_path_buf(),
        target,
    }
}

/// The record's source JSON, pretty-printed with four-space indentation.
#[must_use]
pub fn info_json(record: &Record) -> String {
    let mut buf = Vec::new();
    let formatter = serde_json::ser::PrettyFormatter::with_indent(b"    ");
    let mut ser = serde_json::Serializer::with_formatter(&mut buf, formatter);
    match serde::Serialize::serialize(&record.raw, &mut ser) {
        Ok(()) => String::from_utf8_lossy(&buf).into_owned(),
        Err(_) => record.raw.to_string(),
    }
}

/// Render JSON with terminal colors for printing outside the TUI.
fn colorize_json(value: &Value) -> String {
    let mut out = String::new();
    write_colored(value, 0, &mut out);
    out
}

fn write_colored(value: &Value, depth: usize, out: &mut String) {
    let pad = "    ".repeat(depth + 1);
    let close_pad = "    ".repeat(depth);
    match value {
        Value::Null => out.push_str(&"null".magenta().to_string()),
        Value::Bool(b) => out.push_str(&b.magenta().to_string()),
        Value::Number(n) => out.push_str(&n.cyan().to_string()),
        Value::String(s) => out.push_str(&Value::String(s.clone()).to_string().green().to_string()),
        Value::Array(items) if items.is_empty() => out.push_str("[]"),
        Value::Array(items) => {
            out.push_str("[\n");
            for (i, item) in items.iter().enumerate() {
                out.push_str(&pad);
                write_colored(item, depth + 1, out);
                if i + 1 < items.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&close_pad);
            out.push(']');
        }
        Value::Object(map) if map.is_empty() => out.push_str("{}"),
        Value::Object(map) => {
            out.push_str("{\n");
            for (i, (key, item)) in map.iter().enumerate() {
                out.push_str(&pad);
                out.push_str(&format!("{:?}", key).blue().bold().to_string());
                out.push_str(": ");
                write_colored(item, depth + 1, out);
                if i + 1 < map.len() {
                    out.push(',');
                }
                out.push('\n');
            }
            out.push_str(&close_pad);
            out.push('}');
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::JobStateSet;
    use crate::slurm::SnapshotKind;

    fn record(job_id: u64, state: &str) -> Record {
        Record::new(job_id, JobStateSet::parse(state))
    }

    fn array_member(job_id: u64, array_id: u64, task: u64) -> Record {
        let mut r = record(job_id, "RUNNING");
        r.array_job_id = Some(array_id);
        r.array_task_id = Some(task);
        r
    }

    #[test]
    fn test_connect_requires_running_job_with_host() {
        let pending = record(1, "PENDING");
        assert_eq!(
            plan_connect(&pending),
            Err(ActionError::ConnectPending { job_id: 1 })
        );
        assert_eq!(
            plan_connect(&pending).unwrap_err().to_string(),
            "Job 1 is in Waiting state, you cannot connect to it!!"
        );

        let mut running = record(2, "RUNNING");
        assert_eq!(plan_connect(&running), Err(ActionError::NoBatchHost { job_id: 2 }));
        running.batch_host = Some("gpu-07".into());
        let cmd = plan_connect(&running).unwrap();
        assert_eq!(cmd.to_string(), "ssh -o StrictHostKeyChecking=no gpu-07");
    }

    #[test]
    fn test_tail_preconditions() {
        let pending = record(1, "PENDING");
        assert_eq!(
            plan_tail(&pending, LogStream::Stdout, |_| true),
            Err(ActionError::LogsPending { job_id: 1 })
        );

        let mut job = record(2, "COMPLETED");
        let err = plan_tail(&job, LogStream::Stderr, |_| true).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Job 2 has no standard error!. This may be due to slurm version being < 24.05"
        );

        job.log_stdout_path = Some("/logs/job.out".into());
        let err = plan_tail(&job, LogStream::Stdout, |_| false).unwrap_err();
        assert_eq!(err.to_string(), "Log file not created yet or not found!\n/logs/job.out");

        let cmd = plan_tail(&job, LogStream::Stdout, |p| p == Path::new("/logs/job.out")).unwrap();
        assert_eq!(cmd.to_string(), "tail -n 10000 -f /logs/job.out");
    }

    #[test]
    fn test_is_array_member() {
        let mut plain = record(10, "RUNNING");
        assert!(!is_array_member(&plain));
        plain.array_job_id = Some(0);
        assert!(!is_array_member(&plain));

        // The first task of an array carries the array's own id
        assert!(!is_array_member(&array_member(100, 100, 0)));
        assert!(!is_array_member(&array_member(100, 100, 1)));
        assert!(is_array_member(&array_member(100, 100, 2)));
        assert!(is_array_member(&array_member(101, 100, 1)));
    }

    #[test]
    fn test_plan_delete_prompt() {
        let mut job = record(7, "RUNNING");
        job.name = "train".into();
        job.node_list = "gpu-01".into();
        let prompt = plan_delete(&job, &PendingDeleteSet::new()).unwrap();
        assert!(prompt.message.contains("Are you sure you want to delete this job?"));
        assert!(prompt.message.contains("Job ID: 7\n"));
        assert!(prompt.message.contains("Job Name: train\n"));
        assert!(prompt.message.contains("Node Name: gpu-01\n"));
        assert!(!prompt.is_array);

        job.node_list.clear();
        let prompt = plan_delete(&job, &PendingDeleteSet::new()).unwrap();
        assert!(!prompt.message.contains("Node Name"));
    }

    #[test]
    fn test_plan_delete_rejects_duplicates() {
        let job = record(7, "RUNNING");
        let mut pending = PendingDeleteSet::new();
        pending.mark_pending(7);
        let err = plan_delete(&job, &pending).unwrap_err();
        assert!(err.is_duplicate());
        assert_eq!(err.to_string(), "Job 7 is already in the queue to be deleted!!");
    }

    #[test]
    fn test_commit_array_delete_marks_all_members() {
        let snap = Snapshot::new(
            SnapshotKind::Current,
            vec![
                array_member(100, 100, 0),
                array_member(101, 100, 1),
                array_member(102, 100, 2),
            ],
            &[],
        );
        let representative = snap.get(101).cloned().unwrap();
        let mut pending = PendingDeleteSet::new();

        let cmd = commit_delete(&representative, true, Some(&snap), &mut pending, Path::new("scancel"));

        assert_eq!(cmd.to_string(), "scancel 100");
        assert_eq!(pending.iter().collect::<Vec<_>>(), vec![100, 101, 102]);
    }

    #[test]
    fn test_commit_single_delete_from_array() {
        let snap = Snapshot::new(
            SnapshotKind::Current,
            vec![array_member(100, 100, 0), array_member(101, 100, 1)],
            &[],
        );
        let representative = snap.get(101).cloned().unwrap();
        let mut pending = PendingDeleteSet::new();

        let cmd = commit_delete(&representative, false, Some(&snap), &mut pending, Path::new("scancel"));

        assert_eq!(cmd.to_string(), "scancel 101");
        assert_eq!(pending.iter().collect::<Vec<_>>(), vec![101]);
    }

    #[test]
    fn test_mock_cancel_is_not_executed() {
        let cmd = ExternalCommand::Cancel {
            program: PathBuf::from("/nonexistent/scancel"),
            target: 5,
        };
        assert_eq!(cmd.run_captured(true).unwrap(), "mock: /nonexistent/scancel 5");
    }

    #[test]
    fn test_info_json_uses_four_space_indent() {
        let mut job = record(1, "RUNNING");
        job.raw = serde_json::json!({"job_id": 1, "name": "x"});
        let json = info_json(&job);
        assert!(json.contains("\n    \"job_id\": 1"));

        let colored = colorize_json(&job.raw);
        assert!(colored.contains("job_id"));
    }
}
