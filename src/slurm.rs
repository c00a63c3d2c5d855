//! Interface to Slurm commands using JSON output
//!
//! This module turns `squeue --json` (current jobs) and `sacct --json`
//! (historical jobs) into [`Snapshot`]s. The same parsing, account filter and
//! ordering apply whether the JSON comes from a live command or from canned
//! documents (mock mode).

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::process::Command;

use serde_json::Value;
use thiserror::Error;

use crate::formatting::Clock;
use crate::models::{JobsResponse, Record, SacctJob, Settings, SlurmResponse, SqueueJob};

const CANNED_SQUEUE: &str = include_str!("canned/squeue.json");
const CANNED_SACCT: &str = include_str!("canned/sacct.json");

// ============================================================================
// Binary discovery
// ============================================================================

/// How the Slurm binary path was resolved
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PathResolution {
    /// Explicitly configured via settings
    Configured,
    /// Auto-detected via PATH (found squeue in user's PATH)
    AutoDetected,
    /// Fell back to default /usr/bin and squeue was found there
    Fallback,
    /// Fell back to default /usr/bin but squeue was NOT found (likely misconfigured)
    FallbackUnverified,
}

/// Result of finding the Slurm binary path
#[derive(Debug, Clone)]
pub struct SlurmPathResult {
    pub path: PathBuf,
    pub resolution: PathResolution,
}

/// Find the directory containing Slurm binaries.
///
/// Resolution order:
/// 1. Explicit path from settings, if it is an existing directory.
/// 2. Auto-detect via PATH using the `which` crate to find `squeue`.
/// 3. Fallback to `/usr/bin`.
pub fn find_slurm_bin_path(config_path: Option<&Path>) -> SlurmPathResult {
    if let Some(path) = config_path {
        if path.is_dir() {
            return SlurmPathResult {
                path: path.to_path_buf(),
                resolution: PathResolution::Configured,
            };
        }
        tracing::warn!(
            path = %path.display(),
            "configured slurm_bin_path is not a directory, trying auto-detection"
        );
    }

    if let Ok(squeue_path) = which::which("squeue")
        && let Some(parent) = squeue_path.parent()
    {
        return SlurmPathResult {
            path: parent.to_path_buf(),
            resolution: PathResolution::AutoDetected,
        };
    }

    let fallback_path = PathBuf::from("/usr/bin");
    if fallback_path.join("squeue").exists() {
        SlurmPathResult {
            path: fallback_path,
            resolution: PathResolution::Fallback,
        }
    } else {
        tracing::warn!(
            path = %fallback_path.display(),
            "Slurm binaries not found in PATH or fallback directory, commands may fail"
        );
        SlurmPathResult {
            path: fallback_path,
            resolution: PathResolution::FallbackUnverified,
        }
    }
}

/// Get current username from environment
#[must_use]
pub fn get_current_user() -> String {
    std::env::var("USER")
        .or_else(|_| std::env::var("LOGNAME"))
        .unwrap_or_else(|_| {
            tracing::warn!("could not determine username from USER or LOGNAME");
            "unknown".to_string()
        })
}

// ============================================================================
// Snapshots
// ============================================================================

/// Which job listing a snapshot holds.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum SnapshotKind {
    Current,
    Historical,
}

impl SnapshotKind {
    /// Text shown when there is nothing to list.
    #[must_use]
    pub fn placeholder(self) -> &'static str {
        match self {
            SnapshotKind::Current => "No jobs running",
            SnapshotKind::Historical => "No jobs in the past window",
        }
    }

    #[must_use]
    pub fn tool(self) -> &'static str {
        match self {
            SnapshotKind::Current => "squeue",
            SnapshotKind::Historical => "sacct",
        }
    }
}

/// Query parameters for one fetch.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SnapshotMode {
    Current { all_users: bool },
    Historical { start: String, end: String },
}

impl SnapshotMode {
    #[must_use]
    pub fn kind(&self) -> SnapshotKind {
        match self {
            SnapshotMode::Current { .. } => SnapshotKind::Current,
            SnapshotMode::Historical { .. } => SnapshotKind::Historical,
        }
    }

    /// Build the query for `kind` from the current settings.
    #[must_use]
    pub fn for_kind(kind: SnapshotKind, settings: &Settings) -> Self {
        match kind {
            SnapshotKind::Current => SnapshotMode::Current {
                all_users: settings.check_all_jobs,
            },
            SnapshotKind::Historical => {
                let (start, end) = settings.history_window();
                SnapshotMode::Historical { start, end }
            }
        }
    }

    /// Command-line arguments for the query, excluding the binary.
    #[must_use]
    pub fn query_args(&self, user: &str, extra_args: &[String]) -> Vec<String> {
        let mut args = vec!["--json".to_string()];
        match self {
            SnapshotMode::Current { all_users } => {
                if !all_users {
                    args.push("-u".to_string());
                    args.push(user.to_string());
                }
            }
            SnapshotMode::Historical { start, end } => {
                args.extend([
                    "--starttime".to_string(),
                    start.clone(),
                    "--endtime".to_string(),
                    end.clone(),
                ]);
            }
        }
        args.extend(extra_args.iter().cloned());
        args
    }
}

/// Ordered, immutable set of records from one poll.
///
/// Current snapshots are ascending by job id, historical ones descending.
#[derive(Debug, Clone)]
pub struct Snapshot {
    records: Vec<Record>,
    ids: HashSet<u64>,
}

impl Snapshot {
    /// Build a snapshot: keep only `accounts` (if any), sort for `kind`, and
    /// collapse duplicate job ids (the last occurrence wins).
    #[must_use]
    pub fn new(kind: SnapshotKind, records: Vec<Record>, accounts: &[String]) -> Self {
        let mut records: Vec<Record> = records
            .into_iter()
            .filter(|r| accounts.is_empty() || accounts.contains(&r.account))
            .collect();

        match kind {
            SnapshotKind::Current => records.sort_by_key(|r| r.job_id),
            SnapshotKind::Historical => records.sort_by(|a, b| b.job_id.cmp(&a.job_id)),
        }

        let mut deduped: Vec<Record> = Vec::with_capacity(records.len());
        for record in records {
            match deduped.last_mut() {
                Some(last) if last.job_id == record.job_id => *last = record,
                _ => deduped.push(record),
            }
        }

        let ids = deduped.iter().map(|r| r.job_id).collect();
        Self {
            records: deduped,
            ids,
        }
    }

    #[must_use]
    pub fn records(&self) -> &[Record] {
        &self.records
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.records.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    #[must_use]
    pub fn contains(&self, job_id: u64) -> bool {
        self.ids.contains(&job_id)
    }

    #[cfg(test)]
    pub fn get(&self, job_id: u64) -> Option<&Record> {
        if !self.contains(job_id) {
            return None;
        }
        self.records.iter().find(|r| r.job_id == job_id)
    }

    #[must_use]
    pub fn running_count(&self) -> usize {
        self.records.iter().filter(|r| r.is_running()).count()
    }
}

// ============================================================================
// Errors
// ============================================================================

#[derive(Debug, Error)]
pub enum FetchError {
    /// The query ran but exited non-zero (typically: nothing to list).
    #[error("{message}")]
    NoData { message: String, detail: String },

    #[error("failed to run {tool}: {source}")]
    Spawn {
        tool: &'static str,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse {tool} JSON output: {source}")]
    Parse {
        tool: &'static str,
        #[source]
        source: serde_json::Error,
    },

    #[error("{tool} reported errors: {}", .errors.join("; "))]
    SlurmErrors {
        tool: &'static str,
        errors: Vec<String>,
    },

    #[error("could not read canned data '{}': {source}", .path.display())]
    Canned {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

impl FetchError {
    fn no_data(kind: SnapshotKind, detail: String) -> Self {
        let message = match kind {
            SnapshotKind::Current => "No Jobs are running!",
            SnapshotKind::Historical => "No jobs in the past window",
        };
        FetchError::NoData {
            message: message.to_string(),
            detail,
        }
    }
}

/// Decode a `{jobs, errors}` document into records of `kind`.
pub fn parse_jobs(kind: SnapshotKind, text: &str) -> Result<Vec<Record>, FetchError> {
    let tool = kind.tool();
    let response: JobsResponse =
        serde_json::from_str(text).map_err(|source| FetchError::Parse { tool, source })?;

    let errors = response.errors();
    if !errors.is_empty() {
        return Err(FetchError::SlurmErrors { tool, errors });
    }

    response
        .into_jobs()
        .into_iter()
        .map(|raw| decode_job(kind, raw))
        .collect::<Result<Vec<_>, _>>()
        .map_err(|source| FetchError::Parse { tool, source })
}

fn decode_job(kind: SnapshotKind, raw: Value) -> Result<Record, serde_json::Error> {
    Ok(match kind {
        SnapshotKind::Current => serde_json::from_value::<SqueueJob>(raw.clone())?.into_record(raw),
        SnapshotKind::Historical => {
            serde_json::from_value::<SacctJob>(raw.clone())?.into_record(raw)
        }
    })
}

// ============================================================================
// Data sources
// ============================================================================

/// Slurm interface for calling squeue/sacct/scancel
#[derive(Debug, Clone)]
pub struct SlurmInterface {
    /// Path to directory containing Slurm binaries
    pub slurm_bin_path: PathBuf,
    /// How the path was resolved (for diagnostics)
    resolution: PathResolution,
}

impl SlurmInterface {
    /// Create a new SlurmInterface. If `config_path` is given and valid, use
    /// it; otherwise auto-detect.
    pub fn with_config(config_path: Option<&Path>) -> Self {
        let result = find_slurm_bin_path(config_path);
        Self {
            slurm_bin_path: result.path,
            resolution: result.resolution,
        }
    }

    /// Returns true if Slurm binaries were not found at the fallback path,
    /// indicating that commands will likely fail.
    #[must_use]
    pub fn is_unverified_fallback(&self) -> bool {
        self.resolution == PathResolution::FallbackUnverified
    }

    #[must_use]
    pub fn binary(&self, tool: &str) -> PathBuf {
        self.slurm_bin_path.join(tool)
    }

    /// Run a query command and return its stdout.
    fn execute_query(&self, kind: SnapshotKind, args: &[String]) -> Result<String, FetchError> {
        let tool = kind.tool();
        let output = Command::new(self.binary(tool))
            .args(args)
            .output()
            .map_err(|source| FetchError::Spawn { tool, source })?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
            tracing::debug!(tool, status = ?output.status.code(), %stderr, "query exited non-zero");
            return Err(FetchError::no_data(kind, stderr));
        }

        Ok(String::from_utf8_lossy(&output.stdout).into_owned())
    }
}

/// Canned JSON documents used instead of live commands.
#[derive(Debug, Clone, Default)]
pub struct CannedSource {
    pub squeue_path: Option<PathBuf>,
    pub sacct_path: Option<PathBuf>,
}

impl CannedSource {
    fn document(&self, kind: SnapshotKind) -> Result<String, FetchError> {
        let (path, builtin) = match kind {
            SnapshotKind::Current => (&self.squeue_path, CANNED_SQUEUE),
            SnapshotKind::Historical => (&self.sacct_path, CANNED_SACCT),
        };
        match path {
            Some(path) => std::fs::read_to_string(path).map_err(|source| FetchError::Canned {
                path: path.clone(),
                source,
            }),
            None => Ok(builtin.to_string()),
        }
    }

    /// Newest submit time in the current-jobs dataset.
    pub fn latest_submit_time(&self) -> Option<i64> {
        let text = self.document(SnapshotKind::Current).ok()?;
        parse_jobs(SnapshotKind::Current, &text)
            .ok()?
            .iter()
            .filter_map(|r| r.submit_time)
            .max()
    }
}

#[derive(Debug, Clone)]
pub enum DataSource {
    Live(SlurmInterface),
    Canned(CannedSource),
}

/// Produces snapshots from whichever source the settings select.
#[derive(Debug, Clone)]
pub struct SnapshotFetcher {
    source: DataSource,
    user: String,
}

impl SnapshotFetcher {
    #[must_use]
    pub fn new(source: DataSource, user: String) -> Self {
        Self { source, user }
    }

    #[must_use]
    pub fn from_settings(settings: &Settings) -> Self {
        let source = if settings.mock {
            DataSource::Canned(CannedSource {
                squeue_path: settings.canned_squeue_path().map(PathBuf::from),
                sacct_path: settings.canned_sacct_path().map(PathBuf::from),
            })
        } else {
            DataSource::Live(SlurmInterface::with_config(
                settings.slurm_bin_dir().as_deref(),
            ))
        };
        Self::new(source, get_current_user())
    }

    #[must_use]
    pub fn source(&self) -> &DataSource {
        &self.source
    }

    #[must_use]
    pub fn is_mock(&self) -> bool {
        matches!(self.source, DataSource::Canned(_))
    }

    /// Wall clock for live data; pinned to the newest canned submit time otherwise.
    #[must_use]
    pub fn clock(&self) -> Clock {
        match &self.source {
            DataSource::Live(_) => Clock::Wall,
            DataSource::Canned(canned) => canned
                .latest_submit_time()
                .map_or(Clock::Wall, Clock::Pinned),
        }
    }

    /// Path of a Slurm tool such as `scancel`, or the bare name in mock mode.
    #[must_use]
    pub fn tool_path(&self, tool: &str) -> PathBuf {
        match &self.source {
            DataSource::Live(slurm) => slurm.binary(tool),
            DataSource::Canned(_) => PathBuf::from(tool),
        }
    }

    /// Run one query and build a snapshot from it.
    ///
    /// Blocking; run it on a blocking worker.
    pub fn fetch(
        &self,
        mode: &SnapshotMode,
        accounts: &[String],
        extra_args: &[String],
    ) -> Result<Snapshot, FetchError> {
        let kind = mode.kind();
        let text = match &self.source {
            DataSource::Live(slurm) => {
                let args = mode.query_args(&self.user, extra_args);
                tracing::debug!(tool = kind.tool(), ?args, "running query");
                slurm.execute_query(kind, &args)?
            }
            DataSource::Canned(canned) => canned.document(kind)?,
        };
        let records = parse_jobs(kind, &text)?;
        Ok(Snapshot::new(kind, records, accounts))
    }
}
