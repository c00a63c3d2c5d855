//! Job records and the raw squeue/sacct shapes they are decoded from.
//!
//! `squeue --json` and `sacct --json` describe the same job with different
//! layouts. Both are decoded into their own raw struct first and then
//! normalized into a [`Record`], which is what the rest of the crate sees.

use serde::Deserialize;
use serde_json::Value;

use super::state::JobStateSet;
use super::time::TimeValue;

/// One job observation.
#[derive(Debug, Clone, PartialEq)]
pub struct Record {
    pub job_id: u64,
    /// `Some(0)` means "reported, not an array"; `None` means not reported.
    pub array_job_id: Option<u64>,
    pub array_task_id: Option<u64>,
    pub name: String,
    pub partition: String,
    pub account: String,
    pub user_name: String,
    pub node_list: String,
    pub state: JobStateSet,
    pub state_reason: Option<String>,
    pub submit_time: Option<i64>,
    pub start_time: Option<i64>,
    pub end_time: Option<i64>,
    pub log_stdout_path: Option<String>,
    pub log_stderr_path: Option<String>,
    pub batch_host: Option<String>,
    /// The source object, kept verbatim for the info view.
    pub raw: Value,
}

impl Record {
    /// Minimal record for building fixtures.
    #[cfg(test)]
    pub fn new(job_id: u64, state: JobStateSet) -> Self {
        Self {
            job_id,
            array_job_id: None,
            array_task_id: None,
            name: String::new(),
            partition: String::new(),
            account: String::new(),
            user_name: String::new(),
            node_list: String::new(),
            state,
            state_reason: None,
            submit_time: None,
            start_time: None,
            end_time: None,
            log_stdout_path: None,
            log_stderr_path: None,
            batch_host: None,
            raw: Value::Null,
        }
    }

    #[must_use]
    pub fn is_running(&self) -> bool {
        self.state.is_running()
    }

    #[must_use]
    pub fn is_pending(&self) -> bool {
        self.state.is_pending()
    }

    /// True if Slurm reported an array id other than 0.
    #[must_use]
    pub fn has_array_job_id(&self) -> bool {
        matches!(self.array_job_id, Some(id) if id != 0)
    }
}

/// Empty strings mean "absent" in Slurm output.
fn non_empty(value: Option<String>) -> Option<String> {
    value.filter(|s| !s.is_empty())
}

// ============================================================================
// squeue
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct JobResources {
    #[serde(default)]
    pub nodes: Option<String>,
}

/// One element of `squeue --json`'s `jobs` array.
#[derive(Debug, Deserialize)]
pub struct SqueueJob {
    pub job_id: u64,

    #[serde(default)]
    pub array_job_id: TimeValue,

    #[serde(default)]
    pub array_task_id: TimeValue,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub partition: Option<String>,

    #[serde(default)]
    pub account: Option<String>,

    #[serde(default)]
    pub user_name: Option<String>,

    #[serde(default)]
    pub job_resources: Option<JobResources>,

    #[serde(default)]
    pub job_state: JobStateSet,

    #[serde(default)]
    pub state_reason: Option<String>,

    #[serde(default)]
    pub submit_time: TimeValue,

    #[serde(default)]
    pub start_time: TimeValue,

    #[serde(default)]
    pub end_time: TimeValue,

    #[serde(default)]
    pub standard_output: Option<String>,

    #[serde(default)]
    pub standard_error: Option<String>,

    #[serde(default)]
    pub batch_host: Option<String>,
}

impl SqueueJob {
    #[must_use]
    pub fn into_record(self, raw: Value) -> Record {
        Record {
            job_id: self.job_id,
            array_job_id: self.array_job_id.value(),
            array_task_id: self.array_task_id.value(),
            name: self.name.unwrap_or_default(),
            partition: self.partition.unwrap_or_default(),
            account: self.account.unwrap_or_default(),
            user_name: self.user_name.unwrap_or_default(),
            node_list: self
                .job_resources
                .and_then(|r| r.nodes)
                .unwrap_or_default(),
            state: self.job_state,
            state_reason: non_empty(self.state_reason).filter(|r| r != "None"),
            submit_time: self.submit_time.as_epoch(),
            start_time: self.start_time.as_epoch(),
            end_time: self.end_time.as_epoch(),
            log_stdout_path: non_empty(self.standard_output),
            log_stderr_path: non_empty(self.standard_error),
            batch_host: non_empty(self.batch_host),
            raw,
        }
    }
}

// ============================================================================
// sacct
// ============================================================================

#[derive(Debug, Default, Deserialize)]
pub struct SacctArray {
    #[serde(default)]
    pub job_id: TimeValue,
    #[serde(default)]
    pub task_id: TimeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct SacctTime {
    #[serde(default)]
    pub submission: TimeValue,
    #[serde(default)]
    pub start: TimeValue,
    #[serde(default)]
    pub end: TimeValue,
}

#[derive(Debug, Default, Deserialize)]
pub struct SacctState {
    #[serde(default)]
    pub current: JobStateSet,
    #[serde(default)]
    pub reason: Option<String>,
}

/// One element of `sacct --json`'s `jobs` array.
#[derive(Debug, Deserialize)]
pub struct SacctJob {
    pub job_id: u64,

    #[serde(default)]
    pub name: Option<String>,

    #[serde(default)]
    pub partition: Option<String>,

    #[serde(default)]
    pub account: Option<String>,

    #[serde(default)]
    pub user: Option<String>,

    #[serde(default)]
    pub array: SacctArray,

    #[serde(default)]
    pub time: SacctTime,

    #[serde(default)]
    pub state: SacctState,

    #[serde(default)]
    pub nodes: Option<String>,

    /// Only present from Slurm 24.05 on.
    #[serde(default)]
    pub stdout_expanded: Option<String>,

    #[serde(default)]
    pub stderr_expanded: Option<String>,
}

impl SacctJob {
    #[must_use]
    pub fn into_record(self, raw: Value) -> Record {
        Record {
            job_id: self.job_id,
            array_job_id: self.array.job_id.value(),
            array_task_id: self.array.task_id.value(),
            name: self.name.unwrap_or_default(),
            partition: self.partition.unwrap_or_default(),
            account: self.account.unwrap_or_default(),
            user_name: self.user.unwrap_or_default(),
            node_list: self.nodes.unwrap_or_default(),
            state: self.state.current,
            state_reason: non_empty(self.state.reason).filter(|r| r != "None"),
            submit_time: self.time.submission.as_epoch(),
            start_time: self.time.start.as_epoch(),
            end_time: self.time.end.as_epoch(),
            log_stdout_path: non_empty(self.stdout_expanded),
            log_stderr_path: non_empty(self.stderr_expanded),
            batch_host: None,
            raw,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn squeue(value: Value) -> Record {
        let job: SqueueJob = serde_json::from_value(value.clone()).unwrap();
        job.into_record(value)
    }

    #[test]
    fn test_squeue_job_new_style_fields() {
        let record = squeue(json!({
            "job_id": 1618871,
            "name": "model_pretrain",
            "account": "dmn@v100",
            "user_name": "www26kf",
            "partition": "gpu_p2",
            "job_state": "RUNNING",
            "state_reason": "None",
            "batch_host": "node-01",
            "job_resources": {"nodes": "node-01"},
            "array_job_id": {"set": true, "infinite": false, "number": 0},
            "array_task_id": {"set": false, "infinite": false, "number": 0},
            "submit_time": {"set": true, "infinite": false, "number": 1701982989},
            "start_time": 1701983394,
            "end_time": 0,
            "standard_output": "/tmp/out.log",
            "standard_error": ""
        }));

        assert_eq!(record.job_id, 1618871);
        assert_eq!(record.array_job_id, Some(0));
        assert!(!record.has_array_job_id());
        assert_eq!(record.array_task_id, None);
        assert_eq!(record.node_list, "node-01");
        assert_eq!(record.state_reason, None);
        assert_eq!(record.submit_time, Some(1701982989));
        assert_eq!(record.start_time, Some(1701983394));
        assert_eq!(record.end_time, None);
        assert_eq!(record.log_stdout_path.as_deref(), Some("/tmp/out.log"));
        assert_eq!(record.log_stderr_path, None);
        assert!(record.is_running());
    }

    #[test]
    fn test_squeue_job_without_resources_has_empty_node_list() {
        let record = squeue(json!({"job_id": 5, "job_state": ["PENDING"], "job_resources": null}));
        assert_eq!(record.node_list, "");
        assert!(record.is_pending());

        let record = squeue(json!({"job_id": 6, "job_state": "PENDING"}));
        assert_eq!(record.node_list, "");
    }

    #[test]
    fn test_squeue_job_requires_job_id() {
        let result: Result<SqueueJob, _> = serde_json::from_value(json!({"name": "x"}));
        assert!(result.is_err());
    }

    #[test]
    fn test_sacct_job_fields() {
        let value = json!({
            "job_id": 200,
            "name": "train",
            "user": "alice",
            "array": {"job_id": 199, "task_id": {"set": true, "infinite": false, "number": 1}},
            "time": {"submission": 100, "start": 160, "end": 400},
            "state": {"current": ["COMPLETED"], "reason": "None"},
            "nodes": "gpu[01-02]",
            "stdout_expanded": "/logs/train_200.out"
        });
        let job: SacctJob = serde_json::from_value(value.clone()).unwrap();
        let record = job.into_record(value);

        assert_eq!(record.array_job_id, Some(199));
        assert_eq!(record.array_task_id, Some(1));
        assert_eq!(record.user_name, "alice");
        assert_eq!(record.node_list, "gpu[01-02]");
        assert_eq!(record.start_time, Some(160));
        assert_eq!(record.state.to_string(), "COMPLETED");
        assert_eq!(record.log_stderr_path, None);
        assert_eq!(record.raw["name"], "train");
    }
}
