//! Slurm API response wrappers.
//!
//! Jobs are kept as raw `serde_json::Value`s at this level so that the info
//! view can show the full object; the typed decode happens per job in
//! [`crate::slurm`].

use serde::Deserialize;
use serde_json::Value;

/// Trait for Slurm command responses that have an errors field.
///
/// This lets the generic command helper in `slurm.rs` reject responses that
/// parsed fine but report failures.
pub trait SlurmResponse {
    /// Human-readable errors reported by the Slurm command.
    fn errors(&self) -> Vec<String>;

    /// The raw job objects.
    fn into_jobs(self) -> Vec<Value>;
}

/// Slurm reports errors either as bare strings or as objects with a
/// `description` field, depending on the release.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum SlurmError {
    Message(String),
    Detail {
        #[serde(default)]
        description: String,
        #[serde(default)]
        error: String,
    },
}

impl SlurmError {
    #[must_use]
    pub fn message(&self) -> String {
        match self {
            SlurmError::Message(m) => m.clone(),
            SlurmError::Detail { description, error } if description.is_empty() => error.clone(),
            SlurmError::Detail { description, .. } => description.clone(),
        }
    }
}

/// Slurm API response wrapper for squeue and sacct
///
/// Both tools share the `{jobs, errors}` envelope. `jobs` is required: any
/// other top-level shape is a parse error.
#[derive(Debug, Deserialize)]
pub struct JobsResponse {
    pub jobs: Vec<Value>,

    #[serde(default)]
    pub errors: Vec<SlurmError>,
}

impl SlurmResponse for JobsResponse {
    fn errors(&self) -> Vec<String> {
        self.errors
            .iter()
            .map(SlurmError::message)
            .filter(|m| !m.is_empty())
            .collect()
    }

    fn into_jobs(self) -> Vec<Value> {
        self.jobs
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_errors_accept_both_shapes() {
        let resp: JobsResponse = serde_json::from_str(
            r#"{"jobs": [], "errors": ["plain", {"description": "detailed", "error_number": 1}]}"#,
        )
        .unwrap();
        assert_eq!(resp.errors(), vec!["plain", "detailed"]);
    }

    #[test]
    fn test_missing_jobs_is_an_error() {
        let result: Result<JobsResponse, _> = serde_json::from_str(r#"{"meta": {}}"#);
        assert!(result.is_err());
    }
}
