//! Data models for Slurm JSON responses.
//!
//! This module provides the job record decoded from `squeue`/`sacct`, the
//! numeric and state wrappers Slurm uses inside those documents, and the
//! persisted user settings.

mod record;
mod responses;
mod settings;
mod state;
mod time;

pub use record::{Record, SacctJob, SqueueJob};
pub use responses::{JobsResponse, SlurmResponse};
pub use settings::{SETTING_FIELDS, SettingField, Settings, SettingsError};
pub use state::JobState;
#[cfg(test)]
pub use state::JobStateSet;
