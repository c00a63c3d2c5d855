//! Job state types.
//!
//! Slurm reports a job's state as one token (`"RUNNING"`), a JSON list
//! (`["PENDING", "REQUEUED"]`), or, on some releases, a list that was
//! stringified on the way out (`"['RUNNING', 'COMPLETING']"`).
//! [`JobStateSet`] normalizes all three to an ordered token list; [`JobState`]
//! is the coarse classification used for coloring and counters.
//!
//! The `define_state_checkers!` macro generates `is_*()` methods from a
//! declarative list of state names.

use std::fmt;

use serde::{Deserialize, Deserializer};

// ============================================================================
// State Checker Macro
// ============================================================================

/// Macro to generate `is_*()` methods for state checking.
///
/// Each generated method calls `has_state()` with the listed state strings.
///
/// ```ignore
/// define_state_checkers! {
///     is_running => ["RUNNING"],
///     is_pending => ["PENDING", "PD"],
/// }
/// ```
macro_rules! define_state_checkers {
    ($($method:ident => [$($state:literal),+ $(,)?]),* $(,)?) => {
        $(
            #[must_use]
            pub fn $method(&self) -> bool {
                self.has_state(&[$($state),+])
            }
        )*
    }
}

// ============================================================================
// Job State Enum
// ============================================================================

/// Job state enum parsed from Slurm state strings.
///
/// This enum covers the Slurm **base** job states plus COMPLETING, which is
/// commonly shown instead of the base state. See:
/// https://slurm.schedmd.com/job_state_codes.html
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum JobState {
    #[default]
    Unknown,
    // Active states
    Running,
    Pending,
    Suspended,
    // Transitional flag
    Completing,
    // Successful completion
    Completed,
    // Termination states
    Cancelled,
    Failed,
    Timeout,
    Preempted,
    NodeFail,
    BootFail,
    Deadline,
    OutOfMemory,
}

impl JobState {
    /// Create a JobState from a single state string.
    ///
    /// Handles both full names (e.g., "RUNNING") and short codes (e.g., "R").
    /// Also handles state strings with additional info like "CANCELLED by 12345".
    #[must_use]
    pub fn from_state_string(state: &str) -> Self {
        match state.split_whitespace().next() {
            Some("RUNNING") | Some("R") => Self::Running,
            Some("PENDING") | Some("PD") => Self::Pending,
            Some("SUSPENDED") | Some("S") => Self::Suspended,
            Some("COMPLETING") | Some("CG") => Self::Completing,
            Some("COMPLETED") | Some("CD") => Self::Completed,
            Some("CANCELLED") | Some("CA") => Self::Cancelled,
            Some("FAILED") | Some("F") => Self::Failed,
            Some("TIMEOUT") | Some("TO") => Self::Timeout,
            Some("PREEMPTED") | Some("PR") => Self::Preempted,
            Some("NODE_FAIL") | Some("NF") => Self::NodeFail,
            Some("BOOT_FAIL") | Some("BF") => Self::BootFail,
            Some("DEADLINE") | Some("DL") => Self::Deadline,
            Some("OUT_OF_MEMORY") | Some("OOM") => Self::OutOfMemory,
            _ => Self::Unknown,
        }
    }

    /// Return the full Slurm state name.
    #[must_use]
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Unknown => "UNKNOWN",
            Self::Running => "RUNNING",
            Self::Pending => "PENDING",
            Self::Suspended => "SUSPENDED",
            Self::Completing => "COMPLETING",
            Self::Completed => "COMPLETED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::Timeout => "TIMEOUT",
            Self::Preempted => "PREEMPTED",
            Self::NodeFail => "NODE_FAIL",
            Self::BootFail => "BOOT_FAIL",
            Self::Deadline => "DEADLINE",
            Self::OutOfMemory => "OUT_OF_MEMORY",
        }
    }
}

// ============================================================================
// Job State Set
// ============================================================================

/// Ordered, non-empty list of state tokens reported for one job.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct JobStateSet(Vec<String>);

impl JobStateSet {
    #[cfg(test)]
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self(tokens.into_iter().map(Into::into).collect())
    }

    /// Parse a single string field.
    ///
    /// A value starting with `[` is read as a list literal. When the literal
    /// is malformed the raw string is kept as a single token, so parsing
    /// never fails.
    #[must_use]
    pub fn parse(raw: &str) -> Self {
        let trimmed = raw.trim();
        if trimmed.starts_with('[') {
            if let Some(tokens) = parse_list_literal(trimmed) {
                return Self(tokens);
            }
            tracing::debug!(raw, "unparsable state list, keeping raw token");
        }
        Self(vec![trimmed.to_string()])
    }

    #[cfg(test)]
    pub fn tokens(&self) -> &[String] {
        &self.0
    }

    /// Check if any of the given state names are present.
    #[must_use]
    pub fn has_state(&self, names: &[&str]) -> bool {
        self.0.iter().any(|token| names.contains(&token.as_str()))
    }

    #[cfg(test)]
    pub fn contains(&self, token: &str) -> bool {
        self.has_state(&[token])
    }

    /// The first recognizable state, used for coloring.
    #[must_use]
    pub fn primary(&self) -> JobState {
        self.0
            .iter()
            .map(|s| JobState::from_state_string(s))
            .find(|s| *s != JobState::Unknown)
            .unwrap_or_default()
    }

    define_state_checkers! {
        is_running => ["RUNNING", "R"],
        is_pending => ["PENDING", "PD"],
    }
}

impl fmt::Display for JobStateSet {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0.join(" "))
    }
}

/// Parse `['A', 'B']` / `["A"]` / `[A, B]`. Returns None on malformed input.
fn parse_list_literal(s: &str) -> Option<Vec<String>> {
    let inner = s.strip_prefix('[')?.strip_suffix(']')?;
    let mut tokens = Vec::new();
    for item in inner.split(',') {
        let item = item.trim();
        let unquoted = if item.len() >= 2
            && ((item.starts_with('\'') && item.ends_with('\''))
                || (item.starts_with('"') && item.ends_with('"')))
        {
            &item[1..item.len() - 1]
        } else {
            item
        };
        if unquoted.is_empty() || unquoted.contains(['\'', '"', '[', ']']) {
            return None;
        }
        tokens.push(unquoted.to_string());
    }
    if tokens.is_empty() { None } else { Some(tokens) }
}

#[derive(Deserialize)]
#[serde(untagged)]
enum StateRaw {
    One(String),
    Many(Vec<String>),
}

impl<'de> Deserialize<'de> for JobStateSet {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        Ok(match Option::<StateRaw>::deserialize(deserializer)? {
            Some(StateRaw::One(s)) => JobStateSet::parse(&s),
            Some(StateRaw::Many(v)) if !v.is_empty() => JobStateSet(v),
            _ => JobStateSet(vec![JobState::Unknown.as_str().to_string()]),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_state_string_codes() {
        assert_eq!(JobState::from_state_string("R"), JobState::Running);
        assert_eq!(JobState::from_state_string("PENDING"), JobState::Pending);
        assert_eq!(
            JobState::from_state_string("CANCELLED by 1234"),
            JobState::Cancelled
        );
        assert_eq!(JobState::from_state_string("WEIRD"), JobState::Unknown);
    }

    #[test]
    fn test_parse_single_token() {
        let set = JobStateSet::parse("RUNNING");
        assert_eq!(set.tokens(), ["RUNNING"]);
        assert!(set.is_running());
        assert!(!set.is_pending());
    }

    #[test]
    fn test_parse_stringified_list() {
        let set = JobStateSet::parse("['RUNNING', 'COMPLETING']");
        assert_eq!(set.tokens(), ["RUNNING", "COMPLETING"]);
        assert_eq!(set.to_string(), "RUNNING COMPLETING");

        let set = JobStateSet::parse(r#"["PENDING"]"#);
        assert!(set.is_pending());
    }

    #[test]
    fn test_malformed_list_degrades_to_raw_token() {
        let set = JobStateSet::parse("['RUNNING'");
        assert_eq!(set.tokens(), ["['RUNNING'"]);
        assert!(!set.is_running());

        let set = JobStateSet::parse("[]");
        assert_eq!(set.tokens(), ["[]"]);
    }

    #[test]
    fn test_deserialize_json_forms() {
        let set: JobStateSet = serde_json::from_str(r#""PENDING""#).unwrap();
        assert!(set.is_pending());

        let set: JobStateSet = serde_json::from_str(r#"["FAILED", "REQUEUED"]"#).unwrap();
        assert_eq!(set.primary(), JobState::Failed);
        assert!(set.contains("REQUEUED"));
    }

    #[test]
    fn test_primary_skips_unknown_flags() {
        let set = JobStateSet::new(["REQUEUED", "PENDING"]);
        assert_eq!(set.primary(), JobState::Pending);
    }
}
