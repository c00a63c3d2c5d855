//! Persistent user settings.
//!
//! Settings live in a flat TOML file. Keys that are missing from an existing
//! file are backfilled with defaults and the file is rewritten, so the file
//! on disk always lists every option.
//!
//! Optional text and list values use an empty string / empty list to mean
//! "not set". That is distinct from `0` and `false`.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Minimum allowed refresh interval in seconds (prevents tight polling loops)
const MIN_UPDATE_INTERVAL: u64 = 1;

/// Refresh slowdown applied when listing every user's jobs
const ALL_JOBS_INTERVAL_FACTOR: u64 = 5;

const DEFAULT_HISTORY_START: &str = "now-7days";
const DEFAULT_HISTORY_END: &str = "now";

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("could not read settings file '{path}'")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse settings file '{path}'")]
    Parse {
        path: PathBuf,
        #[source]
        source: toml::de::Error,
    },

    #[error("could not write settings file '{path}'")]
    Write {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to serialize settings")]
    Serialize(#[from] toml::ser::Error),

    #[error("{0}")]
    Invalid(String),
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize, Serialize)]
#[serde(default)]
pub struct Settings {
    /// Use canned data instead of calling Slurm
    pub mock: bool,

    /// Refresh interval in seconds
    pub update_interval: u64,

    /// Show jobs from every user
    pub check_all_jobs: bool,

    /// Canned squeue response used in mock mode
    pub fake_queue_json_path: String,

    /// Extra arguments forwarded to squeue and sacct
    pub squeue_args: Vec<String>,

    /// Only keep jobs charged to these accounts (empty = all)
    pub accounts: Vec<String>,

    /// `sacct --starttime` for the history view
    pub old_jobs_start_time: String,

    /// `sacct --endtime` for the history view
    pub old_jobs_end_time: String,

    pub debug_squeue_json_path: String,

    pub debug_sacct_json_path: String,

    /// Directory containing Slurm binaries. Empty means search PATH.
    pub slurm_bin_path: String,

    /// Theme name
    pub theme: String,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            mock: false,
            update_interval: 10,
            check_all_jobs: false,
            fake_queue_json_path: String::new(),
            squeue_args: Vec::new(),
            accounts: Vec::new(),
            old_jobs_start_time: String::new(),
            old_jobs_end_time: String::new(),
            debug_squeue_json_path: String::new(),
            debug_sacct_json_path: String::new(),
            slurm_bin_path: String::new(),
            theme: "dark".to_string(),
        }
    }
}

fn non_empty(s: &str) -> Option<&str> {
    if s.is_empty() { None } else { Some(s) }
}

impl Settings {
    /// Get the settings file path.
    ///
    /// Resolution order:
    /// 1. $SLURMTUI_SETTINGS
    /// 2. $XDG_CONFIG_HOME/slurmtui/settings.toml (if XDG_CONFIG_HOME is set)
    /// 3. $HOME/.config/slurmtui/settings.toml (if HOME is set)
    /// 4. dirs::config_dir()/slurmtui/settings.toml
    #[must_use]
    pub fn default_path() -> Option<PathBuf> {
        if let Ok(path) = std::env::var("SLURMTUI_SETTINGS")
            && !path.is_empty()
        {
            return Some(PathBuf::from(path));
        }

        if let Ok(xdg_config) = std::env::var("XDG_CONFIG_HOME")
            && !xdg_config.is_empty()
        {
            return Some(PathBuf::from(xdg_config).join("slurmtui/settings.toml"));
        }

        if let Some(home) = std::env::var_os("HOME") {
            return Some(PathBuf::from(home).join(".config/slurmtui/settings.toml"));
        }

        dirs::config_dir().map(|dir| dir.join("slurmtui/settings.toml"))
    }

    /// Check if strict config mode is enabled via SLURMTUI_STRICT_CONFIG
    #[must_use]
    pub fn is_strict_mode() -> bool {
        std::env::var("SLURMTUI_STRICT_CONFIG")
            .map(|v| v == "1" || v.eq_ignore_ascii_case("true"))
            .unwrap_or(false)
    }

    /// Load settings from `path`, creating or backfilling the file as needed.
    ///
    /// Returns the settings and warnings to show in the status bar. In strict
    /// mode, parse and validation problems are errors instead of warnings.
    pub fn load(path: &Path, strict: bool) -> Result<(Self, Vec<String>), SettingsError> {
        let mut warnings = Vec::new();

        let mut settings = match std::fs::read_to_string(path) {
            Ok(content) => match Self::parse_and_backfill(&content) {
                Ok((settings, missing)) => {
                    if !missing.is_empty() {
                        tracing::warn!(
                            path = %path.display(),
                            keys = ?missing,
                            "settings file is missing keys, filling in defaults"
                        );
                        settings.save(path)?;
                    }
                    settings
                }
                Err(source) => {
                    if strict {
                        return Err(SettingsError::Parse {
                            path: path.to_path_buf(),
                            source,
                        });
                    }
                    warnings.push(format!(
                        "Settings parse error in '{}': {} - using defaults",
                        path.display(),
                        source.message()
                    ));
                    Self::default()
                }
            },
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                let settings = Self::default();
                tracing::info!(path = %path.display(), "creating default settings file");
                settings.save(path)?;
                settings
            }
            Err(source) => {
                if strict {
                    return Err(SettingsError::Read {
                        path: path.to_path_buf(),
                        source,
                    });
                }
                warnings.push(format!("Could not read settings '{}': {}", path.display(), source));
                Self::default()
            }
        };

        settings.apply_env_overrides();
        warnings.extend(settings.validate(strict)?);
        Ok((settings, warnings))
    }

    /// Parse a settings document and report which known keys it lacked.
    fn parse_and_backfill(content: &str) -> Result<(Self, Vec<String>), toml::de::Error> {
        let table: toml::Table = toml::from_str(content)?;
        let settings: Settings = toml::from_str(content)?;

        let missing = Self::default_keys()
            .into_iter()
            .filter(|key| !table.contains_key(key))
            .collect();

        Ok((settings, missing))
    }

    /// Every key a complete settings file carries.
    fn default_keys() -> Vec<String> {
        toml::to_string(&Self::default())
            .ok()
            .and_then(|doc| toml::from_str::<toml::Table>(&doc).ok())
            .map(|table| table.keys().cloned().collect())
            .unwrap_or_default()
    }

    /// Write the settings file, creating parent directories.
    pub fn save(&self, path: &Path) -> Result<(), SettingsError> {
        let content = toml::to_string_pretty(self)?;
        if let Some(parent) = path.parent()
            && !parent.as_os_str().is_empty()
        {
            std::fs::create_dir_all(parent).map_err(|source| SettingsError::Write {
                path: path.to_path_buf(),
                source,
            })?;
        }
        std::fs::write(path, content).map_err(|source| SettingsError::Write {
            path: path.to_path_buf(),
            source,
        })
    }

    /// Validate settings values.
    /// Returns a list of warnings for invalid values that were corrected to defaults.
    /// If `strict` is true, returns Err instead of correcting values.
    pub fn validate(&mut self, strict: bool) -> Result<Vec<String>, SettingsError> {
        let mut warnings = Vec::new();
        let defaults = Self::default();

        if self.update_interval < MIN_UPDATE_INTERVAL {
            let msg = format!(
                "update_interval must be at least {MIN_UPDATE_INTERVAL} second(s), got {}",
                self.update_interval
            );
            if strict {
                return Err(SettingsError::Invalid(msg));
            }
            warnings.push(format!("{msg} - using default ({})", defaults.update_interval));
            self.update_interval = defaults.update_interval;
        }

        if !matches!(self.theme.as_str(), "dark" | "light") {
            let msg = format!("unknown theme '{}'", self.theme);
            if strict {
                return Err(SettingsError::Invalid(msg));
            }
            warnings.push(format!("{msg} - using default ({})", defaults.theme));
            self.theme = defaults.theme;
        }

        Ok(warnings)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var("SLURMTUI_THEME")
            && !val.is_empty()
        {
            self.theme = val;
        }
    }

    /// Effective refresh period. Listing every user's jobs is much heavier
    /// on slurmctld, so the interval is stretched in that mode.
    #[must_use]
    pub fn refresh_interval(&self) -> Duration {
        let secs = self.update_interval.max(MIN_UPDATE_INTERVAL);
        if self.check_all_jobs {
            Duration::from_secs(secs * ALL_JOBS_INTERVAL_FACTOR)
        } else {
            Duration::from_secs(secs)
        }
    }

    /// Canned squeue document for mock mode, if one is configured.
    #[must_use]
    pub fn canned_squeue_path(&self) -> Option<&str> {
        non_empty(&self.fake_queue_json_path).or_else(|| non_empty(&self.debug_squeue_json_path))
    }

    #[must_use]
    pub fn canned_sacct_path(&self) -> Option<&str> {
        non_empty(&self.debug_sacct_json_path)
    }

    /// `(start, end)` arguments for the history query.
    #[must_use]
    pub fn history_window(&self) -> (String, String) {
        (
            non_empty(&self.old_jobs_start_time)
                .unwrap_or(DEFAULT_HISTORY_START)
                .to_string(),
            non_empty(&self.old_jobs_end_time)
                .unwrap_or(DEFAULT_HISTORY_END)
                .to_string(),
        )
    }

    #[must_use]
    pub fn slurm_bin_dir(&self) -> Option<PathBuf> {
        non_empty(&self.slurm_bin_path).map(PathBuf::from)
    }
}

// ============================================================================
// Text editing
// ============================================================================

/// How a settings value is edited as text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FieldKind {
    Bool,
    Integer,
    Text,
    /// Whitespace separated arguments
    Args,
    /// Comma separated names
    List,
}

/// Descriptor for one editable settings key.
#[derive(Debug, Clone, Copy)]
pub struct SettingField {
    pub key: &'static str,
    pub kind: FieldKind,
    pub description: &'static str,
}

pub const SETTING_FIELDS: &[SettingField] = &[
    SettingField {
        key: "mock",
        kind: FieldKind::Bool,
        description: "Use canned data instead of calling Slurm",
    },
    SettingField {
        key: "update_interval",
        kind: FieldKind::Integer,
        description: "Refresh interval in seconds (x5 when listing all users)",
    },
    SettingField {
        key: "check_all_jobs",
        kind: FieldKind::Bool,
        description: "List jobs from every user",
    },
    SettingField {
        key: "fake_queue_json_path",
        kind: FieldKind::Text,
        description: "Canned squeue JSON used in mock mode",
    },
    SettingField {
        key: "squeue_args",
        kind: FieldKind::Args,
        description: "Extra arguments passed to squeue and sacct",
    },
    SettingField {
        key: "accounts",
        kind: FieldKind::List,
        description: "Only show jobs from these accounts (comma separated)",
    },
    SettingField {
        key: "old_jobs_start_time",
        kind: FieldKind::Text,
        description: "History window start (default now-7days)",
    },
    SettingField {
        key: "old_jobs_end_time",
        kind: FieldKind::Text,
        description: "History window end (default now)",
    },
    SettingField {
        key: "debug_squeue_json_path",
        kind: FieldKind::Text,
        description: "Fallback canned squeue JSON for mock mode",
    },
    SettingField {
        key: "debug_sacct_json_path",
        kind: FieldKind::Text,
        description: "Canned sacct JSON for mock mode",
    },
    SettingField {
        key: "slurm_bin_path",
        kind: FieldKind::Text,
        description: "Directory with Slurm binaries (empty = search PATH)",
    },
    SettingField {
        key: "theme",
        kind: FieldKind::Text,
        description: "Color theme: dark or light",
    },
];

/// Words that clear an optional value.
fn is_unset(text: &str) -> bool {
    matches!(text.trim(), "" | "None" | "null")
}

impl Settings {
    /// Current value of `key` rendered for editing.
    #[must_use]
    pub fn field_text(&self, key: &str) -> String {
        match key {
            "mock" => self.mock.to_string(),
            "update_interval" => self.update_interval.to_string(),
            "check_all_jobs" => self.check_all_jobs.to_string(),
            "fake_queue_json_path" => self.fake_queue_json_path.clone(),
            "squeue_args" => self.squeue_args.join(" "),
            "accounts" => self.accounts.join(","),
            "old_jobs_start_time" => self.old_jobs_start_time.clone(),
            "old_jobs_end_time" => self.old_jobs_end_time.clone(),
            "debug_squeue_json_path" => self.debug_squeue_json_path.clone(),
            "debug_sacct_json_path" => self.debug_sacct_json_path.clone(),
            "slurm_bin_path" => self.slurm_bin_path.clone(),
            "theme" => self.theme.clone(),
            _ => String::new(),
        }
    }

    /// Parse `text` into `key`.
    pub fn set_field_text(&mut self, key: &str, text: &str) -> Result<(), SettingsError> {
        let Some(field) = SETTING_FIELDS.iter().find(|f| f.key == key) else {
            return Err(SettingsError::Invalid(format!("unknown setting '{key}'")));
        };
        let unset = is_unset(text);
        let text = text.trim();

        match field.kind {
            FieldKind::Bool => {
                let value = !unset && text.eq_ignore_ascii_case("true");
                match key {
                    "mock" => self.mock = value,
                    _ => self.check_all_jobs = value,
                }
            }
            FieldKind::Integer => {
                self.update_interval = if unset {
                    Self::default().update_interval
                } else {
                    text.parse().map_err(|_| {
                        SettingsError::Invalid(format!("{key} expects a whole number, got '{text}'"))
                    })?
                };
            }
            FieldKind::Args => {
                self.squeue_args = if unset {
                    Vec::new()
                } else {
                    text.split_whitespace().map(str::to_string).collect()
                };
            }
            FieldKind::List => {
                self.accounts = if unset {
                    Vec::new()
                } else {
                    text.split(|c: char| c == ',' || c.is_whitespace())
                        .filter(|s| !s.is_empty())
                        .map(str::to_string)
                        .collect()
                };
            }
            FieldKind::Text => {
                let value = if unset { String::new() } else { text.to_string() };
                match key {
                    "fake_queue_json_path" => self.fake_queue_json_path = value,
                    "old_jobs_start_time" => self.old_jobs_start_time = value,
                    "old_jobs_end_time" => self.old_jobs_end_time = value,
                    "debug_squeue_json_path" => self.debug_squeue_json_path = value,
                    "debug_sacct_json_path" => self.debug_sacct_json_path = value,
                    "slurm_bin_path" => self.slurm_bin_path = value,
                    _ => {
                        self.theme = if value.is_empty() {
                            Self::default().theme
                        } else {
                            value
                        }
                    }
                }
            }
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn temp_settings_path(name: &str) -> PathBuf {
        std::env::temp_dir()
            .join(format!("slurmtui-test-{}-{name}", std::process::id()))
            .join("settings.toml")
    }

    #[test]
    fn test_load_creates_missing_file_with_defaults() {
        let path = temp_settings_path("create");
        let _ = std::fs::remove_file(&path);

        let (settings, warnings) = Settings::load(&path, false).unwrap();
        assert_eq!(settings, Settings::default());
        assert!(warnings.is_empty());
        assert!(path.exists());

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_save_then_load_roundtrip() {
        let path = temp_settings_path("roundtrip");
        let settings = Settings {
            mock: true,
            update_interval: 3,
            accounts: vec!["proj1".into(), "proj2".into()],
            squeue_args: vec!["-p".into(), "gpu".into()],
            old_jobs_start_time: "2024-01-01".into(),
            ..Settings::default()
        };
        settings.save(&path).unwrap();

        let (loaded, _) = Settings::load(&path, false).unwrap();
        assert_eq!(loaded, settings);

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_missing_keys_are_backfilled_and_rewritten() {
        let path = temp_settings_path("backfill");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "update_interval = 42\n").unwrap();

        let (loaded, _) = Settings::load(&path, false).unwrap();
        assert_eq!(loaded.update_interval, 42);
        assert!(!loaded.mock);

        let rewritten = std::fs::read_to_string(&path).unwrap();
        assert!(rewritten.contains("update_interval = 42"));
        assert!(rewritten.contains("check_all_jobs = false"));
        assert!(rewritten.contains("debug_sacct_json_path"));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_parse_error_uses_defaults_unless_strict() {
        let path = temp_settings_path("broken");
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(&path, "update_interval = [not toml").unwrap();

        let (loaded, warnings) = Settings::load(&path, false).unwrap();
        assert_eq!(loaded.update_interval, Settings::default().update_interval);
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("parse error"));

        assert!(matches!(
            Settings::load(&path, true),
            Err(SettingsError::Parse { .. })
        ));

        let _ = std::fs::remove_dir_all(path.parent().unwrap());
    }

    #[test]
    fn test_validate_zero_interval() {
        let mut settings = Settings {
            update_interval: 0,
            ..Settings::default()
        };
        let warnings = settings.validate(false).unwrap();
        assert_eq!(warnings.len(), 1);
        assert!(warnings[0].contains("at least 1"));
        assert_eq!(settings.update_interval, 10);

        let mut settings = Settings {
            update_interval: 0,
            ..Settings::default()
        };
        assert!(settings.validate(true).is_err());
    }

    #[test]
    fn test_refresh_interval_stretches_for_all_users() {
        let mut settings = Settings::default();
        assert_eq!(settings.refresh_interval(), Duration::from_secs(10));
        settings.check_all_jobs = true;
        assert_eq!(settings.refresh_interval(), Duration::from_secs(50));
        // The stored value is untouched
        assert_eq!(settings.update_interval, 10);
    }

    #[test]
    fn test_history_window_defaults() {
        let mut settings = Settings::default();
        assert_eq!(
            settings.history_window(),
            ("now-7days".to_string(), "now".to_string())
        );
        settings.old_jobs_end_time = "2024-02-01".into();
        assert_eq!(settings.history_window().1, "2024-02-01");
    }

    #[test]
    fn test_canned_path_precedence() {
        let mut settings = Settings {
            debug_squeue_json_path: "/tmp/debug.json".into(),
            ..Settings::default()
        };
        assert_eq!(settings.canned_squeue_path(), Some("/tmp/debug.json"));
        settings.fake_queue_json_path = "/tmp/fake.json".into();
        assert_eq!(settings.canned_squeue_path(), Some("/tmp/fake.json"));
    }

    #[test]
    fn test_set_field_text_parsing() {
        let mut settings = Settings::default();

        settings.set_field_text("mock", "true").unwrap();
        assert!(settings.mock);
        settings.set_field_text("mock", "None").unwrap();
        assert!(!settings.mock);

        settings.set_field_text("update_interval", "30").unwrap();
        assert_eq!(settings.update_interval, 30);
        assert!(settings.set_field_text("update_interval", "soon").is_err());
        assert_eq!(settings.update_interval, 30);

        settings.set_field_text("accounts", "a1, a2 a3").unwrap();
        assert_eq!(settings.accounts, vec!["a1", "a2", "a3"]);
        settings.set_field_text("accounts", "null").unwrap();
        assert!(settings.accounts.is_empty());

        settings.set_field_text("squeue_args", "-p gpu --format=a,b").unwrap();
        assert_eq!(settings.squeue_args, vec!["-p", "gpu", "--format=a,b"]);

        settings.set_field_text("debug_sacct_json_path", "/x.json").unwrap();
        assert_eq!(settings.field_text("debug_sacct_json_path"), "/x.json");
        settings.set_field_text("debug_sacct_json_path", "").unwrap();
        assert_eq!(settings.canned_sacct_path(), None);
    }

    #[test]
    fn test_every_field_is_editable() {
        let keys = Settings::default_keys();
        assert_eq!(keys.len(), SETTING_FIELDS.len());
        for field in SETTING_FIELDS {
            assert!(keys.iter().any(|k| k == field.key), "{} not serialized", field.key);
        }
    }
}
