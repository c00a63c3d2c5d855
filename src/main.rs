//! slurmtui - Terminal job table for Slurm

mod columns;
mod dispatch;
mod formatting;
mod models;
mod slurm;
mod table;
mod tracker;
mod tui;

use std::fs::OpenOptions;
use std::io;
use std::path::PathBuf;
use std::sync::Mutex;

use anyhow::{Context, Result};
use clap::Parser;
use tracing_subscriber::EnvFilter;

use models::Settings;

#[derive(Parser, Debug)]
#[command(name = "slurmtui")]
#[command(about = "Interactive terminal table of your Slurm jobs", long_about = None)]
#[command(version)]
struct Cli {
    /// Refresh interval in seconds (multiplied by 5 with --check_all_jobs)
    #[arg(long = "update_interval", value_name = "SECONDS")]
    update_interval: Option<u64>,

    /// Use bundled sample data instead of calling Slurm
    #[arg(long)]
    mock: bool,

    /// Show jobs of all users
    #[arg(long = "check_all_jobs")]
    check_all_jobs: bool,

    /// Read the queue from this squeue JSON file instead of running squeue
    #[arg(long = "fake_queue_json_path", value_name = "PATH")]
    fake_queue_json_path: Option<String>,

    /// Only show jobs of these accounts (comma-separated)
    #[arg(long = "acc", value_name = "ACCOUNTS", value_delimiter = ',')]
    acc: Vec<String>,

    /// Extra arguments passed through to squeue/sacct. Unknown flags are
    /// forwarded too, wherever they appear.
    #[arg(trailing_var_arg = true, allow_hyphen_values = true, value_name = "SQUEUE_ARGS")]
    squeue_args: Vec<String>,
}

/// Flags that take a value, either inline (`--acc=a`) or as the next argument.
const VALUE_FLAGS: &[&str] = &["--update_interval", "--fake_queue_json_path", "--acc"];
const SWITCH_FLAGS: &[&str] = &["--mock", "--check_all_jobs", "-h", "--help", "-V", "--version"];

/// Reorder the command line so our own flags come first and every other
/// argument ends up after `--`, keeping its order. Everything after a
/// literal `--` is passed through untouched.
fn arrange_args<I>(args: I) -> Vec<String>
where
    I: IntoIterator<Item = String>,
{
    let mut args = args.into_iter();
    let mut known: Vec<String> = args.next().into_iter().collect();
    let mut passthrough = Vec::new();

    while let Some(arg) = args.next() {
        if arg == "--" {
            passthrough.extend(args.by_ref());
            break;
        }
        let (name, inline_value) = match arg.split_once('=') {
            Some((name, _)) => (name, true),
            None => (arg.as_str(), false),
        };
        if SWITCH_FLAGS.contains(&name) && !inline_value {
            known.push(arg);
        } else if VALUE_FLAGS.contains(&name) {
            known.push(arg);
            if !inline_value && let Some(value) = args.next() {
                known.push(value);
            }
        } else {
            passthrough.push(arg);
        }
    }

    if !passthrough.is_empty() {
        known.push("--".to_string());
        known.extend(passthrough);
    }
    known
}

impl Cli {
    /// Apply command-line overrides on top of the loaded settings. They are
    /// not written back on their own, but saving from the settings dialog
    /// stores whatever is in effect, overrides included.
    fn apply_to(&self, settings: &mut Settings) {
        if let Some(interval) = self.update_interval {
            settings.update_interval = interval;
        }
        if self.mock {
            settings.mock = true;
        }
        if self.check_all_jobs {
            settings.check_all_jobs = true;
        }
        if let Some(path) = &self.fake_queue_json_path {
            settings.fake_queue_json_path = path.clone();
        }
        let accounts: Vec<String> = self
            .acc
            .iter()
            .map(|a| a.trim().to_string())
            .filter(|a| !a.is_empty())
            .collect();
        if !accounts.is_empty() {
            settings.accounts = accounts;
        }
        if !self.squeue_args.is_empty() {
            settings.squeue_args = self.squeue_args.clone();
        }
    }
}

fn log_path() -> Option<PathBuf> {
    if let Ok(path) = std::env::var("SLURMTUI_LOG")
        && !path.is_empty()
    {
        return Some(PathBuf::from(path));
    }
    dirs::cache_dir().map(|dir| dir.join("slurmtui").join("slurmtui.log"))
}

/// Log to a file; the terminal belongs to the TUI.
fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let file = log_path().and_then(|path| {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).ok()?;
        }
        OpenOptions::new().create(true).append(true).open(path).ok()
    });

    match file {
        Some(file) => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_ansi(false)
                .with_writer(Mutex::new(file))
                .try_init();
        }
        None => {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(filter)
                .with_writer(io::sink)
                .try_init();
        }
    }
}

fn main() -> Result<()> {
    let cli = Cli::parse_from(arrange_args(std::env::args()));
    init_logging();

    // Ctrl+C during ssh or tail belongs to the child, not to us
    ctrlc::set_handler(|| {}).context("Failed to install the Ctrl+C handler")?;

    let settings_path = Settings::default_path();
    let (mut settings, warnings) = match &settings_path {
        Some(path) => Settings::load(path, Settings::is_strict_mode())
            .with_context(|| format!("Failed to load settings from {}", path.display()))?,
        None => {
            tracing::warn!("no settings location available, using defaults");
            (Settings::default(), Vec::new())
        }
    };
    for warning in &warnings {
        tracing::warn!(%warning, "settings");
    }

    cli.apply_to(&mut settings);
    tracing::info!(
        mock = settings.mock,
        all_users = settings.check_all_jobs,
        interval = settings.update_interval,
        "starting slurmtui"
    );

    tui::run(settings, settings_path, warnings)
}
