//! Log output for binaries built on the client.
//!
//! The library only emits `tracing` events. A binary picks where they go by
//! calling [`init_observability`] once at startup.

use std::path::{Path, PathBuf};

use once_cell::sync::OnceCell;
use tracing_subscriber::EnvFilter;
use tracing_subscriber::layer::SubscriberExt as _;
use tracing_subscriber::util::SubscriberInitExt as _;

static INIT: OnceCell<()> = OnceCell::new();

const ENABLED_KEYS: [&str; 2] = ["SEARCHLINK_OBSERVABILITY_ENABLED", "SEARCHLINK_OBSERVABILITY"];
const LOG_LEVEL_KEY: &str = "SEARCHLINK_LOG_LEVEL";
const JSON_LOG_PATH_KEY: &str = "SEARCHLINK_JSON_LOG_PATH";
const RUST_LOG_KEY: &str = "RUST_LOG";

/// Where log events are written.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum LogSink {
    /// Compact human-readable lines on stderr, keeping stdout for results.
    Stderr,
    /// One JSON object per line, appended to this file.
    JsonFile(PathBuf),
}

/// Resolved logging settings.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LogSettings {
    pub enabled: bool,
    /// `EnvFilter` directive, e.g. `warn` or `searchlink=debug`.
    pub filter: String,
    pub sink: LogSink,
}

impl LogSettings {
    /// Reads `SEARCHLINK_*` variables, then `RUST_LOG`, falling back to
    /// `default_level`.
    pub fn from_env(default_level: &str) -> Self {
        Self::from_lookup(default_level, |key| std::env::var(key).ok())
    }

    fn from_lookup(default_level: &str, lookup: impl Fn(&str) -> Option<String>) -> Self {
        let enabled = ENABLED_KEYS
            .iter()
            .find_map(|key| lookup(key))
            .map_or(true, |raw| parse_bool(&raw).unwrap_or(true));

        let filter = [LOG_LEVEL_KEY, RUST_LOG_KEY]
            .iter()
            .filter_map(|key| lookup(key))
            .map(|raw| raw.trim().to_string())
            .find(|raw| !raw.is_empty() && EnvFilter::try_new(raw).is_ok())
            .unwrap_or_else(|| default_level.to_string());

        let sink = lookup(JSON_LOG_PATH_KEY)
            .map(|raw| raw.trim().to_string())
            .filter(|raw| !raw.is_empty())
            .map_or(LogSink::Stderr, |raw| LogSink::JsonFile(PathBuf::from(raw)));

        Self {
            enabled,
            filter,
            sink,
        }
    }
}

fn parse_bool(value: &str) -> Option<bool> {
    match value.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" | "enabled" => Some(true),
        "0" | "false" | "no" | "off" | "disabled" => Some(false),
        _ => None,
    }
}

/// Splits a log file path into the directory to create and the file name.
fn split_log_path(path: &Path) -> (PathBuf, String) {
    let dir = path
        .parent()
        .filter(|parent| !parent.as_os_str().is_empty())
        .map_or_else(|| PathBuf::from("."), Path::to_path_buf);
    let file_name = path
        .file_name()
        .and_then(|name| name.to_str())
        .unwrap_or("searchlink.logs.jsonl")
        .to_string();
    (dir, file_name)
}

/// Installs the global subscriber from environment settings, once per
/// process. Later calls are no-ops.
///
/// If the JSON log directory cannot be created, logs fall back to stderr
/// and the failure is reported as the first warning there.
pub fn init_observability(default_level: &str) {
    INIT.get_or_init(|| install(&LogSettings::from_env(default_level)));
}

fn install(settings: &LogSettings) {
    if !settings.enabled {
        return;
    }
    let filter = EnvFilter::try_new(&settings.filter).unwrap_or_else(|_| EnvFilter::new("warn"));

    let fallback_reason = match &settings.sink {
        LogSink::JsonFile(path) => {
            let (dir, file_name) = split_log_path(path);
            match std::fs::create_dir_all(&dir) {
                Ok(()) => {
                    let json_layer = tracing_subscriber::fmt::layer()
                        .json()
                        .with_target(false)
                        .with_writer(tracing_appender::rolling::never(dir, file_name));
                    let _ = tracing_subscriber::registry()
                        .with(filter)
                        .with(json_layer)
                        .try_init();
                    return;
                }
                Err(err) => Some((path.clone(), err)),
            }
        }
        LogSink::Stderr => None,
    };

    let console_layer = tracing_subscriber::fmt::layer()
        .compact()
        .with_target(false)
        .with_writer(std::io::stderr);
    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .try_init();

    if let Some((path, err)) = fallback_reason {
        tracing::warn!(
            event = "observability.json_log_unavailable",
            domain = "observability",
            path = %path.display(),
            error = %err,
            "logging to stderr instead"
        );
    }
}
