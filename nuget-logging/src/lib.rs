//! Tracing bootstrap shared by the NuGet store binaries.
//!
//! Settings come from the environment:
//!
//! - `LOG_LEVEL`: default filter directive when `RUST_LOG` is unset (`info`)
//! - `LOG_FORMAT`: `human` or `json` (`human`)
//! - `LOG_OUTPUT`: `console`, `file` or `both` (`console`)
//! - `LOG_FILE_PATH`: log file for file output, rotated daily (`/tmp/nuget-store.log`)

use std::{env, path::PathBuf};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{
    fmt::{
        writer::{BoxMakeWriter, MakeWriterExt},
        MakeWriter,
    },
    prelude::*,
    registry, EnvFilter,
};

const DEFAULT_LOG_FILE: &str = "/tmp/nuget-store.log";

/// Output encoding for log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Human,
    Json,
}

/// Where log lines are written.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogOutput {
    Console,
    File,
    Both,
}

impl LogOutput {
    fn uses_file(self) -> bool {
        matches!(self, LogOutput::File | LogOutput::Both)
    }
}

/// Resolved logging settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub level: String,
    pub format: LogFormat,
    pub output: LogOutput,
    pub file_path: PathBuf,
}

impl Default for LogSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            format: LogFormat::Human,
            output: LogOutput::Console,
            file_path: PathBuf::from(DEFAULT_LOG_FILE),
        }
    }
}

impl LogSettings {
    /// Reads settings from the process environment.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Reads settings through `lookup`, falling back to defaults for
    /// missing or unrecognised values.
    pub fn from_lookup<F>(lookup: F) -> Self
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let format = match lookup("LOG_FORMAT").as_deref().map(str::trim) {
            Some("json") => LogFormat::Json,
            _ => defaults.format,
        };
        let output = match lookup("LOG_OUTPUT").as_deref().map(str::trim) {
            Some("file") => LogOutput::File,
            Some("both") => LogOutput::Both,
            _ => defaults.output,
        };

        Self {
            level: lookup("LOG_LEVEL")
                .filter(|level| !level.trim().is_empty())
                .unwrap_or(defaults.level),
            format,
            output,
            file_path: lookup("LOG_FILE_PATH")
                .filter(|path| !path.trim().is_empty())
                .map(PathBuf::from)
                .unwrap_or(defaults.file_path),
        }
    }

    fn env_filter(&self) -> EnvFilter {
        let mut filter =
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&self.level));
        for noisy in ["tokio=warn", "zip=warn"] {
            if let Ok(directive) = noisy.parse() {
                filter = filter.add_directive(directive);
            }
        }
        filter
    }

    /// Opens the daily rolling appender for file output.
    fn file_writer(&self) -> (tracing_appender::non_blocking::NonBlocking, WorkerGuard) {
        let dir = self
            .file_path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."));
        let file_name = self
            .file_path
            .file_name()
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("nuget-store.log"));

        tracing_appender::non_blocking(tracing_appender::rolling::daily(dir, file_name))
    }
}

/// Installs the global subscriber described by the environment.
///
/// Returns the appender guard when file output is active; it must be held for
/// the lifetime of the process so buffered lines are flushed.
pub fn init_subscriber() -> Option<WorkerGuard> {
    init_with(&LogSettings::from_env())
}

/// Installs the global subscriber described by `settings`.
///
/// A second call is a no-op apart from returning a fresh guard.
pub fn init_with(settings: &LogSettings) -> Option<WorkerGuard> {
    let mut guard = None;

    let writer = if settings.output.uses_file() {
        let (file, file_guard) = settings.file_writer();
        guard = Some(file_guard);
        match settings.output {
            LogOutput::Both => boxed(std::io::stderr.and(file)),
            _ => boxed(file),
        }
    } else {
        boxed(std::io::stderr)
    };

    let fmt_layer = tracing_subscriber::fmt::layer().with_writer(writer);
    let installed = match settings.format {
        LogFormat::Json => registry()
            .with(settings.env_filter())
            .with(fmt_layer.json())
            .try_init(),
        LogFormat::Human => registry()
            .with(settings.env_filter())
            .with(fmt_layer.with_target(true))
            .try_init(),
    };

    if installed.is_err() {
        tracing::debug!("tracing subscriber already installed");
    }

    guard
}

fn boxed<M>(writer: M) -> BoxMakeWriter
where
    M: for<'a> MakeWriter<'a> + Send + Sync + 'static,
{
    BoxMakeWriter::new(writer)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_defaults_when_unset() {
        let settings = LogSettings::from_lookup(|_| None);
        assert_eq!(settings, LogSettings::default());
        assert_eq!(settings.level, "info");
        assert_eq!(settings.output, LogOutput::Console);
    }

    #[test]
    fn test_reads_all_keys() {
        let settings = LogSettings::from_lookup(lookup_from(&[
            ("LOG_LEVEL", "debug"),
            ("LOG_FORMAT", "json"),
            ("LOG_OUTPUT", "both"),
            ("LOG_FILE_PATH", "/var/log/nuget/store.log"),
        ]));
        assert_eq!(settings.level, "debug");
        assert_eq!(settings.format, LogFormat::Json);
        assert_eq!(settings.output, LogOutput::Both);
        assert_eq!(settings.file_path, PathBuf::from("/var/log/nuget/store.log"));
    }

    #[test]
    fn test_unknown_values_fall_back() {
        let settings = LogSettings::from_lookup(lookup_from(&[
            ("LOG_FORMAT", "xml"),
            ("LOG_OUTPUT", "syslog"),
            ("LOG_LEVEL", "  "),
        ]));
        assert_eq!(settings.format, LogFormat::Human);
        assert_eq!(settings.output, LogOutput::Console);
        assert_eq!(settings.level, "info");
    }

    #[test]
    fn test_file_output_flag() {
        assert!(LogOutput::File.uses_file());
        assert!(LogOutput::Both.uses_file());
        assert!(!LogOutput::Console.uses_file());
    }
}
