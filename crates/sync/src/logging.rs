//! Structured file logging.
//!
//! Records go to `<data_dir>/logs/helpdesk.log` through a non-blocking
//! appender. Every record carries `component` and `event` fields; the
//! startup record also carries the run id.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

use crate::error::LoggingError;

const DEFAULT_FILTER: &str = "info,reqwest=warn,hyper=warn,tungstenite=warn";
const LOG_FILE_NAME: &str = "helpdesk.log";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogFormat {
    Json,
    Pretty,
}

/// Where the filter and format came from, resolved before anything is
/// installed
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogSettings {
    pub directives: String,
    pub format: LogFormat,
    pub run_id: String,
}

impl LogSettings {
    /// `HELPDESK_LOG_FILTER` > `RUST_LOG` > default. Anything but `pretty`
    /// in `HELPDESK_LOG_FORMAT` means JSON.
    pub fn from_env(env: impl Fn(&str) -> Option<String>) -> Self {
        let non_empty = |key: &str| env(key).filter(|v| !v.trim().is_empty());

        let directives = non_empty("HELPDESK_LOG_FILTER")
            .or_else(|| non_empty("RUST_LOG"))
            .unwrap_or_else(|| DEFAULT_FILTER.to_string());
        let format = match non_empty("HELPDESK_LOG_FORMAT") {
            Some(v) if v.eq_ignore_ascii_case("pretty") => LogFormat::Pretty,
            _ => LogFormat::Json,
        };
        let run_id = non_empty("HELPDESK_RUN_ID").unwrap_or_else(|| {
            format!("pid-{}-{}", std::process::id(), helpdesk_protocol::new_id())
        });

        Self {
            directives,
            format,
            run_id,
        }
    }

    fn filter(&self) -> Result<EnvFilter, LoggingError> {
        EnvFilter::try_new(&self.directives).map_err(|source| LoggingError::Filter {
            directives: self.directives.clone(),
            source,
        })
    }
}

pub struct LoggingHandle {
    pub run_id: String,
    /// Flushes buffered records on drop; keep it alive for the process
    pub guard: WorkerGuard,
}

/// Install the global subscriber using the process environment
pub fn init_logging(log_dir: &Path) -> Result<LoggingHandle, LoggingError> {
    init_logging_with(log_dir, LogSettings::from_env(|key| std::env::var(key).ok()))
}

pub fn init_logging_with(log_dir: &Path, settings: LogSettings) -> Result<LoggingHandle, LoggingError> {
    std::fs::create_dir_all(log_dir).map_err(|source| LoggingError::LogDir {
        path: log_dir.to_path_buf(),
        source,
    })?;
    let filter = settings.filter()?;

    let (writer, guard) =
        tracing_appender::non_blocking(tracing_appender::rolling::never(log_dir, LOG_FILE_NAME));
    let registry = tracing_subscriber::registry().with(filter);
    match settings.format {
        LogFormat::Pretty => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .pretty()
                    .with_target(true),
            )
            .try_init()?,
        LogFormat::Json => registry
            .with(
                fmt::layer()
                    .with_writer(writer)
                    .json()
                    .flatten_event(true)
                    .with_target(true),
            )
            .try_init()?,
    }

    tracing::info!(
        component = "logging",
        event = "logging.initialized",
        run_id = %settings.run_id,
        log_path = %log_dir.join(LOG_FILE_NAME).display(),
        format = ?settings.format,
        filter = %settings.directives,
        "Logging initialized"
    );

    Ok(LoggingHandle {
        run_id: settings.run_id,
        guard,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn helpdesk_filter_wins_over_rust_log() {
        let settings = LogSettings::from_env(env_from(&[
            ("HELPDESK_LOG_FILTER", "helpdesk_sync=trace"),
            ("RUST_LOG", "warn"),
        ]));
        assert_eq!(settings.directives, "helpdesk_sync=trace");
    }

    #[test]
    fn rust_log_then_default() {
        let settings = LogSettings::from_env(env_from(&[("RUST_LOG", "warn")]));
        assert_eq!(settings.directives, "warn");

        let settings = LogSettings::from_env(env_from(&[("HELPDESK_LOG_FILTER", "  ")]));
        assert_eq!(settings.directives, DEFAULT_FILTER);
        assert_eq!(settings.format, LogFormat::Json);
    }

    #[test]
    fn format_and_run_id_from_env() {
        let settings = LogSettings::from_env(env_from(&[
            ("HELPDESK_LOG_FORMAT", "Pretty"),
            ("HELPDESK_RUN_ID", "run-7"),
        ]));
        assert_eq!(settings.format, LogFormat::Pretty);
        assert_eq!(settings.run_id, "run-7");

        let generated = LogSettings::from_env(env_from(&[]));
        assert!(generated.run_id.starts_with("pid-"));
    }

    #[test]
    fn bad_filter_is_reported() {
        let settings = LogSettings {
            directives: "helpdesk_sync=notalevel".to_string(),
            format: LogFormat::Json,
            run_id: "r".to_string(),
        };
        assert!(matches!(settings.filter(), Err(LoggingError::Filter { .. })));
    }
}
