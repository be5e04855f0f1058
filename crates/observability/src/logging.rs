//! Subscriber setup: `FmtSubscriber::builder().with_env_filter(...)`,
//! extended with an optional file appender for long-lived batch runs where
//! nobody is tailing stdout.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::EnvFilter;

/// Where (if anywhere) logs should also be written as a file, in addition
/// to stdout.
#[derive(Debug, Clone, Default)]
pub struct LoggingConfig {
    pub log_dir: Option<std::path::PathBuf>,
}

/// Installs the global subscriber. Returns the file appender's guard when a
/// `log_dir` was configured — the caller must keep it alive for the
/// process's lifetime, or buffered lines are dropped on exit.
pub fn init_logging(config: &LoggingConfig) -> Option<WorkerGuard> {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    match &config.log_dir {
        Some(dir) => {
            let file_appender = tracing_appender::rolling::daily(dir, "gh-intel.log");
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            tracing_subscriber::fmt().with_env_filter(env_filter).with_writer(non_blocking).compact().init();
            Some(guard)
        }
        None => {
            tracing_subscriber::fmt().with_env_filter(env_filter).compact().init();
            None
        }
    }
}
