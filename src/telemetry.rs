use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::Layer;
use tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt as _, util::SubscriberInitExt as _};

/// File name of the run log inside the log directory
const LOG_FILE: &str = "crawler.log";

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

// Initialize tracing-subscriber and return the guard that flushes the log file on drop
pub fn init_tracing_subscriber(log_dir: &Path) -> anyhow::Result<TelemetryGuard> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::new(Rotation::NEVER, log_dir, LOG_FILE);
    let (file_writer, file_guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer()
        .with_writer(file_writer)
        .with_ansi(false)
        .with_target(true)
        .with_line_number(true)
        .with_filter(default_filter());

    let console_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_filter(default_filter());

    tracing_subscriber::registry()
        .with(console_layer)
        .with(file_layer)
        .try_init()?;

    Ok(TelemetryGuard {
        _file_guard: file_guard,
    })
}

/// Keeps the background log writer alive until the end of `main`
pub struct TelemetryGuard {
    _file_guard: WorkerGuard,
}
