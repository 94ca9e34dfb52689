//! Logging and tracing configuration
//!
//! Diagnostics go through `tracing`. Interactive commands log to stderr
//! only; a test run also keeps a `harness.log` next to its results.

use std::path::Path;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Log file written into each run directory
pub const RUN_LOG_NAME: &str = "harness.log";

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("esal_harness=info,warn"))
}

/// Initialize tracing for interactive commands (stderr logging)
///
/// Logs are controlled by the `RUST_LOG` environment variable.
/// Default level is INFO for this crate, WARN for dependencies.
pub fn init_cli() {
    tracing_subscriber::registry()
        .with(default_filter())
        .with(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .compact(),
        )
        .init();
}

/// Initialize tracing for a test run (run log file + stderr)
///
/// The returned guard flushes the file writer on drop; keep it alive for
/// the whole run. Falls back to stderr only if the directory is unusable.
pub fn init_run(run_dir: &Path) -> Option<WorkerGuard> {
    if let Err(e) = std::fs::create_dir_all(run_dir) {
        eprintln!("Warning: Could not create run directory: {}", e);
        init_cli();
        return None;
    }

    let appender = tracing_appender::rolling::never(run_dir, RUN_LOG_NAME);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    let file_layer = fmt::layer()
        .with_writer(writer)
        .with_ansi(false)
        .with_target(true)
        .with_thread_ids(true)
        .with_line_number(true);

    let stderr_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(false)
        .compact();

    tracing_subscriber::registry()
        .with(default_filter())
        .with(file_layer)
        .with(stderr_layer)
        .init();

    Some(guard)
}
