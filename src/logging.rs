//! Tracing setup for the pipeline binary.

use std::path::Path;
use std::sync::OnceLock;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

// Keeps the non-blocking file writer flushing for the process lifetime.
static FILE_GUARD: OnceLock<WorkerGuard> = OnceLock::new();

const DEFAULT_LOG_PATH: &str = "logs/qbank.log";

/// Install the global subscriber: compact stdout output plus a file layer.
///
/// Filtering honors `RUST_LOG` and defaults to `info`. The file target comes
/// from `Config::log_file` (falling back to `logs/qbank.log`, creating parent
/// directories as needed); an unopenable target degrades to stdout-only
/// logging with a note on stderr. Call after [`crate::config::init_config`].
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let stdout_layer = fmt::layer().compact().with_target(false);
    let registry = tracing_subscriber::registry().with(filter).with(stdout_layer);

    let path = crate::config::get_config()
        .log_file
        .clone()
        .unwrap_or_else(|| DEFAULT_LOG_PATH.to_string());

    match open_log_file(Path::new(&path)) {
        Ok(file) => {
            let (writer, guard) = tracing_appender::non_blocking(file);
            let _ = FILE_GUARD.set(guard);
            registry
                .with(
                    fmt::layer()
                        .compact()
                        .with_ansi(false)
                        .with_target(true)
                        .with_writer(writer),
                )
                .init();
        }
        Err(error) => {
            eprintln!("Log file {path} unavailable ({error}); logging to stdout only");
            registry.init();
        }
    }
}

/// Open the log file in append mode, creating missing parent directories.
fn open_log_file(path: &Path) -> std::io::Result<std::fs::File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    std::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(path)
}
