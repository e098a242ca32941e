//! Rotating per-run log file (spec.md §6: "a directory of rotating text
//! logs, one file per run, `YYYYMMDD-HHMMSS-run.log`"), via `tracing-appender`
//! and `tracing-subscriber`.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Install a global subscriber that writes to both stderr and a rotating
/// file under `log_dir`, named by `run_stamp` (e.g. `20260724-210000`).
///
/// The returned `WorkerGuard` must be held for the lifetime of the run; the
/// non-blocking writer flushes on drop.
pub fn init(log_dir: &str, run_stamp: &str) -> WorkerGuard {
    let file_appender = tracing_appender::rolling::never(log_dir, format!("{run_stamp}-run.log"));
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(non_blocking.and(std::io::stderr))
        .init();

    guard
}
