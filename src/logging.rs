use std::future::Future;
use std::path::Path;
use tracing::instrument::{WithDispatch, WithSubscriber};
use tracing::Dispatch;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::run::Timecode;

/// Run-scoped logging context.
///
/// Writes INFO and above to `<info_dir>/<timecode>`, ERROR only to
/// `<errors_dir>/<timecode>`, and a `RUST_LOG`-filtered copy to stdout.
/// Nothing is installed globally: callers wrap the run in [`RunLog::scope`]
/// and call [`RunLog::close`] once it finishes to flush both files.
pub struct RunLog {
    dispatch: Dispatch,
    guards: Vec<WorkerGuard>,
}

impl RunLog {
    pub fn open(timecode: &Timecode, info_dir: &Path, errors_dir: &Path) -> Self {
        let info_appender = tracing_appender::rolling::never(info_dir, timecode.as_str());
        let (info_writer, info_guard) = tracing_appender::non_blocking(info_appender);

        let error_appender = tracing_appender::rolling::never(errors_dir, timecode.as_str());
        let (error_writer, error_guard) = tracing_appender::non_blocking(error_appender);

        let info_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(info_writer)
            .with_filter(LevelFilter::INFO);

        let error_layer = fmt::layer()
            .with_ansi(false)
            .with_writer(error_writer)
            .with_filter(LevelFilter::ERROR);

        // Respect RUST_LOG if set; otherwise keep the console at info for our crate
        let env_filter = EnvFilter::try_from_default_env()
            .unwrap_or_else(|_| EnvFilter::new("etf_ingest=info"));
        let console_layer = fmt::layer()
            .with_target(true)
            .with_writer(std::io::stdout)
            .with_filter(env_filter);

        let subscriber = tracing_subscriber::registry()
            .with(info_layer)
            .with(error_layer)
            .with(console_layer);

        Self {
            dispatch: Dispatch::new(subscriber),
            guards: vec![info_guard, error_guard],
        }
    }

    /// Run `fut` with this log as its subscriber.
    pub fn scope<F: Future>(&self, fut: F) -> WithDispatch<F> {
        fut.with_subscriber(self.dispatch.clone())
    }

    /// Flush and close the log files.
    pub fn close(self) {
        drop(self.dispatch);
        drop(self.guards);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::tempdir;
    use tracing::{error, info};

    #[tokio::test]
    async fn info_and_error_files_are_keyed_by_timecode() {
        let dir = tempdir().unwrap();
        let info_dir = dir.path().join("info");
        let errors_dir = dir.path().join("errors");
        fs::create_dir_all(&info_dir).unwrap();
        fs::create_dir_all(&errors_dir).unwrap();

        let timecode = Timecode::from("2024-01-15-10-00");
        let log = RunLog::open(&timecode, &info_dir, &errors_dir);
        log.scope(async {
            info!("Downloading data source");
            error!("connection refused");
        })
        .await;
        log.close();

        let info_text = fs::read_to_string(info_dir.join("2024-01-15-10-00")).unwrap();
        let error_text = fs::read_to_string(errors_dir.join("2024-01-15-10-00")).unwrap();

        assert!(info_text.contains("Downloading data source"));
        assert!(info_text.contains("connection refused"));
        assert!(!error_text.contains("Downloading data source"));
        assert!(error_text.contains("connection refused"));
    }
}
