use std::{
    fs::{self, OpenOptions},
    io,
    path::{Path, PathBuf},
};

use chrono::{Local, NaiveDate};
use tracing_appender::non_blocking;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// 로깅 writer guard 보관용
/// drop 되기 전까지 버퍼가 flush 된다
pub struct TracingGuards {
    _file: WorkerGuard,
    _stdout: WorkerGuard,
}

/// stdout + 날짜별 파일 로깅 초기화
/// 파일에는 INFO 이상만, stdout 은 RUST_LOG (기본 info) 를 따른다
pub fn init_tracing(log_dir: impl AsRef<Path>, prefix: &str) -> io::Result<TracingGuards> {
    let (file_writer, file_guard) = daily_file_appender(log_dir.as_ref(), prefix)?;
    let (stdout_writer, stdout_guard) = non_blocking(io::stdout());

    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(
            fmt::layer()
                .with_ansi(false)
                .with_writer(file_writer)
                .with_filter(EnvFilter::new("info")),
        )
        .with(
            fmt::layer()
                .with_writer(stdout_writer)
                .with_ansi(true)
                .with_filter(env_filter),
        )
        .init();

    Ok(TracingGuards {
        _file: file_guard,
        _stdout: stdout_guard,
    })
}

/// `logs/bullion.2025-11-29.log` 형식
pub fn log_file_path(base_dir: &Path, prefix: &str, date: NaiveDate) -> PathBuf {
    base_dir.join(format!("{prefix}.{}.log", date.format("%Y-%m-%d")))
}

fn daily_file_appender(base_dir: &Path, prefix: &str) -> io::Result<(NonBlocking, WorkerGuard)> {
    fs::create_dir_all(base_dir)?;

    let path = log_file_path(base_dir, prefix, Local::now().date_naive());
    let file = OpenOptions::new().create(true).append(true).open(path)?;

    Ok(non_blocking(file))
}
