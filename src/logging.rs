use std::io;

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

const STDOUT_FILTER: &str = "info,llm_request=info,checkpoint=info,pipeline=info";
const FILE_FILTER: &str = "info,llm_request=debug,checkpoint=debug,pipeline=debug";

/// Stdout at info (`RUST_LOG` overrides), plus a daily file under `log_dir`
/// that also keeps the raw LLM traffic at debug level.
///
/// The returned guard flushes the file writer when dropped; keep it alive
/// for the life of the process.
pub fn configure_logging(log_dir: &str) -> WorkerGuard {
    let stdout_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(STDOUT_FILTER));
    let stdout_log = fmt::layer()
        .with_writer(io::stdout)
        .with_filter(stdout_filter);

    let file_appender = rolling::daily(log_dir, "dcnorm.log");
    let (file_writer, guard) = tracing_appender::non_blocking(file_appender);
    let file_log = fmt::layer()
        .with_ansi(false)
        .with_writer(file_writer)
        .with_filter(EnvFilter::new(FILE_FILTER));

    tracing_subscriber::Registry::default()
        .with(stdout_log)
        .with(file_log)
        .init();

    guard
}
