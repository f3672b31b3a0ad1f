//! Log subscriber construction.
//!
//! [`build`] returns a ready subscriber instead of installing one, so the binary
//! decides when it becomes the process default and tests can scope it with
//! `tracing::subscriber::with_default`.

use tracing::{Level, Subscriber};
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::{filter::filter_fn, fmt, layer::SubscriberExt, EnvFilter, Layer};

use crate::config::LogConfig;

/// Keeps the non-blocking writers alive. Dropping it flushes pending lines.
#[must_use]
pub struct LogGuards(#[allow(dead_code)] Vec<WorkerGuard>);

fn rolling_writer(dir: &str, file_name: &str, guards: &mut Vec<WorkerGuard>) -> NonBlocking {
    let appender = tracing_appender::rolling::daily(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    guards.push(guard);
    writer
}

/// Builds the subscriber described by `cfg`: stdout plus daily rolling files under `cfg.dir`.
///
/// With `split_by_level` the files are `debug.log` (debug only), `info.log`
/// (info and warn) and `error.log`; otherwise everything goes to `blog.log`.
/// `RUST_LOG` overrides `cfg.level` when set.
pub fn build(cfg: &LogConfig) -> anyhow::Result<(impl Subscriber + Send + Sync + 'static, LogGuards)> {
    std::fs::create_dir_all(&cfg.dir)?;

    let mut guards = Vec::new();
    let (stdout_nb, stdout_guard) = tracing_appender::non_blocking(std::io::stdout());
    guards.push(stdout_guard);

    let env_filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&cfg.level)
            .map_err(|e| anyhow::anyhow!("invalid log.level {:?}: {}", cfg.level, e))?,
    };

    let split = cfg.split_by_level;
    let combined = (!split).then(|| {
        fmt::layer().with_ansi(false).with_writer(rolling_writer(&cfg.dir, "blog.log", &mut guards))
    });
    let debug_file = split.then(|| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(rolling_writer(&cfg.dir, "debug.log", &mut guards))
            .with_filter(filter_fn(|meta| *meta.level() == Level::DEBUG))
    });
    let info_file = split.then(|| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(rolling_writer(&cfg.dir, "info.log", &mut guards))
            .with_filter(filter_fn(|meta| matches!(*meta.level(), Level::INFO | Level::WARN)))
    });
    let error_file = split.then(|| {
        fmt::layer()
            .with_ansi(false)
            .with_writer(rolling_writer(&cfg.dir, "error.log", &mut guards))
            .with_filter(filter_fn(|meta| *meta.level() == Level::ERROR))
    });

    let subscriber = tracing_subscriber::registry()
        .with(env_filter)
        .with(fmt::layer().with_writer(stdout_nb))
        .with(combined)
        .with(debug_file)
        .with(info_file)
        .with(error_file);

    Ok((subscriber, LogGuards(guards)))
}
