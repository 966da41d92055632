//! Tracing setup for the CLI.
//!
//! Events go to stderr so stdout only ever carries the JSON report. With file
//! logging enabled a daily rolling file is added next to it.

use std::path::Path;

use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use crate::config::Config;

const LOG_FILE_PREFIX: &str = "competency-mastery.log";

/// Flushes the file writer when dropped; keep it alive until exit.
pub struct FileLogGuard {
    _guard: WorkerGuard,
}

fn env_filter(log_level: &str) -> EnvFilter {
    EnvFilter::try_new(log_level).unwrap_or_else(|_| EnvFilter::new("info"))
}

fn file_writer(log_dir: &Path) -> std::io::Result<(NonBlocking, FileLogGuard)> {
    std::fs::create_dir_all(log_dir)?;
    let appender = RollingFileAppender::new(Rotation::DAILY, log_dir, LOG_FILE_PREFIX);
    let (writer, guard) = tracing_appender::non_blocking(appender);
    Ok((writer, FileLogGuard { _guard: guard }))
}

pub fn init_tracing(config: &Config) -> Option<FileLogGuard> {
    let file = if config.file_logs {
        match file_writer(&config.log_dir) {
            Ok(file) => Some(file),
            Err(err) => {
                eprintln!(
                    "file logging disabled, cannot use {}: {err}",
                    config.log_dir.display()
                );
                None
            }
        }
    } else {
        None
    };

    let (file_layer, guard) = match file {
        Some((writer, guard)) => (
            Some(
                fmt::layer()
                    .with_writer(writer)
                    .with_ansi(false)
                    .with_target(true),
            ),
            Some(guard),
        ),
        None => (None, None),
    };

    let _ = tracing_subscriber::registry()
        .with(env_filter(&config.log_level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(true))
        .with(file_layer)
        .try_init();

    guard
}
