//! Process-wide tracing setup
//!
//! One rolling file sink, JSON or text per configuration; text mode also
//! mirrors to stdout with color for interactive runs. A `RUST_LOG`
//! environment filter overrides the configured level. The returned guard
//! must stay alive for the process lifetime or buffered lines are lost.

use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{AppConfig, LogFormat, LogRotation};

pub fn init_logging(config: &AppConfig) -> WorkerGuard {
    let appender = match config.rotation {
        LogRotation::Hourly => rolling::hourly(&config.log_dir, &config.log_file),
        LogRotation::Daily => rolling::daily(&config.log_dir, &config.log_file),
        LogRotation::Never => rolling::never(&config.log_dir, &config.log_file),
    };
    let (file_writer, guard) = tracing_appender::non_blocking(appender);

    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.log_level));
    let subscriber = tracing_subscriber::registry().with(filter);

    match config.log_format {
        LogFormat::Json => {
            subscriber
                .with(fmt::layer().json().with_writer(file_writer).with_ansi(false))
                .init();
        }
        LogFormat::Text => {
            subscriber
                .with(
                    fmt::layer()
                        .with_writer(file_writer)
                        .with_ansi(false)
                        .with_target(false),
                )
                .with(fmt::layer().with_target(false))
                .init();
        }
    }

    guard
}
