//! Structured logging setup shared by every fabric binary.
//!
//! Installs a `tracing_subscriber` registry with an `EnvFilter` (`RUST_LOG`,
//! default `info`) and an stdout layer. When `LOG_DIR` is set, a second,
//! non-blocking rolling-file layer writes to `{LOG_DIR}/{service_name}.log`,
//! giving every component its own per-process log file.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{fmt, EnvFilter};

/// Returned so the caller can keep the non-blocking file writer's guard
/// alive for the lifetime of the process (dropping it stops flushing).
pub struct LoggingGuard {
    _file_guard: Option<tracing_appender::non_blocking::WorkerGuard>,
}

/// Initialize logging for `service_name`. Call once, near the top of `main`.
pub fn init(service_name: &str) -> LoggingGuard {
    let env_filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let stdout_layer = fmt::layer().with_target(true);

    match std::env::var("LOG_DIR") {
        Ok(dir) => {
            if let Err(e) = std::fs::create_dir_all(&dir) {
                eprintln!("failed to create LOG_DIR {dir}: {e}, logging to stdout only");
                tracing_subscriber::registry()
                    .with(env_filter)
                    .with(stdout_layer)
                    .init();
                return LoggingGuard { _file_guard: None };
            }

            let file_appender =
                tracing_appender::rolling::never(&dir, format!("{service_name}.log"));
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let file_layer = fmt::layer().with_ansi(false).with_writer(non_blocking);

            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .with(file_layer)
                .init();

            LoggingGuard {
                _file_guard: Some(guard),
            }
        }
        Err(_) => {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(stdout_layer)
                .init();
            LoggingGuard { _file_guard: None }
        }
    }
}
