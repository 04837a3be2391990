//! Tracing setup.
//!
//! The TUI owns the terminal, so its log lines go to a file through a
//! non-blocking writer. One-shot commands log to stderr.

use std::path::Path;

use anyhow::Context;
use assistant_config::LogLevel;
use tracing::subscriber::DefaultGuard;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// `RUST_LOG` wins over the configured level
fn build_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        EnvFilter::new(format!(
            "warn,assistant={lvl},assistant_core={lvl},assistant_config={lvl},assistant_tui={lvl}",
            lvl = level.as_str()
        ))
    })
}

/// Stderr logging for the current thread until the guard drops, used while the config loads
pub fn init_startup() -> DefaultGuard {
    tracing::subscriber::set_default(startup_subscriber(std::io::stderr))
}

fn startup_subscriber<W>(make_writer: W) -> impl tracing::Subscriber + Send + Sync
where
    W: for<'w> fmt::MakeWriter<'w> + Send + Sync + 'static,
{
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().with_writer(make_writer).with_target(false).with_ansi(false))
}

/// Log to `path`; keep the guard alive until exit so buffered lines are flushed
pub fn init_file(level: LogLevel, path: &Path) -> anyhow::Result<WorkerGuard> {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .unwrap_or_else(|| Path::new("."));
    std::fs::create_dir_all(dir)
        .with_context(|| format!("Failed to create log directory {}", dir.display()))?;
    let file_name = path
        .file_name()
        .context("Log file path has no file name")?;

    let appender = tracing_appender::rolling::never(dir, file_name);
    let (writer, guard) = tracing_appender::non_blocking(appender);

    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_writer(writer).with_ansi(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;

    Ok(guard)
}

pub fn init_stderr(level: LogLevel) -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(build_filter(level))
        .with(fmt::layer().with_writer(std::io::stderr).with_target(false))
        .try_init()
        .context("Failed to install tracing subscriber")?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use assistant_config::{Config, ConfigManager, ENV_USE_MOCK};
    use std::io::{self, Write};
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct Captured(Arc<Mutex<Vec<u8>>>);

    impl Write for Captured {
        fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_startup_logging_captures_override_warnings() {
        let captured = Captured::default();
        let writer = captured.clone();
        let subscriber = startup_subscriber(move || writer.clone());

        tracing::subscriber::with_default(subscriber, || {
            let mut config = Config::default();
            ConfigManager::apply_overrides(&mut config, |key| {
                (key == ENV_USE_MOCK).then(|| "sometimes".to_string())
            });
        });

        let output = String::from_utf8(captured.0.lock().unwrap().clone()).unwrap();
        assert!(output.contains("Ignoring ASSISTANT_USE_MOCK_API"));
    }
}
