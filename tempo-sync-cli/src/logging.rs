use anyhow::Result;
use std::env;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

const LOG_FILE: &str = "tempo-sync.log";

fn log_level() -> Level {
    env::var("LOG_LEVEL")
        .map(|level| match level.to_lowercase().as_str() {
            "error" => Level::ERROR,
            "warn" => Level::WARN,
            "info" => Level::INFO,
            "debug" => Level::DEBUG,
            "trace" => Level::TRACE,
            _ => Level::INFO,
        })
        .unwrap_or(Level::WARN)
}

pub fn log_dir() -> PathBuf {
    if let Ok(custom_dir) = env::var("TEMPO_SYNC_LOG_DIR") {
        return PathBuf::from(custom_dir);
    }
    dirs::data_local_dir()
        .unwrap_or_else(std::env::temp_dir)
        .join("tempo-sync")
        .join("logs")
}

/// Stderr at `LOG_LEVEL` (warn by default, the console belongs to the
/// operator) plus a daily rolling file that always records debug detail.
pub fn init_logging() -> Result<PathBuf> {
    use tracing_appender::rolling;

    let log_dir = log_dir();
    if let Err(e) = std::fs::create_dir_all(&log_dir) {
        eprintln!("Failed to create log directory {}: {e}", log_dir.display());
    }
    let file_appender = rolling::daily(&log_dir, LOG_FILE);
    let level = log_level();

    tracing_subscriber::registry()
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(EnvFilter::from_default_env().add_directive(level.into())),
        )
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_file(true)
                .with_line_number(true)
                .with_filter(
                    EnvFilter::from_default_env().add_directive(Level::DEBUG.max(level).into()),
                ),
        )
        .try_init()
        .map_err(|e| anyhow::anyhow!("Failed to initialise logging: {e}"))?;

    tracing::debug!("Log files will be written to: {}", log_dir.display());
    Ok(log_dir)
}
