use crate::domains::logger::{DomainLogger, DynLogger, LogLevel};
use chrono::Utc;
use std::sync::Arc;

/// Writes engine messages through the process `log` facade, which `init`
/// points at a `fast_log` file appender.
pub struct FileLogger {
    tag: String,
}

impl FileLogger {
    pub fn new(tag: impl Into<String>) -> Self {
        Self { tag: tag.into() }
    }

    /// Installs `fast_log` as the `log` backend, appending to `path`.
    /// Fails if a backend is already installed.
    pub fn init(path: &str, level: log::LevelFilter) -> Result<(), String> {
        fast_log::init(fast_log::config::Config::new().file(path).level(level))
            .map(|_| ())
            .map_err(|e| format!("Failed to initialize fast_log at {}: {}", path, e))
    }

    fn line(&self, msg: &str) -> String {
        format!("{} [{}] {}", Utc::now().to_rfc3339(), self.tag, msg)
    }

    fn write(&self, level: LogLevel, msg: &str) {
        let line = self.line(msg);
        match level {
            LogLevel::Info => log::info!(target: "route_planner", "{}", line),
            LogLevel::Warn => log::warn!(target: "route_planner", "{}", line),
            LogLevel::Error => log::error!(target: "route_planner", "{}", line),
        }
    }
}

impl DomainLogger for FileLogger {
    fn info(&self, msg: &str) {
        self.write(LogLevel::Info, msg);
    }

    fn warn(&self, msg: &str) {
        self.write(LogLevel::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.write(LogLevel::Error, msg);
    }
}

/// Installs the `fast_log` file backend and returns a logger writing to it.
pub fn init_file_logger(path: &str) -> Result<DynLogger, String> {
    FileLogger::init(path, log::LevelFilter::Info)?;
    Ok(Arc::new(FileLogger::new("route-planner")))
}
