use super::console_logger::init_console_logger;
use super::file_logger::init_file_logger;
use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

/// Fans every message out to a primary and an optional secondary logger.
pub struct MultiLogger {
    primary: DynLogger,
    secondary: Option<DynLogger>,
}

impl MultiLogger {
    pub fn new(primary: DynLogger, secondary: Option<DynLogger>) -> Self {
        Self { primary, secondary }
    }

    fn each(&self, f: impl Fn(&dyn DomainLogger)) {
        f(self.primary.as_ref());
        if let Some(secondary) = &self.secondary {
            f(secondary.as_ref());
        }
    }
}

impl DomainLogger for MultiLogger {
    fn info(&self, msg: &str) {
        self.each(|l| l.info(msg));
    }

    fn warn(&self, msg: &str) {
        self.each(|l| l.warn(msg));
    }

    fn error(&self, msg: &str) {
        self.each(|l| l.error(msg));
    }
}

/// Console logging, plus a `fast_log` file when `file` is given and can be
/// opened.
pub fn init_combined_logger(file: Option<&str>) -> DynLogger {
    let console = init_console_logger();
    let Some(path) = file else {
        return console;
    };
    match init_file_logger(path) {
        Ok(file_logger) => Arc::new(MultiLogger::new(console, Some(file_logger))),
        Err(e) => {
            tracing::warn!(error = %e, "file logging disabled");
            console
        }
    }
}
