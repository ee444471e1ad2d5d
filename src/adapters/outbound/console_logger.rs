use crate::domains::logger::{DomainLogger, DynLogger};
use std::sync::Arc;

/// Forwards engine messages to the `tracing` subscriber of the process.
pub struct TracingLogger;

impl DomainLogger for TracingLogger {
    fn info(&self, msg: &str) {
        tracing::info!(target: "route_planner", "{}", msg);
    }

    fn warn(&self, msg: &str) {
        tracing::warn!(target: "route_planner", "{}", msg);
    }

    fn error(&self, msg: &str) {
        tracing::error!(target: "route_planner", "{}", msg);
    }
}

pub fn init_console_logger() -> DynLogger {
    Arc::new(TracingLogger)
}
