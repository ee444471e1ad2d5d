use crate::domains::logger::{DomainLogger, DynLogger, LogLevel};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::sync::mpsc;

/// Hands messages to a background task so the engine never waits on a slow
/// sink. Messages arriving while the buffer is full are counted and dropped.
pub struct BufferedLogger {
    sender: mpsc::Sender<(LogLevel, String)>,
    dropped: AtomicU64,
}

impl BufferedLogger {
    /// Must be called inside a tokio runtime.
    pub fn new(sink: DynLogger, capacity: usize) -> Self {
        let (sender, mut rx) = mpsc::channel::<(LogLevel, String)>(capacity.max(1));
        tokio::spawn(async move {
            while let Some((level, msg)) = rx.recv().await {
                sink.log(level, &msg);
            }
        });
        Self { sender, dropped: AtomicU64::new(0) }
    }

    pub fn dropped(&self) -> u64 {
        self.dropped.load(Ordering::Relaxed)
    }

    fn offer(&self, level: LogLevel, msg: &str) {
        if self.sender.try_send((level, msg.to_string())).is_err() {
            self.dropped.fetch_add(1, Ordering::Relaxed);
        }
    }
}

impl DomainLogger for BufferedLogger {
    fn info(&self, msg: &str) {
        self.offer(LogLevel::Info, msg);
    }

    fn warn(&self, msg: &str) {
        self.offer(LogLevel::Warn, msg);
    }

    fn error(&self, msg: &str) {
        self.offer(LogLevel::Error, msg);
    }
}

pub fn init_buffered_logger(sink: DynLogger, capacity: usize) -> DynLogger {
    Arc::new(BufferedLogger::new(sink, capacity))
}
