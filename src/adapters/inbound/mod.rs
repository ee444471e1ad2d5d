pub mod file_event_log;

pub use file_event_log::*;
