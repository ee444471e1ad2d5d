use crate::common::{EventEnvelope, EventLog};
use async_trait::async_trait;
use std::path::PathBuf;
use tokio::fs::{File, OpenOptions};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader};

/// Planning event log in JSON Lines format, one file per aggregate
/// (request fingerprint).
pub struct FileEventLog {
    base_path: PathBuf,
}

impl FileEventLog {
    pub fn new<P: Into<PathBuf>>(base_path: P) -> Self {
        Self { base_path: base_path.into() }
    }

    fn file_path(&self, aggregate_id: &str) -> PathBuf {
        self.base_path.join(format!("{}.jsonl", aggregate_id))
    }
}

#[async_trait]
impl EventLog for FileEventLog {
    async fn append(&self, envelope: EventEnvelope) -> Result<(), String> {
        tokio::fs::create_dir_all(&self.base_path)
            .await
            .map_err(|e| format!("Failed to create event log directory: {}", e))?;

        let file_path = self.file_path(&envelope.aggregate_id);
        let mut line = serde_json::to_string(&envelope)
            .map_err(|e| format!("Failed to serialize event: {}", e))?;
        line.push('\n');

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&file_path)
            .await
            .map_err(|e| format!("Failed to open event file {}: {}", file_path.display(), e))?;
        // single write so concurrent appenders never interleave within a line
        file.write_all(line.as_bytes())
            .await
            .map_err(|e| format!("Failed to write event: {}", e))?;
        file.flush()
            .await
            .map_err(|e| format!("Failed to flush event file: {}", e))?;
        Ok(())
    }

    async fn load(&self, aggregate_id: &str) -> Result<Vec<EventEnvelope>, String> {
        let file_path = self.file_path(aggregate_id);
        let file = match File::open(&file_path).await {
            Ok(file) => file,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(vec![]),
            Err(e) => return Err(format!("Failed to open event file {}: {}", file_path.display(), e)),
        };

        let mut lines = BufReader::new(file).lines();
        let mut events = Vec::new();
        let mut line_number = 0u64;
        while let Some(line) = lines
            .next_line()
            .await
            .map_err(|e| format!("Failed to read line: {}", e))?
        {
            line_number += 1;
            if line.trim().is_empty() {
                continue;
            }
            let event: EventEnvelope = serde_json::from_str(&line)
                .map_err(|e| format!("Failed to deserialize event at line {}: {}", line_number, e))?;
            events.push(event);
        }
        Ok(events)
    }
}
