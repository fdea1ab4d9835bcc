//! Execution Audit Sink: append-only, best-effort persistence of one JSON
//! line per [`ExecutionRecord`]. A write failure is logged and swallowed -
//! the audit trail must never be the reason a job fire fails.

use std::path::PathBuf;

use tokio::fs::{self, OpenOptions};
use tokio::io::AsyncWriteExt;
use tokio::sync::Mutex;
use tracing::{instrument, warn};

use crate::execution::ExecutionRecord;

/// Appends `ExecutionRecord`s as JSON lines under a configured directory,
/// one file per job id. Writes are serialized per sink instance so
/// concurrent fires never interleave partial lines.
pub struct AuditSink {
    dir: PathBuf,
    write_lock: Mutex<()>,
}

impl AuditSink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        AuditSink {
            dir: dir.into(),
            write_lock: Mutex::new(()),
        }
    }

    #[instrument(skip(self, record), fields(job_id = %record.job_id))]
    pub async fn append(&self, record: &ExecutionRecord) {
        if let Err(err) = self.try_append(record).await {
            warn!(job_id = %record.job_id, error = %err, "failed to persist execution record");
        }
    }

    async fn try_append(&self, record: &ExecutionRecord) -> std::io::Result<()> {
        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&self.dir).await?;
        let path = self.dir.join(format!("{}.jsonl", record.job_id));
        let mut line = serde_json::to_vec(record)
            .map_err(|err| std::io::Error::new(std::io::ErrorKind::Other, err))?;
        line.push(b'\n');
        let mut file = OpenOptions::new().create(true).append(true).open(path).await?;
        file.write_all(&line).await?;
        file.flush().await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::JobStatus;
    use chrono::Local;
    use tempfile::tempdir;

    #[tokio::test]
    async fn appends_one_line_per_record() {
        let dir = tempdir().unwrap();
        let sink = AuditSink::new(dir.path());
        let record = ExecutionRecord {
            job_id: "job-1".into(),
            fired_at: Local::now(),
            status: JobStatus::Completed,
            host_results: Vec::new(),
        };
        sink.append(&record).await;
        sink.append(&record).await;

        let contents = fs::read_to_string(dir.path().join("job-1.jsonl")).await.unwrap();
        assert_eq!(contents.lines().count(), 2);
    }
}
