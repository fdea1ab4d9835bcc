//! `ExecutionRecord`: immutable audit row created per (job, fire-instant).

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};

use crate::job::JobStatus;

/// One per-host outcome within a single firing.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostResult {
    pub host_id: String,
    pub success: bool,
    pub message: String,
    pub started_at: DateTime<Local>,
    pub ended_at: DateTime<Local>,
}

impl HostResult {
    pub fn elapsed(&self) -> chrono::Duration {
        self.ended_at - self.started_at
    }
}

/// Immutable audit row for one firing of one job, covering every host in
/// the job's declared order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExecutionRecord {
    pub job_id: String,
    pub fired_at: DateTime<Local>,
    /// `Completed` if every host succeeded, else `Failed`. Never any other
    /// variant - a firing is not `Pending`, `Running`, or `Cancelled`.
    pub status: JobStatus,
    pub host_results: Vec<HostResult>,
}

impl ExecutionRecord {
    pub fn new(job_id: String, fired_at: DateTime<Local>, host_results: Vec<HostResult>) -> Self {
        let status = if host_results.iter().all(|r| r.success) {
            JobStatus::Completed
        } else {
            JobStatus::Failed
        };
        ExecutionRecord {
            job_id,
            fired_at,
            status,
            host_results,
        }
    }
}
