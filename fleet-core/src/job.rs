//! Job model: the closed action set, typed per-action payload shapes, and
//! the scheduled work unit itself.

use std::collections::HashSet;

use chrono::{DateTime, Local};
use serde::{Deserialize, Serialize};
use serde_json::Map as JsonObject;
use serde_json::Value as JsonValue;

use crate::error::{FleetError, FleetResult};
use crate::schedule::Schedule;

/// The closed set of actions a job may perform, per `ActionExecutor`'s table.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    PatchManager,
    PatchProfile,
    PatchFanController,
    PatchFanZone,
    PatchPidController,
}

impl std::fmt::Display for Action {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let name = match self {
            Action::PatchManager => "PatchManager",
            Action::PatchProfile => "PatchProfile",
            Action::PatchFanController => "PatchFanController",
            Action::PatchFanZone => "PatchFanZone",
            Action::PatchPidController => "PatchPidController",
        };
        write!(f, "{name}")
    }
}

/// Per-entry shape for `PatchManager` / `PatchProfile`: a Manager id plus a
/// whitelist-validated body (validated by the provider, not here).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ManagerEntry {
    pub manager_id: String,
    #[serde(default)]
    pub body: JsonObject<String, JsonValue>,
}

/// Per-entry shape shared by `PatchFanController` / `PatchFanZone` /
/// `PatchPidController`: a Manager id, the sub-resource id within it, and a
/// whitelist-validated body.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubResourceEntry {
    pub manager_id: String,
    pub sub_resource_id: String,
    #[serde(default)]
    pub body: JsonObject<String, JsonValue>,
}

/// Action-specific payload. The action tag and the payload shape can never
/// disagree because they are the same value (spec §9's redesign note).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ActionPayload {
    PatchManager(Vec<ManagerEntry>),
    PatchProfile(Vec<ManagerEntry>),
    PatchFanController(Vec<SubResourceEntry>),
    PatchFanZone(Vec<SubResourceEntry>),
    PatchPidController(Vec<SubResourceEntry>),
}

impl ActionPayload {
    pub fn action(&self) -> Action {
        match self {
            ActionPayload::PatchManager(_) => Action::PatchManager,
            ActionPayload::PatchProfile(_) => Action::PatchProfile,
            ActionPayload::PatchFanController(_) => Action::PatchFanController,
            ActionPayload::PatchFanZone(_) => Action::PatchFanZone,
            ActionPayload::PatchPidController(_) => Action::PatchPidController,
        }
    }

    pub fn len(&self) -> usize {
        match self {
            ActionPayload::PatchManager(v) | ActionPayload::PatchProfile(v) => v.len(),
            ActionPayload::PatchFanController(v)
            | ActionPayload::PatchFanZone(v)
            | ActionPayload::PatchPidController(v) => v.len(),
        }
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Every entry's manager id must be non-empty and, for the three
    /// sub-resource actions, `(managerId, subResourceId)` must be
    /// duplicate-free; for the two Manager-scoped actions `managerId` alone
    /// must be duplicate-free.
    pub fn validate_identity(&self) -> FleetResult<()> {
        match self {
            ActionPayload::PatchManager(entries) | ActionPayload::PatchProfile(entries) => {
                let mut seen = HashSet::new();
                for entry in entries {
                    if entry.manager_id.trim().is_empty() {
                        return Err(FleetError::BadRequest(
                            "payload entry managerId must not be empty".into(),
                        ));
                    }
                    if !seen.insert(entry.manager_id.clone()) {
                        return Err(FleetError::BadRequest(format!(
                            "duplicate payload entry for managerId '{}'",
                            entry.manager_id
                        )));
                    }
                }
            }
            ActionPayload::PatchFanController(entries)
            | ActionPayload::PatchFanZone(entries)
            | ActionPayload::PatchPidController(entries) => {
                let mut seen = HashSet::new();
                for entry in entries {
                    if entry.manager_id.trim().is_empty() {
                        return Err(FleetError::BadRequest(
                            "payload entry managerId must not be empty".into(),
                        ));
                    }
                    if entry.sub_resource_id.trim().is_empty() {
                        return Err(FleetError::BadRequest(
                            "payload entry sub-resource id must not be empty".into(),
                        ));
                    }
                    let key = (entry.manager_id.clone(), entry.sub_resource_id.clone());
                    if !seen.insert(key) {
                        return Err(FleetError::BadRequest(format!(
                            "duplicate payload entry for managerId '{}' subResourceId '{}'",
                            entry.manager_id, entry.sub_resource_id
                        )));
                    }
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
    Cancelled,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled)
    }
}

/// Caller-supplied fields for `JobScheduler::create`; the scheduler assigns
/// `id`, `createdAt`, initial `status`, and the first `nextRunAt`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JobCreateRequest {
    #[serde(default)]
    pub name: Option<String>,
    pub hosts: Vec<String>,
    pub payload: ActionPayload,
    pub schedule: Schedule,
}

/// Scheduled work unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Job {
    pub id: String,
    pub name: Option<String>,
    pub created_at: DateTime<Local>,
    pub status: JobStatus,
    pub execution_count: u64,
    pub last_run_at: Option<DateTime<Local>>,
    pub next_run_at: Option<DateTime<Local>>,
    pub hosts: Vec<String>,
    pub payload: ActionPayload,
    pub schedule: Schedule,
}

impl Job {
    pub fn action(&self) -> Action {
        self.payload.action()
    }

    pub fn is_continuous(&self) -> bool {
        matches!(self.schedule, Schedule::Continuous { .. })
    }
}

/// `J.hosts` non-empty and duplicate-free, independent of anything else.
pub fn validate_hosts(hosts: &[String]) -> FleetResult<()> {
    if hosts.is_empty() {
        return Err(FleetError::BadRequest("hosts must not be empty".into()));
    }
    let mut seen = HashSet::new();
    for host in hosts {
        if host.trim().is_empty() {
            return Err(FleetError::BadRequest("host id must not be empty".into()));
        }
        if !seen.insert(host.as_str()) {
            return Err(FleetError::BadRequest(format!(
                "duplicate host id '{host}' in hosts"
            )));
        }
    }
    Ok(())
}
