//! Job Scheduler: owns the job collection and the firing loop that ties the
//! Worker Pool to the Action Executor and the Execution Audit Sink.

pub mod audit;
pub mod executor;
pub mod pool;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::Local;
use tokio::sync::RwLock;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::error::{FleetError, FleetResult};
use crate::execution::ExecutionRecord;
use crate::job::{Job, JobCreateRequest, JobStatus};
use crate::redfish::RedfishTransport;
use crate::validation::validate_job;

pub use audit::AuditSink;
pub use executor::ActionExecutor;
pub use pool::{PoolStatus, WorkerPool};

/// Advisory snapshot combining pool occupancy and job counts (spec §4.3's
/// pool-size view).
#[derive(Debug, Clone, Copy)]
pub struct SchedulerStatus {
    pub worker_pool_size: usize,
    pub active_workers: usize,
    pub available_workers: usize,
    pub total_jobs: usize,
    pub running_jobs: usize,
}

/// Owns every `Job` and drives its lifecycle: creation and validation,
/// firing at computed instants, fan-out under the worker pool's bound,
/// rescheduling, and cancellation.
pub struct JobScheduler<T: RedfishTransport> {
    jobs: Arc<RwLock<HashMap<String, Job>>>,
    pool: Arc<WorkerPool>,
    executor: Arc<ActionExecutor<T>>,
    audit: Arc<AuditSink>,
}

impl<T: RedfishTransport + 'static> JobScheduler<T> {
    pub fn new(executor: Arc<ActionExecutor<T>>, audit: Arc<AuditSink>, pool_size: usize) -> FleetResult<Self> {
        Ok(JobScheduler {
            jobs: Arc::new(RwLock::new(HashMap::new())),
            pool: Arc::new(WorkerPool::new(pool_size)?),
            executor,
            audit,
        })
    }

    #[instrument(skip(self, request))]
    pub async fn create(&self, request: JobCreateRequest) -> FleetResult<Job> {
        validate_job(&request)?;
        let now = Local::now();
        let next_run_at = request.schedule.next_occurrence(now, false);
        let job = Job {
            id: Uuid::new_v4().to_string(),
            name: request.name,
            created_at: now,
            status: JobStatus::Pending,
            execution_count: 0,
            last_run_at: None,
            next_run_at,
            hosts: request.hosts,
            payload: request.payload,
            schedule: request.schedule,
        };
        let mut jobs = self.jobs.write().await;
        jobs.insert(job.id.clone(), job.clone());
        info!(job_id = %job.id, next_run_at = ?job.next_run_at, "job created");
        Ok(job)
    }

    pub async fn get(&self, id: &str) -> FleetResult<Job> {
        let jobs = self.jobs.read().await;
        jobs.get(id)
            .cloned()
            .ok_or_else(|| FleetError::NotFound(format!("job '{id}' not found")))
    }

    pub async fn list(&self) -> Vec<Job> {
        let jobs = self.jobs.read().await;
        jobs.values().cloned().collect()
    }

    #[instrument(skip(self))]
    pub async fn delete(&self, id: &str) -> FleetResult<()> {
        let mut jobs = self.jobs.write().await;
        jobs.remove(id)
            .map(|_| ())
            .ok_or_else(|| FleetError::NotFound(format!("job '{id}' not found")))
    }

    /// Pending fires are dropped (`nextRunAt` cleared). A firing already in
    /// flight is allowed to finish - its in-flight per-host calls are not
    /// aborted - but marking it `Cancelled` here (rather than leaving it
    /// `Running`) is what makes `fire`'s post-run step skip the reschedule;
    /// a job cancelled mid-firing must land `Cancelled`, not re-armed.
    #[instrument(skip(self))]
    pub async fn cancel(&self, id: &str) -> FleetResult<Job> {
        let mut jobs = self.jobs.write().await;
        let job = jobs
            .get_mut(id)
            .ok_or_else(|| FleetError::NotFound(format!("job '{id}' not found")))?;
        if matches!(job.status, JobStatus::Pending | JobStatus::Running) {
            job.status = JobStatus::Cancelled;
        }
        job.next_run_at = None;
        Ok(job.clone())
    }

    pub fn set_worker_pool_size(&self, size: usize) -> FleetResult<()> {
        self.pool.resize(size)
    }

    pub async fn status(&self) -> SchedulerStatus {
        let jobs = self.jobs.read().await;
        let pool = self.pool.status();
        SchedulerStatus {
            worker_pool_size: pool.size,
            active_workers: pool.active,
            available_workers: pool.available,
            total_jobs: jobs.len(),
            running_jobs: jobs.values().filter(|j| j.status == JobStatus::Running).count(),
        }
    }

    /// Fires a job immediately, independent of its `nextRunAt`. A
    /// `Continuous` job still re-arms from "now" afterward, per its normal
    /// cadence - triggering early does not shift the schedule's grid.
    pub async fn trigger_now(self: &Arc<Self>, id: &str) -> FleetResult<ExecutionRecord> {
        let job = self.get(id).await?;
        self.fire(job).await
    }

    /// Background poll loop: checks for due jobs roughly once a second and
    /// fans each one out without blocking the next tick. Never returns.
    pub async fn run_forever(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(Duration::from_secs(1));
        loop {
            ticker.tick().await;
            let due: Vec<Job> = {
                let jobs = self.jobs.read().await;
                let now = Local::now();
                jobs.values()
                    .filter(|job| !matches!(job.status, JobStatus::Running | JobStatus::Cancelled))
                    .filter(|job| job.next_run_at.is_some_and(|at| at <= now))
                    .cloned()
                    .collect()
            };
            for job in due {
                let scheduler = self.clone();
                tokio::spawn(async move {
                    let job_id = job.id.clone();
                    if let Err(err) = scheduler.fire(job).await {
                        warn!(job_id = %job_id, error = %err, "job fire failed");
                    }
                });
            }
        }
    }

    /// The firing algorithm: mark `Running`, bump `executionCount`/
    /// `lastRunAt`, fan out one worker-pool-bounded task per host, emit one
    /// `ExecutionRecord` preserving host order, then reschedule if
    /// `Continuous` or settle into a terminal state otherwise.
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn fire(self: &Arc<Self>, job: Job) -> FleetResult<ExecutionRecord> {
        let fired_at = Local::now();
        {
            let mut jobs = self.jobs.write().await;
            match jobs.get_mut(&job.id) {
                Some(slot) if slot.status == JobStatus::Cancelled => {
                    return Err(FleetError::BadRequest(format!("job '{}' is cancelled", job.id)));
                }
                Some(slot) => {
                    slot.status = JobStatus::Running;
                    slot.execution_count += 1;
                    slot.last_run_at = Some(fired_at);
                }
                None => return Err(FleetError::NotFound(format!("job '{}' not found", job.id))),
            }
        }

        let mut handles = Vec::with_capacity(job.hosts.len());
        for host_id in job.hosts.clone() {
            let pool = self.pool.clone();
            let executor = self.executor.clone();
            let payload = job.payload.clone();
            handles.push(tokio::spawn(async move {
                let _slot = pool.acquire().await;
                executor.execute_host(&host_id, &payload).await
            }));
        }

        let mut host_results = Vec::with_capacity(handles.len());
        for (host_id, handle) in job.hosts.iter().zip(handles) {
            match handle.await {
                Ok(result) => host_results.push(result),
                Err(join_err) => {
                    warn!(job_id = %job.id, host_id = %host_id, error = %join_err, "worker task panicked");
                    host_results.push(crate::execution::HostResult {
                        host_id: host_id.clone(),
                        success: false,
                        message: format!("worker task panicked: {join_err}"),
                        started_at: fired_at,
                        ended_at: Local::now(),
                    });
                }
            }
        }

        let record = ExecutionRecord::new(job.id.clone(), fired_at, host_results);
        self.audit.append(&record).await;

        let mut jobs = self.jobs.write().await;
        if let Some(slot) = jobs.get_mut(&job.id) {
            if slot.status != JobStatus::Cancelled {
                if job.is_continuous() {
                    slot.status = JobStatus::Pending;
                    slot.next_run_at = job.schedule.next_occurrence(fired_at, true);
                } else {
                    slot.status = record.status;
                    slot.next_run_at = None;
                }
            }
        }

        Ok(record)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::job::{Action, ActionPayload, ManagerEntry};
    use crate::providers::ProviderRegistry;
    use crate::redfish::fake::FakeTransport;
    use crate::registry::HostRegistry;
    use crate::schedule::{Schedule, TimeOfDay};
    use std::sync::Arc;
    use tempfile::tempdir;

    async fn scheduler_with_one_host(
        pool_size: usize,
    ) -> (Arc<JobScheduler<FakeTransport>>, Arc<HostRegistry<FakeTransport>>) {
        let registry = Arc::new(HostRegistry::new(Arc::new(FakeTransport::new())));
        registry
            .register(crate::host::HostDescriptor {
                id: "h1".into(),
                name: None,
                kind: crate::host::HostKind::Extended,
                endpoint: url::Url::parse("https://10.0.0.1").unwrap(),
                username: "u".into(),
                password: "p".into(),
                insecure_tls: true,
                timeout_seconds: 30,
                disable_etag_match: false,
            })
            .await
            .unwrap();
        let providers = Arc::new(ProviderRegistry::with_defaults());
        let executor = Arc::new(ActionExecutor::new(registry.clone(), providers));
        let dir = tempdir().unwrap();
        let audit = Arc::new(AuditSink::new(dir.path().to_path_buf()));
        let scheduler = Arc::new(JobScheduler::new(executor, audit, pool_size).unwrap());
        (scheduler, registry)
    }

    fn profile_payload() -> ActionPayload {
        ActionPayload::PatchProfile(vec![ManagerEntry {
            manager_id: "bmc".into(),
            body: serde_json::json!({ "profile": "Performance" }).as_object().unwrap().clone(),
        }])
    }

    #[tokio::test]
    async fn create_computes_next_run_at() {
        let (scheduler, _registry) = scheduler_with_one_host(4).await;
        let job = scheduler
            .create(JobCreateRequest {
                name: None,
                hosts: vec!["h1".into()],
                payload: profile_payload(),
                schedule: Schedule::Once {
                    time_of_day: TimeOfDay::parse("00:00:00").unwrap(),
                },
            })
            .await
            .unwrap();
        assert!(job.next_run_at.is_some());
        assert_eq!(job.status, JobStatus::Pending);
    }

    #[tokio::test]
    async fn trigger_now_fires_and_completes() {
        let (scheduler, _registry) = scheduler_with_one_host(4).await;
        let job = scheduler
            .create(JobCreateRequest {
                name: None,
                hosts: vec!["h1".into()],
                payload: profile_payload(),
                schedule: Schedule::Once {
                    time_of_day: TimeOfDay::parse("00:00:00").unwrap(),
                },
            })
            .await
            .unwrap();

        let record = scheduler.trigger_now(&job.id).await.unwrap();
        assert_eq!(record.host_results.len(), 1);
        assert!(record.host_results[0].success);
        assert_eq!(record.status, JobStatus::Completed);

        let refreshed = scheduler.get(&job.id).await.unwrap();
        assert_eq!(refreshed.execution_count, 1);
        assert_eq!(refreshed.status, JobStatus::Completed);
        assert!(refreshed.next_run_at.is_none());
    }

    #[tokio::test]
    async fn continuous_job_reschedules_after_firing() {
        let (scheduler, _registry) = scheduler_with_one_host(4).await;
        let job = scheduler
            .create(JobCreateRequest {
                name: None,
                hosts: vec!["h1".into()],
                payload: profile_payload(),
                schedule: Schedule::Continuous {
                    time_of_day: TimeOfDay::parse("00:00:00").unwrap(),
                    period: crate::schedule::Period {
                        days_of_week: [chrono::Weekday::Mon, chrono::Weekday::Tue, chrono::Weekday::Wed,
                                       chrono::Weekday::Thu, chrono::Weekday::Fri, chrono::Weekday::Sat,
                                       chrono::Weekday::Sun]
                            .into_iter()
                            .collect(),
                        ..Default::default()
                    },
                },
            })
            .await
            .unwrap();

        scheduler.trigger_now(&job.id).await.unwrap();
        let refreshed = scheduler.get(&job.id).await.unwrap();
        assert_eq!(refreshed.status, JobStatus::Pending);
        assert!(refreshed.next_run_at.is_some());
        assert!(refreshed.next_run_at.unwrap() > refreshed.last_run_at.unwrap());
    }

    #[tokio::test]
    async fn cancel_clears_next_run_at() {
        let (scheduler, _registry) = scheduler_with_one_host(4).await;
        let job = scheduler
            .create(JobCreateRequest {
                name: None,
                hosts: vec!["h1".into()],
                payload: profile_payload(),
                schedule: Schedule::Once {
                    time_of_day: TimeOfDay::parse("00:00:00").unwrap(),
                },
            })
            .await
            .unwrap();
        let cancelled = scheduler.cancel(&job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.next_run_at.is_none());
    }

    #[tokio::test]
    async fn cancel_while_running_lands_cancelled_and_suppresses_reschedule() {
        let (scheduler, _registry) = scheduler_with_one_host(4).await;
        let job = scheduler
            .create(JobCreateRequest {
                name: None,
                hosts: vec!["h1".into()],
                payload: profile_payload(),
                schedule: Schedule::Continuous {
                    time_of_day: TimeOfDay::parse("00:00:00").unwrap(),
                    period: crate::schedule::Period {
                        days_of_week: [chrono::Weekday::Mon, chrono::Weekday::Tue, chrono::Weekday::Wed,
                                       chrono::Weekday::Thu, chrono::Weekday::Fri, chrono::Weekday::Sat,
                                       chrono::Weekday::Sun]
                            .into_iter()
                            .collect(),
                        ..Default::default()
                    },
                },
            })
            .await
            .unwrap();

        // Simulate `fire` having already marked the job `Running` (the state
        // it is in for the whole window between its two lock acquisitions),
        // then cancel arriving mid-firing.
        {
            let mut jobs = scheduler.jobs.write().await;
            jobs.get_mut(&job.id).unwrap().status = JobStatus::Running;
        }
        let cancelled = scheduler.cancel(&job.id).await.unwrap();
        assert_eq!(cancelled.status, JobStatus::Cancelled);
        assert!(cancelled.next_run_at.is_none());

        // A subsequent `fire` attempt (e.g. a timer tick that queued right
        // before the cancel landed) must bail on the now-`Cancelled` status
        // rather than resurrect the job into `Pending` with a new
        // `nextRunAt`.
        let mut in_flight = job.clone();
        in_flight.status = JobStatus::Running;
        let err = scheduler.fire(in_flight).await.unwrap_err();
        assert!(matches!(err, FleetError::BadRequest(_)));

        let refreshed = scheduler.get(&job.id).await.unwrap();
        assert_eq!(refreshed.status, JobStatus::Cancelled);
        assert!(refreshed.next_run_at.is_none());
    }

    #[tokio::test]
    async fn unreachable_host_is_reported_without_aborting_the_job() {
        let (scheduler, registry) = scheduler_with_one_host(4).await;
        registry.unregister("h1").await.unwrap();
        let job = scheduler
            .create(JobCreateRequest {
                name: None,
                hosts: vec!["h1".into()],
                payload: profile_payload(),
                schedule: Schedule::Once {
                    time_of_day: TimeOfDay::parse("00:00:00").unwrap(),
                },
            })
            .await
            .unwrap();
        let record = scheduler.trigger_now(&job.id).await.unwrap();
        assert!(!record.host_results[0].success);
        assert_eq!(record.status, JobStatus::Failed);
    }

    #[tokio::test]
    async fn worker_pool_bounds_concurrent_fan_out() {
        let (scheduler, registry) = scheduler_with_one_host(1).await;
        registry
            .register(crate::host::HostDescriptor {
                id: "h2".into(),
                name: None,
                kind: crate::host::HostKind::Extended,
                endpoint: url::Url::parse("https://10.0.0.2").unwrap(),
                username: "u".into(),
                password: "p".into(),
                insecure_tls: true,
                timeout_seconds: 30,
                disable_etag_match: false,
            })
            .await
            .unwrap();
        assert_eq!(Action::PatchProfile, profile_payload().action());

        let job = scheduler
            .create(JobCreateRequest {
                name: None,
                hosts: vec!["h1".into(), "h2".into()],
                payload: profile_payload(),
                schedule: Schedule::Once {
                    time_of_day: TimeOfDay::parse("00:00:00").unwrap(),
                },
            })
            .await
            .unwrap();

        let record = scheduler.trigger_now(&job.id).await.unwrap();
        assert_eq!(record.host_results.len(), 2);
        assert!(record.host_results.iter().all(|r| r.success));
    }
}
