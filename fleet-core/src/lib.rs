//! `fleet-core`: the Host Registry, Provider Dispatch, and Job Scheduler
//! that make up the Redfish/BMC fleet control-plane's tested surface. The
//! HTTP router, the real Redfish protocol client, and on-disk deployment
//! concerns are deliberately outside this crate (see `fleet-service`).

pub mod error;
pub mod execution;
pub mod host;
pub mod job;
pub mod providers;
pub mod redfish;
pub mod registry;
pub mod schedule;
pub mod scheduler;
pub mod validation;

pub use error::{FleetError, FleetResult};
pub use execution::{ExecutionRecord, HostResult};
pub use host::{HostDescriptor, HostDescriptorDelta, HostKind};
pub use job::{Action, ActionPayload, Job, JobCreateRequest, JobStatus, ManagerEntry, SubResourceEntry};
pub use providers::{Provider, ProviderRegistry};
pub use redfish::{ManagerHandle, RedfishTransport, ServiceRoot};
pub use registry::{HostRegistry, HostSession, PatchOutcome};
pub use schedule::{Period, Schedule, TimeOfDay};
pub use scheduler::{ActionExecutor, AuditSink, JobScheduler, PoolStatus, SchedulerStatus, WorkerPool};
pub use validation::{Facet, ValidationReport};
