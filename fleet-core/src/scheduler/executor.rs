//! Action Executor: the bridge between a job firing and Provider Dispatch.
//! For one `(host, action, payload)` it resolves the target Manager(s) via
//! the session's service root, then calls the matching provider method for
//! every per-Manager entry.

use std::sync::Arc;

use chrono::Local;
use serde_json::Map as JsonObject;
use serde_json::Value as JsonValue;
use tracing::instrument;

use crate::error::FleetResult;
use crate::execution::HostResult;
use crate::host::HostKind;
use crate::job::ActionPayload;
use crate::providers::ProviderRegistry;
use crate::redfish::{ManagerHandle, RedfishTransport};
use crate::registry::HostRegistry;

/// Resolves and applies one job's payload against one host, never
/// propagating a per-host failure - it is captured in the returned
/// [`HostResult`] instead.
pub struct ActionExecutor<T: RedfishTransport> {
    registry: Arc<HostRegistry<T>>,
    providers: Arc<ProviderRegistry>,
}

impl<T: RedfishTransport> ActionExecutor<T> {
    pub fn new(registry: Arc<HostRegistry<T>>, providers: Arc<ProviderRegistry>) -> Self {
        ActionExecutor { registry, providers }
    }

    #[instrument(skip(self, payload), fields(host_id = %host_id))]
    pub async fn execute_host(&self, host_id: &str, payload: &ActionPayload) -> HostResult {
        let started_at = Local::now();
        let outcome = self.execute_host_inner(host_id, payload).await;
        let ended_at = Local::now();
        match outcome {
            Ok(message) => HostResult {
                host_id: host_id.to_string(),
                success: true,
                message,
                started_at,
                ended_at,
            },
            Err(message) => HostResult {
                host_id: host_id.to_string(),
                success: false,
                message,
                started_at,
                ended_at,
            },
        }
    }

    async fn execute_host_inner(&self, host_id: &str, payload: &ActionPayload) -> Result<String, String> {
        let session = self
            .registry
            .get(host_id)
            .await
            .map_err(|_| format!("host '{host_id}' is not registered"))?;
        let kind = session.descriptor.kind;

        let mut applied = Vec::new();
        let mut failed = Vec::new();

        match payload {
            ActionPayload::PatchManager(entries) => {
                for entry in entries {
                    match self.patch_manager(host_id, kind, &entry.manager_id, &entry.body).await {
                        Ok(()) => applied.push(entry.manager_id.clone()),
                        Err(err) => failed.push(format!("{}: {err}", entry.manager_id)),
                    }
                }
            }
            ActionPayload::PatchProfile(entries) => {
                for entry in entries {
                    match self.patch_profile(host_id, kind, &entry.manager_id, &entry.body).await {
                        Ok(()) => applied.push(entry.manager_id.clone()),
                        Err(err) => failed.push(format!("{}: {err}", entry.manager_id)),
                    }
                }
            }
            ActionPayload::PatchFanController(entries) => {
                for entry in entries {
                    match self
                        .patch_fan_controller(host_id, kind, &entry.manager_id, &entry.sub_resource_id, &entry.body)
                        .await
                    {
                        Ok(()) => applied.push(format!("{}/{}", entry.manager_id, entry.sub_resource_id)),
                        Err(err) => failed.push(format!("{}/{}: {err}", entry.manager_id, entry.sub_resource_id)),
                    }
                }
            }
            ActionPayload::PatchFanZone(entries) => {
                for entry in entries {
                    match self
                        .patch_fan_zone(host_id, kind, &entry.manager_id, &entry.sub_resource_id, &entry.body)
                        .await
                    {
                        Ok(()) => applied.push(format!("{}/{}", entry.manager_id, entry.sub_resource_id)),
                        Err(err) => failed.push(format!("{}/{}: {err}", entry.manager_id, entry.sub_resource_id)),
                    }
                }
            }
            ActionPayload::PatchPidController(entries) => {
                for entry in entries {
                    match self
                        .patch_pid_controller(host_id, kind, &entry.manager_id, &entry.sub_resource_id, &entry.body)
                        .await
                    {
                        Ok(()) => applied.push(format!("{}/{}", entry.manager_id, entry.sub_resource_id)),
                        Err(err) => failed.push(format!("{}/{}: {err}", entry.manager_id, entry.sub_resource_id)),
                    }
                }
            }
        }

        if failed.is_empty() {
            Ok(format!(
                "{} applied to {}",
                payload.action(),
                applied.join(", ")
            ))
        } else {
            Err(failed.join("; "))
        }
    }

    async fn patch_manager(
        &self,
        host_id: &str,
        kind: HostKind,
        manager_id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        let provider = self.provider_for(kind)?;
        self.registry
            .with_service_root(host_id, |root| provider.patch_manager(root, manager_id, body))
            .await
    }

    async fn patch_profile(
        &self,
        host_id: &str,
        kind: HostKind,
        manager_id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        let provider = self.provider_for(kind)?;
        self.registry
            .with_service_root(host_id, |root| provider.patch_profile(root, manager_id, body))
            .await
    }

    async fn patch_fan_controller(
        &self,
        host_id: &str,
        kind: HostKind,
        manager_id: &str,
        fan_controller_id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        let provider = self.provider_for(kind)?;
        self.registry
            .with_service_root(host_id, |root| {
                provider.patch_fan_controller(root, manager_id, fan_controller_id, body)
            })
            .await
    }

    async fn patch_fan_zone(
        &self,
        host_id: &str,
        kind: HostKind,
        manager_id: &str,
        fan_zone_id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        let provider = self.provider_for(kind)?;
        self.registry
            .with_service_root(host_id, |root| {
                provider.patch_fan_zone(root, manager_id, fan_zone_id, body)
            })
            .await
    }

    async fn patch_pid_controller(
        &self,
        host_id: &str,
        kind: HostKind,
        manager_id: &str,
        pid_controller_id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        let provider = self.provider_for(kind)?;
        self.registry
            .with_service_root(host_id, |root| {
                provider.patch_pid_controller(root, manager_id, pid_controller_id, body)
            })
            .await
    }

    fn provider_for(&self, kind: HostKind) -> FleetResult<&dyn crate::providers::Provider> {
        let handle = ManagerHandle {
            kind,
            manager_id: String::new(),
        };
        self.providers.find_provider(&handle).ok_or_else(|| {
            crate::error::FleetError::Internal(format!("no provider registered for kind {kind:?}"))
        })
    }
}
