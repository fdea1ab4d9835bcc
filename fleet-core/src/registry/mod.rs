//! Host Registry: owns every `HostSession`. All mutation is serialized
//! under a single write lock; reads proceed under a read lock. The registry
//! is the sole creator and destroyer of authenticated sessions.

use std::collections::HashMap;
use std::sync::Arc;

use tokio::sync::RwLock;
use tracing::{info, instrument, warn};

use crate::error::{FleetError, FleetResult};
use crate::host::{HostDescriptor, HostDescriptorDelta, HostKind};
use crate::redfish::{RedfishTransport, ServiceRoot};

/// Parameters a real Redfish client would use to build its pooled HTTP
/// transport. `fleet-core` carries these on the session so a concrete
/// `RedfishTransport` has everything it needs; it does not construct the
/// pool itself (the real HTTP client is out of scope).
#[derive(Debug, Clone, Copy)]
pub struct PooledTransportConfig {
    pub max_idle_connections: u32,
    pub max_idle_per_host: u32,
    pub idle_timeout_seconds: u32,
    pub tls_handshake_timeout_seconds: u32,
    pub insecure_tls: bool,
}

impl PooledTransportConfig {
    fn for_descriptor(descriptor: &HostDescriptor) -> Self {
        PooledTransportConfig {
            max_idle_connections: 100,
            max_idle_per_host: 10,
            idle_timeout_seconds: 90,
            tls_handshake_timeout_seconds: 10,
            insecure_tls: descriptor.insecure_tls,
        }
    }
}

/// Runtime state for a connected host; owned exclusively by the registry.
#[derive(Clone)]
pub struct HostSession {
    pub descriptor: HostDescriptor,
    pub service_root: ServiceRoot,
    pub transport_config: PooledTransportConfig,
    /// Bumped every time the session is torn down and rebuilt.
    pub generation: u64,
}

impl HostSession {
    pub fn kind(&self) -> HostKind {
        self.descriptor.kind
    }
}

/// Whether `patch` tore down and rebuilt the session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PatchOutcome {
    pub reconnected: bool,
}

/// Owns every `HostSession`, generic over the Redfish transport so
/// production code and tests can inject different implementations without
/// a process-wide singleton (spec §9's "global singletons" design note).
pub struct HostRegistry<T: RedfishTransport> {
    transport: Arc<T>,
    sessions: Arc<RwLock<HashMap<String, HostSession>>>,
}

impl<T: RedfishTransport> HostRegistry<T> {
    pub fn new(transport: Arc<T>) -> Self {
        HostRegistry {
            transport,
            sessions: Arc::new(RwLock::new(HashMap::new())),
        }
    }

    /// Validates, connects, and stores a new session. Atomic: either a
    /// session is fully constructed and registered, or nothing is - a
    /// connect failure after validation leaves the registry untouched and
    /// leaks no resources.
    #[instrument(skip(self, descriptor), fields(host_id = %descriptor.id))]
    pub async fn register(&self, descriptor: HostDescriptor) -> FleetResult<()> {
        descriptor.validate()?;
        {
            let sessions = self.sessions.read().await;
            if sessions.contains_key(&descriptor.id) {
                return Err(FleetError::AlreadyExists(format!(
                    "host '{}' is already registered",
                    descriptor.id
                )));
            }
        }

        let service_root = self.transport.connect(&descriptor).await?;
        let session = HostSession {
            transport_config: PooledTransportConfig::for_descriptor(&descriptor),
            descriptor,
            service_root,
            generation: 0,
        };

        let mut sessions = self.sessions.write().await;
        if sessions.contains_key(&session.descriptor.id) {
            // Lost a race against a concurrent register for the same id;
            // tear down the session we just built so nothing leaks.
            let _ = self.transport.logout(&session.descriptor).await;
            return Err(FleetError::AlreadyExists(format!(
                "host '{}' is already registered",
                session.descriptor.id
            )));
        }
        info!(host_id = %session.descriptor.id, "host registered");
        sessions.insert(session.descriptor.id.clone(), session);
        Ok(())
    }

    /// Returns an owned snapshot of the session so callers can perform
    /// upstream calls without holding the registry lock.
    pub async fn get(&self, id: &str) -> FleetResult<HostSession> {
        let sessions = self.sessions.read().await;
        sessions
            .get(id)
            .cloned()
            .ok_or_else(|| FleetError::NotFound(format!("host '{id}' not found")))
    }

    /// Applies `f` to the stored service root in place, under the write
    /// lock. `f` is synchronous and in-memory only (no upstream I/O lives
    /// behind a provider dispatch call), so the lock is held only for the
    /// duration of one PATCH's validation and mutation.
    pub async fn with_service_root<R>(
        &self,
        id: &str,
        f: impl FnOnce(&mut ServiceRoot) -> FleetResult<R>,
    ) -> FleetResult<R> {
        let mut sessions = self.sessions.write().await;
        let session = sessions
            .get_mut(id)
            .ok_or_else(|| FleetError::NotFound(format!("host '{id}' not found")))?;
        f(&mut session.service_root)
    }

    /// Every registered host's descriptor, with its password redacted.
    pub async fn list(&self) -> Vec<HostDescriptor> {
        let sessions = self.sessions.read().await;
        sessions
            .values()
            .map(|session| session.descriptor.redacted())
            .collect()
    }

    /// Applies a sparse delta. A change to `{endpoint, username, password,
    /// kind}` tears down and rebuilds the session immediately so subsequent
    /// operations always observe the new configuration (the core resolves
    /// spec §9's "reconnect-after-patch" open question as tear-down, not a
    /// deferred flag - see DESIGN.md). `timeoutSeconds` and
    /// `disableEtagMatch` take effect in place with no reconnect.
    #[instrument(skip(self, delta), fields(host_id = %id))]
    pub async fn patch(&self, id: &str, delta: HostDescriptorDelta) -> FleetResult<PatchOutcome> {
        let current = {
            let sessions = self.sessions.read().await;
            sessions
                .get(id)
                .cloned()
                .ok_or_else(|| FleetError::NotFound(format!("host '{id}' not found")))?
        };

        let mut next_descriptor = current.descriptor.clone();
        if let Some(endpoint) = delta.endpoint {
            next_descriptor.endpoint = endpoint;
        }
        if let Some(username) = delta.username {
            next_descriptor.username = username;
        }
        if let Some(password) = delta.password {
            next_descriptor.password = password;
        }
        if let Some(kind) = delta.kind {
            next_descriptor.kind = kind;
        }
        if let Some(timeout) = delta.timeout_seconds {
            next_descriptor.timeout_seconds = timeout;
        }
        if let Some(disable) = delta.disable_etag_match {
            next_descriptor.disable_etag_match = disable;
        }
        next_descriptor.validate()?;

        let reconnect_required = delta_requires_reconnect(&delta);
        let (service_root, generation) = if reconnect_required {
            let _ = self.transport.logout(&current.descriptor).await;
            let service_root = self.transport.connect(&next_descriptor).await?;
            (service_root, current.generation + 1)
        } else {
            (current.service_root.clone(), current.generation)
        };

        let mut sessions = self.sessions.write().await;
        let slot = sessions
            .get_mut(id)
            .ok_or_else(|| FleetError::NotFound(format!("host '{id}' not found")))?;
        slot.transport_config = PooledTransportConfig::for_descriptor(&next_descriptor);
        slot.descriptor = next_descriptor;
        slot.service_root = service_root;
        slot.generation = generation;

        Ok(PatchOutcome {
            reconnected: reconnect_required,
        })
    }

    /// Logs the session out, closes it, and removes it from the map.
    #[instrument(skip(self), fields(host_id = %id))]
    pub async fn unregister(&self, id: &str) -> FleetResult<()> {
        let descriptor = {
            let mut sessions = self.sessions.write().await;
            sessions
                .remove(id)
                .map(|session| session.descriptor)
                .ok_or_else(|| FleetError::NotFound(format!("host '{id}' not found")))?
        };
        if let Err(err) = self.transport.logout(&descriptor).await {
            warn!(host_id = %id, error = %err, "logout failed during unregister");
        }
        Ok(())
    }

    /// Unregisters every session. Called during graceful shutdown.
    pub async fn shutdown_all(&self) {
        let ids: Vec<String> = {
            let sessions = self.sessions.read().await;
            sessions.keys().cloned().collect()
        };
        for id in ids {
            if let Err(err) = self.unregister(&id).await {
                warn!(host_id = %id, error = %err, "error during shutdown_all");
            }
        }
    }
}

fn delta_requires_reconnect(delta: &HostDescriptorDelta) -> bool {
    delta.endpoint.is_some()
        || delta.username.is_some()
        || delta.password.is_some()
        || delta.kind.is_some()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::host::REDACTED_TOKEN;
    use crate::redfish::fake::FakeTransport;
    use url::Url;

    fn descriptor(id: &str) -> HostDescriptor {
        HostDescriptor {
            id: id.to_string(),
            name: None,
            kind: HostKind::Extended,
            endpoint: Url::parse("https://10.0.0.1").unwrap(),
            username: "u".to_string(),
            password: "p".to_string(),
            insecure_tls: true,
            timeout_seconds: 30,
            disable_etag_match: false,
        }
    }

    #[tokio::test]
    async fn register_then_list_redacts_password() {
        let registry = HostRegistry::new(Arc::new(FakeTransport::new()));
        registry.register(descriptor("h1")).await.unwrap();
        let listed = registry.list().await;
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].password, REDACTED_TOKEN);
        assert_eq!(listed[0].id, "h1");
    }

    #[tokio::test]
    async fn duplicate_register_is_rejected() {
        let registry = HostRegistry::new(Arc::new(FakeTransport::new()));
        registry.register(descriptor("h1")).await.unwrap();
        let err = registry.register(descriptor("h1")).await.unwrap_err();
        assert!(matches!(err, FleetError::AlreadyExists(_)));
    }

    #[tokio::test]
    async fn register_surfaces_upstream_failure() {
        let registry = HostRegistry::new(Arc::new(FakeTransport::new()));
        let err = registry.register(descriptor("h1-fails")).await.unwrap_err();
        assert!(matches!(err, FleetError::Upstream(_)));
        assert!(registry.get("h1-fails").await.is_err());
    }

    #[tokio::test]
    async fn register_then_unregister_restores_prior_state() {
        let registry = HostRegistry::new(Arc::new(FakeTransport::new()));
        registry.register(descriptor("h1")).await.unwrap();
        registry.unregister("h1").await.unwrap();
        assert_eq!(registry.list().await.len(), 0);
    }

    #[tokio::test]
    async fn timeout_patch_does_not_reconnect() {
        let registry = HostRegistry::new(Arc::new(FakeTransport::new()));
        registry.register(descriptor("h1")).await.unwrap();
        let outcome = registry
            .patch(
                "h1",
                HostDescriptorDelta {
                    timeout_seconds: Some(60),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(!outcome.reconnected);
        let session = registry.get("h1").await.unwrap();
        assert_eq!(session.descriptor.timeout_seconds, 60);
        assert_eq!(session.generation, 0);
    }

    #[tokio::test]
    async fn credential_patch_reconnects() {
        let registry = HostRegistry::new(Arc::new(FakeTransport::new()));
        registry.register(descriptor("h1")).await.unwrap();
        let outcome = registry
            .patch(
                "h1",
                HostDescriptorDelta {
                    password: Some("new-password".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();
        assert!(outcome.reconnected);
        let session = registry.get("h1").await.unwrap();
        assert_eq!(session.generation, 1);
    }
}
