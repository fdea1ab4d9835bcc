//! The Redfish client boundary. The real protocol client (GET/PATCH, ETag
//! handling, session login/logout) is explicitly out of scope and consumed
//! as a library; this module defines only the seam `fleet-core` needs:
//! connecting to get a populated [`ServiceRoot`] and logging out of it.
//! Everything downstream (Manager PATCHes) operates on the in-memory
//! `ServiceRoot` the connect call already populated, so `Provider` methods
//! never need to perform I/O of their own.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::{FleetError, FleetResult};
use crate::host::{HostDescriptor, HostKind};

/// A single fan controller sub-resource under an Extended Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanController {
    pub id: String,
    pub desired_speed_pwm: u8,
}

/// A single fan zone sub-resource under an Extended Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FanZone {
    pub id: String,
    pub desired_speed_pwm: u8,
}

/// A single PID controller sub-resource under an Extended Manager.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PidController {
    pub id: String,
    pub set_point: f64,
}

/// The baseline Manager variant: no OEM extensions.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardManager {
    pub id: String,
    pub service_identification: Option<String>,
}

/// The vendor-extended Manager variant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExtendedManager {
    pub id: String,
    pub service_identification: Option<String>,
    pub profile: String,
    pub fan_controllers: Vec<FanController>,
    pub fan_zones: Vec<FanZone>,
    pub pid_controllers: Vec<PidController>,
}

/// The top-level Redfish object for a host; its variant determines which
/// provider applies.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum ServiceRoot {
    Standard(Vec<StandardManager>),
    Extended(Vec<ExtendedManager>),
}

impl ServiceRoot {
    pub fn kind(&self) -> HostKind {
        match self {
            ServiceRoot::Standard(_) => HostKind::Standard,
            ServiceRoot::Extended(_) => HostKind::Extended,
        }
    }

    pub fn manager_ids(&self) -> Vec<&str> {
        match self {
            ServiceRoot::Standard(managers) => managers.iter().map(|m| m.id.as_str()).collect(),
            ServiceRoot::Extended(managers) => managers.iter().map(|m| m.id.as_str()).collect(),
        }
    }

    pub fn contains_manager(&self, manager_id: &str) -> bool {
        self.manager_ids().iter().any(|id| *id == manager_id)
    }
}

/// Opaque value produced by a `HostSession` representing one Manager
/// resource plus the provider class needed to interpret it. Dispatch
/// inspects only `kind`, never the Manager's own fields - those stay behind
/// the `ServiceRoot` the owning `HostSession` holds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ManagerHandle {
    pub kind: HostKind,
    pub manager_id: String,
}

/// The out-of-scope Redfish protocol client, reduced to the seam
/// `fleet-core` depends on: establishing and tearing down the authenticated
/// session that produces a host's `ServiceRoot`.
#[async_trait]
pub trait RedfishTransport: Send + Sync {
    /// Login plus service-root fetch. Bounded by the descriptor's
    /// `timeout_seconds` plus a TLS handshake timeout; failures of any kind
    /// (DNS, TLS, auth, timeout) surface as `FleetError::Upstream`.
    async fn connect(&self, descriptor: &HostDescriptor) -> FleetResult<ServiceRoot>;

    /// Session logout. Best-effort; the registry still tears down local
    /// state even if this fails.
    async fn logout(&self, descriptor: &HostDescriptor) -> FleetResult<()>;
}

/// Maps a transport-level failure description into the taxonomy's
/// `Upstream` variant; the one place registry code should reach for when
/// wrapping a connect/logout failure.
pub fn upstream_error(context: &str, cause: impl std::fmt::Display) -> FleetError {
    FleetError::Upstream(format!("{context}: {cause}"))
}

/// In-memory fake transport used by tests (and by `fleet-service`'s demo
/// mode) so nothing in this workspace performs real network I/O. Hosts
/// whose id ends in `"-fails"` simulate an upstream connect failure.
pub mod fake {
    use super::*;
    use dashmap::DashMap;

    #[derive(Default)]
    pub struct FakeTransport {
        seed: DashMap<String, ServiceRoot>,
    }

    impl FakeTransport {
        pub fn new() -> Self {
            Self::default()
        }

        /// Seeds the fake upstream state that `connect` will return for a
        /// given host id, so tests can control what a session observes.
        pub fn seed(&self, host_id: impl Into<String>, root: ServiceRoot) {
            self.seed.insert(host_id.into(), root);
        }
    }

    #[async_trait]
    impl RedfishTransport for FakeTransport {
        async fn connect(&self, descriptor: &HostDescriptor) -> FleetResult<ServiceRoot> {
            if descriptor.id.ends_with("-fails") {
                return Err(upstream_error(
                    "connect",
                    "simulated upstream connect failure",
                ));
            }
            if let Some(root) = self.seed.get(&descriptor.id) {
                return Ok(root.clone());
            }
            Ok(match descriptor.kind {
                HostKind::Standard => ServiceRoot::Standard(vec![StandardManager {
                    id: "bmc".to_string(),
                    service_identification: None,
                }]),
                HostKind::Extended => ServiceRoot::Extended(vec![ExtendedManager {
                    id: "bmc".to_string(),
                    service_identification: None,
                    profile: "Balanced".to_string(),
                    fan_controllers: vec![FanController {
                        id: "fan0".to_string(),
                        desired_speed_pwm: 50,
                    }],
                    fan_zones: vec![FanZone {
                        id: "zone0".to_string(),
                        desired_speed_pwm: 50,
                    }],
                    pid_controllers: vec![PidController {
                        id: "pid0".to_string(),
                        set_point: 45.0,
                    }],
                }]),
            })
        }

        async fn logout(&self, _descriptor: &HostDescriptor) -> FleetResult<()> {
            Ok(())
        }
    }
}
