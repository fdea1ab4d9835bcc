//! `HostDescriptor`: registration input and persisted connection config.

use serde::{Deserialize, Serialize};
use url::Url;

use crate::error::{FleetError, FleetResult};

/// Fixed token substituted for `password` on every read path.
pub const REDACTED_TOKEN: &str = "<redacted>";

/// Capability class of a BMC's service root. Determines which provider
/// handles it in dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum HostKind {
    Standard,
    Extended,
}

impl Default for HostKind {
    fn default() -> Self {
        HostKind::Extended
    }
}

/// Registration input and persisted connection config for one BMC.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HostDescriptor {
    pub id: String,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub kind: HostKind,
    pub endpoint: Url,
    pub username: String,
    pub password: String,
    #[serde(default)]
    pub insecure_tls: bool,
    #[serde(default = "default_timeout_seconds")]
    pub timeout_seconds: u32,
    #[serde(default)]
    pub disable_etag_match: bool,
}

fn default_timeout_seconds() -> u32 {
    30
}

impl HostDescriptor {
    /// Validates the fields this descriptor must satisfy to be registered,
    /// independent of any upstream connect attempt.
    pub fn validate(&self) -> FleetResult<()> {
        if self.id.trim().is_empty() {
            return Err(FleetError::BadRequest("id must not be empty".into()));
        }
        if self.id.contains(['/', '#', '?']) {
            return Err(FleetError::BadRequest(
                "id must not contain reserved characters '/', '#', '?'".into(),
            ));
        }
        if self.username.trim().is_empty() {
            return Err(FleetError::BadRequest("username must not be empty".into()));
        }
        if self.password.is_empty() {
            return Err(FleetError::BadRequest("password must not be empty".into()));
        }
        match self.endpoint.scheme() {
            "http" | "https" => {}
            other => {
                return Err(FleetError::BadRequest(format!(
                    "endpoint scheme must be http or https, got '{other}'"
                )))
            }
        }
        if self.timeout_seconds < 1 {
            return Err(FleetError::BadRequest(
                "timeoutSeconds must be >= 1".into(),
            ));
        }
        Ok(())
    }

    /// Returns a copy with `password` replaced by [`REDACTED_TOKEN`]. Every
    /// read path (`list`, `get` projections) must go through this.
    pub fn redacted(&self) -> HostDescriptor {
        let mut copy = self.clone();
        copy.password = REDACTED_TOKEN.to_string();
        copy
    }
}

/// Sparse PATCH delta accepted by `HostRegistry::patch`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HostDescriptorDelta {
    #[serde(default)]
    pub endpoint: Option<Url>,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub timeout_seconds: Option<u32>,
    #[serde(default)]
    pub disable_etag_match: Option<bool>,
    #[serde(default)]
    pub kind: Option<HostKind>,
}
