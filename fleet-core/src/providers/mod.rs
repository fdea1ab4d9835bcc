//! Provider Dispatch: routes an opaque `Manager` value to the vendor/
//! extension implementation of each capability, degrading gracefully (via a
//! typed `NotSupported` error) when a capability is absent.

pub mod extension;
pub mod standard;

use serde_json::Map as JsonObject;
use serde_json::Value as JsonValue;

use crate::error::{FleetError, FleetResult};
use crate::redfish::{ManagerHandle, ServiceRoot};

pub use extension::ExtensionProvider;
pub use standard::StandardProvider;

/// Declared type of a whitelisted PATCH field. `Number` accepts both
/// integer and float JSON numbers; `Null` matches only an explicit null.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TypeTag {
    String,
    Number,
    Bool,
    Null,
}

impl TypeTag {
    fn matches(self, value: &JsonValue) -> bool {
        match self {
            TypeTag::String => value.is_string(),
            TypeTag::Number => value.is_number(),
            TypeTag::Bool => value.is_boolean(),
            TypeTag::Null => value.is_null(),
        }
    }

    fn label(self) -> &'static str {
        match self {
            TypeTag::String => "string",
            TypeTag::Number => "number",
            TypeTag::Bool => "bool",
            TypeTag::Null => "null",
        }
    }
}

/// A closed set of `{fieldName -> typeTag}` describing exactly which PATCH
/// fields a resource accepts. Shared by every provider rather than
/// re-implemented per resource (spec §9's redesign note).
pub struct Whitelist(pub &'static [(&'static str, TypeTag)]);

impl Whitelist {
    /// Rejects any field not in the whitelist, then checks every present
    /// field's type tag. Semantic validation (allowed enum values, numeric
    /// ranges) happens after this passes, in the caller.
    pub fn validate(&self, body: &JsonObject<String, JsonValue>) -> FleetResult<()> {
        for (field, value) in body {
            match self.0.iter().find(|(name, _)| name == field) {
                None => {
                    return Err(FleetError::BadRequest(format!(
                        "field {field} not allowed; allowed: {}",
                        self.allowed_names()
                    )))
                }
                Some((_, tag)) => {
                    if !tag.matches(value) {
                        return Err(FleetError::BadRequest(format!(
                            "field '{field}' must be of type {}",
                            tag.label()
                        )));
                    }
                }
            }
        }
        Ok(())
    }

    fn allowed_names(&self) -> String {
        self.0
            .iter()
            .map(|(name, _)| *name)
            .collect::<Vec<_>>()
            .join(", ")
    }
}

/// Whitelist shared by both providers for the Manager-patch capability.
pub const MANAGER_WHITELIST: Whitelist = Whitelist(&[("serviceIdentification", TypeTag::String)]);

/// Whitelist for the Extension-only Profile-patch capability.
pub const PROFILE_WHITELIST: Whitelist = Whitelist(&[("profile", TypeTag::String)]);

/// Closed set of Profile values the Extension provider accepts.
pub const ALLOWED_PROFILES: &[&str] = &["Balanced", "Performance", "PowerSaver"];

/// Whitelist for FanController / FanZone PATCH bodies.
pub const FAN_WHITELIST: Whitelist = Whitelist(&[("desiredSpeedPwm", TypeTag::Number)]);

/// Whitelist for PidController PATCH bodies.
pub const PID_WHITELIST: Whitelist = Whitelist(&[("setPoint", TypeTag::Number)]);

fn not_supported(capability: &str, provider: &str) -> FleetError {
    FleetError::NotSupported(format!("{capability} is not supported by the {provider} provider"))
}

/// A bundle of capability methods keyed to a Manager variant. Every
/// provider must implement `Manager` get/patch; the OEM capabilities
/// default to `NotSupported` so a provider that lacks them (Standard) need
/// not override anything.
pub trait Provider: Send + Sync {
    fn type_name(&self) -> &'static str;

    fn supports(&self, handle: &ManagerHandle) -> bool;

    fn supports_collection(&self, handles: &[ManagerHandle]) -> bool {
        !handles.is_empty() && handles.iter().all(|h| self.supports(h))
    }

    fn get_manager(&self, root: &ServiceRoot, manager_id: &str) -> FleetResult<JsonValue>;

    fn patch_manager(
        &self,
        root: &mut ServiceRoot,
        manager_id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()>;

    fn get_profile(&self, _root: &ServiceRoot, _manager_id: &str) -> FleetResult<JsonValue> {
        Err(not_supported("Profile", self.type_name()))
    }

    fn patch_profile(
        &self,
        _root: &mut ServiceRoot,
        _manager_id: &str,
        _body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        Err(not_supported("Profile", self.type_name()))
    }

    fn list_fan_controllers(&self, _root: &ServiceRoot, _manager_id: &str) -> FleetResult<Vec<JsonValue>> {
        Err(not_supported("FanControllers", self.type_name()))
    }

    fn get_fan_controller(
        &self,
        _root: &ServiceRoot,
        _manager_id: &str,
        _id: &str,
    ) -> FleetResult<JsonValue> {
        Err(not_supported("FanControllers", self.type_name()))
    }

    fn patch_fan_controller(
        &self,
        _root: &mut ServiceRoot,
        _manager_id: &str,
        _id: &str,
        _body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        Err(not_supported("FanControllers", self.type_name()))
    }

    fn list_fan_zones(&self, _root: &ServiceRoot, _manager_id: &str) -> FleetResult<Vec<JsonValue>> {
        Err(not_supported("FanZones", self.type_name()))
    }

    fn get_fan_zone(&self, _root: &ServiceRoot, _manager_id: &str, _id: &str) -> FleetResult<JsonValue> {
        Err(not_supported("FanZones", self.type_name()))
    }

    fn patch_fan_zone(
        &self,
        _root: &mut ServiceRoot,
        _manager_id: &str,
        _id: &str,
        _body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        Err(not_supported("FanZones", self.type_name()))
    }

    fn list_pid_controllers(&self, _root: &ServiceRoot, _manager_id: &str) -> FleetResult<Vec<JsonValue>> {
        Err(not_supported("PidControllers", self.type_name()))
    }

    fn get_pid_controller(
        &self,
        _root: &ServiceRoot,
        _manager_id: &str,
        _id: &str,
    ) -> FleetResult<JsonValue> {
        Err(not_supported("PidControllers", self.type_name()))
    }

    fn patch_pid_controller(
        &self,
        _root: &mut ServiceRoot,
        _manager_id: &str,
        _id: &str,
        _body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        Err(not_supported("PidControllers", self.type_name()))
    }
}

/// Providers registered in priority order; `find_provider` returns the
/// first whose `supports` is true.
pub struct ProviderRegistry {
    providers: Vec<Box<dyn Provider>>,
}

impl ProviderRegistry {
    pub fn new() -> Self {
        ProviderRegistry {
            providers: Vec::new(),
        }
    }

    /// The default registry: `Standard` then `Extension`, so a Standard
    /// handle never matches the Extension provider even though Extension
    /// could technically claim anything.
    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(StandardProvider));
        registry.register(Box::new(ExtensionProvider));
        registry
    }

    pub fn register(&mut self, provider: Box<dyn Provider>) {
        self.providers.push(provider);
    }

    pub fn find_provider(&self, handle: &ManagerHandle) -> Option<&dyn Provider> {
        self.providers
            .iter()
            .map(|p| p.as_ref())
            .find(|p| p.supports(handle))
    }

    pub fn find_provider_for_collection(&self, handles: &[ManagerHandle]) -> Option<&dyn Provider> {
        self.providers
            .iter()
            .map(|p| p.as_ref())
            .find(|p| p.supports_collection(handles))
    }
}

impl Default for ProviderRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}
