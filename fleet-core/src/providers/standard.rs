//! The baseline provider: handles only the `Standard` Manager variant and
//! only its Manager-patch capability. Every OEM capability falls through to
//! the trait's default `NotSupported` implementation.

use serde_json::json;
use serde_json::Map as JsonObject;
use serde_json::Value as JsonValue;

use crate::error::{FleetError, FleetResult};
use crate::host::HostKind;
use crate::redfish::{ManagerHandle, ServiceRoot};

use super::{Provider, MANAGER_WHITELIST};

pub struct StandardProvider;

impl StandardProvider {
    fn find<'a>(root: &'a ServiceRoot, manager_id: &str) -> FleetResult<&'a crate::redfish::StandardManager> {
        match root {
            ServiceRoot::Standard(managers) => managers
                .iter()
                .find(|m| m.id == manager_id)
                .ok_or_else(|| FleetError::NotFound(format!("manager '{manager_id}' not found"))),
            ServiceRoot::Extended(_) => Err(FleetError::Internal(
                "StandardProvider invoked against an Extended service root".into(),
            )),
        }
    }

    fn find_mut<'a>(
        root: &'a mut ServiceRoot,
        manager_id: &str,
    ) -> FleetResult<&'a mut crate::redfish::StandardManager> {
        match root {
            ServiceRoot::Standard(managers) => managers
                .iter_mut()
                .find(|m| m.id == manager_id)
                .ok_or_else(|| FleetError::NotFound(format!("manager '{manager_id}' not found"))),
            ServiceRoot::Extended(_) => Err(FleetError::Internal(
                "StandardProvider invoked against an Extended service root".into(),
            )),
        }
    }
}

impl Provider for StandardProvider {
    fn type_name(&self) -> &'static str {
        "Standard"
    }

    fn supports(&self, handle: &ManagerHandle) -> bool {
        handle.kind == HostKind::Standard
    }

    fn get_manager(&self, root: &ServiceRoot, manager_id: &str) -> FleetResult<JsonValue> {
        let manager = Self::find(root, manager_id)?;
        Ok(json!({
            "id": manager.id,
            "serviceIdentification": manager.service_identification,
        }))
    }

    fn patch_manager(
        &self,
        root: &mut ServiceRoot,
        manager_id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        MANAGER_WHITELIST.validate(body)?;
        let manager = Self::find_mut(root, manager_id)?;
        if let Some(value) = body.get("serviceIdentification") {
            manager.service_identification = value.as_str().map(|s| s.to_string());
        }
        Ok(())
    }
}
