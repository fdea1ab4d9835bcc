//! The vendor-extended provider: every capability in the catalogue, with
//! closed-set/numeric-range semantic validation beyond the shared whitelist
//! type checks.

use serde_json::json;
use serde_json::Map as JsonObject;
use serde_json::Value as JsonValue;

use crate::error::{FleetError, FleetResult};
use crate::host::HostKind;
use crate::redfish::{ExtendedManager, FanController, FanZone, ManagerHandle, PidController, ServiceRoot};

use super::{Provider, ALLOWED_PROFILES, FAN_WHITELIST, MANAGER_WHITELIST, PID_WHITELIST, PROFILE_WHITELIST};

/// `desiredSpeedPwm` is a percentage.
const FAN_SPEED_RANGE: std::ops::RangeInclusive<f64> = 0.0..=100.0;
/// `setPoint` is a temperature in degrees Celsius.
const PID_SET_POINT_RANGE: std::ops::RangeInclusive<f64> = 0.0..=150.0;

pub struct ExtensionProvider;

impl ExtensionProvider {
    fn find<'a>(root: &'a ServiceRoot, manager_id: &str) -> FleetResult<&'a ExtendedManager> {
        match root {
            ServiceRoot::Extended(managers) => managers
                .iter()
                .find(|m| m.id == manager_id)
                .ok_or_else(|| FleetError::NotFound(format!("manager '{manager_id}' not found"))),
            ServiceRoot::Standard(_) => Err(FleetError::Internal(
                "ExtensionProvider invoked against a Standard service root".into(),
            )),
        }
    }

    fn find_mut<'a>(root: &'a mut ServiceRoot, manager_id: &str) -> FleetResult<&'a mut ExtendedManager> {
        match root {
            ServiceRoot::Extended(managers) => managers
                .iter_mut()
                .find(|m| m.id == manager_id)
                .ok_or_else(|| FleetError::NotFound(format!("manager '{manager_id}' not found"))),
            ServiceRoot::Standard(_) => Err(FleetError::Internal(
                "ExtensionProvider invoked against a Standard service root".into(),
            )),
        }
    }

    fn numeric_field(body: &JsonObject<String, JsonValue>, field: &str) -> Option<f64> {
        body.get(field).and_then(|v| v.as_f64())
    }
}

fn fan_controller_json(fan: &FanController) -> JsonValue {
    json!({ "id": fan.id, "desiredSpeedPwm": fan.desired_speed_pwm })
}

fn fan_zone_json(zone: &FanZone) -> JsonValue {
    json!({ "id": zone.id, "desiredSpeedPwm": zone.desired_speed_pwm })
}

fn pid_controller_json(pid: &PidController) -> JsonValue {
    json!({ "id": pid.id, "setPoint": pid.set_point })
}

impl Provider for ExtensionProvider {
    fn type_name(&self) -> &'static str {
        "Extension"
    }

    fn supports(&self, handle: &ManagerHandle) -> bool {
        handle.kind == HostKind::Extended
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

    fn get_profile(&self, root: &ServiceRoot, manager_id: &str) -> FleetResult<JsonValue> {
        let manager = Self::find(root, manager_id)?;
        Ok(json!({ "profile": manager.profile }))
    }

    fn patch_profile(
        &self,
        root: &mut ServiceRoot,
        manager_id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        PROFILE_WHITELIST.validate(body)?;
        let profile = body
            .get("profile")
            .and_then(|v| v.as_str())
            .ok_or_else(|| FleetError::BadRequest("profile is required".into()))?;
        if !ALLOWED_PROFILES.contains(&profile) {
            return Err(FleetError::BadRequest(format!(
                "profile '{profile}' is not one of the allowed values: {}",
                ALLOWED_PROFILES.join(", ")
            )));
        }
        let manager = Self::find_mut(root, manager_id)?;
        manager.profile = profile.to_string();
        Ok(())
    }

    fn list_fan_controllers(&self, root: &ServiceRoot, manager_id: &str) -> FleetResult<Vec<JsonValue>> {
        let manager = Self::find(root, manager_id)?;
        Ok(manager.fan_controllers.iter().map(fan_controller_json).collect())
    }

    fn get_fan_controller(&self, root: &ServiceRoot, manager_id: &str, id: &str) -> FleetResult<JsonValue> {
        let manager = Self::find(root, manager_id)?;
        manager
            .fan_controllers
            .iter()
            .find(|f| f.id == id)
            .map(fan_controller_json)
            .ok_or_else(|| FleetError::NotFound(format!("fan controller '{id}' not found")))
    }

    fn patch_fan_controller(
        &self,
        root: &mut ServiceRoot,
        manager_id: &str,
        id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        FAN_WHITELIST.validate(body)?;
        let speed = Self::numeric_field(body, "desiredSpeedPwm");
        if let Some(speed) = speed {
            if !FAN_SPEED_RANGE.contains(&speed) {
                return Err(FleetError::BadRequest(format!(
                    "desiredSpeedPwm {speed} out of range {}-{}",
                    FAN_SPEED_RANGE.start(),
                    FAN_SPEED_RANGE.end()
                )));
            }
        }
        let manager = Self::find_mut(root, manager_id)?;
        let fan = manager
            .fan_controllers
            .iter_mut()
            .find(|f| f.id == id)
            .ok_or_else(|| FleetError::NotFound(format!("fan controller '{id}' not found")))?;
        if let Some(speed) = speed {
            fan.desired_speed_pwm = speed as u8;
        }
        Ok(())
    }

    fn list_fan_zones(&self, root: &ServiceRoot, manager_id: &str) -> FleetResult<Vec<JsonValue>> {
        let manager = Self::find(root, manager_id)?;
        Ok(manager.fan_zones.iter().map(fan_zone_json).collect())
    }

    fn get_fan_zone(&self, root: &ServiceRoot, manager_id: &str, id: &str) -> FleetResult<JsonValue> {
        let manager = Self::find(root, manager_id)?;
        manager
            .fan_zones
            .iter()
            .find(|z| z.id == id)
            .map(fan_zone_json)
            .ok_or_else(|| FleetError::NotFound(format!("fan zone '{id}' not found")))
    }

    fn patch_fan_zone(
        &self,
        root: &mut ServiceRoot,
        manager_id: &str,
        id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        FAN_WHITELIST.validate(body)?;
        let speed = Self::numeric_field(body, "desiredSpeedPwm");
        if let Some(speed) = speed {
            if !FAN_SPEED_RANGE.contains(&speed) {
                return Err(FleetError::BadRequest(format!(
                    "desiredSpeedPwm {speed} out of range {}-{}",
                    FAN_SPEED_RANGE.start(),
                    FAN_SPEED_RANGE.end()
                )));
            }
        }
        let manager = Self::find_mut(root, manager_id)?;
        let zone = manager
            .fan_zones
            .iter_mut()
            .find(|z| z.id == id)
            .ok_or_else(|| FleetError::NotFound(format!("fan zone '{id}' not found")))?;
        if let Some(speed) = speed {
            zone.desired_speed_pwm = speed as u8;
        }
        Ok(())
    }

    fn list_pid_controllers(&self, root: &ServiceRoot, manager_id: &str) -> FleetResult<Vec<JsonValue>> {
        let manager = Self::find(root, manager_id)?;
        Ok(manager.pid_controllers.iter().map(pid_controller_json).collect())
    }

    fn get_pid_controller(&self, root: &ServiceRoot, manager_id: &str, id: &str) -> FleetResult<JsonValue> {
        let manager = Self::find(root, manager_id)?;
        manager
            .pid_controllers
            .iter()
            .find(|p| p.id == id)
            .map(pid_controller_json)
            .ok_or_else(|| FleetError::NotFound(format!("pid controller '{id}' not found")))
    }

    fn patch_pid_controller(
        &self,
        root: &mut ServiceRoot,
        manager_id: &str,
        id: &str,
        body: &JsonObject<String, JsonValue>,
    ) -> FleetResult<()> {
        PID_WHITELIST.validate(body)?;
        let set_point = Self::numeric_field(body, "setPoint");
        if let Some(set_point) = set_point {
            if !PID_SET_POINT_RANGE.contains(&set_point) {
                return Err(FleetError::BadRequest(format!(
                    "setPoint {set_point} out of range {}-{}",
                    PID_SET_POINT_RANGE.start(),
                    PID_SET_POINT_RANGE.end()
                )));
            }
        }
        let manager = Self::find_mut(root, manager_id)?;
        let pid = manager
            .pid_controllers
            .iter_mut()
            .find(|p| p.id == id)
            .ok_or_else(|| FleetError::NotFound(format!("pid controller '{id}' not found")))?;
        if let Some(set_point) = set_point {
            pid.set_point = set_point;
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::redfish::ExtendedManager;

    fn root() -> ServiceRoot {
        ServiceRoot::Extended(vec![ExtendedManager {
            id: "bmc".into(),
            service_identification: None,
            profile: "Balanced".into(),
            fan_controllers: vec![FanController {
                id: "fan0".into(),
                desired_speed_pwm: 50,
            }],
            fan_zones: vec![FanZone {
                id: "zone0".into(),
                desired_speed_pwm: 50,
            }],
            pid_controllers: vec![PidController {
                id: "pid0".into(),
                set_point: 45.0,
            }],
        }])
    }

    #[test]
    fn rejects_profile_outside_closed_set() {
        let provider = ExtensionProvider;
        let mut root = root();
        let mut body = JsonObject::new();
        body.insert("profile".into(), json!("Overclocked"));
        let err = provider.patch_profile(&mut root, "bmc", &body).unwrap_err();
        assert!(matches!(err, FleetError::BadRequest(_)));
    }

    #[test]
    fn accepts_profile_in_closed_set() {
        let provider = ExtensionProvider;
        let mut root = root();
        let mut body = JsonObject::new();
        body.insert("profile".into(), json!("Performance"));
        provider.patch_profile(&mut root, "bmc", &body).unwrap();
        let view = provider.get_profile(&root, "bmc").unwrap();
        assert_eq!(view["profile"], json!("Performance"));
    }

    #[test]
    fn rejects_fan_speed_out_of_range() {
        let provider = ExtensionProvider;
        let mut root = root();
        let mut body = JsonObject::new();
        body.insert("desiredSpeedPwm".into(), json!(150));
        let err = provider
            .patch_fan_controller(&mut root, "bmc", "fan0", &body)
            .unwrap_err();
        assert!(matches!(err, FleetError::BadRequest(_)));
    }

    #[test]
    fn patches_pid_set_point() {
        let provider = ExtensionProvider;
        let mut root = root();
        let mut body = JsonObject::new();
        body.insert("setPoint".into(), json!(60.5));
        provider.patch_pid_controller(&mut root, "bmc", "pid0", &body).unwrap();
        let view = provider.get_pid_controller(&root, "bmc", "pid0").unwrap();
        assert_eq!(view["setPoint"], json!(60.5));
    }
}
