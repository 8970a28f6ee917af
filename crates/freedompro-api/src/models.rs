// Wire types for the Freedompro REST API.
//
// Field names follow the cloud's camelCase JSON. Missing descriptive strings
// default to empty so a partially filled device record still reconciles.

use serde::{Deserialize, Serialize};

/// Legacy defaults for accessories discovered through the flat accessory list.
pub const LEGACY_MANUFACTURER: &str = "Freedompro";
pub const LEGACY_MODEL: &str = "LightSwitch";
pub const LEGACY_PLACEHOLDER: &str = "-";

/// A remote device and the accessories it exposes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceDescriptor {
    pub uid: String,
    #[serde(default)]
    pub manufacturer: String,
    #[serde(default)]
    pub model: String,
    #[serde(default)]
    pub serial_number: String,
    #[serde(default)]
    pub home: String,
    #[serde(default)]
    pub accessories: Vec<AccessoryDescriptor>,
}

/// A single switchable accessory, unique within its device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryDescriptor {
    pub uid: String,
    #[serde(default)]
    pub name: String,
}

impl AccessoryDescriptor {
    /// Wrap a flat legacy accessory into a pseudo-device of its own.
    ///
    /// The legacy listing carries no device metadata, so the accessory uid
    /// doubles as the device uid and the descriptive fields use fixed values.
    pub fn into_legacy_device(self) -> DeviceDescriptor {
        DeviceDescriptor {
            uid: self.uid.clone(),
            manufacturer: LEGACY_MANUFACTURER.into(),
            model: LEGACY_MODEL.into(),
            serial_number: LEGACY_PLACEHOLDER.into(),
            home: LEGACY_PLACEHOLDER.into(),
            accessories: vec![self],
        }
    }
}

/// On/off state as reported or accepted by the cloud: `{ "on": bool }`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct SwitchState {
    pub on: bool,
}

/// Envelope of `GET accessories/{id}/state`: `{ "state": { "on": bool } }`.
#[derive(Debug, Clone, Copy, Deserialize)]
pub(crate) struct StateEnvelope {
    pub state: SwitchState,
}

/// One entry of `GET accessories/state`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct AccessoryState {
    pub uid: String,
    pub state: SwitchState,
}
