// ── Local accessory identity ──
//
// A `LocalAccessory` is the host-facing counterpart of one remote
// accessory. Its UUID is derived from the accessory uid alone, which makes
// it the only deduplication key across restarts.

use std::fmt;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use freedompro_api::{AccessoryDescriptor, DeviceDescriptor};

/// Namespace for accessory UUIDs (v5, SHA-1 over the accessory uid).
const ACCESSORY_NAMESPACE: Uuid = Uuid::from_u128(0x6c1f_0c5e_3b8a_4f7d_9a52_2e4b_8d90_f3a1);

/// Derive the stable UUID for an accessory uid. Same input, same UUID.
pub fn accessory_uuid(accessory_uid: &str) -> Uuid {
    Uuid::new_v5(&ACCESSORY_NAMESPACE, accessory_uid.as_bytes())
}

// ── CompositeId ─────────────────────────────────────────────────────

/// `deviceUid*accessoryUid`, the address used for state commands.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct CompositeId(String);

impl CompositeId {
    pub fn new(device_uid: &str, accessory_uid: &str) -> Self {
        Self(format!("{device_uid}*{accessory_uid}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CompositeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CompositeId {
    fn from(s: &str) -> Self {
        Self(s.to_owned())
    }
}

// ── LocalAccessory ──────────────────────────────────────────────────

/// Descriptor metadata kept alongside each local accessory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AccessoryContext {
    pub composite_id: CompositeId,
    pub device_uid: String,
    pub accessory_uid: String,
    pub manufacturer: String,
    pub model: String,
    pub serial_number: String,
    pub home: String,
}

/// Host-side identity of one switchable accessory.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LocalAccessory {
    pub uuid: Uuid,
    pub display_name: String,
    pub context: AccessoryContext,
}

impl LocalAccessory {
    /// Build a new local accessory for `accessory`, owned by `device`.
    pub fn from_descriptor(device: &DeviceDescriptor, accessory: &AccessoryDescriptor) -> Self {
        Self {
            uuid: accessory_uuid(&accessory.uid),
            display_name: accessory.name.clone(),
            context: AccessoryContext {
                composite_id: CompositeId::new(&device.uid, &accessory.uid),
                device_uid: device.uid.clone(),
                accessory_uid: accessory.uid.clone(),
                manufacturer: device.manufacturer.clone(),
                model: device.model.clone(),
                serial_number: device.serial_number.clone(),
                home: device.home.clone(),
            },
        }
    }

    pub fn composite_id(&self) -> &CompositeId {
        &self.context.composite_id
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn device() -> DeviceDescriptor {
        DeviceDescriptor {
            uid: "D1".into(),
            manufacturer: "Freedompro".into(),
            model: "Switch-2".into(),
            serial_number: "SN-1".into(),
            home: "Home".into(),
            accessories: vec![AccessoryDescriptor {
                uid: "A1".into(),
                name: "Kitchen".into(),
            }],
        }
    }

    #[test]
    fn uuid_is_deterministic() {
        assert_eq!(accessory_uuid("A1"), accessory_uuid("A1"));
        assert_ne!(accessory_uuid("A1"), accessory_uuid("A2"));
    }

    #[test]
    fn local_accessory_carries_device_context() {
        let device = device();
        let local = LocalAccessory::from_descriptor(&device, &device.accessories[0]);

        assert_eq!(local.uuid, accessory_uuid("A1"));
        assert_eq!(local.display_name, "Kitchen");
        assert_eq!(local.composite_id().as_str(), "D1*A1");
        assert_eq!(local.context.serial_number, "SN-1");
        assert_eq!(local.context.device_uid, "D1");
    }
}
