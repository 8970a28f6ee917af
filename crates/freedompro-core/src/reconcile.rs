// ── Registry reconciliation ──
//
// Maps remote device descriptors onto local accessories: restore what the
// registry already knows, register what it does not. Running it twice with
// the same input changes nothing and registers nothing twice.

use tracing::{info, warn};

use freedompro_api::DeviceDescriptor;

use crate::model::{LocalAccessory, accessory_uuid};
use crate::registry::Lookup;
use crate::sync::SyncContext;

/// Outcome of one reconciliation pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Accessories registered with the host for the first time.
    pub created: usize,
    /// Accessories already known and re-wired.
    pub restored: usize,
    /// New accessories the host refused to register.
    pub failed: usize,
}

impl SyncContext {
    /// Load accessories the host persisted earlier into the registry.
    pub(crate) fn load_restored(&self) -> usize {
        let mut loaded = 0;
        for accessory in self.host.restored_accessories() {
            info!(accessory = %accessory.display_name, "loading accessory from cache");
            self.cache.ensure(accessory.uuid);
            if self.registry.insert(accessory) {
                loaded += 1;
            }
        }
        loaded
    }

    pub(crate) fn reconcile(&self, devices: &[DeviceDescriptor]) -> ReconcileReport {
        let mut report = ReconcileReport::default();

        for device in devices {
            for descriptor in &device.accessories {
                let uuid = accessory_uuid(&descriptor.uid);

                // Registration runs while the registry slot is held, so
                // overlapping passes cannot both register the same uuid.
                let lookup = self.registry.get_or_try_insert_with(uuid, || {
                    let accessory = LocalAccessory::from_descriptor(device, descriptor);
                    info!(
                        name = %descriptor.name,
                        uid = %descriptor.uid,
                        composite = %accessory.composite_id(),
                        "adding new accessory"
                    );
                    self.host.register_accessory(&accessory).map(|()| accessory)
                });

                match lookup {
                    Ok(Lookup::Existing(existing)) => {
                        info!(
                            accessory = %existing.display_name,
                            "restoring existing accessory from cache"
                        );
                        self.cache.ensure(uuid);
                        self.host.restore_accessory(&existing);
                        report.restored += 1;
                    }
                    Ok(Lookup::Inserted(_)) => {
                        self.cache.ensure(uuid);
                        report.created += 1;
                    }
                    Err(e) => {
                        warn!(error = %e, uid = %descriptor.uid, "host rejected accessory");
                        report.failed += 1;
                    }
                }
            }
        }

        report
    }
}
