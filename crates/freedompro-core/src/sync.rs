// ── Shared write path for remote state ──
//
// The stream consumer and both pollers resolve accessories through the
// same registry, write the same cache and notify the same host.

use std::sync::Arc;

use tracing::{debug, trace};

use crate::host::AccessoryHost;
use crate::model::LocalAccessory;
use crate::registry::Registry;
use crate::state::{StateCache, StateSource};

#[derive(Clone)]
pub(crate) struct SyncContext {
    pub registry: Arc<Registry>,
    pub cache: Arc<StateCache>,
    pub host: Arc<dyn AccessoryHost>,
}

impl SyncContext {
    /// Apply a state reported for a remote accessory uid.
    ///
    /// Returns `false` (and does nothing) when the uid resolves to no
    /// registered accessory.
    pub(crate) fn apply_remote_state(
        &self,
        accessory_uid: &str,
        on: bool,
        source: StateSource,
    ) -> bool {
        let Some(accessory) = self.registry.resolve_uid(accessory_uid) else {
            trace!(uid = accessory_uid, %source, "state for unknown accessory ignored");
            return false;
        };
        self.apply_state(&accessory, on, source);
        true
    }

    /// Write the cache and notify the host for a known accessory.
    pub(crate) fn apply_state(&self, accessory: &LocalAccessory, on: bool, source: StateSource) {
        let entry = self.cache.write(accessory.uuid, on, source);
        self.host.notify_characteristic_changed(accessory, on);
        debug!(
            accessory = %accessory.display_name,
            on,
            %source,
            seq = entry.seq,
            "updated characteristic On"
        );
    }
}
