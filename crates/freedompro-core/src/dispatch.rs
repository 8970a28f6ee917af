// ── Command dispatch ──
//
// Host-initiated state changes go to the cloud; once the transport
// accepts the request the cache is updated optimistically. Reads are
// served from the cache only.

use std::sync::Arc;

use tracing::debug;

use freedompro_api::FreedomproClient;

use crate::error::CoreError;
use crate::model::{CompositeId, LocalAccessory};
use crate::registry::Registry;
use crate::state::{StateCache, StateSource};

/// Sends on/off commands and answers state reads.
#[derive(Clone)]
pub struct CommandDispatcher {
    client: FreedomproClient,
    registry: Arc<Registry>,
    cache: Arc<StateCache>,
}

impl CommandDispatcher {
    pub(crate) fn new(
        client: FreedomproClient,
        registry: Arc<Registry>,
        cache: Arc<StateCache>,
    ) -> Self {
        Self {
            client,
            registry,
            cache,
        }
    }

    /// Ask the cloud to switch an accessory, then cache `on`.
    ///
    /// The response body is not checked. On failure the cache is left
    /// as it was and the error is returned without retrying.
    pub async fn set_state(&self, composite_id: &CompositeId, on: bool) -> Result<(), CoreError> {
        let accessory = self.resolve(composite_id)?;

        self.client
            .set_accessory_state(composite_id.as_str(), on)
            .await?;

        let entry = self.cache.write(accessory.uuid, on, StateSource::Command);
        debug!(
            accessory = %accessory.display_name,
            on,
            seq = entry.seq,
            "set characteristic On"
        );
        Ok(())
    }

    /// Cached state of an accessory. Never touches the network.
    pub fn get_state(&self, composite_id: &CompositeId) -> Result<bool, CoreError> {
        let accessory = self.resolve(composite_id)?;
        let on = self.cache.get(&accessory.uuid).unwrap_or(false);
        debug!(accessory = %accessory.display_name, on, "get characteristic On");
        Ok(on)
    }

    fn resolve(&self, composite_id: &CompositeId) -> Result<Arc<LocalAccessory>, CoreError> {
        self.registry
            .get_by_composite(composite_id)
            .ok_or_else(|| CoreError::AccessoryNotFound {
                identifier: composite_id.to_string(),
            })
    }
}
