// ── Accessory registry ──
//
// Append-only side table mapping accessory UUIDs to local accessories,
// with a secondary index on the composite id used by commands.

use std::sync::Arc;

use dashmap::DashMap;
use dashmap::mapref::entry::Entry;
use uuid::Uuid;

use crate::model::{CompositeId, LocalAccessory, accessory_uuid};

/// Result of [`Registry::get_or_try_insert_with`].
#[derive(Debug, Clone)]
pub enum Lookup {
    /// The UUID was already registered.
    Existing(Arc<LocalAccessory>),
    /// A new entry was built and inserted.
    Inserted(Arc<LocalAccessory>),
}

/// The single source of truth for routing state updates.
///
/// Holds at most one accessory per UUID. Entries are never removed, so
/// snapshots taken while reconciliation runs stay valid.
#[derive(Debug, Default)]
pub struct Registry {
    /// Primary storage: UUID -> accessory.
    by_uuid: DashMap<Uuid, Arc<LocalAccessory>>,

    /// Secondary index: composite id -> UUID.
    by_composite: DashMap<CompositeId, Uuid>,
}

impl Registry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an accessory unless its UUID is already present.
    ///
    /// Returns `true` if the accessory was new. An existing entry is kept
    /// untouched: the UUID is the only identity check.
    pub fn insert(&self, accessory: LocalAccessory) -> bool {
        match self.by_uuid.entry(accessory.uuid) {
            Entry::Occupied(_) => false,
            Entry::Vacant(slot) => {
                self.by_composite
                    .insert(accessory.composite_id().clone(), accessory.uuid);
                slot.insert(Arc::new(accessory));
                true
            }
        }
    }

    /// Return the accessory stored under `uuid`, or build and insert one.
    ///
    /// The UUID's slot stays locked while `create` runs, so concurrent
    /// callers for the same UUID run `create` at most once between them.
    /// If `create` fails nothing is inserted and the error is returned.
    pub fn get_or_try_insert_with<E>(
        &self,
        uuid: Uuid,
        create: impl FnOnce() -> Result<LocalAccessory, E>,
    ) -> Result<Lookup, E> {
        match self.by_uuid.entry(uuid) {
            Entry::Occupied(entry) => Ok(Lookup::Existing(Arc::clone(entry.get()))),
            Entry::Vacant(slot) => {
                let accessory = Arc::new(create()?);
                self.by_composite
                    .insert(accessory.composite_id().clone(), uuid);
                slot.insert(Arc::clone(&accessory));
                Ok(Lookup::Inserted(accessory))
            }
        }
    }

    pub fn contains(&self, uuid: &Uuid) -> bool {
        self.by_uuid.contains_key(uuid)
    }

    /// Look up an accessory by UUID.
    pub fn get(&self, uuid: &Uuid) -> Option<Arc<LocalAccessory>> {
        self.by_uuid.get(uuid).map(|r| Arc::clone(r.value()))
    }

    /// Resolve a remote accessory uid through its derived UUID.
    pub fn resolve_uid(&self, accessory_uid: &str) -> Option<Arc<LocalAccessory>> {
        self.get(&accessory_uuid(accessory_uid))
    }

    /// Look up an accessory by composite id (secondary index).
    pub fn get_by_composite(&self, id: &CompositeId) -> Option<Arc<LocalAccessory>> {
        let uuid = *self.by_composite.get(id)?;
        self.get(&uuid)
    }

    /// All accessories, in no particular order.
    pub fn snapshot(&self) -> Vec<Arc<LocalAccessory>> {
        self.by_uuid.iter().map(|r| Arc::clone(r.value())).collect()
    }

    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use crate::model::AccessoryContext;

    fn accessory(device: &str, uid: &str, name: &str) -> LocalAccessory {
        LocalAccessory {
            uuid: accessory_uuid(uid),
            display_name: name.into(),
            context: AccessoryContext {
                composite_id: CompositeId::new(device, uid),
                device_uid: device.into(),
                accessory_uid: uid.into(),
                manufacturer: "Freedompro".into(),
                model: "Switch".into(),
                serial_number: "-".into(),
                home: "-".into(),
            },
        }
    }

    #[test]
    fn insert_returns_true_for_new_uuid() {
        let registry = Registry::new();
        assert!(registry.insert(accessory("D1", "A1", "Kitchen")));
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn insert_keeps_first_entry_for_same_uuid() {
        let registry = Registry::new();
        registry.insert(accessory("D1", "A1", "Kitchen"));

        assert!(!registry.insert(accessory("D9", "A1", "Renamed")));
        assert_eq!(registry.len(), 1);
        assert_eq!(registry.resolve_uid("A1").unwrap().display_name, "Kitchen");
        assert!(
            registry
                .get_by_composite(&CompositeId::new("D9", "A1"))
                .is_none()
        );
    }

    #[test]
    fn get_or_try_insert_with_builds_once() {
        let registry = Registry::new();
        let uuid = accessory_uuid("A1");

        let first = registry
            .get_or_try_insert_with(uuid, || Ok::<_, ()>(accessory("D1", "A1", "Kitchen")))
            .unwrap();
        assert!(matches!(first, Lookup::Inserted(_)));

        let second = registry
            .get_or_try_insert_with(uuid, || -> Result<LocalAccessory, ()> {
                panic!("existing entry must not be rebuilt")
            })
            .unwrap();
        match second {
            Lookup::Existing(existing) => assert_eq!(existing.display_name, "Kitchen"),
            Lookup::Inserted(_) => panic!("expected existing entry"),
        }
        assert_eq!(registry.len(), 1);
    }

    #[test]
    fn failed_create_leaves_slot_empty() {
        let registry = Registry::new();
        let uuid = accessory_uuid("A1");

        let result = registry.get_or_try_insert_with(uuid, || Err::<LocalAccessory, _>("rejected"));
        assert_eq!(result.unwrap_err(), "rejected");
        assert!(!registry.contains(&uuid));
        assert!(
            registry
                .get_by_composite(&CompositeId::new("D1", "A1"))
                .is_none()
        );
    }

    #[test]
    fn lookup_by_uid_and_composite() {
        let registry = Registry::new();
        registry.insert(accessory("D1", "A1", "Kitchen"));
        registry.insert(accessory("D1", "A2", "Hall"));

        let by_uid = registry.resolve_uid("A2").unwrap();
        let by_composite = registry
            .get_by_composite(&CompositeId::from("D1*A2"))
            .unwrap();
        assert_eq!(by_uid, by_composite);
        assert!(registry.resolve_uid("A3").is_none());
    }

    #[test]
    fn snapshot_reflects_current_state() {
        let registry = Registry::new();
        assert!(registry.snapshot().is_empty());
        assert!(registry.is_empty());

        registry.insert(accessory("D1", "A1", "x"));
        registry.insert(accessory("D1", "A2", "y"));

        assert_eq!(registry.snapshot().len(), 2);
        assert!(registry.contains(&accessory_uuid("A1")));
    }
}
