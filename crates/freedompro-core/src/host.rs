// ── Host collaborator ──
//
// The smart-home controller that owns accessory objects. The core only
// talks to it through this narrow trait and never persists anything itself.

use std::sync::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};

use crate::error::CoreError;
use crate::model::LocalAccessory;

/// The local accessory host (controller) the bridge feeds.
///
/// Calls are local and synchronous; none of them may block on the network.
pub trait AccessoryHost: Send + Sync {
    /// Accessories the host persisted in a previous run.
    fn restored_accessories(&self) -> Vec<LocalAccessory>;

    /// Register a brand-new accessory. Called at most once per UUID.
    fn register_accessory(&self, accessory: &LocalAccessory) -> Result<(), CoreError>;

    /// Re-wire an accessory that already exists on the host.
    fn restore_accessory(&self, accessory: &LocalAccessory);

    /// The accessory's on/off characteristic changed.
    fn notify_characteristic_changed(&self, accessory: &LocalAccessory, on: bool);
}

/// A call observed by [`MemoryHost`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum HostCall {
    Register(uuid::Uuid),
    Restore(uuid::Uuid),
    Notify(uuid::Uuid, bool),
}

/// In-process host that keeps everything in memory and records each call.
///
/// Useful for embedding the bridge without a real controller and for tests.
#[derive(Debug, Default)]
pub struct MemoryHost {
    persisted: Mutex<Vec<LocalAccessory>>,
    calls: Mutex<Vec<HostCall>>,
    reject: AtomicBool,
}

impl MemoryHost {
    pub fn new() -> Self {
        Self::default()
    }

    /// Start with accessories "persisted" by an earlier run.
    pub fn with_restored(accessories: Vec<LocalAccessory>) -> Self {
        Self {
            persisted: Mutex::new(accessories),
            ..Self::default()
        }
    }

    /// Make `register_accessory` fail until switched back off.
    pub fn reject_registrations(&self, reject: bool) {
        self.reject.store(reject, Ordering::Relaxed);
    }

    /// Every call received so far, in order.
    pub fn calls(&self) -> Vec<HostCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    /// Accessories registered or restored so far.
    pub fn persisted(&self) -> Vec<LocalAccessory> {
        self.persisted.lock().map(|p| p.clone()).unwrap_or_default()
    }

    pub fn registrations(&self) -> usize {
        self.count(|c| matches!(c, HostCall::Register(_)))
    }

    pub fn notifications(&self) -> usize {
        self.count(|c| matches!(c, HostCall::Notify(..)))
    }

    fn count(&self, pred: impl Fn(&HostCall) -> bool) -> usize {
        self.calls
            .lock()
            .map(|c| c.iter().filter(|call| pred(call)).count())
            .unwrap_or_default()
    }

    fn record(&self, call: HostCall) {
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }
    }
}

impl AccessoryHost for MemoryHost {
    fn restored_accessories(&self) -> Vec<LocalAccessory> {
        self.persisted()
    }

    fn register_accessory(&self, accessory: &LocalAccessory) -> Result<(), CoreError> {
        if self.reject.load(Ordering::Relaxed) {
            return Err(CoreError::Host {
                message: format!("registration of {} refused", accessory.uuid),
            });
        }
        self.persisted
            .lock()
            .map_err(|e| CoreError::Host {
                message: e.to_string(),
            })?
            .push(accessory.clone());
        self.record(HostCall::Register(accessory.uuid));
        Ok(())
    }

    fn restore_accessory(&self, accessory: &LocalAccessory) {
        self.record(HostCall::Restore(accessory.uuid));
    }

    fn notify_characteristic_changed(&self, accessory: &LocalAccessory, on: bool) {
        self.record(HostCall::Notify(accessory.uuid, on));
    }
}
