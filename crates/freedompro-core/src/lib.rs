//! Registry reconciliation and live state sync between the Freedompro cloud
//! and a local accessory host.
//!
//! - **[`Bridge`]**: lifecycle facade. [`start()`](Bridge::start) loads the
//!   accessories the host restored, reconciles them against the remote device
//!   list, then spawns the event stream consumer and both fallback pollers.
//!
//! - **[`Registry`]**: Append-only `DashMap` side table mapping the stable
//!   accessory UUID to its [`LocalAccessory`] and remote context.
//!
//! - **[`StateCache`]**: Last-known on/off value per accessory. Every write
//!   carries a global sequence number and its [`StateSource`].
//!
//! - **[`CommandDispatcher`]**: Host-initiated writes go to the cloud first
//!   and are cached optimistically; reads are served from the cache.
//!
//! - **[`AccessoryHost`]**: The narrow trait through which the core talks to
//!   the controller that owns accessory objects. [`MemoryHost`] is an
//!   in-process implementation.

pub mod bridge;
pub mod config;
pub mod dispatch;
pub mod error;
pub mod host;
pub mod model;
pub mod reconcile;
pub mod registry;
pub mod state;

mod poll;
mod stream;
mod sync;

// ── Primary re-exports ──────────────────────────────────────────────
pub use bridge::Bridge;
pub use config::{BridgeConfig, DeviceSource};
pub use dispatch::CommandDispatcher;
pub use error::CoreError;
pub use host::{AccessoryHost, HostCall, MemoryHost};
pub use model::{AccessoryContext, CompositeId, LocalAccessory, accessory_uuid};
pub use reconcile::ReconcileReport;
pub use registry::{Lookup, Registry};
pub use state::{StateCache, StateEntry, StateSource};

// Wire types callers need to build configs or feed `Bridge::reconcile`.
pub use freedompro_api::client::DEFAULT_BASE_URL;
pub use freedompro_api::{AccessoryDescriptor, DeviceDescriptor, ReconnectConfig};
