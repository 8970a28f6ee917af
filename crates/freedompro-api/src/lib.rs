// freedompro-api: Async Rust client for the Freedompro cloud (REST + event stream)

pub mod client;
pub mod error;
pub mod events;
pub mod models;
pub mod transport;

pub use client::FreedomproClient;
pub use error::Error;
pub use events::{EventStreamHandle, ReconnectConfig, StreamEvent};
pub use models::{AccessoryDescriptor, AccessoryState, DeviceDescriptor, SwitchState};
pub use transport::TransportConfig;
