//! Command handlers and the config plumbing they share.

pub mod config_cmd;
pub mod devices;
pub mod run;
pub mod set;

use std::sync::Arc;

use secrecy::SecretString;

use freedompro_config::Config;
use freedompro_core::{AccessoryHost, Bridge, BridgeConfig, MemoryHost};

use crate::cli::GlobalOpts;
use crate::error::CliError;

/// Load the config file named by `--config` (or the default one).
pub fn load_config(global: &GlobalOpts) -> Result<Config, CliError> {
    let cfg = if let Some(ref path) = global.config {
        freedompro_config::load_config_from(path)?
    } else {
        freedompro_config::load_config()?
    };
    Ok(cfg)
}

/// Build the runtime config, applying `--base-url` and `--api-key`.
pub fn bridge_config(global: &GlobalOpts) -> Result<BridgeConfig, CliError> {
    let mut cfg = load_config(global)?;
    if let Some(ref url) = global.base_url {
        cfg.cloud.base_url.clone_from(url);
    }

    let bridge = if let Some(ref key) = global.api_key {
        freedompro_config::to_bridge_config_with_key(&cfg, SecretString::from(key.clone()))?
    } else {
        freedompro_config::to_bridge_config(&cfg)?
    };
    Ok(bridge)
}

/// A bridge backed by an in-memory host, for one-shot commands.
pub fn oneshot_bridge(global: &GlobalOpts) -> Result<Bridge, CliError> {
    let host: Arc<dyn AccessoryHost> = Arc::new(MemoryHost::new());
    Ok(Bridge::new(bridge_config(global)?, host)?)
}
