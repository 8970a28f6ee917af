//! `run`: discover accessories and keep them in sync until Ctrl-C.

use std::sync::Arc;

use tracing::info;

use freedompro_core::{AccessoryHost, Bridge};

use crate::cli::{GlobalOpts, RunArgs};
use crate::error::CliError;
use crate::host::{FileHost, STORE_FILE};

pub async fn handle(args: RunArgs, global: &GlobalOpts) -> Result<(), CliError> {
    let mut config = super::bridge_config(global)?;
    if args.no_stream {
        config.stream_enabled = false;
    }

    let data_dir = args.data_dir.unwrap_or_else(freedompro_config::data_dir);
    let host = FileHost::open(data_dir.join(STORE_FILE))?;
    info!(store = %host.path().display(), "using accessory store");
    let host: Arc<dyn AccessoryHost> = Arc::new(host);

    let bridge = Bridge::new(config, host)?;
    let report = bridge.start().await?;
    eprintln!(
        "Bridge running: {} accessories ({} new, {} restored). Press Ctrl-C to stop.",
        bridge.accessories().len(),
        report.created,
        report.restored
    );

    tokio::signal::ctrl_c().await?;
    info!("interrupt received, shutting down");
    bridge.shutdown().await;
    Ok(())
}
