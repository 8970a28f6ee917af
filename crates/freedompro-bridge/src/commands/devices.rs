//! `devices`: print the remote device list.

use crate::cli::GlobalOpts;
use crate::error::CliError;

pub async fn handle(global: &GlobalOpts) -> Result<(), CliError> {
    let bridge = super::oneshot_bridge(global)?;
    let devices = bridge.fetch_devices().await?;
    println!("{}", serde_json::to_string_pretty(&devices)?);
    Ok(())
}
