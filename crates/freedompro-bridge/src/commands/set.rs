//! `set`: switch one accessory through the command dispatcher.

use freedompro_core::CompositeId;

use crate::cli::{GlobalOpts, SetArgs};
use crate::error::CliError;

pub async fn handle(args: SetArgs, global: &GlobalOpts) -> Result<(), CliError> {
    if !args.composite_id.contains('*') {
        return Err(CliError::Validation {
            field: "composite_id".into(),
            reason: format!("expected deviceUid*accessoryUid, got '{}'", args.composite_id),
        });
    }

    let bridge = super::oneshot_bridge(global)?;
    bridge.discover().await?;

    let id = CompositeId::from(args.composite_id.as_str());
    let on = args.state.is_on();
    bridge.set_state(&id, on).await?;

    println!("{id} -> {}", if on { "on" } else { "off" });
    Ok(())
}
