// ── Periodic resynchronization ──
//
// Two fallback pollers keep the cache honest when the event stream is
// down or lossy: a slow per-accessory sweep and a fast global sweep.
// A failed round is logged and retried on the next tick.

use std::time::Duration;

use tokio::time::{Interval, MissedTickBehavior};
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

use freedompro_api::FreedomproClient;

use crate::error::CoreError;
use crate::state::StateSource;
use crate::sync::SyncContext;

/// Query each registered accessory's state once.
///
/// Individual failures are logged and skipped. Returns how many
/// accessories were updated.
pub(crate) async fn poll_accessories_once(client: &FreedomproClient, ctx: &SyncContext) -> usize {
    let mut updated = 0;
    for accessory in ctx.registry.snapshot() {
        match client
            .get_accessory_state(accessory.composite_id().as_str())
            .await
        {
            Ok(state) => {
                ctx.apply_state(&accessory, state.on, StateSource::AccessoryPoll);
                updated += 1;
            }
            Err(e) => {
                warn!(
                    error = %e,
                    accessory = %accessory.display_name,
                    "accessory state poll failed"
                );
            }
        }
    }
    updated
}

/// Fetch every accessory's state in one call and apply what is known.
///
/// Entries for unregistered uids are ignored. Returns how many
/// accessories were updated.
pub(crate) async fn poll_all_once(
    client: &FreedomproClient,
    ctx: &SyncContext,
) -> Result<usize, CoreError> {
    let states = client.list_accessory_states().await?;
    let updated = states
        .iter()
        .filter(|s| ctx.apply_remote_state(&s.uid, s.state.on, StateSource::GlobalPoll))
        .count();
    Ok(updated)
}

/// Ticker for a poll loop. A round that overruns its period skips the
/// missed ticks instead of firing them back to back.
fn poll_interval(period: Duration) -> Interval {
    let mut interval = tokio::time::interval(period);
    interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
    interval
}

pub(crate) async fn accessory_poll_task(
    client: FreedomproClient,
    ctx: SyncContext,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = poll_interval(period);
    interval.tick().await; // consume the immediate first tick

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                let updated = poll_accessories_once(&client, &ctx).await;
                debug!(updated, "accessory poll round complete");
            }
        }
    }
}

pub(crate) async fn global_poll_task(
    client: FreedomproClient,
    ctx: SyncContext,
    period: Duration,
    cancel: CancellationToken,
) {
    let mut interval = poll_interval(period);
    interval.tick().await;

    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                match poll_all_once(&client, &ctx).await {
                    Ok(updated) => debug!(updated, "global poll round complete"),
                    Err(e) => warn!(error = %e, "global state poll failed"),
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn overrunning_round_skips_missed_ticks() {
        let mut interval = poll_interval(Duration::from_secs(5));
        assert_eq!(interval.missed_tick_behavior(), MissedTickBehavior::Skip);
        interval.tick().await;

        // A round that takes 17s spans three periods.
        tokio::time::advance(Duration::from_secs(17)).await;
        interval.tick().await;

        let start = tokio::time::Instant::now();
        interval.tick().await;
        assert!(start.elapsed() >= Duration::from_secs(1));
    }
}
