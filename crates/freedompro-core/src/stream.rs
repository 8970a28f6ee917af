// ── Live state stream consumer ──
//
// Routes events from the API-level event stream into the registry and
// state cache. Connection handling and reconnects live in
// `freedompro_api::events`; this side only interprets events.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;
use tracing::{debug, trace, warn};

use freedompro_api::StreamEvent;

use crate::state::StateSource;
use crate::sync::SyncContext;

impl SyncContext {
    /// Apply one event. Returns `true` if a cached state was written.
    pub(crate) fn apply_stream_event(&self, event: &StreamEvent) -> bool {
        match event {
            StreamEvent::ReportState {
                uid, on: Some(on), ..
            } => self.apply_remote_state(uid, *on, StateSource::Stream),
            StreamEvent::ReportState { uid, on: None, .. } => {
                trace!(uid = %uid, "state report without on/off value");
                false
            }
            StreamEvent::Unhandled { intent } => {
                trace!(intent = %intent, "unhandled event intent");
                false
            }
        }
    }
}

/// Consume the event broadcast until cancelled or the stream task is gone.
pub(crate) async fn event_consumer_task(
    ctx: SyncContext,
    mut rx: broadcast::Receiver<Arc<StreamEvent>>,
    cancel: CancellationToken,
) {
    loop {
        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = rx.recv() => {
                match result {
                    Ok(event) => {
                        ctx.apply_stream_event(&event);
                    }
                    Err(broadcast::error::RecvError::Lagged(n)) => {
                        warn!(skipped = n, "event consumer lagged; polling will catch up");
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        }
    }

    debug!("event consumer exiting");
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use freedompro_api::{AccessoryDescriptor, DeviceDescriptor};

    use super::*;
    use crate::host::{HostCall, MemoryHost};
    use crate::model::accessory_uuid;
    use crate::registry::Registry;
    use crate::state::StateCache;

    fn context(host: Arc<MemoryHost>) -> SyncContext {
        let ctx = SyncContext {
            registry: Arc::new(Registry::new()),
            cache: Arc::new(StateCache::new()),
            host,
        };
        ctx.reconcile(&[DeviceDescriptor {
            uid: "D1".into(),
            manufacturer: String::new(),
            model: String::new(),
            serial_number: String::new(),
            home: String::new(),
            accessories: vec![AccessoryDescriptor {
                uid: "A1".into(),
                name: "Kitchen".into(),
            }],
        }]);
        ctx
    }

    fn report(uid: &str, on: Option<bool>) -> StreamEvent {
        StreamEvent::ReportState {
            uid: uid.into(),
            device: None,
            on,
        }
    }

    #[test]
    fn report_state_updates_known_accessory_and_notifies_once() {
        let host = Arc::new(MemoryHost::new());
        let ctx = context(Arc::clone(&host));

        assert!(ctx.apply_stream_event(&report("A1", Some(true))));

        assert_eq!(ctx.cache.get(&accessory_uuid("A1")), Some(true));
        assert_eq!(host.notifications(), 1);
        assert_eq!(
            host.calls().last(),
            Some(&HostCall::Notify(accessory_uuid("A1"), true))
        );
    }

    #[test]
    fn unknown_uid_is_ignored() {
        let host = Arc::new(MemoryHost::new());
        let ctx = context(Arc::clone(&host));

        assert!(!ctx.apply_stream_event(&report("ZZ", Some(true))));

        assert_eq!(ctx.registry.len(), 1);
        assert!(ctx.cache.get(&accessory_uuid("ZZ")).is_none());
        assert_eq!(host.notifications(), 0);
    }

    #[test]
    fn reports_without_value_and_other_intents_are_skipped() {
        let host = Arc::new(MemoryHost::new());
        let ctx = context(Arc::clone(&host));

        assert!(!ctx.apply_stream_event(&report("A1", None)));
        assert!(!ctx.apply_stream_event(&StreamEvent::Unhandled {
            intent: "DEVICE_REMOVED".into()
        }));
        assert_eq!(host.notifications(), 0);
    }

    #[tokio::test]
    async fn consumer_applies_broadcast_events() {
        let host = Arc::new(MemoryHost::new());
        let ctx = context(Arc::clone(&host));
        let cache = Arc::clone(&ctx.cache);
        let (tx, rx) = broadcast::channel(8);
        let cancel = CancellationToken::new();

        let task = tokio::spawn(event_consumer_task(ctx, rx, cancel.clone()));
        tx.send(Arc::new(report("A1", Some(true)))).ok();
        drop(tx);
        task.await.ok();

        assert_eq!(cache.get(&accessory_uuid("A1")), Some(true));
    }
}
