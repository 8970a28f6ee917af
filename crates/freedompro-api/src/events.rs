//! Event stream with auto-reconnect.
//!
//! Reads the cloud's `GET events` streaming response, splits it into
//! newline-delimited frames, and publishes parsed [`StreamEvent`]s through a
//! [`tokio::sync::broadcast`] channel. The background task reconnects
//! forever: a clean end-of-stream waits the fixed initial delay, transport
//! errors back off exponentially with jitter up to the configured cap.
//!
//! # Example
//!
//! ```rust,ignore
//! use freedompro_api::{EventStreamHandle, FreedomproClient, ReconnectConfig};
//! use tokio_util::sync::CancellationToken;
//!
//! let handle = EventStreamHandle::spawn(client, ReconnectConfig::default(), CancellationToken::new());
//! let mut rx = handle.subscribe();
//!
//! while let Ok(event) = rx.recv().await {
//!     println!("{event:?}");
//! }
//! ```

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::time::Duration;

use futures_util::{Stream, StreamExt};
use serde::Deserialize;
use tokio::sync::broadcast;
use tokio_util::sync::CancellationToken;

use crate::client::FreedomproClient;
use crate::error::Error;

// ── Framing ──────────────────────────────────────────────────────────

const EVENT_CHANNEL_CAPACITY: usize = 1024;

/// Framing marker in front of every event payload.
const DATA_PREFIX: &str = "data:";

/// Stream fields that carry no event payload.
const IGNORED_FIELDS: [&str; 3] = ["event:", "id:", "retry:"];

const REPORT_STATE: &str = "REPORT_STATE";

// ── StreamEvent ──────────────────────────────────────────────────────

/// A parsed event from the cloud feed.
///
/// Intents form a closed set; anything the bridge does not act on lands
/// in [`StreamEvent::Unhandled`] instead of falling through silently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// An accessory reported its state.
    ReportState {
        /// Accessory uid (not the composite id).
        uid: String,
        /// Owning device uid, when the cloud includes it.
        device: Option<String>,
        /// `props.on.value`, absent when the report carries other props only.
        on: Option<bool>,
    },
    /// Any other intent.
    Unhandled { intent: String },
}

#[derive(Debug, Deserialize)]
struct RawEvent {
    intent: String,
    #[serde(default)]
    payload: serde_json::Value,
}

#[derive(Debug, Deserialize)]
struct ReportStatePayload {
    uid: String,
    #[serde(default)]
    device: Option<String>,
    #[serde(default)]
    props: Option<Props>,
}

#[derive(Debug, Deserialize)]
struct Props {
    #[serde(default)]
    on: Option<OnProp>,
}

#[derive(Debug, Deserialize)]
struct OnProp {
    value: bool,
}

impl StreamEvent {
    /// Parse one frame.
    ///
    /// Returns `Ok(None)` for keep-alives, comments and other payload-less
    /// lines, and an error for anything that is not a well-formed event.
    pub fn parse_frame(line: &str) -> Result<Option<Self>, Error> {
        let Some(body) = frame_payload(line) else {
            return Ok(None);
        };

        let raw: RawEvent = serde_json::from_str(body).map_err(|e| deser_error(&e, body))?;

        if raw.intent != REPORT_STATE {
            return Ok(Some(Self::Unhandled { intent: raw.intent }));
        }

        let payload: ReportStatePayload =
            serde_json::from_value(raw.payload).map_err(|e| deser_error(&e, body))?;

        Ok(Some(Self::ReportState {
            uid: payload.uid,
            device: payload.device,
            on: payload.props.and_then(|p| p.on).map(|on| on.value),
        }))
    }
}

fn deser_error(err: &serde_json::Error, body: &str) -> Error {
    Error::Deserialization {
        message: err.to_string(),
        body: body.to_owned(),
    }
}

/// Strip the framing prefix and whitespace, or `None` if the line has no payload.
fn frame_payload(line: &str) -> Option<&str> {
    let line = line.trim();
    if line.is_empty() || line.starts_with(':') {
        return None;
    }
    if let Some(data) = line.strip_prefix(DATA_PREFIX) {
        let data = data.trim();
        return (!data.is_empty()).then_some(data);
    }
    if IGNORED_FIELDS.iter().any(|field| line.starts_with(field)) {
        return None;
    }
    Some(line)
}

/// Accumulates body chunks and yields complete lines.
///
/// Chunk boundaries are arbitrary, so a frame may arrive split across
/// several chunks or several frames may share one.
#[derive(Debug, Default)]
struct FrameBuffer {
    pending: Vec<u8>,
}

impl FrameBuffer {
    fn push(&mut self, chunk: &[u8]) -> Vec<String> {
        self.pending.extend_from_slice(chunk);

        let mut lines = Vec::new();
        while let Some(pos) = self.pending.iter().position(|b| *b == b'\n') {
            let line: Vec<u8> = self.pending.drain(..=pos).collect();
            let text = String::from_utf8_lossy(&line);
            let text = text.trim_end_matches(['\n', '\r']);
            if !text.trim().is_empty() {
                lines.push(text.to_owned());
            }
        }
        lines
    }

    /// Flush a trailing frame that was not newline-terminated.
    fn finish(&mut self) -> Option<String> {
        let rest = String::from_utf8_lossy(&self.pending).trim().to_owned();
        self.pending.clear();
        (!rest.is_empty()).then_some(rest)
    }
}

fn frames(resp: reqwest::Response) -> impl Stream<Item = Result<String, Error>> {
    async_stream::try_stream! {
        let mut body = resp.bytes_stream();
        let mut buffer = FrameBuffer::default();

        while let Some(chunk) = body.next().await {
            let chunk = chunk.map_err(|e| Error::Stream(e.to_string()))?;
            for line in buffer.push(&chunk) {
                yield line;
            }
        }

        if let Some(rest) = buffer.finish() {
            yield rest;
        }
    }
}

// ── ReconnectConfig ──────────────────────────────────────────────────

/// Reconnection policy for the event stream.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Delay after a clean end-of-stream, and the base of the error
    /// backoff. Default: 1s.
    pub initial_delay: Duration,

    /// Upper bound on backoff delay. Default: 30s.
    pub max_delay: Duration,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
        }
    }
}

// ── EventStreamHandle ────────────────────────────────────────────────

/// Handle to a running event stream.
///
/// Call [`shutdown`](Self::shutdown) to tear down the background task.
pub struct EventStreamHandle {
    event_rx: broadcast::Receiver<Arc<StreamEvent>>,
    reconnects: Arc<AtomicU64>,
    cancel: CancellationToken,
}

impl EventStreamHandle {
    /// Spawn the read/reconnect loop on the current runtime.
    ///
    /// Returns immediately; the first connection happens in the background.
    pub fn spawn(
        client: FreedomproClient,
        reconnect: ReconnectConfig,
        cancel: CancellationToken,
    ) -> Self {
        let (event_tx, event_rx) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        let reconnects = Arc::new(AtomicU64::new(0));

        let task_cancel = cancel.clone();
        let task_reconnects = Arc::clone(&reconnects);
        tokio::spawn(async move {
            stream_loop(client, event_tx, reconnect, task_cancel, task_reconnects).await;
        });

        Self {
            event_rx,
            reconnects,
            cancel,
        }
    }

    /// Get a new broadcast receiver for the event stream.
    ///
    /// A consumer that falls behind receives
    /// [`broadcast::error::RecvError::Lagged`].
    pub fn subscribe(&self) -> broadcast::Receiver<Arc<StreamEvent>> {
        self.event_rx.resubscribe()
    }

    /// Number of reconnection attempts made so far.
    pub fn reconnect_count(&self) -> u64 {
        self.reconnects.load(Ordering::Relaxed)
    }

    /// Signal the background task to shut down.
    pub fn shutdown(&self) {
        self.cancel.cancel();
    }
}

// ── Background reconnection loop ─────────────────────────────────────

/// Main loop: connect → read → wait → reconnect.
async fn stream_loop(
    client: FreedomproClient,
    event_tx: broadcast::Sender<Arc<StreamEvent>>,
    reconnect: ReconnectConfig,
    cancel: CancellationToken,
    reconnects: Arc<AtomicU64>,
) {
    let mut attempt: u32 = 0;

    loop {
        let connected = AtomicBool::new(false);
        let delay = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            result = connect_and_read(&client, &event_tx, &connected) => {
                let connected = connected.load(Ordering::Relaxed);
                match &result {
                    Ok(()) => tracing::info!("event stream ended cleanly, reconnecting"),
                    Err(e) => tracing::warn!(
                        error = %e,
                        attempt,
                        connected,
                        auth_failure = e.is_auth_failure(),
                        "event stream error"
                    ),
                }
                next_delay(&mut attempt, result.is_ok(), connected, &reconnect)
            }
        };

        tracing::debug!(
            delay_ms = u64::try_from(delay.as_millis()).unwrap_or(u64::MAX),
            "waiting before reconnect"
        );

        tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            () = tokio::time::sleep(delay) => {}
        }

        let total = reconnects.fetch_add(1, Ordering::Relaxed) + 1;
        tracing::debug!(reconnects = total, "reconnecting event stream");
    }

    tracing::debug!("event stream loop exiting");
}

// ── Single connection lifecycle ──────────────────────────────────────

/// Open the stream once and publish frames until it ends or fails.
async fn connect_and_read(
    client: &FreedomproClient,
    event_tx: &broadcast::Sender<Arc<StreamEvent>>,
    connected: &AtomicBool,
) -> Result<(), Error> {
    tracing::info!("connecting to event stream");
    let resp = client.open_event_stream().await?;
    connected.store(true, Ordering::Relaxed);
    tracing::info!("event stream connected");

    let frames = frames(resp);
    futures_util::pin_mut!(frames);

    while let Some(frame) = frames.next().await {
        parse_and_broadcast(&frame?, event_tx);
    }

    Ok(())
}

/// Parse one frame and broadcast the event, discarding malformed input.
fn parse_and_broadcast(line: &str, event_tx: &broadcast::Sender<Arc<StreamEvent>>) {
    match StreamEvent::parse_frame(line) {
        Ok(Some(event)) => {
            // No subscribers is fine; the event is simply dropped.
            let _ = event_tx.send(Arc::new(event));
        }
        Ok(None) => tracing::trace!("event stream keep-alive"),
        Err(e) => tracing::warn!(error = %e, "discarding malformed event frame"),
    }
}

// ── Backoff calculation ──────────────────────────────────────────────

/// Delay before the next connection attempt.
///
/// A session that got as far as an open stream starts the backoff over.
/// A clean end-of-stream waits the fixed initial delay.
fn next_delay(
    attempt: &mut u32,
    clean: bool,
    connected: bool,
    config: &ReconnectConfig,
) -> Duration {
    if connected {
        *attempt = 0;
    }
    if clean {
        return config.initial_delay;
    }
    let delay = calculate_backoff(*attempt, config);
    *attempt = attempt.saturating_add(1);
    delay
}

/// Exponential backoff with jitter.
///
/// `delay = min(initial * 2^attempt, max) * (1 +- 0.25)`
fn calculate_backoff(attempt: u32, config: &ReconnectConfig) -> Duration {
    let exponent = i32::try_from(attempt.min(30)).unwrap_or(30);
    let base = config.initial_delay.as_secs_f64() * 2.0_f64.powi(exponent);
    let capped = base.min(config.max_delay.as_secs_f64());

    // Deterministic jitter seeded from the attempt number.
    let jitter_factor = 1.0 + 0.25 * (f64::from(attempt) * 7.3).sin();
    let with_jitter = (capped * jitter_factor).max(0.0);

    Duration::from_secs_f64(with_jitter)
}

// ── Tests ────────────────────────────────────────────────────────────

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn default_reconnect_config() {
        let config = ReconnectConfig::default();
        assert_eq!(config.initial_delay, Duration::from_secs(1));
        assert_eq!(config.max_delay, Duration::from_secs(30));
    }

    #[test]
    fn backoff_increases_exponentially() {
        let config = ReconnectConfig::default();

        let d0 = calculate_backoff(0, &config);
        let d1 = calculate_backoff(1, &config);
        let d2 = calculate_backoff(2, &config);

        assert!(d1 > d0, "d1 ({d1:?}) should be greater than d0 ({d0:?})");
        assert!(d2 > d1, "d2 ({d2:?}) should be greater than d1 ({d1:?})");
    }

    #[test]
    fn backoff_caps_at_max_delay() {
        let config = ReconnectConfig {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(10),
        };

        let d10 = calculate_backoff(10, &config);
        assert!(d10 <= Duration::from_millis(12_500), "got {d10:?}");

        let huge = calculate_backoff(u32::MAX, &config);
        assert!(huge <= Duration::from_millis(12_500), "got {huge:?}");
    }

    #[test]
    fn failures_before_connecting_keep_backing_off() {
        let config = ReconnectConfig::default();
        let mut attempt = 0;

        let delays: Vec<Duration> = (0..3)
            .map(|_| next_delay(&mut attempt, false, false, &config))
            .collect();

        assert_eq!(attempt, 3);
        assert_eq!(delays[2], calculate_backoff(2, &config));
    }

    #[test]
    fn failure_after_connecting_restarts_backoff() {
        let config = ReconnectConfig::default();
        let mut attempt = 5;

        let delay = next_delay(&mut attempt, false, true, &config);

        assert_eq!(delay, calculate_backoff(0, &config));
        assert_eq!(attempt, 1);
    }

    #[test]
    fn clean_end_waits_initial_delay() {
        let config = ReconnectConfig::default();
        let mut attempt = 4;

        let delay = next_delay(&mut attempt, true, true, &config);

        assert_eq!(delay, config.initial_delay);
        assert_eq!(attempt, 0);
    }

    #[test]
    fn parse_report_state_frame() {
        let frame = r#"data: {"intent":"REPORT_STATE","payload":{"uid":"A1","device":"D1","props":{"on":{"value":true}}}}"#;

        let event = StreamEvent::parse_frame(frame).unwrap().unwrap();
        assert_eq!(
            event,
            StreamEvent::ReportState {
                uid: "A1".into(),
                device: Some("D1".into()),
                on: Some(true),
            }
        );
    }

    #[test]
    fn parse_frame_without_prefix() {
        let frame = r#"  {"intent":"REPORT_STATE","payload":{"uid":"A1","props":{"on":{"value":false}}}}  "#;

        let event = StreamEvent::parse_frame(frame).unwrap().unwrap();
        assert!(matches!(
            event,
            StreamEvent::ReportState { on: Some(false), .. }
        ));
    }

    #[test]
    fn report_state_without_on_prop() {
        let frame = r#"data:{"intent":"REPORT_STATE","payload":{"uid":"A1","props":{"brightness":{"value":40}}}}"#;

        let event = StreamEvent::parse_frame(frame).unwrap().unwrap();
        assert!(matches!(event, StreamEvent::ReportState { on: None, .. }));
    }

    #[test]
    fn other_intents_are_unhandled() {
        let frame = r#"data: {"intent":"DEVICE_ADDED","payload":{"uid":"A9"}}"#;

        let event = StreamEvent::parse_frame(frame).unwrap().unwrap();
        assert_eq!(
            event,
            StreamEvent::Unhandled {
                intent: "DEVICE_ADDED".into()
            }
        );
    }

    #[test]
    fn keepalives_have_no_payload() {
        assert!(StreamEvent::parse_frame("").unwrap().is_none());
        assert!(StreamEvent::parse_frame(": ping").unwrap().is_none());
        assert!(StreamEvent::parse_frame("data:   ").unwrap().is_none());
        assert!(StreamEvent::parse_frame("event: message").unwrap().is_none());
    }

    #[test]
    fn malformed_frames_are_errors() {
        assert!(matches!(
            StreamEvent::parse_frame("data: not json at all"),
            Err(Error::Deserialization { .. })
        ));
        assert!(matches!(
            StreamEvent::parse_frame(r#"data: {"intent":"REPORT_STATE","payload":{}}"#),
            Err(Error::Deserialization { .. })
        ));
    }

    #[test]
    fn frame_buffer_joins_split_chunks() {
        let mut buffer = FrameBuffer::default();

        assert!(buffer.push(b"data: {\"intent\":").is_empty());
        let lines = buffer.push(b"\"X\"}\r\n\ndata: {\"intent\":\"Y\"}\n");

        assert_eq!(
            lines,
            vec![
                "data: {\"intent\":\"X\"}".to_string(),
                "data: {\"intent\":\"Y\"}".to_string()
            ]
        );
        assert!(buffer.finish().is_none());
    }

    #[test]
    fn frame_buffer_flushes_unterminated_tail() {
        let mut buffer = FrameBuffer::default();
        assert!(buffer.push(b"data: {\"intent\":\"Z\"}").is_empty());
        assert_eq!(buffer.finish().as_deref(), Some("data: {\"intent\":\"Z\"}"));
    }

    #[test]
    fn parse_and_broadcast_skips_malformed() {
        let (tx, mut rx) = broadcast::channel::<Arc<StreamEvent>>(16);

        parse_and_broadcast("data: {{{", &tx);
        assert!(rx.try_recv().is_err());

        parse_and_broadcast(r#"data: {"intent":"PING"}"#, &tx);
        let event = rx.try_recv().unwrap();
        assert_eq!(
            *event,
            StreamEvent::Unhandled {
                intent: "PING".into()
            }
        );
    }
}
