//! Push channel seams.
//!
//! The push transport itself is out of scope. The coordinator consumes any
//! [`PushSource`] that yields named frames and lifecycle notices, and emits
//! outbound events through a [`PushSink`]. [`channel`] builds an in-process
//! pair for embedding and tests.

use async_trait::async_trait;
use linkboard_core::PushFrame;
use serde_json::Value;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::runtime::CoordinatorEvent;

/// What a push source can report.
#[derive(Clone, Debug, PartialEq)]
pub enum PushSourceEvent {
    /// The channel (re)opened.
    Opened,
    /// An inbound frame.
    Frame(PushFrame),
    /// The channel dropped; it may reopen later.
    Closed,
}

/// Inbound half of the push channel.
#[async_trait]
pub trait PushSource: Send {
    /// Next event, or `None` once the source is exhausted for good.
    async fn next_event(&mut self) -> Option<PushSourceEvent>;
}

/// Outbound half of the push channel. Fire-and-forget.
pub trait PushSink: Send + Sync {
    /// Emit `frame` to the server.
    fn emit(&self, frame: PushFrame);
}

/// Sink that discards everything.
#[derive(Clone, Copy, Debug, Default)]
pub struct NullPushSink;

impl PushSink for NullPushSink {
    fn emit(&self, frame: PushFrame) {
        debug!(event = %frame.event, "no push sink, outbound event dropped");
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// In-process channel
// ─────────────────────────────────────────────────────────────────────────────

/// [`PushSource`] fed by a [`PushRemote`].
pub struct ChannelPushSource {
    rx: mpsc::UnboundedReceiver<PushSourceEvent>,
}

#[async_trait]
impl PushSource for ChannelPushSource {
    async fn next_event(&mut self) -> Option<PushSourceEvent> {
        self.rx.recv().await
    }
}

/// [`PushSink`] drained by a [`PushRemote`].
#[derive(Clone)]
pub struct ChannelPushSink {
    tx: mpsc::UnboundedSender<PushFrame>,
}

impl PushSink for ChannelPushSink {
    fn emit(&self, frame: PushFrame) {
        if self.tx.send(frame).is_err() {
            debug!("push remote gone, outbound event dropped");
        }
    }
}

/// The server side of an in-process push channel.
pub struct PushRemote {
    inbound: mpsc::UnboundedSender<PushSourceEvent>,
    outbound: mpsc::UnboundedReceiver<PushFrame>,
}

impl PushRemote {
    /// Report that the channel opened.
    pub fn open(&self) {
        let _ = self.inbound.send(PushSourceEvent::Opened);
    }

    /// Report that the channel dropped.
    pub fn close(&self) {
        let _ = self.inbound.send(PushSourceEvent::Closed);
    }

    /// Deliver a frame to the client.
    pub fn send(&self, event: &str, data: Value) {
        let _ = self
            .inbound
            .send(PushSourceEvent::Frame(PushFrame::new(event, data)));
    }

    /// Next frame the client emitted.
    pub async fn next_outbound(&mut self) -> Option<PushFrame> {
        self.outbound.recv().await
    }

    /// A frame the client emitted, if one is already queued.
    pub fn try_next_outbound(&mut self) -> Option<PushFrame> {
        self.outbound.try_recv().ok()
    }
}

/// Build a connected in-process push channel.
pub fn channel() -> (PushRemote, ChannelPushSource, ChannelPushSink) {
    let (in_tx, in_rx) = mpsc::unbounded_channel();
    let (out_tx, out_rx) = mpsc::unbounded_channel();
    (
        PushRemote {
            inbound: in_tx,
            outbound: out_rx,
        },
        ChannelPushSource { rx: in_rx },
        ChannelPushSink { tx: out_tx },
    )
}

// ─────────────────────────────────────────────────────────────────────────────
// Pump
// ─────────────────────────────────────────────────────────────────────────────

/// Forward push-source events into the coordinator queue until the source
/// ends, the queue closes, or `cancel` fires.
pub(crate) async fn pump(
    mut source: Box<dyn PushSource>,
    events: mpsc::UnboundedSender<CoordinatorEvent>,
    cancel: CancellationToken,
) {
    loop {
        let next = tokio::select! {
            () = cancel.cancelled() => break,
            next = source.next_event() => next,
        };
        let event = match next {
            Some(PushSourceEvent::Opened) => CoordinatorEvent::PushOpened,
            Some(PushSourceEvent::Frame(frame)) => CoordinatorEvent::Push(frame),
            Some(PushSourceEvent::Closed) => {
                info!("push channel closed, waiting for reopen");
                CoordinatorEvent::PushClosed
            }
            None => {
                debug!("push source exhausted");
                break;
            }
        };
        if events.send(event).is_err() {
            break;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn remote_feeds_source() {
        let (remote, mut source, _sink) = channel();
        remote.open();
        remote.send("status_update", json!({"mqtt_status": "Connected"}));
        remote.close();

        assert_eq!(source.next_event().await, Some(PushSourceEvent::Opened));
        assert_eq!(
            source.next_event().await,
            Some(PushSourceEvent::Frame(PushFrame::new(
                "status_update",
                json!({"mqtt_status": "Connected"})
            )))
        );
        assert_eq!(source.next_event().await, Some(PushSourceEvent::Closed));
        drop(remote);
        assert_eq!(source.next_event().await, None);
    }

    #[tokio::test]
    async fn sink_reaches_remote() {
        let (mut remote, _source, sink) = channel();
        sink.emit(PushFrame::new("request_status_update", Value::Null));
        let frame = remote.next_outbound().await.unwrap();
        assert_eq!(frame.event, "request_status_update");
        assert!(remote.try_next_outbound().is_none());
    }

    #[tokio::test]
    async fn pump_translates_lifecycle_and_frames() {
        let (remote, source, _sink) = channel();
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel = CancellationToken::new();
        let task = tokio::spawn(pump(Box::new(source), tx, cancel.clone()));

        remote.open();
        remote.close();
        remote.send("new_signal", json!({}));

        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::PushOpened)));
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::PushClosed)));
        assert!(matches!(rx.recv().await, Some(CoordinatorEvent::Push(f)) if f.event == "new_signal"));

        cancel.cancel();
        task.await.unwrap();
    }

    #[tokio::test]
    async fn pump_stops_when_source_ends() {
        let (remote, source, _sink) = channel();
        let (tx, _rx) = mpsc::unbounded_channel();
        drop(remote);
        pump(Box::new(source), tx, CancellationToken::new()).await;
    }
}
