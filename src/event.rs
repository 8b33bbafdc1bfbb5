use std::sync::mpsc::{sync_channel, Receiver, SyncSender};

use crate::error::ErrorKind;

/// Bound on the worker-to-controller channel. A full channel blocks the
/// sending worker, which throttles output-heavy hosts without dropping lines.
pub const EVENT_CHANNEL_CAPACITY: usize = 256;

#[derive(Debug, Clone, PartialEq)]
pub enum BuildEvent {
    Connecting { host: String },
    Preparing { host: String },
    Started { host: String },
    Line { host: String, line: String },
    Exited { host: String, exit_code: i32 },
    Failed { host: String, kind: ErrorKind, message: String },
}

impl BuildEvent {
    pub fn host(&self) -> &str {
        match self {
            Self::Connecting { host }
            | Self::Preparing { host }
            | Self::Started { host }
            | Self::Line { host, .. }
            | Self::Exited { host, .. }
            | Self::Failed { host, .. } => host,
        }
    }
}

pub trait EventSink: Send {
    fn send(&self, event: BuildEvent);
}

/// Sink backed by the bounded controller channel. `send` blocks when the
/// channel is full; a vanished receiver (shutdown) is ignored.
#[derive(Clone)]
pub struct ChannelSink {
    tx: SyncSender<BuildEvent>,
}

impl ChannelSink {
    pub fn new(tx: SyncSender<BuildEvent>) -> Self {
        Self { tx }
    }
}

impl EventSink for ChannelSink {
    fn send(&self, event: BuildEvent) {
        let _ = self.tx.send(event);
    }
}

pub fn event_channel() -> (ChannelSink, Receiver<BuildEvent>) {
    let (tx, rx) = sync_channel(EVENT_CHANNEL_CAPACITY);
    (ChannelSink::new(tx), rx)
}
