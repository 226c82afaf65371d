//! Output channel of the ingestion pipeline.
//!
//! Whatever displays the stream (the `monitor` command, a GUI, a test) holds the
//! receiving end; the pipeline holds an [`EventSink`] and pushes one event per
//! forwarded sample and one per completed statistics batch.

use tokio::sync::mpsc::{error::SendError, unbounded_channel, UnboundedReceiver, UnboundedSender};

use crate::client::ClientState;
use crate::data::sample::TransformedSample;
use crate::data::stats::StatsSnapshot;

/// Messages emitted towards the display side.
#[derive(Debug, Clone, PartialEq)]
pub enum PipelineEvent {
    /// A sample that passed decimation and is now in the window.
    Sample(TransformedSample),
    /// A completed statistics batch.
    Stats(StatsSnapshot),
    /// Connection state change, forwarded by the monitor loop.
    Connection(ClientState),
}

/// Cloneable sender for pipeline events.
#[derive(Debug, Clone)]
pub struct EventSink {
    tx: UnboundedSender<PipelineEvent>,
}

impl EventSink {
    pub fn send_sample(&self, sample: TransformedSample) -> Result<(), SendError<PipelineEvent>> {
        self.tx.send(PipelineEvent::Sample(sample))
    }

    pub fn send_stats(&self, stats: StatsSnapshot) -> Result<(), SendError<PipelineEvent>> {
        self.tx.send(PipelineEvent::Stats(stats))
    }

    pub fn send_state(&self, state: ClientState) -> Result<(), SendError<PipelineEvent>> {
        self.tx.send(PipelineEvent::Connection(state))
    }

    /// True once the receiving side has been dropped.
    pub fn is_closed(&self) -> bool {
        self.tx.is_closed()
    }
}

/// Create a new event channel.
pub fn channel_events() -> (EventSink, UnboundedReceiver<PipelineEvent>) {
    let (tx, rx) = unbounded_channel();
    (EventSink { tx }, rx)
}
