/*!
 * Transition Event Stream
 *
 * Sinks receive every state transition synchronously, from inside the
 * critical section that made it. Delivery order therefore equals Bakery
 * ticket order. Sinks must not block and must not call back into the state
 * manager (the caller still holds the lock).
 */

use super::types::TransitionEvent;
use std::sync::Arc;
use tracing::{info, trace};

/// Observer of state transitions
pub trait TransitionSink: Send + Sync {
    fn on_transition(&self, event: &TransitionEvent);
}

/// Discards events
#[derive(Debug, Default, Clone, Copy)]
pub struct NullSink;

impl TransitionSink for NullSink {
    #[inline]
    fn on_transition(&self, _event: &TransitionEvent) {}
}

/// Logs each transition as a structured `tracing` event
#[derive(Debug, Default, Clone, Copy)]
pub struct TracingSink;

impl TransitionSink for TracingSink {
    fn on_transition(&self, event: &TransitionEvent) {
        info!(
            seq = event.seq,
            pid = event.pid,
            from = %event.from,
            to = %event.to,
            timestamp_ns = event.timestamp_ns,
            "process state transition"
        );
    }
}

/// Forwards events to an unbounded flume channel
///
/// Sending never blocks. Once every receiver is gone events are dropped.
#[derive(Debug, Clone)]
pub struct ChannelSink {
    tx: flume::Sender<TransitionEvent>,
}

impl ChannelSink {
    /// Create a sink and the receiving end of its stream
    pub fn channel() -> (Self, flume::Receiver<TransitionEvent>) {
        let (tx, rx) = flume::unbounded();
        (Self { tx }, rx)
    }
}

impl TransitionSink for ChannelSink {
    fn on_transition(&self, event: &TransitionEvent) {
        if self.tx.send(*event).is_err() {
            trace!(seq = event.seq, "transition dropped: no receivers");
        }
    }
}

/// Delivers each event to several sinks in order
#[derive(Default, Clone)]
pub struct FanoutSink {
    sinks: Vec<Arc<dyn TransitionSink>>,
}

impl FanoutSink {
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with(mut self, sink: Arc<dyn TransitionSink>) -> Self {
        self.sinks.push(sink);
        self
    }

    pub fn len(&self) -> usize {
        self.sinks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sinks.is_empty()
    }
}

impl TransitionSink for FanoutSink {
    fn on_transition(&self, event: &TransitionEvent) {
        for sink in &self.sinks {
            sink.on_transition(event);
        }
    }
}
