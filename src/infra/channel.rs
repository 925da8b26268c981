//! Completion signal channel.
//!
//! Many producers, exactly one consumer: the engine's
//! [`crate::core::CompletionTracker`].

use crossbeam_channel::{bounded, unbounded, Receiver, Sender, TrySendError};
use tracing::debug;

use crate::core::CompletionSignal;

/// Producer handle for completion signals. Cheap to clone.
#[derive(Debug, Clone)]
pub struct SignalSender {
    tx: Sender<String>,
}

impl SignalSender {
    /// Send a raw signal line. Returns `false` if it was not accepted (channel full
    /// or consumer gone); producers do not retry.
    pub fn send_raw(&self, raw: impl Into<String>) -> bool {
        match self.tx.try_send(raw.into()) {
            Ok(()) => true,
            Err(TrySendError::Full(raw)) => {
                debug!(signal = %raw, "completion channel full; signal dropped");
                false
            }
            Err(TrySendError::Disconnected(_)) => false,
        }
    }

    /// Send a signal in wire format.
    pub fn send(&self, signal: &CompletionSignal) -> bool {
        self.send_raw(signal.to_wire())
    }
}

/// Create a completion channel, bounded when `capacity` is given.
#[must_use]
pub fn completion_channel(capacity: Option<usize>) -> (SignalSender, Receiver<String>) {
    let (tx, rx) = capacity.map_or_else(unbounded, bounded);
    (SignalSender { tx }, rx)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::StageKind;

    #[test]
    fn test_bounded_channel_drops_when_full() {
        let (sender, rx) = completion_channel(Some(1));
        assert!(sender.send_raw("a"));
        assert!(!sender.send_raw("b"));
        assert_eq!(rx.try_recv().unwrap(), "a");
    }

    #[test]
    fn test_send_uses_wire_format() {
        let (sender, rx) = completion_channel(None);
        let signal = CompletionSignal {
            kind: StageKind::Hack,
            batch_id: "n00dles-7".into(),
            success: true,
            value: 12.0,
            threads: 3,
        };
        assert!(sender.clone().send(&signal));
        assert_eq!(rx.try_recv().unwrap(), "hack_done|n00dles-7|12|3");
    }

    #[test]
    fn test_send_after_consumer_dropped() {
        let (sender, rx) = completion_channel(None);
        drop(rx);
        assert!(!sender.send_raw("late"));
    }
}
