//! Typed session events.
//!
//! The solver thread never calls observers directly: events are handed off
//! through unbounded channels, so a slow consumer cannot stall a gradient
//! step. Within one run events arrive in non-decreasing iteration order.

use crossbeam_channel::{unbounded, Receiver, Sender};
use ndarray::Array2;
use parking_lot::Mutex;

/// An event published by an [`EmbeddingSession`](super::EmbeddingSession).
#[derive(Debug, Clone)]
pub enum SessionEvent {
    /// Computation progress.
    Progress {
        /// 0–100, non-decreasing within a run, exactly 100 on finish.
        percentage: f32,
        /// What the session is currently doing.
        stage: String,
    },
    /// A fresh layout snapshot.
    Layout {
        /// Solver iterations completed so far.
        iteration: usize,
        /// Copy of the coordinate buffer, one row per point.
        coordinates: Array2<f32>,
    },
    /// The iteration budget was exhausted.
    Finished,
    /// The run ended early.
    Aborted {
        /// `true` when the solver had to be abandoned after the stop grace
        /// period; such a run cannot be continued.
        forced: bool,
    },
}

/// Fan-out point for session events.
#[derive(Default)]
pub(super) struct EventHub {
    senders: Mutex<Vec<Sender<SessionEvent>>>,
}

impl EventHub {
    /// Register a new observer.
    pub fn subscribe(&self) -> Receiver<SessionEvent> {
        let (tx, rx) = unbounded();
        self.senders.lock().push(tx);
        rx
    }

    /// Deliver an event to every live observer, dropping disconnected ones.
    pub fn publish(&self, event: SessionEvent) {
        self.senders
            .lock()
            .retain(|sender| sender.send(event.clone()).is_ok());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_publish_reaches_all_subscribers() {
        let hub = EventHub::default();
        let a = hub.subscribe();
        let b = hub.subscribe();

        hub.publish(SessionEvent::Finished);

        assert!(matches!(a.try_recv(), Ok(SessionEvent::Finished)));
        assert!(matches!(b.try_recv(), Ok(SessionEvent::Finished)));
    }

    #[test]
    fn test_dropped_subscriber_is_pruned() {
        let hub = EventHub::default();
        let a = hub.subscribe();
        drop(hub.subscribe());

        hub.publish(SessionEvent::Finished);
        hub.publish(SessionEvent::Aborted { forced: false });

        assert_eq!(a.len(), 2);
        assert_eq!(hub.senders.lock().len(), 1);
    }
}
