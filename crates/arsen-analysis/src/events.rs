//! In-process event bus.
//!
//! Services publish [`EventKind`]s as they load binaries, run analysis, and
//! edit projects. Any number of listeners subscribe; a listener that falls
//! behind loses the oldest events rather than blocking publishers.

use std::path::PathBuf;

use arsen_common::types::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Number of events buffered per subscriber.
pub const EVENT_CAPACITY: usize = 256;

/// What happened.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EventKind {
    /// A binary was parsed and became current.
    BinaryLoaded {
        /// Source file.
        path: PathBuf,
    },
    /// The analysis pipeline started.
    AnalysisStarted {
        /// Source file being analysed.
        path: PathBuf,
    },
    /// A pass finished.
    AnalysisProgress {
        /// Share of passes complete, 0 to 100.
        percent: u8,
    },
    /// All passes ran.
    AnalysisCompleted {
        /// Functions detected.
        functions: usize,
    },
    /// Pseudocode was rendered for the detected functions.
    PseudocodeGenerated {
        /// Functions with non-empty output.
        count: usize,
    },
    /// A project file was written.
    ProjectSaved {
        /// Destination file.
        path: PathBuf,
    },
    /// A project file was read.
    ProjectLoaded {
        /// Project name.
        name: String,
    },
    /// A symbol was added.
    SymbolAdded {
        /// Symbol address.
        address: Address,
        /// Symbol name.
        name: String,
    },
    /// A symbol was renamed.
    SymbolRenamed {
        /// Symbol address.
        address: Address,
        /// New name.
        name: String,
    },
    /// A recoverable failure worth surfacing.
    ErrorOccurred {
        /// Human-readable description.
        message: String,
    },
}

/// A timestamped event.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArsenEvent {
    /// Payload.
    pub kind: EventKind,
    /// When it was published.
    pub timestamp: DateTime<Utc>,
}

/// Cloneable handle to a broadcast channel of [`ArsenEvent`]s.
#[derive(Debug, Clone)]
pub struct EventBus {
    sender: broadcast::Sender<ArsenEvent>,
}

impl EventBus {
    /// Creates a bus buffering [`EVENT_CAPACITY`] events per subscriber.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _) = broadcast::channel(EVENT_CAPACITY);
        Self { sender }
    }

    /// Publishes an event to every current subscriber.
    pub fn publish(&self, kind: EventKind) {
        let event = ArsenEvent {
            kind,
            timestamp: Utc::now(),
        };
        if let Err(err) = self.sender.send(event) {
            tracing::trace!(event = ?err.0.kind, "no subscribers for event");
        }
    }

    /// Registers a new listener that sees events published from now on.
    #[must_use]
    pub fn subscribe(&self) -> EventReceiver {
        EventReceiver {
            receiver: self.sender.subscribe(),
        }
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}

/// Receiving end of an [`EventBus`] subscription.
#[derive(Debug)]
pub struct EventReceiver {
    receiver: broadcast::Receiver<ArsenEvent>,
}

impl EventReceiver {
    /// Returns the next buffered event without waiting, skipping any the
    /// receiver lagged past.
    pub fn try_recv(&mut self) -> Option<ArsenEvent> {
        loop {
            match self.receiver.try_recv() {
                Ok(event) => return Some(event),
                Err(broadcast::error::TryRecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event receiver lagged");
                }
                Err(_) => return None,
            }
        }
    }

    /// Waits for the next event. Returns `None` once every bus handle is
    /// dropped.
    pub async fn recv(&mut self) -> Option<ArsenEvent> {
        loop {
            match self.receiver.recv().await {
                Ok(event) => return Some(event),
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    tracing::debug!(skipped, "event receiver lagged");
                }
                Err(broadcast::error::RecvError::Closed) => return None,
            }
        }
    }

    /// Drains every event currently buffered.
    pub fn drain(&mut self) -> Vec<ArsenEvent> {
        std::iter::from_fn(|| self.try_recv()).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn publish_without_subscribers_is_silent() {
        let bus = EventBus::new();
        bus.publish(EventKind::AnalysisProgress { percent: 10 });
        assert_eq!(bus.subscriber_count(), 0);
    }

    #[test]
    fn subscribers_receive_in_order() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.publish(EventKind::AnalysisProgress { percent: 20 });
        bus.publish(EventKind::AnalysisCompleted { functions: 3 });

        let kinds: Vec<EventKind> = rx.drain().into_iter().map(|e| e.kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::AnalysisProgress { percent: 20 },
                EventKind::AnalysisCompleted { functions: 3 },
            ]
        );
        assert!(rx.try_recv().is_none());
    }

    #[test]
    fn clones_share_the_channel() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        bus.clone().publish(EventKind::ProjectLoaded { name: "demo".into() });
        let event = rx.try_recv().expect("event from clone");
        assert_eq!(event.kind, EventKind::ProjectLoaded { name: "demo".into() });
    }

    #[test]
    fn lagging_receiver_skips_to_oldest_retained() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        for i in 0..EVENT_CAPACITY + 10 {
            bus.publish(EventKind::AnalysisCompleted { functions: i });
        }
        let first = rx.try_recv().expect("retained event");
        assert_eq!(first.kind, EventKind::AnalysisCompleted { functions: 10 });
        assert_eq!(rx.drain().len(), EVENT_CAPACITY - 1);
    }

    #[tokio::test]
    async fn async_recv_waits_for_publish() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        let publisher = bus.clone();
        let handle = tokio::spawn(async move {
            publisher.publish(EventKind::ErrorOccurred {
                message: "boom".into(),
            });
        });
        let event = rx.recv().await.expect("event");
        handle.await.expect("publisher task");
        assert!(matches!(event.kind, EventKind::ErrorOccurred { .. }));
    }

    #[tokio::test]
    async fn recv_ends_when_bus_dropped() {
        let bus = EventBus::new();
        let mut rx = bus.subscribe();
        drop(bus);
        assert!(rx.recv().await.is_none());
    }
}
