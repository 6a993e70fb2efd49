//! Change notification.
//!
//! The notifier fans engine events out to any number of subscribers. Each
//! subscriber sees events in publication order through a bounded buffer.
//! Publishing never waits for a subscriber: when one falls behind, its oldest
//! events are discarded and it receives a single `backlog_dropped` error in
//! their place, followed by the events that were retained.

use serde::Serialize;
use std::sync::Arc;
use tokio::sync::broadcast::{self, error::RecvError, error::TryRecvError};
use tokio_stream::wrappers::BroadcastStream;
use tokio_stream::wrappers::errors::BroadcastStreamRecvError;
use tokio_stream::{Stream, StreamExt};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::planner::Plan;
use crate::state::StateSummary;

/// Classes of error events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum EventErrorKind {
    /// The subscriber fell behind and lost events.
    BacklogDropped,
    /// A module reload failed.
    ConfigError,
    /// A state write lost a version race.
    StateConflict,
    /// A state write failed for another reason.
    StateError,
}

impl std::fmt::Display for EventErrorKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Self::BacklogDropped => "backlog_dropped",
            Self::ConfigError => "config_error",
            Self::StateConflict => "state_conflict",
            Self::StateError => "state_error",
        };
        write!(f, "{s}")
    }
}

/// An event delivered to subscribers.
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EngineEvent {
    /// A new plan was computed.
    PlanUpdated(Arc<Plan>),
    /// The recorded state was replaced.
    StateUpdated(StateSummary),
    /// Something went wrong, or events were lost.
    Error {
        /// Error class.
        kind: EventErrorKind,
        /// Human-readable description.
        message: String,
    },
}

impl EngineEvent {
    /// Creates an error event.
    #[must_use]
    pub fn error(kind: EventErrorKind, message: impl Into<String>) -> Self {
        Self::Error {
            kind,
            message: message.into(),
        }
    }

    /// Returns the error kind for error events.
    #[must_use]
    pub const fn error_kind(&self) -> Option<EventErrorKind> {
        match self {
            Self::Error { kind, .. } => Some(*kind),
            _ => None,
        }
    }

    fn backlog_dropped(skipped: u64) -> Self {
        Self::error(
            EventErrorKind::BacklogDropped,
            format!("{skipped} events dropped because the subscriber fell behind"),
        )
    }
}

/// Publishes events to subscribers.
#[derive(Debug, Clone)]
pub struct ChangeNotifier {
    /// Broadcast sender; each receiver is one subscriber.
    sender: broadcast::Sender<EngineEvent>,
}

impl ChangeNotifier {
    /// Creates a notifier whose subscribers buffer up to `capacity` events.
    ///
    /// A capacity of zero is raised to one.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let capacity = capacity.max(1);
        let (sender, _) = broadcast::channel(capacity);
        Self { sender }
    }

    /// Registers a new subscriber.
    ///
    /// The subscriber receives events published after this call.
    #[must_use]
    pub fn subscribe(&self) -> Subscription {
        let subscription = Subscription {
            id: Uuid::new_v4(),
            receiver: self.sender.subscribe(),
        };
        debug!("Subscriber {} registered", subscription.id);
        subscription
    }

    /// Publishes an event to every current subscriber without blocking.
    ///
    /// Returns the number of subscribers the event was queued for.
    pub fn publish(&self, event: EngineEvent) -> usize {
        self.sender.send(event).unwrap_or_else(|_| {
            debug!("Event published with no subscribers");
            0
        })
    }

    /// Returns the number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.sender.receiver_count()
    }
}

/// A registered subscriber.
///
/// Dropping the subscription deregisters it and releases its place in the
/// buffer.
#[derive(Debug)]
pub struct Subscription {
    id: Uuid,
    receiver: broadcast::Receiver<EngineEvent>,
}

impl Subscription {
    /// Returns the subscriber id.
    #[must_use]
    pub const fn id(&self) -> Uuid {
        self.id
    }

    /// Waits for the next event.
    ///
    /// Returns `None` once the notifier is gone and the buffer is drained.
    pub async fn recv(&mut self) -> Option<EngineEvent> {
        match self.receiver.recv().await {
            Ok(event) => Some(event),
            Err(RecvError::Lagged(skipped)) => {
                warn!("Subscriber {} lagged, {skipped} events dropped", self.id);
                Some(EngineEvent::backlog_dropped(skipped))
            }
            Err(RecvError::Closed) => None,
        }
    }

    /// Returns the next buffered event without waiting.
    pub fn try_recv(&mut self) -> Option<EngineEvent> {
        match self.receiver.try_recv() {
            Ok(event) => Some(event),
            Err(TryRecvError::Lagged(skipped)) => {
                warn!("Subscriber {} lagged, {skipped} events dropped", self.id);
                Some(EngineEvent::backlog_dropped(skipped))
            }
            Err(TryRecvError::Empty | TryRecvError::Closed) => None,
        }
    }

    /// Converts the subscription into a stream of events.
    pub fn into_stream(self) -> impl Stream<Item = EngineEvent> {
        BroadcastStream::new(self.receiver).map(|item| match item {
            Ok(event) => event,
            Err(BroadcastStreamRecvError::Lagged(skipped)) => EngineEvent::backlog_dropped(skipped),
        })
    }
}
