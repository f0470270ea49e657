// crates/session-gate-broker/src/events.rs
// ============================================================================
// Module: Session Lifecycle Events
// Description: Broadcast notifications for session start and end.
// Purpose: Let the surrounding application track live session state.
// Dependencies: session-gate-core, tokio
// ============================================================================

//! ## Overview
//! Lifecycle notifications are published through a broadcast channel.
//! Publication happens while the registry write lock is held, so for any
//! one target `Started` always precedes `Ended` and a target's events are
//! delivered in order to every subscriber.

// ============================================================================
// SECTION: Imports
// ============================================================================

use session_gate_core::TargetId;
use tokio::sync::broadcast;

// ============================================================================
// SECTION: Session Events
// ============================================================================

/// Lifecycle notification for one session.
///
/// # Invariants
/// - For one target, `Started` is always delivered before `Ended`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionEvent {
    /// A session for the target was registered.
    Started {
        /// Target the session connects to.
        target: TargetId,
    },
    /// The session for the target was deregistered.
    Ended {
        /// Target the session connected to.
        target: TargetId,
    },
}

impl SessionEvent {
    /// Returns the target this event refers to.
    #[must_use]
    pub const fn target(&self) -> &TargetId {
        match self {
            Self::Started {
                target,
            }
            | Self::Ended {
                target,
            } => target,
        }
    }
}

// ============================================================================
// SECTION: Event Publisher
// ============================================================================

/// Broadcast publisher for session lifecycle events.
///
/// # Invariants
/// - Publishing never blocks; lagging subscribers drop old events rather
///   than stalling the registry.
#[derive(Debug)]
pub(crate) struct SessionEvents {
    /// Broadcast sender shared by all publication sites.
    sender: broadcast::Sender<SessionEvent>,
}

impl SessionEvents {
    /// Creates a publisher with the given channel capacity.
    pub(crate) fn new(capacity: usize) -> Self {
        let (sender, _receiver) = broadcast::channel(capacity);
        Self {
            sender,
        }
    }

    /// Subscribes to future events.
    pub(crate) fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.sender.subscribe()
    }

    /// Publishes an event to all current subscribers.
    pub(crate) fn publish(&self, event: SessionEvent) {
        // A send error only means there are no subscribers right now.
        drop(self.sender.send(event));
    }
}
