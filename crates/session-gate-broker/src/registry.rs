// crates/session-gate-broker/src/registry.rs
// ============================================================================
// Module: Session Registry
// Description: Single-lock registry of live sessions keyed by target identity.
// Purpose: Enforce one session per target and publish lifecycle events in order.
// Dependencies: session-gate-core, crate::{events, session}, tracing
// ============================================================================

//! ## Overview
//! The registry is the only shared mutable state in the broker. Inserts
//! and removals go through one write lock; queries use read locks. A
//! connect attempt first places a reservation, which a drop guard releases
//! on every failure path, so a cancelled or failed connect never leaves
//! the target registered. Lifecycle events are published while the write
//! lock is held, which totally orders each target's `Started` and `Ended`.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::collections::BTreeMap;
use std::sync::Arc;
use std::sync::PoisonError;
use std::sync::RwLock;

use session_gate_core::TargetId;

use crate::events::SessionEvent;
use crate::events::SessionEvents;
use crate::session::Session;
use crate::session::SessionState;

// ============================================================================
// SECTION: Registry Entries
// ============================================================================

/// One slot in the registry.
#[derive(Debug)]
enum RegistryEntry {
    /// A connect attempt is in flight for this target.
    Reserved,
    /// A session is established for this target.
    Established(Arc<Session>),
}

// ============================================================================
// SECTION: Shared Registry State
// ============================================================================

/// Registry state shared between the broker, sessions, and watcher tasks.
///
/// # Invariants
/// - At most one entry exists per target identity.
/// - Entries are inserted only through reservations and removed only by
///   reservation release or the first close of their session.
#[derive(Debug)]
pub(crate) struct RegistryShared {
    /// Registry slots keyed by target identity.
    entries: RwLock<BTreeMap<TargetId, RegistryEntry>>,
    /// Most recently activated target, if any.
    active: RwLock<Option<TargetId>>,
    /// Lifecycle event publisher.
    events: SessionEvents,
}

impl RegistryShared {
    /// Creates an empty registry with the given event publisher.
    pub(crate) fn new(events: SessionEvents) -> Self {
        Self {
            entries: RwLock::new(BTreeMap::new()),
            active: RwLock::new(None),
            events,
        }
    }

    /// Subscribes to lifecycle events.
    pub(crate) fn subscribe(&self) -> tokio::sync::broadcast::Receiver<SessionEvent> {
        self.events.subscribe()
    }

    /// Atomically reserves the slot for a connect attempt.
    ///
    /// Returns `None` when any entry (reservation or session) already
    /// occupies the slot.
    pub(crate) fn begin_connect(
        shared: &Arc<Self>,
        target: &TargetId,
    ) -> Option<ConnectReservation> {
        let mut entries = shared.entries.write().unwrap_or_else(PoisonError::into_inner);
        if entries.contains_key(target) {
            return None;
        }
        entries.insert(target.clone(), RegistryEntry::Reserved);
        Some(ConnectReservation {
            shared: Arc::clone(shared),
            target: target.clone(),
            completed: false,
        })
    }

    /// Swaps a reservation for its established session.
    ///
    /// Flips the session to `Active`, records it as the active session, and
    /// publishes `Started` under the write lock.
    fn complete(&self, target: &TargetId, session: Arc<Session>) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        session.mark_active();
        entries.insert(target.clone(), RegistryEntry::Established(session));
        *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(target.clone());
        tracing::info!(target = %target, "session started");
        self.events.publish(SessionEvent::Started {
            target: target.clone(),
        });
    }

    /// Releases an unfinished reservation.
    fn release_reservation(&self, target: &TargetId) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if matches!(entries.get(target), Some(RegistryEntry::Reserved)) {
            entries.remove(target);
        }
    }

    /// Deregisters a closed session and publishes `Ended` under the write
    /// lock.
    pub(crate) fn remove_closed(&self, target: &TargetId) {
        let mut entries = self.entries.write().unwrap_or_else(PoisonError::into_inner);
        if !matches!(entries.get(target), Some(RegistryEntry::Established(_))) {
            return;
        }
        entries.remove(target);
        let mut active = self.active.write().unwrap_or_else(PoisonError::into_inner);
        if active.as_ref() == Some(target) {
            *active = None;
        }
        drop(active);
        tracing::info!(target = %target, "session ended");
        self.events.publish(SessionEvent::Ended {
            target: target.clone(),
        });
    }

    /// Records the most recently activated target.
    pub(crate) fn set_active(&self, target: &TargetId) {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        if matches!(entries.get(target), Some(RegistryEntry::Established(_))) {
            *self.active.write().unwrap_or_else(PoisonError::into_inner) = Some(target.clone());
        }
    }

    /// Returns true when an established, non-closed session exists for the
    /// target.
    pub(crate) fn is_connected(&self, target: &TargetId) -> bool {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(target) {
            Some(RegistryEntry::Established(session)) => session.state() != SessionState::Closed,
            Some(RegistryEntry::Reserved) | None => false,
        }
    }

    /// Returns the established session for the target, if any.
    pub(crate) fn find(&self, target: &TargetId) -> Option<Arc<Session>> {
        let entries = self.entries.read().unwrap_or_else(PoisonError::into_inner);
        match entries.get(target) {
            Some(RegistryEntry::Established(session)) => Some(Arc::clone(session)),
            Some(RegistryEntry::Reserved) | None => None,
        }
    }

    /// Returns the most recently activated session, if it is still
    /// registered.
    pub(crate) fn active_session(&self) -> Option<Arc<Session>> {
        let target = self.active.read().unwrap_or_else(PoisonError::into_inner).clone()?;
        self.find(&target)
    }
}

// ============================================================================
// SECTION: Connect Reservation
// ============================================================================

/// Drop guard holding a target's registry slot during a connect attempt.
///
/// # Invariants
/// - Dropped without completing, the reservation is released and the
///   target is left unregistered.
#[derive(Debug)]
pub(crate) struct ConnectReservation {
    /// Registry the reservation belongs to.
    shared: Arc<RegistryShared>,
    /// Reserved target.
    target: TargetId,
    /// Set once the reservation was swapped for a session.
    completed: bool,
}

impl ConnectReservation {
    /// Completes the reservation with an established session.
    pub(crate) fn complete(mut self, session: Arc<Session>) {
        self.shared.complete(&self.target, session);
        self.completed = true;
    }
}

impl Drop for ConnectReservation {
    fn drop(&mut self) {
        if !self.completed {
            self.shared.release_reservation(&self.target);
        }
    }
}
