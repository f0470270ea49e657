// crates/session-gate-broker/src/session.rs
// ============================================================================
// Module: Session Lifecycle
// Description: Live session object with its lifecycle state machine.
// Purpose: Track one interactive connection from establishment to close.
// Dependencies: session-gate-core, crate::registry, tracing
// ============================================================================

//! ## Overview
//! A [`Session`] represents one live interactive connection to a target.
//! Lifecycle: `Connecting → Active → Closing → Closed`, where any state may
//! jump directly to `Closed` on transport failure and `Closed` is terminal.
//! Deregistration and the single `Ended` notification happen on the first
//! transition into `Closed`, regardless of which task drives it.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;
use std::sync::Mutex;
use std::sync::PoisonError;
use std::sync::Weak;

use session_gate_core::DisconnectReason;
use session_gate_core::SessionChannel;
use session_gate_core::TargetId;
use session_gate_core::TransportError;

use crate::registry::RegistryShared;

// ============================================================================
// SECTION: Session State
// ============================================================================

/// Lifecycle state of a session.
///
/// # Invariants
/// - `Closed` is terminal; no transition leaves it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    /// The underlying channel is being established.
    Connecting,
    /// The channel is established and usable.
    Active,
    /// A graceful close is in progress.
    Closing,
    /// The session has ended.
    Closed,
}

// ============================================================================
// SECTION: Session
// ============================================================================

/// One live interactive connection to a target instance.
///
/// # Invariants
/// - The first transition into [`SessionState::Closed`] deregisters the
///   session and emits exactly one `Ended` event; later transitions are
///   no-ops.
pub struct Session {
    /// Target this session connects to.
    target: TargetId,
    /// Underlying transport channel.
    channel: Arc<dyn SessionChannel>,
    /// Current lifecycle state.
    state: Mutex<SessionState>,
    /// Registry backlink used for deregistration from any task.
    registry: Weak<RegistryShared>,
}

impl Session {
    /// Creates a session in the `Connecting` state.
    pub(crate) fn new(
        target: TargetId,
        channel: Arc<dyn SessionChannel>,
        registry: Weak<RegistryShared>,
    ) -> Self {
        Self {
            target,
            channel,
            state: Mutex::new(SessionState::Connecting),
            registry,
        }
    }

    /// Returns the target this session connects to.
    #[must_use]
    pub const fn target(&self) -> &TargetId {
        &self.target
    }

    /// Returns a snapshot of the lifecycle state.
    #[must_use]
    pub fn state(&self) -> SessionState {
        *self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Returns the underlying channel for the disconnect watcher.
    pub(crate) fn channel(&self) -> Arc<dyn SessionChannel> {
        Arc::clone(&self.channel)
    }

    /// Marks the channel as established.
    ///
    /// Called during registration; only the `Connecting` state advances.
    pub(crate) fn mark_active(&self) {
        let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
        if *state == SessionState::Connecting {
            *state = SessionState::Active;
        }
    }

    /// Brings the session's surface to the foreground and records it as the
    /// active session.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the session is closed or activation
    /// fails.
    pub async fn activate(&self) -> Result<(), TransportError> {
        if self.state() == SessionState::Closed {
            return Err(TransportError::ChannelFailed("session is closed".to_string()));
        }
        self.channel.activate().await?;
        if let Some(registry) = self.registry.upgrade() {
            registry.set_active(&self.target);
        }
        Ok(())
    }

    /// Gracefully closes the session.
    ///
    /// Closing an already closing or closed session is a no-op.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when channel teardown fails; the session
    /// transitions to `Closed` either way.
    pub async fn close(&self) -> Result<(), TransportError> {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            match *state {
                SessionState::Closing | SessionState::Closed => return Ok(()),
                SessionState::Connecting | SessionState::Active => {
                    *state = SessionState::Closing;
                }
            }
        }
        let result = self.channel.shutdown().await;
        self.finish_closed();
        result
    }

    /// Handles the underlying channel ending, from whichever task observed
    /// it.
    pub(crate) fn handle_disconnect(&self, reason: &DisconnectReason) {
        match reason {
            DisconnectReason::Closed => {
                tracing::debug!(target = %self.target, "session channel closed");
            }
            DisconnectReason::Failure(message) => {
                tracing::warn!(target = %self.target, error = %message, "session channel dropped");
            }
        }
        self.finish_closed();
    }

    /// Performs the single transition into `Closed`.
    ///
    /// The first caller deregisters the session and triggers the `Ended`
    /// notification; every later caller is a no-op.
    fn finish_closed(&self) {
        {
            let mut state = self.state.lock().unwrap_or_else(PoisonError::into_inner);
            if *state == SessionState::Closed {
                return;
            }
            *state = SessionState::Closed;
        }
        if let Some(registry) = self.registry.upgrade() {
            registry.remove_closed(&self.target);
        }
    }
}

impl std::fmt::Debug for Session {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Session")
            .field("target", &self.target)
            .field("state", &self.state())
            .finish_non_exhaustive()
    }
}
