// crates/session-gate-broker/src/cancel.rs
// ============================================================================
// Module: Connect Cancellation
// Description: Caller-supplied cancellation signal for connect attempts.
// Purpose: Let callers abort in-flight permission, prompt, and generation steps.
// Dependencies: tokio
// ============================================================================

//! ## Overview
//! [`CancelHandle`] and [`CancelToken`] form a cooperative cancellation
//! pair backed by a watch channel. The broker races every awaited
//! collaborator call against the token, so cancelling aborts the in-flight
//! step and the connect attempt unwinds without registering the target.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::pending;
use std::sync::Arc;

use tokio::sync::watch;

// ============================================================================
// SECTION: Cancel Handle
// ============================================================================

/// Owning side of a cancellation pair.
///
/// # Invariants
/// - Cancellation is sticky: once cancelled, all tokens observe it forever.
#[derive(Debug, Clone)]
pub struct CancelHandle {
    /// Watch sender flipping the cancelled flag.
    sender: Arc<watch::Sender<bool>>,
}

impl CancelHandle {
    /// Creates a fresh, uncancelled handle.
    #[must_use]
    pub fn new() -> Self {
        let (sender, _receiver) = watch::channel(false);
        Self {
            sender: Arc::new(sender),
        }
    }

    /// Returns a token observing this handle.
    #[must_use]
    pub fn token(&self) -> CancelToken {
        CancelToken {
            receiver: self.sender.subscribe(),
        }
    }

    /// Signals cancellation to all tokens.
    pub fn cancel(&self) {
        self.sender.send_replace(true);
    }
}

impl Default for CancelHandle {
    fn default() -> Self {
        Self::new()
    }
}

// ============================================================================
// SECTION: Cancel Token
// ============================================================================

/// Observing side of a cancellation pair.
///
/// # Invariants
/// - A token whose handle was dropped without cancelling never resolves.
#[derive(Debug, Clone)]
pub struct CancelToken {
    /// Watch receiver observing the cancelled flag.
    receiver: watch::Receiver<bool>,
}

impl CancelToken {
    /// Returns a token that can never be cancelled.
    #[must_use]
    pub fn never() -> Self {
        let (sender, receiver) = watch::channel(false);
        drop(sender);
        Self {
            receiver,
        }
    }

    /// Returns true when cancellation has been signalled.
    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        *self.receiver.borrow()
    }

    /// Resolves once cancellation has been signalled.
    pub async fn cancelled(&self) {
        let mut receiver = self.receiver.clone();
        loop {
            if *receiver.borrow_and_update() {
                return;
            }
            if receiver.changed().await.is_err() {
                // Handle dropped without cancelling; stay pending forever.
                pending::<()>().await;
            }
        }
    }
}
