// crates/session-gate-broker/src/tests.rs
// ============================================================================
// Module: Broker Test Lint Configuration
// Description: Shared test-only lint relaxations and cancellation unit tests.
// Purpose: Allow panic-based assertions and cover the cancellation pair.
// Dependencies: session-gate-broker
// ============================================================================

//! ## Overview
//! Provides test-only lint relaxations for Session Gate broker unit tests
//! and covers the cancellation primitives.

// ============================================================================
// SECTION: Lint Configuration
// ============================================================================

#![allow(
    clippy::panic,
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::use_debug,
    clippy::dbg_macro,
    clippy::panic_in_result_fn,
    clippy::unwrap_in_result,
    reason = "Test-only output and panic-based assertions are permitted."
)]

use crate::cancel::CancelHandle;
use crate::cancel::CancelToken;

/// Cancellation is sticky and visible to tokens created before and after.
#[tokio::test]
async fn cancel_handle_signals_all_tokens() {
    let handle = CancelHandle::new();
    let before = handle.token();
    assert!(!before.is_cancelled());

    handle.cancel();
    let after = handle.token();

    assert!(before.is_cancelled());
    assert!(after.is_cancelled());
    before.cancelled().await;
    after.cancelled().await;
}

/// A never-token reports uncancelled and loses every race.
#[tokio::test]
async fn never_token_is_never_cancelled() {
    let token = CancelToken::never();
    assert!(!token.is_cancelled());

    let raced = tokio::select! {
        () = token.cancelled() => "cancelled",
        () = tokio::task::yield_now() => "completed",
    };
    assert_eq!(raced, "completed");
}
