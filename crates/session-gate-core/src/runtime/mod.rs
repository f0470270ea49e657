// crates/session-gate-core/src/runtime/mod.rs
// ============================================================================
// Module: Session Gate Runtime
// Description: Pure evaluation logic for credential provisioning.
// Purpose: Keep decision logic synchronous and separate from effectful orchestration.
// Dependencies: crate::core
// ============================================================================

//! ## Overview
//! The runtime holds the credential-provisioning decision engine. It is
//! deliberately pure: given a policy and two booleans it returns a single
//! tagged outcome, and the broker acts on that outcome asynchronously.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod decider;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use decider::DecisionOutcome;
pub use decider::FailReason;
pub use decider::OptionSet;
pub use decider::OptionSetError;
pub use decider::PromptOption;
pub use decider::decide;
