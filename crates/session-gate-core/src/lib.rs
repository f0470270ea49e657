// crates/session-gate-core/src/lib.rs
// ============================================================================
// Module: Session Gate Core Library
// Description: Public API surface for the Session Gate core.
// Purpose: Expose target identity, credential, and decision types plus interfaces.
// Dependencies: crate::{core, interfaces, runtime}
// ============================================================================

//! ## Overview
//! Session Gate core provides the data model and pure decision logic for
//! brokering interactive remote-access sessions to cloud instances. The
//! credential-provisioning decision is a synchronous function over policy
//! and caller state; all effectful work (permission checks, credential
//! generation, prompting, transport) happens behind the interfaces defined
//! here and is orchestrated by the broker crate.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod core;
pub mod interfaces;
pub mod runtime;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use core::*;

pub use interfaces::CredentialError;
pub use interfaces::CredentialGenerator;
pub use interfaces::CredentialPermissions;
pub use interfaces::DisconnectReason;
pub use interfaces::PermissionError;
pub use interfaces::PromptError;
pub use interfaces::PromptSelection;
pub use interfaces::PromptSurface;
pub use interfaces::SessionChannel;
pub use interfaces::SessionTransport;
pub use interfaces::SettingsEditor;
pub use interfaces::SettingsEditorError;
pub use interfaces::TransportError;
pub use runtime::DecisionOutcome;
pub use runtime::FailReason;
pub use runtime::OptionSet;
pub use runtime::OptionSetError;
pub use runtime::PromptOption;
pub use runtime::decide;
