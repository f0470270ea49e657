// crates/session-gate-broker/src/lib.rs
// ============================================================================
// Module: Session Gate Broker Library
// Description: Session registry, lifecycle, and connect orchestration.
// Purpose: Broker interactive remote-access sessions with credential provisioning.
// Dependencies: session-gate-core, tokio, tracing
// ============================================================================

//! ## Overview
//! The Session Gate broker owns the registry of live sessions keyed by
//! target identity and orchestrates the credential-provisioning decision
//! before establishing a session.
//! Invariants:
//! - At most one live session exists per target identity.
//! - Every failure or cancellation path leaves the registry without an
//!   entry for the attempted target.
//! - For one target, `SessionStarted` always precedes `SessionEnded`, and
//!   closing a session twice emits exactly one `SessionEnded`.

// ============================================================================
// SECTION: Modules
// ============================================================================

pub mod broker;
pub mod cancel;
pub mod config;
pub mod events;
pub mod registry;
pub mod session;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use broker::BrokerBuildError;
pub use broker::ConnectError;
pub use broker::SessionBroker;
pub use broker::SessionBrokerBuilder;
pub use cancel::CancelHandle;
pub use cancel::CancelToken;
pub use config::BrokerConfig;
pub use config::ConfigError;
pub use events::SessionEvent;
pub use session::Session;
pub use session::SessionState;

#[cfg(test)]
mod tests;
