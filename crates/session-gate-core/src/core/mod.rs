// crates/session-gate-core/src/core/mod.rs
// ============================================================================
// Module: Session Gate Core Types
// Description: Canonical target identity and connection setting structures.
// Purpose: Provide stable, serializable types shared by the decision engine and broker.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Core types define target identities, credential fields, and connection
//! settings. These types are the canonical source of truth for any derived
//! surfaces; the broker and decision engine read them and only the
//! credential generator or the operator's settings editor mutate them.

// ============================================================================
// SECTION: Submodules
// ============================================================================

pub mod credentials;
pub mod identifiers;

// ============================================================================
// SECTION: Re-Exports
// ============================================================================

pub use credentials::ConnectionSettings;
pub use credentials::CredentialGenerationBehavior;
pub use credentials::Secret;
pub use credentials::TransportEndpoint;
pub use identifiers::InstanceName;
pub use identifiers::ProjectId;
pub use identifiers::TargetId;
pub use identifiers::ZoneId;
