// crates/session-gate-core/src/core/credentials.rs
// ============================================================================
// Module: Session Gate Credentials
// Description: Credential fields, generation policy, and connection settings.
// Purpose: Provide the mutable value holder read by the decision engine and broker.
// Dependencies: serde
// ============================================================================

//! ## Overview
//! Connection settings carry the username, password, and domain used to log
//! into a target instance plus the configured credential-generation policy.
//! The password is held behind [`Secret`], which keeps its clear text out of
//! debug output and serde output. Settings are owned by the caller; the
//! broker and decision engine never mutate credential fields directly.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::fmt;

use serde::Deserialize;
use serde::Deserializer;
use serde::Serialize;
use serde::Serializer;

// ============================================================================
// SECTION: Secret
// ============================================================================

/// Credential field with cleared/plaintext semantics.
///
/// # Invariants
/// - The clear text is reachable only through [`Secret::clear_text`].
/// - `Debug` output and serde output never contain the clear text.
#[derive(Clone, Default, PartialEq, Eq)]
pub struct Secret {
    /// Clear-text value, absent when the field is cleared.
    value: Option<String>,
}

impl Secret {
    /// Creates a populated secret from a clear-text value.
    #[must_use]
    pub fn new(value: impl Into<String>) -> Self {
        Self {
            value: Some(value.into()),
        }
    }

    /// Creates a cleared secret.
    #[must_use]
    pub const fn cleared() -> Self {
        Self {
            value: None,
        }
    }

    /// Replaces the clear-text value.
    pub fn set(&mut self, value: impl Into<String>) {
        self.value = Some(value.into());
    }

    /// Clears the value.
    pub fn clear(&mut self) {
        self.value = None;
    }

    /// Returns the clear-text value, if populated.
    #[must_use]
    pub fn clear_text(&self) -> Option<&str> {
        self.value.as_deref()
    }

    /// Returns true when the secret is cleared or empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.value.as_deref().is_none_or(str::is_empty)
    }
}

impl fmt::Debug for Secret {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_empty() {
            f.write_str("Secret(cleared)")
        } else {
            f.write_str("Secret(****)")
        }
    }
}

impl Serialize for Secret {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        // Clear text never leaves the process through serde.
        serializer.serialize_none()
    }
}

impl<'de> Deserialize<'de> for Secret {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let value = Option::<String>::deserialize(deserializer)?;
        Ok(Self {
            value,
        })
    }
}

impl From<&str> for Secret {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

// ============================================================================
// SECTION: Generation Behavior
// ============================================================================

/// Configured stance on auto-generating credentials.
///
/// # Invariants
/// - Variants are stable for serialization and configuration matching.
/// - Read-only at decision time; set by configuration or the operator.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CredentialGenerationBehavior {
    /// Always offer the operator a choice, including generation when permitted.
    #[default]
    Allow,
    /// Use existing credentials when present; otherwise offer generation.
    AllowIfNoCredentialsFound,
    /// Never generate; existing credentials or the settings editor are the
    /// only paths.
    Disallow,
    /// Always generate silently, overwriting existing credentials.
    Force,
}

// ============================================================================
// SECTION: Connection Settings
// ============================================================================

/// Mutable settings for one connection attempt.
///
/// # Invariants
/// - Credential fields are mutated only by the credential generator or by
///   the operator through the settings editor, never by the broker or the
///   decision engine.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionSettings {
    /// Login username, absent when not configured.
    pub username: Option<String>,
    /// Login domain, absent when not configured.
    pub domain: Option<String>,
    /// Login password.
    pub password: Secret,
    /// Credential-generation policy for this target.
    pub generation_behavior: CredentialGenerationBehavior,
}

impl ConnectionSettings {
    /// Creates empty settings with the given generation policy.
    #[must_use]
    pub fn with_behavior(generation_behavior: CredentialGenerationBehavior) -> Self {
        Self {
            generation_behavior,
            ..Self::default()
        }
    }

    /// Returns true when both a username and a password are populated.
    #[must_use]
    pub fn credentials_present(&self) -> bool {
        self.username.as_deref().is_some_and(|name| !name.is_empty()) && !self.password.is_empty()
    }
}

// ============================================================================
// SECTION: Transport Endpoint
// ============================================================================

/// Opaque tunnel endpoint the transport connects through.
///
/// # Invariants
/// - The endpoint is not interpreted by the broker; it is handed to the
///   transport collaborator unchanged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportEndpoint {
    /// Host the transport dials, typically a local tunnel listener.
    pub host: String,
    /// Port the transport dials.
    pub port: u16,
}

impl TransportEndpoint {
    /// Creates a new transport endpoint.
    #[must_use]
    pub fn new(host: impl Into<String>, port: u16) -> Self {
        Self {
            host: host.into(),
            port,
        }
    }
}

impl fmt::Display for TransportEndpoint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}:{}", self.host, self.port)
    }
}
