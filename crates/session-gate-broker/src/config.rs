// crates/session-gate-broker/src/config.rs
// ============================================================================
// Module: Broker Configuration
// Description: Deserializable configuration for the session broker.
// Purpose: Carry event sizing, editor availability, and the default policy.
// Dependencies: session-gate-core, serde, toml
// ============================================================================

//! ## Overview
//! [`BrokerConfig`] is the operator-facing configuration surface. It is
//! deserialized from TOML, validated before use, and defaults to a working
//! standalone setup.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use session_gate_core::CredentialGenerationBehavior;
use thiserror::Error;

// ============================================================================
// SECTION: Defaults
// ============================================================================

/// Default capacity of the session event channel.
const DEFAULT_EVENT_CAPACITY: usize = 64;

/// Returns the default event channel capacity.
const fn default_event_capacity() -> usize {
    DEFAULT_EVENT_CAPACITY
}

/// Returns the default settings-editor availability.
const fn default_settings_editor_available() -> bool {
    true
}

// ============================================================================
// SECTION: Configuration Errors
// ============================================================================

/// Broker configuration errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The configuration document failed to parse.
    #[error("config parse failure: {0}")]
    Parse(String),
    /// The event channel capacity must be at least one.
    #[error("event_capacity must be >= 1")]
    InvalidEventCapacity,
}

// ============================================================================
// SECTION: Broker Configuration
// ============================================================================

/// Session broker configuration.
///
/// # Invariants
/// - `event_capacity` is at least one after validation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BrokerConfig {
    /// Capacity of the session event broadcast channel.
    pub event_capacity: usize,
    /// Whether the settings editor may be surfaced to the operator.
    pub settings_editor_available: bool,
    /// Generation policy stamped onto settings minted by the broker.
    pub default_generation_behavior: CredentialGenerationBehavior,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            event_capacity: default_event_capacity(),
            settings_editor_available: default_settings_editor_available(),
            default_generation_behavior: CredentialGenerationBehavior::default(),
        }
    }
}

impl BrokerConfig {
    /// Parses and validates a configuration from a TOML document.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when parsing or validation fails.
    pub fn from_toml_str(document: &str) -> Result<Self, ConfigError> {
        let config: Self =
            toml::from_str(document).map_err(|err| ConfigError::Parse(err.to_string()))?;
        config.validate()?;
        Ok(config)
    }

    /// Validates the configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] when a field is out of range.
    pub const fn validate(&self) -> Result<(), ConfigError> {
        if self.event_capacity == 0 {
            return Err(ConfigError::InvalidEventCapacity);
        }
        Ok(())
    }
}
