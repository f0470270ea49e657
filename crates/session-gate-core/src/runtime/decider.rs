// crates/session-gate-core/src/runtime/decider.rs
// ============================================================================
// Module: Credential Provisioning Decider
// Description: Pure decision function over policy, credentials, and permission.
// Purpose: Determine whether to generate silently, prompt the operator, or fail.
// Dependencies: crate::core::credentials, serde
// ============================================================================

//! ## Overview
//! [`decide`] maps the configured [`CredentialGenerationBehavior`] together
//! with the current credential and permission state onto exactly one
//! [`DecisionOutcome`]. Rules are evaluated in policy order and the first
//! match wins. The function is synchronous and side-effect free; acting on
//! the outcome (prompting, generating, opening the settings editor) is the
//! broker's job.
//!
//! Invariants:
//! - A prompt outcome always carries a non-empty, duplicate-free option set.
//! - `Force` never offers [`PromptOption::UseExisting`].
//! - `Proceed` and `GenerateSilently` bypass the prompt surface entirely.

// ============================================================================
// SECTION: Imports
// ============================================================================

use serde::Deserialize;
use serde::Serialize;
use thiserror::Error;

use crate::core::credentials::CredentialGenerationBehavior;

// ============================================================================
// SECTION: Prompt Options
// ============================================================================

/// Action offered to the operator in a credential prompt.
///
/// # Invariants
/// - Variants are stable for serialization and label lookup.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptOption {
    /// Connect with the credentials already stored in the settings.
    UseExisting,
    /// Generate a fresh username and password, then connect.
    GenerateNew,
    /// Open the settings editor and abandon this connection attempt.
    OpenSettings,
}

impl PromptOption {
    /// Returns the operator-facing label for this option.
    #[must_use]
    pub const fn label(self) -> &'static str {
        match self {
            Self::UseExisting => "Use existing credentials",
            Self::GenerateNew => "Generate new credentials",
            Self::OpenSettings => "Configure credentials in settings",
        }
    }
}

/// Option set validation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum OptionSetError {
    /// An option set must contain at least one option.
    #[error("option set must not be empty")]
    Empty,
    /// The default index must refer to an option in the set.
    #[error("default index {index} out of range for {len} options")]
    DefaultOutOfRange {
        /// Offending default index.
        index: usize,
        /// Number of options in the set.
        len: usize,
    },
}

/// Ordered, duplicate-free list of prompt options with a default selection.
///
/// # Invariants
/// - Never empty; duplicates are removed preserving first occurrence.
/// - `default_index` always refers to an option in the set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OptionSet {
    /// Options in presentation order.
    options: Vec<PromptOption>,
    /// Index of the pre-selected option.
    default_index: usize,
}

impl OptionSet {
    /// Builds an option set, deduplicating while preserving order.
    ///
    /// # Errors
    ///
    /// Returns [`OptionSetError`] when the deduplicated list is empty or the
    /// default index is out of range.
    pub fn new(options: Vec<PromptOption>, default_index: usize) -> Result<Self, OptionSetError> {
        let mut deduped = Vec::with_capacity(options.len());
        for option in options {
            if !deduped.contains(&option) {
                deduped.push(option);
            }
        }
        if deduped.is_empty() {
            return Err(OptionSetError::Empty);
        }
        if default_index >= deduped.len() {
            return Err(OptionSetError::DefaultOutOfRange {
                index: default_index,
                len: deduped.len(),
            });
        }
        Ok(Self {
            options: deduped,
            default_index,
        })
    }

    /// Builds an option set whose invariants are guaranteed by the caller.
    ///
    /// Used by [`decide`], which only assembles distinct options and a zero
    /// default over a non-empty list.
    fn from_parts(options: Vec<PromptOption>, default_index: usize) -> Self {
        Self {
            options,
            default_index,
        }
    }

    /// Returns the options in presentation order.
    #[must_use]
    pub fn options(&self) -> &[PromptOption] {
        &self.options
    }

    /// Returns the operator-facing labels in presentation order.
    #[must_use]
    pub fn labels(&self) -> Vec<&'static str> {
        self.options.iter().map(|option| option.label()).collect()
    }

    /// Returns the index of the pre-selected option.
    #[must_use]
    pub const fn default_index(&self) -> usize {
        self.default_index
    }

    /// Returns the number of options.
    #[must_use]
    pub fn len(&self) -> usize {
        self.options.len()
    }

    /// Returns false; option sets are never empty by construction.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.options.is_empty()
    }

    /// Returns the option at the given index, if any.
    #[must_use]
    pub fn get(&self, index: usize) -> Option<PromptOption> {
        self.options.get(index).copied()
    }
}

// ============================================================================
// SECTION: Decision Outcome
// ============================================================================

/// Reason a decision resolved to failure.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailReason {
    /// The operator must edit the connection settings; the broker surfaces
    /// the settings editor and treats the attempt as cancelled.
    SettingsRequired,
    /// No generation path and no settings editor are available; the attempt
    /// is abandoned without showing anything.
    GenerationUnavailable,
}

/// Outcome of evaluating the credential-provisioning policy.
///
/// # Invariants
/// - Variants are stable for serialization and contract matching.
/// - Exactly one variant is produced for every input combination.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DecisionOutcome {
    /// Connect with the credentials as stored; no prompt, no generation.
    Proceed,
    /// Generate fresh credentials without operator interaction, then connect.
    GenerateSilently,
    /// Present the options to the operator and act on the selection.
    Prompt {
        /// Options to present, with the pre-selected default.
        options: OptionSet,
    },
    /// Abandon the attempt.
    Fail {
        /// Failure reason directing the broker's next action.
        reason: FailReason,
    },
}

// ============================================================================
// SECTION: Decision Function
// ============================================================================

/// Decides how credentials are provisioned for a connection attempt.
///
/// Rules are evaluated in policy order; the first matching rule wins:
///
/// 1. `Allow` prompts with `UseExisting` (when credentials are present),
///    `GenerateNew` (when permitted), and `OpenSettings` (when the editor
///    is available). With neither existing credentials nor permission the
///    outcome degrades to failure.
/// 2. `AllowIfNoCredentialsFound` proceeds when credentials exist;
///    otherwise prompts with `GenerateNew` pre-selected when permitted, and
///    fails toward the settings editor when not.
/// 3. `Disallow` proceeds when credentials exist and fails otherwise.
/// 4. `Force` generates silently when permitted (overwriting existing
///    credentials) and fails otherwise.
///
/// `settings_editor_available` controls whether `OpenSettings` may be
/// offered and whether failures carry [`FailReason::SettingsRequired`].
#[must_use]
pub fn decide(
    behavior: CredentialGenerationBehavior,
    credentials_present: bool,
    permission_granted: bool,
    settings_editor_available: bool,
) -> DecisionOutcome {
    match behavior {
        CredentialGenerationBehavior::Allow => {
            let mut options = Vec::with_capacity(3);
            if credentials_present {
                options.push(PromptOption::UseExisting);
            }
            if permission_granted {
                options.push(PromptOption::GenerateNew);
            }
            if options.is_empty() {
                // Nothing actionable to offer; an empty prompt is never shown.
                return fail(settings_editor_available);
            }
            if settings_editor_available {
                options.push(PromptOption::OpenSettings);
            }
            DecisionOutcome::Prompt {
                options: OptionSet::from_parts(options, 0),
            }
        }
        CredentialGenerationBehavior::AllowIfNoCredentialsFound => {
            if credentials_present {
                return DecisionOutcome::Proceed;
            }
            if !permission_granted {
                return fail(settings_editor_available);
            }
            let mut options = vec![PromptOption::GenerateNew];
            if settings_editor_available {
                options.push(PromptOption::OpenSettings);
            }
            DecisionOutcome::Prompt {
                options: OptionSet::from_parts(options, 0),
            }
        }
        CredentialGenerationBehavior::Disallow => {
            if credentials_present {
                DecisionOutcome::Proceed
            } else {
                fail(settings_editor_available)
            }
        }
        CredentialGenerationBehavior::Force => {
            if permission_granted {
                DecisionOutcome::GenerateSilently
            } else {
                fail(settings_editor_available)
            }
        }
    }
}

/// Builds the failure outcome for the given editor availability.
const fn fail(settings_editor_available: bool) -> DecisionOutcome {
    let reason = if settings_editor_available {
        FailReason::SettingsRequired
    } else {
        FailReason::GenerationUnavailable
    };
    DecisionOutcome::Fail {
        reason,
    }
}
