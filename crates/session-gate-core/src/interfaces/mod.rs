// crates/session-gate-core/src/interfaces/mod.rs
// ============================================================================
// Module: Session Gate Interfaces
// Description: Backend-agnostic interfaces for permissions, credentials, and transport.
// Purpose: Define the contract surfaces the broker orchestrates.
// Dependencies: crate::core, async-trait
// ============================================================================

//! ## Overview
//! Interfaces define how Session Gate integrates with the surrounding
//! application without embedding backend-specific details: the capability
//! check for credential generation, the generator itself, the operator
//! prompt surface, the settings editor, and the session transport. All
//! operations are asynchronous with respect to the caller; none of them
//! perform blocking I/O in the core.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::sync::Arc;

use async_trait::async_trait;
use thiserror::Error;

use crate::core::ConnectionSettings;
use crate::core::TargetId;
use crate::core::TransportEndpoint;
use crate::runtime::OptionSet;

// ============================================================================
// SECTION: Credential Permissions
// ============================================================================

/// Permission check errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PermissionError {
    /// The capability query could not be completed.
    #[error("permission check failed: {0}")]
    CheckFailed(String),
}

/// Capability query for credential generation.
#[async_trait]
pub trait CredentialPermissions: Send + Sync {
    /// Returns true when the caller may auto-generate credentials for the
    /// target.
    ///
    /// # Errors
    ///
    /// Returns [`PermissionError`] when the query itself fails; a completed
    /// query with a negative answer returns `Ok(false)`.
    async fn may_generate(&self, target: &TargetId) -> Result<bool, PermissionError>;
}

#[async_trait]
impl<T> CredentialPermissions for Arc<T>
where
    T: CredentialPermissions + ?Sized,
{
    async fn may_generate(&self, target: &TargetId) -> Result<bool, PermissionError> {
        (**self).may_generate(target).await
    }
}

// ============================================================================
// SECTION: Credential Generator
// ============================================================================

/// Credential generation errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum CredentialError {
    /// The caller lost or lacks the permission to generate credentials.
    #[error("not permitted to generate credentials for {0}")]
    NotPermitted(String),
    /// The generation operation failed.
    #[error("credential generation failed: {0}")]
    GenerationFailed(String),
}

/// Generator producing fresh login credentials for a target.
#[async_trait]
pub trait CredentialGenerator: Send + Sync {
    /// Generates a fresh username and password into the settings.
    ///
    /// When `silent` is true the generator must complete or fail without any
    /// operator interaction.
    ///
    /// # Errors
    ///
    /// Returns [`CredentialError`] when generation fails; the settings are
    /// left unchanged in that case.
    async fn generate(
        &self,
        target: &TargetId,
        settings: &mut ConnectionSettings,
        silent: bool,
    ) -> Result<(), CredentialError>;
}

#[async_trait]
impl<T> CredentialGenerator for Arc<T>
where
    T: CredentialGenerator + ?Sized,
{
    async fn generate(
        &self,
        target: &TargetId,
        settings: &mut ConnectionSettings,
        silent: bool,
    ) -> Result<(), CredentialError> {
        (**self).generate(target, settings, silent).await
    }
}

// ============================================================================
// SECTION: Prompt Surface
// ============================================================================

/// Operator response to a credential prompt.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PromptSelection {
    /// The operator chose the option at the given index.
    Chosen(usize),
    /// The operator dismissed the prompt.
    Cancelled,
}

/// Prompt surface errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum PromptError {
    /// The prompt could not be presented.
    #[error("prompt surface failure: {0}")]
    SurfaceFailed(String),
}

/// Surface presenting an option list to the operator.
#[async_trait]
pub trait PromptSurface: Send + Sync {
    /// Presents the options and returns the operator's selection.
    ///
    /// # Errors
    ///
    /// Returns [`PromptError`] when the prompt cannot be shown; operator
    /// dismissal is reported as [`PromptSelection::Cancelled`], not an
    /// error.
    async fn choose(
        &self,
        target: &TargetId,
        options: &OptionSet,
    ) -> Result<PromptSelection, PromptError>;
}

#[async_trait]
impl<T> PromptSurface for Arc<T>
where
    T: PromptSurface + ?Sized,
{
    async fn choose(
        &self,
        target: &TargetId,
        options: &OptionSet,
    ) -> Result<PromptSelection, PromptError> {
        (**self).choose(target, options).await
    }
}

// ============================================================================
// SECTION: Settings Editor
// ============================================================================

/// Settings editor errors.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum SettingsEditorError {
    /// The editor could not be opened.
    #[error("settings editor failure: {0}")]
    OpenFailed(String),
}

/// Editor the operator uses to adjust connection settings manually.
#[async_trait]
pub trait SettingsEditor: Send + Sync {
    /// Opens the editor for the target and returns once the operator is
    /// done.
    ///
    /// # Errors
    ///
    /// Returns [`SettingsEditorError`] when the editor cannot be opened.
    async fn open(&self, target: &TargetId) -> Result<(), SettingsEditorError>;
}

#[async_trait]
impl<T> SettingsEditor for Arc<T>
where
    T: SettingsEditor + ?Sized,
{
    async fn open(&self, target: &TargetId) -> Result<(), SettingsEditorError> {
        (**self).open(target).await
    }
}

// ============================================================================
// SECTION: Session Transport
// ============================================================================

/// Transport errors for session channels.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum TransportError {
    /// The underlying channel could not be established.
    #[error("channel establishment failed: {0}")]
    EstablishFailed(String),
    /// The channel dropped or misbehaved after establishment.
    #[error("channel failure: {0}")]
    ChannelFailed(String),
}

/// Reason an established channel ended.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The channel was closed deliberately by either side.
    Closed,
    /// The channel dropped due to a transport failure.
    Failure(String),
}

/// Live channel to one target instance.
#[async_trait]
pub trait SessionChannel: Send + Sync {
    /// Brings the session's surface to the foreground.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when activation fails.
    async fn activate(&self) -> Result<(), TransportError>;

    /// Gracefully shuts the channel down.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when teardown fails; the channel is
    /// considered ended either way.
    async fn shutdown(&self) -> Result<(), TransportError>;

    /// Resolves when the channel has ended, however that happened.
    ///
    /// May be awaited from a different task than the one that opened the
    /// channel.
    async fn wait_closed(&self) -> DisconnectReason;
}

/// Factory opening session channels through an opaque tunnel endpoint.
#[async_trait]
pub trait SessionTransport: Send + Sync {
    /// Opens a channel to the target through the endpoint.
    ///
    /// # Errors
    ///
    /// Returns [`TransportError`] when the channel cannot be established.
    async fn open(
        &self,
        target: &TargetId,
        endpoint: &TransportEndpoint,
        settings: &ConnectionSettings,
    ) -> Result<Arc<dyn SessionChannel>, TransportError>;
}

#[async_trait]
impl<T> SessionTransport for Arc<T>
where
    T: SessionTransport + ?Sized,
{
    async fn open(
        &self,
        target: &TargetId,
        endpoint: &TransportEndpoint,
        settings: &ConnectionSettings,
    ) -> Result<Arc<dyn SessionChannel>, TransportError> {
        (**self).open(target, endpoint, settings).await
    }
}
