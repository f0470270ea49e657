// crates/session-gate-broker/src/broker.rs
// ============================================================================
// Module: Session Broker
// Description: Connect orchestration over the decision engine and collaborators.
// Purpose: Resolve credentials, open sessions, and enforce one session per target.
// Dependencies: session-gate-core, crate::{cancel, config, registry, session}, tokio, tracing
// ============================================================================

//! ## Overview
//! [`SessionBroker`] runs the connect pipeline: reserve the registry slot,
//! evaluate the credential-provisioning decision, act on it (silent
//! generation, operator prompt, or settings editor), open the transport
//! channel, and register the session.
//! Invariants:
//! - Two concurrent connects for one target never both succeed.
//! - Cancellation or failure at any step releases the reservation.
//! - A `SettingsRequired` decision surfaces the settings editor exactly
//!   once and resolves to [`ConnectError::Cancelled`], never a hard error.

// ============================================================================
// SECTION: Imports
// ============================================================================

use std::future::Future;
use std::sync::Arc;

use session_gate_core::ConnectionSettings;
use session_gate_core::CredentialError;
use session_gate_core::CredentialGenerator;
use session_gate_core::CredentialPermissions;
use session_gate_core::DecisionOutcome;
use session_gate_core::FailReason;
use session_gate_core::OptionSet;
use session_gate_core::PermissionError;
use session_gate_core::PromptError;
use session_gate_core::PromptOption;
use session_gate_core::PromptSelection;
use session_gate_core::PromptSurface;
use session_gate_core::SessionTransport;
use session_gate_core::SettingsEditor;
use session_gate_core::SettingsEditorError;
use session_gate_core::TargetId;
use session_gate_core::TransportEndpoint;
use session_gate_core::TransportError;
use session_gate_core::decide;
use thiserror::Error;
use tokio::sync::broadcast;

use crate::cancel::CancelToken;
use crate::config::BrokerConfig;
use crate::events::SessionEvent;
use crate::events::SessionEvents;
use crate::registry::RegistryShared;
use crate::session::Session;

// ============================================================================
// SECTION: Broker Errors
// ============================================================================

/// Errors returned by the broker builder.
///
/// # Invariants
/// - Variants are stable for programmatic handling.
#[derive(Debug, Error)]
pub enum BrokerBuildError {
    /// No permission checker was configured.
    #[error("broker permission checker is not configured")]
    MissingPermissions,
    /// No credential generator was configured.
    #[error("broker credential generator is not configured")]
    MissingGenerator,
    /// No prompt surface was configured.
    #[error("broker prompt surface is not configured")]
    MissingPrompt,
    /// No settings editor was configured.
    #[error("broker settings editor is not configured")]
    MissingSettingsEditor,
    /// No session transport was configured.
    #[error("broker session transport is not configured")]
    MissingTransport,
    /// The broker configuration failed validation.
    #[error("broker config invalid: {0}")]
    Config(#[from] crate::config::ConfigError),
}

/// Errors returned by [`SessionBroker::connect`].
///
/// # Invariants
/// - Variants are stable for programmatic handling.
/// - `Cancelled` covers operator dismissal, the settings-editor path, and
///   caller-signalled cancellation; it is expected and not logged as an
///   error.
#[derive(Debug, Error)]
pub enum ConnectError {
    /// A session for the target is already registered.
    #[error("a session for {0} is already connected")]
    AlreadyConnected(TargetId),
    /// The connection attempt was cancelled.
    #[error("connection attempt cancelled")]
    Cancelled,
    /// The permission check could not be completed.
    #[error("permission check failed: {0}")]
    Permission(#[from] PermissionError),
    /// Credential generation failed.
    #[error("credential generation failed: {0}")]
    CredentialGeneration(#[from] CredentialError),
    /// The prompt surface failed.
    #[error("credential prompt failed: {0}")]
    Prompt(#[from] PromptError),
    /// The settings editor failed.
    #[error("settings editor failed: {0}")]
    SettingsEditor(#[from] SettingsEditorError),
    /// The underlying channel could not be established.
    #[error("transport failure: {0}")]
    Transport(#[from] TransportError),
}

// ============================================================================
// SECTION: Broker Builder
// ============================================================================

/// Builder for a session broker.
///
/// # Invariants
/// - `build` succeeds only when every collaborator is configured.
#[derive(Default)]
pub struct SessionBrokerBuilder {
    /// Capability check for credential generation.
    permissions: Option<Arc<dyn CredentialPermissions>>,
    /// Credential generator.
    generator: Option<Arc<dyn CredentialGenerator>>,
    /// Operator prompt surface.
    prompt: Option<Arc<dyn PromptSurface>>,
    /// Settings editor surface.
    settings_editor: Option<Arc<dyn SettingsEditor>>,
    /// Session transport factory.
    transport: Option<Arc<dyn SessionTransport>>,
    /// Broker configuration.
    config: BrokerConfig,
}

impl SessionBrokerBuilder {
    /// Registers the permission checker.
    #[must_use]
    pub fn permissions(mut self, permissions: impl CredentialPermissions + 'static) -> Self {
        self.permissions = Some(Arc::new(permissions));
        self
    }

    /// Registers the credential generator.
    #[must_use]
    pub fn generator(mut self, generator: impl CredentialGenerator + 'static) -> Self {
        self.generator = Some(Arc::new(generator));
        self
    }

    /// Registers the prompt surface.
    #[must_use]
    pub fn prompt(mut self, prompt: impl PromptSurface + 'static) -> Self {
        self.prompt = Some(Arc::new(prompt));
        self
    }

    /// Registers the settings editor.
    #[must_use]
    pub fn settings_editor(mut self, settings_editor: impl SettingsEditor + 'static) -> Self {
        self.settings_editor = Some(Arc::new(settings_editor));
        self
    }

    /// Registers the session transport.
    #[must_use]
    pub fn transport(mut self, transport: impl SessionTransport + 'static) -> Self {
        self.transport = Some(Arc::new(transport));
        self
    }

    /// Applies a broker configuration.
    #[must_use]
    pub fn config(mut self, config: BrokerConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the session broker.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerBuildError`] when a collaborator is missing or the
    /// configuration is invalid.
    pub fn build(self) -> Result<SessionBroker, BrokerBuildError> {
        self.config.validate()?;
        Ok(SessionBroker {
            registry: Arc::new(RegistryShared::new(SessionEvents::new(self.config.event_capacity))),
            permissions: self.permissions.ok_or(BrokerBuildError::MissingPermissions)?,
            generator: self.generator.ok_or(BrokerBuildError::MissingGenerator)?,
            prompt: self.prompt.ok_or(BrokerBuildError::MissingPrompt)?,
            settings_editor: self.settings_editor.ok_or(BrokerBuildError::MissingSettingsEditor)?,
            transport: self.transport.ok_or(BrokerBuildError::MissingTransport)?,
            config: self.config,
        })
    }
}

// ============================================================================
// SECTION: Session Broker
// ============================================================================

/// Broker owning the session registry and the connect pipeline.
///
/// # Invariants
/// - At most one live session exists per target identity.
/// - Credential fields are mutated only through the credential generator.
pub struct SessionBroker {
    /// Shared registry of live sessions.
    registry: Arc<RegistryShared>,
    /// Capability check for credential generation.
    permissions: Arc<dyn CredentialPermissions>,
    /// Credential generator.
    generator: Arc<dyn CredentialGenerator>,
    /// Operator prompt surface.
    prompt: Arc<dyn PromptSurface>,
    /// Settings editor surface.
    settings_editor: Arc<dyn SettingsEditor>,
    /// Session transport factory.
    transport: Arc<dyn SessionTransport>,
    /// Broker configuration.
    config: BrokerConfig,
}

impl SessionBroker {
    /// Returns a builder for the session broker.
    #[must_use]
    pub fn builder() -> SessionBrokerBuilder {
        SessionBrokerBuilder::default()
    }

    /// Returns the broker configuration.
    #[must_use]
    pub const fn config(&self) -> &BrokerConfig {
        &self.config
    }

    /// Returns fresh connection settings carrying the configured default
    /// generation policy.
    #[must_use]
    pub fn default_settings(&self) -> ConnectionSettings {
        ConnectionSettings::with_behavior(self.config.default_generation_behavior)
    }

    /// Subscribes to session lifecycle events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<SessionEvent> {
        self.registry.subscribe()
    }

    /// Connects to a target, resolving credentials per the configured
    /// policy.
    ///
    /// The settings are mutated only as a side effect of credential
    /// generation. Cancellation aborts the in-flight step and leaves the
    /// target unregistered.
    ///
    /// # Errors
    ///
    /// Returns [`ConnectError::AlreadyConnected`] when a session or an
    /// in-flight connect exists for the target,
    /// [`ConnectError::Cancelled`] when the operator declined, chose to
    /// edit settings, or the caller cancelled, and the underlying
    /// collaborator error otherwise.
    pub async fn connect(
        &self,
        target: &TargetId,
        endpoint: &TransportEndpoint,
        settings: &mut ConnectionSettings,
        cancel: &CancelToken,
    ) -> Result<Arc<Session>, ConnectError> {
        let Some(reservation) = RegistryShared::begin_connect(&self.registry, target) else {
            return Err(ConnectError::AlreadyConnected(target.clone()));
        };

        self.resolve_credentials(target, settings, cancel).await?;

        let channel =
            run_cancellable(cancel, self.transport.open(target, endpoint, settings)).await??;
        let session = Arc::new(Session::new(
            target.clone(),
            Arc::clone(&channel),
            Arc::downgrade(&self.registry),
        ));
        reservation.complete(Arc::clone(&session));

        let watcher_session = Arc::clone(&session);
        tokio::spawn(async move {
            let reason = watcher_session.channel().wait_closed().await;
            watcher_session.handle_disconnect(&reason);
        });

        Ok(session)
    }

    /// Returns true when a registered, non-closed session exists for the
    /// target.
    #[must_use]
    pub fn is_connected(&self, target: &TargetId) -> bool {
        self.registry.is_connected(target)
    }

    /// Brings an existing session to the foreground.
    ///
    /// Returns false without side effects when no session exists for the
    /// target.
    pub async fn try_activate(&self, target: &TargetId) -> bool {
        let Some(session) = self.registry.find(target) else {
            return false;
        };
        if let Err(error) = session.activate().await {
            tracing::warn!(target = %target, error = %error, "session activation failed");
        }
        true
    }

    /// Returns the most recently activated session, if any.
    #[must_use]
    pub fn active_session(&self) -> Option<Arc<Session>> {
        self.registry.active_session()
    }

    /// Runs the decision engine and acts on its outcome.
    async fn resolve_credentials(
        &self,
        target: &TargetId,
        settings: &mut ConnectionSettings,
        cancel: &CancelToken,
    ) -> Result<(), ConnectError> {
        let permission_granted =
            run_cancellable(cancel, self.permissions.may_generate(target)).await??;
        let outcome = decide(
            settings.generation_behavior,
            settings.credentials_present(),
            permission_granted,
            self.config.settings_editor_available,
        );
        tracing::debug!(
            target = %target,
            behavior = ?settings.generation_behavior,
            outcome = outcome_label(&outcome),
            "credential decision"
        );
        match outcome {
            DecisionOutcome::Proceed => Ok(()),
            DecisionOutcome::GenerateSilently => {
                run_cancellable(cancel, self.generator.generate(target, settings, true))
                    .await??;
                Ok(())
            }
            DecisionOutcome::Prompt {
                options,
            } => self.run_prompt(target, settings, &options, cancel).await,
            DecisionOutcome::Fail {
                reason: FailReason::SettingsRequired,
            } => {
                run_cancellable(cancel, self.settings_editor.open(target)).await??;
                Err(ConnectError::Cancelled)
            }
            DecisionOutcome::Fail {
                reason: FailReason::GenerationUnavailable,
            } => Err(ConnectError::Cancelled),
        }
    }

    /// Prompts the operator and acts on the chosen option.
    async fn run_prompt(
        &self,
        target: &TargetId,
        settings: &mut ConnectionSettings,
        options: &OptionSet,
        cancel: &CancelToken,
    ) -> Result<(), ConnectError> {
        let selection = run_cancellable(cancel, self.prompt.choose(target, options)).await??;
        let index = match selection {
            PromptSelection::Cancelled => return Err(ConnectError::Cancelled),
            PromptSelection::Chosen(index) => index,
        };
        match options.get(index) {
            // An out-of-range selection is treated as a dismissal.
            None => Err(ConnectError::Cancelled),
            Some(PromptOption::UseExisting) => Ok(()),
            Some(PromptOption::GenerateNew) => {
                run_cancellable(cancel, self.generator.generate(target, settings, false))
                    .await??;
                Ok(())
            }
            Some(PromptOption::OpenSettings) => {
                run_cancellable(cancel, self.settings_editor.open(target)).await??;
                Err(ConnectError::Cancelled)
            }
        }
    }
}

// ============================================================================
// SECTION: Helpers
// ============================================================================

/// Races a collaborator call against the caller's cancellation signal.
async fn run_cancellable<T>(
    cancel: &CancelToken,
    operation: impl Future<Output = T>,
) -> Result<T, ConnectError> {
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(ConnectError::Cancelled),
        value = operation => Ok(value),
    }
}

/// Returns a stable label for a decision outcome, for logging.
const fn outcome_label(outcome: &DecisionOutcome) -> &'static str {
    match outcome {
        DecisionOutcome::Proceed => "proceed",
        DecisionOutcome::GenerateSilently => "generate_silently",
        DecisionOutcome::Prompt {
            ..
        } => "prompt",
        DecisionOutcome::Fail {
            ..
        } => "fail",
    }
}
