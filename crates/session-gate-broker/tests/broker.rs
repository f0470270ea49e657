// crates/session-gate-broker/tests/broker.rs
// ============================================================================
// Module: Session Broker Tests
// Description: Connect pipeline and registry tests with stub collaborators.
// Purpose: Validate decision handling, single-session enforcement, and events.
// Dependencies: session-gate-broker, session-gate-core, async-trait, tokio
// ============================================================================

//! ## Overview
//! Exercises [`session_gate_broker::SessionBroker`] end to end: credential
//! resolution for every policy, registry invariants under concurrent and
//! cancelled connects, idempotent close, and lifecycle event ordering.

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

use std::future::pending;
use std::sync::Arc;
use std::sync::Mutex;
use std::sync::atomic::AtomicUsize;
use std::sync::atomic::Ordering;
use std::time::Duration;

use async_trait::async_trait;
use session_gate_broker::BrokerConfig;
use session_gate_broker::CancelHandle;
use session_gate_broker::CancelToken;
use session_gate_broker::ConnectError;
use session_gate_broker::SessionBroker;
use session_gate_broker::SessionEvent;
use session_gate_broker::SessionState;
use session_gate_core::ConnectionSettings;
use session_gate_core::CredentialError;
use session_gate_core::CredentialGenerationBehavior;
use session_gate_core::CredentialGenerator;
use session_gate_core::CredentialPermissions;
use session_gate_core::DisconnectReason;
use session_gate_core::OptionSet;
use session_gate_core::PermissionError;
use session_gate_core::PromptError;
use session_gate_core::PromptSelection;
use session_gate_core::PromptSurface;
use session_gate_core::Secret;
use session_gate_core::SessionChannel;
use session_gate_core::SessionTransport;
use session_gate_core::SettingsEditor;
use session_gate_core::SettingsEditorError;
use session_gate_core::TargetId;
use session_gate_core::TransportEndpoint;
use session_gate_core::TransportError;
use tokio::sync::watch;
use tokio::time::timeout;

// ============================================================================
// SECTION: Stub Collaborators
// ============================================================================

/// Permission checker answering a fixed verdict.
struct StubPermissions {
    granted: bool,
}

#[async_trait]
impl CredentialPermissions for StubPermissions {
    async fn may_generate(&self, _target: &TargetId) -> Result<bool, PermissionError> {
        Ok(self.granted)
    }
}

/// Generator writing fixed credentials and recording its silent flags.
#[derive(Default)]
struct RecordingGenerator {
    silent_flags: Mutex<Vec<bool>>,
}

#[async_trait]
impl CredentialGenerator for RecordingGenerator {
    async fn generate(
        &self,
        _target: &TargetId,
        settings: &mut ConnectionSettings,
        silent: bool,
    ) -> Result<(), CredentialError> {
        self.silent_flags.lock().unwrap().push(silent);
        settings.username = Some("bob".to_string());
        settings.password = Secret::new("secret");
        Ok(())
    }
}

/// Generator that never completes, for cancellation tests.
struct StalledGenerator;

#[async_trait]
impl CredentialGenerator for StalledGenerator {
    async fn generate(
        &self,
        _target: &TargetId,
        _settings: &mut ConnectionSettings,
        _silent: bool,
    ) -> Result<(), CredentialError> {
        pending::<()>().await;
        Ok(())
    }
}

/// Prompt surface returning a scripted selection and recording labels.
struct ScriptedPrompt {
    selection: PromptSelection,
    shown: Mutex<Vec<Vec<&'static str>>>,
}

impl ScriptedPrompt {
    fn new(selection: PromptSelection) -> Self {
        Self {
            selection,
            shown: Mutex::new(Vec::new()),
        }
    }
}

#[async_trait]
impl PromptSurface for ScriptedPrompt {
    async fn choose(
        &self,
        _target: &TargetId,
        options: &OptionSet,
    ) -> Result<PromptSelection, PromptError> {
        self.shown.lock().unwrap().push(options.labels());
        Ok(self.selection)
    }
}

/// Settings editor counting how often it was opened.
#[derive(Default)]
struct CountingEditor {
    opens: AtomicUsize,
}

#[async_trait]
impl SettingsEditor for CountingEditor {
    async fn open(&self, _target: &TargetId) -> Result<(), SettingsEditorError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}

/// Stub channel whose end can be triggered from a test.
struct StubChannel {
    closed: watch::Sender<bool>,
    reason: Mutex<DisconnectReason>,
    activations: AtomicUsize,
}

impl StubChannel {
    fn new() -> Self {
        let (closed, _receiver) = watch::channel(false);
        Self {
            closed,
            reason: Mutex::new(DisconnectReason::Closed),
            activations: AtomicUsize::new(0),
        }
    }

    /// Simulates the transport tearing the channel down.
    fn trigger_disconnect(&self, reason: DisconnectReason) {
        *self.reason.lock().unwrap() = reason;
        self.closed.send_replace(true);
    }
}

#[async_trait]
impl SessionChannel for StubChannel {
    async fn activate(&self) -> Result<(), TransportError> {
        self.activations.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    async fn shutdown(&self) -> Result<(), TransportError> {
        self.closed.send_replace(true);
        Ok(())
    }

    async fn wait_closed(&self) -> DisconnectReason {
        let mut receiver = self.closed.subscribe();
        loop {
            if *receiver.borrow_and_update() {
                return self.reason.lock().unwrap().clone();
            }
            if receiver.changed().await.is_err() {
                return DisconnectReason::Closed;
            }
        }
    }
}

/// Transport handing out stub channels.
#[derive(Default)]
struct StubTransport {
    channels: Mutex<Vec<Arc<StubChannel>>>,
}

impl StubTransport {
    fn last_channel(&self) -> Arc<StubChannel> {
        Arc::clone(self.channels.lock().unwrap().last().expect("channel opened"))
    }
}

#[async_trait]
impl SessionTransport for StubTransport {
    async fn open(
        &self,
        _target: &TargetId,
        _endpoint: &TransportEndpoint,
        _settings: &ConnectionSettings,
    ) -> Result<Arc<dyn SessionChannel>, TransportError> {
        let channel = Arc::new(StubChannel::new());
        self.channels.lock().unwrap().push(Arc::clone(&channel));
        Ok(channel)
    }
}

// ============================================================================
// SECTION: Helper Functions
// ============================================================================

fn sample_target() -> TargetId {
    TargetId::new("project-1", "zone-1", "instance-1")
}

fn sample_endpoint() -> TransportEndpoint {
    TransportEndpoint::new("localhost", 13_389)
}

fn settings_with(
    behavior: CredentialGenerationBehavior,
    credentials: Option<(&str, &str)>,
) -> ConnectionSettings {
    let mut settings = ConnectionSettings::with_behavior(behavior);
    if let Some((username, password)) = credentials {
        settings.username = Some(username.to_string());
        settings.password = Secret::new(password);
    }
    settings
}

/// Broker wired with the given stubs and defaults for the rest.
struct Harness {
    broker: Arc<SessionBroker>,
    generator: Arc<RecordingGenerator>,
    prompt: Arc<ScriptedPrompt>,
    editor: Arc<CountingEditor>,
    transport: Arc<StubTransport>,
}

fn harness(granted: bool, selection: PromptSelection) -> Harness {
    let generator = Arc::new(RecordingGenerator::default());
    let prompt = Arc::new(ScriptedPrompt::new(selection));
    let editor = Arc::new(CountingEditor::default());
    let transport = Arc::new(StubTransport::default());
    let broker = SessionBroker::builder()
        .permissions(StubPermissions {
            granted,
        })
        .generator(Arc::clone(&generator))
        .prompt(Arc::clone(&prompt))
        .settings_editor(Arc::clone(&editor))
        .transport(Arc::clone(&transport))
        .build()
        .expect("broker builds");
    Harness {
        broker: Arc::new(broker),
        generator,
        prompt,
        editor,
        transport,
    }
}

/// Waits until the broker no longer reports the target connected.
async fn wait_disconnected(broker: &SessionBroker, target: &TargetId) {
    timeout(Duration::from_secs(1), async {
        while broker.is_connected(target) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .expect("session deregisters");
}

// ============================================================================
// SECTION: Credential Resolution Scenarios
// ============================================================================

/// Allow + credentials + permission: three options, use-existing keeps the
/// settings untouched and a session is registered.
#[tokio::test]
async fn use_existing_keeps_settings_and_registers_session() {
    let harness = harness(true, PromptSelection::Chosen(0));
    let target = sample_target();
    let mut settings =
        settings_with(CredentialGenerationBehavior::Allow, Some(("alice", "alicespassword")));

    let session = harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("connect succeeds");

    assert_eq!(settings.username.as_deref(), Some("alice"));
    assert_eq!(settings.password.clear_text(), Some("alicespassword"));
    assert!(harness.generator.silent_flags.lock().unwrap().is_empty());

    let shown = harness.prompt.shown.lock().unwrap();
    assert_eq!(shown.len(), 1);
    assert_eq!(shown[0].len(), 3);
    drop(shown);

    assert!(harness.broker.is_connected(&target));
    assert_eq!(session.state(), SessionState::Active);
}

/// Choosing generation invokes the generator interactively and mutates the
/// settings.
#[tokio::test]
async fn generate_choice_invokes_generator_interactively() {
    let harness = harness(true, PromptSelection::Chosen(1));
    let target = sample_target();
    let mut settings =
        settings_with(CredentialGenerationBehavior::Allow, Some(("alice", "alicespassword")));

    harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("connect succeeds");

    assert_eq!(settings.username.as_deref(), Some("bob"));
    assert_eq!(settings.password.clear_text(), Some("secret"));
    assert_eq!(*harness.generator.silent_flags.lock().unwrap(), vec![false]);
}

/// AllowIfNoCredentialsFound with stored credentials skips the prompt.
#[tokio::test]
async fn stored_credentials_skip_the_prompt() {
    let harness = harness(true, PromptSelection::Chosen(0));
    let target = sample_target();
    let mut settings = settings_with(
        CredentialGenerationBehavior::AllowIfNoCredentialsFound,
        Some(("alice", "alicespassword")),
    );

    harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("connect succeeds");

    assert!(harness.prompt.shown.lock().unwrap().is_empty());
    assert!(harness.generator.silent_flags.lock().unwrap().is_empty());
    assert_eq!(settings.username.as_deref(), Some("alice"));
}

/// AllowIfNoCredentialsFound without permission opens the editor once and
/// cancels the attempt.
#[tokio::test]
async fn missing_permission_opens_editor_once_and_cancels() {
    let harness = harness(false, PromptSelection::Chosen(0));
    let target = sample_target();
    let mut settings =
        settings_with(CredentialGenerationBehavior::AllowIfNoCredentialsFound, None);

    let result = harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await;

    assert!(matches!(result, Err(ConnectError::Cancelled)));
    assert_eq!(harness.editor.opens.load(Ordering::SeqCst), 1);
    assert!(!harness.broker.is_connected(&target));
    assert!(harness.prompt.shown.lock().unwrap().is_empty());
}

/// Force with permission generates silently and overwrites stored
/// credentials without any prompt.
#[tokio::test]
async fn force_overwrites_credentials_silently() {
    let harness = harness(true, PromptSelection::Chosen(0));
    let target = sample_target();
    let mut settings =
        settings_with(CredentialGenerationBehavior::Force, Some(("alice", "alicespassword")));

    harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("connect succeeds");

    assert!(harness.prompt.shown.lock().unwrap().is_empty());
    assert_eq!(*harness.generator.silent_flags.lock().unwrap(), vec![true]);
    assert_eq!(settings.username.as_deref(), Some("bob"));
    assert_eq!(settings.password.clear_text(), Some("secret"));
    assert!(harness.broker.is_connected(&target));
}

/// Force without permission resolves through the settings editor.
#[tokio::test]
async fn force_without_permission_opens_editor_and_cancels() {
    let harness = harness(false, PromptSelection::Chosen(0));
    let target = sample_target();
    let mut settings = settings_with(CredentialGenerationBehavior::Force, None);

    let result = harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await;

    assert!(matches!(result, Err(ConnectError::Cancelled)));
    assert_eq!(harness.editor.opens.load(Ordering::SeqCst), 1);
    assert!(!harness.broker.is_connected(&target));
}

/// Settings minted by the broker carry the configured default policy and
/// drive the decision like caller-supplied settings.
#[tokio::test]
async fn default_settings_carry_configured_policy() {
    let generator = Arc::new(RecordingGenerator::default());
    let broker = SessionBroker::builder()
        .permissions(StubPermissions {
            granted: true,
        })
        .generator(Arc::clone(&generator))
        .prompt(ScriptedPrompt::new(PromptSelection::Cancelled))
        .settings_editor(CountingEditor::default())
        .transport(StubTransport::default())
        .config(BrokerConfig {
            default_generation_behavior: CredentialGenerationBehavior::Force,
            ..BrokerConfig::default()
        })
        .build()
        .expect("broker builds");
    let target = sample_target();

    let mut settings = broker.default_settings();
    assert_eq!(settings.generation_behavior, CredentialGenerationBehavior::Force);

    broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("connect succeeds");
    assert_eq!(*generator.silent_flags.lock().unwrap(), vec![true]);
    assert!(broker.is_connected(&target));
}

/// Dismissing the prompt cancels the attempt without registration.
#[tokio::test]
async fn prompt_dismissal_cancels_the_attempt() {
    let harness = harness(true, PromptSelection::Cancelled);
    let target = sample_target();
    let mut settings = settings_with(CredentialGenerationBehavior::Allow, None);

    let result = harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await;

    assert!(matches!(result, Err(ConnectError::Cancelled)));
    assert!(!harness.broker.is_connected(&target));
    assert!(harness.generator.silent_flags.lock().unwrap().is_empty());
}

/// Choosing the settings option opens the editor and cancels.
#[tokio::test]
async fn settings_choice_opens_editor_and_cancels() {
    // Allow without stored credentials: [GenerateNew, OpenSettings].
    let harness = harness(true, PromptSelection::Chosen(1));
    let target = sample_target();
    let mut settings = settings_with(CredentialGenerationBehavior::Allow, None);

    let result = harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await;

    assert!(matches!(result, Err(ConnectError::Cancelled)));
    assert_eq!(harness.editor.opens.load(Ordering::SeqCst), 1);
    assert!(!harness.broker.is_connected(&target));
}

// ============================================================================
// SECTION: Registry Invariants
// ============================================================================

/// A second connect for a connected target fails with AlreadyConnected.
#[tokio::test]
async fn second_connect_observes_already_connected() {
    let harness = harness(true, PromptSelection::Chosen(0));
    let target = sample_target();
    let mut settings =
        settings_with(CredentialGenerationBehavior::Disallow, Some(("alice", "alicespassword")));

    harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("first connect succeeds");

    let result = harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await;
    assert!(matches!(result, Err(ConnectError::AlreadyConnected(_))));
}

/// Two simultaneous connects for one target resolve to exactly one session.
#[tokio::test]
async fn concurrent_connects_register_exactly_one_session() {
    let harness = harness(true, PromptSelection::Chosen(0));
    let target = sample_target();
    let endpoint = sample_endpoint();
    let mut first_settings =
        settings_with(CredentialGenerationBehavior::Disallow, Some(("alice", "alicespassword")));
    let mut second_settings =
        settings_with(CredentialGenerationBehavior::Disallow, Some(("alice", "alicespassword")));
    let first_token = CancelToken::never();
    let second_token = CancelToken::never();

    let (first, second) = tokio::join!(
        harness.broker.connect(&target, &endpoint, &mut first_settings, &first_token),
        harness.broker.connect(&target, &endpoint, &mut second_settings, &second_token),
    );

    let successes = usize::from(first.is_ok()) + usize::from(second.is_ok());
    assert_eq!(successes, 1);
    let conflicts = [first, second]
        .into_iter()
        .filter(|result| matches!(result, Err(ConnectError::AlreadyConnected(_))))
        .count();
    assert_eq!(conflicts, 1);
    assert!(harness.broker.is_connected(&target));
}

/// Cancelling mid-generation aborts the attempt and leaves no registration.
#[tokio::test]
async fn cancellation_mid_generation_leaves_registry_clean() {
    let prompt = ScriptedPrompt::new(PromptSelection::Chosen(0));
    let transport = Arc::new(StubTransport::default());
    let broker = Arc::new(
        SessionBroker::builder()
            .permissions(StubPermissions {
                granted: true,
            })
            .generator(StalledGenerator)
            .prompt(prompt)
            .settings_editor(CountingEditor::default())
            .transport(Arc::clone(&transport))
            .build()
            .expect("broker builds"),
    );
    let target = sample_target();
    let handle = CancelHandle::new();
    let token = handle.token();

    let connect_broker = Arc::clone(&broker);
    let connect_target = target.clone();
    let task = tokio::spawn(async move {
        let mut settings = settings_with(CredentialGenerationBehavior::Force, None);
        connect_broker
            .connect(&connect_target, &sample_endpoint(), &mut settings, &token)
            .await
    });

    tokio::task::yield_now().await;
    handle.cancel();

    let result = timeout(Duration::from_secs(1), task).await.expect("task finishes").expect("no panic");
    assert!(matches!(result, Err(ConnectError::Cancelled)));
    assert!(!broker.is_connected(&target));

    // The slot is free again: a fresh connect attempt may reserve it.
    let mut settings =
        settings_with(CredentialGenerationBehavior::Disallow, Some(("alice", "alicespassword")));
    broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("reconnect succeeds");
}

// ============================================================================
// SECTION: Lifecycle and Events
// ============================================================================

/// Closing twice emits exactly one Ended event after the Started event.
#[tokio::test]
async fn double_close_emits_single_ended_event() {
    let harness = harness(true, PromptSelection::Chosen(0));
    let target = sample_target();
    let mut events = harness.broker.subscribe();
    let mut settings =
        settings_with(CredentialGenerationBehavior::Disallow, Some(("alice", "alicespassword")));

    let session = harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("connect succeeds");

    session.close().await.expect("first close succeeds");
    session.close().await.expect("second close is a no-op");
    assert_eq!(session.state(), SessionState::Closed);
    assert!(!harness.broker.is_connected(&target));

    let started = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("started delivered")
        .expect("channel open");
    assert_eq!(
        started,
        SessionEvent::Started {
            target: target.clone()
        }
    );
    let ended = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("ended delivered")
        .expect("channel open");
    assert_eq!(
        ended,
        SessionEvent::Ended {
            target: target.clone()
        }
    );
    assert!(events.try_recv().is_err());
}

/// A transport-side disconnect deregisters the session and emits Ended.
#[tokio::test]
async fn transport_disconnect_deregisters_session() {
    let harness = harness(true, PromptSelection::Chosen(0));
    let target = sample_target();
    let mut events = harness.broker.subscribe();
    let mut settings =
        settings_with(CredentialGenerationBehavior::Disallow, Some(("alice", "alicespassword")));

    let session = harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("connect succeeds");

    harness
        .transport
        .last_channel()
        .trigger_disconnect(DisconnectReason::Failure("tunnel dropped".to_string()));
    wait_disconnected(&harness.broker, &target).await;
    assert_eq!(session.state(), SessionState::Closed);

    let started = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("started delivered")
        .expect("channel open");
    assert!(matches!(started, SessionEvent::Started { .. }));
    let ended = timeout(Duration::from_secs(1), events.recv())
        .await
        .expect("ended delivered")
        .expect("channel open");
    assert_eq!(
        ended,
        SessionEvent::Ended {
            target: target.clone()
        }
    );
}

/// Activation foregrounds existing sessions and reports absence without
/// side effects.
#[tokio::test]
async fn try_activate_reports_presence() {
    let harness = harness(true, PromptSelection::Chosen(0));
    let target = sample_target();
    assert!(!harness.broker.try_activate(&target).await);
    assert!(harness.broker.active_session().is_none());

    let mut settings =
        settings_with(CredentialGenerationBehavior::Disallow, Some(("alice", "alicespassword")));
    harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("connect succeeds");

    assert!(harness.broker.try_activate(&target).await);
    assert_eq!(harness.transport.last_channel().activations.load(Ordering::SeqCst), 1);

    let active = harness.broker.active_session().expect("active session");
    assert_eq!(active.target(), &target);
}

/// Closing the active session clears the active pointer.
#[tokio::test]
async fn closing_active_session_clears_active_pointer() {
    let harness = harness(true, PromptSelection::Chosen(0));
    let target = sample_target();
    let mut settings =
        settings_with(CredentialGenerationBehavior::Disallow, Some(("alice", "alicespassword")));

    let session = harness
        .broker
        .connect(&target, &sample_endpoint(), &mut settings, &CancelToken::never())
        .await
        .expect("connect succeeds");
    assert!(harness.broker.active_session().is_some());

    session.close().await.expect("close succeeds");
    assert!(harness.broker.active_session().is_none());
}
