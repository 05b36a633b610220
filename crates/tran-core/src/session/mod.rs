//! Streaming session controller.
//!
//! One [`Controller`] owns at most one [`Session`]. Every method is
//! synchronous; [`run_session`] drives it from the port and the clock.
//!
//! ```text
//! Idle -> Streaming -> Finalizing -> Idle
//!                  \-> RollingBack -> Idle
//! ```

pub mod driver;
pub mod throttle;

use std::fmt;
use std::time::Duration;

use serde_json::Value;
use tokio::time::Instant;
use tracing::{Span, debug, info, info_span, trace, warn};
use tran_providers::ProviderError;
use tran_types::{
    Connector, ConsumerMessage, ErrorCode, PORT_NAME, PortReceiver, PortSender, ProducerMessage,
    TranslationConfig,
};
use uuid::Uuid;

pub use driver::run_session;
pub use throttle::{DEFAULT_THROTTLE, Throttle};

use crate::apply::{
    FallbackSelection, Snapshot, apply_direct, apply_verified, prepare_copy_fallback, restore,
};
use crate::classify::{MutationVerdict, Strategy, classify};
use crate::range::{TextRange, extract};
use crate::surface::{InputEvent, NodeId, Surface, Target, contains, resolve_target};

/// Lifecycle state of the controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Idle,
    Streaming,
    Finalizing,
    RollingBack,
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SessionState::Idle => write!(f, "idle"),
            SessionState::Streaming => write!(f, "streaming"),
            SessionState::Finalizing => write!(f, "finalizing"),
            SessionState::RollingBack => write!(f, "rolling_back"),
        }
    }
}

/// How a session ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionOutcome {
    /// The translation is in place (empty when nothing was produced).
    Completed { text: String },
    /// The surface was not mutated; the user has to paste `text`.
    CopyFallback {
        text: String,
        reason: String,
        selection: FallbackSelection,
    },
    /// Configuration or producer failure; direct surfaces were rolled back.
    Failed { code: ErrorCode, message: String },
    /// The user interrupted; the surface holds its original text.
    Interrupted,
}

/// Why a trigger did not start a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IgnoreReason {
    /// The focused element is not a supported surface.
    NoTarget,
    /// Nothing but whitespace to translate.
    NothingToTranslate,
}

impl fmt::Display for IgnoreReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            IgnoreReason::NoTarget => write!(f, "focused element is not editable text"),
            IgnoreReason::NothingToTranslate => write!(f, "nothing to translate"),
        }
    }
}

/// Result of [`Controller::trigger`].
#[derive(Debug)]
pub enum Trigger {
    /// A session is streaming; feed it messages from this receiver.
    Started(PortReceiver),
    /// Nothing happened.
    Ignored(IgnoreReason),
    /// A streaming session was cancelled and no new one was started.
    Interrupted(SessionOutcome),
    /// The session could not be opened.
    Rejected(SessionOutcome),
}

/// State of one translation attempt. Dropped when the attempt ends.
struct Session {
    id: Uuid,
    span: Span,
    target: Target,
    snapshot: Snapshot,
    original_range: TextRange,
    range: TextRange,
    verdict: MutationVerdict,
    strategy: Strategy,
    // Dropping the sender is the cancellation signal.
    sender: Option<PortSender>,
    latest: Option<String>,
    last_applied: Option<String>,
    throttle: Throttle,
    applied_any: bool,
    self_mutating: bool,
    state: SessionState,
}

impl Session {
    /// Runs an applier call with the self-mutation flag raised. Input
    /// events the host fires during the call are the engine's own echo.
    fn guarded<R>(
        &mut self,
        surface: &mut dyn Surface,
        f: impl FnOnce(&mut dyn Surface, &mut TextRange) -> R,
    ) -> R {
        self.self_mutating = true;
        let result = f(&mut *surface, &mut self.range);
        let echoed = surface.drain_input_events();
        if !echoed.is_empty() {
            trace!(count = echoed.len(), "Ignoring self-originated input events");
        }
        self.self_mutating = false;
        result
    }

    /// Closes the consumer side of the port.
    fn disconnect(&mut self) {
        if self.sender.take().is_some() {
            debug!("Port disconnected");
        }
    }

    fn has_pending(&self) -> bool {
        self.strategy == Strategy::Direct
            && self.latest.is_some()
            && self.latest != self.last_applied
    }

    fn host(&self) -> NodeId {
        self.target.surface_id()
    }

    fn owns_event(&self, surface: &dyn Surface, event: &InputEvent) -> bool {
        match self.target {
            Target::Control(element) => event.target == element,
            Target::Editable { host, .. } => contains(surface, host, event.target),
        }
    }

    /// Restores the snapshot if anything was mutated.
    fn roll_back(&mut self, surface: &mut dyn Surface) {
        self.state = SessionState::RollingBack;
        if !self.applied_any {
            return;
        }
        let snapshot = self.snapshot.clone();
        let original = self.original_range.clone();
        let restored = self.guarded(surface, |surface, _| restore(surface, &snapshot, &original));
        if restored {
            debug!("Surface restored to its original text");
        } else {
            warn!("Surface could not be fully restored");
        }
    }
}

/// Owns configuration, the producer connection and the active session.
pub struct Controller<C> {
    connector: C,
    config: TranslationConfig,
    throttle: Duration,
    session: Option<Session>,
}

impl<C: Connector> Controller<C> {
    pub fn new(connector: C, config: TranslationConfig) -> Self {
        Self {
            connector,
            config,
            throttle: DEFAULT_THROTTLE,
            session: None,
        }
    }

    #[must_use]
    pub fn with_throttle(mut self, interval: Duration) -> Self {
        self.throttle = interval;
        self
    }

    pub fn state(&self) -> SessionState {
        self.session
            .as_ref()
            .map_or(SessionState::Idle, |session| session.state)
    }

    pub fn is_active(&self) -> bool {
        self.session.is_some()
    }

    /// Verdict of the active session.
    pub fn verdict(&self) -> Option<&MutationVerdict> {
        self.session.as_ref().map(|session| &session.verdict)
    }

    /// Starts a session for the focused surface, or cancels the active one.
    pub fn trigger(&mut self, surface: &mut dyn Surface) -> Trigger {
        if self.session.is_some() {
            let outcome = self
                .interrupt(surface)
                .unwrap_or(SessionOutcome::Interrupted);
            return Trigger::Interrupted(outcome);
        }

        let Some(target) = resolve_target(surface) else {
            debug!("Trigger ignored: {}", IgnoreReason::NoTarget);
            return Trigger::Ignored(IgnoreReason::NoTarget);
        };
        if !self.config.has_credential() {
            let err = ProviderError::missing_credential();
            warn!("Translation rejected: {err}");
            return Trigger::Rejected(SessionOutcome::Failed {
                code: err.code(),
                message: err.message,
            });
        }
        let Some(range) = extract(surface, target, self.config.max_chars) else {
            debug!("Trigger ignored: {}", IgnoreReason::NothingToTranslate);
            return Trigger::Ignored(IgnoreReason::NothingToTranslate);
        };

        let snapshot = Snapshot::capture(surface, target.surface_id());
        let verdict = classify(surface, target);
        let strategy = verdict.strategy();

        let port = match self.connector.connect(PORT_NAME) {
            Ok(port) => port,
            Err(err) => return Trigger::Rejected(unavailable(&err)),
        };
        let (sender, receiver) = port.split();
        let request = ConsumerMessage::Translate {
            text: range.source_text.clone(),
            config: self.config.clone(),
        };
        if let Err(err) = sender.post(&request) {
            return Trigger::Rejected(unavailable(&err));
        }

        // Edits made before the trigger are not interruptions.
        surface.drain_input_events();

        let id = Uuid::new_v4();
        let span = info_span!("session", %id);
        span.in_scope(|| {
            info!(
                %strategy,
                chars = range.source_text.chars().count(),
                reason = %verdict.reason,
                "Translation session started"
            );
        });
        self.session = Some(Session {
            id,
            span,
            target,
            snapshot,
            original_range: range.clone(),
            range,
            verdict,
            strategy,
            sender: Some(sender),
            latest: None,
            last_applied: None,
            throttle: Throttle::new(self.throttle),
            applied_any: false,
            self_mutating: false,
            state: SessionState::Streaming,
        });
        Trigger::Started(receiver)
    }

    /// Handles one raw message from the producer.
    ///
    /// Unrecognized messages are dropped. Returns the outcome when the
    /// message ended the session.
    pub fn handle_message(
        &mut self,
        surface: &mut dyn Surface,
        raw: &Value,
        now: Instant,
    ) -> Option<SessionOutcome> {
        if let Some(outcome) = self.pump_input(surface) {
            return Some(outcome);
        }
        let session = self.session.as_mut()?;
        if session.state != SessionState::Streaming {
            return None;
        }
        let _entered = session.span.clone().entered();

        let Some(message) = ProducerMessage::decode(raw) else {
            debug!("Ignoring unrecognized producer message");
            return None;
        };
        match message {
            ProducerMessage::Chunk { accumulated_text } => {
                debug!(chars = accumulated_text.chars().count(), "Received chunk");
                session.latest = Some(accumulated_text);
                if session.strategy == Strategy::Direct && session.throttle.ready(now) {
                    return self.apply_latest(surface, now);
                }
                None
            }
            ProducerMessage::Complete => Some(self.finish(surface)),
            ProducerMessage::Error { message, code } => Some(self.fail(surface, code, message)),
        }
    }

    /// Applies a coalesced increment once the throttle allows it.
    pub fn flush_due(&mut self, surface: &mut dyn Surface, now: Instant) -> Option<SessionOutcome> {
        if let Some(outcome) = self.pump_input(surface) {
            return Some(outcome);
        }
        let session = self.session.as_ref()?;
        if session.state != SessionState::Streaming
            || !session.has_pending()
            || !session.throttle.ready(now)
        {
            return None;
        }
        let _entered = session.span.clone().entered();
        self.apply_latest(surface, now)
    }

    /// When a coalesced increment is waiting, the instant it may be applied.
    pub fn throttle_deadline(&self) -> Option<Instant> {
        let session = self.session.as_ref()?;
        if session.state != SessionState::Streaming || !session.has_pending() {
            return None;
        }
        session.throttle.next_allowed()
    }

    /// Interruption watcher: a user edit on the surface cancels the session.
    ///
    /// Events raised by the engine's own mutations and IME composition
    /// events are not interruptions.
    pub fn handle_input(
        &mut self,
        surface: &mut dyn Surface,
        event: &InputEvent,
    ) -> Option<SessionOutcome> {
        let session = self.session.as_ref()?;
        if session.state != SessionState::Streaming
            || session.self_mutating
            || event.is_composing
            || !session.owns_event(surface, event)
        {
            return None;
        }
        let _entered = session.span.clone().entered();
        debug!(target = event.target.index(), "User edit interrupts translation");
        self.interrupt(surface)
    }

    /// Feeds every queued host input event to the interruption watcher.
    pub fn pump_input(&mut self, surface: &mut dyn Surface) -> Option<SessionOutcome> {
        for event in surface.drain_input_events() {
            if let Some(outcome) = self.handle_input(surface, &event) {
                return Some(outcome);
            }
        }
        None
    }

    /// The producer went away without a terminal message.
    pub fn handle_disconnect(&mut self, surface: &mut dyn Surface) -> Option<SessionOutcome> {
        let session = self.session.as_ref()?;
        let _entered = session.span.clone().entered();
        warn!("Producer disconnected before finishing");
        Some(self.fail(
            surface,
            ErrorCode::Network,
            "Translation service disconnected".to_string(),
        ))
    }

    /// Cancels the active session and restores the surface.
    pub fn interrupt(&mut self, surface: &mut dyn Surface) -> Option<SessionOutcome> {
        let mut session = self.session.take()?;
        let _entered = session.span.clone().entered();
        session.disconnect();
        session.roll_back(surface);
        info!(session = %session.id, "Translation interrupted");
        Some(SessionOutcome::Interrupted)
    }

    fn apply_latest(&mut self, surface: &mut dyn Surface, now: Instant) -> Option<SessionOutcome> {
        let session = self.session.as_mut()?;
        let text = session.latest.clone()?;
        if session.last_applied.as_deref() == Some(text.as_str()) {
            return None;
        }
        match session.guarded(surface, |surface, range| apply_direct(surface, range, &text)) {
            Ok(()) => {
                session.applied_any = true;
                session.last_applied = Some(text);
                session.throttle.mark(now);
                None
            }
            Err(err) => {
                warn!("Live replacement failed: {err}");
                Some(self.fall_back(surface, text, err.to_string()))
            }
        }
    }

    /// Completion: flush the final text through the session's strategy.
    fn finish(&mut self, surface: &mut dyn Surface) -> SessionOutcome {
        let Some(mut session) = self.session.take() else {
            return SessionOutcome::Interrupted;
        };
        session.state = SessionState::Finalizing;
        let text = session.latest.clone().unwrap_or_default();
        if text.is_empty() {
            info!("Translation complete with empty output");
            return SessionOutcome::Completed { text };
        }

        let outcome = match session.strategy {
            Strategy::Direct => {
                if session.last_applied.as_deref() == Some(text.as_str()) {
                    Ok(())
                } else {
                    session
                        .guarded(surface, |surface, range| apply_direct(surface, range, &text))
                        .map_err(|err| err.to_string())
                }
            }
            Strategy::Verified => {
                let host = session.host();
                session
                    .guarded(surface, |surface, range| {
                        apply_verified(surface, host, range, &text)
                    })
                    .map_err(|failure| failure.to_string())
            }
            Strategy::CopyFallback => Err(session.verdict.reason.clone()),
        };

        match outcome {
            Ok(()) => {
                info!(chars = text.chars().count(), "Translation complete");
                SessionOutcome::Completed { text }
            }
            Err(reason) => self.copy_fallback(surface, session, text, reason),
        }
    }

    fn fail(&mut self, surface: &mut dyn Surface, code: ErrorCode, message: String) -> SessionOutcome {
        let Some(mut session) = self.session.take() else {
            return SessionOutcome::Failed { code, message };
        };
        session.roll_back(surface);
        warn!(%code, "Translation failed: {message}");
        SessionOutcome::Failed { code, message }
    }

    /// A live replacement failed mid-stream: cancel, roll back, hand over.
    fn fall_back(&mut self, surface: &mut dyn Surface, text: String, reason: String) -> SessionOutcome {
        let Some(mut session) = self.session.take() else {
            return SessionOutcome::Interrupted;
        };
        session.disconnect();
        self.copy_fallback(surface, session, text, reason)
    }

    fn copy_fallback(
        &mut self,
        surface: &mut dyn Surface,
        mut session: Session,
        text: String,
        reason: String,
    ) -> SessionOutcome {
        session.roll_back(surface);
        let host = session.host();
        let original = session.original_range.clone();
        let selection = session.guarded(surface, |surface, _| {
            prepare_copy_fallback(surface, host, &original)
        });
        info!(%reason, ?selection, "Translation handed over for manual paste");
        SessionOutcome::CopyFallback {
            text,
            reason,
            selection,
        }
    }
}

fn unavailable(err: &dyn std::error::Error) -> SessionOutcome {
    warn!("Could not reach translation service: {err}");
    SessionOutcome::Failed {
        code: ErrorCode::Network,
        message: format!("Translation service unavailable: {err}"),
    }
}
