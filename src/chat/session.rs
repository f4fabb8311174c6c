use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, PoisonError};

use tokio_util::sync::CancellationToken;

use super::history::ConversationHistory;
use super::settings::{RequestConfig, SettingsProvider};
use super::sink::{
    MessageId, MessageUpdate, RenderSink, STATUS_STOPPED, STATUS_STREAMING, STATUS_THINKING,
};
use super::turn::{StreamEnd, TurnState, consume_stream};
use super::{ERROR_GLYPH, TurnError};
use crate::openai::{CompletionRequest, CompletionTransport, Role};

/// Published state of the turn controller.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnPhase {
    Idle,
    Sending,
    Streaming,
    Finalizing,
    Completed,
    Failed,
    Aborted,
}

impl TurnPhase {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Idle | Self::Completed | Self::Failed | Self::Aborted
        )
    }
}

#[derive(Debug, PartialEq)]
pub enum TurnOutcome {
    /// The utterance was blank
    Ignored,
    /// Another turn is still in flight
    Rejected,
    Completed(String),
    Failed(TurnError),
    /// Cancelled by the caller. `kept` is true when the partial text
    /// was committed to the history.
    Aborted { partial: String, kept: bool },
}

enum TurnEnd {
    Completed(String),
    Aborted(String),
}

/// Holds the processing flag for the duration of a turn and releases
/// it on every exit path, including when the turn's future is dropped.
struct TurnGuard<'a> {
    processing: &'a AtomicBool,
    phase: &'a Mutex<TurnPhase>,
}

impl<'a> TurnGuard<'a> {
    fn acquire(processing: &'a AtomicBool, phase: &'a Mutex<TurnPhase>) -> Option<Self> {
        processing
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .ok()?;
        Some(Self { processing, phase })
    }
}

impl Drop for TurnGuard<'_> {
    fn drop(&mut self) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        if !phase.is_terminal() {
            tracing::debug!("Turn dropped while {:?}", *phase);
            *phase = TurnPhase::Aborted;
        }
        self.processing.store(false, Ordering::Release);
    }
}

/// One client session: the conversation plus the controller that runs
/// turns against it. At most one turn runs at a time; sends made while
/// a turn is in flight are dropped, not queued.
pub struct ClientSession<T, P> {
    transport: T,
    settings: P,
    history: Mutex<ConversationHistory>,
    processing: AtomicBool,
    phase: Mutex<TurnPhase>,
    keep_partial_on_abort: bool,
}

impl<T, P> ClientSession<T, P>
where
    T: CompletionTransport,
    P: SettingsProvider,
{
    pub fn new(transport: T, settings: P) -> Self {
        Self {
            transport,
            settings,
            history: Mutex::new(ConversationHistory::new()),
            processing: AtomicBool::new(false),
            phase: Mutex::new(TurnPhase::Idle),
            keep_partial_on_abort: true,
        }
    }

    /// Whether text received before a cancellation is kept in the
    /// history.
    pub fn keep_partial_on_abort(mut self, keep: bool) -> Self {
        self.keep_partial_on_abort = keep;
        self
    }

    pub fn settings(&self) -> &P {
        &self.settings
    }

    pub fn history(&self) -> ConversationHistory {
        self.with_history(|history| history.clone())
    }

    pub fn phase(&self) -> TurnPhase {
        *self.phase.lock().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn is_processing(&self) -> bool {
        self.processing.load(Ordering::Acquire)
    }

    pub async fn send(&self, utterance: &str, sink: &mut dyn RenderSink) -> TurnOutcome {
        self.send_with_cancel(utterance, sink, &CancellationToken::new())
            .await
    }

    /// Runs one turn: records the user's message, streams the reply
    /// into `sink` and commits it to the history.
    pub async fn send_with_cancel(
        &self,
        utterance: &str,
        sink: &mut dyn RenderSink,
        cancel: &CancellationToken,
    ) -> TurnOutcome {
        let utterance = utterance.trim();
        if utterance.is_empty() {
            return TurnOutcome::Ignored;
        }
        let Some(_guard) = TurnGuard::acquire(&self.processing, &self.phase) else {
            tracing::debug!("Turn already in progress, ignoring send");
            return TurnOutcome::Rejected;
        };

        let config = self.settings.snapshot();
        self.transition(TurnPhase::Sending);

        let user_id = MessageId::new();
        sink.create(&user_id, Role::User, MessageUpdate::content(utterance));
        let assistant_id = MessageId::new();
        sink.create(
            &assistant_id,
            Role::Assistant,
            MessageUpdate::content("")
                .with_status(STATUS_THINKING)
                .loading(true),
        );

        // Recorded even if the turn fails so the transcript keeps it
        self.with_history(|history| history.push_user(utterance));

        match self.run_turn(&config, &assistant_id, sink, cancel).await {
            Ok(TurnEnd::Completed(text)) => {
                self.with_history(|history| history.push_assistant(&text));
                sink.update(&assistant_id, MessageUpdate::settled(&text));
                self.transition(TurnPhase::Completed);
                TurnOutcome::Completed(text)
            }
            Ok(TurnEnd::Aborted(partial)) => {
                let kept = self.keep_partial_on_abort
                    && self.with_history(|history| history.push_assistant(&partial));
                let update = if partial.trim().is_empty() {
                    MessageUpdate::settled(&format!("{} Request cancelled.", ERROR_GLYPH))
                } else {
                    MessageUpdate::content(&partial)
                        .with_status(STATUS_STOPPED)
                        .loading(false)
                };
                sink.update(&assistant_id, update);
                self.transition(TurnPhase::Aborted);
                tracing::info!("Turn cancelled after {} chars", partial.len());
                TurnOutcome::Aborted { partial, kept }
            }
            Err(err) => {
                tracing::warn!("Turn failed: {}", err);
                sink.update(&assistant_id, MessageUpdate::settled(&err.render()));
                self.transition(TurnPhase::Failed);
                TurnOutcome::Failed(err)
            }
        }
    }

    async fn run_turn(
        &self,
        config: &RequestConfig,
        assistant_id: &MessageId,
        sink: &mut dyn RenderSink,
        cancel: &CancellationToken,
    ) -> Result<TurnEnd, TurnError> {
        let api_key = config.credential().ok_or(TurnError::MissingCredential)?;
        let request =
            self.with_history(|history| CompletionRequest::new(config, history.messages()));
        let mut state = TurnState::new();

        tracing::debug!(
            "Sending {} messages to {}",
            request.messages.len(),
            request.model
        );
        let stream = tokio::select! {
            biased;
            _ = cancel.cancelled() => return Ok(TurnEnd::Aborted(state.abort())),
            opened = self.transport.open_stream(api_key, &request) => opened?,
        };

        self.transition(TurnPhase::Streaming);
        sink.update(
            assistant_id,
            MessageUpdate::default()
                .with_status(STATUS_STREAMING)
                .loading(true),
        );

        let end = consume_stream(&mut state, stream, cancel, |text| {
            sink.update(
                assistant_id,
                MessageUpdate::content(text)
                    .with_status(STATUS_STREAMING)
                    .loading(true),
            )
        })
        .await?;

        match end {
            StreamEnd::Cancelled => Ok(TurnEnd::Aborted(state.abort())),
            StreamEnd::Sentinel | StreamEnd::Eof => {
                self.transition(TurnPhase::Finalizing);
                state.finalize().map(TurnEnd::Completed)
            }
        }
    }

    fn transition(&self, next: TurnPhase) {
        let mut phase = self.phase.lock().unwrap_or_else(PoisonError::into_inner);
        tracing::debug!("Turn {:?} -> {:?}", *phase, next);
        *phase = next;
    }

    fn with_history<R>(&self, f: impl FnOnce(&mut ConversationHistory) -> R) -> R {
        let mut history = self.history.lock().unwrap_or_else(PoisonError::into_inner);
        f(&mut history)
    }
}
