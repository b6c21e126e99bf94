//! Game session controller.
//!
//! Owns a [`GameSessionState`] and a [`QuestionTimer`], and holds a handle to
//! a [`GameChannel`]. Channel events and countdown ticks are funnelled into a
//! single inbox and applied one at a time through
//! [`GameSessionState::apply`], so no two transitions ever interleave.
//!
//! Frontends only need to:
//! 1. Build the controller with [`GameSessionController::new`] (this
//!    subscribes to the channel and connects it).
//! 2. Call [`GameSessionController::recv`] or
//!    [`GameSessionController::try_recv`] to process pending events.
//! 3. Call the action methods (`join_game`, `submit_answer`, ...) on user
//!    input, and render [`GameSessionController::state`] or a
//!    [`subscribe`](GameSessionController::subscribe)d snapshot.

use tokio::sync::{mpsc, watch};

use crate::adapter::GameChannel;
use crate::error::{ClientError, Result};
use crate::identity::IdentityProvider;
use crate::registry::{ChannelEvent, EventKind, HandlerId};
use crate::state::{GameSessionState, SessionChange, SessionInput, TimerCommand};
use crate::timer::{QuestionTimer, TickSink, TimerTick, TokioQuestionTimer};

/// Outcome of processing one pending event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PollResult {
    /// An input was applied; the flags describe what was modified.
    Updated(SessionInput, SessionChange),
    /// Nothing pending.
    Empty,
}

/// Message in the controller's inbox.
#[derive(Debug)]
enum Inbound {
    Channel(ChannelEvent),
    Tick(TimerTick),
}

pub struct GameSessionController<Ch: GameChannel, T: QuestionTimer = TokioQuestionTimer> {
    channel: Ch,
    timer: T,
    /// Generation of the countdown whose ticks are accepted.
    active_timer: Option<u64>,
    state: GameSessionState,
    snapshot: watch::Sender<GameSessionState>,
    inbox_tx: mpsc::UnboundedSender<Inbound>,
    inbox: mpsc::UnboundedReceiver<Inbound>,
    subscriptions: Vec<(EventKind, HandlerId)>,
}

impl<Ch: GameChannel> GameSessionController<Ch, TokioQuestionTimer> {
    /// Controller with the tokio-backed countdown.
    pub fn new(channel: Ch, identity: &impl IdentityProvider) -> Self {
        Self::with_timer(channel, identity, TokioQuestionTimer::new())
    }
}

impl<Ch: GameChannel, T: QuestionTimer> GameSessionController<Ch, T> {
    /// Subscribe to every channel event the session cares about, then ask the
    /// channel to connect.
    pub fn with_timer(channel: Ch, identity: &impl IdentityProvider, timer: T) -> Self {
        let state = GameSessionState::new(identity.user_id());
        let (snapshot, _) = watch::channel(state.clone());
        let (inbox_tx, inbox) = mpsc::unbounded_channel();

        let subscriptions = EventKind::ALL
            .into_iter()
            .map(|kind| {
                let tx = inbox_tx.clone();
                let id = channel.on(kind, move |event| {
                    let _ = tx.send(Inbound::Channel(event.clone()));
                });
                (kind, id)
            })
            .collect();

        let mut ctrl = Self {
            channel,
            timer,
            active_timer: None,
            state,
            snapshot,
            inbox_tx,
            inbox,
            subscriptions,
        };

        tracing::debug!(user_id = %ctrl.state.user_id, "session controller created");
        ctrl.channel.connect();
        if ctrl.channel.is_connected() {
            ctrl.apply(SessionInput::Connected);
        }
        ctrl
    }

    /// Borrow the current state.
    pub fn state(&self) -> &GameSessionState {
        &self.state
    }

    /// Watch the state; a fresh snapshot is published after every change.
    pub fn subscribe(&self) -> watch::Receiver<GameSessionState> {
        self.snapshot.subscribe()
    }

    pub fn user_id(&self) -> &str {
        &self.state.user_id
    }

    pub fn is_connected(&self) -> bool {
        self.state.connected
    }

    pub fn timer_active(&self) -> bool {
        self.active_timer.is_some() && self.timer.is_active()
    }

    /// Process one pending event without waiting.
    pub fn try_recv(&mut self) -> PollResult {
        while let Ok(msg) = self.inbox.try_recv() {
            if let Some(result) = self.process(msg) {
                return result;
            }
        }
        PollResult::Empty
    }

    /// Wait for the next event and process it.
    ///
    /// Never returns [`PollResult::Empty`]. Cancel-safe, so it can sit in a
    /// `tokio::select!` loop.
    pub async fn recv(&mut self) -> PollResult {
        loop {
            // The controller holds a sender, so the inbox never closes.
            let Some(msg) = self.inbox.recv().await else {
                return std::future::pending().await;
            };
            if let Some(result) = self.process(msg) {
                return result;
            }
        }
    }

    /// Process everything currently pending; returns how many inputs applied.
    pub fn drain(&mut self) -> usize {
        let mut applied = 0;
        while let PollResult::Updated(..) = self.try_recv() {
            applied += 1;
        }
        applied
    }

    // -- actions -----------------------------------------------------------

    /// Join the game under this session's user id.
    pub fn join_game(&mut self) -> Result<()> {
        self.channel.join_game(&self.state.user_id)?;
        tracing::info!(user_id = %self.state.user_id, "joined game");
        self.apply(SessionInput::Joined);
        Ok(())
    }

    pub fn start_game(&mut self) -> Result<()> {
        self.channel.start_game()
    }

    pub fn stop_game(&mut self) -> Result<()> {
        self.channel.stop_game()
    }

    /// Answer the current question.
    ///
    /// Returns `Ok(false)` without emitting when there is no current question
    /// or it was already answered. Fails with [`ClientError::NotConnected`]
    /// whenever the channel is down.
    pub fn submit_answer(&mut self, answer: &str) -> Result<bool> {
        if !self.channel.is_connected() {
            return Err(ClientError::NotConnected);
        }
        let Some(question) = &self.state.current_question else {
            return Ok(false);
        };
        if self.state.submitted_answer.is_some() {
            tracing::debug!(question_id = %question.id, "already answered");
            return Ok(false);
        }

        self.channel
            .submit_answer(&question.id, answer, &self.state.user_id)?;
        tracing::debug!(question_id = %question.id, "answer submitted");
        self.apply(SessionInput::AnswerSubmitted {
            answer: answer.to_string(),
        });
        Ok(true)
    }

    /// Clear question, score and progress; connectivity is untouched.
    pub fn reset_game(&mut self) {
        self.apply(SessionInput::Reset);
    }

    // -- private -----------------------------------------------------------

    fn process(&mut self, msg: Inbound) -> Option<PollResult> {
        let input = match msg {
            Inbound::Channel(ChannelEvent::Connect) => SessionInput::Connected,
            Inbound::Channel(ChannelEvent::Disconnect { reason }) => {
                tracing::debug!(%reason, "session lost connection");
                SessionInput::Disconnected
            }
            Inbound::Channel(ChannelEvent::Error { error }) => {
                tracing::warn!(%error, "channel error");
                SessionInput::ChannelError(error)
            }
            Inbound::Channel(ChannelEvent::Server(event)) => SessionInput::Server(event),
            Inbound::Tick(tick) => {
                if self.active_timer != Some(tick.generation) {
                    return None;
                }
                SessionInput::Tick
            }
        };

        let changed = self.apply(input.clone());
        Some(PollResult::Updated(input, changed))
    }

    fn apply(&mut self, input: SessionInput) -> SessionChange {
        let transition = self.state.apply(&input);
        match transition.timer {
            TimerCommand::Keep => {}
            TimerCommand::Start(seconds) => {
                let sink = TickSink::channel(self.inbox_tx.clone(), Inbound::Tick);
                self.active_timer = Some(self.timer.start(seconds, sink));
            }
            TimerCommand::Cancel => {
                self.timer.cancel();
                self.active_timer = None;
            }
        }
        if transition.changed.any() {
            self.snapshot.send_replace(self.state.clone());
        }
        transition.changed
    }
}

impl<Ch: GameChannel, T: QuestionTimer> Drop for GameSessionController<Ch, T> {
    fn drop(&mut self) {
        for (kind, id) in self.subscriptions.drain(..) {
            self.channel.off(kind, id);
        }
        self.timer.cancel();
    }
}
