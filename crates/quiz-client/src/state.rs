//! Client-side game session state and the reducer that drives it.
//!
//! [`GameSessionState::apply`] is the only place the state changes. It takes
//! one [`SessionInput`] (a channel event, a countdown tick, or a local action
//! that already reached the server) and reports what changed plus what the
//! countdown timer should do. No I/O happens here.

use std::fmt;

use quiz_core::protocol::{AnswerResult, Question, ServerEvent};

use crate::error::ChannelError;

/// Coarse position in the game flow.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Not joined.
    #[default]
    Idle,
    /// Joined; no question has arrived yet.
    Waiting,
    /// A question is live and not yet answered. The countdown only runs
    /// while connected; after a disconnect the phase stays here with the
    /// countdown cancelled until the server's next event.
    QuestionActive,
    /// The question is answered or timed out; waiting for the next one.
    BetweenQuestions,
    Ended,
    Stopped,
}

impl fmt::Display for SessionPhase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            SessionPhase::Idle => "idle",
            SessionPhase::Waiting => "waiting for game to start",
            SessionPhase::QuestionActive => "question active",
            SessionPhase::BetweenQuestions => "get ready for the next question",
            SessionPhase::Ended => "game ended",
            SessionPhase::Stopped => "game stopped",
        };
        f.write_str(label)
    }
}

/// Everything the reducer reacts to.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionInput {
    Connected,
    Disconnected,
    ChannelError(ChannelError),
    Server(ServerEvent),
    /// One second elapsed on the active countdown.
    Tick,
    /// `joinGame` was emitted.
    Joined,
    /// `answer` was emitted for the current question.
    AnswerSubmitted { answer: String },
    Reset,
}

/// What the countdown should do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum TimerCommand {
    #[default]
    Keep,
    /// Replace any running countdown with one of this many seconds.
    Start(u32),
    Cancel,
}

/// Flags describing which parts of the state a transition touched.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SessionChange {
    pub connection: bool,
    /// Current question or progress counters.
    pub question: bool,
    /// Score or last answer result.
    pub score: bool,
    pub timer: bool,
    pub phase: bool,
    pub error: bool,
}

impl SessionChange {
    pub fn any(self) -> bool {
        self.connection || self.question || self.score || self.timer || self.phase || self.error
    }
}

/// Result of applying one input.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Transition {
    pub changed: SessionChange,
    pub timer: TimerCommand,
}

/// Snapshot of one play session as seen by this client.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GameSessionState {
    pub phase: SessionPhase,
    pub connected: bool,
    pub game_started: bool,
    pub current_question: Option<Question>,
    pub question_number: u32,
    pub total_questions: u32,
    pub time_remaining_secs: u32,
    pub score: u32,
    /// Stable for the lifetime of the session.
    pub user_id: String,
    /// Answer sent for the current question, if any.
    pub submitted_answer: Option<String>,
    pub last_result: Option<AnswerResult>,
    pub last_error: Option<ChannelError>,
}

impl GameSessionState {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            phase: SessionPhase::Idle,
            connected: false,
            game_started: false,
            current_question: None,
            question_number: 0,
            total_questions: 0,
            time_remaining_secs: 0,
            score: 0,
            user_id: user_id.into(),
            submitted_answer: None,
            last_result: None,
            last_error: None,
        }
    }

    /// Whether the player can still answer the current question.
    pub fn can_answer(&self) -> bool {
        self.current_question.is_some()
            && self.submitted_answer.is_none()
            && self.time_remaining_secs > 0
    }

    /// Apply one input and report what changed.
    pub fn apply(&mut self, input: &SessionInput) -> Transition {
        let mut t = Transition::default();

        match input {
            SessionInput::Connected => {
                self.connected = true;
                self.last_error = None;
                t.changed.connection = true;
            }
            SessionInput::Disconnected => {
                // Question context is kept; it is stale until the server
                // pushes the next event after a reconnect.
                self.connected = false;
                t.changed.connection = true;
                t.timer = TimerCommand::Cancel;
            }
            SessionInput::ChannelError(error) => {
                self.last_error = Some(error.clone());
                t.changed.error = true;
            }
            SessionInput::Server(ServerEvent::NewQuestion(nq)) => {
                let seconds = nq.time_limit_secs();
                self.current_question = Some(nq.question.clone());
                self.question_number = nq.question_number;
                self.total_questions = nq.total_questions;
                self.time_remaining_secs = seconds;
                self.game_started = true;
                self.submitted_answer = None;
                self.last_result = None;
                self.set_phase(
                    if seconds > 0 {
                        SessionPhase::QuestionActive
                    } else {
                        SessionPhase::BetweenQuestions
                    },
                    &mut t,
                );
                t.timer = if seconds > 0 {
                    TimerCommand::Start(seconds)
                } else {
                    TimerCommand::Cancel
                };
                t.changed.question = true;
                t.changed.timer = true;
                t.changed.score = true;
            }
            SessionInput::Server(ServerEvent::AnswerResult(result)) => {
                if result.correct {
                    self.score = self.score.saturating_add(1);
                }
                self.last_result = Some(result.clone());
                if self.phase == SessionPhase::QuestionActive {
                    self.set_phase(SessionPhase::BetweenQuestions, &mut t);
                }
                t.changed.score = true;
            }
            SessionInput::Server(ServerEvent::GameEnded(_)) => {
                self.finish(SessionPhase::Ended, &mut t);
            }
            SessionInput::Server(ServerEvent::GameStopped) => {
                self.finish(SessionPhase::Stopped, &mut t);
            }
            SessionInput::Tick => {
                if self.time_remaining_secs <= 1 {
                    self.time_remaining_secs = 0;
                    if self.phase == SessionPhase::QuestionActive {
                        self.set_phase(SessionPhase::BetweenQuestions, &mut t);
                    }
                    t.timer = TimerCommand::Cancel;
                } else {
                    self.time_remaining_secs -= 1;
                }
                t.changed.timer = true;
            }
            SessionInput::Joined => {
                self.game_started = true;
                if matches!(
                    self.phase,
                    SessionPhase::Idle | SessionPhase::Ended | SessionPhase::Stopped
                ) {
                    self.set_phase(SessionPhase::Waiting, &mut t);
                }
            }
            SessionInput::AnswerSubmitted { answer } => {
                self.submitted_answer = Some(answer.clone());
                if self.phase == SessionPhase::QuestionActive {
                    self.set_phase(SessionPhase::BetweenQuestions, &mut t);
                }
                t.timer = TimerCommand::Cancel;
                t.changed.question = true;
                t.changed.timer = true;
            }
            SessionInput::Reset => {
                self.current_question = None;
                self.question_number = 0;
                self.total_questions = 0;
                self.time_remaining_secs = 0;
                self.score = 0;
                self.game_started = false;
                self.submitted_answer = None;
                self.last_result = None;
                self.set_phase(SessionPhase::Idle, &mut t);
                t.timer = TimerCommand::Cancel;
                t.changed.question = true;
                t.changed.score = true;
                t.changed.timer = true;
            }
        }

        t
    }

    fn set_phase(&mut self, phase: SessionPhase, t: &mut Transition) {
        if self.phase != phase {
            self.phase = phase;
            t.changed.phase = true;
        }
    }

    fn finish(&mut self, phase: SessionPhase, t: &mut Transition) {
        self.current_question = None;
        self.game_started = false;
        self.time_remaining_secs = 0;
        self.submitted_answer = None;
        self.set_phase(phase, t);
        t.timer = TimerCommand::Cancel;
        t.changed.question = true;
        t.changed.timer = true;
    }
}
