//! Event protocol spoken over the game channel.
//!
//! Every frame is a single JSON text message wrapped in a named envelope:
//!
//! ```json
//! {"event": "newQuestion", "data": {"question": {...}, "timeLimit": 15000}}
//! ```
//!
//! Outbound frames are produced from [`ClientEvent`], inbound frames are
//! decoded into [`ServerEvent`] by [`decode_server_frame`]. Decoding is strict
//! about the envelope and the required payload fields so that a malformed
//! frame is rejected here instead of leaking half-filled values upward.

use std::fmt;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

// ---------------------------------------------------------------------------
// Event names
// ---------------------------------------------------------------------------

pub const JOIN_GAME: &str = "joinGame";
pub const START_GAME: &str = "startGame";
pub const STOP_GAME: &str = "stopGame";
pub const ANSWER: &str = "answer";

pub const NEW_QUESTION: &str = "newQuestion";
pub const ANSWER_RESULT: &str = "answerResult";
pub const GAME_ENDED: &str = "gameEnded";
pub const GAME_STOPPED: &str = "gameStopped";

// ---------------------------------------------------------------------------
// Question entity
// ---------------------------------------------------------------------------

/// A quiz question as pushed by the server.
///
/// The schema belongs to the server; only `id` is required; everything else
/// is optional and unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Question {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_text: Option<String>,
    /// URL or asset reference for an image prompt.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub question_image: Option<String>,
    #[serde(default)]
    pub options: Vec<QuestionOption>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub correct_answer: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub category_id: Option<String>,
}

impl Question {
    /// Option labels in display order.
    pub fn option_texts(&self) -> impl Iterator<Item = &str> {
        self.options.iter().map(QuestionOption::text)
    }

    /// Text to show for the prompt, falling back to the image reference.
    pub fn prompt(&self) -> &str {
        self.question_text
            .as_deref()
            .or(self.question_image.as_deref())
            .unwrap_or("")
    }
}

/// One answer option. Servers send either bare strings or richer objects.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum QuestionOption {
    Text(String),
    Detailed {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        id: Option<String>,
        text: String,
        #[serde(
            default,
            rename = "isCorrect",
            skip_serializing_if = "Option::is_none"
        )]
        is_correct: Option<bool>,
    },
}

impl QuestionOption {
    pub fn text(&self) -> &str {
        match self {
            QuestionOption::Text(text) => text,
            QuestionOption::Detailed { text, .. } => text,
        }
    }
}

impl fmt::Display for QuestionOption {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.text())
    }
}

// ---------------------------------------------------------------------------
// Payloads
// ---------------------------------------------------------------------------

/// Payload of `newQuestion`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewQuestion {
    pub question: Question,
    pub question_number: u32,
    pub total_questions: u32,
    /// Time allowed for this question, in milliseconds.
    #[serde(rename = "timeLimit")]
    pub time_limit_ms: u64,
}

impl NewQuestion {
    /// Whole seconds available for the question (`floor(timeLimit / 1000)`).
    pub fn time_limit_secs(&self) -> u32 {
        u32::try_from(self.time_limit_ms / 1000).unwrap_or(u32::MAX)
    }
}

/// Payload of `answerResult`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AnswerResult {
    pub correct: bool,
    pub correct_answer: String,
    pub question_id: String,
}

/// Payload of `gameEnded`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GameEnded {
    #[serde(default)]
    pub total_questions: u32,
}

// ---------------------------------------------------------------------------
// Events
// ---------------------------------------------------------------------------

/// Events sent from client to server.
///
/// On the wire: `{"event": "answer", "data": {"questionId": ..., ...}}`.
/// `startGame` and `stopGame` carry no `data`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "event",
    content = "data",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum ClientEvent {
    JoinGame {
        user_id: String,
    },
    StartGame,
    StopGame,
    Answer {
        question_id: String,
        user_id: String,
        answer: String,
    },
}

impl ClientEvent {
    /// Protocol name of this event.
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::JoinGame { .. } => JOIN_GAME,
            ClientEvent::StartGame => START_GAME,
            ClientEvent::StopGame => STOP_GAME,
            ClientEvent::Answer { .. } => ANSWER,
        }
    }

    /// Serialize to a wire frame.
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

/// Domain events pushed by the server.
///
/// Clients decode these with [`decode_server_frame`], which is more lenient
/// than the derived `Deserialize` about missing `gameEnded` bodies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    NewQuestion(NewQuestion),
    AnswerResult(AnswerResult),
    GameEnded(GameEnded),
    GameStopped,
}

impl ServerEvent {
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewQuestion(_) => NEW_QUESTION,
            ServerEvent::AnswerResult(_) => ANSWER_RESULT,
            ServerEvent::GameEnded(_) => GAME_ENDED,
            ServerEvent::GameStopped => GAME_STOPPED,
        }
    }

    /// Serialize to a wire frame (used by test peers and server fakes).
    pub fn to_frame(&self) -> Result<String, ProtocolError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ---------------------------------------------------------------------------
// Wire-level parsing
// ---------------------------------------------------------------------------

/// Raw envelope, read before the payload so that an unknown event name and a
/// bad payload are told apart.
#[derive(Debug, Deserialize)]
struct Envelope {
    event: String,
    #[serde(default)]
    data: Value,
}

/// Reasons a frame can be rejected.
#[derive(Debug, Error)]
pub enum ProtocolError {
    #[error("empty frame")]
    Empty,

    #[error("invalid json: {0}")]
    Json(#[from] serde_json::Error),

    #[error("unknown event `{0}`")]
    UnknownEvent(String),

    #[error("invalid `{event}` payload: {source}")]
    Payload {
        event: &'static str,
        source: serde_json::Error,
    },
}

fn payload<T: serde::de::DeserializeOwned>(
    event: &'static str,
    data: Value,
) -> Result<T, ProtocolError> {
    serde_json::from_value(data).map_err(|source| ProtocolError::Payload { event, source })
}

fn non_empty(frame: &str) -> Result<&str, ProtocolError> {
    let trimmed = frame.trim();
    if trimmed.is_empty() {
        return Err(ProtocolError::Empty);
    }
    Ok(trimmed)
}

/// Decode a raw text frame into a [`ServerEvent`].
pub fn decode_server_frame(frame: &str) -> Result<ServerEvent, ProtocolError> {
    let Envelope { event, data } = serde_json::from_str(non_empty(frame)?)?;
    match event.as_str() {
        NEW_QUESTION => payload(NEW_QUESTION, data).map(ServerEvent::NewQuestion),
        ANSWER_RESULT => payload(ANSWER_RESULT, data).map(ServerEvent::AnswerResult),
        GAME_ENDED => {
            // `gameEnded` may arrive without a body.
            let data = if data.is_null() {
                Value::Object(Default::default())
            } else {
                data
            };
            payload(GAME_ENDED, data).map(ServerEvent::GameEnded)
        }
        GAME_STOPPED => Ok(ServerEvent::GameStopped),
        _ => Err(ProtocolError::UnknownEvent(event)),
    }
}

/// Decode a raw text frame into a [`ClientEvent`] (the server's view).
pub fn decode_client_frame(frame: &str) -> Result<ClientEvent, ProtocolError> {
    Ok(serde_json::from_str(non_empty(frame)?)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_new_question_with_string_options() {
        let frame = r#"{"event":"newQuestion","data":{
            "question":{"id":"q1","questionText":"Capital of France?","options":["Paris","Rome"],"correctAnswer":"Paris","active":true},
            "questionNumber":1,"totalQuestions":5,"timeLimit":15000}}"#;

        let ServerEvent::NewQuestion(nq) = decode_server_frame(frame).unwrap() else {
            panic!("expected newQuestion");
        };
        assert_eq!(nq.question.id, "q1");
        assert_eq!(nq.question.prompt(), "Capital of France?");
        assert_eq!(
            nq.question.option_texts().collect::<Vec<_>>(),
            vec!["Paris", "Rome"]
        );
        assert_eq!(nq.question_number, 1);
        assert_eq!(nq.total_questions, 5);
        assert_eq!(nq.time_limit_secs(), 15);
    }

    #[test]
    fn decodes_object_options() {
        let frame = r#"{"event":"newQuestion","data":{
            "question":{"id":"q2","questionImage":"img.png","options":[{"id":"a","text":"Cat","isCorrect":true},{"text":"Dog"}]},
            "questionNumber":2,"totalQuestions":2,"timeLimit":9999}}"#;

        let ServerEvent::NewQuestion(nq) = decode_server_frame(frame).unwrap() else {
            panic!("expected newQuestion");
        };
        assert_eq!(nq.question.prompt(), "img.png");
        assert_eq!(
            nq.question.options[0],
            QuestionOption::Detailed {
                id: Some("a".into()),
                text: "Cat".into(),
                is_correct: Some(true),
            }
        );
        assert_eq!(nq.question.options[1].text(), "Dog");
        // floor(9999 / 1000)
        assert_eq!(nq.time_limit_secs(), 9);
    }

    #[test]
    fn decodes_payloadless_events() {
        assert_eq!(
            decode_server_frame(r#"{"event":"gameStopped"}"#).unwrap(),
            ServerEvent::GameStopped
        );
        assert_eq!(
            decode_server_frame(r#"{"event":"gameEnded"}"#).unwrap(),
            ServerEvent::GameEnded(GameEnded { total_questions: 0 })
        );
        assert_eq!(
            decode_server_frame(r#"{"event":"gameEnded","data":{"totalQuestions":10}}"#).unwrap(),
            ServerEvent::GameEnded(GameEnded {
                total_questions: 10
            })
        );
    }

    #[test]
    fn rejects_malformed_frames() {
        assert!(matches!(decode_server_frame("   "), Err(ProtocolError::Empty)));
        assert!(matches!(
            decode_server_frame("not json"),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            decode_server_frame(r#"{"event":"chat","data":{}}"#),
            Err(ProtocolError::UnknownEvent(name)) if name == "chat"
        ));
        assert!(matches!(
            decode_server_frame(r#"{"event":"answerResult","data":{"correct":true}}"#),
            Err(ProtocolError::Payload { event: ANSWER_RESULT, .. })
        ));
        assert!(matches!(
            decode_server_frame(r#"{"event":"newQuestion"}"#),
            Err(ProtocolError::Payload { event: NEW_QUESTION, .. })
        ));
    }

    #[test]
    fn client_frames_use_camel_case_payloads() {
        let frame = ClientEvent::Answer {
            question_id: "q1".into(),
            user_id: "user_1".into(),
            answer: "Paris".into(),
        }
        .to_frame()
        .unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "answer");
        assert_eq!(value["data"]["questionId"], "q1");
        assert_eq!(value["data"]["userId"], "user_1");
        assert_eq!(value["data"]["answer"], "Paris");

        let frame = ClientEvent::StartGame.to_frame().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "startGame");
        assert!(value.get("data").is_none());
    }

    #[test]
    fn server_decodes_what_client_sends() {
        let sent = ClientEvent::JoinGame {
            user_id: "user_abc".into(),
        };
        assert_eq!(decode_client_frame(&sent.to_frame().unwrap()).unwrap(), sent);
        assert_eq!(
            decode_client_frame(&ClientEvent::StopGame.to_frame().unwrap()).unwrap(),
            ClientEvent::StopGame
        );
    }

    #[test]
    fn client_frames_reject_unknown_events_and_bad_payloads() {
        assert!(matches!(decode_client_frame(""), Err(ProtocolError::Empty)));
        assert!(matches!(
            decode_client_frame(r#"{"event":"chat"}"#),
            Err(ProtocolError::Json(_))
        ));
        assert!(matches!(
            decode_client_frame(r#"{"event":"joinGame","data":{}}"#),
            Err(ProtocolError::Json(_))
        ));
    }

    #[test]
    fn server_frames_decode_through_the_lenient_decoder() {
        let sent = ServerEvent::NewQuestion(NewQuestion {
            question: Question {
                id: "q9".into(),
                question_text: Some("2 + 2?".into()),
                question_image: None,
                options: vec![QuestionOption::Text("4".into())],
                correct_answer: None,
                category_id: None,
            },
            question_number: 3,
            total_questions: 4,
            time_limit_ms: 12_000,
        });
        let frame = sent.to_frame().unwrap();
        let value: Value = serde_json::from_str(&frame).unwrap();
        assert_eq!(value["event"], "newQuestion");
        assert_eq!(value["data"]["timeLimit"], 12_000);
        assert_eq!(decode_server_frame(&frame).unwrap(), sent);

        let frame = ServerEvent::GameStopped.to_frame().unwrap();
        assert_eq!(frame, r#"{"event":"gameStopped"}"#);
        assert_eq!(decode_server_frame(&frame).unwrap(), ServerEvent::GameStopped);
    }
}
