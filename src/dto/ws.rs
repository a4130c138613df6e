use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{dao::models::AnswerValue, dto::room::PowerUpKindDto};

/// Messages a client may send over the WebSocket transport.
///
/// Every frame carries a `type` discriminator. Frames with an unrecognized
/// type deserialize to [`ClientMessage::Unknown`] and are ignored, so newer
/// clients can talk to older servers without tearing down the socket.
#[derive(Debug, Deserialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ClientMessage {
    /// First frame on every socket: binds the connection to a player seat.
    Identify {
        /// Room code to attach to.
        room_code: String,
        /// Authenticated user identifier.
        user_id: Uuid,
        /// Display name, used when joining a room for the first time.
        username: String,
        /// Avatar identifier.
        #[serde(default)]
        avatar: String,
    },
    /// Submit an answer for the current question.
    Answer {
        /// Question being answered.
        question_id: Uuid,
        /// Submitted value; `null` marks a time-up submission.
        #[schema(value_type = Option<Object>)]
        answer: Option<AnswerValue>,
        /// Milliseconds between question display and submission.
        time_spent_ms: u64,
    },
    /// Toggle lobby readiness on.
    Ready,
    /// Host only: start the game.
    Start,
    /// Host only: advance past the current question or results screen.
    Advance,
    /// Host only: pause gameplay.
    Pause,
    /// Host only: resume gameplay.
    Resume,
    /// Relay a chat message to the room.
    Chat {
        /// Message body.
        message: String,
    },
    /// Relay an emoji reaction to the room.
    Reaction {
        /// Reaction emoji or shortcode.
        emoji: String,
    },
    /// Activate a power-up.
    UsePowerUp {
        /// Power-up to activate.
        kind: PowerUpKindDto,
    },
    /// Leave the room permanently; skips the reconnection grace period.
    Leave,
    /// Forward-compatibility catch-all for unrecognized frames.
    #[serde(other)]
    Unknown,
}

/// Per-socket reply frames, sent to one connection rather than broadcast.
#[derive(Debug, Serialize, ToSchema)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum SocketReply {
    /// Identification accepted; the socket is now bound to a seat.
    Identified {
        /// Game the socket is attached to.
        game_id: Uuid,
        /// Seat the socket is bound to.
        user_id: Uuid,
    },
    /// Private outcome of the submitter's own answer; correctness is never
    /// broadcast while the round is still open.
    AnswerResult {
        /// Whether the answer was correct.
        correct: bool,
        /// Points awarded, bonuses included.
        points_earned: u32,
        /// Cumulative score after the answer.
        score: i64,
        /// Streak after the answer.
        streak: u32,
        /// Whether this submission completed the round.
        round_complete: bool,
    },
    /// An inbound frame was rejected.
    Error {
        /// Human-readable reason.
        message: String,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identify_frame_parses() {
        let raw = r#"{"type":"identify","room_code":"K9X2PM","user_id":"6f7a1a2e-8a30-4f2e-9f5e-0c1d2e3f4a5b","username":"ada"}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::Identify {
                room_code,
                username,
                avatar,
                ..
            } => {
                assert_eq!(room_code, "K9X2PM");
                assert_eq!(username, "ada");
                assert!(avatar.is_empty());
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_answer_frame_allows_null_answer() {
        let raw = r#"{"type":"answer","question_id":"6f7a1a2e-8a30-4f2e-9f5e-0c1d2e3f4a5b","answer":null,"time_spent_ms":15000}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        match msg {
            ClientMessage::Answer {
                answer,
                time_spent_ms,
                ..
            } => {
                assert!(answer.is_none());
                assert_eq!(time_spent_ms, 15000);
            }
            other => panic!("unexpected message: {other:?}"),
        }
    }

    #[test]
    fn test_unknown_frame_is_tolerated() {
        let raw = r#"{"type":"telemetry","payload":{}}"#;
        let msg: ClientMessage = serde_json::from_str(raw).unwrap();
        assert!(matches!(msg, ClientMessage::Unknown));
    }
}
