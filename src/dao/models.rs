use serde::{Deserialize, Serialize};
use std::time::SystemTime;
use uuid::Uuid;

/// Coarse lifecycle status persisted for a game record.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum GameStatusEntity {
    /// Lobby is open, players can still join.
    Waiting,
    /// Questions are being played.
    InProgress,
    /// Final ranks have been written; the game is immutable.
    Finished,
}

/// Aggregate game entity persisted by the storage layer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GameEntity {
    /// Primary key of the game.
    pub id: Uuid,
    /// Six-character shareable room code, unique among live games.
    pub room_code: String,
    /// User currently holding the host role.
    pub host_id: Uuid,
    /// Coarse status mirrored into the live room on cold start.
    pub status: GameStatusEntity,
    /// Creation timestamp for auditing/debugging.
    pub created_at: SystemTime,
    /// Last time the game entity was updated.
    pub updated_at: SystemTime,
}

/// Seated player row for a game (one per user per game).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerEntity {
    /// User identifier, unique within a game.
    pub user_id: Uuid,
    /// Display name chosen by the user.
    pub username: String,
    /// Avatar identifier picked by the user (opaque to this service).
    pub avatar: String,
    /// Cumulative score across all answered questions.
    pub score: i64,
    /// Final rank, written once when the game finishes.
    pub rank: Option<u32>,
}

/// Kind-specific payload of a question, including the correct answer.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKindEntity {
    /// Pick one choice by index.
    MultipleChoice {
        /// Display choices in presentation order.
        choices: Vec<String>,
        /// Index into `choices` of the correct answer.
        correct_index: u32,
    },
    /// Boolean statement.
    TrueFalse {
        /// Whether the statement is true.
        correct: bool,
    },
    /// Free-text answer matched against a set of accepted strings.
    TextInput {
        /// Accepted answers, compared case-insensitively after trimming.
        accepted: Vec<String>,
    },
    /// Fallback for extension question types with a single canonical answer.
    Canonical {
        /// Exact expected answer.
        answer: String,
    },
}

/// Question snapshot persisted for a game, ordered by `position`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionEntity {
    /// Primary key of the question.
    pub id: Uuid,
    /// Zero-based position inside the game's ordered question list.
    pub position: u32,
    /// Question text shown to players.
    pub prompt: String,
    /// Kind-specific payload, including the correct answer.
    pub kind: QuestionKindEntity,
    /// Base points awarded for a correct answer.
    pub points: u32,
    /// Time allowed to answer, in seconds.
    pub time_limit_secs: u32,
}

/// Raw answer value as submitted by a client.
///
/// Untagged so clients can send the natural JSON type for each question kind:
/// a number for multiple choice, a boolean for true/false, a string otherwise.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(untagged)]
pub enum AnswerValue {
    /// Choice index for multiple-choice questions.
    Choice(u32),
    /// Boolean for true/false questions.
    Flag(bool),
    /// Free text for text-input and canonical questions.
    Text(String),
}

/// Immutable answer record written exactly once per (player, question).
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AnswerRecordEntity {
    /// Game the answer belongs to.
    pub game_id: Uuid,
    /// Player who submitted the answer.
    pub player_id: Uuid,
    /// Question being answered.
    pub question_id: Uuid,
    /// Submitted value; `None` for a time-up submission.
    pub answer: Option<AnswerValue>,
    /// Whether the answer matched the stored correct answer.
    pub is_correct: bool,
    /// Points awarded for this answer, bonuses included.
    pub points_earned: u32,
    /// Milliseconds between question open and submission.
    pub time_spent_ms: u64,
    /// Server-side timestamp of the durable write.
    pub created_at: SystemTime,
}

/// Final per-player result written when a game finishes.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PlayerResultEntity {
    /// Player the result belongs to.
    pub player_id: Uuid,
    /// Final cumulative score.
    pub score: i64,
    /// Rank by descending score, ties broken by join order (1 = winner).
    pub rank: u32,
}
