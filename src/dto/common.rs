use serde::Serialize;
use serde_with::skip_serializing_none;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    dto::format_system_time,
    state::{
        room::{QuestionKind, QuestionSnapshot, Room},
        status::RoomStatus,
    },
};

/// Publicly visible room status exposed to clients.
#[derive(Debug, Serialize, ToSchema, Clone, Copy, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RoomStatusDto {
    /// Lobby is open.
    Waiting,
    /// Game started, next question loading.
    InProgress,
    /// A question is open for answers.
    QuestionActive,
    /// Per-question results are displayed.
    ResultsDisplay,
    /// Gap between questions.
    Transition,
    /// Gameplay is paused.
    Paused,
    /// Game is over.
    Finished,
}

impl From<&RoomStatus> for RoomStatusDto {
    fn from(value: &RoomStatus) -> Self {
        match value {
            RoomStatus::Waiting => RoomStatusDto::Waiting,
            RoomStatus::InProgress => RoomStatusDto::InProgress,
            RoomStatus::QuestionActive => RoomStatusDto::QuestionActive,
            RoomStatus::ResultsDisplay => RoomStatusDto::ResultsDisplay,
            RoomStatus::Transition => RoomStatusDto::Transition,
            RoomStatus::Paused { .. } => RoomStatusDto::Paused,
            RoomStatus::Finished => RoomStatusDto::Finished,
        }
    }
}

/// Public projection of a seated player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct PlayerSummary {
    /// User identifier.
    pub user_id: Uuid,
    /// Display name.
    pub username: String,
    /// Avatar identifier.
    pub avatar: String,
    /// Cumulative score.
    pub score: i64,
    /// Consecutive correct answers.
    pub streak: u32,
    /// Lobby readiness flag.
    pub is_ready: bool,
    /// Whether a transport connection is attached.
    pub is_connected: bool,
}

/// Question projection safe to send to players: the correct answer is
/// stripped, only display data remains.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct QuestionPublic {
    /// Question identifier, echoed back in answer submissions.
    pub id: Uuid,
    /// Zero-based position in the question list.
    pub index: usize,
    /// Total number of questions in the game.
    pub total: usize,
    /// Question text.
    pub prompt: String,
    /// Question type discriminator.
    pub question_type: QuestionTypeDto,
    /// Display choices; present for multiple-choice questions only.
    pub choices: Option<Vec<String>>,
    /// Base points for a correct answer.
    pub points: u32,
    /// Seconds allowed to answer.
    pub time_limit_secs: u32,
}

/// Client-facing question type tag.
#[derive(Debug, Clone, Copy, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum QuestionTypeDto {
    /// Pick one choice by index.
    MultipleChoice,
    /// Boolean statement.
    TrueFalse,
    /// Free-text answer.
    TextInput,
    /// Extension type with a canonical answer.
    Canonical,
}

impl QuestionPublic {
    /// Build the public view of a question at `index` out of `total`.
    pub fn from_snapshot(index: usize, total: usize, question: &QuestionSnapshot) -> Self {
        let (question_type, choices) = match &question.kind {
            QuestionKind::MultipleChoice { choices, .. } => {
                (QuestionTypeDto::MultipleChoice, Some(choices.clone()))
            }
            QuestionKind::TrueFalse { .. } => (QuestionTypeDto::TrueFalse, None),
            QuestionKind::TextInput { .. } => (QuestionTypeDto::TextInput, None),
            QuestionKind::Canonical { .. } => (QuestionTypeDto::Canonical, None),
        };

        Self {
            id: question.id,
            index,
            total,
            prompt: question.prompt.clone(),
            question_type,
            choices,
            points: question.points,
            time_limit_secs: question.time_limit_secs,
        }
    }
}

/// Final standing of one player.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RankedPlayer {
    /// User identifier.
    pub user_id: Uuid,
    /// Display name.
    pub username: String,
    /// Final cumulative score.
    pub score: i64,
    /// Rank by descending score (1 = winner).
    pub rank: u32,
}

/// Versioned snapshot of a room returned by every pull action and embedded in
/// push broadcasts.
///
/// Consumers must discard a snapshot whose `version` is lower than one they
/// already applied; that is how out-of-order delivery between the two
/// transports is tolerated.
#[skip_serializing_none]
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct RoomSnapshot {
    /// Game identifier.
    pub game_id: Uuid,
    /// Shareable room code.
    pub room_code: String,
    /// Current host.
    pub host_id: Uuid,
    /// Room status.
    pub status: RoomStatusDto,
    /// Mutation counter; strictly increasing per room.
    pub version: u64,
    /// Seated players in join order.
    pub players: Vec<PlayerSummary>,
    /// Current question; present while one is active or being reviewed.
    pub question: Option<QuestionPublic>,
    /// Players that already answered the current question.
    pub answered: Vec<Uuid>,
    /// Final standings; present once the room is finished.
    pub results: Option<Vec<RankedPlayer>>,
    /// RFC 3339 timestamp of the last mutation.
    pub last_activity: String,
}

impl From<&Room> for RoomSnapshot {
    fn from(room: &Room) -> Self {
        let question = match &room.status {
            RoomStatus::QuestionActive | RoomStatus::ResultsDisplay => {
                room.current_question().map(|q| {
                    QuestionPublic::from_snapshot(
                        room.current_question_index,
                        room.questions.len(),
                        q,
                    )
                })
            }
            _ => None,
        };

        let results = room.status.is_finished().then(|| {
            room.final_ranking()
                .into_iter()
                .map(|result| RankedPlayer {
                    user_id: result.player_id,
                    username: room
                        .players
                        .get(&result.player_id)
                        .map(|player| player.username.clone())
                        .unwrap_or_default(),
                    score: result.score,
                    rank: result.rank,
                })
                .collect()
        });

        Self {
            game_id: room.game_id,
            room_code: room.room_code.clone(),
            host_id: room.host_id,
            status: (&room.status).into(),
            version: room.version,
            players: room
                .players
                .iter()
                .map(|(id, player)| PlayerSummary {
                    user_id: *id,
                    username: player.username.clone(),
                    avatar: player.avatar.clone(),
                    score: player.score,
                    streak: player.streak,
                    is_ready: player.is_ready,
                    is_connected: player.is_connected,
                })
                .collect(),
            question,
            answered: room.answers.keys().copied().collect(),
            results,
            last_activity: format_system_time(room.last_activity),
        }
    }
}
