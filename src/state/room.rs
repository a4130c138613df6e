use std::time::SystemTime;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::dao::models::{
    AnswerValue, GameEntity, GameStatusEntity, PlayerEntity, PlayerResultEntity, QuestionEntity,
    QuestionKindEntity,
};
use crate::state::status::{InvalidTransition, RoomEvent, RoomStatus};

/// Player info tracked inside a live room.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RoomPlayer {
    /// Display name chosen by the user.
    pub username: String,
    /// Avatar identifier (opaque to this service).
    pub avatar: String,
    /// Cumulative score for this game.
    pub score: i64,
    /// Consecutive correct answers; reset to zero on a miss.
    pub streak: u32,
    /// Whether the player marked themselves ready in the lobby.
    pub is_ready: bool,
    /// Whether a transport connection is currently attached.
    pub is_connected: bool,
}

impl From<PlayerEntity> for RoomPlayer {
    fn from(value: PlayerEntity) -> Self {
        Self {
            username: value.username,
            avatar: value.avatar,
            score: value.score,
            streak: 0,
            is_ready: false,
            is_connected: false,
        }
    }
}

/// Answer noted in the room for the current question, pending round resolution.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct PendingAnswer {
    /// Question the answer was submitted for.
    pub question_id: Uuid,
    /// Submitted value; `None` for a time-up submission.
    pub answer: Option<AnswerValue>,
    /// Milliseconds the player spent before submitting.
    pub time_spent_ms: u64,
    /// Whether the answer matched the stored correct answer.
    pub is_correct: bool,
    /// Points awarded for this answer, bonuses included.
    pub points_earned: u32,
    /// Server-side submission timestamp.
    pub submitted_at: SystemTime,
}

/// Kind-specific payload of a question held in a room snapshot.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum QuestionKind {
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
    /// Free-text answer matched against accepted strings.
    TextInput {
        /// Accepted answers, compared case-insensitively after trimming.
        accepted: Vec<String>,
    },
    /// Extension types with a single canonical answer.
    Canonical {
        /// Exact expected answer.
        answer: String,
    },
}

impl From<QuestionKindEntity> for QuestionKind {
    fn from(value: QuestionKindEntity) -> Self {
        match value {
            QuestionKindEntity::MultipleChoice {
                choices,
                correct_index,
            } => QuestionKind::MultipleChoice {
                choices,
                correct_index,
            },
            QuestionKindEntity::TrueFalse { correct } => QuestionKind::TrueFalse { correct },
            QuestionKindEntity::TextInput { accepted } => QuestionKind::TextInput { accepted },
            QuestionKindEntity::Canonical { answer } => QuestionKind::Canonical { answer },
        }
    }
}

/// Immutable snapshot of one question, fixed once the game starts.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct QuestionSnapshot {
    /// Primary key of the question.
    pub id: Uuid,
    /// Question text shown to players.
    pub prompt: String,
    /// Kind-specific payload, including the correct answer.
    pub kind: QuestionKind,
    /// Base points awarded for a correct answer.
    pub points: u32,
    /// Time allowed to answer, in seconds.
    pub time_limit_secs: u32,
}

impl From<QuestionEntity> for QuestionSnapshot {
    fn from(value: QuestionEntity) -> Self {
        Self {
            id: value.id,
            prompt: value.prompt,
            kind: value.kind.into(),
            points: value.points,
            time_limit_secs: value.time_limit_secs,
        }
    }
}

/// Authoritative in-memory representation of one active game room.
///
/// Exactly one instance exists per game id within a process; every mutation
/// goes through the room coordinator, which bumps `version` and mirrors the
/// result to the ephemeral cache.
#[derive(Debug, Clone)]
pub struct Room {
    /// Primary key of the underlying game.
    pub game_id: Uuid,
    /// Six-character shareable room code.
    pub room_code: String,
    /// User currently holding the host role; always a member of `players`.
    pub host_id: Uuid,
    /// Seated players keyed by user id; insertion order is join order.
    pub players: IndexMap<Uuid, RoomPlayer>,
    /// Lifecycle status.
    pub status: RoomStatus,
    /// Cursor into `questions`; monotonically non-decreasing.
    pub current_question_index: usize,
    /// Ordered question snapshots, immutable once the game starts.
    pub questions: Vec<QuestionSnapshot>,
    /// Answers noted for the current question; cleared when a question opens.
    pub answers: IndexMap<Uuid, PendingAnswer>,
    /// Monotonically incrementing counter bumped on every mutation, used by
    /// consumers to discard stale broadcasts.
    pub version: u64,
    /// Timestamp of the last mutation, used for idle expiry.
    pub last_activity: SystemTime,
    /// When the current question opened; `None` outside `QuestionActive`.
    pub question_opened_at: Option<SystemTime>,
}

impl Room {
    /// Rebuild a room from durable records on cold start.
    pub fn from_storage(
        game: GameEntity,
        players: Vec<PlayerEntity>,
        questions: Vec<QuestionEntity>,
    ) -> Self {
        let status = match game.status {
            GameStatusEntity::Waiting => RoomStatus::Waiting,
            GameStatusEntity::InProgress => RoomStatus::InProgress,
            GameStatusEntity::Finished => RoomStatus::Finished,
        };

        Self {
            game_id: game.id,
            room_code: game.room_code,
            host_id: game.host_id,
            players: players
                .into_iter()
                .map(|player| (player.user_id, player.into()))
                .collect(),
            status,
            current_question_index: 0,
            questions: questions.into_iter().map(Into::into).collect(),
            answers: IndexMap::new(),
            version: 1,
            last_activity: SystemTime::now(),
            question_opened_at: None,
        }
    }

    /// The question the cursor currently points at.
    pub fn current_question(&self) -> Option<&QuestionSnapshot> {
        self.questions.get(self.current_question_index)
    }

    /// True when exactly one player is seated.
    pub fn is_solo(&self) -> bool {
        self.players.len() == 1
    }

    /// True when more questions remain after the current one.
    pub fn has_next_question(&self) -> bool {
        self.current_question_index + 1 < self.questions.len()
    }

    /// Apply a status event, rejecting transitions not in the table.
    pub fn apply_status(&mut self, event: RoomEvent) -> Result<(), InvalidTransition> {
        self.status = self.status.apply(event)?;
        Ok(())
    }

    /// Advance the cursor to the next question and reset per-question state.
    ///
    /// Callers must have checked [`Room::has_next_question`] first.
    pub fn open_next_question(&mut self) {
        self.current_question_index += 1;
        self.answers.clear();
        self.question_opened_at = Some(SystemTime::now());
    }

    /// Reset per-question state when the first question opens.
    pub fn open_first_question(&mut self) {
        self.current_question_index = 0;
        self.answers.clear();
        self.question_opened_at = Some(SystemTime::now());
    }

    /// Final ranking by descending score, ties broken by join order.
    pub fn final_ranking(&self) -> Vec<PlayerResultEntity> {
        let mut ranked: Vec<(Uuid, i64)> = self
            .players
            .iter()
            .map(|(id, player)| (*id, player.score))
            .collect();
        // Stable sort preserves join order among equal scores.
        ranked.sort_by_key(|(_, score)| std::cmp::Reverse(*score));

        ranked
            .into_iter()
            .enumerate()
            .map(|(index, (player_id, score))| PlayerResultEntity {
                player_id,
                score,
                rank: index as u32 + 1,
            })
            .collect()
    }

    /// Remove a player, transferring the host role if needed.
    ///
    /// Returns the new host id when a transfer happened, `None` otherwise.
    /// Removing an unknown player is a no-op.
    pub fn remove_player(&mut self, player_id: Uuid) -> Option<Uuid> {
        if self.players.shift_remove(&player_id).is_none() {
            return None;
        }
        self.answers.shift_remove(&player_id);

        if self.host_id == player_id {
            if let Some((&next_host, _)) = self.players.first() {
                self.host_id = next_host;
                return Some(next_host);
            }
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn player(name: &str, score: i64) -> RoomPlayer {
        RoomPlayer {
            username: name.into(),
            avatar: "owl".into(),
            score,
            streak: 0,
            is_ready: true,
            is_connected: true,
        }
    }

    fn room_with_players(entries: Vec<(Uuid, RoomPlayer)>) -> Room {
        let host_id = entries[0].0;
        Room {
            game_id: Uuid::new_v4(),
            room_code: "K9X2PM".into(),
            host_id,
            players: entries.into_iter().collect(),
            status: RoomStatus::QuestionActive,
            current_question_index: 0,
            questions: Vec::new(),
            answers: IndexMap::new(),
            version: 1,
            last_activity: SystemTime::now(),
            question_opened_at: Some(SystemTime::now()),
        }
    }

    #[test]
    fn ranking_breaks_ties_by_join_order() {
        let first = Uuid::new_v4();
        let second = Uuid::new_v4();
        let third = Uuid::new_v4();
        let room = room_with_players(vec![
            (first, player("ada", 200)),
            (second, player("bo", 350)),
            (third, player("cy", 200)),
        ]);

        let ranking = room.final_ranking();
        assert_eq!(ranking[0].player_id, second);
        assert_eq!(ranking[0].rank, 1);
        assert_eq!(ranking[1].player_id, first);
        assert_eq!(ranking[1].rank, 2);
        assert_eq!(ranking[2].player_id, third);
        assert_eq!(ranking[2].rank, 3);
    }

    #[test]
    fn removing_the_host_transfers_to_next_join_order_player() {
        let host = Uuid::new_v4();
        let second = Uuid::new_v4();
        let mut room = room_with_players(vec![
            (host, player("host", 0)),
            (second, player("next", 0)),
        ]);

        let transferred = room.remove_player(host);
        assert_eq!(transferred, Some(second));
        assert_eq!(room.host_id, second);
    }

    #[test]
    fn removing_a_non_member_is_a_no_op() {
        let host = Uuid::new_v4();
        let mut room = room_with_players(vec![(host, player("host", 0))]);
        let before = room.players.len();

        assert_eq!(room.remove_player(Uuid::new_v4()), None);
        assert_eq!(room.players.len(), before);
        assert_eq!(room.host_id, host);
    }
}
