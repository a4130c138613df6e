//! (De)serialization boundary between the in-memory [`Room`] and its cached
//! JSON snapshot.
//!
//! The cache wire format flattens the `players` and `answers` maps into plain
//! ordered entry lists; the room model itself always works with keyed maps.
//! Call sites never touch [`CachedRoom`] directly.

use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::state::room::{PendingAnswer, QuestionSnapshot, Room, RoomPlayer};
use crate::state::status::RoomStatus;

/// Wire representation of a room as stored in the ephemeral cache.
#[derive(Debug, Serialize, Deserialize)]
struct CachedRoom {
    game_id: Uuid,
    room_code: String,
    host_id: Uuid,
    players: Vec<(Uuid, RoomPlayer)>,
    status: RoomStatus,
    current_question_index: usize,
    questions: Vec<QuestionSnapshot>,
    answers: Vec<(Uuid, PendingAnswer)>,
    version: u64,
    last_activity: SystemTime,
    question_opened_at: Option<SystemTime>,
}

impl From<&Room> for CachedRoom {
    fn from(room: &Room) -> Self {
        Self {
            game_id: room.game_id,
            room_code: room.room_code.clone(),
            host_id: room.host_id,
            players: room
                .players
                .iter()
                .map(|(id, player)| (*id, player.clone()))
                .collect(),
            status: room.status.clone(),
            current_question_index: room.current_question_index,
            questions: room.questions.clone(),
            answers: room
                .answers
                .iter()
                .map(|(id, answer)| (*id, answer.clone()))
                .collect(),
            version: room.version,
            last_activity: room.last_activity,
            question_opened_at: room.question_opened_at,
        }
    }
}

impl From<CachedRoom> for Room {
    fn from(cached: CachedRoom) -> Self {
        Self {
            game_id: cached.game_id,
            room_code: cached.room_code,
            host_id: cached.host_id,
            players: cached.players.into_iter().collect(),
            status: cached.status,
            current_question_index: cached.current_question_index,
            questions: cached.questions,
            answers: cached.answers.into_iter().collect(),
            version: cached.version,
            last_activity: cached.last_activity,
            question_opened_at: cached.question_opened_at,
        }
    }
}

/// Serialize a room into its cache snapshot.
pub fn encode(room: &Room) -> serde_json::Result<String> {
    serde_json::to_string(&CachedRoom::from(room))
}

/// Reconstruct a room from a cache snapshot.
pub fn decode(raw: &str) -> serde_json::Result<Room> {
    serde_json::from_str::<CachedRoom>(raw).map(Into::into)
}
