//! Push event construction and fan-out.
//!
//! Every push frame is an envelope `{"event", "version", "payload"}` where
//! `version` is the room's mutation counter at the time the frame was built.
//! Clients apply frames in version order and discard anything older than the
//! last snapshot they hold, which makes delivery across the two transports
//! safe to interleave.

use serde::Serialize;
use serde_json::json;
use tracing::warn;
use uuid::Uuid;

use crate::{
    dto::common::{QuestionPublic, RankedPlayer, RoomSnapshot},
    state::{RoomHub, room::Room},
};

/// Full room snapshot; sent after joins, status changes and reconnections.
pub const EVENT_ROOM_STATE: &str = "room_state";
/// A question just opened for answers.
pub const EVENT_NEW_QUESTION: &str = "new_question";
/// A player answered the current question (no correctness revealed).
pub const EVENT_PLAYER_ANSWERED: &str = "player_answered";
/// The current question resolved; per-question results attached.
pub const EVENT_ROUND_RESULTS: &str = "round_results";
/// The game finished; final standings attached.
pub const EVENT_GAME_ENDED: &str = "game_ended";
/// A player lost their transport connection; grace period running.
pub const EVENT_PLAYER_DISCONNECTED: &str = "player_disconnected";
/// A disconnected player reattached within the grace period.
pub const EVENT_PLAYER_RECONNECTED: &str = "player_reconnected";
/// The host role moved to another player.
pub const EVENT_HOST_TRANSFERRED: &str = "host_transferred";
/// A chat message relayed to the room.
pub const EVENT_CHAT_MESSAGE: &str = "chat_message";
/// An emoji reaction relayed to the room.
pub const EVENT_REACTION: &str = "reaction";
/// A player activated a power-up.
pub const EVENT_POWER_UP_ACTIVATED: &str = "power_up_activated";

fn envelope(event: &str, version: u64, payload: impl Serialize) -> Option<String> {
    match serde_json::to_value(payload) {
        Ok(payload) => Some(
            json!({
                "event": event,
                "version": version,
                "payload": payload,
            })
            .to_string(),
        ),
        Err(err) => {
            // A non-serializable payload is a programming error; dropping the
            // frame is safer than tearing down the room.
            warn!(event, "failed to serialize push payload: {err}");
            None
        }
    }
}

fn send(hub: &RoomHub, frame: Option<String>) {
    if let Some(frame) = frame {
        hub.broadcast(frame);
    }
}

/// Broadcast a full room snapshot.
pub fn broadcast_room_state(hub: &RoomHub, room: &Room) {
    let snapshot = RoomSnapshot::from(room);
    send(hub, envelope(EVENT_ROOM_STATE, room.version, snapshot));
}

/// Broadcast a newly opened question, stripped of its correct answer.
pub fn broadcast_new_question(hub: &RoomHub, room: &Room) {
    let Some(question) = room.current_question() else {
        return;
    };
    let payload =
        QuestionPublic::from_snapshot(room.current_question_index, room.questions.len(), question);
    send(hub, envelope(EVENT_NEW_QUESTION, room.version, payload));
}

/// Broadcast that a player answered, without revealing correctness.
pub fn broadcast_player_answered(hub: &RoomHub, room: &Room, player_id: Uuid) {
    send(
        hub,
        envelope(
            EVENT_PLAYER_ANSWERED,
            room.version,
            json!({
                "player_id": player_id,
                "answered_count": room.answers.len(),
                "player_count": room.players.len(),
            }),
        ),
    );
}

/// Per-player outcome revealed when a round resolves.
#[derive(Debug, Clone, Serialize)]
pub struct RoundOutcome {
    /// Player the outcome belongs to.
    pub player_id: Uuid,
    /// Whether the answer was correct.
    pub correct: bool,
    /// Points awarded for this question.
    pub points_earned: u32,
    /// Cumulative score after the question.
    pub score: i64,
    /// Streak after the question.
    pub streak: u32,
}

/// Broadcast the resolved results of the current question.
pub fn broadcast_round_results(hub: &RoomHub, room: &Room, outcomes: &[RoundOutcome]) {
    send(
        hub,
        envelope(
            EVENT_ROUND_RESULTS,
            room.version,
            json!({
                "question_index": room.current_question_index,
                "outcomes": outcomes,
            }),
        ),
    );
}

/// Broadcast the final standings of a finished game.
pub fn broadcast_game_ended(hub: &RoomHub, room: &Room, results: &[RankedPlayer]) {
    send(
        hub,
        envelope(
            EVENT_GAME_ENDED,
            room.version,
            json!({ "results": results }),
        ),
    );
}

/// Broadcast that a player disconnected and their grace period started.
pub fn broadcast_player_disconnected(hub: &RoomHub, room: &Room, player_id: Uuid) {
    send(
        hub,
        envelope(
            EVENT_PLAYER_DISCONNECTED,
            room.version,
            json!({ "player_id": player_id }),
        ),
    );
}

/// Broadcast that a player reattached within their grace period.
pub fn broadcast_player_reconnected(hub: &RoomHub, room: &Room, player_id: Uuid) {
    send(
        hub,
        envelope(
            EVENT_PLAYER_RECONNECTED,
            room.version,
            json!({ "player_id": player_id }),
        ),
    );
}

/// Broadcast a host transfer.
pub fn broadcast_host_transferred(hub: &RoomHub, room: &Room, new_host: Uuid) {
    send(
        hub,
        envelope(
            EVENT_HOST_TRANSFERRED,
            room.version,
            json!({ "host_id": new_host }),
        ),
    );
}

/// Relay a chat message to the room.
pub fn broadcast_chat_message(hub: &RoomHub, room: &Room, player_id: Uuid, message: &str) {
    send(
        hub,
        envelope(
            EVENT_CHAT_MESSAGE,
            room.version,
            json!({
                "player_id": player_id,
                "message": message,
            }),
        ),
    );
}

/// Relay an emoji reaction to the room.
pub fn broadcast_reaction(hub: &RoomHub, room: &Room, player_id: Uuid, emoji: &str) {
    send(
        hub,
        envelope(
            EVENT_REACTION,
            room.version,
            json!({
                "player_id": player_id,
                "emoji": emoji,
            }),
        ),
    );
}

/// Broadcast a power-up activation.
pub fn broadcast_power_up_activated(hub: &RoomHub, room: &Room, player_id: Uuid, kind: &str) {
    send(
        hub,
        envelope(
            EVENT_POWER_UP_ACTIVATED,
            room.version,
            json!({
                "player_id": player_id,
                "kind": kind,
            }),
        ),
    );
}
