//! Room coordination: creation, lookup, joining and serialized mutation.
//!
//! Exactly one authoritative [`Room`] exists per game id in the process,
//! guarded by an async mutex. Every mutation goes through [`mutate`], which
//! validates and applies under the lock, bumps the room version and mirrors
//! the result to the ephemeral cache best-effort. Cache writes never block
//! gameplay and cache failures are logged at debug level only.

use std::sync::Arc;
use std::time::{Duration, SystemTime};

use rand::Rng;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    cache::{codec, room_key},
    dao::models::{GameEntity, GameStatusEntity, PlayerEntity, QuestionEntity, QuestionKindEntity},
    dto::{
        common::RoomSnapshot,
        room::{CreateGameRequest, GameCreatedResponse, JoinRoomRequest, QuestionKindInput},
        validation::validate_room_code,
    },
    error::ServiceError,
    services::{answer_service, room_events},
    state::{
        SharedState,
        room::{Room, RoomPlayer},
        status::RoomStatus,
    },
};

/// Characters allowed in a room code. No lowercase and no punctuation so the
/// code survives being read out loud.
const ROOM_CODE_ALPHABET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
/// Length of a room code.
const ROOM_CODE_LEN: usize = 6;
/// Attempts at finding an unused room code before giving up.
const ROOM_CODE_ATTEMPTS: usize = 8;

/// Interval between idle-room reaper sweeps.
const REAPER_INTERVAL: Duration = Duration::from_secs(60);

/// Generate a random room code from a CSPRNG.
///
/// 36^6 combinations make collisions unlikely; [`create_game`] still checks
/// for one before committing.
pub fn generate_room_code() -> String {
    let mut rng = rand::rng();
    (0..ROOM_CODE_LEN)
        .map(|_| ROOM_CODE_ALPHABET[rng.random_range(0..ROOM_CODE_ALPHABET.len())] as char)
        .collect()
}

/// Create a new game with its question list and a fresh room code.
pub async fn create_game(
    state: &SharedState,
    request: CreateGameRequest,
) -> Result<GameCreatedResponse, ServiceError> {
    let store = state.require_game_store().await?;

    let mut room_code = None;
    for _ in 0..ROOM_CODE_ATTEMPTS {
        let candidate = generate_room_code();
        if store.find_game_by_code(candidate.clone()).await?.is_none() {
            room_code = Some(candidate);
            break;
        }
    }
    let room_code = room_code.ok_or_else(|| {
        ServiceError::Conflict("could not allocate an unused room code".into())
    })?;

    let game_id = Uuid::new_v4();
    let now = SystemTime::now();
    store
        .insert_game(GameEntity {
            id: game_id,
            room_code: room_code.clone(),
            host_id: request.host_id,
            status: GameStatusEntity::Waiting,
            created_at: now,
            updated_at: now,
        })
        .await?;

    let questions = request
        .questions
        .into_iter()
        .enumerate()
        .map(|(position, input)| QuestionEntity {
            id: Uuid::new_v4(),
            position: position as u32,
            prompt: input.prompt,
            kind: match input.kind {
                QuestionKindInput::MultipleChoice {
                    choices,
                    correct_index,
                } => QuestionKindEntity::MultipleChoice {
                    choices,
                    correct_index,
                },
                QuestionKindInput::TrueFalse { correct } => {
                    QuestionKindEntity::TrueFalse { correct }
                }
                QuestionKindInput::TextInput { accepted } => {
                    QuestionKindEntity::TextInput { accepted }
                }
                QuestionKindInput::Canonical { answer } => {
                    QuestionKindEntity::Canonical { answer }
                }
            },
            points: input.points,
            time_limit_secs: input.time_limit_secs,
        })
        .collect();
    store.insert_questions(game_id, questions).await?;

    info!(%game_id, room_code, "created game");
    Ok(GameCreatedResponse { game_id, room_code })
}

/// Resolve a room code to a game id.
///
/// Codes are normalized to uppercase first; the in-process index is consulted
/// before falling back to durable storage.
pub async fn resolve_room_code(state: &SharedState, code: &str) -> Result<Uuid, ServiceError> {
    let code = code.trim().to_ascii_uppercase();
    validate_room_code(&code)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;

    if let Some(game_id) = state.room_codes().get(&code) {
        return Ok(*game_id);
    }

    let store = state.require_game_store().await?;
    let game = store
        .find_game_by_code(code.clone())
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no room with code {code}")))?;
    Ok(game.id)
}

/// Fetch the live room for a game, restoring it if the process does not hold
/// it yet.
///
/// Restore order: in-process registry, then the ephemeral cache, then a full
/// rebuild from durable storage. Concurrent callers converge on a single
/// instance through the registry's entry lock.
pub async fn get_or_create_room(
    state: &SharedState,
    game_id: Uuid,
) -> Result<Arc<Mutex<Room>>, ServiceError> {
    if let Some(existing) = state.rooms().get(&game_id) {
        return Ok(existing.clone());
    }

    let restored = match restore_from_cache(state, game_id).await {
        Some(room) => room,
        None => rebuild_from_storage(state, game_id).await?,
    };

    let room_code = restored.room_code.clone();
    let handle = state
        .rooms()
        .entry(game_id)
        .or_insert_with(|| Arc::new(Mutex::new(restored)))
        .clone();
    state.room_codes().insert(room_code, game_id);
    Ok(handle)
}

async fn restore_from_cache(state: &SharedState, game_id: Uuid) -> Option<Room> {
    let cache = state.room_cache().await?;
    match cache.get(room_key(game_id)).await {
        Ok(Some(raw)) => match codec::decode(&raw) {
            Ok(room) => {
                debug!(%game_id, "restored room from cache");
                Some(room)
            }
            Err(err) => {
                warn!(%game_id, "discarding undecodable cached room: {err}");
                None
            }
        },
        Ok(None) => None,
        Err(err) => {
            debug!(%game_id, "cache read failed, rebuilding from storage: {err}");
            None
        }
    }
}

async fn rebuild_from_storage(state: &SharedState, game_id: Uuid) -> Result<Room, ServiceError> {
    let store = state.require_game_store().await?;
    let game = store
        .find_game(game_id)
        .await?
        .ok_or_else(|| ServiceError::NotFound(format!("no game {game_id}")))?;
    let players = store.find_players(game_id).await?;
    let questions = store.find_questions(game_id).await?;
    debug!(%game_id, "rebuilt room from durable storage");
    Ok(Room::from_storage(game, players, questions))
}

/// Apply a mutation to a room under its lock.
///
/// The closure must validate before touching the room and leave it untouched
/// on error; on success the version is bumped, the activity timestamp is
/// refreshed and a consistent snapshot pair (cache JSON + client snapshot) is
/// taken before the lock is released. The cache mirror happens after the lock
/// drops and its failure is swallowed.
pub async fn mutate<T>(
    state: &SharedState,
    game_id: Uuid,
    apply: impl FnOnce(&mut Room) -> Result<T, ServiceError>,
) -> Result<(T, RoomSnapshot), ServiceError> {
    let handle = state
        .rooms()
        .get(&game_id)
        .map(|entry| entry.clone())
        .ok_or_else(|| ServiceError::NotFound(format!("no live room for game {game_id}")))?;

    let (value, snapshot, encoded) = {
        let mut room = handle.lock().await;
        let value = apply(&mut room)?;
        room.version += 1;
        room.last_activity = SystemTime::now();
        let snapshot = RoomSnapshot::from(&*room);
        let encoded = codec::encode(&room).ok();
        (value, snapshot, encoded)
    };

    if let Some(encoded) = encoded {
        mirror_to_cache(state, game_id, encoded).await;
    }
    Ok((value, snapshot))
}

async fn mirror_to_cache(state: &SharedState, game_id: Uuid, encoded: String) {
    let Some(cache) = state.room_cache().await else {
        return;
    };
    let ttl = state.config().room_ttl_secs;
    if let Err(err) = cache.set_with_ttl(room_key(game_id), encoded, ttl).await {
        debug!(%game_id, "cache mirror failed: {err}");
    }
}

/// Join a room (or rejoin an existing seat) identified by its code.
///
/// Joining is idempotent for an already seated player. New seats are only
/// handed out while the lobby is open and below the player cap; the seat is
/// persisted before it becomes visible to other players.
pub async fn join_room(
    state: &SharedState,
    room_code: &str,
    request: JoinRoomRequest,
) -> Result<RoomSnapshot, ServiceError> {
    let game_id = resolve_room_code(state, room_code).await?;
    let handle = get_or_create_room(state, game_id).await?;

    // Validate and persist before the seat is made visible; a storage failure
    // here leaves the room untouched.
    {
        let room = handle.lock().await;
        if room.status.is_finished() {
            return Err(ServiceError::Conflict("this game already finished".into()));
        }
        if !room.players.contains_key(&request.user_id) {
            if room.status != RoomStatus::Waiting {
                return Err(ServiceError::Conflict(
                    "this game already started".into(),
                ));
            }
            if room.players.len() >= state.config().max_players {
                return Err(ServiceError::Conflict("room is full".into()));
            }
        }
    }

    let store = state.require_game_store().await?;
    store
        .upsert_player(
            game_id,
            PlayerEntity {
                user_id: request.user_id,
                username: request.username.clone(),
                avatar: request.avatar.clone(),
                score: 0,
                rank: None,
            },
        )
        .await?;

    let (_, snapshot) = mutate(state, game_id, |room| {
        if room.status.is_finished() {
            return Err(ServiceError::Conflict("this game already finished".into()));
        }
        match room.players.get_mut(&request.user_id) {
            Some(player) => {
                // Rejoin: refresh display data, keep score and streak.
                player.username = request.username.clone();
                player.avatar = request.avatar.clone();
                player.is_connected = true;
            }
            None => {
                if room.status != RoomStatus::Waiting {
                    return Err(ServiceError::Conflict("this game already started".into()));
                }
                if room.players.len() >= state.config().max_players {
                    return Err(ServiceError::Conflict("room is full".into()));
                }
                room.players.insert(
                    request.user_id,
                    RoomPlayer {
                        username: request.username.clone(),
                        avatar: request.avatar.clone(),
                        score: 0,
                        streak: 0,
                        is_ready: false,
                        is_connected: true,
                    },
                );
            }
        }
        Ok(())
    })
    .await?;

    let hub = state.room_hub(game_id);
    if let Some(room) = state.rooms().get(&game_id) {
        let room = room.lock().await;
        room_events::broadcast_room_state(&hub, &room);
    }

    info!(%game_id, player = %request.user_id, "player joined room");
    Ok(snapshot)
}

/// Read-only snapshot of a room for pull-transport polling.
pub async fn snapshot_room(
    state: &SharedState,
    room_code: &str,
) -> Result<RoomSnapshot, ServiceError> {
    let game_id = resolve_room_code(state, room_code).await?;
    let handle = get_or_create_room(state, game_id).await?;
    let room = handle.lock().await;
    Ok(RoomSnapshot::from(&*room))
}

/// Evict a room from the process: registry, code index, hub, grace timers,
/// power-up effects and the cached snapshot all go.
pub async fn remove_room(state: &SharedState, game_id: Uuid) {
    let room_code = match state.rooms().remove(&game_id) {
        Some((_, handle)) => {
            let room = handle.lock().await;
            Some(room.room_code.clone())
        }
        None => None,
    };
    if let Some(code) = room_code {
        state.room_codes().remove(&code);
    }
    state.remove_room_hub(game_id);
    state.power_ups().clear_game(game_id);

    let expired: Vec<(Uuid, Uuid)> = state
        .grace_timers()
        .iter()
        .map(|entry| *entry.key())
        .filter(|(game, _)| *game == game_id)
        .collect();
    for key in expired {
        if let Some((_, timer)) = state.grace_timers().remove(&key) {
            timer.abort();
        }
    }

    if let Some(cache) = state.room_cache().await
        && let Err(err) = cache.delete(room_key(game_id)).await
    {
        debug!(%game_id, "cache delete failed during eviction: {err}");
    }

    info!(%game_id, "evicted room");
}

async fn seated_room(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<Arc<Mutex<Room>>, ServiceError> {
    let handle = get_or_create_room(state, game_id).await?;
    {
        let room = handle.lock().await;
        if !room.players.contains_key(&player_id) {
            return Err(ServiceError::NotFound(
                "player is not seated in this room".into(),
            ));
        }
    }
    Ok(handle)
}

/// Relay a chat message to the room. Social traffic does not mutate room
/// state, so no version bump happens here.
pub async fn relay_chat(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
    message: &str,
) -> Result<(), ServiceError> {
    let handle = seated_room(state, game_id, player_id).await?;
    let hub = state.room_hub(game_id);
    let room = handle.lock().await;
    room_events::broadcast_chat_message(&hub, &room, player_id, message);
    Ok(())
}

/// Relay an emoji reaction to the room.
pub async fn relay_reaction(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
    emoji: &str,
) -> Result<(), ServiceError> {
    let handle = seated_room(state, game_id, player_id).await?;
    let hub = state.room_hub(game_id);
    let room = handle.lock().await;
    room_events::broadcast_reaction(&hub, &room, player_id, emoji);
    Ok(())
}

/// Activate a power-up for a seated player and announce it to the room.
pub async fn activate_power_up(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
    kind: crate::services::powerup_service::PowerUpKind,
) -> Result<(), ServiceError> {
    let handle = seated_room(state, game_id, player_id).await?;
    {
        let room = handle.lock().await;
        if room.status.is_finished() {
            return Err(ServiceError::Conflict("this game already finished".into()));
        }
    }

    state.power_ups().activate(game_id, player_id, kind)?;

    let hub = state.room_hub(game_id);
    let room = handle.lock().await;
    room_events::broadcast_power_up_activated(&hub, &room, player_id, "double_points");
    Ok(())
}

/// Periodically finish and evict rooms idle past the configured TTL.
pub async fn run_idle_reaper(state: SharedState) {
    let cutoff = Duration::from_secs(state.config().room_ttl_secs);
    let mut ticker = tokio::time::interval(REAPER_INTERVAL);
    ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

    loop {
        ticker.tick().await;

        let mut idle = Vec::new();
        for entry in state.rooms().iter() {
            let game_id = *entry.key();
            let room = entry.value().lock().await;
            let stale = room
                .last_activity
                .elapsed()
                .map(|age| age >= cutoff)
                .unwrap_or(false);
            if stale {
                idle.push(game_id);
            }
        }

        for game_id in idle {
            warn!(%game_id, "reaping idle room");
            if let Err(err) = answer_service::finish_game(&state, game_id).await {
                debug!(%game_id, "idle finish failed, evicting anyway: {err}");
            }
            remove_room(&state, game_id).await;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_room_codes_are_six_uppercase_alphanumerics() {
        for _ in 0..100 {
            let code = generate_room_code();
            assert!(validate_room_code(&code).is_ok(), "bad code {code}");
        }
    }

    #[test]
    fn test_room_codes_vary() {
        let first = generate_room_code();
        let distinct = (0..20).any(|_| generate_room_code() != first);
        assert!(distinct);
    }
}
