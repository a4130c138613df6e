//! Disconnection supervision: grace periods, reconnection and permanent
//! departure.
//!
//! A dropped transport never costs a player their seat immediately. The seat
//! is flagged disconnected and a cancellable grace timer starts; reattaching
//! within the window restores the seat with score and streak intact. Only an
//! expired timer or an explicit leave removes the seat, transferring the host
//! role if needed and finishing the room once it empties out.

use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::{
    error::ServiceError,
    services::{answer_service, room_events, room_service},
    state::SharedState,
};

/// Why a player's transport went away.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DisconnectReason {
    /// The socket closed or errored; the player may come back.
    TransportClosed,
    /// The player explicitly left; no grace period applies.
    Left,
}

/// Handle a player's transport going away.
///
/// `TransportClosed` flags the seat and arms the grace timer; `Left` removes
/// the seat immediately. Unknown players are ignored.
pub async fn handle_disconnect(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
    reason: DisconnectReason,
) {
    if reason == DisconnectReason::Left {
        if let Err(err) = remove_seat(state, game_id, player_id).await {
            debug!(%game_id, player = %player_id, "leave ignored: {err}");
        }
        return;
    }

    let flagged = room_service::mutate(state, game_id, |room| {
        match room.players.get_mut(&player_id) {
            Some(player) if player.is_connected => {
                player.is_connected = false;
                Ok(true)
            }
            _ => Ok(false),
        }
    })
    .await;

    match flagged {
        Ok((true, _)) => {}
        Ok((false, _)) | Err(_) => return,
    }

    if let Some(handle) = state.rooms().get(&game_id).map(|entry| entry.clone()) {
        let hub = state.room_hub(game_id);
        let room = handle.lock().await;
        room_events::broadcast_player_disconnected(&hub, &room, player_id);
        room_events::broadcast_room_state(&hub, &room);
    }

    arm_grace_timer(state, game_id, player_id);
    info!(%game_id, player = %player_id, "player disconnected, grace period started");
}

/// Reattach a player who reconnected within their grace period.
///
/// Fails with [`ServiceError::NotFound`] once the seat has been removed; the
/// client must go through the join flow again.
pub async fn handle_reconnect(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<(), ServiceError> {
    cancel_grace_timer(state, game_id, player_id);

    room_service::mutate(state, game_id, |room| {
        let player = room.players.get_mut(&player_id).ok_or_else(|| {
            ServiceError::NotFound("seat expired; join the room again".into())
        })?;
        player.is_connected = true;
        Ok(())
    })
    .await?;

    if let Some(handle) = state.rooms().get(&game_id).map(|entry| entry.clone()) {
        let hub = state.room_hub(game_id);
        let room = handle.lock().await;
        room_events::broadcast_player_reconnected(&hub, &room, player_id);
        room_events::broadcast_room_state(&hub, &room);
    }

    info!(%game_id, player = %player_id, "player reconnected within grace period");
    Ok(())
}

fn arm_grace_timer(state: &SharedState, game_id: Uuid, player_id: Uuid) {
    let key = (game_id, player_id);
    let grace = state.config().grace_period;
    let task_state = state.clone();

    let timer = tokio::spawn(async move {
        tokio::time::sleep(grace).await;
        task_state.grace_timers().remove(&(game_id, player_id));
        expire_seat(&task_state, game_id, player_id).await;
    });

    // Re-arming replaces (and cancels) any previous timer for this seat.
    if let Some(previous) = state.grace_timers().insert(key, timer) {
        previous.abort();
    }
}

fn cancel_grace_timer(state: &SharedState, game_id: Uuid, player_id: Uuid) {
    if let Some((_, timer)) = state.grace_timers().remove(&(game_id, player_id)) {
        timer.abort();
    }
}

/// Grace timer expiry: remove the seat unless the player came back.
async fn expire_seat(state: &SharedState, game_id: Uuid, player_id: Uuid) {
    let still_gone = match state.rooms().get(&game_id).map(|entry| entry.clone()) {
        Some(handle) => {
            let room = handle.lock().await;
            room.players
                .get(&player_id)
                .is_some_and(|player| !player.is_connected)
        }
        None => false,
    };
    if !still_gone {
        return;
    }

    info!(%game_id, player = %player_id, "grace period expired, removing seat");
    if let Err(err) = remove_seat(state, game_id, player_id).await {
        debug!(%game_id, player = %player_id, "seat removal failed: {err}");
    }
}

/// Permanently remove a seat, transferring the host role and finishing the
/// room if it empties out. Removing an unknown player is a no-op.
pub async fn remove_seat(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<(), ServiceError> {
    cancel_grace_timer(state, game_id, player_id);

    // Leaving twice (or leaving an already evicted room) is a no-op.
    let ((new_host, emptied), _) = match room_service::mutate(state, game_id, |room| {
        let was_seated = room.players.contains_key(&player_id);
        let new_host = room.remove_player(player_id);
        Ok((new_host, was_seated && room.players.is_empty()))
    })
    .await
    {
        Ok(result) => result,
        Err(ServiceError::NotFound(_)) => return Ok(()),
        Err(err) => return Err(err),
    };

    // Mirror the departure durably so a cold rebuild does not resurrect the
    // seat (or the old host). Best-effort: the live room stays authoritative.
    if let Some(store) = state.game_store().await {
        if let Err(err) = store.remove_player(game_id, player_id).await {
            warn!(%game_id, player = %player_id, "failed to persist seat removal: {err}");
        }
        if let Some(new_host) = new_host
            && let Err(err) = store.update_game_host(game_id, new_host).await
        {
            warn!(%game_id, host = %new_host, "failed to persist host transfer: {err}");
        }
    }

    if let Some(handle) = state.rooms().get(&game_id).map(|entry| entry.clone()) {
        let hub = state.room_hub(game_id);
        let room = handle.lock().await;
        if let Some(new_host) = new_host {
            // Host transfer goes out before the snapshot so clients never see
            // a snapshot pointing at a host they were not told about.
            room_events::broadcast_host_transferred(&hub, &room, new_host);
        }
        room_events::broadcast_room_state(&hub, &room);
    }

    if emptied {
        info!(%game_id, "room emptied out, finishing");
        if let Err(err) = answer_service::finish_game(state, game_id).await {
            debug!(%game_id, "finish on empty room failed: {err}");
        }
        room_service::remove_room(state, game_id).await;
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::{sync::Arc, time::Duration};

    use super::*;
    use crate::{
        config::AppConfig,
        dao::{game_store::memory::InMemoryGameStore, models::GameStatusEntity},
        dto::room::{CreateGameRequest, JoinRoomRequest, QuestionInput, QuestionKindInput},
        services::room_service,
        state::SharedState,
    };

    async fn game_with_players(names: &[&str]) -> (SharedState, Uuid, Vec<Uuid>) {
        let state = crate::state::AppState::new(AppConfig::default());
        state
            .install_game_store(Arc::new(InMemoryGameStore::new()))
            .await;

        let players: Vec<Uuid> = names.iter().map(|_| Uuid::new_v4()).collect();
        let created = room_service::create_game(
            &state,
            CreateGameRequest {
                host_id: players[0],
                questions: vec![QuestionInput {
                    prompt: "only question".into(),
                    kind: QuestionKindInput::TrueFalse { correct: true },
                    points: 100,
                    time_limit_secs: 30,
                }],
            },
        )
        .await
        .unwrap();

        for (name, id) in names.iter().zip(&players) {
            room_service::join_room(
                &state,
                &created.room_code,
                JoinRoomRequest {
                    user_id: *id,
                    username: (*name).into(),
                    avatar: String::new(),
                },
            )
            .await
            .unwrap();
        }

        (state, created.game_id, players)
    }

    async fn seat_connected(state: &SharedState, game_id: Uuid, player_id: Uuid) -> Option<bool> {
        let handle = state.rooms().get(&game_id)?.clone();
        let room = handle.lock().await;
        room.players.get(&player_id).map(|player| player.is_connected)
    }

    #[tokio::test(start_paused = true)]
    async fn reconnect_within_grace_keeps_the_seat() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"]).await;

        handle_disconnect(&state, game_id, players[1], DisconnectReason::TransportClosed).await;
        assert_eq!(seat_connected(&state, game_id, players[1]).await, Some(false));

        tokio::time::sleep(Duration::from_secs(10)).await;
        handle_reconnect(&state, game_id, players[1]).await.unwrap();
        assert_eq!(seat_connected(&state, game_id, players[1]).await, Some(true));

        // Well past the original grace deadline: the timer must not fire.
        tokio::time::sleep(Duration::from_secs(60)).await;
        assert_eq!(seat_connected(&state, game_id, players[1]).await, Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn grace_expiry_removes_the_seat_and_transfers_host() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"]).await;

        handle_disconnect(&state, game_id, players[0], DisconnectReason::TransportClosed).await;
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        let handle = state.rooms().get(&game_id).unwrap().clone();
        let room = handle.lock().await;
        assert!(!room.players.contains_key(&players[0]));
        assert_eq!(room.host_id, players[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn emptied_room_is_finished_and_evicted() {
        let (state, game_id, players) = game_with_players(&["solo"]).await;

        handle_disconnect(&state, game_id, players[0], DisconnectReason::TransportClosed).await;
        tokio::time::sleep(Duration::from_secs(31)).await;
        tokio::time::sleep(Duration::from_millis(50)).await;

        assert!(state.rooms().get(&game_id).is_none());
        let store = state.game_store().await.unwrap();
        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.status, GameStatusEntity::Finished);
    }

    #[tokio::test]
    async fn leaving_twice_is_a_no_op() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"]).await;

        remove_seat(&state, game_id, players[1]).await.unwrap();
        remove_seat(&state, game_id, players[1]).await.unwrap();

        let handle = state.rooms().get(&game_id).unwrap().clone();
        let room = handle.lock().await;
        assert_eq!(room.players.len(), 1);
        assert_eq!(room.host_id, players[0]);
    }

    #[tokio::test]
    async fn departures_survive_a_cold_rebuild() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"]).await;

        remove_seat(&state, game_id, players[0]).await.unwrap();

        // Drop the live room; the next lookup rebuilds from durable storage.
        state.rooms().remove(&game_id);
        let handle = room_service::get_or_create_room(&state, game_id)
            .await
            .unwrap();
        let room = handle.lock().await;
        assert!(!room.players.contains_key(&players[0]));
        assert_eq!(room.host_id, players[1]);
    }

    #[tokio::test(start_paused = true)]
    async fn explicit_leave_skips_the_grace_period() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"]).await;

        handle_disconnect(&state, game_id, players[1], DisconnectReason::Left).await;

        let handle = state.rooms().get(&game_id).unwrap().clone();
        let room = handle.lock().await;
        assert!(!room.players.contains_key(&players[1]));
        assert!(state.grace_timers().is_empty());
    }
}
