//! Pull-transport room endpoints.
//!
//! Every action is addressed by room code and returns the updated
//! [`RoomSnapshot`], so clients on a degraded network can drive a whole game
//! by polling without ever opening a socket.

use axum::{
    Json, Router,
    extract::{Path, State},
    routing::{get, post},
};

use axum_valid::Valid;

use crate::{
    dto::{
        common::RoomSnapshot,
        room::{
            ChatMessageRequest, JoinRoomRequest, PlayerActionRequest, PowerUpRequest,
            ReactionRequest, SubmitAnswerRequest, SubmitAnswerResponse,
        },
    },
    error::AppError,
    services::{answer_service, reconnect_service, room_service},
    state::SharedState,
};

/// Routes handling room actions and polling.
pub fn router() -> Router<SharedState> {
    Router::new()
        .route("/rooms/{code}", get(poll_room))
        .route("/rooms/{code}/join", post(join_room))
        .route("/rooms/{code}/leave", post(leave_room))
        .route("/rooms/{code}/ready", post(mark_ready))
        .route("/rooms/{code}/start", post(start_game))
        .route("/rooms/{code}/answers", post(submit_answer))
        .route("/rooms/{code}/advance", post(advance_question))
        .route("/rooms/{code}/pause", post(pause_game))
        .route("/rooms/{code}/resume", post(resume_game))
        .route("/rooms/{code}/chat", post(post_chat_message))
        .route("/rooms/{code}/reactions", post(post_reaction))
        .route("/rooms/{code}/power-ups", post(activate_power_up))
}

/// Fetch the current versioned snapshot of a room.
#[utoipa::path(
    get,
    path = "/rooms/{code}",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    responses((status = 200, description = "Current room snapshot", body = RoomSnapshot))
)]
pub async fn poll_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(room_service::snapshot_room(&state, &code).await?))
}

/// Join a room, or rejoin an existing seat.
#[utoipa::path(
    post,
    path = "/rooms/{code}/join",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = JoinRoomRequest,
    responses((status = 200, description = "Joined; updated snapshot", body = RoomSnapshot))
)]
pub async fn join_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<JoinRoomRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    Ok(Json(room_service::join_room(&state, &code, payload).await?))
}

/// Leave a room permanently, skipping the reconnection grace period.
#[utoipa::path(
    post,
    path = "/rooms/{code}/leave",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = PlayerActionRequest,
    responses((status = 200, description = "Left the room"))
)]
pub async fn leave_room(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<(), AppError> {
    let game_id = room_service::resolve_room_code(&state, &code).await?;
    reconnect_service::remove_seat(&state, game_id, payload.user_id).await?;
    Ok(())
}

/// Mark the acting player ready in the lobby.
#[utoipa::path(
    post,
    path = "/rooms/{code}/ready",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = PlayerActionRequest,
    responses((status = 200, description = "Readiness recorded", body = RoomSnapshot))
)]
pub async fn mark_ready(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let game_id = room_service::resolve_room_code(&state, &code).await?;
    Ok(Json(
        answer_service::mark_ready(&state, game_id, payload.user_id).await?,
    ))
}

/// Host only: start the game and open the first question.
#[utoipa::path(
    post,
    path = "/rooms/{code}/start",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = PlayerActionRequest,
    responses((status = 200, description = "Game started", body = RoomSnapshot))
)]
pub async fn start_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let game_id = room_service::resolve_room_code(&state, &code).await?;
    Ok(Json(
        answer_service::start_game(&state, game_id, payload.user_id).await?,
    ))
}

/// Submit an answer for the current question.
#[utoipa::path(
    post,
    path = "/rooms/{code}/answers",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = SubmitAnswerRequest,
    responses(
        (status = 200, description = "Answer resolved", body = SubmitAnswerResponse),
        (status = 409, description = "Duplicate or late submission")
    )
)]
pub async fn submit_answer(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<SubmitAnswerRequest>>,
) -> Result<Json<SubmitAnswerResponse>, AppError> {
    let game_id = room_service::resolve_room_code(&state, &code).await?;
    let (outcome, snapshot) = answer_service::submit_answer(
        &state,
        game_id,
        payload.user_id,
        payload.question_id,
        payload.answer,
        payload.time_spent_ms,
    )
    .await?;
    Ok(Json(SubmitAnswerResponse::from_outcome(outcome, snapshot)))
}

/// Host only: advance past the current question or results screen.
#[utoipa::path(
    post,
    path = "/rooms/{code}/advance",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = PlayerActionRequest,
    responses((status = 200, description = "Advanced", body = RoomSnapshot))
)]
pub async fn advance_question(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let game_id = room_service::resolve_room_code(&state, &code).await?;
    Ok(Json(
        answer_service::advance_question(&state, game_id, payload.user_id).await?,
    ))
}

/// Host only: pause gameplay.
#[utoipa::path(
    post,
    path = "/rooms/{code}/pause",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = PlayerActionRequest,
    responses((status = 200, description = "Paused", body = RoomSnapshot))
)]
pub async fn pause_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let game_id = room_service::resolve_room_code(&state, &code).await?;
    Ok(Json(
        answer_service::pause_game(&state, game_id, payload.user_id).await?,
    ))
}

/// Host only: resume a paused game.
#[utoipa::path(
    post,
    path = "/rooms/{code}/resume",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = PlayerActionRequest,
    responses((status = 200, description = "Resumed", body = RoomSnapshot))
)]
pub async fn resume_game(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<PlayerActionRequest>>,
) -> Result<Json<RoomSnapshot>, AppError> {
    let game_id = room_service::resolve_room_code(&state, &code).await?;
    Ok(Json(
        answer_service::resume_game(&state, game_id, payload.user_id).await?,
    ))
}

/// Relay a chat message to everyone in the room.
#[utoipa::path(
    post,
    path = "/rooms/{code}/chat",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = ChatMessageRequest,
    responses((status = 200, description = "Message relayed"))
)]
pub async fn post_chat_message(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<ChatMessageRequest>>,
) -> Result<(), AppError> {
    let game_id = room_service::resolve_room_code(&state, &code).await?;
    room_service::relay_chat(&state, game_id, payload.user_id, &payload.message).await?;
    Ok(())
}

/// Relay an emoji reaction to everyone in the room.
#[utoipa::path(
    post,
    path = "/rooms/{code}/reactions",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = ReactionRequest,
    responses((status = 200, description = "Reaction relayed"))
)]
pub async fn post_reaction(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<ReactionRequest>>,
) -> Result<(), AppError> {
    let game_id = room_service::resolve_room_code(&state, &code).await?;
    room_service::relay_reaction(&state, game_id, payload.user_id, &payload.emoji).await?;
    Ok(())
}

/// Activate a power-up for the acting player.
#[utoipa::path(
    post,
    path = "/rooms/{code}/power-ups",
    tag = "rooms",
    params(("code" = String, Path, description = "Six-character room code")),
    request_body = PowerUpRequest,
    responses(
        (status = 200, description = "Power-up activated"),
        (status = 409, description = "Effect already active or allowance exhausted")
    )
)]
pub async fn activate_power_up(
    State(state): State<SharedState>,
    Path(code): Path<String>,
    Valid(Json(payload)): Valid<Json<PowerUpRequest>>,
) -> Result<(), AppError> {
    let game_id = room_service::resolve_room_code(&state, &code).await?;
    room_service::activate_power_up(&state, game_id, payload.user_id, payload.kind.into()).await?;
    Ok(())
}
