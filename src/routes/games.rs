use axum::{Json, Router, extract::State, routing::post};
use axum_valid::Valid;

use crate::{
    dto::room::{CreateGameRequest, GameCreatedResponse},
    error::AppError,
    services::room_service,
    state::SharedState,
};

/// Routes handling game bootstrap operations.
pub fn router() -> Router<SharedState> {
    Router::new().route("/games", post(create_game))
}

/// Create a fresh game definition with its question list and room code.
#[utoipa::path(
    post,
    path = "/games",
    tag = "games",
    request_body = CreateGameRequest,
    responses(
        (status = 200, description = "Game created", body = GameCreatedResponse)
    )
)]
pub async fn create_game(
    State(state): State<SharedState>,
    Valid(Json(payload)): Valid<Json<CreateGameRequest>>,
) -> Result<Json<GameCreatedResponse>, AppError> {
    let created = room_service::create_game(&state, payload).await?;
    Ok(Json(created))
}
