use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for the quiz rooms backend.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::websocket::ws_handler,
        crate::routes::games::create_game,
        crate::routes::rooms::poll_room,
        crate::routes::rooms::join_room,
        crate::routes::rooms::leave_room,
        crate::routes::rooms::mark_ready,
        crate::routes::rooms::start_game,
        crate::routes::rooms::submit_answer,
        crate::routes::rooms::advance_question,
        crate::routes::rooms::pause_game,
        crate::routes::rooms::resume_game,
        crate::routes::rooms::post_chat_message,
        crate::routes::rooms::post_reaction,
        crate::routes::rooms::activate_power_up,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::common::RoomSnapshot,
            crate::dto::common::RoomStatusDto,
            crate::dto::common::PlayerSummary,
            crate::dto::common::QuestionPublic,
            crate::dto::common::RankedPlayer,
            crate::dto::room::CreateGameRequest,
            crate::dto::room::GameCreatedResponse,
            crate::dto::room::JoinRoomRequest,
            crate::dto::room::SubmitAnswerRequest,
            crate::dto::room::SubmitAnswerResponse,
            crate::dto::room::PowerUpRequest,
            crate::dto::ws::ClientMessage,
            crate::dto::ws::SocketReply,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "games", description = "Game creation"),
        (name = "rooms", description = "Room actions and polling"),
    )
)]
pub struct ApiDoc;
