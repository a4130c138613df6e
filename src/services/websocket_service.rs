//! WebSocket connection lifecycle for the push transport.
//!
//! Every socket must identify with a room code and user id before anything
//! else; identification joins the room (or reattaches a seat inside its grace
//! period). After that the socket carries client actions inbound while a
//! forwarder task relays the room's broadcast frames outbound. A dropped or
//! closed socket hands the seat to the reconnection supervisor.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket};
use futures::{SinkExt, StreamExt};
use tokio::{sync::mpsc, task::JoinHandle};
use tokio_stream::wrappers::BroadcastStream;
use tracing::{info, warn};
use uuid::Uuid;

use crate::{
    dto::{
        room::JoinRoomRequest,
        ws::{ClientMessage, SocketReply},
    },
    error::ServiceError,
    services::{
        answer_service,
        reconnect_service::{self, DisconnectReason},
        room_service,
    },
    state::SharedState,
};

const IDENT_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle the full lifecycle of one player WebSocket connection.
pub async fn handle_socket(state: SharedState, socket: WebSocket) {
    let (mut sender, mut receiver) = socket.split();
    let (outbound_tx, mut outbound_rx) = mpsc::unbounded_channel::<Message>();

    // Dedicated writer task keeps outbound frames flowing even while we await
    // inbound ones.
    let writer_task = tokio::spawn(async move {
        while let Some(message) = outbound_rx.recv().await {
            if sender.send(message).await.is_err() {
                break;
            }
        }
    });

    let initial_message = match tokio::time::timeout(IDENT_TIMEOUT, receiver.next()).await {
        Ok(Some(Ok(Message::Text(text)))) => text,
        Ok(Some(Ok(Message::Close(_)))) => {
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Ok(_))) => {
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(Some(Err(err))) => {
            warn!(error = %err, "websocket receive error");
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Ok(None) | Err(_) => {
            warn!("websocket identification timed out");
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let identify = match serde_json::from_str::<ClientMessage>(&initial_message) {
        Ok(ClientMessage::Identify {
            room_code,
            user_id,
            username,
            avatar,
        }) => (room_code, user_id, username, avatar),
        Ok(_) => {
            warn!("first websocket frame was not an identification");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
        Err(err) => {
            warn!(error = %err, "failed to parse identification frame");
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };
    let (room_code, user_id, username, avatar) = identify;

    let game_id = match attach(&state, &room_code, user_id, username, avatar).await {
        Ok(game_id) => game_id,
        Err(err) => {
            let _ = send_reply(
                &outbound_tx,
                &SocketReply::Error {
                    message: err.to_string(),
                },
            );
            let _ = outbound_tx.send(Message::Close(None));
            finalize(writer_task, outbound_tx).await;
            return;
        }
    };

    let _ = send_reply(&outbound_tx, &SocketReply::Identified { game_id, user_id });
    info!(%game_id, player = %user_id, "websocket identified");

    // Forwarder relays room broadcasts onto this socket. A lagged subscriber
    // skips frames; the next full snapshot resynchronizes it.
    let forwarder_task = {
        let hub = state.room_hub(game_id);
        let tx = outbound_tx.clone();
        tokio::spawn(async move {
            let mut frames = BroadcastStream::new(hub.subscribe());
            while let Some(frame) = frames.next().await {
                let Ok(frame) = frame else {
                    continue;
                };
                if tx.send(Message::Text(frame.into())).is_err() {
                    break;
                }
            }
        })
    };

    let mut reason = DisconnectReason::TransportClosed;
    while let Some(message) = receiver.next().await {
        match message {
            Ok(Message::Text(text)) => {
                let action = match serde_json::from_str::<ClientMessage>(&text) {
                    Ok(action) => action,
                    Err(err) => {
                        warn!(player = %user_id, error = %err, "unparseable websocket frame");
                        let _ = send_reply(
                            &outbound_tx,
                            &SocketReply::Error {
                                message: "unparseable frame".into(),
                            },
                        );
                        continue;
                    }
                };

                if matches!(action, ClientMessage::Leave) {
                    reason = DisconnectReason::Left;
                    break;
                }
                if let Err(err) =
                    handle_action(&state, game_id, user_id, action, &outbound_tx).await
                {
                    let _ = send_reply(
                        &outbound_tx,
                        &SocketReply::Error {
                            message: err.to_string(),
                        },
                    );
                }
            }
            Ok(Message::Ping(payload)) => {
                let _ = outbound_tx.send(Message::Pong(payload));
            }
            Ok(Message::Close(frame)) => {
                let _ = outbound_tx.send(Message::Close(frame));
                break;
            }
            Ok(Message::Binary(_)) | Ok(Message::Pong(_)) => {}
            Err(err) => {
                warn!(player = %user_id, error = %err, "websocket error");
                break;
            }
        }
    }

    forwarder_task.abort();
    reconnect_service::handle_disconnect(&state, game_id, user_id, reason).await;
    info!(%game_id, player = %user_id, "websocket closed");

    finalize(writer_task, outbound_tx).await;
}

/// Attach an identified socket: reattach a known seat or go through the join
/// flow for a new one.
async fn attach(
    state: &SharedState,
    room_code: &str,
    user_id: Uuid,
    username: String,
    avatar: String,
) -> Result<Uuid, ServiceError> {
    let game_id = room_service::resolve_room_code(state, room_code).await?;
    let handle = room_service::get_or_create_room(state, game_id).await?;

    let seated = {
        let room = handle.lock().await;
        room.players.contains_key(&user_id)
    };

    if seated {
        reconnect_service::handle_reconnect(state, game_id, user_id).await?;
    } else {
        room_service::join_room(
            state,
            room_code,
            JoinRoomRequest {
                user_id,
                username,
                avatar,
            },
        )
        .await?;
    }
    Ok(game_id)
}

async fn handle_action(
    state: &SharedState,
    game_id: Uuid,
    user_id: Uuid,
    action: ClientMessage,
    outbound_tx: &mpsc::UnboundedSender<Message>,
) -> Result<(), ServiceError> {
    match action {
        ClientMessage::Answer {
            question_id,
            answer,
            time_spent_ms,
        } => {
            let (outcome, _) = answer_service::submit_answer(
                state,
                game_id,
                user_id,
                question_id,
                answer,
                time_spent_ms,
            )
            .await?;
            let _ = send_reply(
                outbound_tx,
                &SocketReply::AnswerResult {
                    correct: outcome.correct,
                    points_earned: outcome.points_earned,
                    score: outcome.score,
                    streak: outcome.streak,
                    round_complete: outcome.round_complete,
                },
            );
        }
        ClientMessage::Ready => {
            answer_service::mark_ready(state, game_id, user_id).await?;
        }
        ClientMessage::Start => {
            answer_service::start_game(state, game_id, user_id).await?;
        }
        ClientMessage::Advance => {
            answer_service::advance_question(state, game_id, user_id).await?;
        }
        ClientMessage::Pause => {
            answer_service::pause_game(state, game_id, user_id).await?;
        }
        ClientMessage::Resume => {
            answer_service::resume_game(state, game_id, user_id).await?;
        }
        ClientMessage::Chat { message } => {
            room_service::relay_chat(state, game_id, user_id, &message).await?;
        }
        ClientMessage::Reaction { emoji } => {
            room_service::relay_reaction(state, game_id, user_id, &emoji).await?;
        }
        ClientMessage::UsePowerUp { kind } => {
            room_service::activate_power_up(state, game_id, user_id, kind.into()).await?;
        }
        ClientMessage::Identify { .. } => {
            warn!(player = %user_id, "ignoring duplicate identification frame");
        }
        // `Leave` breaks the read loop before dispatch.
        ClientMessage::Leave | ClientMessage::Unknown => {}
    }
    Ok(())
}

fn send_reply(
    tx: &mpsc::UnboundedSender<Message>,
    reply: &SocketReply,
) -> Result<(), ServiceError> {
    let payload = serde_json::to_string(reply)
        .map_err(|err| ServiceError::InvalidInput(err.to_string()))?;
    tx.send(Message::Text(payload.into()))
        .map_err(|_| ServiceError::Conflict("connection closed".into()))
}

/// Ensure the writer task winds down before we return from the socket handler.
async fn finalize(writer_task: JoinHandle<()>, outbound_tx: mpsc::UnboundedSender<Message>) {
    drop(outbound_tx);
    let _ = writer_task.await;
}
