//! Answer resolution and game flow control.
//!
//! Submissions are resolved in two phases around the durable write: validate
//! and price the answer under the room lock, record it durably (the store's
//! uniqueness check is what rejects duplicates), then re-validate and apply
//! under the lock again. An answer only enters the room after its durable
//! write succeeded, and a round only resolves once, because the second of two
//! racing final submissions fails re-validation against the closed question.

use std::time::SystemTime;

use tracing::{debug, error, info, warn};
use uuid::Uuid;

use crate::{
    dao::models::{AnswerRecordEntity, AnswerValue, GameStatusEntity, PlayerResultEntity},
    dto::common::{RankedPlayer, RoomSnapshot},
    error::ServiceError,
    services::{
        room_events::{self, RoundOutcome},
        room_service,
    },
    state::{
        SharedState,
        room::{PendingAnswer, QuestionKind, Room},
        status::RoomEvent,
    },
};

/// Fraction of the base awarded as time bonus when answering instantly.
const TIME_BONUS_FACTOR: f64 = 0.5;
/// Flat bonus per consecutive correct answer held before this one.
const STREAK_BONUS_PER_LEVEL: u32 = 10;

/// Outcome of one resolved submission, echoed back to the submitter.
#[derive(Debug, Clone)]
pub struct AnswerOutcome {
    /// Whether the answer was correct.
    pub correct: bool,
    /// Points awarded, bonuses included.
    pub points_earned: u32,
    /// Player's cumulative score after the answer.
    pub score: i64,
    /// Player's streak after the answer.
    pub streak: u32,
    /// Whether this submission completed the round.
    pub round_complete: bool,
}

/// Price a correct answer.
///
/// `base + floor(remaining/limit * base * 0.5) + streak * 10`, doubled when a
/// double-points effect applies. `streak` is the streak held before this
/// answer. Incorrect answers never reach this function.
pub fn compute_score(
    base: u32,
    time_limit_ms: u64,
    time_spent_ms: u64,
    streak: u32,
    doubled: bool,
) -> u32 {
    let spent = time_spent_ms.min(time_limit_ms);
    let time_bonus = if time_limit_ms == 0 {
        0
    } else {
        let remaining = (time_limit_ms - spent) as f64 / time_limit_ms as f64;
        (remaining * base as f64 * TIME_BONUS_FACTOR).floor() as u32
    };

    let total = base + time_bonus + streak * STREAK_BONUS_PER_LEVEL;
    if doubled { total * 2 } else { total }
}

/// Check a submitted value against the stored correct answer.
///
/// A missing value (time-up submission) and a value of the wrong JSON type
/// are both simply incorrect, never errors.
pub fn evaluate_answer(kind: &QuestionKind, answer: Option<&AnswerValue>) -> bool {
    let Some(answer) = answer else {
        return false;
    };

    match (kind, answer) {
        (QuestionKind::MultipleChoice { correct_index, .. }, AnswerValue::Choice(choice)) => {
            choice == correct_index
        }
        (QuestionKind::TrueFalse { correct }, AnswerValue::Flag(flag)) => flag == correct,
        (QuestionKind::TextInput { accepted }, AnswerValue::Text(text)) => {
            let normalized = normalize_text(text);
            accepted
                .iter()
                .any(|candidate| normalize_text(candidate) == normalized)
        }
        // Canonical kinds carry one exact expected answer; no normalization.
        (QuestionKind::Canonical { answer: expected }, AnswerValue::Text(text)) => {
            text == expected
        }
        _ => false,
    }
}

fn normalize_text(text: &str) -> String {
    text.trim().to_lowercase()
}

struct Applied {
    outcome: AnswerOutcome,
    resolution: Option<Resolution>,
}

struct Resolution {
    outcomes: Vec<RoundOutcome>,
    opened_next_question: bool,
    finish: Option<FinishData>,
}

struct FinishData {
    results: Vec<PlayerResultEntity>,
    ranked: Vec<RankedPlayer>,
}

/// Submit an answer for the current question of a game.
pub async fn submit_answer(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
    question_id: Uuid,
    answer: Option<AnswerValue>,
    time_spent_ms: u64,
) -> Result<(AnswerOutcome, RoomSnapshot), ServiceError> {
    let handle = room_service::get_or_create_room(state, game_id).await?;

    // Phase one: validate and price under the lock, without mutating.
    let (correct, points, doubled) = {
        let room = handle.lock().await;
        let question = validate_submission(state, &room, player_id, question_id, time_spent_ms)?;

        let correct = evaluate_answer(&question.kind, answer.as_ref());
        let doubled = correct && state.power_ups().has_double_points(game_id, player_id);
        let streak_before = room
            .players
            .get(&player_id)
            .map(|player| player.streak)
            .unwrap_or(0);
        let points = if correct {
            compute_score(
                question.points,
                u64::from(question.time_limit_secs) * 1_000,
                time_spent_ms,
                streak_before,
                doubled,
            )
        } else {
            0
        };
        (correct, points, doubled)
    };

    // The durable write is the duplicate gate: a second submission for the
    // same (player, question) fails here with a conflict, whichever transport
    // it arrived on.
    let store = state.require_game_store().await?;
    let durable_count = store
        .record_answer(AnswerRecordEntity {
            game_id,
            player_id,
            question_id,
            answer: answer.clone(),
            is_correct: correct,
            points_earned: points,
            time_spent_ms,
            created_at: SystemTime::now(),
        })
        .await?;
    debug!(%game_id, player = %player_id, durable_count, "answer recorded");

    // Only a recorded answer consumes the effect; duplicates bailed above.
    if doubled {
        state.power_ups().consume_double_points(game_id, player_id);
    }

    let (applied, snapshot) = room_service::mutate(state, game_id, |room| {
        // Re-validate: the round may have resolved or the room may have
        // paused while the durable write was in flight. A rejected apply
        // leaves the durable record (and its score bump) orphaned until
        // `save_results` writes the room's scores at finish; the room is
        // the scoring authority in between.
        if !room.status.is_answerable() {
            return Err(ServiceError::Conflict(
                "the question closed before the answer was applied".into(),
            ));
        }
        let current = room
            .current_question()
            .ok_or_else(|| ServiceError::Conflict("no question is open".into()))?;
        if current.id != question_id {
            return Err(ServiceError::Conflict(
                "the question closed before the answer was applied".into(),
            ));
        }

        room.answers.insert(
            player_id,
            PendingAnswer {
                question_id,
                answer: answer.clone(),
                time_spent_ms,
                is_correct: correct,
                points_earned: points,
                submitted_at: SystemTime::now(),
            },
        );

        let player = room
            .players
            .get_mut(&player_id)
            .ok_or_else(|| ServiceError::NotFound("player is not seated in this room".into()))?;
        player.score += i64::from(points);
        player.streak = if correct { player.streak + 1 } else { 0 };
        let (score, streak) = (player.score, player.streak);

        // The round completes when every currently-connected player has an
        // answer on record. Answers from players sitting in their grace
        // period keep their own slot but never count toward the remaining
        // quorum, so a disconnect cannot close the round early.
        let round_complete = room
            .players
            .iter()
            .filter(|(_, player)| player.is_connected)
            .all(|(id, _)| room.answers.contains_key(id));

        let resolution = if round_complete {
            Some(resolve_round(room)?)
        } else {
            None
        };

        Ok(Applied {
            outcome: AnswerOutcome {
                correct,
                points_earned: points,
                score,
                streak,
                round_complete,
            },
            resolution,
        })
    })
    .await?;

    broadcast_submission(state, game_id, player_id, &applied).await;

    if let Some(finish) = applied.resolution.as_ref().and_then(|r| r.finish.as_ref()) {
        persist_finish(state, game_id, finish.results.clone()).await;
        room_service::remove_room(state, game_id).await;
    }

    Ok((applied.outcome, snapshot))
}

fn validate_submission<'a>(
    state: &SharedState,
    room: &'a Room,
    player_id: Uuid,
    question_id: Uuid,
    time_spent_ms: u64,
) -> Result<&'a crate::state::room::QuestionSnapshot, ServiceError> {
    if !room.status.is_answerable() {
        return Err(ServiceError::Conflict("no question is open".into()));
    }
    if !room.players.contains_key(&player_id) {
        return Err(ServiceError::NotFound(
            "player is not seated in this room".into(),
        ));
    }
    let question = room
        .current_question()
        .ok_or_else(|| ServiceError::Conflict("no question is open".into()))?;
    if question.id != question_id {
        return Err(ServiceError::Conflict(
            "submission targets a question that is not current".into(),
        ));
    }

    // Server clock is the lateness authority; the client-reported spent time
    // only has to fit the same window.
    let allowed_ms = u64::from(question.time_limit_secs) * 1_000 + state.config().answer_tolerance_ms;
    let elapsed_ms = room
        .question_opened_at
        .and_then(|opened| opened.elapsed().ok())
        .map(|elapsed| elapsed.as_millis() as u64)
        .unwrap_or(0);
    if elapsed_ms > allowed_ms || time_spent_ms > allowed_ms {
        return Err(ServiceError::Conflict("answer arrived too late".into()));
    }

    Ok(question)
}

/// Resolve the current round inside a mutation closure.
///
/// Multiplayer rooms move to results display and wait for the host; solo
/// rooms skip straight to the next question, or finish after the last one.
fn resolve_round(room: &mut Room) -> Result<Resolution, ServiceError> {
    let outcomes = collect_outcomes(room);

    if room.is_solo() {
        room.apply_status(RoomEvent::NextQuestion)?;
        if room.has_next_question() {
            room.open_next_question();
            room.apply_status(RoomEvent::OpenQuestion)?;
            Ok(Resolution {
                outcomes,
                opened_next_question: true,
                finish: None,
            })
        } else {
            room.apply_status(RoomEvent::Finish)?;
            Ok(Resolution {
                outcomes,
                opened_next_question: false,
                finish: Some(finish_data(room)),
            })
        }
    } else {
        room.apply_status(RoomEvent::ShowResults)?;
        Ok(Resolution {
            outcomes,
            opened_next_question: false,
            finish: None,
        })
    }
}

fn collect_outcomes(room: &Room) -> Vec<RoundOutcome> {
    room.answers
        .iter()
        .map(|(player_id, pending)| {
            let player = room.players.get(player_id);
            RoundOutcome {
                player_id: *player_id,
                correct: pending.is_correct,
                points_earned: pending.points_earned,
                score: player.map(|p| p.score).unwrap_or(0),
                streak: player.map(|p| p.streak).unwrap_or(0),
            }
        })
        .collect()
}

fn finish_data(room: &Room) -> FinishData {
    let results = room.final_ranking();
    let ranked = results
        .iter()
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
        .collect();
    FinishData { results, ranked }
}

async fn broadcast_submission(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
    applied: &Applied,
) {
    let Some(handle) = state.rooms().get(&game_id).map(|entry| entry.clone()) else {
        return;
    };
    let hub = state.room_hub(game_id);
    let room = handle.lock().await;

    room_events::broadcast_player_answered(&hub, &room, player_id);
    if let Some(resolution) = &applied.resolution {
        room_events::broadcast_round_results(&hub, &room, &resolution.outcomes);
        if resolution.opened_next_question {
            room_events::broadcast_new_question(&hub, &room);
        }
        if let Some(finish) = &resolution.finish {
            room_events::broadcast_game_ended(&hub, &room, &finish.ranked);
        }
        room_events::broadcast_room_state(&hub, &room);
    }
}

/// Host action: start the game and open the first question.
pub async fn start_game(
    state: &SharedState,
    game_id: Uuid,
    requester: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    room_service::get_or_create_room(state, game_id).await?;

    let (_, snapshot) = room_service::mutate(state, game_id, |room| {
        require_host(room, requester)?;
        if room.questions.is_empty() {
            return Err(ServiceError::Conflict("this game has no questions".into()));
        }
        room.apply_status(RoomEvent::Start)?;
        room.open_first_question();
        room.apply_status(RoomEvent::OpenQuestion)?;
        Ok(())
    })
    .await?;

    let store = state.require_game_store().await?;
    if let Err(err) = store
        .update_game_status(game_id, GameStatusEntity::InProgress)
        .await
    {
        warn!(%game_id, "failed to persist in-progress status: {err}");
    }

    broadcast_state_and_question(state, game_id, true).await;
    info!(%game_id, "game started");
    Ok(snapshot)
}

/// Host action: advance past the current question or results screen.
///
/// From an active question this force-closes the round; unanswered players
/// simply miss out. Opens the next question, or finishes after the last one.
pub async fn advance_question(
    state: &SharedState,
    game_id: Uuid,
    requester: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    room_service::get_or_create_room(state, game_id).await?;

    let (resolution, snapshot) = room_service::mutate(state, game_id, |room| {
        require_host(room, requester)?;
        room.apply_status(RoomEvent::NextQuestion)?;
        if room.has_next_question() {
            room.open_next_question();
            room.apply_status(RoomEvent::OpenQuestion)?;
            Ok(None)
        } else {
            room.apply_status(RoomEvent::Finish)?;
            Ok(Some(finish_data(room)))
        }
    })
    .await?;

    match resolution {
        None => broadcast_state_and_question(state, game_id, true).await,
        Some(finish) => {
            broadcast_finish(state, game_id, &finish.ranked).await;
            persist_finish(state, game_id, finish.results).await;
            room_service::remove_room(state, game_id).await;
        }
    }
    Ok(snapshot)
}

/// Mark a player ready in the lobby. Readying twice is a conflict.
pub async fn mark_ready(
    state: &SharedState,
    game_id: Uuid,
    player_id: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    room_service::get_or_create_room(state, game_id).await?;

    let (_, snapshot) = room_service::mutate(state, game_id, |room| {
        if !matches!(room.status, crate::state::status::RoomStatus::Waiting) {
            return Err(ServiceError::Conflict("the lobby is closed".into()));
        }
        let player = room
            .players
            .get_mut(&player_id)
            .ok_or_else(|| ServiceError::NotFound("player is not seated in this room".into()))?;
        if player.is_ready {
            return Err(ServiceError::Conflict("player is already ready".into()));
        }
        player.is_ready = true;
        Ok(())
    })
    .await?;

    broadcast_state_and_question(state, game_id, false).await;
    Ok(snapshot)
}

/// Host action: pause gameplay.
pub async fn pause_game(
    state: &SharedState,
    game_id: Uuid,
    requester: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    let (_, snapshot) = room_service::mutate(state, game_id, |room| {
        require_host(room, requester)?;
        room.apply_status(RoomEvent::Pause)?;
        Ok(())
    })
    .await?;
    broadcast_state_and_question(state, game_id, false).await;
    Ok(snapshot)
}

/// Host action: resume a paused game.
pub async fn resume_game(
    state: &SharedState,
    game_id: Uuid,
    requester: Uuid,
) -> Result<RoomSnapshot, ServiceError> {
    let (_, snapshot) = room_service::mutate(state, game_id, |room| {
        require_host(room, requester)?;
        room.apply_status(RoomEvent::Resume)?;
        Ok(())
    })
    .await?;
    broadcast_state_and_question(state, game_id, false).await;
    Ok(snapshot)
}

/// Finish a game regardless of progress: final ranks are computed from the
/// scores as they stand. Used when a room empties out or idles past its TTL.
pub async fn finish_game(state: &SharedState, game_id: Uuid) -> Result<(), ServiceError> {
    let (finish, _) = room_service::mutate(state, game_id, |room| {
        if room.status.is_finished() {
            return Ok(None);
        }
        room.apply_status(RoomEvent::Finish)?;
        Ok(Some(finish_data(room)))
    })
    .await?;

    if let Some(finish) = finish {
        broadcast_finish(state, game_id, &finish.ranked).await;
        persist_finish(state, game_id, finish.results).await;
    }
    Ok(())
}

fn require_host(room: &Room, requester: Uuid) -> Result<(), ServiceError> {
    if room.host_id != requester {
        return Err(ServiceError::Unauthorized(
            "only the host can control game flow".into(),
        ));
    }
    Ok(())
}

async fn broadcast_state_and_question(state: &SharedState, game_id: Uuid, with_question: bool) {
    let Some(handle) = state.rooms().get(&game_id).map(|entry| entry.clone()) else {
        return;
    };
    let hub = state.room_hub(game_id);
    let room = handle.lock().await;
    room_events::broadcast_room_state(&hub, &room);
    if with_question {
        room_events::broadcast_new_question(&hub, &room);
    }
}

async fn broadcast_finish(state: &SharedState, game_id: Uuid, ranked: &[RankedPlayer]) {
    let Some(handle) = state.rooms().get(&game_id).map(|entry| entry.clone()) else {
        return;
    };
    let hub = state.room_hub(game_id);
    let room = handle.lock().await;
    room_events::broadcast_game_ended(&hub, &room, ranked);
    room_events::broadcast_room_state(&hub, &room);
}

async fn persist_finish(state: &SharedState, game_id: Uuid, results: Vec<PlayerResultEntity>) {
    let Some(store) = state.game_store().await else {
        warn!(%game_id, "finishing without storage; final results not persisted");
        return;
    };
    if let Err(err) = store.save_results(game_id, results).await {
        error!(%game_id, "failed to persist final results: {err}");
    }
    if let Err(err) = store
        .update_game_status(game_id, GameStatusEntity::Finished)
        .await
    {
        error!(%game_id, "failed to persist finished status: {err}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn base_answer_with_two_thirds_time_left_scores_133() {
        // 100 base, 30s limit, answered at 10s, no streak.
        assert_eq!(compute_score(100, 30_000, 10_000, 0, false), 133);
    }

    #[test]
    fn instant_answer_gets_the_full_time_bonus() {
        assert_eq!(compute_score(100, 30_000, 0, 0, false), 150);
    }

    #[test]
    fn last_moment_answer_gets_base_only() {
        assert_eq!(compute_score(100, 30_000, 30_000, 0, false), 100);
    }

    #[test]
    fn streak_adds_ten_per_level() {
        assert_eq!(compute_score(100, 30_000, 30_000, 3, false), 130);
    }

    #[test]
    fn double_points_doubles_the_whole_award() {
        assert_eq!(compute_score(100, 30_000, 10_000, 0, true), 266);
        assert_eq!(compute_score(100, 30_000, 30_000, 3, true), 260);
    }

    #[test]
    fn overlong_spent_time_is_clamped_to_the_limit() {
        assert_eq!(compute_score(100, 30_000, 45_000, 0, false), 100);
    }

    #[test]
    fn multiple_choice_matches_on_index() {
        let kind = QuestionKind::MultipleChoice {
            choices: vec!["a".into(), "b".into(), "c".into()],
            correct_index: 2,
        };
        assert!(evaluate_answer(&kind, Some(&AnswerValue::Choice(2))));
        assert!(!evaluate_answer(&kind, Some(&AnswerValue::Choice(1))));
        assert!(!evaluate_answer(&kind, Some(&AnswerValue::Text("c".into()))));
    }

    #[test]
    fn true_false_matches_on_flag() {
        let kind = QuestionKind::TrueFalse { correct: true };
        assert!(evaluate_answer(&kind, Some(&AnswerValue::Flag(true))));
        assert!(!evaluate_answer(&kind, Some(&AnswerValue::Flag(false))));
    }

    #[test]
    fn text_input_ignores_case_and_surrounding_whitespace() {
        let kind = QuestionKind::TextInput {
            accepted: vec!["Titan".into(), "Saturn VI".into()],
        };
        assert!(evaluate_answer(&kind, Some(&AnswerValue::Text("  titan ".into()))));
        assert!(evaluate_answer(&kind, Some(&AnswerValue::Text("saturn vi".into()))));
        assert!(!evaluate_answer(&kind, Some(&AnswerValue::Text("Rhea".into()))));
    }

    #[test]
    fn canonical_answers_require_an_exact_match() {
        let kind = QuestionKind::Canonical {
            answer: "Titan".into(),
        };
        assert!(evaluate_answer(&kind, Some(&AnswerValue::Text("Titan".into()))));
        assert!(!evaluate_answer(&kind, Some(&AnswerValue::Text("titan".into()))));
        assert!(!evaluate_answer(&kind, Some(&AnswerValue::Text(" Titan ".into()))));
    }

    #[test]
    fn missing_answer_is_incorrect_not_an_error() {
        let kind = QuestionKind::TrueFalse { correct: true };
        assert!(!evaluate_answer(&kind, None));
    }
}

#[cfg(test)]
mod engine_tests {
    use std::sync::Arc;

    use super::*;
    use crate::{
        config::AppConfig,
        dao::game_store::memory::InMemoryGameStore,
        dto::room::{CreateGameRequest, JoinRoomRequest, QuestionInput, QuestionKindInput},
        state::{AppState, SharedState, status::RoomStatus},
    };

    async fn game_with_players(names: &[&str], questions: usize) -> (SharedState, Uuid, Vec<Uuid>) {
        let state = AppState::new(AppConfig::default());
        state
            .install_game_store(Arc::new(InMemoryGameStore::new()))
            .await;

        let players: Vec<Uuid> = names.iter().map(|_| Uuid::new_v4()).collect();
        let created = room_service::create_game(
            &state,
            CreateGameRequest {
                host_id: players[0],
                questions: (0..questions)
                    .map(|index| QuestionInput {
                        prompt: format!("question {index}"),
                        kind: QuestionKindInput::MultipleChoice {
                            choices: vec!["a".into(), "b".into()],
                            correct_index: 1,
                        },
                        points: 100,
                        time_limit_secs: 30,
                    })
                    .collect(),
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

    async fn current_question_id(state: &SharedState, game_id: Uuid) -> Uuid {
        let handle = state.rooms().get(&game_id).unwrap().clone();
        let room = handle.lock().await;
        room.current_question().unwrap().id
    }

    async fn room_status(state: &SharedState, game_id: Uuid) -> RoomStatus {
        let handle = state.rooms().get(&game_id).unwrap().clone();
        let room = handle.lock().await;
        room.status.clone()
    }

    #[tokio::test]
    async fn duplicate_submission_is_rejected() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"], 1).await;
        start_game(&state, game_id, players[0]).await.unwrap();
        let question_id = current_question_id(&state, game_id).await;

        let (outcome, _) = submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(1)),
            10_000,
        )
        .await
        .unwrap();
        assert!(outcome.correct);
        assert!(!outcome.round_complete);

        let err = submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(0)),
            12_000,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn round_completes_when_every_connected_player_answered() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"], 1).await;
        start_game(&state, game_id, players[0]).await.unwrap();
        let question_id = current_question_id(&state, game_id).await;

        let (first, _) = submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(1)),
            10_000,
        )
        .await
        .unwrap();
        assert!(!first.round_complete);
        assert_eq!(first.points_earned, 133);
        assert_eq!(room_status(&state, game_id).await, RoomStatus::QuestionActive);

        let (second, _) = submit_answer(
            &state,
            game_id,
            players[1],
            question_id,
            Some(AnswerValue::Choice(0)),
            20_000,
        )
        .await
        .unwrap();
        assert!(second.round_complete);
        assert!(!second.correct);
        assert_eq!(second.points_earned, 0);
        assert_eq!(room_status(&state, game_id).await, RoomStatus::ResultsDisplay);
    }

    #[tokio::test]
    async fn grace_period_answers_do_not_close_the_round() {
        use crate::services::reconnect_service::{self, DisconnectReason};

        let (state, game_id, players) = game_with_players(&["ada", "bo", "cy"], 1).await;
        start_game(&state, game_id, players[0]).await.unwrap();
        let question_id = current_question_id(&state, game_id).await;

        // ada answers, then drops into their grace period.
        submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(1)),
            5_000,
        )
        .await
        .unwrap();
        reconnect_service::handle_disconnect(
            &state,
            game_id,
            players[0],
            DisconnectReason::TransportClosed,
        )
        .await;

        // bo answering must not complete the round while cy is still in.
        let (outcome, _) = submit_answer(
            &state,
            game_id,
            players[1],
            question_id,
            Some(AnswerValue::Choice(1)),
            10_000,
        )
        .await
        .unwrap();
        assert!(!outcome.round_complete);
        assert_eq!(room_status(&state, game_id).await, RoomStatus::QuestionActive);

        let (outcome, _) = submit_answer(
            &state,
            game_id,
            players[2],
            question_id,
            Some(AnswerValue::Choice(1)),
            15_000,
        )
        .await
        .unwrap();
        assert!(outcome.round_complete);
        assert_eq!(room_status(&state, game_id).await, RoomStatus::ResultsDisplay);
    }

    #[tokio::test]
    async fn solo_rooms_fast_advance_and_finish() {
        let (state, game_id, players) = game_with_players(&["solo"], 2).await;
        start_game(&state, game_id, players[0]).await.unwrap();
        let first_question = current_question_id(&state, game_id).await;

        let (outcome, snapshot) = submit_answer(
            &state,
            game_id,
            players[0],
            first_question,
            Some(AnswerValue::Choice(1)),
            10_000,
        )
        .await
        .unwrap();
        assert!(outcome.round_complete);
        assert_eq!(snapshot.status, crate::dto::common::RoomStatusDto::QuestionActive);

        let second_question = current_question_id(&state, game_id).await;
        assert_ne!(first_question, second_question);

        let (outcome, snapshot) = submit_answer(
            &state,
            game_id,
            players[0],
            second_question,
            Some(AnswerValue::Choice(1)),
            10_000,
        )
        .await
        .unwrap();
        assert!(outcome.round_complete);
        // 133 for the first answer, 133 + 10 streak bonus for the second.
        assert_eq!(outcome.score, 276);
        assert_eq!(snapshot.status, crate::dto::common::RoomStatusDto::Finished);

        // The finished room is evicted and its final state is durable.
        assert!(state.rooms().get(&game_id).is_none());
        let store = state.game_store().await.unwrap();
        let game = store.find_game(game_id).await.unwrap().unwrap();
        assert_eq!(game.status, GameStatusEntity::Finished);
        let seats = store.find_players(game_id).await.unwrap();
        assert_eq!(seats[0].rank, Some(1));
    }

    #[tokio::test]
    async fn wrong_answer_resets_the_streak() {
        let (state, game_id, players) = game_with_players(&["solo"], 2).await;
        start_game(&state, game_id, players[0]).await.unwrap();
        let question_id = current_question_id(&state, game_id).await;

        submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(1)),
            10_000,
        )
        .await
        .unwrap();

        let question_id = current_question_id(&state, game_id).await;
        let (outcome, _) = submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(0)),
            10_000,
        )
        .await
        .unwrap();
        assert!(!outcome.correct);
        assert_eq!(outcome.points_earned, 0);
        assert_eq!(outcome.streak, 0);
    }

    #[tokio::test]
    async fn overdue_submissions_are_rejected() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"], 1).await;
        start_game(&state, game_id, players[0]).await.unwrap();
        let question_id = current_question_id(&state, game_id).await;

        // 30s limit + 2s default tolerance; 40s is past the window.
        let err = submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(1)),
            40_000,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn timed_out_submission_occupies_the_answer_slot() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"], 1).await;
        start_game(&state, game_id, players[0]).await.unwrap();
        let question_id = current_question_id(&state, game_id).await;

        let (outcome, snapshot) =
            submit_answer(&state, game_id, players[0], question_id, None, 30_000)
                .await
                .unwrap();
        assert!(!outcome.correct);
        assert!(snapshot.answered.contains(&players[0]));

        let err = submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(1)),
            31_000,
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn only_the_host_controls_game_flow() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"], 2).await;

        let err = start_game(&state, game_id, players[1]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));

        start_game(&state, game_id, players[0]).await.unwrap();
        let err = advance_question(&state, game_id, players[1])
            .await
            .unwrap_err();
        assert!(matches!(err, ServiceError::Unauthorized(_)));
    }

    #[tokio::test]
    async fn readying_twice_is_a_conflict() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"], 1).await;

        mark_ready(&state, game_id, players[0]).await.unwrap();
        let err = mark_ready(&state, game_id, players[0]).await.unwrap_err();
        assert!(matches!(err, ServiceError::Conflict(_)));
    }

    #[tokio::test]
    async fn double_points_applies_once_then_expires() {
        let (state, game_id, players) = game_with_players(&["solo"], 2).await;
        start_game(&state, game_id, players[0]).await.unwrap();
        state
            .power_ups()
            .activate(
                game_id,
                players[0],
                crate::services::powerup_service::PowerUpKind::DoublePoints,
            )
            .unwrap();

        let question_id = current_question_id(&state, game_id).await;
        let (outcome, _) = submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(1)),
            10_000,
        )
        .await
        .unwrap();
        assert_eq!(outcome.points_earned, 266);

        // The effect was consumed; the next correct answer scores normally.
        let question_id = current_question_id(&state, game_id).await;
        let (outcome, _) = submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(1)),
            10_000,
        )
        .await
        .unwrap();
        assert_eq!(outcome.points_earned, 143);
    }

    #[tokio::test]
    async fn broadcast_versions_never_regress() {
        let (state, game_id, players) = game_with_players(&["ada", "bo"], 1).await;
        let mut frames = state.room_hub(game_id).subscribe();

        start_game(&state, game_id, players[0]).await.unwrap();
        let question_id = current_question_id(&state, game_id).await;
        submit_answer(
            &state,
            game_id,
            players[0],
            question_id,
            Some(AnswerValue::Choice(1)),
            10_000,
        )
        .await
        .unwrap();
        submit_answer(
            &state,
            game_id,
            players[1],
            question_id,
            Some(AnswerValue::Choice(1)),
            15_000,
        )
        .await
        .unwrap();

        let mut last_version = 0u64;
        while let Ok(frame) = frames.try_recv() {
            let value: serde_json::Value = serde_json::from_str(&frame).unwrap();
            let version = value["version"].as_u64().unwrap();
            assert!(version >= last_version, "version went backwards in {frame}");
            last_version = version;
        }
        assert!(last_version > 0);
    }
}
