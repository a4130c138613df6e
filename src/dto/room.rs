use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;
use validator::{Validate, ValidationError, ValidationErrors};

use crate::{
    dao::models::AnswerValue,
    dto::common::RoomSnapshot,
    services::answer_service::AnswerOutcome,
};

/// Payload used to join (or rejoin) a room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct JoinRoomRequest {
    /// Authenticated user identifier (established by the outer auth layer).
    pub user_id: Uuid,
    /// Display name shown to other players.
    #[validate(length(min = 1, max = 24))]
    pub username: String,
    /// Avatar identifier; free-form, defaults to empty.
    #[serde(default)]
    #[validate(length(max = 64))]
    pub avatar: String,
}

/// Payload for actions that only need to identify the acting player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PlayerActionRequest {
    /// Acting user identifier.
    pub user_id: Uuid,
}

/// Payload submitting an answer for the current question.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct SubmitAnswerRequest {
    /// Acting user identifier.
    pub user_id: Uuid,
    /// Question being answered; must match the room's current question.
    pub question_id: Uuid,
    /// Submitted value; `null` marks a time-up submission.
    #[schema(value_type = Option<Object>)]
    pub answer: Option<AnswerValue>,
    /// Milliseconds between question display and submission.
    pub time_spent_ms: u64,
}

/// Payload for a chat message relayed to the room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ChatMessageRequest {
    /// Acting user identifier.
    pub user_id: Uuid,
    /// Message body.
    #[validate(length(min = 1, max = 500))]
    pub message: String,
}

/// Payload for an emoji reaction relayed to the room.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct ReactionRequest {
    /// Acting user identifier.
    pub user_id: Uuid,
    /// Reaction emoji or shortcode.
    #[validate(length(min = 1, max = 16))]
    pub emoji: String,
}

/// Power-up kinds a player can activate.
#[derive(Debug, Clone, Copy, Deserialize, Serialize, ToSchema, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum PowerUpKindDto {
    /// Doubles the points of the next correct answer.
    DoublePoints,
}

/// Payload activating a power-up for the acting player.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct PowerUpRequest {
    /// Acting user identifier.
    pub user_id: Uuid,
    /// Power-up to activate.
    pub kind: PowerUpKindDto,
}

/// Kind-specific question payload supplied when creating a game.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum QuestionKindInput {
    /// Pick one choice by index.
    MultipleChoice {
        /// Display choices; at least two required.
        choices: Vec<String>,
        /// Index into `choices` of the correct answer.
        correct_index: u32,
    },
    /// Boolean statement.
    TrueFalse {
        /// Whether the statement is true.
        correct: bool,
    },
    /// Free-text answer.
    TextInput {
        /// Accepted answers; at least one required.
        accepted: Vec<String>,
    },
    /// Extension type with a canonical answer.
    Canonical {
        /// Exact expected answer.
        answer: String,
    },
}

/// Upper bound on the base points of one question. Keeps the award
/// arithmetic (time bonus, streak bonus, doubling) far away from integer
/// overflow.
const MAX_QUESTION_POINTS: u32 = 10_000;

/// Question definition supplied when creating a game.
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct QuestionInput {
    /// Question text.
    pub prompt: String,
    /// Kind-specific payload.
    pub kind: QuestionKindInput,
    /// Base points for a correct answer.
    pub points: u32,
    /// Seconds allowed to answer.
    pub time_limit_secs: u32,
}

impl Validate for QuestionInput {
    fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.prompt.trim().is_empty() {
            errors.add("prompt", field_error("prompt_empty", "prompt must not be empty"));
        }
        if self.points == 0 {
            errors.add("points", field_error("points_zero", "points must be positive"));
        } else if self.points > MAX_QUESTION_POINTS {
            errors.add(
                "points",
                field_error("points_too_large", "points exceed the allowed maximum"),
            );
        }
        if self.time_limit_secs == 0 {
            errors.add(
                "time_limit_secs",
                field_error("time_limit_zero", "time limit must be positive"),
            );
        }

        match &self.kind {
            QuestionKindInput::MultipleChoice {
                choices,
                correct_index,
            } => {
                if choices.len() < 2 {
                    errors.add(
                        "kind",
                        field_error("choices_too_few", "at least two choices are required"),
                    );
                } else if *correct_index as usize >= choices.len() {
                    errors.add(
                        "kind",
                        field_error("correct_index_out_of_range", "correct index out of range"),
                    );
                }
            }
            QuestionKindInput::TextInput { accepted } => {
                if accepted.iter().all(|answer| answer.trim().is_empty()) {
                    errors.add(
                        "kind",
                        field_error("accepted_empty", "at least one accepted answer is required"),
                    );
                }
            }
            QuestionKindInput::TrueFalse { .. } => {}
            QuestionKindInput::Canonical { answer } => {
                if answer.trim().is_empty() {
                    errors.add(
                        "kind",
                        field_error("answer_empty", "canonical answer must not be empty"),
                    );
                }
            }
        }

        if errors.is_empty() { Ok(()) } else { Err(errors) }
    }
}

/// Payload used to create a new game definition.
#[derive(Debug, Deserialize, ToSchema, Validate)]
pub struct CreateGameRequest {
    /// User who will host the room.
    pub host_id: Uuid,
    /// Ordered question list; at least one question required.
    #[validate(length(min = 1), nested)]
    pub questions: Vec<QuestionInput>,
}

/// Response returned once a game definition has been created.
#[derive(Debug, Serialize, ToSchema)]
pub struct GameCreatedResponse {
    /// Primary key of the new game.
    pub game_id: Uuid,
    /// Shareable room code for joining.
    pub room_code: String,
}

/// Response returned after an answer submission.
#[derive(Debug, Serialize, ToSchema)]
pub struct SubmitAnswerResponse {
    /// Whether the answer was correct.
    pub correct: bool,
    /// Points awarded for this answer, bonuses included.
    pub points_earned: u32,
    /// Player's cumulative score after the answer.
    pub score: i64,
    /// Player's streak after the answer.
    pub streak: u32,
    /// Whether the round completed with this answer.
    pub round_complete: bool,
    /// Updated room snapshot.
    pub room: RoomSnapshot,
}

impl SubmitAnswerResponse {
    /// Combine an engine outcome with the post-mutation snapshot.
    pub fn from_outcome(outcome: AnswerOutcome, room: RoomSnapshot) -> Self {
        Self {
            correct: outcome.correct,
            points_earned: outcome.points_earned,
            score: outcome.score,
            streak: outcome.streak,
            round_complete: outcome.round_complete,
            room,
        }
    }
}

fn field_error(code: &'static str, message: &'static str) -> ValidationError {
    let mut err = ValidationError::new(code);
    err.message = Some(message.into());
    err
}

#[cfg(test)]
mod tests {
    use super::*;

    fn question(points: u32) -> QuestionInput {
        QuestionInput {
            prompt: "Largest moon of Saturn?".into(),
            kind: QuestionKindInput::TextInput {
                accepted: vec!["Titan".into()],
            },
            points,
            time_limit_secs: 30,
        }
    }

    #[test]
    fn test_create_game_request_validates_nested_questions() {
        let valid = CreateGameRequest {
            host_id: Uuid::new_v4(),
            questions: vec![question(100)],
        };
        assert!(valid.validate().is_ok());

        let empty = CreateGameRequest {
            host_id: Uuid::new_v4(),
            questions: Vec::new(),
        };
        assert!(empty.validate().is_err());
    }

    #[test]
    fn test_question_points_must_stay_in_bounds() {
        assert!(question(0).validate().is_err());
        assert!(question(MAX_QUESTION_POINTS).validate().is_ok());
        assert!(question(MAX_QUESTION_POINTS + 1).validate().is_err());
    }

    #[test]
    fn test_multiple_choice_needs_a_valid_correct_index() {
        let input = QuestionInput {
            prompt: "pick one".into(),
            kind: QuestionKindInput::MultipleChoice {
                choices: vec!["a".into(), "b".into()],
                correct_index: 2,
            },
            points: 100,
            time_limit_secs: 30,
        };
        assert!(input.validate().is_err());
    }
}
