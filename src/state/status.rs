use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Lifecycle status of a live room.
///
/// The per-question cycle is `QuestionActive -> ResultsDisplay -> Transition ->
/// QuestionActive`; solo rooms skip `ResultsDisplay` and go straight through
/// `Transition`. `Paused` is a side state that remembers where to resume.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RoomStatus {
    /// Lobby is open; players join and mark themselves ready.
    Waiting,
    /// The host started the game but no question is open yet.
    InProgress,
    /// A question is open and accepting answers.
    QuestionActive,
    /// Per-question results are shown while waiting for the next question.
    ResultsDisplay,
    /// Brief gap between questions while clients load the next one.
    Transition,
    /// Gameplay is paused; `resume_to` is the status to restore.
    Paused {
        /// Status the room returns to on resume.
        resume_to: Box<RoomStatus>,
    },
    /// Terminal state; ranks are final and the room is about to be evicted.
    Finished,
}

/// Events that drive the room status machine.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RoomEvent {
    /// Host starts the game from the lobby.
    Start,
    /// The next (or first) question opens for answers.
    OpenQuestion,
    /// All players answered (or the host forced results display).
    ShowResults,
    /// Move from results into the inter-question gap.
    NextQuestion,
    /// Terminal transition: last question resolved or room abandoned.
    Finish,
    /// Pause gameplay, remembering the current status.
    Pause,
    /// Resume a paused room.
    Resume,
}

/// Error returned when attempting to apply an invalid transition.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("invalid transition: {event:?} cannot be applied while in {from:?}")]
pub struct InvalidTransition {
    /// The status the room was in when the invalid event was received.
    pub from: RoomStatus,
    /// The event that cannot be applied from this status.
    pub event: RoomEvent,
}

impl RoomStatus {
    /// True while the room accepts answer submissions.
    pub fn is_answerable(&self) -> bool {
        matches!(self, RoomStatus::QuestionActive)
    }

    /// True once the room reached its terminal state.
    pub fn is_finished(&self) -> bool {
        matches!(self, RoomStatus::Finished)
    }

    /// Compute the status reached by applying `event`, or reject the pair.
    ///
    /// Every legal transition is listed explicitly; anything else is an
    /// [`InvalidTransition`].
    pub fn apply(&self, event: RoomEvent) -> Result<RoomStatus, InvalidTransition> {
        let next = match (self.clone(), event) {
            (RoomStatus::Waiting, RoomEvent::Start) => RoomStatus::InProgress,
            (RoomStatus::InProgress, RoomEvent::OpenQuestion) => RoomStatus::QuestionActive,
            (RoomStatus::QuestionActive, RoomEvent::ShowResults) => RoomStatus::ResultsDisplay,
            (RoomStatus::QuestionActive, RoomEvent::NextQuestion) => RoomStatus::Transition,
            (RoomStatus::ResultsDisplay, RoomEvent::NextQuestion) => RoomStatus::Transition,
            (RoomStatus::Transition, RoomEvent::OpenQuestion) => RoomStatus::QuestionActive,
            (
                from @ (RoomStatus::InProgress
                | RoomStatus::QuestionActive
                | RoomStatus::ResultsDisplay
                | RoomStatus::Transition),
                RoomEvent::Pause,
            ) => RoomStatus::Paused {
                resume_to: Box::new(from),
            },
            (RoomStatus::Paused { resume_to }, RoomEvent::Resume) => *resume_to,
            (from, RoomEvent::Finish) if !from.is_finished() => RoomStatus::Finished,
            (from, event) => return Err(InvalidTransition { from, event }),
        };

        Ok(next)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn apply(status: &mut RoomStatus, event: RoomEvent) -> RoomStatus {
        *status = status.apply(event).unwrap();
        status.clone()
    }

    #[test]
    fn full_happy_path_through_a_two_question_game() {
        let mut status = RoomStatus::Waiting;

        assert_eq!(apply(&mut status, RoomEvent::Start), RoomStatus::InProgress);
        assert_eq!(
            apply(&mut status, RoomEvent::OpenQuestion),
            RoomStatus::QuestionActive
        );
        assert_eq!(
            apply(&mut status, RoomEvent::ShowResults),
            RoomStatus::ResultsDisplay
        );
        assert_eq!(
            apply(&mut status, RoomEvent::NextQuestion),
            RoomStatus::Transition
        );
        assert_eq!(
            apply(&mut status, RoomEvent::OpenQuestion),
            RoomStatus::QuestionActive
        );
        assert_eq!(apply(&mut status, RoomEvent::Finish), RoomStatus::Finished);
    }

    #[test]
    fn solo_rooms_skip_results_display() {
        let mut status = RoomStatus::QuestionActive;
        assert_eq!(
            apply(&mut status, RoomEvent::NextQuestion),
            RoomStatus::Transition
        );
        assert_eq!(
            apply(&mut status, RoomEvent::OpenQuestion),
            RoomStatus::QuestionActive
        );
    }

    #[test]
    fn pause_remembers_where_to_resume() {
        let mut status = RoomStatus::QuestionActive;
        assert_eq!(
            apply(&mut status, RoomEvent::Pause),
            RoomStatus::Paused {
                resume_to: Box::new(RoomStatus::QuestionActive)
            }
        );
        assert_eq!(
            apply(&mut status, RoomEvent::Resume),
            RoomStatus::QuestionActive
        );
    }

    #[test]
    fn finish_is_reachable_from_any_live_status() {
        for status in [
            RoomStatus::Waiting,
            RoomStatus::InProgress,
            RoomStatus::QuestionActive,
            RoomStatus::ResultsDisplay,
            RoomStatus::Transition,
            RoomStatus::Paused {
                resume_to: Box::new(RoomStatus::QuestionActive),
            },
        ] {
            assert_eq!(status.apply(RoomEvent::Finish).unwrap(), RoomStatus::Finished);
        }
    }

    #[test]
    fn finished_is_terminal() {
        for event in [
            RoomEvent::Start,
            RoomEvent::OpenQuestion,
            RoomEvent::ShowResults,
            RoomEvent::NextQuestion,
            RoomEvent::Finish,
            RoomEvent::Pause,
            RoomEvent::Resume,
        ] {
            let err = RoomStatus::Finished.apply(event.clone()).unwrap_err();
            assert_eq!(err.from, RoomStatus::Finished);
            assert_eq!(err.event, event);
        }
    }

    #[test]
    fn invalid_transitions_are_rejected() {
        let err = RoomStatus::Waiting.apply(RoomEvent::OpenQuestion).unwrap_err();
        assert_eq!(err.from, RoomStatus::Waiting);
        assert_eq!(err.event, RoomEvent::OpenQuestion);

        assert!(RoomStatus::Waiting.apply(RoomEvent::Pause).is_err());
        assert!(RoomStatus::QuestionActive.apply(RoomEvent::Start).is_err());
        assert!(RoomStatus::ResultsDisplay.apply(RoomEvent::ShowResults).is_err());
        assert!(RoomStatus::Transition.apply(RoomEvent::Resume).is_err());
    }
}
