//! In-process reference implementation of [`GameStore`].
//!
//! Backs single-node deployments and the test suite. All operations run under
//! one mutex, which is what makes [`GameStore::record_answer`] atomic: the
//! duplicate check, the record insert and the score bump cannot interleave
//! with a concurrent submission for the same (player, question) pair.

use std::{
    collections::{HashMap, HashSet},
    sync::{Arc, Mutex},
    time::SystemTime,
};

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::{
    game_store::GameStore,
    models::{
        AnswerRecordEntity, GameEntity, GameStatusEntity, PlayerEntity, PlayerResultEntity,
        QuestionEntity,
    },
    storage::{StorageError, StorageResult},
};

#[derive(Default)]
struct Inner {
    games: HashMap<Uuid, GameEntity>,
    players: HashMap<Uuid, Vec<PlayerEntity>>,
    questions: HashMap<Uuid, Vec<QuestionEntity>>,
    answers: HashMap<(Uuid, Uuid), Vec<AnswerRecordEntity>>,
    answered: HashSet<(Uuid, Uuid, Uuid)>,
}

/// In-memory [`GameStore`] backed by a single mutex.
#[derive(Clone, Default)]
pub struct InMemoryGameStore {
    inner: Arc<Mutex<Inner>>,
}

impl InMemoryGameStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        // A poisoned lock means a panic mid-write; propagating the panic is
        // preferable to serving half-applied state.
        self.inner.lock().expect("in-memory store lock poisoned")
    }
}

impl GameStore for InMemoryGameStore {
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            if inner.games.contains_key(&game.id) {
                return Err(StorageError::Duplicate(format!(
                    "game `{}` already exists",
                    game.id
                )));
            }
            inner.players.entry(game.id).or_default();
            inner.games.insert(game.id, game);
            Ok(())
        })
    }

    fn insert_questions(
        &self,
        game_id: Uuid,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let slot = inner.questions.entry(game_id).or_default();
            slot.extend(questions);
            slot.sort_by_key(|question| question.position);
            Ok(())
        })
    }

    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().games.get(&id).cloned()) })
    }

    fn find_game_by_code(
        &self,
        room_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .lock()
                .games
                .values()
                .find(|game| game.room_code == room_code)
                .cloned())
        })
    }

    fn find_players(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>> {
        let store = self.clone();
        Box::pin(async move { Ok(store.lock().players.get(&game_id).cloned().unwrap_or_default()) })
    }

    fn find_questions(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>> {
        let store = self.clone();
        Box::pin(
            async move { Ok(store.lock().questions.get(&game_id).cloned().unwrap_or_default()) },
        )
    }

    fn upsert_player(
        &self,
        game_id: Uuid,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let seats = inner.players.entry(game_id).or_default();
            match seats.iter_mut().find(|seat| seat.user_id == player.user_id) {
                Some(seat) => *seat = player,
                None => seats.push(player),
            }
            Ok(())
        })
    }

    fn remove_player(
        &self,
        game_id: Uuid,
        user_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            if let Some(seats) = inner.players.get_mut(&game_id) {
                seats.retain(|seat| seat.user_id != user_id);
            }
            Ok(())
        })
    }

    fn update_game_host(
        &self,
        game_id: Uuid,
        host_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let Some(game) = inner.games.get_mut(&game_id) else {
                return Ok(());
            };
            game.host_id = host_id;
            game.updated_at = SystemTime::now();
            Ok(())
        })
    }

    fn record_answer(
        &self,
        record: AnswerRecordEntity,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let key = (record.game_id, record.question_id, record.player_id);
            if !inner.answered.insert(key) {
                return Err(StorageError::Duplicate(format!(
                    "player `{}` already answered question `{}`",
                    record.player_id, record.question_id
                )));
            }

            if let Some(seats) = inner.players.get_mut(&record.game_id)
                && let Some(seat) = seats
                    .iter_mut()
                    .find(|seat| seat.user_id == record.player_id)
            {
                seat.score += i64::from(record.points_earned);
            }

            let bucket = inner
                .answers
                .entry((record.game_id, record.question_id))
                .or_default();
            bucket.push(record);
            Ok(bucket.len() as u64)
        })
    }

    fn count_answers(
        &self,
        game_id: Uuid,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>> {
        let store = self.clone();
        Box::pin(async move {
            Ok(store
                .lock()
                .answers
                .get(&(game_id, question_id))
                .map_or(0, |bucket| bucket.len() as u64))
        })
    }

    fn update_game_status(
        &self,
        game_id: Uuid,
        status: GameStatusEntity,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let Some(game) = inner.games.get_mut(&game_id) else {
                return Ok(());
            };
            game.status = status;
            game.updated_at = SystemTime::now();
            Ok(())
        })
    }

    fn save_results(
        &self,
        game_id: Uuid,
        results: Vec<PlayerResultEntity>,
    ) -> BoxFuture<'static, StorageResult<()>> {
        let store = self.clone();
        Box::pin(async move {
            let mut inner = store.lock();
            let Some(seats) = inner.players.get_mut(&game_id) else {
                return Ok(());
            };
            for result in results {
                if let Some(seat) = seats.iter_mut().find(|seat| seat.user_id == result.player_id)
                {
                    seat.score = result.score;
                    seat.rank = Some(result.rank);
                }
            }
            Ok(())
        })
    }

    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }

    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>> {
        Box::pin(async { Ok(()) })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dao::models::{AnswerValue, QuestionKindEntity};

    fn game(id: Uuid) -> GameEntity {
        GameEntity {
            id,
            room_code: "AB12CD".into(),
            host_id: Uuid::new_v4(),
            status: GameStatusEntity::Waiting,
            created_at: SystemTime::now(),
            updated_at: SystemTime::now(),
        }
    }

    fn record(game_id: Uuid, player_id: Uuid, question_id: Uuid) -> AnswerRecordEntity {
        AnswerRecordEntity {
            game_id,
            player_id,
            question_id,
            answer: Some(AnswerValue::Choice(1)),
            is_correct: true,
            points_earned: 120,
            time_spent_ms: 4_000,
            created_at: SystemTime::now(),
        }
    }

    #[tokio::test]
    async fn record_answer_rejects_duplicates() {
        let store = InMemoryGameStore::new();
        let game_id = Uuid::new_v4();
        let player_id = Uuid::new_v4();
        let question_id = Uuid::new_v4();
        store.insert_game(game(game_id)).await.unwrap();

        let count = store
            .record_answer(record(game_id, player_id, question_id))
            .await
            .unwrap();
        assert_eq!(count, 1);

        let err = store
            .record_answer(record(game_id, player_id, question_id))
            .await
            .unwrap_err();
        assert!(matches!(err, StorageError::Duplicate(_)));
        assert_eq!(store.count_answers(game_id, question_id).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn record_answer_accumulates_player_score() {
        let store = InMemoryGameStore::new();
        let game_id = Uuid::new_v4();
        let player_id = Uuid::new_v4();
        store.insert_game(game(game_id)).await.unwrap();
        store
            .upsert_player(
                game_id,
                PlayerEntity {
                    user_id: player_id,
                    username: "lena".into(),
                    avatar: "fox".into(),
                    score: 0,
                    rank: None,
                },
            )
            .await
            .unwrap();

        store
            .record_answer(record(game_id, player_id, Uuid::new_v4()))
            .await
            .unwrap();
        store
            .record_answer(record(game_id, player_id, Uuid::new_v4()))
            .await
            .unwrap();

        let players = store.find_players(game_id).await.unwrap();
        assert_eq!(players[0].score, 240);
    }

    #[tokio::test]
    async fn concurrent_duplicate_submissions_accept_exactly_one() {
        let store = InMemoryGameStore::new();
        let game_id = Uuid::new_v4();
        let player_id = Uuid::new_v4();
        let question_id = Uuid::new_v4();
        store.insert_game(game(game_id)).await.unwrap();

        let mut tasks = Vec::new();
        for _ in 0..16 {
            let store = store.clone();
            tasks.push(tokio::spawn(async move {
                store
                    .record_answer(record(game_id, player_id, question_id))
                    .await
            }));
        }

        let mut accepted = 0;
        for task in tasks {
            if task.await.unwrap().is_ok() {
                accepted += 1;
            }
        }
        assert_eq!(accepted, 1);
    }

    #[tokio::test]
    async fn questions_are_returned_in_position_order() {
        let store = InMemoryGameStore::new();
        let game_id = Uuid::new_v4();
        let question = |position: u32| QuestionEntity {
            id: Uuid::new_v4(),
            position,
            prompt: format!("q{position}"),
            kind: QuestionKindEntity::TrueFalse { correct: true },
            points: 100,
            time_limit_secs: 30,
        };
        store
            .insert_questions(game_id, vec![question(2), question(0), question(1)])
            .await
            .unwrap();

        let positions: Vec<u32> = store
            .find_questions(game_id)
            .await
            .unwrap()
            .iter()
            .map(|q| q.position)
            .collect();
        assert_eq!(positions, vec![0, 1, 2]);
    }
}
