pub mod memory;

use futures::future::BoxFuture;
use uuid::Uuid;

use crate::dao::models::{
    AnswerRecordEntity, GameEntity, GameStatusEntity, PlayerEntity, PlayerResultEntity,
    QuestionEntity,
};
use crate::dao::storage::StorageResult;

/// Abstraction over the persistence layer for games, players, questions and
/// answer records.
///
/// The durable store is the arbiter of "has this player answered": backends
/// must implement [`GameStore::record_answer`] with a uniqueness constraint or
/// equivalent atomic check, never a read-then-write sequence, so that
/// concurrent submissions arriving over both transports cannot double-score.
pub trait GameStore: Send + Sync {
    /// Persist a freshly created game.
    fn insert_game(&self, game: GameEntity) -> BoxFuture<'static, StorageResult<()>>;
    /// Persist the ordered question list for a game.
    fn insert_questions(
        &self,
        game_id: Uuid,
        questions: Vec<QuestionEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Fetch a game by primary key.
    fn find_game(&self, id: Uuid) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Fetch a game by its shareable room code.
    fn find_game_by_code(
        &self,
        room_code: String,
    ) -> BoxFuture<'static, StorageResult<Option<GameEntity>>>;
    /// Fetch the seated players of a game in join order.
    fn find_players(&self, game_id: Uuid) -> BoxFuture<'static, StorageResult<Vec<PlayerEntity>>>;
    /// Fetch the questions of a game ordered by position.
    fn find_questions(
        &self,
        game_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<Vec<QuestionEntity>>>;
    /// Insert or update a seated player row.
    fn upsert_player(
        &self,
        game_id: Uuid,
        player: PlayerEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Delete a seated player row; deleting an absent row is not an error.
    fn remove_player(&self, game_id: Uuid, user_id: Uuid)
    -> BoxFuture<'static, StorageResult<()>>;
    /// Record a host transfer on the game row.
    fn update_game_host(
        &self,
        game_id: Uuid,
        host_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Atomically insert an answer record and bump the player's cumulative
    /// score, then return the durable answer count for the question.
    ///
    /// Fails with [`crate::dao::storage::StorageError::Duplicate`] when the
    /// player already has a record for this question.
    fn record_answer(&self, record: AnswerRecordEntity)
    -> BoxFuture<'static, StorageResult<u64>>;
    /// Count durable answer records for one question of a game.
    fn count_answers(
        &self,
        game_id: Uuid,
        question_id: Uuid,
    ) -> BoxFuture<'static, StorageResult<u64>>;
    /// Update the coarse status of a game.
    fn update_game_status(
        &self,
        game_id: Uuid,
        status: GameStatusEntity,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Write the final per-player results of a finished game.
    fn save_results(
        &self,
        game_id: Uuid,
        results: Vec<PlayerResultEntity>,
    ) -> BoxFuture<'static, StorageResult<()>>;
    /// Cheap connectivity probe.
    fn health_check(&self) -> BoxFuture<'static, StorageResult<()>>;
    /// Attempt to re-establish the backend connection after a failed probe.
    fn try_reconnect(&self) -> BoxFuture<'static, StorageResult<()>>;
}
