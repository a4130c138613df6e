//! In-process store of active power-up effects.
//!
//! Effects are ephemeral gameplay state, scoped to a (game, player) pair.
//! They never touch durable storage: if the process restarts mid-game the
//! effect is simply lost, which is acceptable for a cosmetic booster.

use std::time::{Duration, Instant};

use dashmap::DashMap;
use uuid::Uuid;

use crate::{dto::room::PowerUpKindDto, error::ServiceError};

/// Maximum activations per player per game. Advisory only: the limit guards
/// against spam, not against cheating.
const MAX_ACTIVATIONS_PER_GAME: u32 = 3;

/// Unconsumed effects lapse after this long.
const EFFECT_TTL: Duration = Duration::from_secs(300);

/// Power-up kinds known to the engine.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PowerUpKind {
    /// Doubles the points of the next correct answer, then expires.
    DoublePoints,
}

impl From<PowerUpKindDto> for PowerUpKind {
    fn from(value: PowerUpKindDto) -> Self {
        match value {
            PowerUpKindDto::DoublePoints => PowerUpKind::DoublePoints,
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveEffect {
    kind: PowerUpKind,
    expires_at: Instant,
}

impl ActiveEffect {
    fn is_live(&self) -> bool {
        Instant::now() < self.expires_at
    }
}

/// Tracks which players currently hold an active effect.
pub struct PowerUpService {
    active: DashMap<(Uuid, Uuid), ActiveEffect>,
    activations: DashMap<(Uuid, Uuid), u32>,
}

impl PowerUpService {
    /// Create an empty effect store.
    pub fn new() -> Self {
        Self {
            active: DashMap::new(),
            activations: DashMap::new(),
        }
    }

    /// Activate an effect for a player.
    ///
    /// Fails with [`ServiceError::Conflict`] when the player already holds an
    /// unconsumed effect or has exhausted the per-game activation allowance.
    pub fn activate(
        &self,
        game_id: Uuid,
        player_id: Uuid,
        kind: PowerUpKind,
    ) -> Result<(), ServiceError> {
        let key = (game_id, player_id);
        if self.active.get(&key).is_some_and(|effect| effect.is_live()) {
            return Err(ServiceError::Conflict(
                "A power-up is already active".into(),
            ));
        }

        let mut used = self.activations.entry(key).or_insert(0);
        if *used >= MAX_ACTIVATIONS_PER_GAME {
            return Err(ServiceError::Conflict(
                "Power-up allowance exhausted for this game".into(),
            ));
        }
        *used += 1;
        drop(used);

        self.active.insert(
            key,
            ActiveEffect {
                kind,
                expires_at: Instant::now() + EFFECT_TTL,
            },
        );
        Ok(())
    }

    /// Whether the player holds an unconsumed, unexpired double-points effect.
    pub fn has_double_points(&self, game_id: Uuid, player_id: Uuid) -> bool {
        self.active
            .get(&(game_id, player_id))
            .is_some_and(|effect| effect.kind == PowerUpKind::DoublePoints && effect.is_live())
    }

    /// Consume the player's double-points effect, returning whether one was
    /// active. One-shot: a consumed effect never applies twice.
    pub fn consume_double_points(&self, game_id: Uuid, player_id: Uuid) -> bool {
        self.active
            .remove_if(&(game_id, player_id), |_, effect| {
                effect.kind == PowerUpKind::DoublePoints
            })
            .is_some_and(|(_, effect)| effect.is_live())
    }

    /// Drop effects whose TTL lapsed without being consumed.
    pub fn purge_expired(&self) {
        self.active.retain(|_, effect| effect.is_live());
    }

    /// Drop all effects and counters belonging to a game. Called when the
    /// room is evicted.
    pub fn clear_game(&self, game_id: Uuid) {
        self.active.retain(|(game, _), _| *game != game_id);
        self.activations.retain(|(game, _), _| *game != game_id);
    }
}

impl Default for PowerUpService {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_activate_then_consume_is_one_shot() {
        let service = PowerUpService::new();
        let game = Uuid::new_v4();
        let player = Uuid::new_v4();

        service
            .activate(game, player, PowerUpKind::DoublePoints)
            .unwrap();
        assert!(service.has_double_points(game, player));
        assert!(service.consume_double_points(game, player));
        assert!(!service.has_double_points(game, player));
        assert!(!service.consume_double_points(game, player));
    }

    #[test]
    fn test_double_activation_rejected() {
        let service = PowerUpService::new();
        let game = Uuid::new_v4();
        let player = Uuid::new_v4();

        service
            .activate(game, player, PowerUpKind::DoublePoints)
            .unwrap();
        assert!(service.activate(game, player, PowerUpKind::DoublePoints).is_err());
    }

    #[test]
    fn test_allowance_exhausted_after_three_activations() {
        let service = PowerUpService::new();
        let game = Uuid::new_v4();
        let player = Uuid::new_v4();

        for _ in 0..3 {
            service
                .activate(game, player, PowerUpKind::DoublePoints)
                .unwrap();
            assert!(service.consume_double_points(game, player));
        }
        assert!(service.activate(game, player, PowerUpKind::DoublePoints).is_err());
    }

    #[test]
    fn test_clear_game_resets_allowance() {
        let service = PowerUpService::new();
        let game = Uuid::new_v4();
        let player = Uuid::new_v4();

        service
            .activate(game, player, PowerUpKind::DoublePoints)
            .unwrap();
        service.clear_game(game);
        assert!(!service.has_double_points(game, player));
        assert!(service.activate(game, player, PowerUpKind::DoublePoints).is_ok());
    }

    #[test]
    fn test_purge_expired_keeps_live_effects() {
        let service = PowerUpService::new();
        let game = Uuid::new_v4();
        let player = Uuid::new_v4();

        service
            .activate(game, player, PowerUpKind::DoublePoints)
            .unwrap();
        service.purge_expired();
        assert!(service.has_double_points(game, player));
    }
}
