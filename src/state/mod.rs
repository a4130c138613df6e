/// Per-room broadcast hub.
pub mod hub;
/// Live room model.
pub mod room;
/// Room status state machine.
pub mod status;

use std::sync::Arc;

use dashmap::DashMap;
use tokio::sync::{Mutex, RwLock, watch};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::{
    cache::RoomCache, config::AppConfig, dao::game_store::GameStore, error::ServiceError,
    services::powerup_service::PowerUpService, state::room::Room,
};

pub use self::hub::RoomHub;

/// Shared handle to the application state.
pub type SharedState = Arc<AppState>;

/// Capacity of each per-room broadcast channel.
const HUB_CAPACITY: usize = 64;

/// Central application state storing live rooms, backend handles and
/// persistent connections.
pub struct AppState {
    config: AppConfig,
    game_store: RwLock<Option<Arc<dyn GameStore>>>,
    room_cache: RwLock<Option<Arc<dyn RoomCache>>>,
    rooms: DashMap<Uuid, Arc<Mutex<Room>>>,
    room_codes: DashMap<String, Uuid>,
    hubs: DashMap<Uuid, RoomHub>,
    grace_timers: DashMap<(Uuid, Uuid), JoinHandle<()>>,
    power_ups: PowerUpService,
    degraded: watch::Sender<bool>,
}

impl AppState {
    /// Construct a new [`AppState`] wrapped in an [`Arc`] so it can be cloned
    /// cheaply.
    ///
    /// The application starts in degraded mode until a storage backend is
    /// installed.
    pub fn new(config: AppConfig) -> SharedState {
        let (degraded_tx, _rx) = watch::channel(true);
        Arc::new(Self {
            config,
            game_store: RwLock::new(None),
            room_cache: RwLock::new(None),
            rooms: DashMap::new(),
            room_codes: DashMap::new(),
            hubs: DashMap::new(),
            grace_timers: DashMap::new(),
            power_ups: PowerUpService::new(),
            degraded: degraded_tx,
        })
    }

    /// Immutable runtime configuration.
    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    /// Obtain a handle to the current game store, if one is installed.
    pub async fn game_store(&self) -> Option<Arc<dyn GameStore>> {
        let guard = self.game_store.read().await;
        guard.as_ref().cloned()
    }

    /// Obtain the game store or fail with the degraded-mode error.
    pub async fn require_game_store(&self) -> Result<Arc<dyn GameStore>, ServiceError> {
        self.game_store().await.ok_or(ServiceError::Degraded)
    }

    /// Install a new game store implementation and leave degraded mode.
    pub async fn install_game_store(&self, store: Arc<dyn GameStore>) {
        {
            let mut guard = self.game_store.write().await;
            *guard = Some(store);
        }
        self.update_degraded(false);
    }

    /// Remove the current game store and enter degraded mode.
    pub async fn clear_game_store(&self) {
        {
            let mut guard = self.game_store.write().await;
            guard.take();
        }
        self.update_degraded(true);
    }

    /// Current degraded flag.
    pub async fn is_degraded(&self) -> bool {
        let guard = self.game_store.read().await;
        guard.is_none()
    }

    /// Subscribe to degraded mode updates.
    pub fn degraded_watcher(&self) -> watch::Receiver<bool> {
        self.degraded.subscribe()
    }

    /// Broadcast the degraded flag; duplicate sends are harmless.
    pub fn update_degraded(&self, value: bool) {
        let _ = self.degraded.send(value);
    }

    /// Obtain a handle to the room cache, if one is installed.
    pub async fn room_cache(&self) -> Option<Arc<dyn RoomCache>> {
        let guard = self.room_cache.read().await;
        guard.as_ref().cloned()
    }

    /// Install a new room cache implementation.
    pub async fn install_room_cache(&self, cache: Arc<dyn RoomCache>) {
        let mut guard = self.room_cache.write().await;
        *guard = Some(cache);
    }

    /// Drop the current room cache; the app degrades to in-process-only state.
    pub async fn clear_room_cache(&self) {
        let mut guard = self.room_cache.write().await;
        guard.take();
    }

    /// Registry of authoritative rooms keyed by game id.
    pub fn rooms(&self) -> &DashMap<Uuid, Arc<Mutex<Room>>> {
        &self.rooms
    }

    /// Index from room code to game id, maintained alongside `rooms`.
    pub fn room_codes(&self) -> &DashMap<String, Uuid> {
        &self.room_codes
    }

    /// Broadcast hub for a room, created on first use.
    pub fn room_hub(&self, game_id: Uuid) -> RoomHub {
        self.hubs
            .entry(game_id)
            .or_insert_with(|| RoomHub::new(HUB_CAPACITY))
            .clone()
    }

    /// Drop the broadcast hub of an evicted room.
    pub fn remove_room_hub(&self, game_id: Uuid) {
        self.hubs.remove(&game_id);
    }

    /// Pending grace-period timers keyed by (game id, player id).
    pub fn grace_timers(&self) -> &DashMap<(Uuid, Uuid), JoinHandle<()>> {
        &self.grace_timers
    }

    /// Injectable power-up effect store.
    pub fn power_ups(&self) -> &PowerUpService {
        &self.power_ups
    }
}
