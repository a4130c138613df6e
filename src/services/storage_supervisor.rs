//! Background supervision of the durable store and the room cache.
//!
//! The store supervisor keeps trying to connect with exponential backoff and
//! flips the application in and out of degraded mode as the backend comes and
//! goes. The cache supervisor is gentler: the cache is best-effort, so a lost
//! Redis only means falling back to the in-process cache, never degraded mode.

use std::{future::Future, sync::Arc, time::Duration};

use tokio::time::sleep;
use tracing::{info, warn};

use crate::{
    cache::{ROOM_KEY_PATTERN, RoomCache, memory::InMemoryRoomCache, redis::RedisRoomCache},
    dao::{game_store::GameStore, storage::StorageError},
    state::SharedState,
};

const INITIAL_DELAY: Duration = Duration::from_millis(1_000);
const MAX_DELAY: Duration = Duration::from_secs(10);
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(5);
const MAX_RECONNECT_ATTEMPTS: u32 = 3;

/// Connect to the storage backend and keep the shared state in degraded mode
/// while it is unavailable.
pub async fn run<F, Fut>(state: SharedState, mut connect: F)
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = Result<Arc<dyn GameStore>, StorageError>> + Send,
{
    let mut delay = INITIAL_DELAY;

    loop {
        match connect().await {
            Ok(store) => {
                state.install_game_store(store.clone()).await;
                info!("storage connection established; leaving degraded mode");
                delay = INITIAL_DELAY;

                loop {
                    match store.health_check().await {
                        Ok(()) => {
                            if state.is_degraded().await {
                                info!("storage healthy again; leaving degraded mode");
                                state.update_degraded(false);
                            }
                            sleep(HEALTH_POLL_INTERVAL).await;
                        }
                        Err(_) => {
                            let mut attempt = 0;
                            let mut reconnect_delay = INITIAL_DELAY;
                            let mut reconnected = false;

                            while attempt < MAX_RECONNECT_ATTEMPTS {
                                match store.try_reconnect().await {
                                    Ok(()) => {
                                        info!(
                                            "storage reconnection succeeded after health check failure"
                                        );
                                        reconnected = true;
                                        break;
                                    }
                                    Err(reconnect_err) => {
                                        if attempt == 0 {
                                            warn!(
                                                attempt, error = %reconnect_err,
                                                "storage reconnect first attempt failed; entering degraded mode"
                                            );
                                            state.update_degraded(true);
                                        } else {
                                            warn!(attempt, error = %reconnect_err, "storage reconnect attempt failed");
                                        }
                                        attempt += 1;
                                        sleep(reconnect_delay).await;
                                        reconnect_delay = (reconnect_delay * 2).min(MAX_DELAY);
                                    }
                                }
                            }

                            if reconnected {
                                state.update_degraded(false);
                                sleep(HEALTH_POLL_INTERVAL).await;
                            } else {
                                warn!(
                                    "exhausted storage reconnect attempts; staying in degraded mode"
                                );
                                state.clear_game_store().await;
                                break;
                            }
                        }
                    }
                }

                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
            Err(err) => {
                warn!(error = %err, "storage connection attempt failed");
                sleep(delay).await;
                delay = (delay * 2).min(MAX_DELAY);
            }
        }
    }
}

/// Keep the room cache attached, preferring Redis when configured.
///
/// The in-process cache is installed immediately so rooms are always mirrored
/// somewhere; when Redis is configured the supervisor upgrades to it as soon
/// as it connects, and falls back again when its health checks fail.
pub async fn run_cache(state: SharedState) {
    state
        .install_room_cache(Arc::new(InMemoryRoomCache::new()))
        .await;

    let Some(redis_url) = state.config().redis_url.clone() else {
        info!("no redis configured; using the in-process room cache");
        return;
    };

    let mut delay = INITIAL_DELAY;
    loop {
        match RedisRoomCache::connect(&redis_url).await {
            Ok(cache) => {
                let cache: Arc<dyn RoomCache> = Arc::new(cache);
                state.install_room_cache(cache.clone()).await;
                info!("redis room cache connected");
                delay = INITIAL_DELAY;

                // Rooms cached by a previous process restore lazily on first
                // lookup; just report how many are waiting.
                if let Ok(keys) = cache.keys(ROOM_KEY_PATTERN.to_string()).await
                    && !keys.is_empty()
                {
                    info!(count = keys.len(), "cached rooms available for restore");
                }

                loop {
                    sleep(HEALTH_POLL_INTERVAL).await;
                    if let Err(err) = cache.health_check().await {
                        warn!(error = %err, "redis cache unhealthy; falling back to in-process cache");
                        state
                            .install_room_cache(Arc::new(InMemoryRoomCache::new()))
                            .await;
                        break;
                    }
                }
            }
            Err(err) => {
                warn!(error = %err, "redis cache connection attempt failed");
            }
        }

        sleep(delay).await;
        delay = (delay * 2).min(MAX_DELAY);
    }
}
