//! Idle-room reclamation.
//!
//! A fixed-interval sweep closes and evicts every room whose membership has
//! dropped to zero. The sweep takes the room's action lock before closing
//! the engine, so an action that is still mid-flight (the leader may have
//! disconnected while holding the lock) runs to completion first; anything
//! arriving after the close fails fast with `EngineClosed`.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::session::coordinator::SessionCoordinator;

/// Sweeps once: closes and removes every currently empty room.
///
/// Returns the ids of the rooms that were reclaimed.
pub async fn sweep(coordinator: &SessionCoordinator) -> Vec<String> {
    let mut reclaimed = Vec::new();

    for room in coordinator.registry().rooms().await {
        if !room.is_empty().await {
            continue;
        }

        // Remove the mapping first so no new participant can join a room
        // whose engine is about to go away.
        if coordinator.registry().remove(&room.id).await.is_none() {
            continue;
        }

        let _guard = room.action_lock.lock().await;

        // A joiner may have grabbed the room handle before the mapping was
        // removed; if membership came back, put the room back instead of
        // closing it underneath them.
        if !room.is_empty().await {
            coordinator.registry().reinstate(room.clone()).await;
            debug!(room = %room.id, "reap aborted, room repopulated");
            continue;
        }

        match room.engine.close().await {
            Ok(true) => {
                info!(room = %room.id, "reclaimed idle room");
                reclaimed.push(room.id.clone());
            }
            Ok(false) => {
                debug!(room = %room.id, "engine already closed");
                reclaimed.push(room.id.clone());
            }
            Err(e) => {
                warn!(room = %room.id, error = %e, "failed to close engine while reaping");
            }
        }
    }

    reclaimed
}

/// Runs the reaper until the shutdown signal flips to `true`.
pub async fn run_reaper(
    coordinator: Arc<SessionCoordinator>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
) {
    let mut ticker = interval(period);
    // The immediate first tick would sweep an empty registry; skip it.
    ticker.tick().await;

    loop {
        tokio::select! {
            _ = ticker.tick() => {
                let reclaimed = sweep(&coordinator).await;
                if !reclaimed.is_empty() {
                    debug!(count = reclaimed.len(), "reaper sweep complete");
                }
            }
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    debug!("reaper shutting down");
                    return;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ServerSettings;
    use crate::engine::MockEngineSpawner;
    use crate::session::broadcaster::Broadcaster;
    use crate::session::room::ParticipantId;

    fn coordinator_with_spawner() -> (SessionCoordinator, Arc<MockEngineSpawner>) {
        let spawner = Arc::new(MockEngineSpawner::new());
        let coordinator = SessionCoordinator::new(
            Arc::new(Broadcaster::new()),
            spawner.clone(),
            ServerSettings::default(),
        );
        (coordinator, spawner)
    }

    #[tokio::test]
    async fn sweep_removes_only_empty_rooms() {
        let (coordinator, spawner) = coordinator_with_spawner();
        let leader = ParticipantId::new();

        coordinator.create_room("occupied", leader).await.unwrap();

        let drifter = ParticipantId::new();
        coordinator.create_room("deserted", drifter).await.unwrap();
        coordinator.leave("deserted", drifter).await;

        let reclaimed = sweep(&coordinator).await;
        assert_eq!(reclaimed, vec!["deserted".to_string()]);
        assert!(coordinator.registry().get("occupied").await.is_ok());
        assert!(coordinator.registry().get("deserted").await.is_err());

        // The deserted room's engine was released, the occupied one kept.
        let engines = spawner.engines().await;
        assert!(!engines[0].is_closed().await);
        assert!(engines[1].is_closed().await);
    }

    #[tokio::test]
    async fn engine_is_released_exactly_once() {
        let (coordinator, spawner) = coordinator_with_spawner();
        let leader = ParticipantId::new();
        coordinator.create_room("abc", leader).await.unwrap();
        coordinator.leave("abc", leader).await;

        assert_eq!(sweep(&coordinator).await, vec!["abc".to_string()]);
        // A second sweep finds no trace of the room.
        assert!(sweep(&coordinator).await.is_empty());

        let engines = spawner.engines().await;
        assert_eq!(engines.len(), 1);
        assert!(engines[0].is_closed().await);
    }
}
