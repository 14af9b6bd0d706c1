//! Latest-position snapshot store: single writer (the stepping thread),
//! many readers (request handlers). Overwrite-on-publish, no history.

use crate::bus::{EventBus, Subscription};
use crate::propagator::GroundPosition;
use std::sync::{Arc, RwLock};

#[derive(Debug, Default)]
pub struct PositionStore {
    slot: RwLock<Option<GroundPosition>>,
}

impl PositionStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn publish(&self, position: GroundPosition) {
        let mut slot = self.slot.write().unwrap_or_else(|e| e.into_inner());
        *slot = Some(position);
    }

    /// Snapshot-consistent copy of the last published position, if any.
    pub fn latest(&self) -> Option<GroundPosition> {
        *self.slot.read().unwrap_or_else(|e| e.into_inner())
    }
}

/// Subscribe the store to position events, caching the latest one. This is
/// the camera-cache subscriber: it owns no clock state and feeds the
/// position query endpoint.
pub fn attach_position_cache(bus: &mut EventBus, store: Arc<PositionStore>) -> Subscription {
    bus.subscribe_ground_position(move |position| {
        store.publish(*position);
        Ok(())
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clock::SimTime;

    fn position(elapsed: f64) -> GroundPosition {
        GroundPosition {
            longitude_deg: elapsed,
            latitude_deg: 0.0,
            altitude_km: 560.0,
            time: SimTime {
                epoch_seconds: elapsed,
                elapsed_seconds: elapsed,
            },
        }
    }

    #[test]
    fn test_store_is_empty_until_first_publication() {
        let store = PositionStore::new();
        assert!(store.latest().is_none());
    }

    #[test]
    fn test_publish_overwrites_previous_snapshot() {
        let store = PositionStore::new();
        store.publish(position(10.0));
        store.publish(position(20.0));
        let latest = store.latest().unwrap();
        assert_eq!(latest.time.elapsed_seconds, 20.0);
    }

    #[test]
    fn test_cache_subscriber_tracks_bus_publications() {
        let mut bus = EventBus::new();
        let store = Arc::new(PositionStore::new());
        attach_position_cache(&mut bus, Arc::clone(&store));

        bus.publish_ground_position(&position(30.0));
        assert_eq!(store.latest().unwrap().time.elapsed_seconds, 30.0);
    }
}
