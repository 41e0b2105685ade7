//! Last-known-good device state shared between the inbound dispatcher and the
//! client sessions.
//!
//! The dispatcher is the only writer.  Sessions read a full snapshot when a new
//! client joins so it sees current values without waiting for the device to
//! report again.
//!
//! Every getter and setter takes the same `std::sync::Mutex`, so a reader never
//! observes a half-applied update.  The lock is held only for a field copy and
//! is never held across an `.await`.

use std::sync::{Mutex, MutexGuard, PoisonError};

use thermal_core::{ColorScheme, DeviceState};

/// Mutex-guarded [`DeviceState`].
///
/// No range validation happens here: whatever the device reports is stored.
#[derive(Debug, Default)]
pub struct DeviceStateCache {
    state: Mutex<DeviceState>,
}

impl DeviceStateCache {
    /// Creates a cache holding [`DeviceState::default`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a cache seeded with `state`.
    pub fn with_state(state: DeviceState) -> Self {
        Self {
            state: Mutex::new(state),
        }
    }

    // A panic while holding this lock can only happen between two plain field
    // writes, so the data behind a poisoned lock is still a valid state.
    fn lock(&self) -> MutexGuard<'_, DeviceState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Copy of all three values, taken atomically.
    pub fn snapshot(&self) -> DeviceState {
        *self.lock()
    }

    pub fn zoom_level(&self) -> i32 {
        self.lock().zoom_level
    }

    pub fn color_scheme(&self) -> ColorScheme {
        self.lock().color_scheme
    }

    pub fn battery_level(&self) -> i32 {
        self.lock().battery_level
    }

    pub fn update_zoom_level(&self, level: i32) {
        self.lock().zoom_level = level;
    }

    pub fn update_color_scheme(&self, scheme: ColorScheme) {
        self.lock().color_scheme = scheme;
    }

    pub fn update_battery_level(&self, level: i32) {
        self.lock().battery_level = level;
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    #[test]
    fn test_new_cache_holds_defaults() {
        let cache = DeviceStateCache::new();
        assert_eq!(cache.snapshot(), DeviceState::default());
    }

    #[test]
    fn test_update_then_get_returns_stored_value() {
        // Arrange
        let cache = DeviceStateCache::new();

        // Act
        cache.update_zoom_level(4);
        cache.update_color_scheme(ColorScheme::Sepia);
        cache.update_battery_level(61);

        // Assert
        assert_eq!(cache.zoom_level(), 4);
        assert_eq!(cache.color_scheme(), ColorScheme::Sepia);
        assert_eq!(cache.battery_level(), 61);
    }

    #[test]
    fn test_updates_only_touch_their_own_field() {
        let cache = DeviceStateCache::with_state(DeviceState {
            zoom_level: 1,
            color_scheme: ColorScheme::WhiteHot,
            battery_level: 50,
        });

        cache.update_battery_level(49);

        assert_eq!(cache.zoom_level(), 1);
        assert_eq!(cache.color_scheme(), ColorScheme::WhiteHot);
        assert_eq!(cache.battery_level(), 49);
    }

    #[test]
    fn test_out_of_range_values_are_stored_as_received() {
        let cache = DeviceStateCache::new();
        cache.update_battery_level(-20);
        cache.update_color_scheme(ColorScheme::Other(99));
        assert_eq!(cache.battery_level(), -20);
        assert_eq!(cache.color_scheme(), ColorScheme::Other(99));
    }

    #[tokio::test]
    async fn test_update_is_visible_from_another_task() {
        // Arrange
        let cache = Arc::new(DeviceStateCache::new());
        cache.update_zoom_level(12);

        // Act: read from a separately spawned task
        let reader = Arc::clone(&cache);
        let seen = tokio::spawn(async move { reader.zoom_level() }).await.unwrap();

        // Assert
        assert_eq!(seen, 12);
    }

    #[test]
    fn test_concurrent_writers_never_tear_the_snapshot() {
        // Arrange: writers always store zoom == battery; a torn read would
        // show them differing.
        let cache = Arc::new(DeviceStateCache::new());
        let writers: Vec<_> = (0..4)
            .map(|t| {
                let cache = Arc::clone(&cache);
                std::thread::spawn(move || {
                    for i in 0..1_000 {
                        let v = t * 10_000 + i;
                        let mut state = cache.lock();
                        state.zoom_level = v;
                        state.battery_level = v;
                    }
                })
            })
            .collect();

        // Act / Assert
        for _ in 0..1_000 {
            let snap = cache.snapshot();
            assert_eq!(snap.zoom_level, snap.battery_level);
        }
        for w in writers {
            w.join().unwrap();
        }
    }
}
