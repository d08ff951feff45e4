//! Renderable map layers and the per-layer tile cache.
//!
//! Layers are filled by worker threads and drawn by the render thread; all
//! access to a layer's tile cache goes through a single mutex with a bounded
//! acquisition timeout. Failing to acquire the lock in time is a
//! backpressure signal, not an error: the caller retries on a later pass.

use std::time::Duration;

use ahash::HashMap;
use parking_lot::{Mutex, MutexGuard};

use crate::render::RenderBackend;
use crate::tile::{RenderTile, TileIndex};

pub mod feature_layer;
pub mod raster_layer;

pub use feature_layer::{FeatureLayer, FeatureSource, GeometryType, VectorTile, VectorTileItem};
pub use raster_layer::{BandMapping, PixelWindow, RasterLayer, RasterSource};

/// Default bound on tile-cache lock acquisition.
pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// The layer mutex could not be acquired within its timeout. Try again
/// later.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct LockTimeout;

/// A layer that renders through the tile cache.
pub trait TiledLayer {
    /// Fills the cache entry for `tile`. Executed from worker threads.
    ///
    /// Returns `false` when the fill should be retried; `is_last_try` asks
    /// the layer to cache an empty result instead of failing again.
    fn fill(&self, tile: &RenderTile, z: f32, is_last_try: bool) -> bool;

    /// Draws the cached data for `tile`. Executed from the render thread.
    ///
    /// Returns `false` when the tile is not ready yet and should be
    /// re-requested; a cached empty entry draws nothing and returns `true`.
    fn draw(&self, tile: &RenderTile, backend: &mut dyn RenderBackend) -> bool;

    /// Evicts `tile` from the cache. Executed on viewport invalidation.
    fn free(&self, tile: &RenderTile);
}

/// Per-layer map from tile index to rendered data.
///
/// An entry of `None` means "intersects nothing / invisible": a valid cached
/// result that draws nothing. An absent key means the tile is not filled
/// yet.
#[derive(Debug)]
pub(crate) struct TileStore<T> {
    tiles: Mutex<HashMap<TileIndex, Option<T>>>,
    timeout: Duration,
}

impl<T> TileStore<T> {
    pub fn new(timeout: Duration) -> Self {
        Self {
            tiles: Mutex::new(HashMap::default()),
            timeout,
        }
    }

    /// Locks the map, giving up after the configured timeout.
    pub fn lock(&self) -> Result<MutexGuard<'_, HashMap<TileIndex, Option<T>>>, LockTimeout> {
        self.tiles.try_lock_for(self.timeout).ok_or(LockTimeout)
    }

    /// Changes the lock acquisition bound.
    pub fn set_timeout(&mut self, timeout: Duration) {
        self.timeout = timeout;
    }

    /// Stores a fill result, replacing any prior entry.
    pub fn store(&self, index: TileIndex, data: Option<T>) -> Result<(), LockTimeout> {
        self.lock()?.insert(index, data);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn lock_times_out_when_contended() {
        let store: TileStore<()> = TileStore::new(Duration::from_millis(10));
        let guard = store.lock().expect("first lock failed");

        std::thread::scope(|scope| {
            let result = scope.spawn(|| store.store(TileIndex::new(0, 0, 0), None));
            assert_eq!(result.join().expect("thread panicked"), Err(LockTimeout));
        });

        drop(guard);
        assert!(store.store(TileIndex::new(0, 0, 0), None).is_ok());
    }

    #[test]
    fn store_replaces_prior_entry() {
        let store: TileStore<u32> = TileStore::new(DEFAULT_LOCK_TIMEOUT);
        let index = TileIndex::new(1, 2, 3);

        store.store(index, Some(7)).expect("store failed");
        store.store(index, None).expect("store failed");

        let guard = store.lock().expect("lock failed");
        assert_eq!(guard.get(&index), Some(&None));
    }
}
