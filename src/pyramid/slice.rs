//! One resolution level of a pyramid and its tile cache.

use std::num::NonZeroUsize;

use bytes::Bytes;
use lru::LruCache;
use tokio::sync::Mutex;
use tracing::trace;

use crate::backend::{ImageHandle, TileBackend};
use crate::error::TileError;

/// Width of the viewport the per-slice tile cache is sized for.
pub const VIEWPORT_WIDTH: u32 = 1920;

/// Height of the viewport the per-slice tile cache is sized for.
pub const VIEWPORT_HEIGHT: u32 = 1080;

/// Number of tiles needed to paint one viewport plus a one-tile margin on
/// every side.
pub fn viewport_tile_capacity(tile_size: u32) -> usize {
    let tile_size = tile_size.max(1);
    let across = VIEWPORT_WIDTH.div_ceil(tile_size) + 2;
    let down = VIEWPORT_HEIGHT.div_ceil(tile_size) + 2;
    (across as usize) * (down as usize)
}

/// Pixel rectangle `(x, y, width, height)` covered by tile `(tile_x, tile_y)`
/// in a `width` x `height` level.
///
/// Edge tiles are clipped to the level. Returns `None` when the tile starts
/// outside the level.
pub fn tile_rect(
    width: u32,
    height: u32,
    tile_size: u32,
    tile_x: u32,
    tile_y: u32,
) -> Option<(u32, u32, u32, u32)> {
    let x0 = u64::from(tile_x) * u64::from(tile_size);
    let y0 = u64::from(tile_y) * u64::from(tile_size);
    if x0 >= u64::from(width) || y0 >= u64::from(height) {
        return None;
    }

    // Both origins are below a u32 dimension here, so the casts are lossless
    let (x0, y0) = (x0 as u32, y0 as u32);
    let w = tile_size.min(width - x0);
    let h = tile_size.min(height - y0);
    Some((x0, y0, w, h))
}

// =============================================================================
// Slice Tile Cache
// =============================================================================

/// Bounded cache of encoded tiles for a single slice, keyed by tile
/// coordinate.
///
/// A persistent cache never evicts; its tiles live until the owning pyramid
/// is dropped.
pub struct SliceTileCache {
    tiles: Mutex<LruCache<(u32, u32), Bytes>>,
    capacity: Option<usize>,
}

impl SliceTileCache {
    /// Create a cache holding at most `capacity` tiles.
    pub fn bounded(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            tiles: Mutex::new(LruCache::new(capacity)),
            capacity: Some(capacity.get()),
        }
    }

    /// Create a cache that keeps every tile it is given.
    pub fn persistent() -> Self {
        Self {
            tiles: Mutex::new(LruCache::unbounded()),
            capacity: None,
        }
    }

    /// Look up a tile, marking it recently used.
    pub async fn get(&self, tile_x: u32, tile_y: u32) -> Option<Bytes> {
        self.tiles.lock().await.get(&(tile_x, tile_y)).cloned()
    }

    /// Store a tile, evicting the least-recently-used one when full.
    pub async fn put(&self, tile_x: u32, tile_y: u32, data: Bytes) {
        self.tiles.lock().await.put((tile_x, tile_y), data);
    }

    /// Whether a tile is cached, without touching recency.
    pub async fn contains(&self, tile_x: u32, tile_y: u32) -> bool {
        self.tiles.lock().await.contains(&(tile_x, tile_y))
    }

    /// Number of cached tiles.
    pub async fn len(&self) -> usize {
        self.tiles.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    /// Maximum number of tiles, or `None` for a persistent cache.
    pub fn capacity(&self) -> Option<usize> {
        self.capacity
    }

    pub fn is_persistent(&self) -> bool {
        self.capacity.is_none()
    }
}

// =============================================================================
// Slice
// =============================================================================

/// One resolution level of a pyramid.
///
/// Slices live in an arena owned by their [`super::Pyramid`]; `parent` and
/// `child` are arena indices, which are also level indices.
pub struct Slice<I: ImageHandle> {
    pub(crate) level_index: usize,
    pub(crate) width: u32,
    pub(crate) height: u32,
    pub(crate) downsample: u64,
    pub(crate) native: bool,
    pub(crate) parent: Option<usize>,
    pub(crate) child: Option<usize>,
    pub(crate) image: I,
    pub(crate) tiles: SliceTileCache,
}

impl<I: ImageHandle> Slice<I> {
    /// Position in the pyramid; 0 is the 1x1 level.
    pub fn level_index(&self) -> usize {
        self.level_index
    }

    pub fn width(&self) -> u32 {
        self.width
    }

    pub fn height(&self) -> u32 {
        self.height
    }

    /// Full-resolution pixels per pixel of this level, along each axis.
    pub fn downsample(&self) -> u64 {
        self.downsample
    }

    /// Whether the pixels came straight from the source rather than being
    /// synthesized from the parent.
    pub fn is_native(&self) -> bool {
        self.native
    }

    /// Index of the next larger slice.
    pub fn parent(&self) -> Option<usize> {
        self.parent
    }

    /// Index of the next smaller slice.
    pub fn child(&self) -> Option<usize> {
        self.child
    }

    pub fn image(&self) -> &I {
        &self.image
    }

    pub fn tiles(&self) -> &SliceTileCache {
        &self.tiles
    }

    /// Tile grid size `(across, down)` for a given tile edge length.
    pub fn tile_count(&self, tile_size: u32) -> (u32, u32) {
        let tile_size = tile_size.max(1);
        (
            self.width.div_ceil(tile_size),
            self.height.div_ceil(tile_size),
        )
    }

    /// Return the encoded tile at `(tile_x, tile_y)`, producing and caching
    /// it on a miss.
    pub async fn get_tile<B>(
        &self,
        backend: &B,
        tile_size: u32,
        quality: u8,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TileError>
    where
        B: TileBackend<Image = I>,
    {
        let (x, y, w, h) = tile_rect(self.width, self.height, tile_size, tile_x, tile_y).ok_or(
            TileError::TileOutOfRange {
                level: self.level_index,
                x: tile_x,
                y: tile_y,
                width: self.width,
                height: self.height,
            },
        )?;

        if let Some(data) = self.tiles.get(tile_x, tile_y).await {
            return Ok(data);
        }

        trace!(level = self.level_index, tile_x, tile_y, "Tile cache miss");

        let region = backend
            .extract_region(&self.image, x, y, w, h)
            .await
            .map_err(|e| e.at_level(self.level_index))?;
        let data = backend
            .encode(region, quality)
            .await
            .map_err(|e| e.at_level(self.level_index))?;

        self.tiles.put(tile_x, tile_y, data.clone()).await;
        Ok(data)
    }
}
