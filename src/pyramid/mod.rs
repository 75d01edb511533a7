//! Multi-resolution pyramid cache.
//!
//! This module owns the only stateful part of the server: complete
//! power-of-two pyramids built from the sparse native levels a source
//! provides, per-level tile caches, and an LRU cache of whole pyramids.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              PyramidCache               │
//! │  (LRU over pyramids, single-flight)     │
//! └────────────────────┬────────────────────┘
//!                      │ build on miss
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │                Pyramid                  │
//! │  slices[0] = 1x1 ... slices[n] = full   │
//! │  each Slice: image + SliceTileCache     │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           TileBackend Trait             │
//! └─────────────────────────────────────────┘
//! ```
//!
//! Level indices follow the Deep Zoom convention: level 0 is the 1x1 image
//! and the highest index is full resolution.

mod builder;
mod cache;
mod slice;

use bytes::Bytes;
use serde::Serialize;

use crate::backend::{ImageHandle, TileBackend};
use crate::error::TileError;

pub use builder::{build_pyramid, chain_dimensions, downsample_to_factor, MAX_NATIVE_LEVELS};
pub use cache::{PyramidCache, DEFAULT_PYRAMID_CACHE_CAPACITY};
pub use slice::{
    tile_rect, viewport_tile_capacity, Slice, SliceTileCache, VIEWPORT_HEIGHT, VIEWPORT_WIDTH,
};

/// Default tile edge length in pixels.
pub const DEFAULT_TILE_SIZE: u32 = 256;

/// Default JPEG quality for encoded tiles.
pub const DEFAULT_TILE_QUALITY: u8 = 50;

/// Settings shared by every pyramid a cache builds.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PyramidOptions {
    /// Tile edge length in pixels
    pub tile_size: u32,

    /// Encoder quality (1-100)
    pub quality: u8,
}

impl Default for PyramidOptions {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            quality: DEFAULT_TILE_QUALITY,
        }
    }
}

/// Metadata for one pyramid level.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct LevelSummary {
    pub level: usize,
    pub width: u32,
    pub height: u32,
    pub downsample: u64,
    pub native: bool,
    pub tiles_x: u32,
    pub tiles_y: u32,
}

/// The complete chain of resolution levels for one source.
///
/// Topology and per-level dimensions are fixed at construction; only the
/// slice tile caches change afterwards. Dropping the pyramid releases every
/// image handle and cached tile it owns.
pub struct Pyramid<I: ImageHandle> {
    source_key: String,
    slices: Vec<Slice<I>>,
    options: PyramidOptions,
}

impl<I: ImageHandle> Pyramid<I> {
    pub(crate) fn new(source_key: String, slices: Vec<Slice<I>>, options: PyramidOptions) -> Self {
        debug_assert!(!slices.is_empty());
        Self {
            source_key,
            slices,
            options,
        }
    }

    /// The key this pyramid was built from.
    pub fn source_key(&self) -> &str {
        &self.source_key
    }

    pub fn options(&self) -> &PyramidOptions {
        &self.options
    }

    /// Number of levels, including the 1x1 level.
    pub fn level_count(&self) -> usize {
        self.slices.len()
    }

    /// Highest level index (full resolution).
    pub fn max_level(&self) -> usize {
        self.slices.len() - 1
    }

    /// Full-resolution slice.
    pub fn root(&self) -> &Slice<I> {
        &self.slices[self.max_level()]
    }

    /// The 1x1 slice.
    pub fn lowest(&self) -> &Slice<I> {
        &self.slices[0]
    }

    /// Full-resolution `(width, height)`.
    pub fn dimensions(&self) -> (u32, u32) {
        let root = self.root();
        (root.width(), root.height())
    }

    /// All slices, smallest first.
    pub fn slices(&self) -> &[Slice<I>] {
        &self.slices
    }

    /// The next larger slice.
    pub fn parent_of(&self, slice: &Slice<I>) -> Option<&Slice<I>> {
        slice.parent().map(|i| &self.slices[i])
    }

    /// The next smaller slice.
    pub fn child_of(&self, slice: &Slice<I>) -> Option<&Slice<I>> {
        slice.child().map(|i| &self.slices[i])
    }

    /// Find the slice at `level`. Levels past the top are an error, never
    /// clamped.
    pub fn find_slice(&self, level: usize) -> Result<&Slice<I>, TileError> {
        self.slices.get(level).ok_or(TileError::NotFound {
            level,
            max_level: self.max_level(),
        })
    }

    /// Tile grid `(across, down)` at `level`.
    pub fn tile_count(&self, level: usize) -> Result<(u32, u32), TileError> {
        Ok(self.find_slice(level)?.tile_count(self.options.tile_size))
    }

    /// Fetch the encoded tile `(tile_x, tile_y)` at `level`.
    pub async fn get_tile<B>(
        &self,
        backend: &B,
        level: usize,
        tile_x: u32,
        tile_y: u32,
    ) -> Result<Bytes, TileError>
    where
        B: TileBackend<Image = I>,
    {
        self.find_slice(level)?
            .get_tile(
                backend,
                self.options.tile_size,
                self.options.quality,
                tile_x,
                tile_y,
            )
            .await
    }

    /// Per-level metadata, smallest level first.
    pub fn summary(&self) -> Vec<LevelSummary> {
        self.slices
            .iter()
            .map(|slice| {
                let (tiles_x, tiles_y) = slice.tile_count(self.options.tile_size);
                LevelSummary {
                    level: slice.level_index(),
                    width: slice.width(),
                    height: slice.height(),
                    downsample: slice.downsample(),
                    native: slice.is_native(),
                    tiles_x,
                    tiles_y,
                }
            })
            .collect()
    }
}
