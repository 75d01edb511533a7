//! Tile service: the request-facing entry point.
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         TileService                             │
//! │  1. Parse path (optional)   3. Find slice for level             │
//! │  2. Resolve pyramid         4. Slice tile cache / encode        │
//! └────────────────────────────────┬────────────────────────────────┘
//!                                  │
//!                                  ▼
//!                        ┌──────────────────┐
//!                        │   PyramidCache   │
//!                        └──────────────────┘
//! ```

use std::sync::Arc;

use bytes::Bytes;
use serde::Serialize;

use super::address::TileAddress;
use crate::backend::TileBackend;
use crate::error::TileError;
use crate::pyramid::{LevelSummary, PyramidCache};

// =============================================================================
// Tile Response
// =============================================================================

/// An encoded tile ready to send.
#[derive(Debug, Clone)]
pub struct TileResponse {
    /// The encoded tile bytes
    pub data: Bytes,

    /// MIME type of `data`
    pub content_type: &'static str,
}

/// Pyramid metadata for the info endpoint and DZI descriptors.
#[derive(Debug, Clone, Serialize)]
pub struct PyramidInfo {
    pub source_key: String,
    pub width: u32,
    pub height: u32,
    pub tile_size: u32,
    pub level_count: usize,
    pub max_level: usize,
    pub levels: Vec<LevelSummary>,
}

// =============================================================================
// Tile Service
// =============================================================================

/// Serves tiles out of the pyramid cache.
///
/// # Example
///
/// ```ignore
/// use std::sync::Arc;
/// use tilesrv::pyramid::PyramidCache;
/// use tilesrv::tile::TileService;
///
/// let service = TileService::new(Arc::new(PyramidCache::new(backend, options)));
/// let response = service.serve_path("slides/sample.jpg", "9/0_1.jpg").await?;
/// println!("{} bytes of {}", response.data.len(), response.content_type);
/// ```
pub struct TileService<B: TileBackend> {
    cache: Arc<PyramidCache<B>>,
}

impl<B: TileBackend> TileService<B> {
    pub fn new(cache: Arc<PyramidCache<B>>) -> Self {
        Self { cache }
    }

    /// Serve tile `(x, y)` at `level` of `source_key`.
    ///
    /// # Errors
    ///
    /// - [`TileError::SourceNotFound`] / [`TileError::SourceInvalid`] when
    ///   the pyramid cannot be built
    /// - [`TileError::NotFound`] when `level` is past the top of the pyramid
    /// - [`TileError::TileOutOfRange`] when the tile lies outside the level
    /// - [`TileError::Backend`] when extraction or encoding fails
    pub async fn serve_tile(
        &self,
        source_key: &str,
        level: usize,
        x: u32,
        y: u32,
    ) -> Result<TileResponse, TileError> {
        let pyramid = self.cache.resolve(source_key).await?;
        let backend = self.cache.backend();
        let data = pyramid.get_tile(backend.as_ref(), level, x, y).await?;

        Ok(TileResponse {
            data,
            content_type: backend.content_type(),
        })
    }

    /// Parse a `level/x_y.ext` path and serve the tile it names.
    ///
    /// A malformed path is rejected before the pyramid is resolved.
    pub async fn serve_path(&self, source_key: &str, path: &str) -> Result<TileResponse, TileError> {
        let address = TileAddress::parse(path)?;
        self.serve_tile(source_key, address.level, address.x, address.y)
            .await
    }

    /// Dimensions and per-level layout of a source's pyramid.
    pub async fn pyramid_info(&self, source_key: &str) -> Result<PyramidInfo, TileError> {
        let pyramid = self.cache.resolve(source_key).await?;
        let (width, height) = pyramid.dimensions();

        Ok(PyramidInfo {
            source_key: pyramid.source_key().to_string(),
            width,
            height,
            tile_size: pyramid.options().tile_size,
            level_count: pyramid.level_count(),
            max_level: pyramid.max_level(),
            levels: pyramid.summary(),
        })
    }

    /// Tile edge length used by every pyramid this service serves.
    pub fn tile_size(&self) -> u32 {
        self.cache.options().tile_size
    }

    pub fn cache(&self) -> &Arc<PyramidCache<B>> {
        &self.cache
    }
}

// =============================================================================
// Tests
// =============================================================================
