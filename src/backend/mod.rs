//! Image backend boundary.
//!
//! The pyramid core never touches pixels. Everything it needs from an image
//! library goes through [`TileBackend`]: opening the natively stored levels of
//! a source, cropping, halving, edge extension, and encoding.
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │          Pyramid Builder / Slice        │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │           TileBackend Trait             │
//! └────────────────────┬────────────────────┘
//!                      │
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │   RasterBackend (image crate + store)   │
//! └─────────────────────────────────────────┘
//! ```

mod raster;

use async_trait::async_trait;
use bytes::Bytes;

use crate::error::BackendError;

pub use raster::{RasterBackend, RasterImage, RasterRegion};

/// Content type of JPEG-encoded tiles.
pub const JPEG_CONTENT_TYPE: &str = "image/jpeg";

/// Pixel dimensions of a decoded image handle.
pub trait ImageHandle: Clone + Send + Sync + 'static {
    fn width(&self) -> u32;
    fn height(&self) -> u32;
}

/// A natively stored resolution level, as reported by the backend.
#[derive(Debug, Clone)]
pub struct NativeLevel<I> {
    /// Decoded image for this level
    pub image: I,

    /// Width reported by the backend
    pub width: u32,

    /// Height reported by the backend
    pub height: u32,

    /// Downsample factor relative to level 0, as the backend reports it.
    ///
    /// Backends often report slightly inexact values (e.g. `4.000069474`).
    pub reported_downsample: f64,
}

/// Narrow interface to the image library that decodes, crops, shrinks, and
/// encodes.
///
/// Implementations must be cheap to share across tasks; the pyramid cache
/// holds one behind an `Arc` and calls it from many requests at once.
#[async_trait]
pub trait TileBackend: Send + Sync + 'static {
    /// Handle to decoded pixels for one level.
    type Image: ImageHandle;

    /// A rectangular sub-area ready to encode.
    type Region: Send;

    /// Number of natively stored resolution levels in a source.
    async fn native_level_count(&self, source_key: &str) -> Result<usize, BackendError>;

    /// Open native level `level` (0 = full resolution) of a source.
    async fn open_level(
        &self,
        source_key: &str,
        level: usize,
    ) -> Result<NativeLevel<Self::Image>, BackendError>;

    /// Crop `(x, y, width, height)` out of an image.
    async fn extract_region(
        &self,
        image: &Self::Image,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Self::Region, BackendError>;

    /// Halve each axis, rounding up.
    async fn shrink_by_two(&self, image: &Self::Image) -> Result<Self::Image, BackendError>;

    /// Grow an image to at least `width` x `height` by repeating its edge
    /// pixels. Images already that large are returned unchanged.
    async fn extend_edges(
        &self,
        image: &Self::Image,
        width: u32,
        height: u32,
    ) -> Result<Self::Image, BackendError>;

    /// Encode a region to a compressed buffer.
    async fn encode(&self, region: Self::Region, quality: u8) -> Result<Bytes, BackendError>;

    /// MIME type of the bytes produced by [`TileBackend::encode`].
    fn content_type(&self) -> &'static str {
        JPEG_CONTENT_TYPE
    }
}
