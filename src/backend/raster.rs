//! Raster backend built on the `image` crate.
//!
//! Sources are ordinary raster files (JPEG, PNG, TIFF) fetched whole from a
//! [`SourceStore`] and decoded into memory. Each source exposes a single
//! native level; every smaller level is synthesized by the pyramid builder.
//!
//! All pixel work runs on the blocking thread pool so request tasks stay
//! responsive while a large source decodes.

use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageBuffer, Pixel};
use tracing::debug;

use super::{ImageHandle, NativeLevel, TileBackend};
use crate::error::{BackendError, IoError};
use crate::io::SourceStore;

/// Decoded pixels shared between a slice and any in-flight tile requests.
///
/// Pixels are normalized to 8-bit gray or 8-bit RGB at decode time so every
/// region can be JPEG-encoded directly.
#[derive(Debug, Clone)]
pub struct RasterImage(Arc<DynamicImage>);

impl RasterImage {
    pub fn new(image: DynamicImage) -> Self {
        Self(Arc::new(normalize(image)))
    }

    /// Borrow the decoded pixels.
    pub fn pixels(&self) -> &DynamicImage {
        &self.0
    }
}

impl ImageHandle for RasterImage {
    fn width(&self) -> u32 {
        self.0.width()
    }

    fn height(&self) -> u32 {
        self.0.height()
    }
}

/// A cropped area awaiting encode.
#[derive(Debug)]
pub struct RasterRegion(DynamicImage);

impl RasterRegion {
    pub fn width(&self) -> u32 {
        self.0.width()
    }

    pub fn height(&self) -> u32 {
        self.0.height()
    }
}

/// Image backend that decodes whole raster files from a source store.
pub struct RasterBackend<S: SourceStore> {
    store: S,
}

impl<S: SourceStore> RasterBackend<S> {
    /// Create a backend reading sources from `store`.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Get the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }
}

#[async_trait]
impl<S: SourceStore + 'static> TileBackend for RasterBackend<S> {
    type Image = RasterImage;
    type Region = RasterRegion;

    async fn native_level_count(&self, _source_key: &str) -> Result<usize, BackendError> {
        Ok(1)
    }

    async fn open_level(
        &self,
        source_key: &str,
        level: usize,
    ) -> Result<NativeLevel<Self::Image>, BackendError> {
        if level != 0 {
            return Err(BackendError::new(
                "open_level",
                format!("raster sources have a single native level, got {}", level),
            )
            .at_level(level));
        }

        let data = self.store.fetch(source_key).await.map_err(|e| match e {
            IoError::NotFound(_) => BackendError::source_missing("fetch", e.to_string()),
            other => BackendError::new("fetch", other.to_string()),
        })?;

        debug!(source_key, bytes = data.len(), "Decoding source image");

        let image = run_blocking("open_level", move || {
            image::load_from_memory(&data)
                .map(RasterImage::new)
                .map_err(|e| e.to_string())
        })
        .await?;

        Ok(NativeLevel {
            width: image.width(),
            height: image.height(),
            image,
            reported_downsample: 1.0,
        })
    }

    async fn extract_region(
        &self,
        image: &Self::Image,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<Self::Region, BackendError> {
        let fits = u64::from(x) + u64::from(width) <= u64::from(image.width())
            && u64::from(y) + u64::from(height) <= u64::from(image.height());
        if !fits || width == 0 || height == 0 {
            return Err(BackendError::new(
                "extract_region",
                format!(
                    "region {}x{}+{}+{} outside {}x{} image",
                    width,
                    height,
                    x,
                    y,
                    image.width(),
                    image.height()
                ),
            ));
        }

        let image = image.clone();
        run_blocking("extract_region", move || {
            Ok(RasterRegion(image.pixels().crop_imm(x, y, width, height)))
        })
        .await
    }

    async fn shrink_by_two(&self, image: &Self::Image) -> Result<Self::Image, BackendError> {
        let width = image.width().div_ceil(2);
        let height = image.height().div_ceil(2);
        let image = image.clone();

        run_blocking("shrink_by_two", move || {
            Ok(RasterImage::new(image.pixels().resize_exact(
                width,
                height,
                FilterType::Triangle,
            )))
        })
        .await
    }

    async fn extend_edges(
        &self,
        image: &Self::Image,
        width: u32,
        height: u32,
    ) -> Result<Self::Image, BackendError> {
        let width = width.max(image.width());
        let height = height.max(image.height());
        if width == image.width() && height == image.height() {
            return Ok(image.clone());
        }

        let image = image.clone();
        run_blocking("extend_edges", move || {
            let extended = match image.pixels() {
                DynamicImage::ImageLuma8(buf) => {
                    DynamicImage::ImageLuma8(replicate_edges(buf, width, height))
                }
                other => DynamicImage::ImageRgb8(replicate_edges(&other.to_rgb8(), width, height)),
            };
            Ok(RasterImage::new(extended))
        })
        .await
    }

    async fn encode(&self, region: Self::Region, quality: u8) -> Result<Bytes, BackendError> {
        let quality = quality.clamp(1, 100);

        run_blocking("encode", move || {
            let mut output = Vec::new();
            let encoder = JpegEncoder::new_with_quality(&mut output, quality);
            region
                .0
                .write_with_encoder(encoder)
                .map_err(|e| e.to_string())?;
            Ok(Bytes::from(output))
        })
        .await
    }
}

/// Reduce any decoded image to 8-bit gray or 8-bit RGB.
fn normalize(image: DynamicImage) -> DynamicImage {
    match image {
        DynamicImage::ImageLuma8(_) | DynamicImage::ImageRgb8(_) => image,
        DynamicImage::ImageLuma16(_) | DynamicImage::ImageLumaA8(_) => {
            DynamicImage::ImageLuma8(image.to_luma8())
        }
        other => DynamicImage::ImageRgb8(other.to_rgb8()),
    }
}

/// Copy `source` into a `width` x `height` buffer, clamping reads to the
/// last row and column.
fn replicate_edges<P: Pixel>(
    source: &ImageBuffer<P, Vec<P::Subpixel>>,
    width: u32,
    height: u32,
) -> ImageBuffer<P, Vec<P::Subpixel>> {
    let max_x = source.width().saturating_sub(1);
    let max_y = source.height().saturating_sub(1);
    ImageBuffer::from_fn(width, height, |x, y| {
        *source.get_pixel(x.min(max_x), y.min(max_y))
    })
}

async fn run_blocking<T, F>(operation: &'static str, f: F) -> Result<T, BackendError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, String> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| BackendError::new(operation, e.to_string()))?
        .map_err(|message| BackendError::new(operation, message))
}
