//! Test utilities for integration tests.
//!
//! Provides:
//! - An in-memory source store with fetch counting
//! - A counting fake backend with configurable native levels
//! - Test image builders
//! - Router constructors

#![allow(dead_code)]

use std::collections::HashMap;
use std::io::Cursor;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::Router;
use bytes::Bytes;
use image::codecs::jpeg::JpegEncoder;
use image::{ImageFormat, Rgb, RgbImage};

use tilesrv::{
    create_router, BackendError, ImageHandle, IoError, NativeLevel, PyramidCache, PyramidOptions,
    RasterBackend, RouterConfig, SourceStore, TileBackend, TileService,
};

// =============================================================================
// Memory Store
// =============================================================================

/// In-memory source store that counts fetches per key.
#[derive(Default)]
pub struct MemoryStore {
    objects: HashMap<String, Bytes>,
    fetches: std::sync::Mutex<HashMap<String, usize>>,
    delay: Option<Duration>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_object(mut self, key: impl Into<String>, data: impl Into<Bytes>) -> Self {
        self.objects.insert(key.into(), data.into());
        self
    }

    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = Some(delay);
        self
    }

    pub fn fetch_count(&self, key: &str) -> usize {
        self.fetches.lock().unwrap().get(key).copied().unwrap_or(0)
    }

    pub fn total_fetches(&self) -> usize {
        self.fetches.lock().unwrap().values().sum()
    }
}

#[async_trait]
impl SourceStore for MemoryStore {
    async fn fetch(&self, key: &str) -> Result<Bytes, IoError> {
        *self
            .fetches
            .lock()
            .unwrap()
            .entry(key.to_string())
            .or_default() += 1;

        if let Some(delay) = self.delay {
            tokio::time::sleep(delay).await;
        }

        self.objects
            .get(key)
            .cloned()
            .ok_or_else(|| IoError::NotFound(key.to_string()))
    }

    fn describe(&self) -> String {
        "memory://".to_string()
    }
}

/// Shares a store between the backend and the test body.
pub struct SharedStore(pub Arc<MemoryStore>);

#[async_trait]
impl SourceStore for SharedStore {
    async fn fetch(&self, key: &str) -> Result<Bytes, IoError> {
        self.0.fetch(key).await
    }

    fn describe(&self) -> String {
        self.0.describe()
    }
}

// =============================================================================
// Test Images
// =============================================================================

fn gradient(width: u32, height: u32) -> RgbImage {
    RgbImage::from_fn(width, height, |x, y| {
        Rgb([(x % 256) as u8, (y % 256) as u8, ((x + y) % 256) as u8])
    })
}

/// Create an RGB gradient JPEG.
pub fn create_test_jpeg(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Vec::new();
    let mut encoder = JpegEncoder::new_with_quality(&mut buf, 90);
    encoder.encode_image(&gradient(width, height)).unwrap();
    buf
}

/// Create an RGB gradient PNG.
pub fn create_test_png(width: u32, height: u32) -> Vec<u8> {
    let mut buf = Cursor::new(Vec::new());
    gradient(width, height)
        .write_to(&mut buf, ImageFormat::Png)
        .unwrap();
    buf.into_inner()
}

/// Check for JPEG SOI and EOI markers.
pub fn is_valid_jpeg(data: &[u8]) -> bool {
    data.len() >= 4
        && data[0] == 0xFF
        && data[1] == 0xD8
        && data[data.len() - 2] == 0xFF
        && data[data.len() - 1] == 0xD9
}

/// Decode a JPEG and return its dimensions.
pub fn jpeg_dimensions(data: &[u8]) -> (u32, u32) {
    let image = image::load_from_memory_with_format(data, ImageFormat::Jpeg).unwrap();
    (image.width(), image.height())
}

// =============================================================================
// Raster Router
// =============================================================================

pub type RasterCache = PyramidCache<RasterBackend<SharedStore>>;

/// Build a router over a raster backend reading from `store`.
pub fn raster_router(
    store: Arc<MemoryStore>,
    options: PyramidOptions,
    capacity: usize,
) -> (Router, Arc<RasterCache>) {
    let backend = Arc::new(RasterBackend::new(SharedStore(store)));
    let cache = Arc::new(PyramidCache::with_capacity(backend, options, capacity));
    let service = TileService::new(Arc::clone(&cache));
    let router = create_router(service, RouterConfig::new().with_tracing(false));
    (router, cache)
}

// =============================================================================
// Fake Backend
// =============================================================================

#[derive(Debug, Clone)]
pub struct FakeImage {
    pub width: u32,
    pub height: u32,
    pub native: bool,
}

impl ImageHandle for FakeImage {
    fn width(&self) -> u32 {
        self.width
    }

    fn height(&self) -> u32 {
        self.height
    }
}

pub struct FakeRegion {
    x: u32,
    y: u32,
    width: u32,
    height: u32,
}

/// Backend whose encoded tiles are the text `"{w}x{h}@{x},{y}"`.
///
/// Each source is a list of native levels `(width, height, downsample)`.
#[derive(Default)]
pub struct FakeBackend {
    sources: HashMap<String, Vec<(u32, u32, f64)>>,
    pub builds: AtomicUsize,
    pub shrinks: AtomicUsize,
    pub encodes: AtomicUsize,
}

impl FakeBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_source(mut self, key: &str, levels: Vec<(u32, u32, f64)>) -> Self {
        self.sources.insert(key.to_string(), levels);
        self
    }

    pub fn builds(&self) -> usize {
        self.builds.load(Ordering::SeqCst)
    }

    pub fn shrinks(&self) -> usize {
        self.shrinks.load(Ordering::SeqCst)
    }

    fn levels(&self, key: &str) -> Result<&Vec<(u32, u32, f64)>, BackendError> {
        self.sources
            .get(key)
            .ok_or_else(|| BackendError::source_missing("fetch", key.to_string()))
    }
}

#[async_trait]
impl TileBackend for FakeBackend {
    type Image = FakeImage;
    type Region = FakeRegion;

    async fn native_level_count(&self, source_key: &str) -> Result<usize, BackendError> {
        Ok(self.levels(source_key)?.len())
    }

    async fn open_level(
        &self,
        source_key: &str,
        level: usize,
    ) -> Result<NativeLevel<FakeImage>, BackendError> {
        if level == 0 {
            self.builds.fetch_add(1, Ordering::SeqCst);
        }
        let &(width, height, reported_downsample) = self
            .levels(source_key)?
            .get(level)
            .ok_or_else(|| BackendError::new("open_level", "no such level"))?;

        Ok(NativeLevel {
            image: FakeImage {
                width,
                height,
                native: true,
            },
            width,
            height,
            reported_downsample,
        })
    }

    async fn extract_region(
        &self,
        image: &FakeImage,
        x: u32,
        y: u32,
        width: u32,
        height: u32,
    ) -> Result<FakeRegion, BackendError> {
        if x + width > image.width || y + height > image.height {
            return Err(BackendError::new("extract_region", "outside image"));
        }
        Ok(FakeRegion {
            x,
            y,
            width,
            height,
        })
    }

    async fn shrink_by_two(&self, image: &FakeImage) -> Result<FakeImage, BackendError> {
        self.shrinks.fetch_add(1, Ordering::SeqCst);
        Ok(FakeImage {
            width: image.width.div_ceil(2),
            height: image.height.div_ceil(2),
            native: false,
        })
    }

    async fn extend_edges(
        &self,
        image: &FakeImage,
        width: u32,
        height: u32,
    ) -> Result<FakeImage, BackendError> {
        Ok(FakeImage {
            width: width.max(image.width),
            height: height.max(image.height),
            native: image.native,
        })
    }

    async fn encode(&self, region: FakeRegion, _quality: u8) -> Result<Bytes, BackendError> {
        self.encodes.fetch_add(1, Ordering::SeqCst);
        Ok(Bytes::from(format!(
            "{}x{}@{},{}",
            region.width, region.height, region.x, region.y
        )))
    }
}
