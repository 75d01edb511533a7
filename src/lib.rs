//! # tilesrv
//!
//! A deep-zoom tile server for very large images.
//!
//! Clients request fixed-size tiles by zoom level and tile coordinate. For
//! each source image the server builds a complete power-of-two resolution
//! pyramid, reusing whatever resolution levels the source stores natively
//! and synthesizing the rest, then cuts and encodes tiles on demand.
//!
//! ## Features
//!
//! - **Complete pyramids**: Every level from full resolution down to 1x1
//! - **Two-tier caching**: LRU over whole pyramids, LRU over tiles per level
//! - **Single-flight builds**: Concurrent requests for a new image share one build
//! - **Deep Zoom**: DZI descriptors and tile URLs for OpenSeadragon-style viewers
//! - **Storage**: Local directory or S3-compatible object storage
//!
//! ## Architecture
//!
//! - [`io`] - Source stores (local filesystem, S3)
//! - [`backend`] - Image backend boundary and the raster implementation
//! - [`pyramid`] - Pyramid construction, slices and the pyramid cache
//! - [`tile`] - Tile addressing and the tile service
//! - [`server`] - Axum-based HTTP server and routes
//! - [`config`] - CLI and configuration types
//! - [`logging`] - Tracing subscriber setup
//!
//! ## Example
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use tilesrv::{create_router, LocalStore, PyramidCache, PyramidOptions, RasterBackend, RouterConfig, TileService};
//!
//! #[tokio::main]
//! async fn main() {
//!     let backend = Arc::new(RasterBackend::new(LocalStore::new("/srv/images")));
//!     let cache = PyramidCache::new(backend, PyramidOptions::default());
//!     let router = create_router(TileService::new(Arc::new(cache)), RouterConfig::new());
//!
//!     let listener = tokio::net::TcpListener::bind("0.0.0.0:3000").await.unwrap();
//!     axum::serve(listener, router).await.unwrap();
//! }
//! ```

pub mod backend;
pub mod config;
pub mod error;
pub mod io;
pub mod logging;
pub mod pyramid;
pub mod server;
pub mod tile;

// Re-export commonly used types
pub use backend::{ImageHandle, NativeLevel, RasterBackend, TileBackend, JPEG_CONTENT_TYPE};
pub use config::{Config, SourceLocation};
pub use error::{BackendError, IoError, TileError};
pub use io::{create_s3_client, LocalStore, S3Store, SourceStore};
pub use pyramid::{
    build_pyramid, LevelSummary, Pyramid, PyramidCache, PyramidOptions, Slice, SliceTileCache,
};
pub use server::{create_router, AppState, RouterConfig};
pub use tile::{PyramidInfo, TileAddress, TileResponse, TileService};
