//! HTTP server layer.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                         HTTP Layer                              │
//! │     GET /tile?image=..&path=..    GET /deepzoom/{key}...        │
//! │                                                                 │
//! │  ┌─────────────┐  ┌─────────────┐  ┌─────────────────────────┐  │
//! │  │  handlers   │  │     dzi     │  │        routes           │  │
//! │  │ (requests)  │  │ (Deep Zoom) │  │  (router config)        │  │
//! │  └─────────────┘  └─────────────┘  └─────────────────────────┘  │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

pub mod dzi;
pub mod handlers;
pub mod routes;

pub use dzi::{generate_dzi_xml, DeepZoomPath};
pub use handlers::{
    deepzoom_handler, error_status, health_handler, info_handler, tile_handler, AppState,
    HealthResponse, TileQueryParams, DEFAULT_CACHE_MAX_AGE, GENERIC_ERROR_BODY,
};
pub use routes::{create_router, RouterConfig};
