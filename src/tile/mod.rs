//! Tile addressing and serving.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────┐
//! │              HTTP Handlers              │
//! └────────────────────┬────────────────────┘
//!                      │  "level/x_y.jpg"
//!                      ▼
//! ┌─────────────────────────────────────────┐
//! │              Tile Service               │
//! │  ┌──────────────┐  ┌─────────────────┐  │
//! │  │ TileAddress  │  │  PyramidCache   │  │
//! │  │ (strict      │  │  (pyramids and  │  │
//! │  │  parsing)    │  │   slice tiles)  │  │
//! │  └──────────────┘  └─────────────────┘  │
//! └─────────────────────────────────────────┘
//! ```
//!
//! # Components
//!
//! - [`TileAddress`]: Parsed `level/x_y.ext` path, range-checked up front
//! - [`TileService`]: Resolves the pyramid, finds the slice, returns the tile
//! - [`TileResponse`]: Encoded bytes plus content type
//! - [`PyramidInfo`]: Per-level layout for metadata endpoints

mod address;
mod service;

pub use address::{TileAddress, MAX_COORDINATE, TILE_EXTENSIONS};
pub use service::{PyramidInfo, TileResponse, TileService};

/// Tile size and encoder quality, shared with the pyramid builder.
pub use crate::pyramid::PyramidOptions as TileOptions;
