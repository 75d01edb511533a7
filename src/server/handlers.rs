//! HTTP request handlers for the tile API.
//!
//! # Endpoints
//!
//! - `GET /tile?image=<key>&path=<level>/<x>_<y>.jpg` - Serve a tile
//! - `GET /deepzoom/<key>.dzi` - DZI descriptor
//! - `GET /deepzoom/<key>_files/<level>/<x>_<y>.jpg` - Serve a DZI tile
//! - `GET /info?image=<key>` - Pyramid layout as JSON
//! - `GET /health` - Health check endpoint
//!
//! Every failure is answered with the same plain-text body. The cause is
//! logged, never sent to the client.

use std::sync::Arc;

use axum::{
    extract::{Path, RawQuery, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use tracing::{debug, error, warn};

use crate::backend::TileBackend;
use crate::error::TileError;
use crate::tile::{PyramidInfo, TileResponse, TileService};

use super::dzi::{generate_dzi_xml, DeepZoomPath};

/// Body of every error response.
pub const GENERIC_ERROR_BODY: &str = "error processing query\ncheck server logs\n";

/// Default `Cache-Control` max-age in seconds.
pub const DEFAULT_CACHE_MAX_AGE: u32 = 3600;

// =============================================================================
// Application State
// =============================================================================

/// Shared application state containing the tile service.
///
/// This is passed to all handlers via Axum's State extractor.
pub struct AppState<B: TileBackend> {
    /// The tile service for processing tile requests
    pub tile_service: Arc<TileService<B>>,

    /// Cache-Control max-age for tiles and descriptors, in seconds
    pub cache_max_age: u32,
}

impl<B: TileBackend> AppState<B> {
    /// Create a new application state with the given tile service.
    pub fn new(tile_service: TileService<B>) -> Self {
        Self::with_cache_max_age(tile_service, DEFAULT_CACHE_MAX_AGE)
    }

    /// Create a new application state with custom cache max-age.
    pub fn with_cache_max_age(tile_service: TileService<B>, cache_max_age: u32) -> Self {
        Self {
            tile_service: Arc::new(tile_service),
            cache_max_age,
        }
    }

    fn cache_control(&self) -> String {
        format!("public, max-age={}", self.cache_max_age)
    }
}

impl<B: TileBackend> Clone for AppState<B> {
    fn clone(&self) -> Self {
        Self {
            tile_service: Arc::clone(&self.tile_service),
            cache_max_age: self.cache_max_age,
        }
    }
}

// =============================================================================
// Request Parameters
// =============================================================================

/// Parameters of the `/tile` and `/info` endpoints.
///
/// Parsed from the raw query string; when a name repeats, the last value
/// wins.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct TileQueryParams {
    pub image: Option<String>,
    pub path: Option<String>,
}

impl TileQueryParams {
    pub fn parse(query: Option<&str>) -> Self {
        let mut params = Self::default();
        for (name, value) in url::form_urlencoded::parse(query.unwrap_or_default().as_bytes()) {
            match name.as_ref() {
                "image" => params.image = Some(value.into_owned()),
                "path" => params.path = Some(value.into_owned()),
                _ => {}
            }
        }
        params
    }

    fn require_image(&self) -> Result<&str, TileError> {
        self.image
            .as_deref()
            .filter(|image| !image.is_empty())
            .ok_or_else(|| TileError::malformed("missing image parameter"))
    }

    fn require_path(&self) -> Result<&str, TileError> {
        self.path
            .as_deref()
            .ok_or_else(|| TileError::malformed("missing path parameter"))
    }
}

// =============================================================================
// Response Types
// =============================================================================

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    /// Service status
    pub status: String,

    /// Service version
    pub version: String,
}

// =============================================================================
// Error Mapping
// =============================================================================

/// HTTP status for a tile error.
pub fn error_status(err: &TileError) -> StatusCode {
    match err {
        TileError::MalformedRequest { .. } => StatusCode::BAD_REQUEST,
        TileError::NotFound { .. }
        | TileError::TileOutOfRange { .. }
        | TileError::SourceNotFound { .. } => StatusCode::NOT_FOUND,
        TileError::SourceInvalid { .. } | TileError::Backend(_) => {
            StatusCode::INTERNAL_SERVER_ERROR
        }
    }
}

/// Convert TileError to HTTP response.
///
/// Errors are logged by severity:
/// - 5xx at ERROR
/// - 400 at WARN
/// - 404 at DEBUG (common and expected)
impl IntoResponse for TileError {
    fn into_response(self) -> Response {
        let status = error_status(&self);

        if status.is_server_error() {
            error!(status = status.as_u16(), error = %self, "Server error");
        } else if status == StatusCode::NOT_FOUND {
            debug!(status = status.as_u16(), error = %self, "Resource not found");
        } else {
            warn!(status = status.as_u16(), error = %self, "Client error");
        }

        (
            status,
            [(header::CONTENT_TYPE, "text/plain; charset=utf-8")],
            GENERIC_ERROR_BODY,
        )
            .into_response()
    }
}

// =============================================================================
// Handlers
// =============================================================================

/// Handle tile requests in query form.
///
/// # Endpoint
///
/// `GET /tile?image={key}&path={level}/{x}_{y}.jpg`
///
/// # Response
///
/// - `200 OK`: encoded tile
/// - `400 Bad Request`: missing parameter or malformed path
/// - `404 Not Found`: unknown source, level or tile
/// - `500 Internal Server Error`: source unusable or processing error
///
/// # Headers
///
/// - `Content-Type: image/jpeg`
/// - `Cache-Control: public, max-age={cache_max_age}`
pub async fn tile_handler<B: TileBackend>(
    State(state): State<AppState<B>>,
    RawQuery(query): RawQuery,
) -> Result<Response, TileError> {
    let params = TileQueryParams::parse(query.as_deref());
    let image = params.require_image()?;
    let path = params.require_path()?;

    let tile = state.tile_service.serve_path(image, path).await?;
    Ok(tile_response(&state, tile))
}

/// Handle Deep Zoom descriptor and tile requests.
///
/// # Endpoint
///
/// `GET /deepzoom/{key}.dzi` or `GET /deepzoom/{key}_files/{level}/{x}_{y}.jpg`
pub async fn deepzoom_handler<B: TileBackend>(
    State(state): State<AppState<B>>,
    Path(rest): Path<String>,
) -> Result<Response, TileError> {
    match DeepZoomPath::parse(&rest)? {
        DeepZoomPath::Descriptor { source_key } => {
            let info = state.tile_service.pyramid_info(source_key).await?;
            let xml = generate_dzi_xml(info.width, info.height, info.tile_size);

            Ok((
                StatusCode::OK,
                [
                    (header::CONTENT_TYPE, "application/xml".to_string()),
                    (header::CACHE_CONTROL, state.cache_control()),
                ],
                xml,
            )
                .into_response())
        }
        DeepZoomPath::Tile {
            source_key,
            tile_path,
        } => {
            let tile = state.tile_service.serve_path(source_key, tile_path).await?;
            Ok(tile_response(&state, tile))
        }
    }
}

/// Handle pyramid metadata requests.
///
/// # Endpoint
///
/// `GET /info?image={key}`
pub async fn info_handler<B: TileBackend>(
    State(state): State<AppState<B>>,
    RawQuery(query): RawQuery,
) -> Result<Json<PyramidInfo>, TileError> {
    let params = TileQueryParams::parse(query.as_deref());
    let image = params.require_image()?;

    let info = state.tile_service.pyramid_info(image).await?;
    Ok(Json(info))
}

/// Handle health check requests.
///
/// # Endpoint
///
/// `GET /health`
pub async fn health_handler() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn tile_response<B: TileBackend>(state: &AppState<B>, tile: TileResponse) -> Response {
    (
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, tile.content_type.to_string()),
            (header::CACHE_CONTROL, state.cache_control()),
        ],
        tile.data,
    )
        .into_response()
}

// =============================================================================
// Tests
// =============================================================================
