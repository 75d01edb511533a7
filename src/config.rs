//! Configuration management.
//!
//! This module provides a flexible configuration system that supports:
//! - Command-line arguments via clap
//! - Environment variables with `TILESRV_` prefix
//! - Sensible defaults for all optional settings
//!
//! # Example
//!
//! ```ignore
//! use clap::Parser;
//! use tilesrv::config::Config;
//!
//! let config = Config::parse();
//! config.validate()?;
//! println!("Listening on {}", config.bind_address());
//! ```
//!
//! # Environment Variables
//!
//! - `TILESRV_HOST` - Server bind address (default: 0.0.0.0)
//! - `TILESRV_PORT` - Server port (default: 3000)
//! - `TILESRV_ROOT` - Local directory holding source images
//! - `TILESRV_S3_BUCKET` - S3 bucket holding source images
//! - `TILESRV_S3_PREFIX` - Key prefix inside the bucket
//! - `TILESRV_S3_ENDPOINT` - Custom S3 endpoint for S3-compatible services
//! - `TILESRV_S3_REGION` - AWS region (default: us-east-1)
//! - `TILESRV_CACHE_PYRAMIDS` - Max pyramids to keep in memory (default: 10)
//! - `TILESRV_TILE_SIZE` - Tile edge length in pixels (default: 256)
//! - `TILESRV_JPEG_QUALITY` - JPEG quality (default: 50)
//! - `TILESRV_CACHE_MAX_AGE` - HTTP cache max-age seconds (default: 3600)
//! - `TILESRV_CORS_ORIGINS` - Comma-separated allowed origins
//! - `TILESRV_LOG_FILE` - Append logs to this file instead of stderr

use std::path::PathBuf;

use clap::Parser;

use crate::pyramid::{
    PyramidOptions, DEFAULT_PYRAMID_CACHE_CAPACITY, DEFAULT_TILE_QUALITY, DEFAULT_TILE_SIZE,
};
use crate::server::DEFAULT_CACHE_MAX_AGE;

// =============================================================================
// Default Values
// =============================================================================

/// Default server host.
pub const DEFAULT_HOST: &str = "0.0.0.0";

/// Default server port.
pub const DEFAULT_PORT: u16 = 3000;

/// Default AWS region.
pub const DEFAULT_REGION: &str = "us-east-1";

/// Smallest accepted tile size.
pub const MIN_TILE_SIZE: u32 = 16;

/// Largest accepted tile size.
pub const MAX_TILE_SIZE: u32 = 4096;

// =============================================================================
// CLI Arguments
// =============================================================================

/// tilesrv - A deep-zoom tile server for very large images.
///
/// Builds a complete resolution pyramid for each requested image and serves
/// fixed-size JPEG tiles from it. Images are read from a local directory or
/// from S3-compatible storage.
#[derive(Parser, Debug, Clone)]
#[command(name = "tilesrv")]
#[command(author, version, about, long_about = None)]
pub struct Config {
    // =========================================================================
    // Server Configuration
    // =========================================================================
    /// Host address to bind the server to.
    #[arg(long, default_value = DEFAULT_HOST, env = "TILESRV_HOST")]
    pub host: String,

    /// Port to listen on.
    #[arg(short, long, default_value_t = DEFAULT_PORT, env = "TILESRV_PORT")]
    pub port: u16,

    // =========================================================================
    // Source Configuration
    // =========================================================================
    /// Local directory containing source images.
    ///
    /// Image keys are resolved relative to this directory.
    #[arg(long, env = "TILESRV_ROOT", conflicts_with = "s3_bucket")]
    pub root: Option<PathBuf>,

    /// S3 bucket name containing source images.
    #[arg(long, env = "TILESRV_S3_BUCKET")]
    pub s3_bucket: Option<String>,

    /// Key prefix prepended to every image key in the bucket.
    #[arg(long, env = "TILESRV_S3_PREFIX")]
    pub s3_prefix: Option<String>,

    /// Custom S3 endpoint URL for S3-compatible services (MinIO, etc.).
    ///
    /// If not specified, uses the default AWS S3 endpoint.
    #[arg(long, env = "TILESRV_S3_ENDPOINT")]
    pub s3_endpoint: Option<String>,

    /// AWS region for S3.
    #[arg(long, default_value = DEFAULT_REGION, env = "TILESRV_S3_REGION")]
    pub s3_region: String,

    // =========================================================================
    // Pyramid Configuration
    // =========================================================================
    /// Maximum number of complete pyramids to keep in memory.
    #[arg(long, default_value_t = DEFAULT_PYRAMID_CACHE_CAPACITY, env = "TILESRV_CACHE_PYRAMIDS")]
    pub cache_pyramids: usize,

    /// Tile edge length in pixels.
    #[arg(long, default_value_t = DEFAULT_TILE_SIZE, env = "TILESRV_TILE_SIZE")]
    pub tile_size: u32,

    /// JPEG quality for tile encoding (1-100).
    #[arg(long, default_value_t = DEFAULT_TILE_QUALITY, env = "TILESRV_JPEG_QUALITY")]
    pub jpeg_quality: u8,

    /// HTTP Cache-Control max-age in seconds.
    #[arg(long, default_value_t = DEFAULT_CACHE_MAX_AGE, env = "TILESRV_CACHE_MAX_AGE")]
    pub cache_max_age: u32,

    // =========================================================================
    // CORS Configuration
    // =========================================================================
    /// Allowed CORS origins (comma-separated).
    ///
    /// If not specified, allows any origin.
    #[arg(long, env = "TILESRV_CORS_ORIGINS", value_delimiter = ',')]
    pub cors_origins: Option<Vec<String>>,

    // =========================================================================
    // Logging Configuration
    // =========================================================================
    /// Append log output to this file instead of stderr.
    #[arg(long = "log", env = "TILESRV_LOG_FILE")]
    pub log_file: Option<PathBuf>,

    /// Enable verbose logging (debug level).
    #[arg(short, long, default_value_t = false)]
    pub verbose: bool,

    /// Disable request tracing.
    #[arg(long, default_value_t = false)]
    pub no_tracing: bool,
}

/// Where source images are read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceLocation {
    Local(PathBuf),
    S3 {
        bucket: String,
        prefix: Option<String>,
    },
}

impl Config {
    /// Validate the configuration and return an error message if invalid.
    pub fn validate(&self) -> Result<(), String> {
        match (&self.root, &self.s3_bucket) {
            (None, None) => {
                return Err(
                    "No image source configured. Set --root (TILESRV_ROOT) or \
                     --s3-bucket (TILESRV_S3_BUCKET)"
                        .to_string(),
                );
            }
            (Some(_), Some(_)) => {
                return Err("--root and --s3-bucket are mutually exclusive".to_string());
            }
            (None, Some(bucket)) if bucket.is_empty() => {
                return Err("S3 bucket name must not be empty".to_string());
            }
            _ => {}
        }

        if self.cache_pyramids == 0 {
            return Err("cache_pyramids must be greater than 0".to_string());
        }

        if self.jpeg_quality == 0 || self.jpeg_quality > 100 {
            return Err("jpeg_quality must be between 1 and 100".to_string());
        }

        if !(MIN_TILE_SIZE..=MAX_TILE_SIZE).contains(&self.tile_size) {
            return Err(format!(
                "tile_size must be between {} and {}",
                MIN_TILE_SIZE, MAX_TILE_SIZE
            ));
        }

        Ok(())
    }

    /// Get the server bind address as "host:port".
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// The configured image source (call validate() first).
    pub fn source(&self) -> Option<SourceLocation> {
        if let Some(ref root) = self.root {
            return Some(SourceLocation::Local(root.clone()));
        }
        self.s3_bucket.as_ref().map(|bucket| SourceLocation::S3 {
            bucket: bucket.clone(),
            prefix: self.s3_prefix.clone().filter(|p| !p.is_empty()),
        })
    }

    /// Tile settings for the pyramid cache.
    pub fn pyramid_options(&self) -> PyramidOptions {
        PyramidOptions {
            tile_size: self.tile_size,
            quality: self.jpeg_quality,
        }
    }
}

// =============================================================================
// Tests
// =============================================================================
