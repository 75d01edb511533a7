//! tilesrv - A deep-zoom tile server for very large images.
//!
//! This binary starts the HTTP server and configures all components.

use std::process::ExitCode;
use std::sync::Arc;

use clap::Parser;
use tracing::{error, info};

use tilesrv::{
    backend::RasterBackend,
    config::{Config, SourceLocation},
    create_s3_client,
    io::{LocalStore, S3Store, SourceStore},
    logging::init_logging,
    pyramid::PyramidCache,
    server::{create_router, RouterConfig},
    tile::TileService,
};

#[tokio::main]
async fn main() -> ExitCode {
    let config = Config::parse();

    if let Err(e) = init_logging(config.verbose, config.log_file.as_deref()) {
        eprintln!("Failed to open log file: {}", e);
        return ExitCode::FAILURE;
    }

    if let Err(e) = config.validate() {
        error!("Configuration error: {}", e);
        return ExitCode::FAILURE;
    }

    match config.source() {
        Some(SourceLocation::Local(root)) => run_serve(&config, LocalStore::new(root)).await,
        Some(SourceLocation::S3 { bucket, prefix }) => {
            if let Some(ref endpoint) = config.s3_endpoint {
                info!("  S3 endpoint: {}", endpoint);
            }
            info!("  S3 region: {}", config.s3_region);

            let client = create_s3_client(config.s3_endpoint.as_deref(), &config.s3_region).await;
            let mut store = S3Store::new(client, bucket);
            if let Some(prefix) = prefix {
                store = store.with_prefix(prefix);
            }
            run_serve(&config, store).await
        }
        None => {
            error!("Configuration error: no image source");
            ExitCode::FAILURE
        }
    }
}

// =============================================================================
// Serve
// =============================================================================

async fn run_serve<S: SourceStore + 'static>(config: &Config, store: S) -> ExitCode {
    info!("  Source: {}", store.describe());
    info!(
        "  Cache: {} pyramids, {}px tiles, JPEG quality {}",
        config.cache_pyramids, config.tile_size, config.jpeg_quality
    );

    let backend = Arc::new(RasterBackend::new(store));
    let cache = PyramidCache::with_capacity(
        backend,
        config.pyramid_options(),
        config.cache_pyramids,
    );
    let tile_service = TileService::new(Arc::new(cache));
    let router = create_router(tile_service, build_router_config(config));

    let addr = config.bind_address();
    info!("────────────────────────────────────────────────────────────────");
    info!("  Server listening on: http://{}", addr);
    info!("");
    info!("  Try these endpoints:");
    info!("    curl http://{}/health", addr);
    info!("    curl 'http://{}/info?image=<key>'", addr);
    info!("    curl 'http://{}/tile?image=<key>&path=0/0_0.jpg'", addr);
    info!("    curl http://{}/deepzoom/<key>.dzi", addr);
    info!("────────────────────────────────────────────────────────────────");

    let listener = match tokio::net::TcpListener::bind(&addr).await {
        Ok(listener) => listener,
        Err(e) => {
            error!("Failed to bind to {}: {}", addr, e);
            return ExitCode::FAILURE;
        }
    };

    if let Err(e) = axum::serve(listener, router).await {
        error!("Server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}

/// Build RouterConfig from the application Config.
fn build_router_config(config: &Config) -> RouterConfig {
    let mut router_config = RouterConfig::new()
        .with_cache_max_age(config.cache_max_age)
        .with_tracing(!config.no_tracing);

    if let Some(ref origins) = config.cors_origins {
        router_config = router_config.with_cors_origins(origins.clone());
    }

    router_config
}
