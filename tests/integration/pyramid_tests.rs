//! Pyramid construction and tile round-trip tests.
//!
//! Tests verify:
//! - Native levels land on the matching chain positions
//! - Gap levels are synthesized from their parent
//! - Every tile of every level has the clipped rectangle it should
//! - Real raster decoding, shrinking and JPEG encoding end to end

use std::sync::Arc;

use tilesrv::pyramid::{build_pyramid, chain_dimensions, tile_rect};
use tilesrv::{PyramidCache, PyramidOptions, RasterBackend, TileError, TileService};

use super::test_utils::{
    create_test_jpeg, create_test_png, is_valid_jpeg, jpeg_dimensions, FakeBackend, MemoryStore,
};

fn options(tile_size: u32) -> PyramidOptions {
    PyramidOptions {
        tile_size,
        quality: 50,
    }
}

/// 1000x600 with natives at 1x, 2x and 16x.
///
/// Chain: 1000x600, 500x300, 250x150, 125x75, 63x38, 32x19, 16x10, 8x5, 4x3,
/// 2x2, 1x1. The 4x and 8x levels are the synthesized gap.
fn gapped_backend() -> FakeBackend {
    FakeBackend::new().with_source(
        "gapped",
        vec![(1000, 600, 1.0), (500, 300, 2.0), (63, 38, 16.0)],
    )
}

// =============================================================================
// Layout
// =============================================================================

#[tokio::test]
async fn test_native_and_synthesized_levels() {
    let backend = gapped_backend();
    let pyramid = build_pyramid(&backend, "gapped", &options(256)).await.unwrap();

    assert_eq!(pyramid.level_count(), 11);

    let native: Vec<bool> = pyramid.slices().iter().map(|s| s.is_native()).collect();
    let mut expected = vec![false; 11];
    expected[10] = true;
    expected[9] = true;
    expected[6] = true;
    assert_eq!(native, expected);

    // Gap levels are 4x and 8x
    assert_eq!(pyramid.find_slice(8).unwrap().downsample(), 4);
    assert_eq!(pyramid.find_slice(7).unwrap().downsample(), 8);
    assert!(!pyramid.find_slice(8).unwrap().image().native);
    assert!(!pyramid.find_slice(7).unwrap().image().native);

    // Two shrinks for the gap, six for 32x19 down to 1x1
    assert_eq!(backend.shrinks(), 8);
}

#[tokio::test]
async fn test_chain_dimensions_match_slices() {
    let backend = gapped_backend();
    let pyramid = build_pyramid(&backend, "gapped", &options(256)).await.unwrap();

    let mut dims = chain_dimensions(1000, 600);
    dims.reverse();
    let slice_dims: Vec<(u32, u32)> = pyramid
        .slices()
        .iter()
        .map(|s| (s.width(), s.height()))
        .collect();
    assert_eq!(slice_dims, dims);

    // Adjacent factors double
    for pair in pyramid.slices().windows(2) {
        assert_eq!(pair[0].downsample(), pair[1].downsample() * 2);
    }
}

#[tokio::test]
async fn test_smallest_native_cache_is_persistent() {
    let backend = gapped_backend();
    let pyramid = build_pyramid(&backend, "gapped", &options(256)).await.unwrap();

    for slice in pyramid.slices() {
        assert_eq!(
            slice.tiles().is_persistent(),
            slice.level_index() == 6,
            "level {}",
            slice.level_index()
        );
    }
    // (ceil(1920/256)+2) * (ceil(1080/256)+2)
    assert_eq!(pyramid.root().tiles().capacity(), Some(70));
}

// =============================================================================
// Round Trip
// =============================================================================

#[tokio::test]
async fn test_round_trip_every_tile() {
    let tile_size = 64;
    let backend = Arc::new(gapped_backend());
    let cache = Arc::new(PyramidCache::new(Arc::clone(&backend), options(tile_size)));
    let service = TileService::new(Arc::clone(&cache));

    let info = service.pyramid_info("gapped").await.unwrap();
    let mut served = 0;

    for level in &info.levels {
        for ty in 0..level.tiles_y {
            for tx in 0..level.tiles_x {
                let tile = service
                    .serve_tile("gapped", level.level, tx, ty)
                    .await
                    .unwrap();
                let (x, y, w, h) = tile_rect(level.width, level.height, tile_size, tx, ty).unwrap();
                assert_eq!(tile.data, format!("{}x{}@{},{}", w, h, x, y));
                served += 1;
            }
        }

        // One past the grid is out of range
        let err = service
            .serve_tile("gapped", level.level, level.tiles_x, 0)
            .await
            .err()
            .unwrap();
        assert!(matches!(err, TileError::TileOutOfRange { .. }));
    }

    assert!(served > 200);
    assert_eq!(backend.builds(), 1);
}

#[tokio::test]
async fn test_clipped_edge_tile_width() {
    let backend = Arc::new(gapped_backend());
    let service = TileService::new(Arc::new(PyramidCache::new(backend, options(256))));

    // 1000 - 3*256 = 232, 600 - 2*256 = 88
    let tile = service.serve_tile("gapped", 10, 3, 2).await.unwrap();
    assert_eq!(tile.data, "232x88@768,512");

    // Level 9 is 500x300: 500 - 256 = 244
    let tile = service.serve_tile("gapped", 9, 1, 0).await.unwrap();
    assert_eq!(tile.data, "244x256@256,0");
}

#[tokio::test]
async fn test_level_beyond_max_is_not_found() {
    let backend = Arc::new(gapped_backend());
    let service = TileService::new(Arc::new(PyramidCache::new(backend, options(256))));

    let err = service.serve_tile("gapped", 11, 0, 0).await.err().unwrap();
    assert!(matches!(err, TileError::NotFound { level: 11, .. }));
}

#[tokio::test]
async fn test_invalid_native_layout() {
    let backend = Arc::new(
        FakeBackend::new()
            .with_source("stray", vec![(100, 100, 1.0), (34, 34, 3.0)])
            .with_source("dup", vec![(100, 100, 1.0), (25, 25, 4.0), (25, 25, 4.0)]),
    );
    let service = TileService::new(Arc::new(PyramidCache::new(backend, options(256))));

    for key in ["stray", "dup"] {
        let err = service.serve_tile(key, 0, 0, 0).await.err().unwrap();
        assert!(matches!(err, TileError::SourceInvalid { .. }), "{key}");
    }
}

// =============================================================================
// Raster Backend
// =============================================================================

#[tokio::test]
async fn test_raster_round_trip() {
    let store = MemoryStore::new().with_object("photo.jpg", create_test_jpeg(300, 200));
    let backend = Arc::new(RasterBackend::new(store));
    let service = TileService::new(Arc::new(PyramidCache::new(backend, options(128))));

    let info = service.pyramid_info("photo.jpg").await.unwrap();
    assert_eq!((info.width, info.height), (300, 200));
    assert_eq!(info.level_count, 10);

    for level in &info.levels {
        for ty in 0..level.tiles_y {
            for tx in 0..level.tiles_x {
                let tile = service
                    .serve_tile("photo.jpg", level.level, tx, ty)
                    .await
                    .unwrap();
                assert!(is_valid_jpeg(&tile.data));

                let (_, _, w, h) = tile_rect(level.width, level.height, 128, tx, ty).unwrap();
                assert_eq!(jpeg_dimensions(&tile.data), (w, h));
            }
        }
    }
}

#[tokio::test]
async fn test_raster_full_resolution_cache_stays_bounded() {
    // 10x8 top-level grid exceeds the 70-tile viewport bound at 256px
    let store = MemoryStore::new().with_object("large.jpg", create_test_jpeg(2560, 2048));
    let backend = Arc::new(RasterBackend::new(store));
    let service = TileService::new(Arc::new(PyramidCache::new(backend, options(256))));

    let info = service.pyramid_info("large.jpg").await.unwrap();
    let top = info.levels.last().unwrap();
    assert_eq!((top.tiles_x, top.tiles_y), (10, 8));

    for ty in 0..top.tiles_y {
        for tx in 0..top.tiles_x {
            service
                .serve_tile("large.jpg", top.level, tx, ty)
                .await
                .unwrap();
        }
    }

    let pyramid = service.cache().resolve("large.jpg").await.unwrap();
    let root = pyramid.root().tiles();
    assert!(!root.is_persistent());
    assert_eq!(root.capacity(), Some(70));
    assert!(root.len().await <= 70);
    assert!(pyramid.lowest().tiles().is_persistent());
}

#[tokio::test]
async fn test_raster_png_source() {
    let store = MemoryStore::new().with_object("scan.png", create_test_png(1, 5));
    let backend = Arc::new(RasterBackend::new(store));
    let service = TileService::new(Arc::new(PyramidCache::new(backend, options(256))));

    let info = service.pyramid_info("scan.png").await.unwrap();
    let dims: Vec<(u32, u32)> = info.levels.iter().map(|l| (l.width, l.height)).collect();
    assert_eq!(dims, vec![(1, 1), (1, 2), (1, 3), (1, 5)]);

    let tile = service.serve_tile("scan.png", 0, 0, 0).await.unwrap();
    assert_eq!(jpeg_dimensions(&tile.data), (1, 1));
}

#[tokio::test]
async fn test_single_pixel_source() {
    let store = MemoryStore::new().with_object("dot.png", create_test_png(1, 1));
    let backend = Arc::new(RasterBackend::new(store));
    let service = TileService::new(Arc::new(PyramidCache::new(backend, options(256))));

    let info = service.pyramid_info("dot.png").await.unwrap();
    assert_eq!(info.level_count, 1);

    let tile = service.serve_tile("dot.png", 0, 0, 0).await.unwrap();
    assert_eq!(jpeg_dimensions(&tile.data), (1, 1));
    assert!(matches!(
        service.serve_tile("dot.png", 1, 0, 0).await.err().unwrap(),
        TileError::NotFound { .. }
    ));
}
