//! Pyramid construction.
//!
//! A source exposes a handful of native levels (often 1x, 4x, 16x, ...).
//! The builder lays out the complete power-of-two chain from full
//! resolution down to 1x1, slots each native level into the chain position
//! with the matching downsample factor, and synthesizes every remaining
//! level by halving its parent.
//!
//! # Algorithm
//!
//! 1. Open native level 0 to learn the full-resolution size `(W, H)`.
//! 2. Halve with round-up until `1x1`, giving one slot per factor 1, 2, 4, ...
//! 3. Ask the backend how many native levels exist (must be in `[1, 100]`).
//! 4. Install each native level in the slot whose factor matches.
//! 5. Walk top-down, filling empty slots by halving the parent.
//! 6. Give the smallest native level an unbounded tile cache when its whole
//!    grid fits the viewport bound, else give it to the 1x1 level.
//!
//! Nothing is published until every slot holds an image.

use std::time::Instant;

use tracing::{debug, info};

use super::slice::{viewport_tile_capacity, Slice, SliceTileCache};
use super::{Pyramid, PyramidOptions};
use crate::backend::{ImageHandle, TileBackend};
use crate::error::{BackendError, TileError};

/// Largest native level count accepted from a source.
pub const MAX_NATIVE_LEVELS: usize = 100;

/// Slot dimensions from full resolution down to `1x1`, halving each axis
/// with round-up. Index `k` holds the level with downsample `2^k`.
pub fn chain_dimensions(width: u32, height: u32) -> Vec<(u32, u32)> {
    let (mut w, mut h) = (width.max(1), height.max(1));
    let mut dims = vec![(w, h)];
    while w > 1 || h > 1 {
        w = w.div_ceil(2);
        h = h.div_ceil(2);
        dims.push((w, h));
    }
    dims
}

/// Convert a backend-reported downsample factor to an integer.
///
/// Factors are rounded to the nearest integer, so both `4.000069474` and
/// `3.9999` become 4. Non-finite or sub-unit factors yield `None`.
pub fn downsample_to_factor(reported: f64) -> Option<u64> {
    if !reported.is_finite() || reported < 0.5 {
        return None;
    }
    let rounded = reported.round();
    if rounded > u64::MAX as f64 {
        return None;
    }
    Some(rounded as u64)
}

/// Build the complete pyramid for `source_key`.
pub async fn build_pyramid<B: TileBackend>(
    backend: &B,
    source_key: &str,
    options: &PyramidOptions,
) -> Result<Pyramid<B::Image>, TileError> {
    let started = Instant::now();
    let backend_error = |e: BackendError| -> TileError {
        if e.source_missing {
            TileError::SourceNotFound {
                source_key: source_key.to_string(),
            }
        } else {
            TileError::Backend(e)
        }
    };

    let base = backend
        .open_level(source_key, 0)
        .await
        .map_err(|e| backend_error(e.at_level(0)))?;

    if base.width == 0 || base.height == 0 {
        return Err(TileError::source_invalid(
            source_key,
            format!("full-resolution level is {}x{}", base.width, base.height),
        ));
    }

    let dims = chain_dimensions(base.width, base.height);
    let top = dims.len() - 1;
    let slot_dims = |level_index: usize| dims[top - level_index];

    let native_count = backend
        .native_level_count(source_key)
        .await
        .map_err(backend_error)?;
    if !(1..=MAX_NATIVE_LEVELS).contains(&native_count) {
        return Err(TileError::source_invalid(
            source_key,
            format!(
                "reports {} native levels (expected 1-{})",
                native_count, MAX_NATIVE_LEVELS
            ),
        ));
    }

    debug!(
        source_key,
        width = base.width,
        height = base.height,
        levels = dims.len(),
        native_count,
        "Laying out pyramid"
    );

    let mut images: Vec<Option<B::Image>> = vec![None; dims.len()];
    let mut native = vec![false; dims.len()];
    let mut smallest_native: Option<usize> = None;
    let mut base = Some(base);

    for native_index in 0..native_count {
        let level = match base.take() {
            Some(level) => level,
            None => backend
                .open_level(source_key, native_index)
                .await
                .map_err(|e| backend_error(e.at_level(native_index)))?,
        };

        let factor = downsample_to_factor(level.reported_downsample)
            .filter(|f| f.is_power_of_two() && (f.trailing_zeros() as usize) <= top)
            .ok_or_else(|| {
                TileError::source_invalid(
                    source_key,
                    format!(
                        "native level {} reports downsample {} which matches no pyramid level",
                        native_index, level.reported_downsample
                    ),
                )
            })?;

        let level_index = top - factor.trailing_zeros() as usize;
        if images[level_index].is_some() {
            return Err(TileError::source_invalid(
                source_key,
                format!(
                    "native level {} duplicates downsample {}",
                    native_index, factor
                ),
            ));
        }

        let (width, height) = slot_dims(level_index);
        let image = fit_to_slot(backend, level.image, width, height)
            .await
            .map_err(|e| backend_error(e.at_level(level_index)))?;

        images[level_index] = Some(image);
        native[level_index] = true;
        smallest_native = Some(smallest_native.map_or(level_index, |s| s.min(level_index)));
    }

    if images[top].is_none() {
        return Err(TileError::source_invalid(
            source_key,
            "no native level has downsample 1",
        ));
    }

    // Synthesize top-down; each level depends on its parent being populated
    for level_index in (0..top).rev() {
        if images[level_index].is_some() {
            continue;
        }

        let parent = images[level_index + 1].as_ref().ok_or_else(|| {
            TileError::source_invalid(source_key, "pyramid synthesis lost its parent level")
        })?;
        let (width, height) = slot_dims(level_index);
        let image = synthesize(backend, parent, width, height)
            .await
            .map_err(|e| backend_error(e.at_level(level_index)))?;
        images[level_index] = Some(image);
    }

    // Only a slice whose whole tile grid fits the viewport bound may keep
    // every tile; otherwise fall back to the 1x1 slice.
    let bounded_capacity = viewport_tile_capacity(options.tile_size);
    let persistent_level = smallest_native
        .filter(|&level| {
            let (width, height) = slot_dims(level);
            grid_tile_count(width, height, options.tile_size) <= bounded_capacity as u64
        })
        .unwrap_or(0);

    let mut slices = Vec::with_capacity(images.len());
    for (level_index, image) in images.into_iter().enumerate() {
        let image = image.ok_or_else(|| {
            TileError::source_invalid(source_key, format!("level {} was never filled", level_index))
        })?;
        let (width, height) = slot_dims(level_index);
        let persistent = level_index == persistent_level;

        slices.push(Slice {
            level_index,
            width,
            height,
            downsample: 1u64 << (top - level_index),
            native: native[level_index],
            parent: (level_index < top).then_some(level_index + 1),
            child: level_index.checked_sub(1),
            image,
            tiles: if persistent {
                SliceTileCache::persistent()
            } else {
                SliceTileCache::bounded(bounded_capacity)
            },
        });
    }

    info!(
        source_key,
        levels = slices.len(),
        native_levels = native_count,
        elapsed_ms = started.elapsed().as_millis() as u64,
        "Built pyramid"
    );

    Ok(Pyramid::new(source_key.to_string(), slices, options.clone()))
}

fn grid_tile_count(width: u32, height: u32, tile_size: u32) -> u64 {
    let tile_size = tile_size.max(1);
    u64::from(width.div_ceil(tile_size)) * u64::from(height.div_ceil(tile_size))
}

/// Make a native image cover its slot, extending edges when the backend's
/// rounding left it a pixel short.
async fn fit_to_slot<B: TileBackend>(
    backend: &B,
    image: B::Image,
    width: u32,
    height: u32,
) -> Result<B::Image, BackendError> {
    if image.width() >= width && image.height() >= height {
        return Ok(image);
    }
    backend.extend_edges(&image, width, height).await
}

/// Produce a `width` x `height` level from its parent.
async fn synthesize<B: TileBackend>(
    backend: &B,
    parent: &B::Image,
    width: u32,
    height: u32,
) -> Result<B::Image, BackendError> {
    // Halving a 1-pixel axis is undefined, so pad it to 2 first
    let shrunk = if parent.width() == 1 || parent.height() == 1 {
        let padded = backend
            .extend_edges(parent, parent.width().max(2), parent.height().max(2))
            .await?;
        backend.shrink_by_two(&padded).await?
    } else {
        backend.shrink_by_two(parent).await?
    };
    fit_to_slot(backend, shrunk, width, height).await
}
