//! Tile path parsing.
//!
//! Tile paths have the exact form `level/x_y.ext`, for example `12/3_7.jpg`.
//! Each number is plain ASCII digits (no sign, no whitespace) and must not
//! exceed [`MAX_COORDINATE`]. Parsing happens before any pyramid is touched,
//! so a malformed path never costs a source fetch.

use crate::error::TileError;

/// Largest accepted level or tile coordinate.
pub const MAX_COORDINATE: u32 = 100_000;

/// Accepted tile path extensions.
pub const TILE_EXTENSIONS: [&str; 2] = ["jpg", "jpeg"];

/// A parsed `level/x_y.ext` tile address.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TileAddress {
    pub level: usize,
    pub x: u32,
    pub y: u32,
}

impl TileAddress {
    pub fn new(level: usize, x: u32, y: u32) -> Self {
        Self { level, x, y }
    }

    /// Parse a tile path.
    ///
    /// # Errors
    ///
    /// Returns [`TileError::MalformedRequest`] when the path does not match
    /// `level/x_y.ext` exactly or any number is out of range.
    pub fn parse(path: &str) -> Result<Self, TileError> {
        let (level, file) = path
            .split_once('/')
            .ok_or_else(|| TileError::malformed("tile path has no level component"))?;

        let (coords, ext) = file
            .rsplit_once('.')
            .ok_or_else(|| TileError::malformed("tile path has no extension"))?;
        if !TILE_EXTENSIONS.contains(&ext) {
            return Err(TileError::malformed(format!(
                "unsupported tile extension {:?}",
                ext
            )));
        }

        let (x, y) = coords
            .split_once('_')
            .ok_or_else(|| TileError::malformed("tile name is not x_y"))?;

        Ok(Self {
            level: parse_coordinate(level, "level")? as usize,
            x: parse_coordinate(x, "x")?,
            y: parse_coordinate(y, "y")?,
        })
    }
}

/// Parse one decimal component in `[0, MAX_COORDINATE]`.
fn parse_coordinate(text: &str, name: &str) -> Result<u32, TileError> {
    // Rejects empty strings, signs, whitespace and stray separators; the
    // length cap keeps the parse from overflowing
    if text.is_empty() || text.len() > 6 || !text.bytes().all(|b| b.is_ascii_digit()) {
        return Err(TileError::malformed(format!(
            "{} {:?} is not a decimal number",
            name, text
        )));
    }

    let value: u32 = text
        .parse()
        .map_err(|_| TileError::malformed(format!("{} {:?} is not a decimal number", name, text)))?;

    if value > MAX_COORDINATE {
        return Err(TileError::malformed(format!(
            "{} {} exceeds {}",
            name, value, MAX_COORDINATE
        )));
    }
    Ok(value)
}
