//! Deep Zoom Image (DZI) compatibility.
//!
//! Pyramid level indices already follow the Deep Zoom convention (level 0
//! is 1x1, the highest level is full resolution), so DZI tile URLs map onto
//! pyramid tiles without any level translation.
//!
//! URL layout under `/deepzoom/`:
//!
//! - `<key>.dzi` - XML descriptor
//! - `<key>_files/<level>/<x>_<y>.jpg` - tile

use crate::error::TileError;

/// Separator between the source key and the tile path in DZI tile URLs.
const FILES_SEPARATOR: &str = "_files/";

/// A request under the `/deepzoom/` prefix.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DeepZoomPath<'a> {
    /// `<key>.dzi`
    Descriptor { source_key: &'a str },

    /// `<key>_files/<tile path>`
    Tile {
        source_key: &'a str,
        tile_path: &'a str,
    },
}

impl<'a> DeepZoomPath<'a> {
    /// Split a `/deepzoom/` path into source key and target.
    ///
    /// The tile path itself is not validated here; that is left to
    /// [`crate::tile::TileAddress::parse`].
    pub fn parse(rest: &'a str) -> Result<Self, TileError> {
        if let Some(source_key) = rest.strip_suffix(".dzi") {
            if source_key.is_empty() {
                return Err(TileError::malformed("descriptor path has no source key"));
            }
            return Ok(DeepZoomPath::Descriptor { source_key });
        }

        // The tile path never contains the separator, so split on the last one
        let split = rest
            .rfind(FILES_SEPARATOR)
            .ok_or_else(|| TileError::malformed("deep zoom path is neither .dzi nor _files/"))?;
        let source_key = &rest[..split];
        let tile_path = &rest[split + FILES_SEPARATOR.len()..];

        if source_key.is_empty() {
            return Err(TileError::malformed("tile path has no source key"));
        }

        Ok(DeepZoomPath::Tile {
            source_key,
            tile_path,
        })
    }
}

/// Generate the DZI XML descriptor for an image.
///
/// # Example Output
///
/// ```xml
/// <?xml version="1.0" encoding="UTF-8"?>
/// <Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
///        TileSize="256"
///        Overlap="0"
///        Format="jpg">
///   <Size Width="46920" Height="33600" />
/// </Image>
/// ```
pub fn generate_dzi_xml(width: u32, height: u32, tile_size: u32) -> String {
    format!(
        r#"<?xml version="1.0" encoding="UTF-8"?>
<Image xmlns="http://schemas.microsoft.com/deepzoom/2008"
       TileSize="{tile_size}"
       Overlap="0"
       Format="jpg">
  <Size Width="{width}" Height="{height}" />
</Image>"#
    )
}
