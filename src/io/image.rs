//! Score image decoding.

use std::path::Path;

use crate::error::ScoremarkError;
use crate::geom::Raster;

/// Decodes a PNG or JPEG file into an 8-bit grayscale raster.
///
/// No thresholding is done; nonzero pixels count as foreground.
pub fn read_grayscale(path: &Path) -> Result<Raster, ScoremarkError> {
    let decoded = image::open(path).map_err(|source| ScoremarkError::ImageDecode {
        path: path.to_path_buf(),
        message: source.to_string(),
    })?;
    let raster = Raster::from_luma(decoded.to_luma8());
    tracing::debug!(
        path = %path.display(),
        height = raster.height(),
        width = raster.width(),
        "decoded image"
    );
    Ok(raster)
}
