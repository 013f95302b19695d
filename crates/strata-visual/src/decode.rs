#![forbid(unsafe_code)]

//! Loading image files into [`RgbaBuf`]s through the `image` crate.

use std::path::Path;

use image::DynamicImage;

use crate::error::BlitError;
use crate::rgba::RgbaBuf;

impl RgbaBuf {
    /// Decode an encoded image (PNG, GIF or JPEG) held in memory. Only the
    /// first frame of an animation is kept.
    pub fn from_bytes(bytes: &[u8]) -> Result<Self, BlitError> {
        from_dynamic(image::load_from_memory(bytes)?)
    }

    /// Decode an image file, guessing the format from its contents.
    pub fn from_path(path: impl AsRef<Path>) -> Result<Self, BlitError> {
        let reader = image::ImageReader::open(path)
            .map_err(|e| BlitError::Decode(image::ImageError::IoError(e)))?
            .with_guessed_format()
            .map_err(|e| BlitError::Decode(image::ImageError::IoError(e)))?;
        from_dynamic(reader.decode()?)
    }
}

fn from_dynamic(img: DynamicImage) -> Result<RgbaBuf, BlitError> {
    let rgba = img.to_rgba8();
    let (cols, rows) = rgba.dimensions();
    strata_core::debug!(rows, cols, "image decoded");
    RgbaBuf::new(rgba.into_raw(), rows, cols)
}
