//! Image normalization for the messaging channel.
//!
//! Every inbound photo is decoded, forced to RGB, stretched onto a fixed
//! 1024x1024 canvas (aspect ratio is not preserved) and
//! re-encoded as JPEG. Normalization is best-effort: on any failure the
//! original file is handed to OCR unchanged.

use std::io::Cursor;
use std::path::{Path, PathBuf};

use image::imageops::FilterType;
use image::{DynamicImage, GenericImageView, ImageOutputFormat, RgbImage};
use tracing::{debug, warn};

use super::ExtractionError;

/// Maximum input image size (in bytes) before rejecting.
/// Prevents OOM on corrupt/adversarial files.
const MAX_IMAGE_BYTES: usize = 50 * 1024 * 1024; // 50 MB

/// Prefix of the normalized artifact written next to its source.
const NORMALIZED_PREFIX: &str = "preprocessed_";

/// Target canvas and encoding for normalized images.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct NormalizeConfig {
    pub width: u32,
    pub height: u32,
    /// JPEG quality, 1-100.
    pub jpeg_quality: u8,
}

impl Default for NormalizeConfig {
    fn default() -> Self {
        Self {
            width: 1024,
            height: 1024,
            jpeg_quality: 85,
        }
    }
}

/// Decode, convert to RGB, resize to the canvas and encode as JPEG.
pub fn normalize_bytes(
    image_bytes: &[u8],
    config: &NormalizeConfig,
) -> Result<Vec<u8>, ExtractionError> {
    if image_bytes.is_empty() {
        return Err(ExtractionError::ImageProcessing("Image is empty".into()));
    }
    if image_bytes.len() > MAX_IMAGE_BYTES {
        return Err(ExtractionError::ImageProcessing(format!(
            "Image too large: {} bytes (max {MAX_IMAGE_BYTES})",
            image_bytes.len()
        )));
    }

    let img = image::load_from_memory(image_bytes).map_err(|e| {
        ExtractionError::ImageProcessing(format!("Failed to decode image: {e}"))
    })?;
    let (orig_w, orig_h) = img.dimensions();

    let rgb = img.to_rgb8();
    let resized: RgbImage =
        image::imageops::resize(&rgb, config.width, config.height, FilterType::CatmullRom);

    let jpeg = encode_jpeg(resized, config.jpeg_quality)?;

    debug!(
        original = format!("{orig_w}x{orig_h}"),
        output = format!("{}x{}", config.width, config.height),
        jpeg_size = jpeg.len(),
        "Image normalized"
    );

    Ok(jpeg)
}

/// Encode an RGB image as JPEG bytes at the given quality.
pub fn encode_jpeg(img: RgbImage, quality: u8) -> Result<Vec<u8>, ExtractionError> {
    let dynamic = DynamicImage::ImageRgb8(img);
    let mut cursor = Cursor::new(Vec::new());
    dynamic
        .write_to(&mut cursor, ImageOutputFormat::Jpeg(quality))
        .map_err(|e| ExtractionError::ImageProcessing(format!("JPEG encoding failed: {e}")))?;
    Ok(cursor.into_inner())
}

/// Path of the normalized artifact for `source`: `preprocessed_<stem>.jpg` in `staging_dir`.
pub fn normalized_path_for(source: &Path, staging_dir: &Path) -> PathBuf {
    let stem = source
        .file_stem()
        .and_then(|s| s.to_str())
        .filter(|s| !s.is_empty())
        .unwrap_or("image");
    staging_dir.join(format!("{NORMALIZED_PREFIX}{stem}.jpg"))
}

/// Normalize the image at `source` into `staging_dir`.
///
/// Returns the normalized file on success and `source` itself on any
/// read, decode, encode or write failure. Never fails.
pub fn normalize_image(source: &Path, staging_dir: &Path, config: &NormalizeConfig) -> PathBuf {
    match try_normalize_image(source, staging_dir, config) {
        Ok(path) => path,
        Err(e) => {
            warn!(
                path = %source.display(),
                error = %e,
                "Image normalization failed, using original image"
            );
            source.to_path_buf()
        }
    }
}

/// Fallible form of [`normalize_image`].
pub fn try_normalize_image(
    source: &Path,
    staging_dir: &Path,
    config: &NormalizeConfig,
) -> Result<PathBuf, ExtractionError> {
    let bytes = std::fs::read(source)?;
    let jpeg = normalize_bytes(&bytes, config)?;
    let target = normalized_path_for(source, staging_dir);
    std::fs::write(&target, jpeg)?;
    Ok(target)
}
