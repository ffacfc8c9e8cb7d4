use std::io::Cursor;
use std::path::Path;

use image::ImageOutputFormat;
use tracing::{debug, warn};

use super::types::OcrEngine;
use super::ExtractionError;

/// Decode the image at `image_path` and run OCR on it.
///
/// The image is re-encoded as PNG before it reaches the engine so every
/// decodable input format is accepted regardless of engine support.
pub fn try_extract_text(
    engine: &dyn OcrEngine,
    image_path: &Path,
    lang: &str,
) -> Result<String, ExtractionError> {
    let bytes = std::fs::read(image_path)?;
    let img = image::load_from_memory(&bytes).map_err(|e| {
        ExtractionError::ImageProcessing(format!("Failed to decode image: {e}"))
    })?;

    let mut cursor = Cursor::new(Vec::new());
    img.write_to(&mut cursor, ImageOutputFormat::Png)
        .map_err(|e| ExtractionError::ImageProcessing(format!("PNG encoding failed: {e}")))?;

    let text = engine.ocr_image_with_lang(&cursor.into_inner(), lang)?;
    debug!(
        path = %image_path.display(),
        engine = engine.name(),
        chars = text.chars().count(),
        "OCR completed"
    );
    Ok(text)
}

/// Text of the image at `image_path`, or an empty string when it cannot be read.
///
/// Empty text is an expected outcome for blurry or unreadable photos; the
/// failure is logged and never propagated.
pub fn extract_text(engine: &dyn OcrEngine, image_path: &Path, lang: &str) -> String {
    match try_extract_text(engine, image_path, lang) {
        Ok(text) => text,
        Err(e) => {
            warn!(
                path = %image_path.display(),
                engine = engine.name(),
                error = %e,
                "Text extraction failed, continuing with empty text"
            );
            String::new()
        }
    }
}
