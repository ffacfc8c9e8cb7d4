use super::ExtractionError;

/// OCR engine abstraction (allows mocking for tests)
pub trait OcrEngine: Send + Sync {
    /// Recognize text in an encoded image using the engine's default language.
    fn ocr_image(&self, image_bytes: &[u8]) -> Result<String, ExtractionError>;

    fn ocr_image_with_lang(&self, image_bytes: &[u8], lang: &str)
        -> Result<String, ExtractionError>;

    /// Short identifier used in logs.
    fn name(&self) -> &str;
}
