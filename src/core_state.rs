//! Process-wide state, built once before the first request.
//!
//! Holds the configuration, the OCR engine and the HTTP client used for
//! media downloads. Nothing here is mutated after startup; the record store
//! is reached through a fresh connection per ingestion.

use std::path::Path;
use std::sync::Arc;

use rusqlite::Connection;

use crate::config::{AppConfig, APP_NAME, APP_VERSION};
use crate::db::{self, DatabaseError};
use crate::pipeline::extraction::ocr::TesseractCli;
use crate::pipeline::extraction::types::OcrEngine;
use crate::pipeline::processor::DocumentProcessor;

#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("Failed to prepare directory {path}: {source}")]
    Directory {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Database error: {0}")]
    Database(#[from] DatabaseError),

    #[error("HTTP client error: {0}")]
    HttpClient(#[from] reqwest::Error),
}

pub struct CoreState {
    config: AppConfig,
    processor: DocumentProcessor,
    http: reqwest::Client,
}

impl CoreState {
    /// Production state: Tesseract on the configured executable.
    pub fn initialize(config: AppConfig) -> Result<Self, CoreError> {
        let tesseract = TesseractCli::new(&config.tesseract_cmd).with_languages(&config.ocr_lang);
        match tesseract.check_available() {
            Ok(banner) => tracing::info!(engine = %banner, lang = %config.ocr_lang, "OCR engine ready"),
            Err(e) => tracing::warn!(
                error = %e,
                "OCR engine unavailable, every document will be read as empty text"
            ),
        }
        Self::with_engine(config, Arc::new(tesseract))
    }

    /// State with an explicit OCR engine (tests inject `MockOcrEngine`).
    pub fn with_engine(config: AppConfig, ocr: Arc<dyn OcrEngine>) -> Result<Self, CoreError> {
        ensure_dir(&config.upload_dir)?;
        if let Some(parent) = config.db_path.parent().filter(|p| !p.as_os_str().is_empty()) {
            ensure_dir(parent)?;
        }

        // Apply migrations up front so a broken store fails startup, not the first request.
        db::open_database(&config.db_path)?;

        let http = reqwest::Client::builder()
            .user_agent(format!("{APP_NAME}/{APP_VERSION}"))
            .build()?;

        let processor = DocumentProcessor::new(ocr, &config.ocr_lang)
            .with_match_order(config.match_order);

        tracing::info!(
            db = %config.db_path.display(),
            uploads = %config.upload_dir.display(),
            match_order = config.match_order.as_str(),
            "Core state initialized"
        );

        Ok(Self {
            config,
            processor,
            http,
        })
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn processor(&self) -> &DocumentProcessor {
        &self.processor
    }

    pub fn http(&self) -> &reqwest::Client {
        &self.http
    }

    pub fn upload_dir(&self) -> &Path {
        &self.config.upload_dir
    }

    /// Open a connection to the record store for one ingestion.
    pub fn open_db(&self) -> Result<Connection, CoreError> {
        Ok(db::open_database(&self.config.db_path)?)
    }
}

fn ensure_dir(path: &Path) -> Result<(), CoreError> {
    std::fs::create_dir_all(path).map_err(|source| CoreError::Directory {
        path: path.display().to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::MatchOrder;
    use crate::pipeline::extraction::ocr::MockOcrEngine;

    fn test_config(dir: &Path) -> AppConfig {
        let mut config = AppConfig::from_lookup(|_| None).unwrap();
        config.db_path = dir.join("data").join("documentos.db");
        config.upload_dir = dir.join("uploads");
        config
    }

    #[test]
    fn with_engine_creates_directories_and_schema() {
        let dir = tempfile::tempdir().unwrap();
        let core =
            CoreState::with_engine(test_config(dir.path()), Arc::new(MockOcrEngine::new(""))).unwrap();

        assert!(core.upload_dir().is_dir());
        assert!(core.config().db_path.exists());

        let conn = core.open_db().unwrap();
        assert_eq!(db::count_records(&conn).unwrap(), 0);
    }

    #[test]
    fn processor_follows_configured_match_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.match_order = MatchOrder::InsertFirst;
        let core = CoreState::with_engine(config, Arc::new(MockOcrEngine::new(""))).unwrap();
        assert_eq!(core.processor().match_order(), MatchOrder::InsertFirst);
    }

    #[test]
    fn initialize_tolerates_missing_tesseract() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = test_config(dir.path());
        config.tesseract_cmd = "/nonexistent/tesseract".into();
        assert!(CoreState::initialize(config).is_ok());
    }

    #[test]
    fn unwritable_upload_dir_fails_startup() {
        let dir = tempfile::tempdir().unwrap();
        let blocker = dir.path().join("file");
        std::fs::write(&blocker, b"x").unwrap();
        let mut config = test_config(dir.path());
        config.upload_dir = blocker.join("uploads");

        let result = CoreState::with_engine(config, Arc::new(MockOcrEngine::new("")));
        assert!(matches!(result, Err(CoreError::Directory { .. })));
    }
}
