//! Document ingestion orchestrator.
//!
//! Drives one request through the pipeline:
//! staged image → (normalize) → OCR text → fields → [persist + match].
//!
//! Uses trait-based DI for the OCR engine so the orchestrator remains fully
//! testable with `MockOcrEngine`. Runs synchronously; callers on an async
//! runtime move it onto a blocking thread.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use rusqlite::Connection;

use crate::config::MatchOrder;
use crate::db::{repository, DatabaseError};
use crate::models::{DocumentRecord, NewDocumentRecord};
use crate::pipeline::extraction::preprocess::{normalize_image, NormalizeConfig};
use crate::pipeline::extraction::text::extract_text;
use crate::pipeline::extraction::types::OcrEngine;
use crate::pipeline::fields::{parse_fields, ExtractedFields};
use crate::pipeline::import::StagedFile;

// ---------------------------------------------------------------------------
// Error types
// ---------------------------------------------------------------------------

/// Failures that abort an ingestion. OCR and parse misses never land here.
#[derive(Debug, thiserror::Error)]
pub enum ProcessingError {
    #[error("Failed to read image for storage: {0}")]
    ImageRead(#[from] std::io::Error),

    #[error("Failed to persist record: {0}")]
    Persist(#[from] DatabaseError),
}

// ---------------------------------------------------------------------------
// Result types
// ---------------------------------------------------------------------------

/// Step reached by an ingestion, used to tag log lines.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IngestionStage {
    Normalized,
    TextExtracted,
    FieldsParsed,
    Persisted,
    Matched,
}

impl IngestionStage {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Normalized => "normalized",
            Self::TextExtracted => "text-extracted",
            Self::FieldsParsed => "fields-parsed",
            Self::Persisted => "persisted",
            Self::Matched => "matched",
        }
    }
}

/// Outcome of the duplicate lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum MatchOutcome {
    Matched(DocumentRecord),
    NoMatch,
    /// The store failed during lookup; the ingestion itself still succeeded.
    SearchError,
}

/// Everything a channel needs to build its response.
#[derive(Debug, Clone)]
pub struct IngestionOutcome {
    pub fields: ExtractedFields,
    pub record_id: i64,
    pub match_outcome: MatchOutcome,
}

// ---------------------------------------------------------------------------
// Orchestrator
// ---------------------------------------------------------------------------

pub struct DocumentProcessor {
    ocr: Arc<dyn OcrEngine>,
    ocr_lang: String,
    match_order: MatchOrder,
    normalize: NormalizeConfig,
}

impl DocumentProcessor {
    pub fn new(ocr: Arc<dyn OcrEngine>, ocr_lang: &str) -> Self {
        Self {
            ocr,
            ocr_lang: ocr_lang.to_string(),
            match_order: MatchOrder::default(),
            normalize: NormalizeConfig::default(),
        }
    }

    pub fn with_match_order(mut self, order: MatchOrder) -> Self {
        self.match_order = order;
        self
    }

    pub fn match_order(&self) -> MatchOrder {
        self.match_order
    }

    /// OCR the image and parse its fields. No persistence, no lookup.
    pub fn read_fields(&self, image_path: &Path) -> ExtractedFields {
        let text = extract_text(self.ocr.as_ref(), image_path, &self.ocr_lang);
        log_stage(image_path, IngestionStage::TextExtracted);

        let fields = parse_fields(&text);
        tracing::debug!(
            path = %image_path.display(),
            stage = IngestionStage::FieldsParsed.as_str(),
            name_found = fields.name.is_found(),
            address_found = fields.address.is_found(),
            "Fields parsed"
        );
        fields
    }

    /// Direct-upload channel: read fields from the raw staged file, then
    /// persist it and look for an earlier record with the same fields.
    pub fn ingest(
        &self,
        conn: &Connection,
        image_path: &Path,
    ) -> Result<IngestionOutcome, ProcessingError> {
        let fields = self.read_fields(image_path);
        let image = std::fs::read(image_path)?;
        self.store_and_match(conn, fields, image)
    }

    /// Messaging channel: normalize the downloaded image first, then ingest
    /// the normalized artifact (its bytes are what gets stored).
    pub fn ingest_normalized(
        &self,
        conn: &Connection,
        source: &Path,
        staging_dir: &Path,
    ) -> Result<IngestionOutcome, ProcessingError> {
        let (image_path, _artifact) = self.normalize(source, staging_dir);
        self.ingest(conn, &image_path)
    }

    /// Normalize `source`. The returned guard removes the normalized artifact
    /// once dropped; it is `None` when normalization fell back to `source`.
    pub fn normalize(&self, source: &Path, staging_dir: &Path) -> (PathBuf, Option<StagedFile>) {
        let normalized = normalize_image(source, staging_dir, &self.normalize);
        if normalized == source {
            return (normalized, None);
        }
        log_stage(&normalized, IngestionStage::Normalized);
        let guard = StagedFile::adopt(normalized.clone());
        (normalized, Some(guard))
    }

    fn store_and_match(
        &self,
        conn: &Connection,
        fields: ExtractedFields,
        image: Vec<u8>,
    ) -> Result<IngestionOutcome, ProcessingError> {
        let record = NewDocumentRecord {
            name: fields.name_text().to_string(),
            address: fields.address_text().to_string(),
            image,
        };

        let (record_id, match_outcome) = match self.match_order {
            MatchOrder::LookupFirst => {
                let found = find_previous(conn, &record.name, &record.address);
                let id = persist(conn, &record)?;
                (id, found)
            }
            MatchOrder::InsertFirst => {
                let id = persist(conn, &record)?;
                (id, find_previous(conn, &record.name, &record.address))
            }
        };

        tracing::info!(
            record_id,
            order = self.match_order.as_str(),
            matched = matches!(match_outcome, MatchOutcome::Matched(_)),
            "Document ingested"
        );

        Ok(IngestionOutcome {
            fields,
            record_id,
            match_outcome,
        })
    }
}

// ---------------------------------------------------------------------------
// Store helpers
// ---------------------------------------------------------------------------

/// Insert the record. Failures are logged and abort the ingestion.
fn persist(conn: &Connection, record: &NewDocumentRecord) -> Result<i64, ProcessingError> {
    match repository::insert_record(conn, record) {
        Ok(id) => {
            tracing::debug!(record_id = id, stage = IngestionStage::Persisted.as_str(), "Record stored");
            Ok(id)
        }
        Err(e) => {
            tracing::error!(error = %e, "Failed to store document record");
            Err(ProcessingError::Persist(e))
        }
    }
}

/// Exact lookup on both fields. Store failures degrade to `SearchError`.
pub fn find_previous(conn: &Connection, name: &str, address: &str) -> MatchOutcome {
    let outcome = match repository::find_match(conn, name, address) {
        Ok(Some(record)) => MatchOutcome::Matched(record),
        Ok(None) => MatchOutcome::NoMatch,
        Err(e) => {
            tracing::error!(error = %e, "Record lookup failed");
            MatchOutcome::SearchError
        }
    };
    tracing::debug!(stage = IngestionStage::Matched.as_str(), "Lookup finished");
    outcome
}

fn log_stage(path: &Path, stage: IngestionStage) {
    tracing::debug!(path = %path.display(), stage = stage.as_str(), "Ingestion stage reached");
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
