//! Shared handler context and response bodies.

use std::sync::Arc;

use serde::Serialize;

use crate::core_state::CoreState;
use crate::models::DocumentRecord;
use crate::pipeline::fields::ExtractedFields;
use crate::pipeline::processor::{IngestionOutcome, MatchOutcome};

pub const NO_MATCH_MESSAGE: &str = "No se encontraron coincidencias";
pub const SEARCH_ERROR_MESSAGE: &str = "Error en la búsqueda";

/// State handed to every handler.
#[derive(Clone)]
pub struct ApiContext {
    pub core: Arc<CoreState>,
}

impl ApiContext {
    pub fn new(core: Arc<CoreState>) -> Self {
        Self { core }
    }
}

/// `POST /upload` body.
#[derive(Debug, Serialize)]
pub struct FieldsResponse {
    pub nombre: String,
    pub direccion: String,
}

impl From<&ExtractedFields> for FieldsResponse {
    fn from(fields: &ExtractedFields) -> Self {
        Self {
            nombre: fields.name_text().to_string(),
            direccion: fields.address_text().to_string(),
        }
    }
}

/// `POST /upload_file` body.
#[derive(Debug, Serialize)]
pub struct IngestResponse {
    pub nombre: String,
    pub direccion: String,
    pub resultado: MatchBody,
}

impl From<IngestionOutcome> for IngestResponse {
    fn from(outcome: IngestionOutcome) -> Self {
        let FieldsResponse { nombre, direccion } = FieldsResponse::from(&outcome.fields);
        Self {
            nombre,
            direccion,
            resultado: outcome.match_outcome.into(),
        }
    }
}

/// Either the matching record or a `{"mensaje": ...}` object.
#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum MatchBody {
    Record(DocumentRecord),
    Message { mensaje: &'static str },
}

impl From<MatchOutcome> for MatchBody {
    fn from(outcome: MatchOutcome) -> Self {
        match outcome {
            MatchOutcome::Matched(record) => MatchBody::Record(record),
            MatchOutcome::NoMatch => MatchBody::Message {
                mensaje: NO_MATCH_MESSAGE,
            },
            MatchOutcome::SearchError => MatchBody::Message {
                mensaje: SEARCH_ERROR_MESSAGE,
            },
        }
    }
}

/// One-line summary of a lookup for text replies.
pub fn match_summary(outcome: &MatchOutcome) -> String {
    match outcome {
        MatchOutcome::Matched(record) => format!("Coincidencia encontrada (registro {})", record.id),
        MatchOutcome::NoMatch => NO_MATCH_MESSAGE.to_string(),
        MatchOutcome::SearchError => SEARCH_ERROR_MESSAGE.to_string(),
    }
}
