use base64::Engine;
use chrono::NaiveDateTime;
use serde::{Serialize, Serializer};

/// A stored scan: the fields read from it plus the image itself.
///
/// Records are append-only and carry no natural key; `id` only orders them.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DocumentRecord {
    pub id: i64,
    #[serde(rename = "nombre")]
    pub name: String,
    #[serde(rename = "direccion")]
    pub address: String,
    #[serde(rename = "imagen", serialize_with = "serialize_base64")]
    pub image: Vec<u8>,
    #[serde(rename = "fecha_ingreso")]
    pub ingested_at: NaiveDateTime,
}

/// Record about to be inserted. Fields always hold text, possibly a sentinel.
#[derive(Debug, Clone)]
pub struct NewDocumentRecord {
    pub name: String,
    pub address: String,
    pub image: Vec<u8>,
}

fn serialize_base64<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_str(&base64::engine::general_purpose::STANDARD.encode(bytes))
}
