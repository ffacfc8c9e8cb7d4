use chrono::NaiveDateTime;
use rusqlite::{params, Connection, OptionalExtension};

use crate::db::DatabaseError;
use crate::models::{DocumentRecord, NewDocumentRecord};

const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f";

struct RecordRow {
    id: i64,
    name: String,
    address: String,
    image: Vec<u8>,
    ingested_at: String,
}

/// Append a record. Returns the row id assigned by the store.
pub fn insert_record(conn: &Connection, record: &NewDocumentRecord) -> Result<i64, DatabaseError> {
    let now = chrono::Local::now().naive_local();
    conn.execute(
        "INSERT INTO document_records (nombre, direccion, imagen, ingested_at)
         VALUES (?1, ?2, ?3, ?4)",
        params![
            record.name,
            record.address,
            record.image,
            now.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Oldest record whose name AND address are byte-equal to the query.
pub fn find_match(
    conn: &Connection,
    name: &str,
    address: &str,
) -> Result<Option<DocumentRecord>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, nombre, direccion, imagen, ingested_at
             FROM document_records
             WHERE nombre = ?1 AND direccion = ?2
             ORDER BY id ASC LIMIT 1",
            params![name, address],
            map_row,
        )
        .optional()?;

    row.map(record_from_row).transpose()
}

pub fn get_record(conn: &Connection, id: i64) -> Result<Option<DocumentRecord>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT id, nombre, direccion, imagen, ingested_at
             FROM document_records WHERE id = ?1",
            params![id],
            map_row,
        )
        .optional()?;

    row.map(record_from_row).transpose()
}

pub fn count_records(conn: &Connection) -> Result<i64, DatabaseError> {
    let count = conn.query_row("SELECT COUNT(*) FROM document_records", [], |row| {
        row.get::<_, i64>(0)
    })?;
    Ok(count)
}

fn map_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<RecordRow> {
    Ok(RecordRow {
        id: row.get(0)?,
        name: row.get(1)?,
        address: row.get(2)?,
        image: row.get(3)?,
        ingested_at: row.get(4)?,
    })
}

fn record_from_row(row: RecordRow) -> Result<DocumentRecord, DatabaseError> {
    let ingested_at = NaiveDateTime::parse_from_str(&row.ingested_at, TIMESTAMP_FORMAT)
        .or_else(|_| NaiveDateTime::parse_from_str(&row.ingested_at, "%Y-%m-%dT%H:%M:%S%.f"))
        .map_err(|_| DatabaseError::InvalidTimestamp {
            field: "ingested_at".into(),
            value: row.ingested_at.clone(),
        })?;

    Ok(DocumentRecord {
        id: row.id,
        name: row.name,
        address: row.address,
        image: row.image,
        ingested_at,
    })
}
