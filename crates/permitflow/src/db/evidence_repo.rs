//! Evidence repository: CRUD operations for the `evidence` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw evidence row from the database.
#[derive(Debug, Clone)]
pub struct EvidenceRow {
    pub id: String,
    pub permit_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: i64,
    pub content_ref: String,
    pub description: Option<String>,
    pub uploaded_by: String,
    pub created_at: String,
}

impl EvidenceRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            permit_id: row.get("permit_id")?,
            filename: row.get("filename")?,
            mime_type: row.get("mime_type")?,
            size_bytes: row.get("size_bytes")?,
            content_ref: row.get("content_ref")?,
            description: row.get("description")?,
            uploaded_by: row.get("uploaded_by")?,
            created_at: row.get("created_at")?,
        })
    }
}

/// Inserts an evidence row.
pub fn insert(conn: &Connection, row: &EvidenceRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO evidence (id, permit_id, filename, mime_type, size_bytes, content_ref,
         description, uploaded_by, created_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
        params![
            row.id,
            row.permit_id,
            row.filename,
            row.mime_type,
            row.size_bytes,
            row.content_ref,
            row.description,
            row.uploaded_by,
            row.created_at,
        ],
    )?;
    Ok(())
}

/// Finds an evidence row by ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<EvidenceRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM evidence WHERE id = ?1",
            params![id],
            EvidenceRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Returns the evidence of a permit, newest first.
pub fn list_by_permit(
    conn: &Connection,
    permit_id: &str,
) -> Result<Vec<EvidenceRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM evidence WHERE permit_id = ?1 ORDER BY created_at DESC, rowid DESC",
    )?;
    let rows = stmt
        .query_map(params![permit_id], EvidenceRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Deletes an evidence row. Returns whether a row was removed.
pub fn delete(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let count = conn.execute("DELETE FROM evidence WHERE id = ?1", params![id])?;
    Ok(count > 0)
}
