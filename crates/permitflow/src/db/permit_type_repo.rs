//! Permit type repository: CRUD operations for the `permit_types` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::DatabaseError;

/// A raw permit type row from the database.
#[derive(Debug, Clone)]
pub struct PermitTypeRow {
    pub id: String,
    pub name: String,
    pub description: Option<String>,
    pub rank: u32,
    pub active: bool,
    pub created_at: String,
    pub updated_at: String,
}

impl PermitTypeRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            name: row.get("name")?,
            description: row.get("description")?,
            rank: row.get("rank")?,
            active: row.get("active")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Inserts a permit type, or reactivates an existing one with the same name.
pub fn upsert(conn: &Connection, row: &PermitTypeRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO permit_types (id, name, description, rank, active, created_at, updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)
         ON CONFLICT(name) DO UPDATE SET
           description = ?3,
           rank = ?4,
           active = ?5,
           updated_at = ?7",
        params![
            row.id,
            row.name,
            row.description,
            row.rank,
            row.active,
            row.created_at,
            row.updated_at,
        ],
    )?;
    Ok(())
}

/// Counts active permit types.
pub fn count_active(conn: &Connection) -> Result<u64, DatabaseError> {
    let count: u64 = conn.query_row(
        "SELECT COUNT(*) FROM permit_types WHERE active = 1",
        [],
        |r| r.get(0),
    )?;
    Ok(count)
}

/// Returns active permit types sorted ascending by rank.
pub fn list_active(conn: &Connection) -> Result<Vec<PermitTypeRow>, DatabaseError> {
    let mut stmt =
        conn.prepare("SELECT * FROM permit_types WHERE active = 1 ORDER BY rank ASC")?;
    let rows = stmt
        .query_map([], PermitTypeRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Finds an active permit type by ID.
pub fn find_active_by_id(
    conn: &Connection,
    id: &str,
) -> Result<Option<PermitTypeRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM permit_types WHERE id = ?1 AND active = 1",
            params![id],
            PermitTypeRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Finds a permit type by ID regardless of its active flag.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<PermitTypeRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM permit_types WHERE id = ?1",
            params![id],
            PermitTypeRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Finds an active permit type by its unique name.
pub fn find_active_by_name(
    conn: &Connection,
    name: &str,
) -> Result<Option<PermitTypeRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM permit_types WHERE name = ?1 AND active = 1",
            params![name],
            PermitTypeRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Returns the active type with the smallest rank strictly greater than `rank`.
pub fn find_next_active(
    conn: &Connection,
    rank: u32,
) -> Result<Option<PermitTypeRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM permit_types WHERE active = 1 AND rank > ?1
             ORDER BY rank ASC LIMIT 1",
            params![rank],
            PermitTypeRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Returns the highest active rank, if any type is active.
pub fn max_active_rank(conn: &Connection) -> Result<Option<u32>, DatabaseError> {
    let max: Option<u32> = conn.query_row(
        "SELECT MAX(rank) FROM permit_types WHERE active = 1",
        [],
        |r| r.get(0),
    )?;
    Ok(max)
}

/// Flips the active flag of a permit type.
pub fn set_active(
    conn: &Connection,
    id: &str,
    active: bool,
    updated_at: &str,
) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE permit_types SET active = ?2, updated_at = ?3 WHERE id = ?1",
        params![id, active, updated_at],
    )?;
    Ok(changed > 0)
}
