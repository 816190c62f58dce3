//! Permit repository: CRUD operations for the `permits` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{sql_bound, DatabaseError, DEFAULT_PAGE_LIMIT};

/// A raw permit row from the database.
#[derive(Debug, Clone)]
pub struct PermitRow {
    pub id: String,
    pub job_id: String,
    pub permit_type_id: String,
    pub state: String,
    pub description: Option<String>,
    pub requested_by: Option<String>,
    pub responded_by: Option<String>,
    pub supervisor_comment: Option<String>,
    pub requested_at: Option<String>,
    pub responded_at: Option<String>,
    pub version: i64,
    pub created_at: String,
    pub updated_at: String,
}

impl PermitRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            job_id: row.get("job_id")?,
            permit_type_id: row.get("permit_type_id")?,
            state: row.get("state")?,
            description: row.get("description")?,
            requested_by: row.get("requested_by")?,
            responded_by: row.get("responded_by")?,
            supervisor_comment: row.get("supervisor_comment")?,
            requested_at: row.get("requested_at")?,
            responded_at: row.get("responded_at")?,
            version: row.get("version")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
        })
    }
}

/// Query filter parameters for permit listing.
#[derive(Debug, Default, Clone)]
pub struct PermitFilter {
    pub job_id: Option<String>,
    pub requested_by: Option<String>,
    pub state: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new permit row.
pub fn insert(conn: &Connection, permit: &PermitRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO permits (id, job_id, permit_type_id, state, description, requested_by,
         responded_by, supervisor_comment, requested_at, responded_at, version, created_at,
         updated_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)",
        params![
            permit.id,
            permit.job_id,
            permit.permit_type_id,
            permit.state,
            permit.description,
            permit.requested_by,
            permit.responded_by,
            permit.supervisor_comment,
            permit.requested_at,
            permit.responded_at,
            permit.version,
            permit.created_at,
            permit.updated_at,
        ],
    )?;
    Ok(())
}

/// Writes every mutable column of `permit` if the stored version still equals
/// `permit.version`, bumping the stored version by one.
///
/// Returns `false` when another writer got there first.
pub fn update_if_version(conn: &Connection, permit: &PermitRow) -> Result<bool, DatabaseError> {
    let changed = conn.execute(
        "UPDATE permits SET state=?3, description=?4, requested_by=?5, responded_by=?6,
         supervisor_comment=?7, requested_at=?8, responded_at=?9, updated_at=?10,
         version = version + 1
         WHERE id=?1 AND version=?2",
        params![
            permit.id,
            permit.version,
            permit.state,
            permit.description,
            permit.requested_by,
            permit.responded_by,
            permit.supervisor_comment,
            permit.requested_at,
            permit.responded_at,
            permit.updated_at,
        ],
    )?;
    Ok(changed == 1)
}

/// Finds a permit by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<PermitRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM permits WHERE id = ?1",
            params![id],
            PermitRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Returns all permits of a job ordered by their type's rank.
pub fn list_by_job(conn: &Connection, job_id: &str) -> Result<Vec<PermitRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT p.* FROM permits p
         JOIN permit_types t ON t.id = p.permit_type_id
         WHERE p.job_id = ?1
         ORDER BY t.rank ASC",
    )?;
    let rows = stmt
        .query_map(params![job_id], PermitRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Returns every permit in `state`, in the same order as [`query`], without
/// paging.
pub fn list_by_state(conn: &Connection, state: &str) -> Result<Vec<PermitRow>, DatabaseError> {
    let mut stmt = conn.prepare(
        "SELECT * FROM permits WHERE state = ?1
         ORDER BY requested_at IS NULL, requested_at ASC, rowid ASC",
    )?;
    let rows = stmt
        .query_map(params![state], PermitRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;
    Ok(rows)
}

/// Queries permits with filters, returning (rows, total_count).
///
/// Rows are ordered by request time (never-requested permits last), then by
/// creation order.
pub fn query(
    conn: &Connection,
    filter: &PermitFilter,
) -> Result<(Vec<PermitRow>, u64), DatabaseError> {
    let mut conditions = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref job_id) = filter.job_id {
        conditions.push(format!("job_id = ?{}", param_values.len() + 1));
        param_values.push(Box::new(job_id.clone()));
    }
    if let Some(ref requested_by) = filter.requested_by {
        conditions.push(format!("requested_by = ?{}", param_values.len() + 1));
        param_values.push(Box::new(requested_by.clone()));
    }
    if let Some(ref state) = filter.state {
        conditions.push(format!("state = ?{}", param_values.len() + 1));
        param_values.push(Box::new(state.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM permits {}", where_clause);
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

    let limit = sql_bound(filter.limit.unwrap_or(DEFAULT_PAGE_LIMIT));
    let offset = sql_bound(filter.offset.unwrap_or(0));
    param_values.push(Box::new(limit));
    param_values.push(Box::new(offset));
    let query_sql = format!(
        "SELECT * FROM permits {} ORDER BY requested_at IS NULL, requested_at ASC, rowid ASC
         LIMIT ?{} OFFSET ?{}",
        where_clause,
        param_values.len() - 1,
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query_sql)?;
    let rows: Vec<PermitRow> = stmt
        .query_map(params_ref.as_slice(), PermitRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

/// Deletes a permit; its evidence cascades. Returns whether a row was removed.
pub fn delete(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let count = conn.execute("DELETE FROM permits WHERE id = ?1", params![id])?;
    Ok(count > 0)
}
