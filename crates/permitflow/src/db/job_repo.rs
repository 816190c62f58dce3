//! Job repository: CRUD operations for the `jobs` table.

use rusqlite::{params, Connection, OptionalExtension, Row};

use super::{sql_bound, DatabaseError, DEFAULT_PAGE_LIMIT};

/// A raw job row from the database.
#[derive(Debug, Clone)]
pub struct JobRow {
    pub id: String,
    pub title: String,
    pub description: String,
    pub state: String,
    pub assigned_technician: Option<String>,
    pub notes: Option<String>,
    /// JSON array of free-form URLs.
    pub evidence_urls: Option<String>,
    pub created_at: String,
    pub updated_at: String,
    pub completed_at: Option<String>,
}

impl JobRow {
    fn from_row(row: &Row<'_>) -> Result<Self, rusqlite::Error> {
        Ok(Self {
            id: row.get("id")?,
            title: row.get("title")?,
            description: row.get("description")?,
            state: row.get("state")?,
            assigned_technician: row.get("assigned_technician")?,
            notes: row.get("notes")?,
            evidence_urls: row.get("evidence_urls")?,
            created_at: row.get("created_at")?,
            updated_at: row.get("updated_at")?,
            completed_at: row.get("completed_at")?,
        })
    }
}

/// Query filter parameters for job listing.
#[derive(Debug, Default, Clone)]
pub struct JobFilter {
    pub state: Option<String>,
    pub assigned_technician: Option<String>,
    pub limit: Option<u64>,
    pub offset: Option<u64>,
}

/// Inserts a new job row.
pub fn insert(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "INSERT INTO jobs (id, title, description, state, assigned_technician, notes,
         evidence_urls, created_at, updated_at, completed_at)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)",
        params![
            job.id,
            job.title,
            job.description,
            job.state,
            job.assigned_technician,
            job.notes,
            job.evidence_urls,
            job.created_at,
            job.updated_at,
            job.completed_at,
        ],
    )?;
    Ok(())
}

/// Updates an existing job row. All fields except `id` and `created_at` are overwritten.
pub fn update(conn: &Connection, job: &JobRow) -> Result<(), DatabaseError> {
    conn.execute(
        "UPDATE jobs SET title=?2, description=?3, state=?4, assigned_technician=?5,
         notes=?6, evidence_urls=?7, updated_at=?8, completed_at=?9
         WHERE id=?1",
        params![
            job.id,
            job.title,
            job.description,
            job.state,
            job.assigned_technician,
            job.notes,
            job.evidence_urls,
            job.updated_at,
            job.completed_at,
        ],
    )?;
    Ok(())
}

/// Finds a job by its ID.
pub fn find_by_id(conn: &Connection, id: &str) -> Result<Option<JobRow>, DatabaseError> {
    let row = conn
        .query_row(
            "SELECT * FROM jobs WHERE id = ?1",
            params![id],
            JobRow::from_row,
        )
        .optional()?;
    Ok(row)
}

/// Queries jobs with filters, newest first, returning (rows, total_count).
pub fn query(conn: &Connection, filter: &JobFilter) -> Result<(Vec<JobRow>, u64), DatabaseError> {
    let mut conditions = Vec::new();
    let mut param_values: Vec<Box<dyn rusqlite::types::ToSql>> = Vec::new();

    if let Some(ref state) = filter.state {
        conditions.push(format!("state = ?{}", param_values.len() + 1));
        param_values.push(Box::new(state.clone()));
    }
    if let Some(ref technician) = filter.assigned_technician {
        conditions.push(format!("assigned_technician = ?{}", param_values.len() + 1));
        param_values.push(Box::new(technician.clone()));
    }

    let where_clause = if conditions.is_empty() {
        String::new()
    } else {
        format!("WHERE {}", conditions.join(" AND "))
    };

    let count_sql = format!("SELECT COUNT(*) FROM jobs {}", where_clause);
    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let total: u64 = conn.query_row(&count_sql, params_ref.as_slice(), |r| r.get(0))?;

    let limit = sql_bound(filter.limit.unwrap_or(DEFAULT_PAGE_LIMIT));
    let offset = sql_bound(filter.offset.unwrap_or(0));
    param_values.push(Box::new(limit));
    param_values.push(Box::new(offset));
    let query_sql = format!(
        "SELECT * FROM jobs {} ORDER BY created_at DESC, rowid DESC LIMIT ?{} OFFSET ?{}",
        where_clause,
        param_values.len() - 1,
        param_values.len()
    );

    let params_ref: Vec<&dyn rusqlite::types::ToSql> =
        param_values.iter().map(|p| p.as_ref()).collect();
    let mut stmt = conn.prepare(&query_sql)?;
    let rows: Vec<JobRow> = stmt
        .query_map(params_ref.as_slice(), JobRow::from_row)?
        .collect::<Result<Vec<_>, _>>()?;

    Ok((rows, total))
}

/// Deletes a job. Permits and their evidence go with it through
/// `ON DELETE CASCADE`. Returns whether a row was removed.
pub fn delete(conn: &Connection, id: &str) -> Result<bool, DatabaseError> {
    let count = conn.execute("DELETE FROM jobs WHERE id = ?1", params![id])?;
    Ok(count > 0)
}
