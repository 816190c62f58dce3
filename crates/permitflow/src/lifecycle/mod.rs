//! Job and permit state machines.
//!
//! Every mutating operation runs inside one [`Database::with_tx`] call so the
//! read-validate-write sequence is atomic. Permit approval may complete its
//! job; the job lifecycle never calls back into permits.
//!
//! [`Database::with_tx`]: crate::db::Database::with_tx

use rusqlite::Connection;

use crate::catalog;
use crate::db::job_repo::{self, JobRow};
use crate::db::permit_repo::{self, PermitRow};
use crate::db::{parse_optional_timestamp, parse_timestamp, DatabaseError};
use crate::error::LifecycleError;
use crate::evidence;
use crate::model::{Job, JobState, Permit, PermitState};

pub mod job;
pub mod permit;

pub use job::{JobLifecycle, JobQuery, JobUpdate};
pub use permit::{PermitLifecycle, PermitQuery};

/// One page of a filtered listing.
#[derive(Debug, Clone, PartialEq, serde::Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Page<T> {
    pub items: Vec<T>,
    /// Matches before `limit`/`offset` were applied.
    pub total: u64,
}

fn job_state(row: &JobRow) -> Result<JobState, DatabaseError> {
    JobState::parse(&row.state).ok_or_else(|| DatabaseError::Corrupt {
        column: "jobs.state",
        value: row.state.clone(),
    })
}

fn permit_state(row: &PermitRow) -> Result<PermitState, DatabaseError> {
    PermitState::parse(&row.state).ok_or_else(|| DatabaseError::Corrupt {
        column: "permits.state",
        value: row.state.clone(),
    })
}

pub(crate) fn hydrate_permit(conn: &Connection, row: PermitRow) -> Result<Permit, LifecycleError> {
    let permit_type = catalog::type_of(conn, &row.permit_type_id)?;
    let evidence = evidence::list_for_in(conn, &row.id)?;

    Ok(Permit {
        state: permit_state(&row)?,
        requested_at: parse_optional_timestamp("permits.requested_at", row.requested_at.as_deref())?,
        responded_at: parse_optional_timestamp("permits.responded_at", row.responded_at.as_deref())?,
        created_at: parse_timestamp("permits.created_at", &row.created_at)?,
        id: row.id,
        job_id: row.job_id,
        permit_type,
        description: row.description,
        requested_by: row.requested_by,
        responded_by: row.responded_by,
        supervisor_comment: row.supervisor_comment,
        version: row.version,
        evidence,
    })
}

pub(crate) fn hydrate_job(conn: &Connection, row: JobRow) -> Result<Job, LifecycleError> {
    let evidence_urls: Vec<String> = match row.evidence_urls.as_deref() {
        Some(json) => serde_json::from_str(json).map_err(|_| DatabaseError::Corrupt {
            column: "jobs.evidence_urls",
            value: json.to_string(),
        })?,
        None => Vec::new(),
    };

    let permits = permit_repo::list_by_job(conn, &row.id)?
        .into_iter()
        .map(|p| hydrate_permit(conn, p))
        .collect::<Result<Vec<_>, _>>()?;

    Ok(Job {
        state: job_state(&row)?,
        created_at: parse_timestamp("jobs.created_at", &row.created_at)?,
        updated_at: parse_timestamp("jobs.updated_at", &row.updated_at)?,
        completed_at: parse_optional_timestamp("jobs.completed_at", row.completed_at.as_deref())?,
        id: row.id,
        title: row.title,
        description: row.description,
        assigned_technician: row.assigned_technician,
        notes: row.notes,
        evidence_urls,
        permits,
    })
}

pub(crate) fn load_job_row(conn: &Connection, job_id: &str) -> Result<JobRow, LifecycleError> {
    job_repo::find_by_id(conn, job_id)?.ok_or_else(|| LifecycleError::not_found("Job", job_id))
}

pub(crate) fn load_permit_row(conn: &Connection, permit_id: &str) -> Result<PermitRow, LifecycleError> {
    permit_repo::find_by_id(conn, permit_id)?
        .ok_or_else(|| LifecycleError::not_found("Permit", permit_id))
}

pub(crate) fn load_job(conn: &Connection, job_id: &str) -> Result<Job, LifecycleError> {
    let row = load_job_row(conn, job_id)?;
    hydrate_job(conn, row)
}

pub(crate) fn load_permit(conn: &Connection, permit_id: &str) -> Result<Permit, LifecycleError> {
    let row = load_permit_row(conn, permit_id)?;
    hydrate_permit(conn, row)
}
