//! Job creation, assignment and completion.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::{hydrate_job, load_job, load_job_row, Page};
use crate::catalog;
use crate::db::job_repo::{self, JobFilter, JobRow};
use crate::db::permit_repo::{self, PermitRow};
use crate::db::{format_timestamp, Database};
use crate::error::LifecycleError;
use crate::model::{Job, JobState, PermitState};
use crate::users::{Actor, UserDirectory};

const MAX_TITLE_LEN: usize = 255;

/// Editable job fields. `None` leaves a field unchanged.
#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobUpdate {
    #[serde(default)]
    pub title: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    /// An empty string clears the notes.
    #[serde(default)]
    pub notes: Option<String>,
    #[serde(default)]
    pub evidence_urls: Option<Vec<String>>,
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobQuery {
    #[serde(default)]
    pub state: Option<JobState>,
    #[serde(default)]
    pub assigned_technician: Option<String>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl From<&JobQuery> for JobFilter {
    fn from(query: &JobQuery) -> Self {
        Self {
            state: query.state.map(|s| s.as_str().to_string()),
            assigned_technician: query.assigned_technician.clone(),
            limit: query.limit,
            offset: query.offset,
        }
    }
}

pub struct JobLifecycle {
    db: Database,
    users: Arc<dyn UserDirectory>,
}

impl JobLifecycle {
    pub fn new(db: Database, users: Arc<dyn UserDirectory>) -> Self {
        Self { db, users }
    }

    /// Creates a pending job together with one pending permit per active
    /// permit type.
    pub fn create_job(
        &self,
        title: &str,
        description: &str,
        technician: Option<&str>,
    ) -> Result<Job, LifecycleError> {
        let _span = tracing::info_span!("job.create").entered();

        let title = validate_title(title)?;
        let description = validate_description(description)?;
        if let Some(technician_id) = technician {
            if !self.users.exists(technician_id) {
                return Err(LifecycleError::Validation(format!(
                    "Technician '{}' does not exist",
                    technician_id
                )));
            }
        }

        let job = self.db.with_tx(|tx| {
            let permit_types = catalog::list_ordered_in(tx)?;
            if permit_types.is_empty() {
                return Err(LifecycleError::InvalidState(
                    "No active permit types; the catalog has not been bootstrapped".to_string(),
                ));
            }

            let now = format_timestamp(Utc::now());
            let row = JobRow {
                id: uuid::Uuid::new_v4().to_string(),
                title,
                description,
                state: JobState::Pending.as_str().to_string(),
                assigned_technician: technician.map(str::to_string),
                notes: None,
                evidence_urls: None,
                created_at: now.clone(),
                updated_at: now.clone(),
                completed_at: None,
            };
            job_repo::insert(tx, &row)?;

            for permit_type in &permit_types {
                permit_repo::insert(
                    tx,
                    &PermitRow {
                        id: uuid::Uuid::new_v4().to_string(),
                        job_id: row.id.clone(),
                        permit_type_id: permit_type.id.clone(),
                        state: PermitState::Pending.as_str().to_string(),
                        description: None,
                        requested_by: None,
                        responded_by: None,
                        supervisor_comment: None,
                        requested_at: None,
                        responded_at: None,
                        version: 0,
                        created_at: now.clone(),
                        updated_at: now.clone(),
                    },
                )?;
            }

            load_job(tx, &row.id)
        })?;

        log::info!(
            "Created job {} with {} permits",
            job.id,
            job.permits.len()
        );
        Ok(job)
    }

    /// Assigns a technician and moves the job to `InProgress`.
    pub fn assign_technician(
        &self,
        job_id: &str,
        technician_id: &str,
    ) -> Result<Job, LifecycleError> {
        let _span = tracing::info_span!("job.assign", job_id = %job_id).entered();

        let job = self.db.with_tx(|tx| {
            let mut row = load_job_row(tx, job_id)?;
            if self.users.get(technician_id).is_none() {
                return Err(LifecycleError::not_found("User", technician_id));
            }
            if row.state == JobState::Done.as_str() {
                return Err(LifecycleError::InvalidState(format!(
                    "Job '{}' is already done",
                    job_id
                )));
            }

            row.assigned_technician = Some(technician_id.to_string());
            row.state = JobState::InProgress.as_str().to_string();
            row.updated_at = format_timestamp(Utc::now());
            job_repo::update(tx, &row)?;

            load_job(tx, job_id)
        })?;

        log::info!("Assigned technician {} to job {}", technician_id, job_id);
        Ok(job)
    }

    /// Starts a pending job. Only its assigned technician may do so.
    pub fn start(&self, job_id: &str, actor: &Actor) -> Result<Job, LifecycleError> {
        let _span = tracing::info_span!("job.start", job_id = %job_id).entered();

        let job = self.db.with_tx(|tx| {
            let mut row = load_job_row(tx, job_id)?;
            if row.assigned_technician.as_deref() != Some(actor.id.as_str()) {
                return Err(LifecycleError::Forbidden(format!(
                    "Only the assigned technician can start job '{}'",
                    job_id
                )));
            }
            if row.state != JobState::Pending.as_str() {
                return Err(LifecycleError::InvalidState(format!(
                    "Job '{}' has already been started",
                    job_id
                )));
            }

            row.state = JobState::InProgress.as_str().to_string();
            row.updated_at = format_timestamp(Utc::now());
            job_repo::update(tx, &row)?;

            load_job(tx, job_id)
        })?;

        log::info!("Job {} started by {}", job_id, actor.id);
        Ok(job)
    }

    pub fn get(&self, job_id: &str) -> Result<Job, LifecycleError> {
        self.db.with_conn(|conn| Ok(load_job(conn, job_id)))?
    }

    /// Jobs matching `query`, newest first.
    pub fn list(&self, query: &JobQuery) -> Result<Page<Job>, LifecycleError> {
        let filter = JobFilter::from(query);
        self.db.with_conn(|conn| Ok(list_in(conn, &filter)))?
    }

    pub fn update_details(&self, job_id: &str, update: JobUpdate) -> Result<Job, LifecycleError> {
        let title = update.title.as_deref().map(validate_title).transpose()?;
        let description = update
            .description
            .as_deref()
            .map(validate_description)
            .transpose()?;
        let evidence_urls = update
            .evidence_urls
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| LifecycleError::Validation(format!("Invalid evidence URLs: {}", e)))?;

        self.db.with_tx(|tx| {
            let mut row = load_job_row(tx, job_id)?;
            if let Some(title) = title {
                row.title = title;
            }
            if let Some(description) = description {
                row.description = description;
            }
            if let Some(notes) = update.notes {
                let notes = notes.trim();
                row.notes = (!notes.is_empty()).then(|| notes.to_string());
            }
            if let Some(evidence_urls) = evidence_urls {
                row.evidence_urls = Some(evidence_urls);
            }
            row.updated_at = format_timestamp(Utc::now());
            job_repo::update(tx, &row)?;

            load_job(tx, job_id)
        })
    }

    /// Deletes a job with its permits and their evidence.
    pub fn delete(&self, job_id: &str) -> Result<(), LifecycleError> {
        if !self.db.with_conn(|conn| job_repo::delete(conn, job_id))? {
            return Err(LifecycleError::not_found("Job", job_id));
        }
        log::info!("Deleted job {}", job_id);
        Ok(())
    }
}

/// Moves a job to `Done` within the caller's transaction.
///
/// Returns `false` when the job was already done.
pub(crate) fn mark_done_in(conn: &Connection, job_id: &str) -> Result<bool, LifecycleError> {
    let mut row = load_job_row(conn, job_id)?;
    if row.state == JobState::Done.as_str() {
        log::debug!("Job {} already done", job_id);
        return Ok(false);
    }

    let now = format_timestamp(Utc::now());
    row.state = JobState::Done.as_str().to_string();
    row.completed_at = Some(now.clone());
    row.updated_at = now;
    job_repo::update(conn, &row)?;

    log::info!("Job {} completed", job_id);
    Ok(true)
}

fn list_in(conn: &Connection, filter: &JobFilter) -> Result<Page<Job>, LifecycleError> {
    let (rows, total) = job_repo::query(conn, filter)?;
    let items = rows
        .into_iter()
        .map(|row| hydrate_job(conn, row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page { items, total })
}

fn validate_title(title: &str) -> Result<String, LifecycleError> {
    let title = title.trim();
    if title.is_empty() {
        return Err(LifecycleError::Validation("Title must not be empty".to_string()));
    }
    if title.chars().count() > MAX_TITLE_LEN {
        return Err(LifecycleError::Validation(format!(
            "Title exceeds {} characters",
            MAX_TITLE_LEN
        )));
    }
    Ok(title.to_string())
}

fn validate_description(description: &str) -> Result<String, LifecycleError> {
    let description = description.trim();
    if description.is_empty() {
        return Err(LifecycleError::Validation(
            "Description must not be empty".to_string(),
        ));
    }
    Ok(description.to_string())
}
