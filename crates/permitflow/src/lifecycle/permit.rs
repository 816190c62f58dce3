//! Permit request, approval and rejection.
//!
//! A permit moves `Pending -> Approved` or `Pending -> Rejected` and never
//! leaves a terminal state. Requests only record metadata and evidence. The
//! approval of the highest-ranked permit completes the job in the same
//! transaction.

use std::sync::Arc;

use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use super::job::mark_done_in;
use super::{hydrate_permit, load_job_row, load_permit, load_permit_row, Page};
use crate::catalog;
use crate::db::permit_repo::{self, PermitFilter, PermitRow};
use crate::db::{format_timestamp, Database};
use crate::error::LifecycleError;
use crate::evidence::{EvidenceStore, EvidenceUpload};
use crate::model::{Permit, PermitState};
use crate::users::Actor;

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitQuery {
    #[serde(default)]
    pub job_id: Option<String>,
    #[serde(default)]
    pub requested_by: Option<String>,
    #[serde(default)]
    pub state: Option<PermitState>,
    #[serde(default)]
    pub limit: Option<u64>,
    #[serde(default)]
    pub offset: Option<u64>,
}

impl From<&PermitQuery> for PermitFilter {
    fn from(query: &PermitQuery) -> Self {
        Self {
            job_id: query.job_id.clone(),
            requested_by: query.requested_by.clone(),
            state: query.state.map(|s| s.as_str().to_string()),
            limit: query.limit,
            offset: query.offset,
        }
    }
}

pub struct PermitLifecycle {
    db: Database,
    evidence: Arc<EvidenceStore>,
}

impl PermitLifecycle {
    pub fn new(db: Database, evidence: Arc<EvidenceStore>) -> Self {
        Self { db, evidence }
    }

    /// Records a technician's request for a permit, optionally with evidence.
    ///
    /// Fails without persisting anything if the evidence is refused.
    pub fn request(
        &self,
        permit_id: &str,
        actor: &Actor,
        description: Option<&str>,
        upload: Option<&EvidenceUpload>,
    ) -> Result<Permit, LifecycleError> {
        let _span = tracing::info_span!("permit.request", permit_id = %permit_id).entered();

        let permit = self.db.with_tx(|tx| {
            let mut row = load_permit_row(tx, permit_id)?;
            let job = load_job_row(tx, &row.job_id)?;
            if job.assigned_technician.as_deref() != Some(actor.id.as_str()) {
                return Err(LifecycleError::Forbidden(format!(
                    "Only the assigned technician can request permits for job '{}'",
                    job.id
                )));
            }
            ensure_pending(&row)?;
            check_sequence(tx, &row)?;

            let now = format_timestamp(Utc::now());
            row.description = description.map(str::to_string);
            row.requested_by = Some(actor.id.clone());
            row.requested_at = Some(now.clone());
            row.updated_at = now;

            if let Some(upload) = upload {
                self.evidence
                    .store_in(tx, upload, permit_id, &actor.id, description)?;
            }

            write(tx, &row)?;
            load_permit(tx, permit_id)
        })?;

        log::info!(
            "Permit {} ({}) requested by {}",
            permit.id,
            permit.permit_type.name,
            actor.id
        );
        Ok(permit)
    }

    /// Approves a pending permit. Approving the highest-ranked permit marks
    /// its job done.
    pub fn approve(
        &self,
        permit_id: &str,
        actor: &Actor,
        comment: Option<&str>,
    ) -> Result<Permit, LifecycleError> {
        let _span = tracing::info_span!("permit.approve", permit_id = %permit_id).entered();
        ensure_can_respond(actor, "approve")?;

        let permit = self.db.with_tx(|tx| {
            let mut row = load_permit_row(tx, permit_id)?;
            ensure_pending(&row)?;
            check_sequence(tx, &row)?;

            let now = format_timestamp(Utc::now());
            row.state = PermitState::Approved.as_str().to_string();
            row.responded_by = Some(actor.id.clone());
            row.supervisor_comment = comment
                .map(str::trim)
                .filter(|c| !c.is_empty())
                .map(str::to_string);
            row.responded_at = Some(now.clone());
            row.updated_at = now;
            write(tx, &row)?;

            if catalog::is_highest_rank_in(tx, &row.permit_type_id)? {
                mark_done_in(tx, &row.job_id)?;
            } else if let Ok(next) = catalog::next_in(tx, &row.permit_type_id) {
                log::debug!("Job {} can now request '{}'", row.job_id, next.name);
            }

            load_permit(tx, permit_id)
        })?;

        log::info!(
            "Permit {} ({}) approved by {}",
            permit.id,
            permit.permit_type.name,
            actor.id
        );
        Ok(permit)
    }

    /// Rejects a pending permit. A comment is mandatory and the job is left
    /// untouched.
    pub fn reject(
        &self,
        permit_id: &str,
        actor: &Actor,
        comment: &str,
    ) -> Result<Permit, LifecycleError> {
        let _span = tracing::info_span!("permit.reject", permit_id = %permit_id).entered();

        let comment = comment.trim();
        if comment.is_empty() {
            return Err(LifecycleError::Validation(
                "A comment is mandatory when rejecting a permit".to_string(),
            ));
        }
        ensure_can_respond(actor, "reject")?;

        let permit = self.db.with_tx(|tx| {
            let mut row = load_permit_row(tx, permit_id)?;
            ensure_pending(&row)?;

            let now = format_timestamp(Utc::now());
            row.state = PermitState::Rejected.as_str().to_string();
            row.responded_by = Some(actor.id.clone());
            row.supervisor_comment = Some(comment.to_string());
            row.responded_at = Some(now.clone());
            row.updated_at = now;
            write(tx, &row)?;

            load_permit(tx, permit_id)
        })?;

        log::info!(
            "Permit {} ({}) rejected by {}",
            permit.id,
            permit.permit_type.name,
            actor.id
        );
        Ok(permit)
    }

    pub fn get(&self, permit_id: &str) -> Result<Permit, LifecycleError> {
        self.db.with_conn(|conn| Ok(load_permit(conn, permit_id)))?
    }

    /// Permits matching `query`, in request order.
    pub fn list(&self, query: &PermitQuery) -> Result<Page<Permit>, LifecycleError> {
        let filter = PermitFilter::from(query);
        self.db.with_conn(|conn| Ok(list_in(conn, &filter)))?
    }

    /// Permits of one job, ordered by rank.
    pub fn for_job(&self, job_id: &str) -> Result<Vec<Permit>, LifecycleError> {
        self.db.with_conn(|conn| Ok(for_job_in(conn, job_id)))?
    }

    /// Pending permits across all jobs, oldest request first.
    pub fn pending(&self) -> Result<Vec<Permit>, LifecycleError> {
        self.db.with_conn(|conn| Ok(pending_in(conn)))?
    }

    /// Deletes a permit and its evidence.
    pub fn delete(&self, permit_id: &str) -> Result<(), LifecycleError> {
        if !self.db.with_conn(|conn| permit_repo::delete(conn, permit_id))? {
            return Err(LifecycleError::not_found("Permit", permit_id));
        }
        log::info!("Deleted permit {}", permit_id);
        Ok(())
    }
}

fn ensure_can_respond(actor: &Actor, action: &str) -> Result<(), LifecycleError> {
    if actor.role.can_respond() {
        return Ok(());
    }
    Err(LifecycleError::Forbidden(format!(
        "User '{}' may not {} permits",
        actor.id, action
    )))
}

fn ensure_pending(row: &PermitRow) -> Result<(), LifecycleError> {
    if row.state == PermitState::Pending.as_str() {
        return Ok(());
    }
    Err(LifecycleError::InvalidState(format!(
        "Permit '{}' has already been processed ({})",
        row.id, row.state
    )))
}

/// Every active type ranked below this permit's type must have an approved
/// permit on the same job. The lowest rank has nothing to check.
fn check_sequence(conn: &Connection, row: &PermitRow) -> Result<(), LifecycleError> {
    let own = catalog::type_of(conn, &row.permit_type_id)?;
    let siblings = permit_repo::list_by_job(conn, &row.job_id)?;

    for earlier in catalog::list_ordered_in(conn)?
        .into_iter()
        .take_while(|t| t.rank < own.rank)
    {
        match siblings.iter().find(|p| p.permit_type_id == earlier.id) {
            None => {
                return Err(LifecycleError::InvalidState(format!(
                    "No '{}' permit found for job '{}'",
                    earlier.name, row.job_id
                )))
            }
            Some(p) if p.state != PermitState::Approved.as_str() => {
                return Err(LifecycleError::InvalidState(format!(
                    "Permit '{}' cannot proceed until permit '{}' is approved",
                    own.name, earlier.name
                )))
            }
            Some(_) => {}
        }
    }
    Ok(())
}

/// Persists `row` if nobody else wrote it since it was read.
fn write(conn: &Connection, row: &PermitRow) -> Result<(), LifecycleError> {
    if permit_repo::update_if_version(conn, row)? {
        return Ok(());
    }
    Err(LifecycleError::InvalidState(format!(
        "Permit '{}' was modified concurrently",
        row.id
    )))
}

fn list_in(conn: &Connection, filter: &PermitFilter) -> Result<Page<Permit>, LifecycleError> {
    let (rows, total) = permit_repo::query(conn, filter)?;
    let items = rows
        .into_iter()
        .map(|row| hydrate_permit(conn, row))
        .collect::<Result<Vec<_>, _>>()?;
    Ok(Page { items, total })
}

fn pending_in(conn: &Connection) -> Result<Vec<Permit>, LifecycleError> {
    permit_repo::list_by_state(conn, PermitState::Pending.as_str())?
        .into_iter()
        .map(|row| hydrate_permit(conn, row))
        .collect()
}

fn for_job_in(conn: &Connection, job_id: &str) -> Result<Vec<Permit>, LifecycleError> {
    load_job_row(conn, job_id)?;
    permit_repo::list_by_job(conn, job_id)?
        .into_iter()
        .map(|row| hydrate_permit(conn, row))
        .collect()
}
