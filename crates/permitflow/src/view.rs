//! Read-only summaries of a job for presentation layers.

use serde::Serialize;

use crate::model::{Job, JobState, Permit, PermitState};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitSummary {
    pub id: String,
    pub type_name: String,
    pub rank: u32,
    pub state: PermitState,
}

impl From<&Permit> for PermitSummary {
    fn from(permit: &Permit) -> Self {
        Self {
            id: permit.id.clone(),
            type_name: permit.permit_type.name.clone(),
            rank: permit.rank(),
            state: permit.state,
        }
    }
}

/// Where a job stands in its permit sequence.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobProgress {
    pub job_id: String,
    pub state: JobState,
    pub total: usize,
    pub approved: usize,
    pub pending: usize,
    pub rejected: usize,
    /// The lowest-ranked permit still pending, if every permit before it is
    /// approved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub next_permit: Option<PermitSummary>,
    /// The rejection that stops the sequence, if any.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<PermitSummary>,
}

impl JobProgress {
    pub fn from_job(job: &Job) -> Self {
        let count = |state: PermitState| job.permits.iter().filter(|p| p.state == state).count();

        let mut ordered: Vec<&Permit> = job.permits.iter().collect();
        ordered.sort_by_key(|p| p.rank());

        let mut next_permit = None;
        let mut blocked_by = None;
        if let Some(first_open) = ordered.iter().find(|p| p.state != PermitState::Approved) {
            match first_open.state {
                PermitState::Rejected => blocked_by = Some(PermitSummary::from(*first_open)),
                _ => next_permit = Some(PermitSummary::from(*first_open)),
            }
        }

        Self {
            job_id: job.id.clone(),
            state: job.state,
            total: job.permits.len(),
            approved: count(PermitState::Approved),
            pending: count(PermitState::Pending),
            rejected: count(PermitState::Rejected),
            next_permit,
            blocked_by,
        }
    }

    pub fn is_blocked(&self) -> bool {
        self.blocked_by.is_some()
    }

    /// True once every permit is approved.
    pub fn all_approved(&self) -> bool {
        self.total > 0 && self.approved == self.total
    }
}
