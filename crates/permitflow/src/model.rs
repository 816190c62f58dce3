//! Domain aggregates handed to callers: permit types, jobs, permits, evidence.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Lifecycle state of a job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobState {
    Pending,
    InProgress,
    Done,
}

impl JobState {
    pub fn as_str(&self) -> &'static str {
        match self {
            JobState::Pending => "pending",
            JobState::InProgress => "in_progress",
            JobState::Done => "done",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(JobState::Pending),
            "in_progress" => Some(JobState::InProgress),
            "done" => Some(JobState::Done),
            _ => None,
        }
    }
}

/// Lifecycle state of a permit. `Approved` and `Rejected` are terminal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PermitState {
    Pending,
    Approved,
    Rejected,
}

impl PermitState {
    pub fn as_str(&self) -> &'static str {
        match self {
            PermitState::Pending => "pending",
            PermitState::Approved => "approved",
            PermitState::Rejected => "rejected",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(PermitState::Pending),
            "approved" => Some(PermitState::Approved),
            "rejected" => Some(PermitState::Rejected),
            _ => None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        !matches!(self, PermitState::Pending)
    }
}

/// A named, ranked category of permit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PermitType {
    pub id: String,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub rank: u32,
    pub active: bool,
}

/// An uploaded file attached to a permit at request time.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Evidence {
    pub id: String,
    pub permit_id: String,
    pub filename: String,
    pub mime_type: String,
    pub size_bytes: u64,
    /// Opaque, addressable reference to the stored bytes (a `data:` URL).
    pub content_ref: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub uploaded_by: String,
    pub created_at: DateTime<Utc>,
}

/// A permit hydrated with its type and evidence.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Permit {
    pub id: String,
    pub job_id: String,
    pub permit_type: PermitType,
    pub state: PermitState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub supervisor_comment: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub requested_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub responded_at: Option<DateTime<Utc>>,
    /// Optimistic concurrency token, bumped on every write.
    pub version: i64,
    pub created_at: DateTime<Utc>,
    #[serde(default)]
    pub evidence: Vec<Evidence>,
}

impl Permit {
    pub fn rank(&self) -> u32 {
        self.permit_type.rank
    }
}

/// A job hydrated with its permits, ordered by rank.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Job {
    pub id: String,
    pub title: String,
    pub description: String,
    pub state: JobState,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub assigned_technician: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
    /// Free-form links, independent of permit evidence.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub evidence_urls: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub permits: Vec<Permit>,
}

impl Job {
    /// Returns the permit of the given type name, if present.
    pub fn permit_by_type(&self, type_name: &str) -> Option<&Permit> {
        self.permits
            .iter()
            .find(|p| p.permit_type.name == type_name)
    }
}
