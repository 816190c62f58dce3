//! Ordered catalog of permit types.
//!
//! The catalog is seeded once at start-up by [`PermitTypeCatalog::bootstrap`]
//! and is read-only afterwards. Rank defines the approval order: a permit may
//! only leave `Pending` once every permit of lower rank on the same job is
//! approved.

use chrono::Utc;
use rusqlite::Connection;

use crate::config::PermitTypeSeed;
use crate::db::permit_type_repo::{self, PermitTypeRow};
use crate::db::{format_timestamp, Database};
use crate::error::LifecycleError;
use crate::model::PermitType;

impl From<PermitTypeRow> for PermitType {
    fn from(row: PermitTypeRow) -> Self {
        Self {
            id: row.id,
            name: row.name,
            description: row.description,
            rank: row.rank,
            active: row.active,
        }
    }
}

pub struct PermitTypeCatalog {
    db: Database,
    seeds: Vec<PermitTypeSeed>,
}

impl PermitTypeCatalog {
    pub fn new(db: Database, seeds: Vec<PermitTypeSeed>) -> Self {
        Self { db, seeds }
    }

    /// Inserts the configured catalog when no active type exists.
    ///
    /// Never overwrites an existing catalog. Returns whether seeding happened.
    pub fn bootstrap(&self) -> Result<bool, LifecycleError> {
        self.db.with_tx(|tx| {
            if permit_type_repo::count_active(tx)? > 0 {
                log::debug!("Permit type catalog already present, skipping bootstrap");
                return Ok(false);
            }

            let now = format_timestamp(Utc::now());
            for seed in &self.seeds {
                permit_type_repo::upsert(
                    tx,
                    &PermitTypeRow {
                        id: uuid::Uuid::new_v4().to_string(),
                        name: seed.name.trim().to_string(),
                        description: seed.description.clone(),
                        rank: seed.rank,
                        active: true,
                        created_at: now.clone(),
                        updated_at: now.clone(),
                    },
                )?;
            }

            log::info!("Seeded {} default permit types", self.seeds.len());
            Ok(true)
        })
    }

    /// Active types, ascending by rank.
    pub fn list_ordered(&self) -> Result<Vec<PermitType>, LifecycleError> {
        Ok(self.db.with_conn(list_ordered_in)?)
    }

    pub fn by_id(&self, id: &str) -> Result<PermitType, LifecycleError> {
        self.db
            .with_conn(|conn| permit_type_repo::find_active_by_id(conn, id))?
            .map(PermitType::from)
            .ok_or_else(|| LifecycleError::not_found("PermitType", id))
    }

    pub fn by_name(&self, name: &str) -> Result<PermitType, LifecycleError> {
        self.db
            .with_conn(|conn| permit_type_repo::find_active_by_name(conn, name))?
            .map(PermitType::from)
            .ok_or_else(|| LifecycleError::not_found("PermitType", name))
    }

    /// The active type with the smallest rank strictly greater than the rank
    /// of `current_id`.
    pub fn next(&self, current_id: &str) -> Result<PermitType, LifecycleError> {
        self.db.with_conn(|conn| Ok(next_in(conn, current_id)))?
    }

    /// True when no active type outranks `id`.
    pub fn is_highest_rank(&self, id: &str) -> Result<bool, LifecycleError> {
        self.db
            .with_conn(|conn| Ok(is_highest_rank_in(conn, id)))?
    }
}

pub(crate) fn list_ordered_in(conn: &Connection) -> Result<Vec<PermitType>, crate::db::DatabaseError> {
    Ok(permit_type_repo::list_active(conn)?
        .into_iter()
        .map(PermitType::from)
        .collect())
}

/// Resolves a type by id whether or not it is still active, so permits created
/// before a type was retired keep their rank.
pub(crate) fn type_of(conn: &Connection, id: &str) -> Result<PermitType, LifecycleError> {
    permit_type_repo::find_by_id(conn, id)?
        .map(PermitType::from)
        .ok_or_else(|| LifecycleError::not_found("PermitType", id))
}

pub(crate) fn next_in(conn: &Connection, current_id: &str) -> Result<PermitType, LifecycleError> {
    let current = permit_type_repo::find_active_by_id(conn, current_id)?
        .ok_or_else(|| LifecycleError::not_found("PermitType", current_id))?;
    permit_type_repo::find_next_active(conn, current.rank)?
        .map(PermitType::from)
        .ok_or_else(|| LifecycleError::not_found("PermitType", format!("after {}", current.name)))
}

pub(crate) fn is_highest_rank_in(conn: &Connection, id: &str) -> Result<bool, LifecycleError> {
    let permit_type = type_of(conn, id)?;
    let max = permit_type_repo::max_active_rank(conn)?;
    Ok(max.map_or(true, |max| permit_type.rank >= max))
}
