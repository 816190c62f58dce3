//! Evidence uploads attached to permits.
//!
//! Content is kept inline as a `data:` URL so the stored reference is
//! self-contained and stable.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use chrono::Utc;
use rusqlite::Connection;
use serde::{Deserialize, Serialize};

use crate::config::EvidenceConfig;
use crate::db::evidence_repo::{self, EvidenceRow};
use crate::db::{format_timestamp, parse_timestamp, permit_repo, Database, DatabaseError};
use crate::error::{EvidenceError, LifecycleError};
use crate::model::{Evidence, PermitState};

/// A file as received from the caller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceUpload {
    pub filename: String,
    /// Declared content type. Guessed from the file extension when absent.
    #[serde(default)]
    pub mime_type: Option<String>,
    pub bytes: Vec<u8>,
}

impl EvidenceUpload {
    pub fn new(filename: impl Into<String>, mime_type: impl Into<String>, bytes: Vec<u8>) -> Self {
        Self {
            filename: filename.into(),
            mime_type: Some(mime_type.into()),
            bytes,
        }
    }

    pub fn size(&self) -> u64 {
        self.bytes.len() as u64
    }
}

impl TryFrom<EvidenceRow> for Evidence {
    type Error = DatabaseError;

    fn try_from(row: EvidenceRow) -> Result<Self, Self::Error> {
        let size_bytes = u64::try_from(row.size_bytes).map_err(|_| DatabaseError::Corrupt {
            column: "evidence.size_bytes",
            value: row.size_bytes.to_string(),
        })?;
        Ok(Self {
            created_at: parse_timestamp("evidence.created_at", &row.created_at)?,
            id: row.id,
            permit_id: row.permit_id,
            filename: row.filename,
            mime_type: row.mime_type,
            size_bytes,
            content_ref: row.content_ref,
            description: row.description,
            uploaded_by: row.uploaded_by,
        })
    }
}

pub struct EvidenceStore {
    db: Database,
    config: EvidenceConfig,
}

impl EvidenceStore {
    pub fn new(db: Database, config: EvidenceConfig) -> Self {
        Self { db, config }
    }

    /// Checks an upload against the MIME whitelist and size ceiling.
    ///
    /// Returns the normalized MIME type that will be stored.
    pub fn validate(&self, upload: &EvidenceUpload) -> Result<String, EvidenceError> {
        let mime_type = normalize_mime(upload);

        if !self
            .config
            .allowed_mime_types
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(&mime_type))
        {
            return Err(EvidenceError::UnsupportedMimeType {
                mime_type,
                allowed: self.config.allowed_mime_types.join(", "),
            });
        }

        if upload.bytes.is_empty() {
            return Err(EvidenceError::Empty(upload.filename.clone()));
        }

        if upload.size() > self.config.max_size_bytes {
            return Err(EvidenceError::TooLarge {
                filename: upload.filename.clone(),
                size: upload.size(),
                max: self.config.max_size_bytes,
            });
        }

        Ok(mime_type)
    }

    /// Attaches an upload to a pending permit outside of a request.
    ///
    /// The permit row itself is left untouched.
    pub fn store(
        &self,
        upload: &EvidenceUpload,
        permit_id: &str,
        uploaded_by: &str,
        description: Option<&str>,
    ) -> Result<Evidence, LifecycleError> {
        self.db.with_tx(|tx| {
            let permit = permit_repo::find_by_id(tx, permit_id)?
                .ok_or_else(|| LifecycleError::not_found("Permit", permit_id))?;
            if permit.state != PermitState::Pending.as_str() {
                return Err(LifecycleError::InvalidState(format!(
                    "Evidence can only be attached to a pending permit, '{}' is {}",
                    permit_id, permit.state
                )));
            }
            self.store_in(tx, upload, permit_id, uploaded_by, description)
        })
    }

    /// Validates and inserts within the caller's transaction.
    pub(crate) fn store_in(
        &self,
        conn: &Connection,
        upload: &EvidenceUpload,
        permit_id: &str,
        uploaded_by: &str,
        description: Option<&str>,
    ) -> Result<Evidence, LifecycleError> {
        let mime_type = self.validate(upload)?;

        let row = EvidenceRow {
            id: uuid::Uuid::new_v4().to_string(),
            permit_id: permit_id.to_string(),
            filename: upload.filename.clone(),
            content_ref: format!("data:{};base64,{}", mime_type, STANDARD.encode(&upload.bytes)),
            mime_type,
            size_bytes: upload.bytes.len() as i64,
            description: description.map(str::to_string),
            uploaded_by: uploaded_by.to_string(),
            created_at: format_timestamp(Utc::now()),
        };
        evidence_repo::insert(conn, &row)?;

        log::info!(
            "Stored evidence {} ({}, {} bytes) for permit {}",
            row.id,
            row.filename,
            row.size_bytes,
            permit_id
        );
        Ok(Evidence::try_from(row)?)
    }

    pub fn get(&self, id: &str) -> Result<Evidence, LifecycleError> {
        let row = self
            .db
            .with_conn(|conn| evidence_repo::find_by_id(conn, id))?
            .ok_or_else(|| LifecycleError::not_found("Evidence", id))?;
        Ok(Evidence::try_from(row)?)
    }

    /// Evidence of a permit, newest first.
    pub fn list_for(&self, permit_id: &str) -> Result<Vec<Evidence>, LifecycleError> {
        Ok(self.db.with_conn(|conn| list_for_in(conn, permit_id))?)
    }

    pub fn remove(&self, id: &str) -> Result<(), LifecycleError> {
        if !self.db.with_conn(|conn| evidence_repo::delete(conn, id))? {
            return Err(LifecycleError::not_found("Evidence", id));
        }
        log::info!("Removed evidence {}", id);
        Ok(())
    }
}

pub(crate) fn list_for_in(conn: &Connection, permit_id: &str) -> Result<Vec<Evidence>, DatabaseError> {
    evidence_repo::list_by_permit(conn, permit_id)?
        .into_iter()
        .map(Evidence::try_from)
        .collect()
}

/// Lowercases the declared type and drops parameters such as `; charset=`.
fn normalize_mime(upload: &EvidenceUpload) -> String {
    let declared = upload
        .mime_type
        .as_deref()
        .and_then(|m| m.split(';').next())
        .map(|m| m.trim().to_ascii_lowercase())
        .filter(|m| !m.is_empty());

    match declared {
        Some(mime) => mime,
        None => mime_guess::from_path(&upload.filename)
            .first()
            .map(|m| m.essence_str().to_string())
            .unwrap_or_else(|| "application/octet-stream".to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::DEFAULT_MAX_EVIDENCE_BYTES;
    use crate::db::{job_repo, permit_type_repo};
    use crate::error::ErrorKind;

    fn store() -> EvidenceStore {
        EvidenceStore::new(Database::open_in_memory().unwrap(), EvidenceConfig::default())
    }

    fn png(bytes: usize) -> EvidenceUpload {
        EvidenceUpload::new("arnes.png", "image/png", vec![7u8; bytes])
    }

    /// Inserts a permit type, a job and one pending permit `p1`.
    fn seed_permit(db: &Database, state: PermitState) {
        db.with_conn(|conn| {
            let ts = "2026-01-01T00:00:00.000000Z".to_string();
            permit_type_repo::upsert(
                conn,
                &permit_type_repo::PermitTypeRow {
                    id: "t1".into(),
                    name: "altura".into(),
                    description: None,
                    rank: 1,
                    active: true,
                    created_at: ts.clone(),
                    updated_at: ts.clone(),
                },
            )?;
            job_repo::insert(
                conn,
                &job_repo::JobRow {
                    id: "j1".into(),
                    title: "Torre 4".into(),
                    description: "Cambio de aisladores".into(),
                    state: "pending".into(),
                    assigned_technician: None,
                    notes: None,
                    evidence_urls: None,
                    created_at: ts.clone(),
                    updated_at: ts.clone(),
                    completed_at: None,
                },
            )?;
            permit_repo::insert(
                conn,
                &permit_repo::PermitRow {
                    id: "p1".into(),
                    job_id: "j1".into(),
                    permit_type_id: "t1".into(),
                    state: state.as_str().into(),
                    description: None,
                    requested_by: None,
                    responded_by: None,
                    supervisor_comment: None,
                    requested_at: None,
                    responded_at: None,
                    version: 0,
                    created_at: ts.clone(),
                    updated_at: ts,
                },
            )
        })
        .unwrap();
    }

    #[test]
    fn test_validate_accepts_whitelisted_types() {
        let store = store();
        for mime in ["image/jpeg", "image/jpg", "image/png", "image/webp"] {
            let upload = EvidenceUpload::new("foto", mime, vec![1, 2, 3]);
            assert_eq!(store.validate(&upload).unwrap(), mime);
        }
    }

    #[test]
    fn test_validate_normalizes_declared_type() {
        let upload = EvidenceUpload::new("foto.PNG", "Image/PNG; charset=binary", vec![1]);
        assert_eq!(store().validate(&upload).unwrap(), "image/png");
    }

    #[test]
    fn test_validate_guesses_missing_type() {
        let upload = EvidenceUpload {
            filename: "casco.jpg".to_string(),
            mime_type: None,
            bytes: vec![1],
        };
        assert_eq!(store().validate(&upload).unwrap(), "image/jpeg");

        let unknown = EvidenceUpload {
            filename: "notas".to_string(),
            mime_type: Some("  ".to_string()),
            bytes: vec![1],
        };
        assert!(matches!(
            store().validate(&unknown),
            Err(EvidenceError::UnsupportedMimeType { .. })
        ));
    }

    #[test]
    fn test_validate_rejects_disallowed_type() {
        let upload = EvidenceUpload::new("informe.pdf", "application/pdf", vec![1]);
        let err = store().validate(&upload).unwrap_err();
        assert!(matches!(
            err,
            EvidenceError::UnsupportedMimeType { ref mime_type, .. } if mime_type == "application/pdf"
        ));
    }

    #[test]
    fn test_validate_size_ceiling() {
        let store = store();
        assert!(store.validate(&png(DEFAULT_MAX_EVIDENCE_BYTES as usize)).is_ok());
        assert!(matches!(
            store.validate(&png(DEFAULT_MAX_EVIDENCE_BYTES as usize + 1)),
            Err(EvidenceError::TooLarge { .. })
        ));
        assert!(matches!(store.validate(&png(0)), Err(EvidenceError::Empty(_))));
    }

    #[test]
    fn test_store_builds_data_url() {
        let store = store();
        seed_permit(&store.db, PermitState::Pending);

        let upload = EvidenceUpload::new("a.png", "image/png", b"hola".to_vec());
        let evidence = store.store(&upload, "p1", "tech-1", Some("arnes")).unwrap();

        assert_eq!(evidence.content_ref, "data:image/png;base64,aG9sYQ==");
        assert_eq!(evidence.size_bytes, 4);
        assert_eq!(evidence.description.as_deref(), Some("arnes"));
        assert_eq!(store.get(&evidence.id).unwrap(), evidence);

        let permit = store
            .db
            .with_conn(|conn| permit_repo::find_by_id(conn, "p1"))
            .unwrap()
            .unwrap();
        assert_eq!(permit.version, 0);
    }

    #[test]
    fn test_store_requires_pending_permit() {
        let store = store();
        seed_permit(&store.db, PermitState::Approved);

        let err = store.store(&png(10), "p1", "tech-1", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::InvalidState);

        let err = store.store(&png(10), "nope", "tech-1", None).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NotFound);
    }

    #[test]
    fn test_list_for_newest_first_and_remove() {
        let store = store();
        seed_permit(&store.db, PermitState::Pending);

        let first = store.store(&png(1), "p1", "tech-1", None).unwrap();
        let second = store.store(&png(2), "p1", "tech-1", None).unwrap();

        let ids: Vec<String> = store.list_for("p1").unwrap().into_iter().map(|e| e.id).collect();
        assert_eq!(ids, vec![second.id.clone(), first.id.clone()]);

        store.remove(&first.id).unwrap();
        assert_eq!(store.list_for("p1").unwrap().len(), 1);
        assert_eq!(store.remove(&first.id).unwrap_err().kind(), ErrorKind::NotFound);
        assert_eq!(store.get(&first.id).unwrap_err().kind(), ErrorKind::NotFound);
    }
}
