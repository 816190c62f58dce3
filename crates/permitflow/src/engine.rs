//! Wires the catalog, lifecycles and evidence store over one database.

use std::path::PathBuf;
use std::sync::Arc;

use crate::catalog::PermitTypeCatalog;
use crate::config::{validate_config, Config};
use crate::db::{default_database_path, Database};
use crate::error::{ConfigError, LifecycleError, Result};
use crate::evidence::EvidenceStore;
use crate::lifecycle::{JobLifecycle, PermitLifecycle};
use crate::users::UserDirectory;
use crate::view::JobProgress;

pub struct PermitEngine {
    db: Database,
    catalog: PermitTypeCatalog,
    jobs: JobLifecycle,
    permits: PermitLifecycle,
    evidence: Arc<EvidenceStore>,
}

impl PermitEngine {
    /// Opens the configured database, runs migrations and bootstraps the
    /// permit type catalog.
    pub fn open(config: &Config, users: Arc<dyn UserDirectory>) -> Result<Self> {
        validate_config(config)?;
        let path = resolve_database_path(config)?;
        let db = Database::open(&path)?;
        Self::with_database(db, config, users)
    }

    /// Same as [`PermitEngine::open`] against a private in-memory database.
    pub fn open_in_memory(config: &Config, users: Arc<dyn UserDirectory>) -> Result<Self> {
        validate_config(config)?;
        let db = Database::open_in_memory()?;
        Self::with_database(db, config, users)
    }

    fn with_database(db: Database, config: &Config, users: Arc<dyn UserDirectory>) -> Result<Self> {
        let catalog = PermitTypeCatalog::new(db.clone(), config.permit_types.clone());
        catalog.bootstrap()?;

        let evidence = Arc::new(EvidenceStore::new(db.clone(), config.evidence.clone()));
        Ok(Self {
            jobs: JobLifecycle::new(db.clone(), users),
            permits: PermitLifecycle::new(db.clone(), Arc::clone(&evidence)),
            catalog,
            evidence,
            db,
        })
    }

    pub fn catalog(&self) -> &PermitTypeCatalog {
        &self.catalog
    }

    pub fn jobs(&self) -> &JobLifecycle {
        &self.jobs
    }

    pub fn permits(&self) -> &PermitLifecycle {
        &self.permits
    }

    pub fn evidence(&self) -> &EvidenceStore {
        &self.evidence
    }

    pub fn database(&self) -> &Database {
        &self.db
    }

    pub fn progress(&self, job_id: &str) -> std::result::Result<JobProgress, LifecycleError> {
        let job = self.jobs.get(job_id)?;
        Ok(JobProgress::from_job(&job))
    }
}

fn resolve_database_path(config: &Config) -> std::result::Result<PathBuf, ConfigError> {
    match &config.database_path {
        Some(path) => Ok(path.clone()),
        None => default_database_path().ok_or_else(|| ConfigError::Validation {
            message: "databasePath is not set and no home directory was found".to_string(),
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::PermitTypeSeed;
    use crate::users::InMemoryUserDirectory;

    #[test]
    fn test_open_in_memory_bootstraps_catalog() {
        let engine =
            PermitEngine::open_in_memory(&Config::default(), Arc::new(InMemoryUserDirectory::new()))
                .unwrap();
        let names: Vec<String> = engine
            .catalog()
            .list_ordered()
            .unwrap()
            .into_iter()
            .map(|t| t.name)
            .collect();
        assert_eq!(names, vec!["altura", "enganche", "cierre"]);
    }

    #[test]
    fn test_open_rejects_invalid_config() {
        let config = Config {
            permit_types: vec![
                PermitTypeSeed::new("altura", "a", 1),
                PermitTypeSeed::new("altura", "b", 2),
            ],
            ..Config::default()
        };
        let result = PermitEngine::open_in_memory(&config, Arc::new(InMemoryUserDirectory::new()));
        assert!(matches!(
            result,
            Err(crate::error::PermitFlowError::Config(ConfigError::InvalidPermitType { .. }))
        ));
    }

    #[test]
    fn test_explicit_database_path_wins() {
        let config = Config {
            database_path: Some(PathBuf::from("/tmp/permitflow-test.db")),
            ..Config::default()
        };
        assert_eq!(
            resolve_database_path(&config).unwrap(),
            PathBuf::from("/tmp/permitflow-test.db")
        );
    }
}
