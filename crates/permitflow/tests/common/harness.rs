//! Test harness for isolated lifecycle tests.
//!
//! Each `TestHarness` owns a temporary directory holding its SQLite file, so
//! tests never share state and the database can be reopened from disk.

#![allow(dead_code)]

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tempfile::TempDir;

use permitflow::{Actor, Config, InMemoryUserDirectory, Job, PermitEngine, Role};

pub const TECHNICIAN: &str = "tech-1";
pub const OTHER_TECHNICIAN: &str = "tech-2";
pub const SUPERVISOR: &str = "sup-1";

pub struct TestHarness {
    temp_dir: TempDir,
    pub db_path: PathBuf,
    pub config: Config,
    pub engine: PermitEngine,
}

impl TestHarness {
    /// Engine with the default configuration and catalog.
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    /// Engine with a custom configuration. `databasePath` is replaced by a
    /// file inside the harness directory.
    pub fn with_config(mut config: Config) -> Self {
        let temp_dir = TempDir::new().expect("Failed to create temp directory");
        let db_path = temp_dir.path().join("data").join("permitflow.db");
        config.database_path = Some(db_path.clone());

        let engine = PermitEngine::open(&config, users()).expect("Failed to open engine");

        Self {
            temp_dir,
            db_path,
            config,
            engine,
        }
    }

    pub fn temp_path(&self) -> &Path {
        self.temp_dir.path()
    }

    /// Opens a second engine on the same database file.
    pub fn reopen(&self) -> PermitEngine {
        PermitEngine::open(&self.config, users()).expect("Failed to reopen engine")
    }

    /// Creates a job assigned to [`TECHNICIAN`] and starts it.
    pub fn started_job(&self, title: &str) -> Job {
        let job = self
            .engine
            .jobs()
            .create_job(title, "Mantenimiento de linea", Some(TECHNICIAN))
            .expect("Failed to create job");
        self.engine
            .jobs()
            .start(&job.id, &technician())
            .expect("Failed to start job")
    }

    /// ID of the permit of `type_name` on `job`.
    pub fn permit_id(&self, job: &Job, type_name: &str) -> String {
        job.permit_by_type(type_name)
            .unwrap_or_else(|| panic!("Job {} has no '{}' permit", job.id, type_name))
            .id
            .clone()
    }

    pub fn reload(&self, job: &Job) -> Job {
        self.engine.jobs().get(&job.id).expect("Failed to reload job")
    }
}

pub fn users() -> Arc<InMemoryUserDirectory> {
    Arc::new(
        InMemoryUserDirectory::new()
            .with_user(TECHNICIAN, "Ana Rojas", Role::Technician)
            .with_user(OTHER_TECHNICIAN, "Luis Vera", Role::Technician)
            .with_user(SUPERVISOR, "Marta Silva", Role::Supervisor),
    )
}

pub fn technician() -> Actor {
    Actor::technician(TECHNICIAN)
}

pub fn supervisor() -> Actor {
    Actor::supervisor(SUPERVISOR)
}
