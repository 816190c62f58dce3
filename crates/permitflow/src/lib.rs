pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;
pub mod evidence;
pub mod lifecycle;
pub mod model;
pub mod telemetry;
pub mod users;
pub mod view;

pub use catalog::PermitTypeCatalog;
pub use config::{load_config, Config, EvidenceConfig, PermitTypeSeed};
pub use db::Database;
pub use engine::PermitEngine;
pub use error::{
    ConfigError, ErrorKind, EvidenceError, LifecycleError, PermitFlowError, Result,
};
pub use evidence::{EvidenceStore, EvidenceUpload};
pub use lifecycle::{JobLifecycle, JobQuery, JobUpdate, Page, PermitLifecycle, PermitQuery};
pub use model::{Evidence, Job, JobState, Permit, PermitState, PermitType};
pub use users::{Actor, InMemoryUserDirectory, Role, UserDirectory, UserRef};
pub use view::{JobProgress, PermitSummary};
