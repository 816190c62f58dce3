pub mod loader;
pub mod schema;

pub use loader::{load_config, load_config_from_str, validate_config, DATABASE_PATH_ENV};
pub use schema::{
    default_permit_types, Config, EvidenceConfig, PermitTypeSeed, DEFAULT_MAX_EVIDENCE_BYTES,
};
