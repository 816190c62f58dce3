use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Evidence uploads are capped at 5 MiB by default.
pub const DEFAULT_MAX_EVIDENCE_BYTES: u64 = 5 * 1024 * 1024;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Config {
    #[serde(default = "default_version")]
    pub version: String,
    /// SQLite file; falls back to `~/.permitflow/data/permitflow.db`.
    #[serde(default)]
    pub database_path: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub evidence: EvidenceConfig,
    /// Catalog inserted by the one-time bootstrap when no active type exists.
    #[serde(default = "default_permit_types")]
    pub permit_types: Vec<PermitTypeSeed>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            version: default_version(),
            database_path: None,
            log_level: default_log_level(),
            evidence: EvidenceConfig::default(),
            permit_types: default_permit_types(),
        }
    }
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EvidenceConfig {
    #[serde(default = "default_max_size_bytes")]
    pub max_size_bytes: u64,
    #[serde(default = "default_allowed_mime_types")]
    pub allowed_mime_types: Vec<String>,
}

fn default_max_size_bytes() -> u64 {
    DEFAULT_MAX_EVIDENCE_BYTES
}

fn default_allowed_mime_types() -> Vec<String> {
    ["image/jpeg", "image/jpg", "image/png", "image/webp"]
        .iter()
        .map(|s| s.to_string())
        .collect()
}

impl Default for EvidenceConfig {
    fn default() -> Self {
        Self {
            max_size_bytes: DEFAULT_MAX_EVIDENCE_BYTES,
            allowed_mime_types: default_allowed_mime_types(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PermitTypeSeed {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
    pub rank: u32,
}

impl PermitTypeSeed {
    pub fn new(name: &str, description: &str, rank: u32) -> Self {
        Self {
            name: name.to_string(),
            description: Some(description.to_string()),
            rank,
        }
    }
}

pub fn default_permit_types() -> Vec<PermitTypeSeed> {
    vec![
        PermitTypeSeed::new("altura", "Permiso para trabajos en altura", 1),
        PermitTypeSeed::new("enganche", "Permiso para trabajos de enganche", 2),
        PermitTypeSeed::new("cierre", "Permiso para trabajos de cierre", 3),
    ]
}
