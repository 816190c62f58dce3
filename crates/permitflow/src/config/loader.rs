use std::collections::HashSet;
use std::path::{Path, PathBuf};

use crate::config::schema::Config;
use crate::error::ConfigError;

/// Overrides `databasePath` when set.
pub const DATABASE_PATH_ENV: &str = "PERMITFLOW_DATABASE_PATH";

const MAX_PERMIT_TYPE_NAME_LEN: usize = 50;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let mut config: Config = serde_json::from_str(content)?;

    apply_env_overrides(&mut config);
    validate_config(&config)?;

    Ok(config)
}

fn apply_env_overrides(config: &mut Config) {
    if let Ok(path) = std::env::var(DATABASE_PATH_ENV) {
        if !path.trim().is_empty() {
            log::debug!("{} overrides configured database path", DATABASE_PATH_ENV);
            config.database_path = Some(PathBuf::from(path));
        }
    }
}

pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.version != "1.0" {
        return Err(ConfigError::Validation {
            message: format!("Unsupported config version: {}", config.version),
        });
    }

    if config.evidence.max_size_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "evidence.maxSizeBytes must be greater than zero".to_string(),
        });
    }

    if config.evidence.allowed_mime_types.is_empty() {
        return Err(ConfigError::Validation {
            message: "evidence.allowedMimeTypes must not be empty".to_string(),
        });
    }

    if config.permit_types.is_empty() {
        return Err(ConfigError::Validation {
            message: "permitTypes must contain at least one entry".to_string(),
        });
    }

    let mut names = HashSet::new();
    let mut ranks = HashSet::new();
    for seed in &config.permit_types {
        let name = seed.name.trim();
        if name.is_empty() {
            return Err(ConfigError::InvalidPermitType {
                name: seed.name.clone(),
                reason: "Name must not be empty".to_string(),
            });
        }
        if name.chars().count() > MAX_PERMIT_TYPE_NAME_LEN {
            return Err(ConfigError::InvalidPermitType {
                name: seed.name.clone(),
                reason: format!("Name exceeds {} characters", MAX_PERMIT_TYPE_NAME_LEN),
            });
        }
        if seed.rank == 0 {
            return Err(ConfigError::InvalidPermitType {
                name: seed.name.clone(),
                reason: "Rank must be a positive integer".to_string(),
            });
        }
        if !names.insert(name.to_string()) {
            return Err(ConfigError::InvalidPermitType {
                name: seed.name.clone(),
                reason: "Duplicate permit type name".to_string(),
            });
        }
        if !ranks.insert(seed.rank) {
            return Err(ConfigError::InvalidPermitType {
                name: seed.name.clone(),
                reason: format!("Rank {} is already used", seed.rank),
            });
        }
    }

    Ok(())
}
