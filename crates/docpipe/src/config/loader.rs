use std::path::Path;

use crate::config::schema::Config;
use crate::error::ConfigError;

pub fn load_config<P: AsRef<Path>>(path: P) -> Result<Config, ConfigError> {
    let path = path.as_ref();
    let content = std::fs::read_to_string(path).map_err(|e| ConfigError::ReadFile {
        path: path.to_path_buf(),
        source: e,
    })?;

    load_config_from_str(&content)
}

pub fn load_config_from_str(content: &str) -> Result<Config, ConfigError> {
    let config: Config = serde_json::from_str(content)?;
    validate_config(&config)?;
    Ok(config)
}

pub(crate) fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.worker_count == 0 {
        return Err(ConfigError::Validation {
            message: "workerCount must be at least 1".to_string(),
        });
    }

    if config.max_upload_bytes == 0 {
        return Err(ConfigError::Validation {
            message: "maxUploadBytes must be positive".to_string(),
        });
    }

    if config.allowed_kinds.is_empty() {
        return Err(ConfigError::Validation {
            message: "allowedKinds must not be empty".to_string(),
        });
    }
    for kind in &config.allowed_kinds {
        if kind.is_empty() || kind.starts_with('.') || !kind.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(ConfigError::Validation {
                message: format!("invalid allowed kind '{}'", kind),
            });
        }
    }

    let mut categories = std::collections::HashSet::new();
    for rule in &config.category_rules {
        if !categories.insert(&rule.category) {
            return Err(ConfigError::InvalidRule {
                category: rule.category.clone(),
                reason: "duplicate category".to_string(),
            });
        }
        if rule.keywords.is_empty() {
            return Err(ConfigError::InvalidRule {
                category: rule.category.clone(),
                reason: "rule has no keywords".to_string(),
            });
        }
    }

    Ok(())
}
