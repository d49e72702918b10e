// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration validation
//!
//! Checks every section and reports all problems at once.

use crate::{ConfigError, ConfigResult, VecgenConfig};

/// Backend names accepted in `codegen.backend`
pub const KNOWN_BACKENDS: &[&str] = &["cpp", "c++", "cpp_standalone", "cython"];

/// Schedules accepted in `codegen.schedule`
pub const KNOWN_SCHEDULES: &[&str] = &["static", "dynamic", "none", "serial"];

/// Levels accepted in `logging.level`
pub const KNOWN_LOG_LEVELS: &[&str] = &["trace", "debug", "info", "warn", "error"];

/// Validation errors that can occur during config validation
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigValidationError {
    MissingRequired { field: String },
    InvalidValue { field: String, reason: String },
}

impl std::fmt::Display for ConfigValidationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::MissingRequired { field } => {
                write!(f, "Missing required configuration: {}", field)
            }
            Self::InvalidValue { field, reason } => {
                write!(f, "Invalid configuration value for {}: {}", field, reason)
            }
        }
    }
}

/// Validate the complete configuration
///
/// # Errors
///
/// Returns `ConfigError::ValidationError` listing every problem found
pub fn validate_config(config: &VecgenConfig) -> ConfigResult<()> {
    let mut errors = Vec::new();

    validate_codegen(config, &mut errors);
    validate_logging(config, &mut errors);

    if !errors.is_empty() {
        let error_messages = errors
            .iter()
            .map(|e| format!("  - {}", e))
            .collect::<Vec<_>>()
            .join("\n");

        return Err(ConfigError::ValidationError(format!(
            "Configuration validation failed:\n{}",
            error_messages
        )));
    }

    Ok(())
}

fn check_one_of(
    field: &str,
    value: &str,
    allowed: &[&str],
    errors: &mut Vec<ConfigValidationError>,
) {
    if value.is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: field.to_string(),
        });
    } else if !allowed.contains(&value.to_lowercase().as_str()) {
        errors.push(ConfigValidationError::InvalidValue {
            field: field.to_string(),
            reason: format!("'{}' is not one of {}", value, allowed.join(", ")),
        });
    }
}

fn validate_codegen(config: &VecgenConfig, errors: &mut Vec<ConfigValidationError>) {
    check_one_of("codegen.backend", &config.codegen.backend, KNOWN_BACKENDS, errors);
    check_one_of("codegen.schedule", &config.codegen.schedule, KNOWN_SCHEDULES, errors);

    if config.codegen.min_parallel_iterations == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "codegen.min_parallel_iterations".to_string(),
            reason: "must be at least 1".to_string(),
        });
    }
}

fn validate_logging(config: &VecgenConfig, errors: &mut Vec<ConfigValidationError>) {
    check_one_of("logging.level", &config.logging.level, KNOWN_LOG_LEVELS, errors);

    if config.logging.file_logging && config.logging.log_dir.as_os_str().is_empty() {
        errors.push(ConfigValidationError::MissingRequired {
            field: "logging.log_dir".to_string(),
        });
    }
    if config.logging.retention_runs == 0 {
        errors.push(ConfigValidationError::InvalidValue {
            field: "logging.retention_runs".to_string(),
            reason: "must keep at least the current run".to_string(),
        });
    }
}
