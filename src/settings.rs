// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Conversion of loaded configuration into component settings
//!
//! The component crates do not depend on `vecgen-config`; this module is the
//! bridge.

use std::str::FromStr;

use vecgen_codegen::{BackendType, CodegenSettings, Schedule};
use vecgen_config::{ConfigError, ConfigResult, LoggingConfig, VecgenConfig};
use vecgen_observability::LoggingOptions;
#[cfg(feature = "runtime")]
use vecgen_runtime::ExecutorSettings;

/// `[codegen]` section as generator settings
///
/// # Errors
///
/// `ConfigError::InvalidValue` for an unknown backend or schedule name.
pub fn codegen_settings(config: &VecgenConfig) -> ConfigResult<CodegenSettings> {
    let codegen = &config.codegen;
    let backend = BackendType::from_str(&codegen.backend)
        .map_err(|e| ConfigError::InvalidValue(format!("codegen.backend: {}", e)))?;
    let schedule = Schedule::from_str(&codegen.schedule)
        .map_err(|e| ConfigError::InvalidValue(format!("codegen.schedule: {}", e)))?;

    Ok(CodegenSettings {
        backend,
        openmp_threads: codegen.openmp_threads,
        min_parallel_iterations: codegen.min_parallel_iterations,
        schedule,
        debug_bounds_check: codegen.debug_bounds_check,
    })
}

/// `[runtime]` section as executor settings
#[cfg(feature = "runtime")]
pub fn executor_settings(config: &VecgenConfig) -> ExecutorSettings {
    ExecutorSettings {
        num_threads: config.runtime.num_threads,
        parallel: config.runtime.parallel,
    }
}

/// `[logging]` section as logging options
pub fn logging_options(logging: &LoggingConfig) -> LoggingOptions {
    LoggingOptions {
        level: logging.level.to_lowercase(),
        file_logging: logging.file_logging,
        log_dir: logging.log_dir.clone(),
        retention_days: logging.retention_days,
        retention_runs: logging.retention_runs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_converts() {
        let config = VecgenConfig::default();
        let settings = codegen_settings(&config).unwrap();
        assert_eq!(settings, CodegenSettings::default());
        assert_eq!(logging_options(&config.logging), LoggingOptions::default());
    }

    #[test]
    fn test_named_values() {
        let mut config = VecgenConfig::default();
        config.codegen.backend = "cython".to_string();
        config.codegen.schedule = "serial".to_string();
        config.codegen.openmp_threads = 0;

        let settings = codegen_settings(&config).unwrap();
        assert_eq!(settings.backend, BackendType::Cython);
        assert_eq!(settings.schedule, Schedule::None);
        assert_eq!(settings.openmp_threads, 0);
    }

    #[test]
    fn test_unknown_names_rejected() {
        let mut config = VecgenConfig::default();
        config.codegen.backend = "fortran".to_string();
        let err = codegen_settings(&config).unwrap_err();
        assert!(err.to_string().contains("codegen.backend"));

        let mut config = VecgenConfig::default();
        config.codegen.schedule = "guided".to_string();
        assert!(codegen_settings(&config).is_err());
    }
}
