// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration type definitions
//!
//! Each struct maps to a section of `vecgen_configuration.toml`. Missing
//! sections and keys fall back to their defaults.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Root configuration structure
#[derive(Debug, Clone, Default, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct VecgenConfig {
    pub codegen: CodegenConfig,
    pub runtime: RuntimeConfig,
    pub logging: LoggingConfig,
}

/// Code generation settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct CodegenConfig {
    /// Target backend: "cpp" or "cython"
    pub backend: String,
    /// OpenMP threads; 0 disables parallel pragmas
    pub openmp_threads: usize,
    /// Statically known loops shorter than this stay serial
    pub min_parallel_iterations: usize,
    /// "static", "dynamic" or "none"
    pub schedule: String,
    /// Emit an index bounds assertion in indirect loops
    pub debug_bounds_check: bool,
}

impl Default for CodegenConfig {
    fn default() -> Self {
        Self {
            backend: "cpp".to_string(),
            openmp_threads: 1,
            min_parallel_iterations: 2,
            schedule: "static".to_string(),
            debug_bounds_check: false,
        }
    }
}

/// Reference runtime settings
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct RuntimeConfig {
    /// Worker threads; 0 = rayon default
    pub num_threads: usize,
    pub parallel: bool,
}

impl Default for RuntimeConfig {
    fn default() -> Self {
        Self {
            num_threads: 0,
            parallel: true,
        }
    }
}

/// Logging configuration
#[derive(Debug, Clone, PartialEq, Deserialize, Serialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Console filter level (trace, debug, info, warn, error)
    pub level: String,
    /// Also write JSON logs under `log_dir`
    pub file_logging: bool,
    pub log_dir: PathBuf,
    pub retention_days: u64,
    /// Number of run folders kept regardless of age
    pub retention_runs: usize,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            file_logging: false,
            log_dir: PathBuf::from("./logs"),
            retention_days: 7,
            retention_runs: 10,
        }
    }
}
