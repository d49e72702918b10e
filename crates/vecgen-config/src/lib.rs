// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Vecgen Configuration System
//!
//! Type-safe configuration loader for vecgen with support for:
//! - TOML file parsing (`vecgen_configuration.toml`)
//! - Environment variable overrides (`VECGEN_*`)
//! - CLI argument overrides
//!
//! ## Usage
//!
//! ```rust,no_run
//! use vecgen_config::{load_config, VecgenConfig};
//!
//! let config = load_config(None, None).expect("Failed to load config");
//! println!("Backend: {}", config.codegen.backend);
//! println!("OpenMP threads: {}", config.codegen.openmp_threads);
//! ```
//!
//! The configuration carries plain values only; consumers convert the
//! `[codegen]` and `[runtime]` sections into their own settings types.

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod loader;
pub mod types;
pub mod validation;

pub use loader::{apply_cli_overrides, apply_environment_overrides, find_config_file, load_config};
pub use types::*;
pub use validation::{validate_config, ConfigValidationError};

/// Configuration error types
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Config file not found. Searched: {0}")]
    FileNotFound(String),

    #[error("Failed to read config file: {0}")]
    IoError(#[from] std::io::Error),

    #[error("Invalid TOML syntax: {0}")]
    ParseError(String),

    #[error("Validation failed: {0}")]
    ValidationError(String),

    #[error("Invalid configuration value: {0}")]
    InvalidValue(String),
}

impl From<toml::de::Error> for ConfigError {
    fn from(err: toml::de::Error) -> Self {
        ConfigError::ParseError(err.to_string())
    }
}

/// Result type for configuration operations
pub type ConfigResult<T> = Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_error_conversion() {
        let err: ConfigError = toml::from_str::<VecgenConfig>("[codegen\n").unwrap_err().into();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }
}
