// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Configuration file loading with override support
//!
//! Three tiers, later ones winning:
//! 1. TOML file (base defaults)
//! 2. Environment variables (runtime overrides)
//! 3. CLI arguments (explicit user overrides)

use crate::{ConfigError, ConfigResult, VecgenConfig};
use std::collections::HashMap;
use std::env;
use std::fs;
use std::path::{Path, PathBuf};

/// Default configuration file name
pub const CONFIG_FILE_NAME: &str = "vecgen_configuration.toml";

/// Environment variable naming an explicit configuration file
pub const CONFIG_PATH_ENV: &str = "VECGEN_CONFIG_PATH";

/// Find the vecgen configuration file
///
/// Search order:
/// 1. `VECGEN_CONFIG_PATH` environment variable
/// 2. Current working directory
/// 3. Up to 5 parent directories
///
/// # Errors
///
/// Returns `ConfigError::FileNotFound` if no config file is found in any location
pub fn find_config_file() -> ConfigResult<PathBuf> {
    if let Ok(env_path) = env::var(CONFIG_PATH_ENV) {
        let path = PathBuf::from(env_path);
        if path.exists() {
            return Ok(path);
        }
        return Err(ConfigError::FileNotFound(format!(
            "Config file specified by {} not found: {}",
            CONFIG_PATH_ENV,
            path.display()
        )));
    }

    let mut search_paths = Vec::new();
    if let Ok(cwd) = env::current_dir() {
        search_paths.push(cwd.join(CONFIG_FILE_NAME));
        let mut current = cwd.as_path();
        for _ in 0..5 {
            match current.parent() {
                Some(parent) => {
                    search_paths.push(parent.join(CONFIG_FILE_NAME));
                    current = parent;
                }
                None => break,
            }
        }
    }

    if let Some(found) = search_paths.iter().find(|p| p.exists()) {
        return Ok(found.clone());
    }

    let search_list = search_paths
        .iter()
        .map(|p| format!("  - {}", p.display()))
        .collect::<Vec<_>>()
        .join("\n");

    Err(ConfigError::FileNotFound(format!(
        "vecgen configuration file '{}' not found in any of these locations:\n{}\n\nSet {} to specify a custom location.",
        CONFIG_FILE_NAME, search_list, CONFIG_PATH_ENV
    )))
}

/// Load configuration from TOML file
///
/// # Arguments
///
/// * `config_path` - Optional path to config file. If `None`, the file is searched for.
/// * `cli_args` - Optional CLI argument overrides
///
/// # Errors
///
/// Returns error if the file is not found, contains invalid TOML, or an
/// override carries an unparsable value
pub fn load_config(
    config_path: Option<&Path>,
    cli_args: Option<&HashMap<String, String>>,
) -> ConfigResult<VecgenConfig> {
    let config_file = match config_path {
        Some(path) => path.to_path_buf(),
        None => find_config_file()?,
    };

    let content = fs::read_to_string(&config_file)?;
    let mut config: VecgenConfig = toml::from_str(&content)?;

    apply_environment_overrides(&mut config)?;
    if let Some(cli) = cli_args {
        apply_cli_overrides(&mut config, cli)?;
    }

    Ok(config)
}

fn parse_flag(value: &str) -> bool {
    matches!(value.to_lowercase().as_str(), "true" | "1" | "yes" | "on")
}

fn parse_count(key: &str, value: &str) -> ConfigResult<usize> {
    value
        .parse::<usize>()
        .map_err(|_| ConfigError::InvalidValue(format!("{} = '{}' is not a count", key, value)))
}

/// Apply one named override; unknown names are ignored
fn apply_override(config: &mut VecgenConfig, key: &str, value: &str) -> ConfigResult<()> {
    match key {
        "backend" => config.codegen.backend = value.to_string(),
        "openmp_threads" => config.codegen.openmp_threads = parse_count(key, value)?,
        "min_parallel_iterations" => {
            config.codegen.min_parallel_iterations = parse_count(key, value)?
        }
        "schedule" => config.codegen.schedule = value.to_string(),
        "debug_bounds_check" => config.codegen.debug_bounds_check = parse_flag(value),
        "runtime_threads" => config.runtime.num_threads = parse_count(key, value)?,
        "parallel" => config.runtime.parallel = parse_flag(value),
        "log_level" => config.logging.level = value.to_string(),
        "file_logging" => config.logging.file_logging = parse_flag(value),
        "log_dir" => config.logging.log_dir = PathBuf::from(value),
        _ => {}
    }
    Ok(())
}

/// Override keys shared by the environment (`VECGEN_<KEY>`) and the CLI
const OVERRIDE_KEYS: &[&str] = &[
    "backend",
    "openmp_threads",
    "min_parallel_iterations",
    "schedule",
    "debug_bounds_check",
    "runtime_threads",
    "parallel",
    "log_level",
    "file_logging",
    "log_dir",
];

/// Apply environment variable overrides to configuration
///
/// Supported environment variables:
/// - `VECGEN_BACKEND` -> `codegen.backend`
/// - `VECGEN_OPENMP_THREADS` -> `codegen.openmp_threads`
/// - `VECGEN_MIN_PARALLEL_ITERATIONS` -> `codegen.min_parallel_iterations`
/// - `VECGEN_SCHEDULE` -> `codegen.schedule`
/// - `VECGEN_DEBUG_BOUNDS_CHECK` -> `codegen.debug_bounds_check`
/// - `VECGEN_RUNTIME_THREADS` -> `runtime.num_threads`
/// - `VECGEN_PARALLEL` -> `runtime.parallel`
/// - `VECGEN_LOG_LEVEL` -> `logging.level`
/// - `VECGEN_FILE_LOGGING` -> `logging.file_logging`
/// - `VECGEN_LOG_DIR` -> `logging.log_dir`
pub fn apply_environment_overrides(config: &mut VecgenConfig) -> ConfigResult<()> {
    for key in OVERRIDE_KEYS {
        let var = format!("VECGEN_{}", key.to_uppercase());
        if let Ok(value) = env::var(&var) {
            apply_override(config, key, &value)?;
        }
    }
    Ok(())
}

/// Apply CLI argument overrides to configuration
///
/// # Arguments
///
/// * `config` - Configuration to modify
/// * `cli_args` - Map of CLI arguments (e.g., `{"backend": "cython", "openmp_threads": "4"}`)
pub fn apply_cli_overrides(
    config: &mut VecgenConfig,
    cli_args: &HashMap<String, String>,
) -> ConfigResult<()> {
    for key in OVERRIDE_KEYS {
        if let Some(value) = cli_args.get(*key) {
            apply_override(config, key, value)?;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs::File;
    use std::io::Write;
    use std::sync::Mutex;
    use tempfile::tempdir;

    static ENV_LOCK: Mutex<()> = Mutex::new(());

    #[test]
    fn test_find_config_file_env_var() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join("custom_config.toml");
        File::create(&config_path).unwrap();

        env::set_var(CONFIG_PATH_ENV, config_path.to_str().unwrap());
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV);

        assert_eq!(result.unwrap(), config_path);
    }

    #[test]
    fn test_find_config_file_env_var_missing() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        env::set_var(CONFIG_PATH_ENV, "/nonexistent/vecgen_configuration.toml");
        let result = find_config_file();
        env::remove_var(CONFIG_PATH_ENV);

        assert!(matches!(result, Err(ConfigError::FileNotFound(_))));
    }

    #[test]
    fn test_load_minimal_config() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[codegen]").unwrap();
        writeln!(file, "openmp_threads = 8").unwrap();
        writeln!(file, "[runtime]").unwrap();
        writeln!(file, "parallel = false").unwrap();

        let config = load_config(Some(&config_path), None).unwrap();

        assert_eq!(config.codegen.openmp_threads, 8);
        assert!(!config.runtime.parallel);
        assert_eq!(config.codegen.backend, "cpp");
    }

    #[test]
    fn test_environment_overrides() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let mut config = VecgenConfig::default();

        env::set_var("VECGEN_BACKEND", "cython");
        env::set_var("VECGEN_OPENMP_THREADS", "6");
        env::set_var("VECGEN_DEBUG_BOUNDS_CHECK", "yes");

        let result = apply_environment_overrides(&mut config);

        env::remove_var("VECGEN_BACKEND");
        env::remove_var("VECGEN_OPENMP_THREADS");
        env::remove_var("VECGEN_DEBUG_BOUNDS_CHECK");

        assert!(result.is_ok());
        assert_eq!(config.codegen.backend, "cython");
        assert_eq!(config.codegen.openmp_threads, 6);
        assert!(config.codegen.debug_bounds_check);
    }

    #[test]
    fn test_unparsable_override_rejected() {
        let mut config = VecgenConfig::default();
        let mut cli_args = HashMap::new();
        cli_args.insert("openmp_threads".to_string(), "many".to_string());

        let err = apply_cli_overrides(&mut config, &cli_args).unwrap_err();
        assert!(err.to_string().contains("openmp_threads"));
    }

    #[test]
    fn test_override_precedence() {
        let _env_lock = ENV_LOCK.lock().unwrap();
        let dir = tempdir().unwrap();
        let config_path = dir.path().join(CONFIG_FILE_NAME);

        let mut file = File::create(&config_path).unwrap();
        writeln!(file, "[codegen]").unwrap();
        writeln!(file, "schedule = \"dynamic\"").unwrap();
        writeln!(file, "min_parallel_iterations = 64").unwrap();

        env::set_var("VECGEN_SCHEDULE", "none");
        env::set_var("VECGEN_MIN_PARALLEL_ITERATIONS", "16");

        let mut cli_args = HashMap::new();
        cli_args.insert("schedule".to_string(), "static".to_string());

        let config = load_config(Some(&config_path), Some(&cli_args));

        env::remove_var("VECGEN_SCHEDULE");
        env::remove_var("VECGEN_MIN_PARALLEL_ITERATIONS");

        let config = config.unwrap();
        // CLI wins for schedule, env wins for the threshold (no CLI override)
        assert_eq!(config.codegen.schedule, "static");
        assert_eq!(config.codegen.min_parallel_iterations, 16);
    }
}
