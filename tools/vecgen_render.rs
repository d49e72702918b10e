// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

/*!
Code Object Render Tool

Renders a code-object request (JSON) into backend source text, and optionally
executes it against a population (JSON) with the reference runtime.

Usage:
  cargo run --bin vecgen-render -- --request reset.json
  cargo run --bin vecgen-render -- --request reset.json --backend cython
  cargo run --bin vecgen-render -- --request reset.json --execute pop.json --output json

Configuration comes from `vecgen_configuration.toml` (if found), then
`VECGEN_*` environment variables, then the flags below.
*/

use anyhow::{Context, Result};
use clap::{Parser, ValueEnum};
use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;
use tracing::{debug, info};

use vecgen::config::{load_config, validate_config, VecgenConfig};
use vecgen::observability::{init_logging, CrateDebugFlags, DEBUG_ENV};
use vecgen::prelude::*;
use vecgen::settings::{codegen_settings, executor_settings, logging_options};

#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
enum OutputFormat {
    /// Rendered source text only
    Source,
    /// Full generation result (and execution report) as JSON
    Json,
}

#[derive(Parser, Debug)]
#[command(name = "vecgen-render", version, author, long_about = None)]
struct Args {
    /// Code-object request (JSON)
    #[arg(short, long)]
    request: PathBuf,

    /// Execute the code object against this population (JSON)
    #[arg(short = 'x', long = "execute", value_name = "POPULATION")]
    population: Option<PathBuf>,

    /// Configuration file (default: search for vecgen_configuration.toml)
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Target backend (cpp, cython)
    #[arg(short, long)]
    backend: Option<String>,

    /// OpenMP threads (0 disables parallel pragmas)
    #[arg(long)]
    openmp_threads: Option<usize>,

    /// Loop schedule (static, dynamic, none)
    #[arg(long)]
    schedule: Option<String>,

    /// Emit index bounds assertions in indirect loops
    #[arg(long, default_value_t = false)]
    bounds_check: bool,

    /// Output format
    #[arg(short, long, value_enum, default_value_t = OutputFormat::Source)]
    output: OutputFormat,

    /// Enable debug logging for a crate (repeatable, or "all")
    #[arg(long = "debug")]
    debug: Vec<String>,
}

impl Args {
    fn cli_overrides(&self) -> HashMap<String, String> {
        let mut overrides = HashMap::new();
        if let Some(backend) = &self.backend {
            overrides.insert("backend".to_string(), backend.clone());
        }
        if let Some(threads) = self.openmp_threads {
            overrides.insert("openmp_threads".to_string(), threads.to_string());
        }
        if let Some(schedule) = &self.schedule {
            overrides.insert("schedule".to_string(), schedule.clone());
        }
        if self.bounds_check {
            overrides.insert("debug_bounds_check".to_string(), "true".to_string());
        }
        overrides
    }

    fn debug_flags(&self) -> CrateDebugFlags {
        let mut flags = CrateDebugFlags::default();
        for name in &self.debug {
            flags.merge_env_value(name);
        }
        if let Ok(value) = std::env::var(DEBUG_ENV) {
            flags.merge_env_value(&value);
        }
        flags
    }
}

fn load(args: &Args) -> Result<VecgenConfig> {
    let overrides = args.cli_overrides();
    let config = match load_config(args.config.as_deref(), Some(&overrides)) {
        Ok(config) => config,
        // No file anywhere: defaults, still overridable
        Err(vecgen::config::ConfigError::FileNotFound(_)) if args.config.is_none() => {
            let mut config = VecgenConfig::default();
            vecgen::config::apply_environment_overrides(&mut config)?;
            vecgen::config::apply_cli_overrides(&mut config, &overrides)?;
            config
        }
        Err(e) => return Err(e.into()),
    };
    validate_config(&config)?;
    Ok(config)
}

fn main() -> Result<()> {
    let args = Args::parse();
    let config = load(&args)?;
    let _logging = init_logging(&args.debug_flags(), &logging_options(&config.logging))?;

    let request_text = fs::read_to_string(&args.request)
        .with_context(|| format!("Failed to read request {}", args.request.display()))?;
    let request: CodeObjectRequest = serde_json::from_str(&request_text)
        .with_context(|| format!("Invalid request JSON in {}", args.request.display()))?;

    let settings = codegen_settings(&config)?;
    debug!("Codegen settings: {:?}", settings);
    let generator = CodeGenerator::from_settings(&settings);
    let code = generator.generate(&request)?;

    let report = match &args.population {
        Some(path) => {
            let text = fs::read_to_string(path)
                .with_context(|| format!("Failed to read population {}", path.display()))?;
            let mut population: Population = serde_json::from_str(&text)
                .with_context(|| format!("Invalid population JSON in {}", path.display()))?;
            let executor = Executor::new(&executor_settings(&config))?;
            let report = executor.execute(&code, &request.variables, &mut population)?;
            info!(
                "Executed '{}': {} iterations (parallel={})",
                code.name, report.iterations, report.parallel
            );
            Some((report, population))
        }
        None => None,
    };

    match args.output {
        OutputFormat::Source => {
            print!("{}", code.source);
            if let Some((_, population)) = &report {
                println!("{}", serde_json::to_string_pretty(population)?);
            }
        }
        OutputFormat::Json => {
            let output = serde_json::json!({
                "code": &code,
                "report": report.as_ref().map(|(r, _)| r),
                "population": report.as_ref().map(|(_, p)| p),
            });
            println!("{}", serde_json::to_string_pretty(&output)?);
        }
    }

    Ok(())
}
