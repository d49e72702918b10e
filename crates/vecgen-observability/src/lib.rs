// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # vecgen-observability
//!
//! Logging infrastructure shared by the vecgen crates and tools:
//! - console logging through `tracing-subscriber` with an `EnvFilter`
//! - optional JSON file logs in timestamped run folders with retention
//! - per-crate debug flags (`--debug-vecgen-codegen`, `--debug-all`, `VECGEN_DEBUG`)

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod cli;
pub mod config;
pub mod init;

pub use cli::*;
pub use config::*;
pub use init::*;

/// Known vecgen crate names for debug flags
pub const KNOWN_CRATES: &[&str] = &[
    "vecgen",
    "vecgen-codegen",
    "vecgen-runtime",
    "vecgen-config",
    "vecgen-observability",
];
