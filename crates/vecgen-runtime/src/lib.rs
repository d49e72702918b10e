// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Vecgen Reference Runtime
//!
//! Executes generated code objects in-process, with the same scalar/vector
//! split, index mapping and parallel decision the rendered code carries:
//! - **Population**: scalar, per-element and index-array storage
//! - **Eval**: expression evaluation over `f64`
//! - **Executor**: serial or rayon-parallel loop execution with reductions

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod error;
pub mod eval;
pub mod executor;
pub mod population;

pub use error::{ExecutionError, ExecutionResult};
pub use eval::evaluate;
pub use executor::{ExecutionReport, Executor, ExecutorSettings};
pub use population::{checked_slot, Population};
