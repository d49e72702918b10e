// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # vecgen - scalar/vector code generation
//!
//! Lowers per-element update rules of a simulated population (neurons,
//! synapses) into vectorised, optionally parallel loop code for C++/OpenMP
//! or Cython, and executes the same code objects in-process for testing.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! vecgen = "0.1"  # Default: codegen + reference runtime
//! ```
//!
//! ## Feature Flags
//! - **`runtime`** (default): reference executor (`vecgen::runtime`)
//!
//! ## Usage
//!
//! ```rust
//! use vecgen::prelude::*;
//!
//! let request = CodeObjectRequest {
//!     name: "neurongroup_group_variable_set".to_string(),
//!     statements: vec![Statement::assign("v", Expr::num(-70.0))],
//!     variables: VariableTable::new().with(Variable::array("v", NumericType::F64)),
//!     targeting: TargetingMode::group("_group_idx", vec![3, 1, 4]),
//! };
//!
//! let generator = CodeGenerator::from_settings(&CodegenSettings::default());
//! let code = generator.generate(&request)?;
//! assert!(code.source.contains("_group_idx[_idx_group_idx]"));
//!
//! let mut population = Population::new(5).with_filled("v", 0.0);
//! Executor::serial().execute(&code, &request.variables, &mut population)?;
//! assert_eq!(population.array("v")?, &[0.0, -70.0, 0.0, -70.0, -70.0]);
//! # Ok::<(), Box<dyn std::error::Error>>(())
//! ```
//!
//! ## Architecture
//!
//! - [`codegen`]: classifier, indexing resolver, vectorisation context,
//!   parallel-region annotator, backends and template renderer
//! - [`runtime`]: serial and rayon-parallel reference executor
//! - [`config`]: `vecgen_configuration.toml` with environment/CLI overrides
//! - [`observability`]: logging initialisation and per-crate debug flags
//! - [`settings`]: configuration → codegen/runtime/logging settings

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub use vecgen_codegen as codegen;
pub use vecgen_config as config;
pub use vecgen_observability as observability;
#[cfg(feature = "runtime")]
pub use vecgen_runtime as runtime;

pub mod settings;

/// Common imports
pub mod prelude {
    pub use vecgen_codegen::*;

    #[cfg(feature = "runtime")]
    pub use vecgen_runtime::{ExecutionError, ExecutionReport, Executor, ExecutorSettings, Population};
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_facade_imports() {
        use crate::prelude::*;
        let _plan = resolve(&TargetingMode::all(1)).unwrap();
        assert!(!crate::codegen::VERSION.is_empty());
    }
}
