// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Vecgen Code Generation Core
//!
//! Lowers per-element update rules into vectorised, optionally parallel
//! loop code:
//! - **Classifier**: scalar (once per call) vs vector (once per element)
//! - **Indexing**: loop counter → absolute element index (direct, offset,
//!   or through a group-index array)
//! - **Context**: the single live vectorisation index
//! - **Annotator**: parallel-region safety, reductions, schedule
//! - **Backends**: C++/OpenMP and Cython/prange spelling
//! - **Render**: named-placeholder template substitution
//!
//! ## Example
//! ```
//! use vecgen_codegen::*;
//!
//! let request = CodeObjectRequest {
//!     name: "reset".to_string(),
//!     statements: vec![
//!         Statement::assign("x", Expr::num(2.0)),
//!         Statement::assign("v", Expr::var("v") + Expr::var("x")),
//!     ],
//!     variables: VariableTable::new()
//!         .with(Variable::scalar("x", NumericType::F64))
//!         .with(Variable::array("v", NumericType::F64)),
//!     targeting: TargetingMode::all(5),
//! };
//! let code = generate(&request, BackendType::Cpp).unwrap();
//! assert!(code.decision.parallel);
//! assert!(code.source.contains("#pragma omp parallel for schedule(static)"));
//! ```

/// Crate version from Cargo.toml
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

pub mod annotator;
pub mod backend;
pub mod classifier;
pub mod context;
pub mod expr;
pub mod generator;
pub mod indexing;
pub mod render;
pub mod types;

pub use annotator::{
    decide, detect_reduction, finalize_for_backend, Hazard, ParallelDecision, ParallelPolicy,
    Reduction, ReductionKind, Schedule,
};
pub use backend::{
    create_backend, BackendCapabilities, BackendType, CodegenBackend, CppBackend, CythonBackend,
};
pub use classifier::{classify, ClassifiedStatements};
pub use context::{element_contexts, VectorisationContext, SCALAR_SENTINEL, VECTORISATION_IDX};
pub use expr::{BinaryOp, Expr, ExprSyntax, Function, NeutralSyntax, UnaryOp};
pub use generator::{generate, CodeGenerator, CodeObjectRequest, CodegenSettings, GeneratedCode};
pub use indexing::{resolve, IndexExpression, LoopPlan};
pub use render::{render_template, Substitutions};
pub use types::*;
