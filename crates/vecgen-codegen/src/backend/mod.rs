// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Code Generation Backends
//!
//! A backend knows one target language: its expression syntax, how variables
//! are addressed, how a loop is marked parallel and which reductions it can
//! express. Classification, indexing and the parallel decision are shared;
//! backends only spell the result.

mod cpp;
mod cython;

pub use cpp::CppBackend;
pub use cython::CythonBackend;

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::annotator::{ParallelDecision, Reduction, ReductionKind};
use crate::classifier::ClassifiedStatements;
use crate::context::{VectorisationContext, VECTORISATION_IDX};
use crate::expr::{BinaryOp, Expr, ExprSyntax, UnaryOp};
use crate::indexing::LoopPlan;
use crate::render::Substitutions;
use crate::types::*;

/// What a backend can express in generated code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BackendCapabilities {
    pub backend: String,
    /// Whether the backend can mark a loop parallel at all
    pub parallel_loops: bool,
    /// Reduction kinds a parallel loop may carry
    pub reductions: Vec<ReductionKind>,
}

impl BackendCapabilities {
    pub fn supports(&self, kind: ReductionKind) -> bool {
        self.reductions.contains(&kind)
    }
}

/// Which part of the code object a statement is rendered into
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Block {
    /// Once per call, before the loop
    Scalar,
    /// Once per targeted element
    Vector,
}

/// Target-language code generator
pub trait CodegenBackend: Send + Sync {
    /// Backend name for logging and capability messages
    fn backend_name(&self) -> &str;

    fn backend_type(&self) -> BackendType;

    fn capabilities(&self) -> BackendCapabilities;

    /// Code-object template with `{{placeholder}}` substitution points
    fn template(&self) -> &str;

    fn syntax(&self) -> &dyn ExprSyntax;

    /// Statement terminator (`;` for C-family targets)
    fn terminator(&self) -> &'static str;

    /// Line comment prefix
    fn comment_prefix(&self) -> &'static str;

    /// Pragma line placed directly above the loop, empty when none
    fn parallel_pragma(&self, decision: &ParallelDecision) -> String;

    /// Debug check of the absolute index against `size`, empty when disabled
    fn bounds_check(&self, _plan: &LoopPlan, _size: &str) -> String {
        String::new()
    }

    /// First assignment of a local temporary
    ///
    /// Returns `None` when locals are declared up front instead (see
    /// [`Self::declarations`]).
    fn local_definition(&self, name: &str, dtype: NumericType, value: &str) -> Option<String>;

    /// Up-front declarations of locals and accumulators, empty when none
    fn declarations(
        &self,
        _classified: &ClassifiedStatements,
        _variables: &VariableTable,
        _decision: &ParallelDecision,
    ) -> String {
        String::new()
    }

    /// Declaration-and-initialisation of a private reduction accumulator
    /// holding values of the target's `dtype`
    fn accumulator_init(&self, reduction: &Reduction, dtype: NumericType, current: &str)
        -> String;

    /// Combine one contribution into an accumulator
    fn accumulator_update(&self, reduction: &Reduction, operand: &str) -> String {
        let acc = reduction.accumulator();
        match reduction.kind {
            ReductionKind::Sum => format!("{} += {}{}", acc, operand, self.terminator()),
            ReductionKind::Product => format!("{} *= {}{}", acc, operand, self.terminator()),
            ReductionKind::Min => format!("{} = fmin({}, {}){}", acc, acc, operand, self.terminator()),
            ReductionKind::Max => format!("{} = fmax({}, {}){}", acc, acc, operand, self.terminator()),
        }
    }

    /// Array element access
    fn array_access(&self, storage: &str, index: &str) -> String {
        format!("_ptr_array_{}[{}]", storage, index)
    }

    /// Backend-specific placeholders beyond the shared set
    fn extra_substitutions(
        &self,
        _plan: &LoopPlan,
        _decision: &ParallelDecision,
        _subs: &mut Substitutions,
    ) {
    }
}

/// Backend selector
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BackendType {
    /// C++ standalone with OpenMP pragmas
    #[default]
    Cpp,
    /// Cython with `prange`
    Cython,
}

impl fmt::Display for BackendType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BackendType::Cpp => write!(f, "cpp"),
            BackendType::Cython => write!(f, "cython"),
        }
    }
}

impl FromStr for BackendType {
    type Err = CodegenError;

    fn from_str(s: &str) -> CodegenResult<Self> {
        match s.to_lowercase().as_str() {
            "cpp" | "c++" | "cpp_standalone" => Ok(BackendType::Cpp),
            "cython" => Ok(BackendType::Cython),
            _ => Err(CodegenError::UnknownBackend(s.to_string())),
        }
    }
}

/// Construct a backend
///
/// `openmp_threads == 0` yields a C++ backend without parallel loops.
pub fn create_backend(
    backend_type: BackendType,
    openmp_threads: usize,
    debug_bounds_check: bool,
) -> Box<dyn CodegenBackend> {
    match backend_type {
        BackendType::Cpp => Box::new(CppBackend::new(openmp_threads, debug_bounds_check)),
        BackendType::Cython => Box::new(CythonBackend::new()),
    }
}

/// Spelling of `name` in `block`
fn variable_text(
    backend: &dyn CodegenBackend,
    name: &str,
    block: Block,
    variables: &VariableTable,
    decision: &ParallelDecision,
) -> CodegenResult<String> {
    let Some(var) = variables.get(name) else {
        // local temporary
        return Ok(name.to_string());
    };

    if block == Block::Scalar {
        VectorisationContext::scalar().check_access(var)?;
    }

    if var.is_scalar() {
        if block == Block::Vector && decision.accumulates(name) {
            if let Some(reduction) = decision.reduction_for(name) {
                return Ok(reduction.accumulator());
            }
        }
        return Ok(backend.array_access(var.storage_name(), "0"));
    }

    let index = match var.foreign_index() {
        Some(foreign) => backend.array_access(foreign, VECTORISATION_IDX),
        None => VECTORISATION_IDX.to_string(),
    };
    Ok(backend.array_access(var.storage_name(), &index))
}

fn render_expr(
    backend: &dyn CodegenBackend,
    expr: &Expr,
    block: Block,
    variables: &VariableTable,
    decision: &ParallelDecision,
) -> CodegenResult<String> {
    // Resolve every identifier first so access errors surface before rendering
    let mut resolved = Vec::new();
    for name in expr.identifiers() {
        let text = variable_text(backend, &name, block, variables, decision)?;
        resolved.push((name, text));
    }
    Ok(expr.render(backend.syntax(), &mut |name: &str| {
        resolved
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, text)| text.clone())
            .unwrap_or_else(|| name.to_string())
    }))
}

/// Infer the numeric type of a local temporary from its defining expression
pub fn local_type(expr: &Expr, variables: &VariableTable) -> NumericType {
    match expr {
        Expr::Bool(_) => NumericType::Bool,
        Expr::Unary {
            op: UnaryOp::Not, ..
        } => NumericType::Bool,
        Expr::Binary { op, .. } => match op {
            BinaryOp::Lt
            | BinaryOp::Le
            | BinaryOp::Gt
            | BinaryOp::Ge
            | BinaryOp::Eq
            | BinaryOp::Ne
            | BinaryOp::And
            | BinaryOp::Or => NumericType::Bool,
            _ => NumericType::F64,
        },
        Expr::Variable(name) => variables
            .get(name)
            .map(|v| v.dtype)
            .unwrap_or(NumericType::F64),
        _ => NumericType::F64,
    }
}

/// Render the statements of one block, one line per statement
pub fn render_block(
    backend: &dyn CodegenBackend,
    statements: &[IndexedStatement],
    block: Block,
    variables: &VariableTable,
    decision: &ParallelDecision,
) -> CodegenResult<String> {
    let mut lines = Vec::with_capacity(statements.len());
    let mut defined: Vec<&str> = Vec::new();
    let term = backend.terminator();

    for indexed in statements {
        let stmt = &indexed.statement;
        let target = stmt.writes();

        if block == Block::Vector && decision.accumulates(target) {
            if let Some(reduction) = decision.reduction_for(target) {
                let operand = render_expr(backend, &reduction.operand, block, variables, decision)?;
                lines.push(backend.accumulator_update(reduction, &operand));
                continue;
            }
        }

        let lhs = variable_text(backend, target, block, variables, decision)?;
        let rhs = render_expr(backend, &stmt.expr, block, variables, decision)?;

        let is_new_local = !variables.contains(target) && !defined.contains(&target);
        if is_new_local {
            defined.push(target);
            if stmt.op == AssignOp::Assign {
                let dtype = local_type(&stmt.expr, variables);
                if let Some(line) = backend.local_definition(target, dtype, &rhs) {
                    lines.push(line);
                    continue;
                }
            }
        }

        lines.push(format!("{} {} {}{}", lhs, stmt.op.symbol(), rhs, term));
    }

    Ok(lines.join("\n"))
}

/// Accumulator set-up lines emitted before a parallel loop
pub fn reduction_init(
    backend: &dyn CodegenBackend,
    variables: &VariableTable,
    decision: &ParallelDecision,
) -> String {
    if !decision.parallel {
        return String::new();
    }
    let mut seen: Vec<&str> = Vec::new();
    let mut lines = Vec::new();
    for reduction in &decision.reductions {
        if seen.contains(&reduction.target.as_str()) {
            continue;
        }
        seen.push(&reduction.target);
        let target = variables.get(&reduction.target);
        let storage = target
            .map(|v| v.storage_name().to_string())
            .unwrap_or_else(|| reduction.target.clone());
        let dtype = target.map(|v| v.dtype).unwrap_or_default();
        let current = backend.array_access(&storage, "0");
        lines.push(backend.accumulator_init(reduction, dtype, &current));
    }
    lines.join("\n")
}

/// Accumulator write-back lines emitted after a parallel loop
pub fn reduction_finalize(
    backend: &dyn CodegenBackend,
    variables: &VariableTable,
    decision: &ParallelDecision,
) -> String {
    if !decision.parallel {
        return String::new();
    }
    let mut seen: Vec<&str> = Vec::new();
    let mut lines = Vec::new();
    for reduction in &decision.reductions {
        if seen.contains(&reduction.target.as_str()) {
            continue;
        }
        seen.push(&reduction.target);
        let storage = variables
            .get(&reduction.target)
            .map(|v| v.storage_name().to_string())
            .unwrap_or_else(|| reduction.target.clone());
        lines.push(format!(
            "{} = {}{}",
            backend.array_access(&storage, "0"),
            reduction.accumulator(),
            backend.terminator()
        ));
    }
    lines.join("\n")
}

/// `USES_VARIABLES { ... }` marker line
pub fn used_variables_line(backend: &dyn CodegenBackend, used: &[String]) -> String {
    format!(
        "{} USES_VARIABLES {{ {} }}",
        backend.comment_prefix(),
        used.join(", ")
    )
}
