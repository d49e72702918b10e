// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Cython backend with `prange` parallel loops
//!
//! Cython infers reductions only from in-place `+=` and `*=` inside
//! `prange`, so min/max accumulations fall back to a serial loop.

use super::{BackendCapabilities, BackendType, CodegenBackend};
use crate::annotator::{ParallelDecision, Reduction, ReductionKind, Schedule};
use crate::classifier::ClassifiedStatements;
use crate::expr::{BinaryOp, ExprSyntax, Function, UnaryOp};
use crate::indexing::LoopPlan;
use crate::render::Substitutions;
use crate::types::{NumericType, VariableTable};

const TEMPLATE: &str = r#"# {{code_object_name}}
{{used_variables}}
def _run_{{code_object_name}}():
    cdef int _idx
    cdef int _vectorisation_idx
    cdef int {{counter}}
    {{declarations|autoindent}}
    # scalar code
    _vectorisation_idx = -1
    {{scalar_code|autoindent}}

    {{reduction_init|autoindent}}
    # vector code
    for {{counter}} in {{loop_range}}:
        _idx = {{index_expression}}
        _vectorisation_idx = _idx
        {{vector_code|autoindent}}
    {{reduction_finalize|autoindent}}
"#;

/// Python-flavoured operator spelling
#[derive(Debug, Clone, Copy, Default)]
pub struct CythonSyntax;

impl ExprSyntax for CythonSyntax {
    fn binary_op(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "and",
            BinaryOp::Or => "or",
        }
    }

    fn unary_op(&self, op: UnaryOp) -> &'static str {
        match op {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "not ",
        }
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "True"
        } else {
            "False"
        }
    }

    fn function_name(&self, function: Function) -> &'static str {
        match function {
            Function::Min => "fmin",
            Function::Max => "fmax",
            Function::Abs => "fabs",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Sqrt => "sqrt",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CythonBackend;

impl CythonBackend {
    pub fn new() -> Self {
        Self
    }
}

impl CodegenBackend for CythonBackend {
    fn backend_name(&self) -> &str {
        "cython"
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Cython
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            backend: self.backend_name().to_string(),
            parallel_loops: true,
            reductions: vec![ReductionKind::Sum, ReductionKind::Product],
        }
    }

    fn template(&self) -> &str {
        TEMPLATE
    }

    fn syntax(&self) -> &dyn ExprSyntax {
        &CythonSyntax
    }

    fn terminator(&self) -> &'static str {
        ""
    }

    fn comment_prefix(&self) -> &'static str {
        "#"
    }

    /// `prange` carries the parallel marking, so there is no separate pragma
    fn parallel_pragma(&self, _decision: &ParallelDecision) -> String {
        String::new()
    }

    fn local_definition(&self, _name: &str, _dtype: NumericType, _value: &str) -> Option<String> {
        None
    }

    fn declarations(
        &self,
        classified: &ClassifiedStatements,
        variables: &VariableTable,
        decision: &ParallelDecision,
    ) -> String {
        let mut lines = Vec::new();
        for name in classified.scalar_locals.iter().chain(&classified.vector_locals) {
            let defining = classified
                .scalar
                .iter()
                .chain(&classified.vector)
                .find(|s| s.statement.writes() == name);
            let dtype = defining
                .map(|s| super::local_type(&s.statement.expr, variables))
                .unwrap_or_default();
            lines.push(format!("cdef {} {}", dtype.cython_name(), name));
        }
        if decision.parallel {
            let mut seen: Vec<&str> = Vec::new();
            for reduction in &decision.reductions {
                if !seen.contains(&reduction.target.as_str()) {
                    seen.push(&reduction.target);
                    let dtype = variables
                        .get(&reduction.target)
                        .map(|v| v.dtype)
                        .unwrap_or_default();
                    lines.push(format!("cdef {} {}", dtype.cython_name(), reduction.accumulator()));
                }
            }
        }
        lines.join("\n")
    }

    fn accumulator_init(&self, reduction: &Reduction, _dtype: NumericType, current: &str) -> String {
        format!("{} = {}", reduction.accumulator(), current)
    }

    fn extra_substitutions(&self, plan: &LoopPlan, decision: &ParallelDecision, subs: &mut Substitutions) {
        let count = plan.iteration_count_expression();
        let range = if decision.parallel {
            let schedule = match decision.schedule {
                Schedule::Dynamic => "dynamic",
                Schedule::Static | Schedule::None => "static",
            };
            format!("prange({}, nogil=True, schedule='{}')", count, schedule)
        } else {
            format!("range({})", count)
        };
        subs.set("loop_range", range);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    #[test]
    fn test_cython_syntax() {
        let e = Expr::var("a").gt(Expr::num(0.0)).and(Expr::unary(UnaryOp::Not, Expr::Bool(false)));
        let text = e.render(&CythonSyntax, &mut |name: &str| name.to_string());
        assert_eq!(text, "((a > 0.0) and (not False))");
    }

    #[test]
    fn test_capabilities_exclude_min_max() {
        let caps = CythonBackend::new().capabilities();
        assert!(caps.parallel_loops);
        assert!(caps.supports(ReductionKind::Sum));
        assert!(!caps.supports(ReductionKind::Min));
    }

    #[test]
    fn test_loop_range() {
        let plan = crate::indexing::resolve(&crate::types::TargetingMode::index_array("_group_idx", 3)).unwrap();
        let mut decision = ParallelDecision {
            parallel: true,
            schedule: Schedule::Static,
            requires_reduction: false,
            reductions: vec![],
            hazards: vec![],
            reason: String::new(),
            fallback: None,
        };
        let mut subs = Substitutions::new();
        CythonBackend::new().extra_substitutions(&plan, &decision, &mut subs);
        assert_eq!(
            subs.get("loop_range"),
            Some("prange(_num_group_idx, nogil=True, schedule='static')")
        );

        decision.parallel = false;
        CythonBackend::new().extra_substitutions(&plan, &decision, &mut subs);
        assert_eq!(subs.get("loop_range"), Some("range(_num_group_idx)"));
    }
}
