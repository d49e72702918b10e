// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! C++ standalone backend with OpenMP parallel loops

use super::{BackendCapabilities, BackendType, CodegenBackend};
use crate::annotator::{ParallelDecision, Reduction, ReductionKind, Schedule};
use crate::context::ABSOLUTE_IDX;
use crate::expr::{ExprSyntax, NeutralSyntax};
use crate::indexing::LoopPlan;
use crate::types::NumericType;

const TEMPLATE: &str = r#"////// {{code_object_name}} //////
{{used_variables}}
void _run_{{code_object_name}}()
{
    //// MAIN CODE ////////////
    // scalar code
    const int _vectorisation_idx = -1;
    {{scalar_code|autoindent}}

    {{reduction_init|autoindent}}
    {{parallel_pragma}}
    for(int {{counter}}=0; {{counter}}<{{iteration_count}}; {{counter}}++)
    {
        // vector code
        const int _idx = {{index_expression}};
        {{bounds_check}}
        const int _vectorisation_idx = _idx;
        {{vector_code|autoindent}}
    }
    {{reduction_finalize|autoindent}}
}
"#;

/// C++ code generator
///
/// Emits `#pragma omp parallel for` over the vector loop when the decision
/// allows it; all four reduction kinds map onto OpenMP reduction clauses.
#[derive(Debug, Clone)]
pub struct CppBackend {
    openmp_threads: usize,
    debug_bounds_check: bool,
}

impl CppBackend {
    pub fn new(openmp_threads: usize, debug_bounds_check: bool) -> Self {
        Self {
            openmp_threads,
            debug_bounds_check,
        }
    }

    fn reduction_clause(reduction: &Reduction) -> String {
        let op = match reduction.kind {
            ReductionKind::Sum => "+",
            ReductionKind::Product => "*",
            ReductionKind::Min => "min",
            ReductionKind::Max => "max",
        };
        format!(" reduction({}:{})", op, reduction.accumulator())
    }
}

impl Default for CppBackend {
    fn default() -> Self {
        Self::new(1, false)
    }
}

impl CodegenBackend for CppBackend {
    fn backend_name(&self) -> &str {
        "cpp_standalone"
    }

    fn backend_type(&self) -> BackendType {
        BackendType::Cpp
    }

    fn capabilities(&self) -> BackendCapabilities {
        BackendCapabilities {
            backend: self.backend_name().to_string(),
            parallel_loops: self.openmp_threads > 0,
            reductions: vec![
                ReductionKind::Sum,
                ReductionKind::Product,
                ReductionKind::Min,
                ReductionKind::Max,
            ],
        }
    }

    fn template(&self) -> &str {
        TEMPLATE
    }

    fn syntax(&self) -> &dyn ExprSyntax {
        &NeutralSyntax
    }

    fn terminator(&self) -> &'static str {
        ";"
    }

    fn comment_prefix(&self) -> &'static str {
        "//"
    }

    fn parallel_pragma(&self, decision: &ParallelDecision) -> String {
        if !decision.parallel || self.openmp_threads == 0 {
            return String::new();
        }
        let schedule = match decision.schedule {
            Schedule::Dynamic => "dynamic",
            Schedule::Static | Schedule::None => "static",
        };
        let mut pragma = format!("#pragma omp parallel for schedule({})", schedule);
        let mut seen: Vec<&str> = Vec::new();
        for reduction in &decision.reductions {
            if !seen.contains(&reduction.target.as_str()) {
                seen.push(&reduction.target);
                pragma.push_str(&Self::reduction_clause(reduction));
            }
        }
        pragma
    }

    fn bounds_check(&self, plan: &LoopPlan, size: &str) -> String {
        if !self.debug_bounds_check || !plan.uses_indirection() {
            return String::new();
        }
        format!("assert({idx} >= 0 && {idx} < {size});", idx = ABSOLUTE_IDX, size = size)
    }

    fn local_definition(&self, name: &str, dtype: NumericType, value: &str) -> Option<String> {
        Some(format!("{} {} = {};", dtype.c_name(), name, value))
    }

    fn accumulator_init(&self, reduction: &Reduction, dtype: NumericType, current: &str) -> String {
        format!("{} {} = {};", dtype.c_name(), reduction.accumulator(), current)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::annotator::Hazard;
    use crate::expr::Expr;

    fn decision(parallel: bool, schedule: Schedule, reductions: Vec<Reduction>) -> ParallelDecision {
        ParallelDecision {
            parallel,
            schedule,
            requires_reduction: !reductions.is_empty(),
            reductions,
            hazards: Vec::<Hazard>::new(),
            reason: String::new(),
            fallback: None,
        }
    }

    fn sum(target: &str) -> Reduction {
        Reduction {
            statement_index: 0,
            target: target.to_string(),
            kind: ReductionKind::Sum,
            operand: Expr::var("v"),
        }
    }

    #[test]
    fn test_pragma_text() {
        let backend = CppBackend::new(4, false);
        assert_eq!(
            backend.parallel_pragma(&decision(true, Schedule::Static, vec![])),
            "#pragma omp parallel for schedule(static)"
        );
        assert_eq!(
            backend.parallel_pragma(&decision(true, Schedule::Dynamic, vec![])),
            "#pragma omp parallel for schedule(dynamic)"
        );
        assert_eq!(
            backend.parallel_pragma(&decision(true, Schedule::Static, vec![sum("total")])),
            "#pragma omp parallel for schedule(static) reduction(+:_red_total)"
        );
        assert_eq!(
            backend.parallel_pragma(&decision(false, Schedule::None, vec![sum("total")])),
            ""
        );
    }

    #[test]
    fn test_no_threads_means_no_parallel_loops() {
        let backend = CppBackend::new(0, false);
        assert!(!backend.capabilities().parallel_loops);
        assert_eq!(
            backend.parallel_pragma(&decision(true, Schedule::Static, vec![])),
            ""
        );
    }

    #[test]
    fn test_bounds_check_only_for_indirection() {
        let plan = crate::indexing::resolve(&crate::types::TargetingMode::group("_group_idx", vec![1])).unwrap();
        let direct = crate::indexing::resolve(&crate::types::TargetingMode::all(3)).unwrap();
        let backend = CppBackend::new(1, true);
        assert_eq!(backend.bounds_check(&plan, "_num_v"), "assert(_idx >= 0 && _idx < _num_v);");
        assert_eq!(backend.bounds_check(&direct, "_num_v"), "");
        assert_eq!(CppBackend::new(1, false).bounds_check(&plan, "_num_v"), "");
    }
}
