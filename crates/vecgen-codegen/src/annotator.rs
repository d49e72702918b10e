// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Parallel-Region Annotator
//!
//! Decides whether the vector loop of a code object may be split across
//! workers, and under which schedule.
//!
//! A loop is parallel-safe when each iteration reads only state no other
//! iteration writes, and writes only its own absolute slot. Anything else is
//! a [`Hazard`] and forces a serial loop. Accumulations into a scalar-global
//! are allowed only in a recognised [`ReductionKind`] form, and only when the
//! backend can express that reduction.
//!
//! Decision order:
//! 1. hazards present → serial
//! 2. reductions over an index array → serial (`UnsafeReduction`)
//! 3. empty loop body, or static count below the policy threshold → serial
//! 4. otherwise parallel; reductions force a static schedule

use ahash::AHashSet;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use tracing::{debug, warn};

use crate::backend::BackendCapabilities;
use crate::expr::{BinaryOp, Expr, Function};
use crate::indexing::LoopPlan;
use crate::types::*;

/// Loop schedule for a parallel region
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Schedule {
    /// Equal-sized contiguous chunks
    #[default]
    Static,
    /// Chunks handed out on demand
    Dynamic,
    /// No parallel region
    None,
}

impl fmt::Display for Schedule {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Schedule::Static => write!(f, "static"),
            Schedule::Dynamic => write!(f, "dynamic"),
            Schedule::None => write!(f, "none"),
        }
    }
}

impl FromStr for Schedule {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "static" => Ok(Schedule::Static),
            "dynamic" => Ok(Schedule::Dynamic),
            "none" | "serial" => Ok(Schedule::None),
            _ => Err(format!("unknown schedule '{}'", s)),
        }
    }
}

/// Associative accumulation a backend may parallelise
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReductionKind {
    Sum,
    Product,
    Min,
    Max,
}

impl ReductionKind {
    /// Neutral element of the combine operation
    pub fn identity(&self) -> f64 {
        match self {
            ReductionKind::Sum => 0.0,
            ReductionKind::Product => 1.0,
            ReductionKind::Min => f64::INFINITY,
            ReductionKind::Max => f64::NEG_INFINITY,
        }
    }

    pub fn combine(&self, a: f64, b: f64) -> f64 {
        match self {
            ReductionKind::Sum => a + b,
            ReductionKind::Product => a * b,
            ReductionKind::Min => a.min(b),
            ReductionKind::Max => a.max(b),
        }
    }
}

impl fmt::Display for ReductionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ReductionKind::Sum => write!(f, "sum"),
            ReductionKind::Product => write!(f, "product"),
            ReductionKind::Min => write!(f, "min"),
            ReductionKind::Max => write!(f, "max"),
        }
    }
}

/// A recognised accumulation `target = target ⊕ operand`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Reduction {
    /// Position of the statement in the original input
    pub statement_index: usize,
    pub target: String,
    pub kind: ReductionKind,
    /// Per-iteration contribution; never references `target`
    pub operand: Expr,
}

impl Reduction {
    /// Name of the private accumulator generated code combines into
    pub fn accumulator(&self) -> String {
        format!("_red_{}", self.target)
    }
}

/// Recognise `t += e`, `t *= e`, `t = t + e`, `t = e + t`, `t = t * e`,
/// `t = e * t`, `t = min(t, e)`, `t = max(t, e)` (either argument order),
/// with `t` absent from `e`
pub fn detect_reduction(statement: &IndexedStatement) -> Option<Reduction> {
    let stmt = &statement.statement;
    let target = stmt.target.as_str();

    let (kind, operand) = match stmt.op {
        AssignOp::AddAssign => (ReductionKind::Sum, &stmt.expr),
        AssignOp::MulAssign => (ReductionKind::Product, &stmt.expr),
        AssignOp::SubAssign | AssignOp::DivAssign => return None,
        AssignOp::Assign => match &stmt.expr {
            Expr::Binary { op, lhs, rhs } => {
                let kind = match op {
                    BinaryOp::Add => ReductionKind::Sum,
                    BinaryOp::Mul => ReductionKind::Product,
                    _ => return None,
                };
                (kind, other_operand(target, lhs, rhs)?)
            }
            Expr::Call { function, args } if args.len() == 2 => {
                let kind = match function {
                    Function::Min => ReductionKind::Min,
                    Function::Max => ReductionKind::Max,
                    _ => return None,
                };
                (kind, other_operand(target, &args[0], &args[1])?)
            }
            _ => return None,
        },
    };

    if operand.references(target) {
        return None;
    }

    Some(Reduction {
        statement_index: statement.position,
        target: target.to_string(),
        kind,
        operand: operand.clone(),
    })
}

fn other_operand<'a>(target: &str, a: &'a Expr, b: &'a Expr) -> Option<&'a Expr> {
    let is_target = |e: &Expr| matches!(e, Expr::Variable(name) if name == target);
    if is_target(a) {
        Some(b)
    } else if is_target(b) {
        Some(a)
    } else {
        None
    }
}

/// Order sensitivity that rules out a parallel loop
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Hazard {
    /// Write into another element's slot through a foreign index
    ForeignWrite {
        statement_index: usize,
        variable: String,
    },
    /// Read through a foreign index of storage written in the same loop
    ForeignReadOfWritten {
        statement_index: usize,
        variable: String,
        storage: String,
    },
    /// Scalar-global written per element in a non-reduction form
    ScalarAccumulation {
        statement_index: usize,
        variable: String,
    },
    /// Reduction target observed by another statement mid-loop
    ReductionTargetRead {
        statement_index: usize,
        variable: String,
    },
}

impl fmt::Display for Hazard {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Hazard::ForeignWrite {
                statement_index,
                variable,
            } => write!(
                f,
                "statement {} writes '{}' through a foreign index",
                statement_index, variable
            ),
            Hazard::ForeignReadOfWritten {
                statement_index,
                variable,
                storage,
            } => write!(
                f,
                "statement {} reads '{}' through a foreign index while '{}' is written in the loop",
                statement_index, variable, storage
            ),
            Hazard::ScalarAccumulation {
                statement_index,
                variable,
            } => write!(
                f,
                "statement {} writes scalar '{}' per element without a recognised reduction",
                statement_index, variable
            ),
            Hazard::ReductionTargetRead {
                statement_index,
                variable,
            } => write!(
                f,
                "statement {} reads reduction target '{}'",
                statement_index, variable
            ),
        }
    }
}

/// Tunables for the parallel decision
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelPolicy {
    /// Static iteration counts below this run serially
    pub min_parallel_iterations: usize,
    /// Preferred schedule; `None` disables parallel loops
    pub schedule: Schedule,
}

impl Default for ParallelPolicy {
    fn default() -> Self {
        Self {
            min_parallel_iterations: 2,
            schedule: Schedule::Static,
        }
    }
}

/// Parallel-region decision with rationale
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ParallelDecision {
    pub parallel: bool,
    pub schedule: Schedule,
    pub requires_reduction: bool,
    pub reductions: Vec<Reduction>,
    pub hazards: Vec<Hazard>,
    pub reason: String,
    /// Cause of a serial fallback forced by unsafe accumulation
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub fallback: Option<CodegenError>,
}

impl ParallelDecision {
    fn serial(
        reductions: Vec<Reduction>,
        hazards: Vec<Hazard>,
        reason: String,
        fallback: Option<CodegenError>,
    ) -> Self {
        Self {
            parallel: false,
            schedule: Schedule::None,
            requires_reduction: !reductions.is_empty(),
            reductions,
            hazards,
            reason,
            fallback,
        }
    }

    /// Reduction whose target is `name`, if any
    pub fn reduction_for(&self, name: &str) -> Option<&Reduction> {
        self.reductions.iter().find(|r| r.target == name)
    }

    /// Whether `name` is combined through a private accumulator in this loop
    pub fn accumulates(&self, name: &str) -> bool {
        self.parallel && self.reduction_for(name).is_some()
    }
}

/// Decide whether the vector loop may run in parallel
pub fn decide(
    vector: &[IndexedStatement],
    plan: &LoopPlan,
    variables: &VariableTable,
    policy: &ParallelPolicy,
) -> ParallelDecision {
    let mut reductions = Vec::new();
    let mut hazards = Vec::new();

    // Storage arrays written by per-element statements in this loop
    let written_storage: AHashSet<&str> = vector
        .iter()
        .filter_map(|s| variables.get(s.statement.writes()))
        .filter(|v| v.is_per_element())
        .map(Variable::storage_name)
        .collect();

    for indexed in vector {
        let stmt = &indexed.statement;
        if let Some(var) = variables.get(stmt.writes()) {
            if var.is_per_element() {
                if var.foreign_index().is_some() {
                    hazards.push(Hazard::ForeignWrite {
                        statement_index: indexed.position,
                        variable: var.name.clone(),
                    });
                }
            } else {
                match detect_reduction(indexed) {
                    Some(reduction) => reductions.push(reduction),
                    None => hazards.push(Hazard::ScalarAccumulation {
                        statement_index: indexed.position,
                        variable: var.name.clone(),
                    }),
                }
            }
        }

        for read in stmt.expr.identifiers() {
            if let Some(var) = variables.get(&read) {
                if var.foreign_index().is_some() && written_storage.contains(var.storage_name()) {
                    hazards.push(Hazard::ForeignReadOfWritten {
                        statement_index: indexed.position,
                        variable: var.name.clone(),
                        storage: var.storage_name().to_string(),
                    });
                }
            }
        }
    }

    for reduction in &reductions {
        for other in vector {
            if other.position != reduction.statement_index
                && other.statement.reads().iter().any(|r| r == &reduction.target)
            {
                hazards.push(Hazard::ReductionTargetRead {
                    statement_index: other.position,
                    variable: reduction.target.clone(),
                });
            }
        }
    }

    let decision = if let Some(first) = hazards.first() {
        let reason = format!("order-sensitive loop: {}", first);
        ParallelDecision::serial(reductions, hazards, reason, None)
    } else if plan.uses_indirection() && !reductions.is_empty() {
        let first = &reductions[0];
        let fallback = CodegenError::UnsafeReduction {
            statement_index: first.statement_index,
            variable: first.target.clone(),
            reason: "index array may contain duplicates".to_string(),
        };
        let reason = format!("{} reduction over an index array: {}", first.kind, fallback);
        ParallelDecision::serial(reductions, hazards, reason, Some(fallback))
    } else if vector.is_empty() {
        ParallelDecision::serial(reductions, hazards, "no vector statements".to_string(), None)
    } else if plan.is_count_static() && plan.iteration_count() < policy.min_parallel_iterations {
        let reason = format!(
            "iteration count {} below parallel threshold {}",
            plan.iteration_count(),
            policy.min_parallel_iterations
        );
        ParallelDecision::serial(reductions, hazards, reason, None)
    } else if policy.schedule == Schedule::None {
        ParallelDecision::serial(
            reductions,
            hazards,
            "parallel loops disabled by policy".to_string(),
            None,
        )
    } else {
        let requires_reduction = !reductions.is_empty();
        let schedule = if requires_reduction {
            Schedule::Static
        } else {
            policy.schedule
        };
        let reason = if requires_reduction {
            let targets: Vec<&str> = reductions.iter().map(|r| r.target.as_str()).collect();
            format!("parallel with reductions on {}", targets.join(", "))
        } else if plan.uses_indirection() {
            "independent iterations through index array".to_string()
        } else {
            "independent iterations".to_string()
        };
        ParallelDecision {
            parallel: true,
            schedule,
            requires_reduction,
            reductions,
            hazards,
            reason,
            fallback: None,
        }
    };

    debug!(
        "[ANNOTATE] parallel={}, schedule={}, reductions={}, hazards={}: {}",
        decision.parallel,
        decision.schedule,
        decision.reductions.len(),
        decision.hazards.len(),
        decision.reason
    );

    decision
}

/// Downgrade a decision to what `capabilities` can express
///
/// A parallel loop over a reduction the backend cannot express, or on a
/// backend without parallel loops, becomes serial with an
/// `UnsafeReduction` fallback recorded.
pub fn finalize_for_backend(
    decision: ParallelDecision,
    capabilities: &BackendCapabilities,
) -> ParallelDecision {
    if !decision.parallel {
        return decision;
    }

    if !capabilities.parallel_loops {
        let fallback = decision.reductions.first().map(|r| CodegenError::UnsafeReduction {
            statement_index: r.statement_index,
            variable: r.target.clone(),
            reason: format!("backend '{}' has no parallel loops", capabilities.backend),
        });
        if let Some(err) = &fallback {
            warn!("[ANNOTATE] Serial fallback: {}", err);
        } else {
            debug!(
                "[ANNOTATE] Backend '{}' has no parallel loops, running serially",
                capabilities.backend
            );
        }
        let reason = format!("backend '{}' has no parallel loops", capabilities.backend);
        return ParallelDecision::serial(decision.reductions, decision.hazards, reason, fallback);
    }

    if let Some(unsupported) = decision
        .reductions
        .iter()
        .find(|r| !capabilities.supports(r.kind))
    {
        let fallback = CodegenError::UnsafeReduction {
            statement_index: unsupported.statement_index,
            variable: unsupported.target.clone(),
            reason: format!(
                "backend '{}' cannot express a {} reduction",
                capabilities.backend, unsupported.kind
            ),
        };
        warn!("[ANNOTATE] Serial fallback: {}", fallback);
        let reason = fallback.to_string();
        return ParallelDecision::serial(
            decision.reductions,
            decision.hazards,
            reason,
            Some(fallback),
        );
    }

    decision
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::classify;
    use crate::indexing::resolve;

    fn vars() -> VariableTable {
        VariableTable::new()
            .with(Variable::scalar("x", NumericType::F64))
            .with(Variable::scalar("total", NumericType::F64))
            .with(Variable::scalar("peak", NumericType::F64))
            .with(Variable::array("v", NumericType::F64))
            .with(Variable::array("w", NumericType::F64))
            .with(Variable::array("v_pre", NumericType::F64).indexed_by("_presynaptic_idx").stored_in("v"))
    }

    fn decide_for(stmts: &[Statement], mode: TargetingMode) -> ParallelDecision {
        let variables = vars();
        let classified = classify(stmts, &variables).unwrap();
        let plan = resolve(&mode).unwrap();
        decide(&classified.vector, &plan, &variables, &ParallelPolicy::default())
    }

    fn all_caps() -> BackendCapabilities {
        BackendCapabilities {
            backend: "test".to_string(),
            parallel_loops: true,
            reductions: vec![
                ReductionKind::Sum,
                ReductionKind::Product,
                ReductionKind::Min,
                ReductionKind::Max,
            ],
        }
    }

    #[test]
    fn test_independent_loop_is_parallel_static() {
        let d = decide_for(
            &[
                Statement::assign("x", Expr::num(2.0)),
                Statement::assign("v", Expr::var("v") + Expr::var("x")),
            ],
            TargetingMode::all(5),
        );
        assert!(d.parallel);
        assert_eq!(d.schedule, Schedule::Static);
        assert!(!d.requires_reduction);
        assert!(d.hazards.is_empty());
    }

    #[test]
    fn test_reduction_forms() {
        let cases = [
            (Statement::compound("total", AssignOp::AddAssign, Expr::var("v")), ReductionKind::Sum),
            (Statement::assign("total", Expr::var("v") + Expr::var("total")), ReductionKind::Sum),
            (Statement::assign("total", Expr::var("total") * Expr::var("v")), ReductionKind::Product),
            (Statement::assign("total", Expr::min(Expr::var("total"), Expr::var("v"))), ReductionKind::Min),
            (Statement::assign("total", Expr::max(Expr::var("v"), Expr::var("total"))), ReductionKind::Max),
        ];
        for (stmt, kind) in cases {
            let indexed = IndexedStatement { position: 0, statement: stmt };
            let r = detect_reduction(&indexed).unwrap();
            assert_eq!(r.kind, kind);
            assert_eq!(r.operand, Expr::var("v"));
            assert_eq!(r.accumulator(), "_red_total");
        }

        let self_ref = IndexedStatement {
            position: 0,
            statement: Statement::assign("total", Expr::var("total") + Expr::var("total") * Expr::var("v")),
        };
        assert!(detect_reduction(&self_ref).is_none());

        let minus = IndexedStatement {
            position: 0,
            statement: Statement::compound("total", AssignOp::SubAssign, Expr::var("v")),
        };
        assert!(detect_reduction(&minus).is_none());
    }

    #[test]
    fn test_reduction_requires_static_schedule() {
        let variables = vars();
        let stmts = [Statement::assign("total", Expr::var("total") + Expr::var("v"))];
        let classified = classify(&stmts, &variables).unwrap();
        let plan = resolve(&TargetingMode::all(100)).unwrap();
        let policy = ParallelPolicy {
            min_parallel_iterations: 2,
            schedule: Schedule::Dynamic,
        };
        let d = decide(&classified.vector, &plan, &variables, &policy);
        assert!(d.parallel);
        assert!(d.requires_reduction);
        assert_eq!(d.schedule, Schedule::Static);
        assert!(d.accumulates("total"));
    }

    #[test]
    fn test_dynamic_schedule_without_reduction() {
        let variables = vars();
        let stmts = [Statement::assign("v", Expr::var("v") * Expr::num(0.5))];
        let classified = classify(&stmts, &variables).unwrap();
        let plan = resolve(&TargetingMode::all(100)).unwrap();
        let policy = ParallelPolicy {
            min_parallel_iterations: 2,
            schedule: Schedule::Dynamic,
        };
        let d = decide(&classified.vector, &plan, &variables, &policy);
        assert_eq!(d.schedule, Schedule::Dynamic);
    }

    #[test]
    fn test_non_reduction_scalar_write_is_hazard() {
        let d = decide_for(
            &[Statement::assign("total", Expr::var("v") * Expr::num(2.0))],
            TargetingMode::all(10),
        );
        assert!(!d.parallel);
        assert_eq!(d.schedule, Schedule::None);
        assert!(matches!(d.hazards[0], Hazard::ScalarAccumulation { .. }));
    }

    #[test]
    fn test_reduction_target_read_elsewhere_is_hazard() {
        let d = decide_for(
            &[
                Statement::compound("total", AssignOp::AddAssign, Expr::var("v")),
                Statement::assign("w", Expr::var("total")),
            ],
            TargetingMode::all(10),
        );
        assert!(!d.parallel);
        assert!(d
            .hazards
            .iter()
            .any(|h| matches!(h, Hazard::ReductionTargetRead { statement_index: 1, .. })));
    }

    #[test]
    fn test_foreign_read_of_written_storage() {
        let d = decide_for(
            &[Statement::assign("v", Expr::var("v_pre") + Expr::num(1.0))],
            TargetingMode::all(10),
        );
        assert!(!d.parallel);
        assert!(matches!(d.hazards[0], Hazard::ForeignReadOfWritten { .. }));

        // Foreign read of storage nobody writes is fine
        let d = decide_for(
            &[Statement::assign("w", Expr::var("v_pre"))],
            TargetingMode::all(10),
        );
        assert!(d.parallel);
    }

    #[test]
    fn test_foreign_write_is_hazard() {
        let d = decide_for(
            &[Statement::assign("v_pre", Expr::num(0.0))],
            TargetingMode::all(10),
        );
        assert!(!d.parallel);
        assert!(matches!(d.hazards[0], Hazard::ForeignWrite { .. }));
    }

    #[test]
    fn test_index_array_alone_stays_parallel() {
        let d = decide_for(
            &[Statement::assign("v", Expr::num(0.0))],
            TargetingMode::group("_group_idx", vec![3, 1, 1, 4]),
        );
        assert!(d.parallel);
    }

    #[test]
    fn test_index_array_reduction_is_unsafe() {
        let d = decide_for(
            &[Statement::compound("total", AssignOp::AddAssign, Expr::var("v"))],
            TargetingMode::group("_group_idx", vec![3, 1, 1, 4]),
        );
        assert!(!d.parallel);
        assert!(d.requires_reduction);
        assert!(matches!(d.fallback, Some(CodegenError::UnsafeReduction { .. })));
    }

    #[test]
    fn test_threshold_is_policy() {
        let d = decide_for(
            &[Statement::assign("v", Expr::num(0.0))],
            TargetingMode::all(1),
        );
        assert!(!d.parallel);
        assert!(d.reason.contains("threshold"));
        assert!(d.fallback.is_none());
    }

    #[test]
    fn test_finalize_without_reduction_support() {
        let d = decide_for(
            &[Statement::assign("total", Expr::var("total") + Expr::var("v"))],
            TargetingMode::all(50),
        );
        assert!(d.parallel);

        let caps = BackendCapabilities {
            reductions: vec![],
            ..all_caps()
        };
        let f = finalize_for_backend(d.clone(), &caps);
        assert!(!f.parallel);
        assert_eq!(f.schedule, Schedule::None);
        assert!(f.requires_reduction);
        assert!(matches!(f.fallback, Some(CodegenError::UnsafeReduction { .. })));

        let kept = finalize_for_backend(d, &all_caps());
        assert!(kept.parallel);
    }

    #[test]
    fn test_finalize_serial_backend() {
        let d = decide_for(
            &[Statement::assign("v", Expr::num(0.0))],
            TargetingMode::all(50),
        );
        let caps = BackendCapabilities {
            parallel_loops: false,
            ..all_caps()
        };
        let f = finalize_for_backend(d, &caps);
        assert!(!f.parallel);
        assert!(f.fallback.is_none());
    }

    #[test]
    fn test_schedule_parse() {
        assert_eq!("Dynamic".parse::<Schedule>().unwrap(), Schedule::Dynamic);
        assert_eq!("serial".parse::<Schedule>().unwrap(), Schedule::None);
        assert!("guided".parse::<Schedule>().is_err());
        assert_eq!(Schedule::Static.to_string(), "static");
    }
}
