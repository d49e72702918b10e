// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Reference Executor
//!
//! Runs the statements of a generated code object directly against a
//! [`Population`], with the same semantics the rendered code has:
//!
//! 1. scalar statements once, vectorisation index bound to the sentinel
//! 2. vector statements once per loop iteration, vectorisation index bound
//!    to that iteration's absolute element index
//!
//! When the parallel decision allows it, iterations are computed in
//! parallel against a read-only view of the population (rayon), then their
//! writes are applied sequentially in iteration order. Reductions are
//! combined with `fold`/`reduce` into the accumulator's starting value.
//! Index arrays with duplicate entries always execute serially.
//!
//! Every written value is converted to the target's numeric type: integers
//! truncate toward zero, booleans become 0 or 1.

use ahash::{AHashMap, AHashSet};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;
use vecgen_codegen::{
    CodeGenerator, CodeObjectRequest, Expr, GeneratedCode, IndexedStatement, NumericType,
    ReductionKind, Statement, Variable, VariableTable, VectorisationContext,
};

use crate::error::{ExecutionError, ExecutionResult};
use crate::eval::evaluate;
use crate::population::{checked_slot, Population};

/// Executor settings
///
/// Mirrors the `[runtime]` configuration section.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutorSettings {
    /// Worker threads; 0 uses the global rayon pool
    pub num_threads: usize,
    /// Honour parallel decisions; `false` always runs serially
    pub parallel: bool,
}

impl Default for ExecutorSettings {
    fn default() -> Self {
        Self {
            num_threads: 0,
            parallel: true,
        }
    }
}

/// Outcome of one execution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExecutionReport {
    pub iterations: usize,
    /// Absolute element index bound in each iteration, in loop order
    pub visited: Vec<usize>,
    /// Whether the vector loop actually ran in parallel
    pub parallel: bool,
    /// Final value of each reduction target
    pub reductions: Vec<(String, f64)>,
}

/// Pending write produced by one statement
#[derive(Debug, Clone)]
enum Write {
    Scalar { storage: String, value: f64 },
    Element { storage: String, slot: usize, value: f64 },
}

/// Writes and reduction contributions of one iteration
struct IterationOutput {
    writes: Vec<Write>,
    contributions: Vec<f64>,
}

/// Evaluation state for one scalar block or one loop iteration
///
/// Reads see this frame's own pending writes first, then the population.
struct Frame<'a> {
    population: &'a Population,
    variables: &'a VariableTable,
    context: VectorisationContext,
    locals: AHashMap<String, f64>,
    writes: Vec<Write>,
}

impl<'a> Frame<'a> {
    fn new(
        population: &'a Population,
        variables: &'a VariableTable,
        context: VectorisationContext,
        locals: AHashMap<String, f64>,
    ) -> Self {
        Self {
            population,
            variables,
            context,
            locals,
            writes: Vec::new(),
        }
    }

    fn slot(&self, var: &Variable) -> ExecutionResult<usize> {
        let index = self
            .context
            .element_index()
            .ok_or_else(|| ExecutionError::ScalarContextAccess(var.name.clone()))?;
        let absolute = match var.foreign_index() {
            Some(array) => {
                let entries = self.population.index_array(array)?;
                entries[checked_slot(array, index as i64, entries.len())?]
            }
            None => index as i64,
        };
        let len = self.population.array(var.storage_name())?.len();
        checked_slot(var.storage_name(), absolute, len)
    }

    fn read(&self, name: &str) -> ExecutionResult<f64> {
        let Some(var) = self.variables.get(name) else {
            return self
                .locals
                .get(name)
                .copied()
                .ok_or_else(|| ExecutionError::UnknownArray(name.to_string()));
        };
        let storage = var.storage_name();

        if var.is_scalar() {
            for write in self.writes.iter().rev() {
                if let Write::Scalar { storage: s, value } = write {
                    if s == storage {
                        return Ok(*value);
                    }
                }
            }
            return self.population.scalar(storage);
        }

        let slot = self.slot(var)?;
        for write in self.writes.iter().rev() {
            if let Write::Element {
                storage: s,
                slot: w,
                value,
            } = write
            {
                if s == storage && *w == slot {
                    return Ok(*value);
                }
            }
        }
        self.population.element(storage, slot as i64)
    }

    fn eval(&self, expr: &Expr) -> ExecutionResult<f64> {
        evaluate(expr, &mut |name: &str| self.read(name))
    }

    fn run(&mut self, statement: &Statement) -> ExecutionResult<()> {
        let value = self.eval(&statement.effective_expr())?;
        let target = statement.writes();
        match self.variables.get(target) {
            Some(var) if var.is_scalar() => self.writes.push(Write::Scalar {
                storage: var.storage_name().to_string(),
                value: var.dtype.coerce(value),
            }),
            Some(var) => {
                let slot = self.slot(var)?;
                self.writes.push(Write::Element {
                    storage: var.storage_name().to_string(),
                    slot,
                    value: var.dtype.coerce(value),
                });
            }
            None => {
                self.locals.insert(target.to_string(), value);
            }
        }
        Ok(())
    }
}

fn apply(population: &mut Population, writes: Vec<Write>) -> ExecutionResult<()> {
    for write in writes {
        match write {
            Write::Scalar { storage, value } => population.set_scalar(storage, value),
            Write::Element {
                storage,
                slot,
                value,
            } => population.set_element(&storage, slot, value)?,
        }
    }
    Ok(())
}

/// Executes generated code objects
pub struct Executor {
    parallel: bool,
    pool: Option<rayon::ThreadPool>,
}

impl Executor {
    pub fn new(settings: &ExecutorSettings) -> ExecutionResult<Self> {
        let pool = if settings.parallel && settings.num_threads > 0 {
            Some(
                rayon::ThreadPoolBuilder::new()
                    .num_threads(settings.num_threads)
                    .build()
                    .map_err(|e| ExecutionError::ThreadPool(e.to_string()))?,
            )
        } else {
            None
        };
        Ok(Self {
            parallel: settings.parallel,
            pool,
        })
    }

    /// Executor that never runs loops in parallel
    pub fn serial() -> Self {
        Self {
            parallel: false,
            pool: None,
        }
    }

    fn install<R: Send>(&self, op: impl FnOnce() -> R + Send) -> R {
        match &self.pool {
            Some(pool) => pool.install(op),
            None => op(),
        }
    }

    /// Generate `request` and execute the result
    pub fn run(
        &self,
        generator: &CodeGenerator,
        request: &CodeObjectRequest,
        population: &mut Population,
    ) -> ExecutionResult<ExecutionReport> {
        let code = generator.generate(request)?;
        self.execute(&code, &request.variables, population)
    }

    /// Execute a generated code object against `population`
    ///
    /// # Errors
    ///
    /// Missing storage, out-of-range absolute indices (always checked),
    /// unbound index-array contents, and per-element access in scalar code.
    pub fn execute(
        &self,
        code: &GeneratedCode,
        variables: &VariableTable,
        population: &mut Population,
    ) -> ExecutionResult<ExecutionReport> {
        // Scalar block: sentinel bound, runs exactly once
        let mut scalar_frame = Frame::new(
            population,
            variables,
            VectorisationContext::scalar(),
            AHashMap::new(),
        );
        for indexed in &code.classified.scalar {
            scalar_frame.run(&indexed.statement)?;
        }
        let Frame {
            locals: scalar_locals,
            writes: scalar_writes,
            ..
        } = scalar_frame;
        apply(population, scalar_writes)?;

        // Bind index-array contents the plan does not carry
        let plan = match code.plan.index_array() {
            Some(array) if code.plan.indices().is_none() => {
                if !population.has_index_array(array) {
                    return Err(ExecutionError::UnboundIndexArray(array.to_string()));
                }
                code.plan.bind_index_array(population.index_array(array)?)?
            }
            _ => code.plan.clone(),
        };
        let indices = plan.indices().ok_or_else(|| {
            ExecutionError::UnboundIndexArray(plan.index_array().unwrap_or_default().to_string())
        })?;
        let bound_name = plan.index_array().unwrap_or("elements");
        let visited = indices
            .iter()
            .map(|&index| checked_slot(bound_name, index, population.size()))
            .collect::<ExecutionResult<Vec<usize>>>()?;

        // Duplicate slots run serially so each visit sees the previous one
        let mut seen = AHashSet::with_capacity(visited.len());
        let has_duplicates = !visited.iter().all(|slot| seen.insert(*slot));
        if has_duplicates && code.decision.parallel {
            debug!("[EXEC] '{}': duplicate indices, running serially", code.name);
        }
        let run_parallel =
            self.parallel && code.decision.parallel && !has_duplicates && !visited.is_empty();
        let reductions = if run_parallel {
            code.decision.reductions.clone()
        } else {
            Vec::new()
        };
        let identities: Vec<f64> = reductions.iter().map(|r| r.kind.identity()).collect();
        let kinds: Vec<ReductionKind> = reductions.iter().map(|r| r.kind).collect();
        // Accumulators hold values of the target's type
        let dtypes: Vec<NumericType> = reductions
            .iter()
            .map(|r| variables.get(&r.target).map(|v| v.dtype).unwrap_or_default())
            .collect();
        let combine =
            |k: usize, acc: f64, value: f64| dtypes[k].coerce(kinds[k].combine(acc, value));
        let vector: &[IndexedStatement] = &code.classified.vector;

        let run_iteration = |index: usize, snapshot: &Population| -> ExecutionResult<IterationOutput> {
            let mut frame = Frame::new(
                snapshot,
                variables,
                VectorisationContext::element(index),
                scalar_locals.clone(),
            );
            let mut contributions = identities.clone();
            for indexed in vector {
                let target = indexed.statement.writes();
                if let Some(k) = reductions.iter().position(|r| r.target == target) {
                    let value = frame.eval(&reductions[k].operand)?;
                    contributions[k] = combine(k, contributions[k], value);
                    continue;
                }
                frame.run(&indexed.statement)?;
            }
            Ok(IterationOutput {
                writes: frame.writes,
                contributions,
            })
        };

        let mut final_reductions = Vec::new();

        if run_parallel {
            let snapshot: &Population = population;
            let outputs: Vec<IterationOutput> = self.install(|| {
                visited
                    .par_iter()
                    .map(|&index| run_iteration(index, snapshot))
                    .collect::<ExecutionResult<Vec<_>>>()
            })?;

            let combined: Vec<f64> = self.install(|| {
                outputs
                    .par_iter()
                    .fold(
                        || identities.clone(),
                        |mut acc, out| {
                            for (k, c) in out.contributions.iter().enumerate() {
                                acc[k] = combine(k, acc[k], *c);
                            }
                            acc
                        },
                    )
                    .reduce(
                        || identities.clone(),
                        |a, b| {
                            a.iter()
                                .zip(&b)
                                .enumerate()
                                .map(|(k, (x, y))| combine(k, *x, *y))
                                .collect()
                        },
                    )
            });

            for out in outputs {
                apply(population, out.writes)?;
            }
            for (k, (reduction, partial)) in reductions.iter().zip(combined).enumerate() {
                let storage = variables
                    .get(&reduction.target)
                    .map(|v| v.storage_name().to_string())
                    .unwrap_or_else(|| reduction.target.clone());
                let value = combine(k, population.scalar(&storage)?, partial);
                population.set_scalar(storage, value);
                final_reductions.push((reduction.target.clone(), value));
            }
        } else {
            for &index in &visited {
                let out = run_iteration(index, &*population)?;
                apply(population, out.writes)?;
            }
            for reduction in &code.decision.reductions {
                let storage = variables
                    .get(&reduction.target)
                    .map(|v| v.storage_name().to_string())
                    .unwrap_or_else(|| reduction.target.clone());
                final_reductions.push((reduction.target.clone(), population.scalar(&storage)?));
            }
        }

        debug!(
            "[EXEC] '{}': {} scalar statements, {} iterations, parallel={} (rayon threads: {})",
            code.name,
            code.classified.scalar.len(),
            visited.len(),
            run_parallel,
            rayon::current_num_threads()
        );

        Ok(ExecutionReport {
            iterations: visited.len(),
            visited,
            parallel: run_parallel,
            reductions: final_reductions,
        })
    }
}
