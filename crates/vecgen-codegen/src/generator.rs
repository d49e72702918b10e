// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Code Generator
//!
//! Runs one code object through the whole pipeline:
//!
//! ```text
//! statements ─▶ classify ─▶ {scalar, vector}
//! targeting  ─▶ resolve  ─▶ LoopPlan
//! vector + plan ─▶ decide ─▶ finalize_for_backend ─▶ ParallelDecision
//! everything ─▶ backend substitutions ─▶ render_template ─▶ source text
//! ```

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::annotator::{decide, finalize_for_backend, ParallelDecision, ParallelPolicy, Schedule};
use crate::backend::{
    create_backend, reduction_finalize, reduction_init, render_block, used_variables_line, BackendType,
    Block, CodegenBackend,
};
use crate::classifier::{classify, ClassifiedStatements};
use crate::indexing::{array_size_name, resolve, LoopPlan};
use crate::render::{render_template, Substitutions};
use crate::types::*;

/// Everything needed to generate one code object
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CodeObjectRequest {
    /// Code object name, used in generated function names
    pub name: String,
    pub statements: Vec<Statement>,
    pub variables: VariableTable,
    pub targeting: TargetingMode,
}

/// Generated source plus every intermediate result
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GeneratedCode {
    pub name: String,
    pub backend: BackendType,
    pub source: String,
    pub plan: LoopPlan,
    pub decision: ParallelDecision,
    pub classified: ClassifiedStatements,
    /// Declared variables and index arrays the code touches, sorted
    pub used_variables: Vec<String>,
}

/// Code-generation settings
///
/// Mirrors the `[codegen]` configuration section without depending on the
/// configuration crate.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CodegenSettings {
    pub backend: BackendType,
    /// OpenMP worker threads; 0 disables parallel loops in C++ output
    pub openmp_threads: usize,
    pub min_parallel_iterations: usize,
    pub schedule: Schedule,
    pub debug_bounds_check: bool,
}

impl Default for CodegenSettings {
    fn default() -> Self {
        Self {
            backend: BackendType::Cpp,
            openmp_threads: 1,
            min_parallel_iterations: ParallelPolicy::default().min_parallel_iterations,
            schedule: Schedule::Static,
            debug_bounds_check: false,
        }
    }
}

impl CodegenSettings {
    pub fn policy(&self) -> ParallelPolicy {
        ParallelPolicy {
            min_parallel_iterations: self.min_parallel_iterations,
            schedule: self.schedule,
        }
    }
}

/// Generates code objects for one backend
pub struct CodeGenerator {
    backend: Box<dyn CodegenBackend>,
    policy: ParallelPolicy,
}

impl CodeGenerator {
    pub fn new(backend: Box<dyn CodegenBackend>, policy: ParallelPolicy) -> Self {
        Self { backend, policy }
    }

    pub fn from_settings(settings: &CodegenSettings) -> Self {
        let backend = create_backend(
            settings.backend,
            settings.openmp_threads,
            settings.debug_bounds_check,
        );
        Self::new(backend, settings.policy())
    }

    pub fn backend(&self) -> &dyn CodegenBackend {
        self.backend.as_ref()
    }

    pub fn policy(&self) -> &ParallelPolicy {
        &self.policy
    }

    /// Generate source text for one code object
    ///
    /// # Errors
    ///
    /// Classification errors, `InvalidTargeting` from the resolver, and
    /// template errors. An unsafe reduction is not an error: it is recorded
    /// on the returned decision as a serial fallback.
    pub fn generate(&self, request: &CodeObjectRequest) -> CodegenResult<GeneratedCode> {
        let backend = self.backend.as_ref();
        let variables = &request.variables;

        let classified = classify(&request.statements, variables)?;
        let plan = resolve(&request.targeting)?;
        let decision = decide(&classified.vector, &plan, variables, &self.policy);
        let decision = finalize_for_backend(decision, &backend.capabilities());

        let mut used_variables = used_variables(request, &plan);
        let bounds_check = match element_storage(&classified, variables) {
            Some(storage) => {
                let size = array_size_name(storage);
                let check = backend.bounds_check(&plan, &size);
                if !check.is_empty() {
                    used_variables.push(size);
                    used_variables.sort();
                }
                check
            }
            None => String::new(),
        };

        let mut subs = Substitutions::new();
        subs.set("code_object_name", request.name.as_str())
            .set(
                "scalar_code",
                render_block(backend, &classified.scalar, Block::Scalar, variables, &decision)?,
            )
            .set(
                "vector_code",
                render_block(backend, &classified.vector, Block::Vector, variables, &decision)?,
            )
            .set("iteration_count", plan.iteration_count_expression())
            .set("index_expression", plan.index_expression_text())
            .set("counter", plan.counter_name())
            .set("index_array", plan.index_array().unwrap_or_default())
            .set("parallel_pragma", backend.parallel_pragma(&decision))
            .set("bounds_check", bounds_check)
            .set("used_variables", used_variables_line(backend, &used_variables))
            .set("declarations", backend.declarations(&classified, variables, &decision))
            .set("reduction_init", reduction_init(backend, variables, &decision))
            .set("reduction_finalize", reduction_finalize(backend, variables, &decision));
        backend.extra_substitutions(&plan, &decision, &mut subs);

        let source = render_template(backend.template(), &subs)?;

        debug!(
            "[CODEGEN] '{}' substitutions: counter={}, count={}, index='{}'",
            request.name,
            plan.counter_name(),
            plan.iteration_count_expression(),
            plan.index_expression_text()
        );
        info!(
            "[CODEGEN] Generated '{}' for {}: {} scalar / {} vector statements, parallel={} ({})",
            request.name,
            backend.backend_name(),
            classified.scalar.len(),
            classified.vector.len(),
            decision.parallel,
            decision.reason
        );

        Ok(GeneratedCode {
            name: request.name.clone(),
            backend: backend.backend_type(),
            source,
            plan,
            decision,
            classified,
            used_variables,
        })
    }
}

/// Generate with default settings for `backend`
pub fn generate(request: &CodeObjectRequest, backend: BackendType) -> CodegenResult<GeneratedCode> {
    let settings = CodegenSettings {
        backend,
        ..Default::default()
    };
    CodeGenerator::from_settings(&settings).generate(request)
}

/// First own-indexed per-element storage the vector code writes, else reads
fn element_storage<'a>(
    classified: &ClassifiedStatements,
    variables: &'a VariableTable,
) -> Option<&'a str> {
    let own_array = |name: &str| {
        variables
            .get(name)
            .filter(|v| !v.is_scalar() && v.foreign_index().is_none())
            .map(Variable::storage_name)
    };
    let statements = || classified.vector_statements();
    statements()
        .find_map(|s| own_array(s.writes()))
        .or_else(|| statements().flat_map(Statement::reads).find_map(|r| own_array(&r)))
}

fn used_variables(request: &CodeObjectRequest, plan: &LoopPlan) -> Vec<String> {
    let mut used: Vec<String> = Vec::new();
    let mut add = |name: &str| {
        if !used.iter().any(|u| u == name) {
            used.push(name.to_string());
        }
    };

    for stmt in &request.statements {
        for name in std::iter::once(stmt.writes().to_string()).chain(stmt.reads()) {
            if let Some(var) = request.variables.get(&name) {
                add(var.storage_name());
                if let Some(foreign) = var.foreign_index() {
                    add(foreign);
                }
            }
        }
    }
    if let Some(array) = plan.index_array() {
        add(array);
    }

    used.sort();
    used
}
