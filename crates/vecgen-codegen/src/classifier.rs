// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Statement Classifier
//!
//! Splits an ordered statement list into a **scalar** bucket (executed once,
//! before any element is visited) and a **vector** bucket (executed once per
//! targeted element). Both buckets keep input order.
//!
//! ## Rule
//! ```text
//! scalar(s) ⇔ target(s) is scalar-global (or a local temporary)
//!             ∧ ∀ r ∈ reads(s): r is scalar-global ∨ r is an earlier scalar target
//! ```
//!
//! Scalar code is hoisted ahead of the loop, so a scalar statement must not
//! read anything a vector statement writes (before or after it), and must not
//! clobber anything an earlier vector statement reads.

use ahash::{AHashMap, AHashSet};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::*;

/// Output of [`classify`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ClassifiedStatements {
    pub scalar: Vec<IndexedStatement>,
    pub vector: Vec<IndexedStatement>,
    /// Local temporaries assigned in scalar code, in first-assignment order
    pub scalar_locals: Vec<String>,
    /// Per-iteration local temporaries assigned in vector code
    pub vector_locals: Vec<String>,
}

impl ClassifiedStatements {
    pub fn total(&self) -> usize {
        self.scalar.len() + self.vector.len()
    }

    pub fn scalar_statements(&self) -> impl Iterator<Item = &Statement> {
        self.scalar.iter().map(|s| &s.statement)
    }

    pub fn vector_statements(&self) -> impl Iterator<Item = &Statement> {
        self.vector.iter().map(|s| &s.statement)
    }

    pub fn is_local(&self, name: &str) -> bool {
        self.scalar_locals.iter().any(|l| l == name) || self.vector_locals.iter().any(|l| l == name)
    }
}

/// Partition `statements` into scalar and vector buckets
///
/// # Errors
///
/// - `ReadOnlyWrite` if a statement assigns a read-only variable
/// - `UnknownVariable` if a statement reads an undeclared, unassigned name
/// - `Dependency` if a scalar statement reads a variable that any vector
///   statement writes, writes a variable an earlier vector statement reads or
///   writes, or a local temporary changes between scalar and per-element use
pub fn classify(
    statements: &[Statement],
    variables: &VariableTable,
) -> CodegenResult<ClassifiedStatements> {
    let mut out = ClassifiedStatements::default();

    // local temporary -> declared in scalar code?
    let mut locals: AHashMap<String, bool> = AHashMap::new();
    let mut scalar_targets: AHashSet<String> = AHashSet::new();
    // first vector statement writing / reading each name
    let mut vector_writes: AHashMap<String, usize> = AHashMap::new();
    let mut vector_reads: AHashMap<String, usize> = AHashMap::new();
    // first scalar statement reading each name
    let mut scalar_reads: AHashMap<String, usize> = AHashMap::new();

    for (position, statement) in statements.iter().enumerate() {
        let target = statement.writes();
        let reads = statement.reads();

        if let Some(var) = variables.get(target) {
            if var.read_only {
                return Err(CodegenError::ReadOnlyWrite {
                    statement_index: position,
                    variable: target.to_string(),
                });
            }
        }

        for read in &reads {
            if !variables.contains(read) && !locals.contains_key(read) {
                return Err(CodegenError::UnknownVariable {
                    statement_index: position,
                    variable: read.clone(),
                });
            }
        }

        let target_is_scalar = match variables.get(target) {
            Some(var) => var.is_scalar(),
            None => locals.get(target).copied().unwrap_or(true),
        };

        let reads_are_scalar = reads.iter().all(|read| match variables.get(read.as_str()) {
            Some(var) => var.is_scalar(),
            None => scalar_targets.contains(read) || locals.get(read).copied().unwrap_or(false),
        });

        let is_scalar = target_is_scalar && reads_are_scalar;

        if !variables.contains(target) {
            match locals.get(target) {
                Some(&declared_scalar) if declared_scalar != is_scalar => {
                    return Err(CodegenError::Dependency {
                        statement_index: position,
                        variable: target.to_string(),
                        reason: "local temporary is assigned in both scalar and per-element code"
                            .to_string(),
                    });
                }
                Some(_) => {}
                None => {
                    locals.insert(target.to_string(), is_scalar);
                    if is_scalar {
                        out.scalar_locals.push(target.to_string());
                    } else {
                        out.vector_locals.push(target.to_string());
                    }
                }
            }
        }

        let indexed = IndexedStatement {
            position,
            statement: statement.clone(),
        };

        if is_scalar {
            check_hoistable(position, target, &reads, &vector_writes, &vector_reads)?;
            scalar_targets.insert(target.to_string());
            for read in reads {
                scalar_reads.entry(read).or_insert(position);
            }
            out.scalar.push(indexed);
        } else {
            if let Some(&reader) = scalar_reads.get(target) {
                return Err(CodegenError::Dependency {
                    statement_index: reader,
                    variable: target.to_string(),
                    reason: format!(
                        "scalar statement reads a value written later by vector statement {}",
                        position
                    ),
                });
            }
            vector_writes.entry(target.to_string()).or_insert(position);
            for read in reads {
                vector_reads.entry(read).or_insert(position);
            }
            out.vector.push(indexed);
        }
    }

    debug!(
        "[CLASSIFY] {} statements -> {} scalar, {} vector ({} scalar locals, {} vector locals)",
        statements.len(),
        out.scalar.len(),
        out.vector.len(),
        out.scalar_locals.len(),
        out.vector_locals.len()
    );

    Ok(out)
}

/// A scalar statement runs before the whole loop; reject it when an earlier
/// vector statement produces one of its inputs or consumes its output.
fn check_hoistable(
    position: usize,
    target: &str,
    reads: &[String],
    vector_writes: &AHashMap<String, usize>,
    vector_reads: &AHashMap<String, usize>,
) -> CodegenResult<()> {
    for read in reads {
        if let Some(&writer) = vector_writes.get(read) {
            return Err(CodegenError::Dependency {
                statement_index: position,
                variable: read.clone(),
                reason: format!(
                    "scalar statement reads a value produced by vector statement {}",
                    writer
                ),
            });
        }
    }

    if let Some(&reader) = vector_reads.get(target) {
        return Err(CodegenError::Dependency {
            statement_index: position,
            variable: target.to_string(),
            reason: format!(
                "scalar statement overwrites a value read earlier by vector statement {}",
                reader
            ),
        });
    }

    if let Some(&writer) = vector_writes.get(target) {
        return Err(CodegenError::Dependency {
            statement_index: position,
            variable: target.to_string(),
            reason: format!(
                "scalar statement overwrites a value written earlier by vector statement {}",
                writer
            ),
        });
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::expr::Expr;

    fn neuron_vars() -> VariableTable {
        VariableTable::new()
            .with(Variable::scalar("x", NumericType::F64))
            .with(Variable::scalar("total", NumericType::F64))
            .with(Variable::scalar("dt", NumericType::F64).read_only())
            .with(Variable::array("v", NumericType::F64))
            .with(Variable::array("w", NumericType::F64))
    }

    #[test]
    fn test_scalar_then_vector() {
        let stmts = vec![
            Statement::assign("x", Expr::num(2.0)),
            Statement::assign("v", Expr::var("v") + Expr::var("x")),
        ];
        let out = classify(&stmts, &neuron_vars()).unwrap();
        assert_eq!(out.scalar.len(), 1);
        assert_eq!(out.vector.len(), 1);
        assert_eq!(out.scalar[0].position, 0);
        assert_eq!(out.vector[0].position, 1);
    }

    #[test]
    fn test_scalar_closure_through_locals() {
        let stmts = vec![
            Statement::assign("_factor", Expr::var("dt") * Expr::num(0.5)),
            Statement::assign("x", Expr::var("_factor") + Expr::num(1.0)),
            Statement::assign("_tmp", Expr::var("v") * Expr::var("x")),
            Statement::assign("w", Expr::var("_tmp") + Expr::var("_factor")),
        ];
        let out = classify(&stmts, &neuron_vars()).unwrap();
        let scalar: Vec<usize> = out.scalar.iter().map(|s| s.position).collect();
        let vector: Vec<usize> = out.vector.iter().map(|s| s.position).collect();
        assert_eq!(scalar, vec![0, 1]);
        assert_eq!(vector, vec![2, 3]);
        assert_eq!(out.scalar_locals, vec!["_factor"]);
        assert_eq!(out.vector_locals, vec!["_tmp"]);
        assert!(out.is_local("_tmp"));
        assert!(!out.is_local("v"));
    }

    #[test]
    fn test_reduction_is_vector() {
        let stmts = vec![Statement::compound(
            "total",
            AssignOp::AddAssign,
            Expr::var("v"),
        )];
        let out = classify(&stmts, &neuron_vars()).unwrap();
        assert!(out.scalar.is_empty());
        assert_eq!(out.vector.len(), 1);
    }

    #[test]
    fn test_scalar_reading_vector_result_is_rejected() {
        let stmts = vec![
            Statement::assign("total", Expr::var("total") + Expr::var("v")),
            Statement::assign("x", Expr::var("total") * Expr::num(2.0)),
        ];
        let err = classify(&stmts, &neuron_vars()).unwrap_err();
        match err {
            CodegenError::Dependency {
                statement_index,
                variable,
                ..
            } => {
                assert_eq!(statement_index, 1);
                assert_eq!(variable, "total");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_scalar_reading_later_vector_write_is_rejected() {
        let stmts = vec![
            Statement::assign("x", Expr::var("total") * Expr::num(2.0)),
            Statement::assign("total", Expr::var("total") + Expr::var("v")),
        ];
        let err = classify(&stmts, &neuron_vars()).unwrap_err();
        match err {
            CodegenError::Dependency {
                statement_index,
                variable,
                ..
            } => {
                assert_eq!(statement_index, 0);
                assert_eq!(variable, "total");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_scalar_reading_unrelated_to_later_vector_write_is_fine() {
        let stmts = vec![
            Statement::assign("x", Expr::var("dt") * Expr::num(2.0)),
            Statement::assign("total", Expr::var("total") + Expr::var("v")),
        ];
        let out = classify(&stmts, &neuron_vars()).unwrap();
        assert_eq!(out.scalar.len(), 1);
        assert_eq!(out.vector.len(), 1);
    }

    #[test]
    fn test_scalar_overwriting_vector_input_is_rejected() {
        let stmts = vec![
            Statement::assign("v", Expr::var("v") + Expr::var("x")),
            Statement::assign("x", Expr::num(3.0)),
        ];
        let err = classify(&stmts, &neuron_vars()).unwrap_err();
        assert!(matches!(err, CodegenError::Dependency { statement_index: 1, .. }));
    }

    #[test]
    fn test_read_only_and_unknown() {
        let err = classify(&[Statement::assign("dt", Expr::num(0.1))], &neuron_vars()).unwrap_err();
        assert!(matches!(err, CodegenError::ReadOnlyWrite { .. }));

        let err = classify(&[Statement::assign("v", Expr::var("ghost"))], &neuron_vars()).unwrap_err();
        assert_eq!(
            err,
            CodegenError::UnknownVariable {
                statement_index: 0,
                variable: "ghost".to_string()
            }
        );
    }

    #[test]
    fn test_local_context_switch_is_rejected() {
        let stmts = vec![
            Statement::assign("_tmp", Expr::num(1.0)),
            Statement::assign("_tmp", Expr::var("v")),
        ];
        let err = classify(&stmts, &neuron_vars()).unwrap_err();
        assert!(matches!(err, CodegenError::Dependency { statement_index: 1, .. }));
    }
}
