// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Error types for code generation
//!
//! Every error here is detected statically, before any generated code is
//! compiled or executed. Generation is deterministic, so re-running with the
//! same inputs reproduces the same error; nothing is retried.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Code generation errors
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "detail", rename_all = "snake_case")]
pub enum CodegenError {
    /// A scalar statement cannot be hoisted ahead of the per-element loop
    #[error("Dependency error in statement {statement_index} on '{variable}': {reason}")]
    Dependency {
        statement_index: usize,
        variable: String,
        reason: String,
    },

    /// A statement assigns to a variable declared read-only
    #[error("Statement {statement_index} writes read-only variable '{variable}'")]
    ReadOnlyWrite {
        statement_index: usize,
        variable: String,
    },

    /// A statement reads a name that is neither declared nor assigned earlier
    #[error("Statement {statement_index} reads unknown variable '{variable}'")]
    UnknownVariable {
        statement_index: usize,
        variable: String,
    },

    /// Malformed targeting mode (negative count, missing index array, ...)
    #[error("Invalid targeting: {0}")]
    InvalidTargeting(String),

    /// Cross-iteration accumulation the chosen backend cannot parallelise safely.
    ///
    /// Recorded on a [`crate::ParallelDecision`] as the cause of a serial
    /// fallback rather than returned as a generation failure.
    #[error("Unsafe reduction in statement {statement_index} on '{variable}': {reason}")]
    UnsafeReduction {
        statement_index: usize,
        variable: String,
        reason: String,
    },

    /// Per-element variable addressed while the vectorisation index holds
    /// the scalar sentinel
    #[error("Per-element variable '{0}' accessed in scalar context")]
    ScalarContextAccess(String),

    /// Template references a placeholder with no value
    #[error("Template placeholder '{0}' has no substitution")]
    MissingPlaceholder(String),

    /// Template text could not be parsed
    #[error("Malformed template: {0}")]
    MalformedTemplate(String),

    /// Backend name not recognised
    #[error("Unknown backend: {0}")]
    UnknownBackend(String),
}

impl CodegenError {
    /// Position of the offending statement in the input list, if any
    pub fn statement_index(&self) -> Option<usize> {
        match self {
            CodegenError::Dependency { statement_index, .. }
            | CodegenError::ReadOnlyWrite { statement_index, .. }
            | CodegenError::UnknownVariable { statement_index, .. }
            | CodegenError::UnsafeReduction { statement_index, .. } => Some(*statement_index),
            _ => None,
        }
    }
}

/// Result type for code generation operations
pub type CodegenResult<T> = Result<T, CodegenError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages_carry_context() {
        let err = CodegenError::Dependency {
            statement_index: 3,
            variable: "total".to_string(),
            reason: "reads a value produced by vector statement 1".to_string(),
        };
        let msg = err.to_string();
        assert!(msg.contains("statement 3"));
        assert!(msg.contains("total"));
        assert_eq!(err.statement_index(), Some(3));

        let err = CodegenError::InvalidTargeting("negative count -1".to_string());
        assert_eq!(err.statement_index(), None);
    }
}
