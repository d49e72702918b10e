// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Runtime error types

use thiserror::Error;
use vecgen_codegen::CodegenError;

/// Errors raised while executing a code object
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ExecutionError {
    /// Variable or index array with no backing storage
    #[error("Unknown array: {0}")]
    UnknownArray(String),

    #[error("Array '{array}' has length {actual}, expected {expected}")]
    LengthMismatch {
        array: String,
        expected: usize,
        actual: usize,
    },

    /// Absolute index outside the addressed array
    #[error("Index {index} out of range for '{array}' (length {len})")]
    IndexOutOfRange { array: String, index: i64, len: usize },

    /// Per-element variable read or written while the sentinel is bound
    #[error("Per-element variable '{0}' accessed in scalar context")]
    ScalarContextAccess(String),

    /// Index-array contents neither carried by the plan nor stored
    #[error("Index array '{0}' is not bound")]
    UnboundIndexArray(String),

    #[error("Thread pool error: {0}")]
    ThreadPool(String),

    #[error(transparent)]
    Codegen(#[from] CodegenError),
}

/// Result type for runtime operations
pub type ExecutionResult<T> = Result<T, ExecutionError>;
