// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Core Types
//!
//! Statements, variable metadata, targeting modes and errors shared by the
//! classifier, resolver, annotator and backends.

pub mod error;
pub mod statement;
pub mod targeting;
pub mod variable;

pub use error::{CodegenError, CodegenResult};
pub use statement::{AssignOp, IndexedStatement, Statement};
pub use targeting::{IndexArrayRef, TargetingMode};
pub use variable::{NumericType, Variable, VariableIndex, VariableKind, VariableTable};
