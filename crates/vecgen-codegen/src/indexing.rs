// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Indexing Resolver
//!
//! Maps the loop counter `i ∈ [0, count)` of a vector loop to the absolute
//! element index that per-element statements address:
//!
//! | Mode                     | count | absolute index |
//! |--------------------------|-------|----------------|
//! | `AllElements(n)`         | n     | `i`            |
//! | `ContiguousRange(s, n)`  | n     | `s + i`        |
//! | `IndexArray(arr, n)`     | n     | `arr[i]`       |
//!
//! Index-array entries are taken as given: unsorted, possibly duplicated,
//! never range checked here. Every entry is visited once per entry.

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::types::{CodegenError, CodegenResult, TargetingMode};

/// Counter used by direct (non-indirect) loops
pub const DIRECT_COUNTER: &str = "_i";

/// How the loop counter becomes an absolute index
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum IndexExpression {
    /// `index(i) = i`
    Identity,
    /// `index(i) = start + i`
    Offset { start: usize },
    /// `index(i) = array[i]`; entries are known when bound at plan time
    Indirect {
        array: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        entries: Option<Vec<i64>>,
    },
}

/// Loop plan for one code-generation call
///
/// Immutable once resolved; binding index-array contents yields a new plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoopPlan {
    iteration_count: usize,
    index: IndexExpression,
    uses_indirection: bool,
}

impl LoopPlan {
    pub fn iteration_count(&self) -> usize {
        self.iteration_count
    }

    pub fn index(&self) -> &IndexExpression {
        &self.index
    }

    pub fn uses_indirection(&self) -> bool {
        self.uses_indirection
    }

    /// Whether the iteration count is a compile-time literal in generated code
    pub fn is_count_static(&self) -> bool {
        !self.uses_indirection
    }

    /// Name of the index array, for indirect plans
    pub fn index_array(&self) -> Option<&str> {
        match &self.index {
            IndexExpression::Indirect { array, .. } => Some(array),
            _ => None,
        }
    }

    /// Absolute index for loop counter `i`
    ///
    /// `None` when `i` is past the end, or the plan is indirect and the
    /// array contents are not bound yet.
    pub fn absolute_index(&self, i: usize) -> Option<i64> {
        if i >= self.iteration_count {
            return None;
        }
        match &self.index {
            IndexExpression::Identity => Some(i as i64),
            IndexExpression::Offset { start } => Some((start + i) as i64),
            IndexExpression::Indirect { entries, .. } => {
                entries.as_ref().and_then(|e| e.get(i).copied())
            }
        }
    }

    /// All absolute indices in loop order, `None` if the contents are unbound
    pub fn indices(&self) -> Option<Vec<i64>> {
        (0..self.iteration_count)
            .map(|i| self.absolute_index(i))
            .collect()
    }

    /// Bind index-array contents, producing a new plan
    ///
    /// # Errors
    ///
    /// `InvalidTargeting` if the plan is not indirect or `entries` is shorter
    /// than the iteration count.
    pub fn bind_index_array(&self, entries: &[i64]) -> CodegenResult<LoopPlan> {
        let array = self.index_array().ok_or_else(|| {
            CodegenError::InvalidTargeting(
                "cannot bind index-array contents to a direct loop".to_string(),
            )
        })?;
        check_entry_count(array, entries.len(), self.iteration_count)?;
        Ok(LoopPlan {
            iteration_count: self.iteration_count,
            index: IndexExpression::Indirect {
                array: array.to_string(),
                entries: Some(entries[..self.iteration_count].to_vec()),
            },
            uses_indirection: true,
        })
    }

    /// Loop counter name: `_i`, or `_idx_group_idx` for array `_group_idx`
    pub fn counter_name(&self) -> String {
        match self.index_array() {
            Some(array) => prefixed("_idx", array),
            None => DIRECT_COUNTER.to_string(),
        }
    }

    /// Iteration-count text: a literal, or `_num_group_idx` for array `_group_idx`
    pub fn iteration_count_expression(&self) -> String {
        match self.index_array() {
            Some(array) => array_size_name(array),
            None => self.iteration_count.to_string(),
        }
    }

    /// Absolute-index text in terms of [`Self::counter_name`]
    pub fn index_expression_text(&self) -> String {
        let counter = self.counter_name();
        match &self.index {
            IndexExpression::Identity => counter,
            IndexExpression::Offset { start } => format!("{} + {}", start, counter),
            IndexExpression::Indirect { array, .. } => format!("{}[{}]", array, counter),
        }
    }
}

/// Length of `array` as generated code names it: `_num_v`, `_num_group_idx`
pub fn array_size_name(array: &str) -> String {
    prefixed("_num", array)
}

fn prefixed(prefix: &str, array: &str) -> String {
    if array.starts_with('_') {
        format!("{}{}", prefix, array)
    } else {
        format!("{}_{}", prefix, array)
    }
}

fn check_entry_count(array: &str, len: usize, count: usize) -> CodegenResult<()> {
    if len < count {
        return Err(CodegenError::InvalidTargeting(format!(
            "index array '{}' has {} entries but {} iterations were requested",
            array, len, count
        )));
    }
    Ok(())
}

fn non_negative(value: i64, what: &str) -> CodegenResult<usize> {
    if value < 0 {
        return Err(CodegenError::InvalidTargeting(format!(
            "negative {}: {}",
            what, value
        )));
    }
    usize::try_from(value).map_err(|_| {
        CodegenError::InvalidTargeting(format!("{} out of range: {}", what, value))
    })
}

/// Every `start + i` must be representable as an absolute index
fn range_end(start: i64, count: i64) -> CodegenResult<()> {
    let end = start.checked_add(count).ok_or_else(|| {
        CodegenError::InvalidTargeting(format!(
            "range start {} + count {} overflows the index type",
            start, count
        ))
    })?;
    non_negative(end, "range end").map(|_| ())
}

/// Resolve a targeting mode into a loop plan
///
/// Pure and idempotent: resolving the same mode twice yields equal plans.
///
/// # Errors
///
/// `InvalidTargeting` for a negative count or start, a range whose end
/// overflows the index type, an unset index array (missing or empty name),
/// or bound contents shorter than the count.
pub fn resolve(mode: &TargetingMode) -> CodegenResult<LoopPlan> {
    let plan = match mode {
        TargetingMode::AllElements { count } => LoopPlan {
            iteration_count: non_negative(*count, "count")?,
            index: IndexExpression::Identity,
            uses_indirection: false,
        },
        TargetingMode::ContiguousRange { start, count } => {
            let plan = LoopPlan {
                iteration_count: non_negative(*count, "count")?,
                index: IndexExpression::Offset {
                    start: non_negative(*start, "start")?,
                },
                uses_indirection: false,
            };
            range_end(*start, *count)?;
            plan
        }
        TargetingMode::IndexArray { array, count } => {
            let count = non_negative(*count, "count")?;
            let array = array
                .as_ref()
                .filter(|a| !a.name.is_empty())
                .ok_or_else(|| {
                    CodegenError::InvalidTargeting("index array is not set".to_string())
                })?;
            let entries = match &array.entries {
                Some(entries) => {
                    check_entry_count(&array.name, entries.len(), count)?;
                    Some(entries[..count].to_vec())
                }
                None => None,
            };
            LoopPlan {
                iteration_count: count,
                index: IndexExpression::Indirect {
                    array: array.name.clone(),
                    entries,
                },
                uses_indirection: true,
            }
        }
    };

    debug!(
        "[RESOLVE] {} -> count={}, index='{}', indirection={}",
        mode.mode_name(),
        plan.iteration_count,
        plan.index_expression_text(),
        plan.uses_indirection
    );

    Ok(plan)
}
