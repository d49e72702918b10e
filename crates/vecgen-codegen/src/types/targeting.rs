// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Targeting modes: which elements a code object updates

use serde::{Deserialize, Serialize};

/// Reference to a group-index array variable
///
/// `entries` is populated when the subset is already known at generation
/// time; otherwise the runtime binds the contents at execution.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IndexArrayRef {
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entries: Option<Vec<i64>>,
}

impl IndexArrayRef {
    pub fn unbound(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            entries: None,
        }
    }

    pub fn bound(name: impl Into<String>, entries: Vec<i64>) -> Self {
        Self {
            name: name.into(),
            entries: Some(entries),
        }
    }
}

/// Which elements a code object iterates over
///
/// Counts are signed because they arrive from external collaborators;
/// negative values are rejected by the indexing resolver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum TargetingMode {
    AllElements {
        count: i64,
    },
    ContiguousRange {
        start: i64,
        count: i64,
    },
    IndexArray {
        array: Option<IndexArrayRef>,
        count: i64,
    },
}

impl TargetingMode {
    pub fn all(count: i64) -> Self {
        TargetingMode::AllElements { count }
    }

    pub fn range(start: i64, count: i64) -> Self {
        TargetingMode::ContiguousRange { start, count }
    }

    /// Subset known now; the count is the number of entries
    pub fn group(name: impl Into<String>, entries: Vec<i64>) -> Self {
        let count = entries.len() as i64;
        TargetingMode::IndexArray {
            array: Some(IndexArrayRef::bound(name, entries)),
            count,
        }
    }

    /// Subset whose contents are bound at execution time
    pub fn index_array(name: impl Into<String>, count: i64) -> Self {
        TargetingMode::IndexArray {
            array: Some(IndexArrayRef::unbound(name)),
            count,
        }
    }

    pub fn count(&self) -> i64 {
        match self {
            TargetingMode::AllElements { count }
            | TargetingMode::ContiguousRange { count, .. }
            | TargetingMode::IndexArray { count, .. } => *count,
        }
    }

    pub fn mode_name(&self) -> &'static str {
        match self {
            TargetingMode::AllElements { .. } => "all_elements",
            TargetingMode::ContiguousRange { .. } => "contiguous_range",
            TargetingMode::IndexArray { .. } => "index_array",
        }
    }
}
