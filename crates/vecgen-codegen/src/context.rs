// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Vectorisation context
//!
//! The "current index" every per-element access is made against. It is an
//! explicit value passed to each rendering or evaluation call: the sentinel
//! in scalar code, one absolute element index per loop iteration.

use serde::{Deserialize, Serialize};

use crate::indexing::LoopPlan;
use crate::types::{CodegenError, CodegenResult, Variable};

/// Name of the vectorisation index in generated code
pub const VECTORISATION_IDX: &str = "_vectorisation_idx";

/// Name of the absolute element index in generated loop bodies
pub const ABSOLUTE_IDX: &str = "_idx";

/// Vectorisation index value while scalar code runs
pub const SCALAR_SENTINEL: i64 = -1;

/// Current vectorisation index
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VectorisationContext {
    Scalar,
    Element(usize),
}

impl VectorisationContext {
    pub fn scalar() -> Self {
        VectorisationContext::Scalar
    }

    pub fn element(index: usize) -> Self {
        VectorisationContext::Element(index)
    }

    /// Integer bound to `_vectorisation_idx`
    pub fn value(&self) -> i64 {
        match self {
            VectorisationContext::Scalar => SCALAR_SENTINEL,
            VectorisationContext::Element(index) => *index as i64,
        }
    }

    pub fn element_index(&self) -> Option<usize> {
        match self {
            VectorisationContext::Scalar => None,
            VectorisationContext::Element(index) => Some(*index),
        }
    }

    pub fn is_scalar(&self) -> bool {
        matches!(self, VectorisationContext::Scalar)
    }

    /// Reject per-element access while the sentinel is bound
    pub fn check_access(&self, variable: &Variable) -> CodegenResult<()> {
        if self.is_scalar() && variable.is_per_element() {
            return Err(CodegenError::ScalarContextAccess(variable.name.clone()));
        }
        Ok(())
    }

    /// `const int _vectorisation_idx = ...;` line for C-family targets
    pub fn declaration(&self) -> String {
        match self {
            VectorisationContext::Scalar => {
                format!("const int {} = {};", VECTORISATION_IDX, SCALAR_SENTINEL)
            }
            VectorisationContext::Element(_) => {
                format!("const int {} = {};", VECTORISATION_IDX, ABSOLUTE_IDX)
            }
        }
    }
}

/// Contexts the vector loop of `plan` binds, in iteration order
///
/// `None` if the index-array contents are unbound or an entry is negative.
pub fn element_contexts(plan: &LoopPlan) -> Option<Vec<VectorisationContext>> {
    plan.indices()?
        .into_iter()
        .map(|index| usize::try_from(index).ok().map(VectorisationContext::Element))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indexing::resolve;
    use crate::types::{NumericType, TargetingMode};

    #[test]
    fn test_sentinel_and_element() {
        assert_eq!(VectorisationContext::scalar().value(), -1);
        assert_eq!(VectorisationContext::element(7).value(), 7);
        assert_eq!(VectorisationContext::element(7).element_index(), Some(7));
        assert_eq!(
            VectorisationContext::scalar().declaration(),
            "const int _vectorisation_idx = -1;"
        );
        assert_eq!(
            VectorisationContext::element(0).declaration(),
            "const int _vectorisation_idx = _idx;"
        );
    }

    #[test]
    fn test_scalar_context_rejects_per_element_access() {
        let v = Variable::array("v", NumericType::F64);
        let x = Variable::scalar("x", NumericType::F64);
        assert!(VectorisationContext::scalar().check_access(&x).is_ok());
        assert_eq!(
            VectorisationContext::scalar().check_access(&v),
            Err(CodegenError::ScalarContextAccess("v".to_string()))
        );
        assert!(VectorisationContext::element(2).check_access(&v).is_ok());
    }

    #[test]
    fn test_element_contexts_follow_plan() {
        let plan = resolve(&TargetingMode::all(5)).unwrap();
        let values: Vec<i64> = element_contexts(&plan)
            .unwrap()
            .iter()
            .map(|c| c.value())
            .collect();
        assert_eq!(values, vec![0, 1, 2, 3, 4]);

        let plan = resolve(&TargetingMode::group("_group_idx", vec![3, 1, 1, 4])).unwrap();
        let values: Vec<i64> = element_contexts(&plan)
            .unwrap()
            .iter()
            .map(|c| c.value())
            .collect();
        assert_eq!(values, vec![3, 1, 1, 4]);

        let plan = resolve(&TargetingMode::group("_group_idx", vec![0, -2])).unwrap();
        assert_eq!(element_contexts(&plan), None);
    }
}
