// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Population Store
//!
//! In-memory state of one group of elements: scalar-globals, per-element
//! arrays (Structure-of-Arrays) and integer index arrays. Every numeric type
//! is held as `f64`; booleans are `0.0` / `1.0`.
//!
//! Arrays may be longer than the population when they alias another group's
//! storage (a synapse group reading its presynaptic neurons).

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

use crate::error::{ExecutionError, ExecutionResult};

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Population {
    size: usize,
    #[serde(default)]
    scalars: AHashMap<String, f64>,
    #[serde(default)]
    arrays: AHashMap<String, Vec<f64>>,
    #[serde(default)]
    index_arrays: AHashMap<String, Vec<i64>>,
}

impl Population {
    /// Empty population of `size` elements
    pub fn new(size: usize) -> Self {
        Self {
            size,
            ..Default::default()
        }
    }

    pub fn size(&self) -> usize {
        self.size
    }

    pub fn with_scalar(mut self, name: impl Into<String>, value: f64) -> Self {
        self.set_scalar(name, value);
        self
    }

    /// Builder for a per-element array filled with `value`
    pub fn with_filled(mut self, name: impl Into<String>, value: f64) -> Self {
        self.arrays.insert(name.into(), vec![value; self.size]);
        self
    }

    pub fn set_scalar(&mut self, name: impl Into<String>, value: f64) {
        self.scalars.insert(name.into(), value);
    }

    /// Store a per-element array of exactly `size` values
    pub fn set_array(&mut self, name: impl Into<String>, values: Vec<f64>) -> ExecutionResult<()> {
        let name = name.into();
        if values.len() != self.size {
            return Err(ExecutionError::LengthMismatch {
                array: name,
                expected: self.size,
                actual: values.len(),
            });
        }
        self.arrays.insert(name, values);
        Ok(())
    }

    /// Store an array of any length (storage owned by another group)
    pub fn set_foreign_array(&mut self, name: impl Into<String>, values: Vec<f64>) {
        self.arrays.insert(name.into(), values);
    }

    pub fn set_index_array(&mut self, name: impl Into<String>, entries: Vec<i64>) {
        self.index_arrays.insert(name.into(), entries);
    }

    pub fn scalar(&self, name: &str) -> ExecutionResult<f64> {
        self.scalars
            .get(name)
            .copied()
            .ok_or_else(|| ExecutionError::UnknownArray(name.to_string()))
    }

    pub fn array(&self, name: &str) -> ExecutionResult<&[f64]> {
        self.arrays
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ExecutionError::UnknownArray(name.to_string()))
    }

    pub fn index_array(&self, name: &str) -> ExecutionResult<&[i64]> {
        self.index_arrays
            .get(name)
            .map(Vec::as_slice)
            .ok_or_else(|| ExecutionError::UnknownArray(name.to_string()))
    }

    pub fn has_index_array(&self, name: &str) -> bool {
        self.index_arrays.contains_key(name)
    }

    /// Bounds-checked element read
    pub fn element(&self, name: &str, index: i64) -> ExecutionResult<f64> {
        let values = self.array(name)?;
        let slot = checked_slot(name, index, values.len())?;
        Ok(values[slot])
    }

    /// Bounds-checked element write
    pub fn set_element(&mut self, name: &str, index: usize, value: f64) -> ExecutionResult<()> {
        let values = self
            .arrays
            .get_mut(name)
            .ok_or_else(|| ExecutionError::UnknownArray(name.to_string()))?;
        let len = values.len();
        let slot = values.get_mut(index).ok_or(ExecutionError::IndexOutOfRange {
            array: name.to_string(),
            index: index as i64,
            len,
        })?;
        *slot = value;
        Ok(())
    }
}

/// Convert a signed index into a slot of an array of length `len`
pub fn checked_slot(array: &str, index: i64, len: usize) -> ExecutionResult<usize> {
    match usize::try_from(index) {
        Ok(slot) if slot < len => Ok(slot),
        _ => Err(ExecutionError::IndexOutOfRange {
            array: array.to_string(),
            index,
            len,
        }),
    }
}
