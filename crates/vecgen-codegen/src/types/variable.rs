// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Variable metadata
//!
//! Variables are owned by the simulation runtime. Code generation only reads
//! their kind, numeric type and addressing, never their values.

use ahash::AHashMap;
use serde::{Deserialize, Serialize};

/// Storage kind of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableKind {
    /// One value shared by the whole population
    ScalarGlobal,
    /// One value per element
    PerElementArray,
}

/// Numeric type of a variable
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum NumericType {
    #[default]
    F64,
    F32,
    I32,
    I64,
    Bool,
}

impl NumericType {
    /// C/C++ spelling
    pub fn c_name(&self) -> &'static str {
        match self {
            NumericType::F64 => "double",
            NumericType::F32 => "float",
            NumericType::I32 => "int32_t",
            NumericType::I64 => "int64_t",
            NumericType::Bool => "char",
        }
    }

    /// Cython `cdef` spelling
    pub fn cython_name(&self) -> &'static str {
        match self {
            NumericType::F64 => "double",
            NumericType::F32 => "float",
            NumericType::I32 => "int",
            NumericType::I64 => "long",
            NumericType::Bool => "char",
        }
    }

    pub fn is_integral(&self) -> bool {
        matches!(self, NumericType::I32 | NumericType::I64 | NumericType::Bool)
    }

    /// `value` as a variable of this type holds it: integers truncate toward
    /// zero, booleans become `0.0` or `1.0`
    pub fn coerce(&self, value: f64) -> f64 {
        match self {
            NumericType::Bool => f64::from(u8::from(value != 0.0)),
            NumericType::F32 => f64::from(value as f32),
            _ if self.is_integral() => value.trunc(),
            _ => value,
        }
    }
}

/// How a per-element variable is addressed inside the vector loop
#[derive(Debug, Clone, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum VariableIndex {
    /// Addressed by the current element's own absolute index
    #[default]
    Own,
    /// Addressed through another per-element index array, e.g. a synapse
    /// reading its presynaptic neuron (`_presynaptic_idx`)
    Foreign(String),
}

/// A named quantity visible to generated code
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Variable {
    pub name: String,
    pub kind: VariableKind,
    #[serde(default)]
    pub dtype: NumericType,
    #[serde(default)]
    pub read_only: bool,
    #[serde(default)]
    pub index: VariableIndex,
    /// Backing storage array when it differs from `name` (e.g. `v_post`
    /// aliases the postsynaptic group's `v`)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub storage: Option<String>,
}

impl Variable {
    /// Scalar-global variable
    pub fn scalar(name: impl Into<String>, dtype: NumericType) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::ScalarGlobal,
            dtype,
            read_only: false,
            index: VariableIndex::Own,
            storage: None,
        }
    }

    /// Per-element array variable addressed by the element's own index
    pub fn array(name: impl Into<String>, dtype: NumericType) -> Self {
        Self {
            name: name.into(),
            kind: VariableKind::PerElementArray,
            dtype,
            read_only: false,
            index: VariableIndex::Own,
            storage: None,
        }
    }

    pub fn read_only(mut self) -> Self {
        self.read_only = true;
        self
    }

    /// Address this variable through another index array
    pub fn indexed_by(mut self, index_array: impl Into<String>) -> Self {
        self.index = VariableIndex::Foreign(index_array.into());
        self
    }

    /// Alias another storage array
    pub fn stored_in(mut self, storage: impl Into<String>) -> Self {
        self.storage = Some(storage.into());
        self
    }

    pub fn is_scalar(&self) -> bool {
        self.kind == VariableKind::ScalarGlobal
    }

    pub fn is_per_element(&self) -> bool {
        self.kind == VariableKind::PerElementArray
    }

    /// Name of the storage array this variable reads and writes
    pub fn storage_name(&self) -> &str {
        self.storage.as_deref().unwrap_or(&self.name)
    }

    /// Name of the foreign index array, if any
    pub fn foreign_index(&self) -> Option<&str> {
        match &self.index {
            VariableIndex::Own => None,
            VariableIndex::Foreign(name) => Some(name),
        }
    }
}

/// Variable metadata for one code object, keyed by name
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(from = "Vec<Variable>", into = "Vec<Variable>")]
pub struct VariableTable {
    variables: AHashMap<String, Variable>,
}

impl VariableTable {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert
    pub fn with(mut self, variable: Variable) -> Self {
        self.insert(variable);
        self
    }

    /// Insert or replace a variable, returning the previous definition
    pub fn insert(&mut self, variable: Variable) -> Option<Variable> {
        self.variables.insert(variable.name.clone(), variable)
    }

    pub fn get(&self, name: &str) -> Option<&Variable> {
        self.variables.get(name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.variables.contains_key(name)
    }

    pub fn is_per_element(&self, name: &str) -> bool {
        self.get(name).map(Variable::is_per_element).unwrap_or(false)
    }

    pub fn len(&self) -> usize {
        self.variables.len()
    }

    pub fn is_empty(&self) -> bool {
        self.variables.is_empty()
    }

    /// Variables sorted by name (deterministic order for rendering)
    pub fn sorted(&self) -> Vec<&Variable> {
        let mut vars: Vec<&Variable> = self.variables.values().collect();
        vars.sort_by(|a, b| a.name.cmp(&b.name));
        vars
    }
}

impl From<Vec<Variable>> for VariableTable {
    fn from(variables: Vec<Variable>) -> Self {
        variables.into_iter().collect()
    }
}

impl From<VariableTable> for Vec<Variable> {
    fn from(table: VariableTable) -> Self {
        table.sorted().into_iter().cloned().collect()
    }
}

impl FromIterator<Variable> for VariableTable {
    fn from_iter<I: IntoIterator<Item = Variable>>(iter: I) -> Self {
        let mut table = VariableTable::new();
        for variable in iter {
            table.insert(variable);
        }
        table
    }
}
