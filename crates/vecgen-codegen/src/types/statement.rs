// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Assignment statements

use serde::{Deserialize, Serialize};
use std::fmt;

use super::variable::VariableTable;
use crate::expr::{BinaryOp, Expr};

/// Assignment operator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AssignOp {
    #[default]
    Assign,
    AddAssign,
    SubAssign,
    MulAssign,
    DivAssign,
}

impl AssignOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            AssignOp::Assign => "=",
            AssignOp::AddAssign => "+=",
            AssignOp::SubAssign => "-=",
            AssignOp::MulAssign => "*=",
            AssignOp::DivAssign => "/=",
        }
    }

    /// Binary operator a compound assignment applies, `None` for plain `=`
    pub fn binary_op(&self) -> Option<BinaryOp> {
        match self {
            AssignOp::Assign => None,
            AssignOp::AddAssign => Some(BinaryOp::Add),
            AssignOp::SubAssign => Some(BinaryOp::Sub),
            AssignOp::MulAssign => Some(BinaryOp::Mul),
            AssignOp::DivAssign => Some(BinaryOp::Div),
        }
    }

    pub fn is_compound(&self) -> bool {
        *self != AssignOp::Assign
    }
}

/// `target op= expr`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Statement {
    pub target: String,
    #[serde(default)]
    pub op: AssignOp,
    pub expr: Expr,
}

impl Statement {
    /// `target = expr`
    pub fn assign(target: impl Into<String>, expr: Expr) -> Self {
        Self {
            target: target.into(),
            op: AssignOp::Assign,
            expr,
        }
    }

    /// `target op= expr`
    pub fn compound(target: impl Into<String>, op: AssignOp, expr: Expr) -> Self {
        Self {
            target: target.into(),
            op,
            expr,
        }
    }

    /// Names this statement reads; compound assignments also read their target
    pub fn reads(&self) -> Vec<String> {
        let mut reads = self.expr.identifiers();
        if self.op.is_compound() && !reads.iter().any(|r| r == &self.target) {
            reads.insert(0, self.target.clone());
        }
        reads
    }

    /// The single name this statement writes
    pub fn writes(&self) -> &str {
        &self.target
    }

    /// Right-hand side with any compound operator expanded (`t += e` gives `t + e`)
    pub fn effective_expr(&self) -> Expr {
        match self.op.binary_op() {
            None => self.expr.clone(),
            Some(op) => Expr::binary(op, Expr::var(self.target.clone()), self.expr.clone()),
        }
    }

    /// Metadata-only scalar flag: neither the target nor any read is a
    /// per-element variable. Names absent from the table count as scalar.
    pub fn scalar_flag(&self, variables: &VariableTable) -> bool {
        !variables.is_per_element(&self.target)
            && self.reads().iter().all(|r| !variables.is_per_element(r))
    }
}

impl fmt::Display for Statement {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} {} {}", self.target, self.op.symbol(), self.expr)
    }
}

/// A statement together with its position in the original input
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndexedStatement {
    pub position: usize,
    pub statement: Statement,
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::variable::{NumericType, Variable};

    #[test]
    fn test_compound_reads_include_target() {
        let s = Statement::compound("total", AssignOp::AddAssign, Expr::var("v"));
        assert_eq!(s.reads(), vec!["total", "v"]);
        assert_eq!(s.writes(), "total");
        assert_eq!(s.effective_expr(), Expr::var("total") + Expr::var("v"));
        assert_eq!(s.to_string(), "total += v");
    }

    #[test]
    fn test_plain_assignment_reads() {
        let s = Statement::assign("v", Expr::var("v") + Expr::var("x"));
        assert_eq!(s.reads(), vec!["v", "x"]);
        assert_eq!(s.effective_expr(), s.expr);
    }

    #[test]
    fn test_scalar_flag() {
        let vars = VariableTable::new()
            .with(Variable::scalar("x", NumericType::F64))
            .with(Variable::array("v", NumericType::F64));

        assert!(Statement::assign("x", Expr::num(2.0)).scalar_flag(&vars));
        assert!(!Statement::assign("v", Expr::var("v") + Expr::var("x")).scalar_flag(&vars));
        assert!(!Statement::assign("x", Expr::var("v")).scalar_flag(&vars));
    }
}
