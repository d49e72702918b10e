// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Expression Model
//!
//! Right-hand sides of statements, already resolved by the equation system.
//!
//! Two operations matter to the core:
//! - **identifier extraction**: the read-set of a statement
//! - **rendering**: target-language text, with every identifier replaced by
//!   whatever the backend decides (scalar name, array access through the
//!   vectorisation index, ...)

use serde::{Deserialize, Serialize};
use std::fmt;

/// Binary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
    Lt,
    Le,
    Gt,
    Ge,
    Eq,
    Ne,
    And,
    Or,
}

/// Unary operators
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnaryOp {
    Neg,
    Not,
}

/// Built-in functions available in every backend
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Function {
    Min,
    Max,
    Abs,
    Exp,
    Log,
    Sqrt,
    Floor,
    Ceil,
}

impl Function {
    /// Number of arguments the function takes
    pub fn arity(&self) -> usize {
        match self {
            Function::Min | Function::Max => 2,
            _ => 1,
        }
    }
}

/// Expression tree
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Expr {
    Number(f64),
    Bool(bool),
    Variable(String),
    Unary {
        op: UnaryOp,
        operand: Box<Expr>,
    },
    Binary {
        op: BinaryOp,
        lhs: Box<Expr>,
        rhs: Box<Expr>,
    },
    Call {
        function: Function,
        args: Vec<Expr>,
    },
}

impl Expr {
    pub fn var(name: impl Into<String>) -> Self {
        Expr::Variable(name.into())
    }

    pub fn num(value: f64) -> Self {
        Expr::Number(value)
    }

    pub fn binary(op: BinaryOp, lhs: Expr, rhs: Expr) -> Self {
        Expr::Binary {
            op,
            lhs: Box::new(lhs),
            rhs: Box::new(rhs),
        }
    }

    pub fn unary(op: UnaryOp, operand: Expr) -> Self {
        Expr::Unary {
            op,
            operand: Box::new(operand),
        }
    }

    pub fn call(function: Function, args: Vec<Expr>) -> Self {
        Expr::Call { function, args }
    }

    pub fn min(a: Expr, b: Expr) -> Self {
        Expr::call(Function::Min, vec![a, b])
    }

    pub fn max(a: Expr, b: Expr) -> Self {
        Expr::call(Function::Max, vec![a, b])
    }

    pub fn lt(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Lt, self, rhs)
    }

    pub fn gt(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Gt, self, rhs)
    }

    pub fn ge(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::Ge, self, rhs)
    }

    pub fn and(self, rhs: Expr) -> Self {
        Expr::binary(BinaryOp::And, self, rhs)
    }

    /// Identifiers in order of first appearance, without duplicates
    pub fn identifiers(&self) -> Vec<String> {
        let mut out = Vec::new();
        self.collect_identifiers(&mut out);
        out
    }

    fn collect_identifiers(&self, out: &mut Vec<String>) {
        match self {
            Expr::Number(_) | Expr::Bool(_) => {}
            Expr::Variable(name) => {
                if !out.iter().any(|n| n == name) {
                    out.push(name.clone());
                }
            }
            Expr::Unary { operand, .. } => operand.collect_identifiers(out),
            Expr::Binary { lhs, rhs, .. } => {
                lhs.collect_identifiers(out);
                rhs.collect_identifiers(out);
            }
            Expr::Call { args, .. } => {
                for arg in args {
                    arg.collect_identifiers(out);
                }
            }
        }
    }

    /// Whether `name` occurs anywhere in the expression
    pub fn references(&self, name: &str) -> bool {
        match self {
            Expr::Number(_) | Expr::Bool(_) => false,
            Expr::Variable(n) => n == name,
            Expr::Unary { operand, .. } => operand.references(name),
            Expr::Binary { lhs, rhs, .. } => lhs.references(name) || rhs.references(name),
            Expr::Call { args, .. } => args.iter().any(|a| a.references(name)),
        }
    }

    /// Render to target-language text
    ///
    /// `resolve` maps each identifier to its spelling in the target (for
    /// per-element variables this is where the vectorisation index enters).
    pub fn render(&self, syntax: &dyn ExprSyntax, resolve: &mut dyn FnMut(&str) -> String) -> String {
        match self {
            Expr::Number(value) => syntax.number_literal(*value),
            Expr::Bool(value) => syntax.bool_literal(*value).to_string(),
            Expr::Variable(name) => resolve(name),
            Expr::Unary { op, operand } => {
                let inner = operand.render(syntax, resolve);
                format!("({}{})", syntax.unary_op(*op), inner)
            }
            Expr::Binary { op, lhs, rhs } => {
                let l = lhs.render(syntax, resolve);
                let r = rhs.render(syntax, resolve);
                format!("({} {} {})", l, syntax.binary_op(*op), r)
            }
            Expr::Call { function, args } => {
                let rendered: Vec<String> = args.iter().map(|a| a.render(syntax, resolve)).collect();
                format!("{}({})", syntax.function_name(*function), rendered.join(", "))
            }
        }
    }
}

impl fmt::Display for Expr {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let text = self.render(&NeutralSyntax, &mut |name: &str| name.to_string());
        write!(f, "{}", text)
    }
}

impl From<f64> for Expr {
    fn from(value: f64) -> Self {
        Expr::Number(value)
    }
}

impl From<&str> for Expr {
    fn from(name: &str) -> Self {
        Expr::var(name)
    }
}

impl std::ops::Add for Expr {
    type Output = Expr;
    fn add(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Add, self, rhs)
    }
}

impl std::ops::Sub for Expr {
    type Output = Expr;
    fn sub(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Sub, self, rhs)
    }
}

impl std::ops::Mul for Expr {
    type Output = Expr;
    fn mul(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Mul, self, rhs)
    }
}

impl std::ops::Div for Expr {
    type Output = Expr;
    fn div(self, rhs: Expr) -> Expr {
        Expr::binary(BinaryOp::Div, self, rhs)
    }
}

impl std::ops::Neg for Expr {
    type Output = Expr;
    fn neg(self) -> Expr {
        Expr::unary(UnaryOp::Neg, self)
    }
}

/// Target-language spelling of operators, literals and functions
pub trait ExprSyntax {
    fn binary_op(&self, op: BinaryOp) -> &'static str;

    fn unary_op(&self, op: UnaryOp) -> &'static str;

    fn bool_literal(&self, value: bool) -> &'static str;

    fn function_name(&self, function: Function) -> &'static str;

    fn number_literal(&self, value: f64) -> String {
        if value.is_nan() {
            "NAN".to_string()
        } else if value.is_infinite() {
            if value > 0.0 {
                "INFINITY".to_string()
            } else {
                "(-INFINITY)".to_string()
            }
        } else {
            // Debug formatting keeps a decimal point on integral values (2.0)
            format!("{:?}", value)
        }
    }
}

/// C-family operator spelling, shared by logging and the C++ backend
#[derive(Debug, Clone, Copy, Default)]
pub struct NeutralSyntax;

impl ExprSyntax for NeutralSyntax {
    fn binary_op(&self, op: BinaryOp) -> &'static str {
        match op {
            BinaryOp::Add => "+",
            BinaryOp::Sub => "-",
            BinaryOp::Mul => "*",
            BinaryOp::Div => "/",
            BinaryOp::Lt => "<",
            BinaryOp::Le => "<=",
            BinaryOp::Gt => ">",
            BinaryOp::Ge => ">=",
            BinaryOp::Eq => "==",
            BinaryOp::Ne => "!=",
            BinaryOp::And => "&&",
            BinaryOp::Or => "||",
        }
    }

    fn unary_op(&self, op: UnaryOp) -> &'static str {
        match op {
            UnaryOp::Neg => "-",
            UnaryOp::Not => "!",
        }
    }

    fn bool_literal(&self, value: bool) -> &'static str {
        if value {
            "true"
        } else {
            "false"
        }
    }

    fn function_name(&self, function: Function) -> &'static str {
        match function {
            Function::Min => "fmin",
            Function::Max => "fmax",
            Function::Abs => "fabs",
            Function::Exp => "exp",
            Function::Log => "log",
            Function::Sqrt => "sqrt",
            Function::Floor => "floor",
            Function::Ceil => "ceil",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identifiers_first_appearance_order() {
        let e = Expr::var("v") + Expr::var("x") * Expr::var("v") - Expr::var("dt");
        assert_eq!(e.identifiers(), vec!["v", "x", "dt"]);
        assert!(e.references("dt"));
        assert!(!e.references("w"));
    }

    #[test]
    fn test_render_with_resolver() {
        let e = Expr::var("v") + Expr::var("x");
        let text = e.render(&NeutralSyntax, &mut |name: &str| {
            if name == "v" {
                "_ptr_array_v[_vectorisation_idx]".to_string()
            } else {
                name.to_string()
            }
        });
        assert_eq!(text, "(_ptr_array_v[_vectorisation_idx] + x)");
    }

    #[test]
    fn test_display_and_literals() {
        let e = Expr::max(Expr::var("a"), Expr::num(2.0));
        assert_eq!(e.to_string(), "fmax(a, 2.0)");
        assert_eq!(NeutralSyntax.number_literal(0.5), "0.5");
        assert_eq!(NeutralSyntax.number_literal(f64::NEG_INFINITY), "(-INFINITY)");

        let n = -Expr::var("v");
        assert_eq!(n.to_string(), "(-v)");
        let b = Expr::Bool(true).and(Expr::var("v").gt(Expr::num(0.0)));
        assert_eq!(b.to_string(), "(true && (v > 0.0))");
    }

    #[test]
    fn test_serde_shape() {
        let e = Expr::var("v") + Expr::num(1.0);
        let json = serde_json::to_string(&e).unwrap();
        let back: Expr = serde_json::from_str(&json).unwrap();
        assert_eq!(back, e);
        assert!(json.contains("\"binary\""));
    }
}
