// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Expression evaluation over `f64`
//!
//! Comparisons and logical operators yield `1.0` / `0.0`; any non-zero
//! value is true.

use vecgen_codegen::{BinaryOp, Expr, Function, UnaryOp};

use crate::error::ExecutionResult;

fn truth(value: bool) -> f64 {
    if value {
        1.0
    } else {
        0.0
    }
}

/// Evaluate `expr`, resolving identifiers through `lookup`
pub fn evaluate(
    expr: &Expr,
    lookup: &mut dyn FnMut(&str) -> ExecutionResult<f64>,
) -> ExecutionResult<f64> {
    Ok(match expr {
        Expr::Number(value) => *value,
        Expr::Bool(value) => truth(*value),
        Expr::Variable(name) => lookup(name)?,
        Expr::Unary { op, operand } => {
            let value = evaluate(operand, lookup)?;
            match op {
                UnaryOp::Neg => -value,
                UnaryOp::Not => truth(value == 0.0),
            }
        }
        Expr::Binary { op, lhs, rhs } => {
            let a = evaluate(lhs, lookup)?;
            let b = evaluate(rhs, lookup)?;
            match op {
                BinaryOp::Add => a + b,
                BinaryOp::Sub => a - b,
                BinaryOp::Mul => a * b,
                BinaryOp::Div => a / b,
                BinaryOp::Lt => truth(a < b),
                BinaryOp::Le => truth(a <= b),
                BinaryOp::Gt => truth(a > b),
                BinaryOp::Ge => truth(a >= b),
                BinaryOp::Eq => truth(a == b),
                BinaryOp::Ne => truth(a != b),
                BinaryOp::And => truth(a != 0.0 && b != 0.0),
                BinaryOp::Or => truth(a != 0.0 || b != 0.0),
            }
        }
        Expr::Call { function, args } => {
            let mut values = Vec::with_capacity(args.len());
            for arg in args {
                values.push(evaluate(arg, lookup)?);
            }
            let first = values.first().copied().unwrap_or(f64::NAN);
            let second = values.get(1).copied().unwrap_or(f64::NAN);
            match function {
                Function::Min => first.min(second),
                Function::Max => first.max(second),
                Function::Abs => first.abs(),
                Function::Exp => first.exp(),
                Function::Log => first.ln(),
                Function::Sqrt => first.sqrt(),
                Function::Floor => first.floor(),
                Function::Ceil => first.ceil(),
            }
        }
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ExecutionError;

    fn eval_with(expr: &Expr, x: f64) -> ExecutionResult<f64> {
        evaluate(expr, &mut |name: &str| match name {
            "x" => Ok(x),
            other => Err(ExecutionError::UnknownArray(other.to_string())),
        })
    }

    #[test]
    fn test_arithmetic_and_functions() {
        let e = Expr::max(Expr::var("x") * Expr::num(2.0), Expr::num(1.0)) - Expr::num(0.5);
        assert_eq!(eval_with(&e, 3.0).unwrap(), 5.5);
        assert_eq!(eval_with(&e, 0.0).unwrap(), 0.5);
        let s = Expr::call(Function::Sqrt, vec![Expr::var("x")]);
        assert_eq!(eval_with(&s, 16.0).unwrap(), 4.0);
    }

    #[test]
    fn test_logic_is_numeric() {
        let e = Expr::var("x").gt(Expr::num(0.0)).and(Expr::Bool(true));
        assert_eq!(eval_with(&e, 1.0).unwrap(), 1.0);
        assert_eq!(eval_with(&e, -1.0).unwrap(), 0.0);
        let n = Expr::unary(UnaryOp::Not, Expr::var("x"));
        assert_eq!(eval_with(&n, 0.0).unwrap(), 1.0);
    }

    #[test]
    fn test_lookup_errors_propagate() {
        let e = Expr::var("y") + Expr::num(1.0);
        assert_eq!(
            eval_with(&e, 0.0),
            Err(ExecutionError::UnknownArray("y".to_string()))
        );
    }
}
