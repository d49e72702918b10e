// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! Property tests for classification, indexing and the parallel decision

use proptest::prelude::*;
use vecgen_codegen::*;

const SCALARS: [&str; 3] = ["a", "b", "c"];
const ARRAYS: [&str; 3] = ["u", "v", "w"];

fn variables() -> VariableTable {
    SCALARS
        .iter()
        .map(|n| Variable::scalar(*n, NumericType::F64))
        .chain(ARRAYS.iter().map(|n| Variable::array(*n, NumericType::F64)))
        .collect()
}

fn name() -> impl Strategy<Value = &'static str> {
    prop::sample::select(vec!["a", "b", "c", "u", "v", "w"])
}

fn statement() -> impl Strategy<Value = Statement> {
    (name(), name(), name(), 0..4u8).prop_map(|(target, l, r, form)| {
        let expr = match form {
            0 => Expr::var(l) + Expr::var(r),
            1 => Expr::var(l) * Expr::num(0.5),
            2 => Expr::max(Expr::var(l), Expr::var(r)),
            _ => Expr::num(1.0),
        };
        Statement::assign(target, expr)
    })
}

proptest! {
    #[test]
    fn classify_is_lossless_and_order_preserving(stmts in prop::collection::vec(statement(), 0..12)) {
        let vars = variables();
        if let Ok(out) = classify(&stmts, &vars) {
            prop_assert_eq!(out.total(), stmts.len());

            let mut positions: Vec<usize> = out
                .scalar
                .iter()
                .chain(&out.vector)
                .map(|s| s.position)
                .collect();
            prop_assert!(out.scalar.windows(2).all(|w| w[0].position < w[1].position));
            prop_assert!(out.vector.windows(2).all(|w| w[0].position < w[1].position));
            positions.sort_unstable();
            prop_assert_eq!(positions, (0..stmts.len()).collect::<Vec<_>>());

            for s in &out.scalar {
                prop_assert!(s.statement.scalar_flag(&vars));
                let reads = s.statement.reads();
                for v in &out.vector {
                    prop_assert!(!reads.iter().any(|r| r == v.statement.writes()));
                }
            }
        }
    }

    #[test]
    fn direct_plans_are_injective(start in 0i64..1_000, count in 0i64..500) {
        for mode in [TargetingMode::all(count), TargetingMode::range(start, count)] {
            let plan = resolve(&mode).unwrap();
            prop_assert_eq!(plan.iteration_count() as i64, count);
            let mut indices = plan.indices().unwrap();
            indices.sort_unstable();
            indices.dedup();
            prop_assert_eq!(indices.len() as i64, count);
        }
    }

    #[test]
    fn index_array_visits_every_entry(entries in prop::collection::vec(0i64..20, 0..40)) {
        let mode = TargetingMode::group("_group_idx", entries.clone());
        let plan = resolve(&mode).unwrap();
        prop_assert_eq!(plan.indices(), Some(entries));
        prop_assert_eq!(resolve(&mode).unwrap(), plan);
    }

    #[test]
    fn negative_counts_are_rejected(count in i64::MIN..0) {
        prop_assert!(matches!(
            resolve(&TargetingMode::index_array("_group_idx", count)),
            Err(CodegenError::InvalidTargeting(_))
        ));
        prop_assert!(resolve(&TargetingMode::all(count)).is_err());
    }

    #[test]
    fn parallel_never_hides_an_accumulation(
        stmts in prop::collection::vec(statement(), 1..8),
        count in 0i64..64,
    ) {
        let vars = variables();
        if let Ok(out) = classify(&stmts, &vars) {
            let plan = resolve(&TargetingMode::all(count)).unwrap();
            let decision = decide(&out.vector, &plan, &vars, &ParallelPolicy::default());
            if decision.parallel {
                for s in &out.vector {
                    let target = s.statement.writes();
                    if vars.get(target).map(Variable::is_scalar).unwrap_or(false) {
                        prop_assert!(decision.reduction_for(target).is_some());
                        prop_assert!(decision.requires_reduction);
                    }
                }
            }
        }
    }
}
