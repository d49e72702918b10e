// Copyright 2025 Neuraville Inc.
// SPDX-License-Identifier: Apache-2.0

//! # Configuration Pipeline Tests
//!
//! Configuration file → settings → generated code → execution.

use std::fs;
use std::path::Path;

use tempfile::tempdir;
use vecgen::config::{load_config, validate_config};
use vecgen::prelude::*;
use vecgen::settings::{codegen_settings, executor_settings};

fn reset_request() -> CodeObjectRequest {
    CodeObjectRequest {
        name: "neurongroup_group_variable_set".to_string(),
        statements: vec![
            Statement::assign("_reset", Expr::var("v_reset") * Expr::num(1.0)),
            Statement::assign("v", Expr::var("_reset")),
            Statement::compound("spike_count", AssignOp::AddAssign, Expr::num(1.0)),
        ],
        variables: VariableTable::new()
            .with(Variable::scalar("v_reset", NumericType::F64).read_only())
            .with(Variable::scalar("spike_count", NumericType::F64))
            .with(Variable::array("v", NumericType::F64)),
        targeting: TargetingMode::group("_group_idx", vec![0, 2, 3]),
    }
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("vecgen_configuration.toml");
    fs::write(&path, body).unwrap();
    path
}

#[test]
fn test_cython_config_renders_cython() {
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        [codegen]
        backend = "cython"
        openmp_threads = 4
        "#,
    );
    let config = load_config(Some(&path), None).unwrap();
    validate_config(&config).unwrap();

    let settings = codegen_settings(&config).unwrap();
    let code = CodeGenerator::from_settings(&settings)
        .generate(&reset_request())
        .unwrap();
    assert_eq!(code.backend, BackendType::Cython);
    assert!(code.source.contains("def _run_neurongroup_group_variable_set():"));
    assert!(code
        .source
        .contains("for _idx_group_idx in prange(_num_group_idx, nogil=True, schedule='static'):"));
}

#[test]
fn test_serial_schedule_from_config() {
    let dir = tempdir().unwrap();
    let path = write_config(
        dir.path(),
        r#"
        [codegen]
        schedule = "none"

        [runtime]
        num_threads = 2
        "#,
    );
    let config = load_config(Some(&path), None).unwrap();
    let code = CodeGenerator::from_settings(&codegen_settings(&config).unwrap())
        .generate(&reset_request())
        .unwrap();
    assert!(!code.decision.parallel);
    assert!(!code.source.contains("#pragma omp"));

    let mut population = Population::new(4)
        .with_scalar("v_reset", -65.0)
        .with_scalar("spike_count", 0.0)
        .with_filled("v", -50.0);
    let executor = Executor::new(&executor_settings(&config)).unwrap();
    let report = executor
        .execute(&code, &reset_request().variables, &mut population)
        .unwrap();

    assert!(!report.parallel);
    assert_eq!(population.array("v").unwrap(), &[-65.0, -50.0, -65.0, -65.0]);
    // Scalar statement: once per call, not once per element
    assert_eq!(population.scalar("spike_count").unwrap(), 1.0);
}
