// Integration tests for pipeline pass manager behavior.
//
// These tests verify invariants introduced by the pass manager:
// - Minimal pass evaluation for each terminal pass
// - Post-pass verification and fail-fast error reporting
// - CLI exit codes and `--emit` targets

use std::path::{Path, PathBuf};
use std::process::Command;

use devhoist::config::PassOptions;
use devhoist::pass::{PassId, StageCert};
use devhoist::pipeline::{run_pipeline, CompilationState};

fn devhoist_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_devhoist"))
}

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

fn demo(name: &str) -> PathBuf {
    project_root().join("demos").join(name)
}

fn state_for(source: &str) -> CompilationState {
    let parse_result = devhoist::parser::parse(source);
    assert!(parse_result.errors.is_empty(), "{:?}", parse_result.errors);
    CompilationState::new(parse_result.module.unwrap(), PassOptions::default())
}

// ── Library pipeline ───────────────────────────────────────────────────────

#[test]
fn verify_terminal_runs_no_hoisting() {
    let mut state = state_for(
        r#"%l = "tf_device.launch"() ({ "tf_device.return"() }) {device = "CPU:0"}"#,
    );
    let mut seen = Vec::new();
    let result = run_pipeline(&mut state, PassId::Verify, false, |id, _| seen.push(id));
    // The result/yield count mismatch is only caught by the hoisting pass.
    assert!(result.is_ok());
    assert_eq!(seen, vec![PassId::Resolve, PassId::Verify]);
    assert!(state.report.is_none());
    assert!(state.verify_cert.unwrap().all_pass());
}

#[test]
fn hoist_terminal_runs_every_pass_and_reverifies() {
    let source = std::fs::read_to_string(demo("basic.mlir")).unwrap();
    let mut state = state_for(&source);
    let mut seen = Vec::new();
    run_pipeline(&mut state, PassId::LaunchToDeviceAttribute, false, |id, diags| {
        assert!(diags.is_empty(), "{:?}", diags);
        seen.push(id);
    })
    .unwrap();
    assert_eq!(
        seen,
        vec![
            PassId::Resolve,
            PassId::Verify,
            PassId::LaunchToDeviceAttribute
        ]
    );
    assert!(state.verify_cert.unwrap().all_pass());
    let report = state.report.as_ref().unwrap();
    assert_eq!(report.scopes.len(), 1);
    assert_eq!(report.moved_ops(), 2);
    assert!(!state.has_error);
}

#[test]
fn resolve_error_stops_before_verify() {
    let mut state = state_for(r#""tf.Use"(%missing)"#);
    let mut seen = Vec::new();
    let err = run_pipeline(&mut state, PassId::LaunchToDeviceAttribute, false, |id, _| {
        seen.push(id)
    })
    .unwrap_err();
    assert_eq!(err.failing_pass, PassId::Resolve);
    assert_eq!(seen, vec![PassId::Resolve]);
    assert!(state.has_error);
    assert!(state.verify_cert.is_none());
}

#[test]
fn pass_failure_is_reported_as_a_diagnostic() {
    let source = std::fs::read_to_string(demo("conflict.mlir")).unwrap();
    let mut state = state_for(&source);
    let err = run_pipeline(&mut state, PassId::LaunchToDeviceAttribute, false, |_, _| {})
        .unwrap_err();
    assert_eq!(err.failing_pass, PassId::LaunchToDeviceAttribute);
    assert_eq!(
        err.to_string(),
        "pass 'tf-launch-to-device-attribute' failed"
    );
    let diag = state.diagnostics.last().unwrap();
    assert_eq!(diag.code, Some(devhoist::diag::codes::E0201));
    assert!(diag.message.contains("'GPU:0' but expected 'CPU:0'"));
    assert!(state.report.is_none());
}

#[test]
fn provenance_changes_with_options() {
    let source = "module {}";
    let default = devhoist::pipeline::compute_provenance(source, &PassOptions::default());
    let retarget = devhoist::pipeline::compute_provenance(
        source,
        &PassOptions {
            device_attr: "_xla_device".into(),
            ..PassOptions::default()
        },
    );
    assert_eq!(default.source_hash, retarget.source_hash);
    assert_ne!(default.options_fingerprint, retarget.options_fingerprint);
    assert_eq!(default.source_hash_hex().len(), 64);
}

#[test]
fn provenance_json_is_well_formed() {
    let provenance = devhoist::pipeline::compute_provenance("module {}", &PassOptions::default());
    let json = provenance.to_json();
    assert!(json.ends_with("}\n"));
    let value: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(value["source_hash"], provenance.source_hash_hex());
    assert_eq!(value["options_fingerprint"], provenance.options_fingerprint_hex());
    assert_eq!(value["tool_version"], env!("CARGO_PKG_VERSION"));
    assert_eq!(value.as_object().unwrap().len(), 3);
}

// ── CLI ────────────────────────────────────────────────────────────────────

fn run_cli(args: &[&str]) -> std::process::Output {
    Command::new(devhoist_binary())
        .args(args)
        .output()
        .expect("failed to run devhoist")
}

#[test]
fn cli_emits_hoisted_ir_by_default() {
    let path = demo("basic.mlir");
    let output = run_cli(&[path.to_str().unwrap()]);
    assert!(
        output.status.success(),
        "stderr: {}",
        String::from_utf8_lossy(&output.stderr)
    );
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(!stdout.contains("tf_device.launch"), "{stdout}");
    assert!(stdout.contains(r#""tf.B"(%0) {device = "CPU:0"}"#), "{stdout}");
}

#[test]
fn cli_pass_verify_keeps_launches() {
    let path = demo("nested.mlir");
    let output = run_cli(&["--pass", "verify", path.to_str().unwrap()]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(stdout.matches("tf_device.launch").count(), 2);
}

#[test]
fn cli_emit_report_is_json() {
    let path = demo("reachable.mlir");
    let output = run_cli(&["--emit", "report", path.to_str().unwrap()]);
    assert!(output.status.success());
    let json: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(json["scopes"][0]["device"], "TPU:0");
    assert_eq!(json["scopes"][0]["subroutines"][0], "helper");
}

#[test]
fn cli_conflict_exits_1_with_rendered_diagnostic() {
    let path = demo("conflict.mlir");
    let output = run_cli(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(output.stdout.is_empty());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("conflict.mlir:4:5: error[E0201]"), "{stderr}");
    assert!(stderr.contains("device launch is here"), "{stderr}");
}

#[test]
fn cli_parse_error_exits_1() {
    let dir = std::env::temp_dir().join("devhoist_cli_parse_error");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join("bad.mlir");
    std::fs::write(&path, "module { \"tf.A\"( }").unwrap();
    let output = run_cli(&[path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(1));
    assert!(String::from_utf8_lossy(&output.stderr).contains("parse error"));
}

#[test]
fn cli_missing_input_exits_2() {
    let output = run_cli(&["/nonexistent/input.mlir"]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_bad_config_exits_2() {
    let dir = std::env::temp_dir().join("devhoist_cli_bad_config");
    std::fs::create_dir_all(&dir).unwrap();
    let config = dir.join("options.json");
    std::fs::write(&config, r#"{"scope": "x"}"#).unwrap();
    let path = demo("basic.mlir");
    let output = run_cli(&[
        "--config",
        config.to_str().unwrap(),
        path.to_str().unwrap(),
    ]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_unknown_pass_exits_2() {
    let path = demo("basic.mlir");
    let output = run_cli(&["--pass", "tf-unknown", path.to_str().unwrap()]);
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn cli_list_passes_needs_no_source() {
    let output = run_cli(&["--list-passes"]);
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert!(stdout.contains("tf-launch-to-device-attribute"));
    assert!(stdout.contains("Hoists and annotates device launch inner ops"));
}

#[test]
fn cli_writes_output_file() {
    let dir = std::env::temp_dir().join("devhoist_cli_output");
    std::fs::create_dir_all(&dir).unwrap();
    let out = dir.join("out.mlir");
    let path = demo("nested.mlir");
    let output = run_cli(&["-o", out.to_str().unwrap(), path.to_str().unwrap()]);
    assert!(output.status.success());
    assert!(output.stdout.is_empty());
    let written = std::fs::read_to_string(&out).unwrap();
    assert!(written.starts_with("module {\n"));
}

#[test]
fn cli_verbose_prints_pass_timing() {
    let path = demo("basic.mlir");
    let output = run_cli(&["--verbose", path.to_str().unwrap()]);
    assert!(output.status.success());
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("devhoist: resolve complete"), "{stderr}");
    assert!(
        stderr.contains("devhoist: launch_to_device_attribute complete"),
        "{stderr}"
    );
}
