// Snapshot tests: lock the printed IR and pass report for the demo inputs.
//
// Uses the library API (parse → resolve → hoist) and snapshots the Display
// output. Snapshots are managed by `insta` and stored under `compiler/tests/snapshots/`.
//
// Run `cargo insta review` after intentional output changes to update baselines.

use std::path::{Path, PathBuf};

use devhoist::config::PassOptions;
use devhoist::hoist::PassReport;
use devhoist::ir::Module;

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

fn load_demo(name: &str) -> String {
    let path = project_root().join("demos").join(name);
    std::fs::read_to_string(&path)
        .unwrap_or_else(|e| panic!("cannot read {}: {}", path.display(), e))
}

/// Run parse → resolve → hoist and return the rewritten module and report.
fn hoist(source: &str, options: &PassOptions) -> (Module, PassReport) {
    let parse_result = devhoist::parser::parse(source);
    assert!(
        parse_result.errors.is_empty(),
        "parse errors: {:?}",
        parse_result.errors
    );
    let ast = parse_result.module.unwrap();

    let resolve_result = devhoist::resolve::resolve(&ast);
    assert!(
        resolve_result.diagnostics.is_empty(),
        "resolve errors: {:?}",
        resolve_result.diagnostics
    );

    let mut module = resolve_result.module;
    let report =
        devhoist::hoist::run_launch_to_device_attribute(&options.context(), &mut module, options)
            .unwrap_or_else(|e| panic!("pass failed: {}", e));
    (module, report)
}

fn snapshot_demo(name: &str) {
    let source = load_demo(name);
    let (module, _) = hoist(&source, &PassOptions::default());
    let output = module.to_string();
    let snap_name = format!("ir_{}", name.replace('.', "_"));
    insta::assert_snapshot!(snap_name, output);
}

#[test]
fn snapshot_basic() {
    snapshot_demo("basic.mlir");
}

#[test]
fn snapshot_nested() {
    snapshot_demo("nested.mlir");
}

#[test]
fn snapshot_reachable() {
    snapshot_demo("reachable.mlir");
}

#[test]
fn snapshot_retarget() {
    let source = load_demo("retarget.mlir");
    let options = PassOptions::load(&project_root().join("demos/retarget.json")).unwrap();
    let (module, _) = hoist(&source, &options);
    let output = module.to_string();
    insta::assert_snapshot!("ir_retarget_mlir", output);
}

#[test]
fn snapshot_basic_report() {
    let source = load_demo("basic.mlir");
    let (_, report) = hoist(&source, &PassOptions::default());
    let output = report.to_json().unwrap();
    insta::assert_snapshot!("report_basic_mlir", output);
}
