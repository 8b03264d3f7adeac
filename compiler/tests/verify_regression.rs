// Regression corpus for the verification framework.
//
// Ensures every demo input passes verification before and after hoisting
// (V1-V4), and that known failure classes produce expected diagnostic codes.

use std::path::{Path, PathBuf};
use std::process::Command;

fn project_root() -> PathBuf {
    Path::new(env!("CARGO_MANIFEST_DIR"))
        .parent()
        .unwrap()
        .to_path_buf()
}

fn devhoist_binary() -> PathBuf {
    PathBuf::from(env!("CARGO_BIN_EXE_devhoist"))
}

/// Since verification always follows the pass in the pipeline, a successful
/// run implies the V1-V4 obligations hold on the rewritten module.
#[test]
fn all_demos_pass_verification() {
    let demos = project_root().join("demos");
    for name in ["basic", "nested", "reachable"] {
        let path = demos.join(format!("{name}.mlir"));
        for pass in ["verify", "tf-launch-to-device-attribute"] {
            let output = Command::new(devhoist_binary())
                .arg("--pass")
                .arg(pass)
                .arg(&path)
                .output()
                .expect("failed to run devhoist");
            assert!(
                output.status.success(),
                "{name}.mlir failed at --pass {pass}:\n{}",
                String::from_utf8_lossy(&output.stderr)
            );
        }
    }
}

/// Write `source` to a scratch file and run the full pipeline on it.
fn run_source(tag: &str, source: &str) -> (Option<i32>, String) {
    let dir = std::env::temp_dir().join("devhoist_verify_regression");
    std::fs::create_dir_all(&dir).unwrap();
    let path = dir.join(format!("{tag}.mlir"));
    std::fs::write(&path, source).unwrap();
    let output = Command::new(devhoist_binary())
        .arg(&path)
        .output()
        .expect("failed to run devhoist");
    let _ = std::fs::remove_file(&path);
    (
        output.status.code(),
        String::from_utf8_lossy(&output.stderr).into_owned(),
    )
}

#[test]
fn known_failure_classes_report_their_codes() {
    let cases = [
        ("undefined", r#"module { "tf.Use"(%nope) }"#, "E0001"),
        (
            "redefinition",
            r#"module { %a = "tf.A"() %a = "tf.B"() }"#,
            "E0002",
        ),
        (
            "bad_result_index",
            r#"module { %a:2 = "tf.A"() "tf.Use"(%a#2) }"#,
            "E0003",
        ),
        (
            "duplicate_attr",
            r#"module { "tf.A"() {x = 1, x = 2} }"#,
            "E0004",
        ),
        (
            "terminator_not_last",
            r#"module { "tf_device.launch"() ({ "tf_device.return"() "tf.After"() }) }"#,
            "E0100",
        ),
        (
            "duplicate_symbol",
            "module { func @f() func @f() }",
            "E0103",
        ),
        (
            "conflict",
            r#"module { "tf_device.launch"() ({ "tf.A"() {device = "GPU:0"} "tf_device.return"() }) {device = "CPU:0"} }"#,
            "E0201",
        ),
        (
            "malformed_device",
            r#"module { "tf_device.launch"() ({ "tf.A"() {device = 3} "tf_device.return"() }) {device = "CPU:0"} }"#,
            "E0202",
        ),
        (
            "missing_terminator",
            r#"module { "tf_device.launch"() ({ "tf.A"() }) {device = "CPU:0"} }"#,
            "E0203",
        ),
    ];

    for (tag, source, code) in cases {
        let (status, stderr) = run_source(tag, source);
        assert_eq!(status, Some(1), "{tag}: expected exit 1\n{stderr}");
        assert!(
            stderr.contains(&format!("error[{code}]")),
            "{tag}: expected {code} in stderr:\n{stderr}"
        );
    }
}
