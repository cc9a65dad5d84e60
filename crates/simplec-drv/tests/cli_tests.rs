//! End-to-end CLI tests for the `simplec` binary.

use std::fs;
use std::path::{Path, PathBuf};

use assert_cmd::Command;
use predicates::prelude::*;

fn simplec() -> Command {
    Command::cargo_bin("simplec").expect("binary builds")
}

fn write(dir: &Path, name: &str, text: &str) -> PathBuf {
    let path = dir.join(name);
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).unwrap();
    }
    fs::write(&path, text).unwrap();
    path
}

#[test]
fn test_check_accepts_arithmetic_main() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(tmp.path(), "main.simple", "main : i32 () { return 40 + 2; }\n");
    simplec().arg("check").arg(&entry).assert().success();
}

#[test]
fn test_emit_ir_writes_module() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(tmp.path(), "main.simple", "main : i32 () { return 40 + 2; }\n");
    let out = tmp.path().join("main.sir");
    simplec()
        .args(["emit", "-ir"])
        .arg(&entry)
        .arg("--out")
        .arg(&out)
        .assert()
        .success();
    let sir = fs::read_to_string(&out).unwrap();
    assert!(sir.contains("func main"));
    assert!(sir.contains("add.i32"));
    assert!(sir.contains("entry main"));
}

#[test]
fn test_emit_ir_to_stdout() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(tmp.path(), "main.simple", "main : i32 () { return 1; }\n");
    simplec()
        .args(["emit", "-ir"])
        .arg(&entry)
        .assert()
        .success()
        .stdout(predicate::str::contains("func main"));
}

#[test]
fn test_emit_sbc_is_deferred_downstream() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(tmp.path(), "main.simple", "main : i32 () { return 1; }\n");
    simplec()
        .args(["emit", "-sbc"])
        .arg(&entry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("emit -ir"));
}

#[test]
fn test_top_level_script_gets_script_entry() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(
        tmp.path(),
        "main.simple",
        "add : i32 (a : i32, b : i32) { return a + b; }\nx : i32 = add(40, 2);\nx = x + 1;\n",
    );
    simplec()
        .args(["emit", "-ir"])
        .arg(&entry)
        .assert()
        .success()
        .stdout(predicate::str::contains("entry __script_entry"));
}

#[test]
fn test_sum_loop_emits() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(
        tmp.path(),
        "main.simple",
        "main : i32 () {\n  s : i32 = 0;\n  for i; 0..99 { s += i; }\n  return s;\n}\n",
    );
    simplec()
        .args(["emit", "-ir"])
        .arg(&entry)
        .assert()
        .success()
        .stdout(predicate::str::contains("cmp.le.i32"));
}

#[test]
fn test_missing_return_diagnostic() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(tmp.path(), "main.simple", "foo : i32 () { x : i32 = 1; }\n");
    simplec()
        .arg("check")
        .arg(&entry)
        .assert()
        .failure()
        .code(1)
        .stderr(predicate::str::contains(
            "non-void function does not return on all paths",
        ));
}

#[test]
fn test_format_placeholder_mismatch_diagnostic() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(
        tmp.path(),
        "main.simple",
        "import \"IO\"\nmain : void () { IO.println(\"x={}, y={}\", 1); }\n",
    );
    simplec()
        .arg("check")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(predicate::str::contains(
            "format placeholder count mismatch: expected 2, got 1",
        ));
}

#[test]
fn test_cyclic_import_diagnostic() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "a.simple", "import b\na : i32 () { return 1; }\n");
    let entry = write(tmp.path(), "b.simple", "import a\nb : i32 () { return 2; }\n");
    simplec()
        .arg("check")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("cyclic import detected: "))
        .stderr(predicate::str::contains(".simple"));
}

#[test]
fn test_missing_import_diagnostic_with_help() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(tmp.path(), "main.simple", "import nothere\n");
    simplec()
        .arg("check")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("import not found in project root: nothere"))
        .stderr(predicate::str::contains("= help:"));
}

#[test]
fn test_ambiguous_import_diagnostic() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "x/util.simple", "a : i32 () { return 1; }\n");
    write(tmp.path(), "y/util.simple", "b : i32 () { return 2; }\n");
    let entry = write(tmp.path(), "main.simple", "import util\n");
    simplec()
        .arg("check")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("ambiguous import path 'util' matched: "));
}

#[test]
fn test_local_import_chain_checks() {
    let tmp = tempfile::tempdir().unwrap();
    write(
        tmp.path(),
        "mathutil.simple",
        "double : i32 (x : i32) { return x * 2; }\n",
    );
    let entry = write(
        tmp.path(),
        "main.simple",
        "import mathutil\nmain : i32 () { return double(21); }\n",
    );
    simplec().arg("check").arg(&entry).assert().success();
}

#[test]
fn test_error_format_has_caret_and_location() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(
        tmp.path(),
        "main.simple",
        "main : i32 () {\n  return missing\n}\n",
    );
    simplec()
        .arg("check")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E0001]:"))
        .stderr(predicate::str::contains("undeclared identifier"))
        .stderr(predicate::str::contains(" --> "))
        .stderr(predicate::str::contains("^"));
}

#[test]
fn test_lexer_error_format() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(tmp.path(), "main.simple", "main : i32 () { x : i32 = #; }\n");
    simplec()
        .arg("check")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E0001]:"))
        .stderr(predicate::str::contains("unexpected character"))
        .stderr(predicate::str::contains(" --> "))
        .stderr(predicate::str::contains("^"));
}

#[test]
fn test_parser_error_format() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(
        tmp.path(),
        "main.simple",
        "main : i32 () {\n  x : i32 = 1;\n",
    );
    simplec()
        .arg("check")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("error[E0001]:"))
        .stderr(predicate::str::contains("unterminated block"))
        .stderr(predicate::str::contains(" --> "));
}

#[test]
fn test_self_outside_artifact_diagnostic() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(tmp.path(), "main.simple", "main : void () { self; }\n");
    simplec()
        .arg("check")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("self used outside of artifact method"));
}

#[test]
fn test_parse_error_in_imported_file_names_it() {
    let tmp = tempfile::tempdir().unwrap();
    write(tmp.path(), "dep.simple", "broken : i32 () { +; }\n");
    let entry = write(
        tmp.path(),
        "main.simple",
        "import dep\nmain : i32 () { return 0; }\n",
    );
    simplec()
        .arg("check")
        .arg(&entry)
        .assert()
        .failure()
        .stderr(predicate::str::contains("dep.simple"));
}

#[test]
fn test_check_reports_first_diagnostic_only_once() {
    let tmp = tempfile::tempdir().unwrap();
    let entry = write(
        tmp.path(),
        "main.simple",
        "main : i32 () { return missing; }\n",
    );
    let output = simplec().arg("check").arg(&entry).assert().failure();
    let stderr = String::from_utf8_lossy(&output.get_output().stderr).into_owned();
    assert_eq!(stderr.matches("error[E0001]").count(), 1, "{}", stderr);
}
