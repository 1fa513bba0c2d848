use std::{
    env, fs,
    path::PathBuf,
    process::{Command, Output},
};

fn marbl(args: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_marbl"))
        .args(args)
        .output()
        .expect("failed to launch marbl")
}

fn script(name: &str, code: &str) -> PathBuf {
    let path = env::temp_dir().join(format!("marbl-{}-{}.mb", std::process::id(), name));
    fs::write(&path, code).expect("failed to write script");

    path
}

#[test]
fn running_a_script() {
    let path = script("run", "let i = 0; while (i < 2) { print i; i = i + 1; }");
    let output = marbl(&["--run", path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    assert_eq!(String::from_utf8_lossy(&output.stdout), "0\n1\n");
}

#[test]
fn emitting_llvm_to_stdout() {
    let path = script("emit", "print 1;");
    let output = marbl(&["--emit-llvm", "-", path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(0));
    assert!(String::from_utf8_lossy(&output.stdout).contains("define i32 @main()"));
}

#[test]
fn diagnostics_exit_with_data_error() {
    let path = script("broken", "print 1 +;");
    let output = marbl(&["--run", path.to_str().unwrap()]);

    assert_eq!(output.status.code(), Some(65));
    assert!(String::from_utf8_lossy(&output.stderr).contains("Build failed with 1 error"));
}

#[test]
fn missing_script_exits_with_no_input() {
    let output = marbl(&["--run", "/nonexistent/marbl/script.mb"]);
    assert_eq!(output.status.code(), Some(66));
}

#[test]
fn more_than_one_script_is_a_usage_error() {
    let output = marbl(&["first.mb", "second.mb"]);

    assert_eq!(output.status.code(), Some(64));
    assert!(String::from_utf8_lossy(&output.stderr).contains("USAGE"));
}

#[test]
fn unknown_flags_are_usage_errors() {
    let output = marbl(&["--frobnicate"]);
    assert_eq!(output.status.code(), Some(64));
}
