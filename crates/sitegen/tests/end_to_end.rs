/*
 * end_to_end.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * End-to-end tests running the sitegen binary on temporary projects.
 */

use pretty_assertions::assert_eq;
use std::fs;
use std::path::Path;
use std::process::{Command, Output};

fn write(root: &Path, path: &str, contents: &str) {
    let path = root.join(path);
    fs::create_dir_all(path.parent().unwrap()).unwrap();
    fs::write(path, contents).unwrap();
}

fn sitegen(root: &Path, extra: &[&str]) -> Output {
    Command::new(env!("CARGO_BIN_EXE_sitegen"))
        .arg("--root")
        .arg(root)
        .args(extra)
        .env("RUST_LOG", "sitegen=info")
        .output()
        .expect("Failed to run sitegen")
}

#[test]
fn test_builds_site_and_reports_done() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "src/react/greeting.html", "<p>Hello, {props.name}!</p>");
    write(root, "src/pages/index.html", r#"<Greeting name="world" />"#);
    write(root, "src/css/app.scss", "p { color: red; }\n");

    let output = sitegen(root, &[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert!(output.status.success(), "sitegen failed: {}", stderr);
    assert!(stderr.contains("Done."));
    assert_eq!(
        fs::read_to_string(root.join("dist/index.html")).unwrap(),
        "<!DOCTYPE html><p>Hello, world!</p>"
    );
    assert!(root.join("dist/css/app.css").exists());
}

#[test]
fn test_output_dir_and_no_styles_flags() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "src/pages/index.html", "<h1>Plain</h1>");
    let out = root.join("public");

    let output = sitegen(
        root,
        &["--no-styles", "--output-dir", out.to_str().unwrap()],
    );

    assert!(output.status.success());
    assert_eq!(
        fs::read_to_string(out.join("index.html")).unwrap(),
        "<!DOCTYPE html><h1>Plain</h1>"
    );
    assert!(!root.join("dist").exists());
}

#[test]
fn test_failure_exits_nonzero_and_logs_each_file() {
    let dir = tempfile::tempdir().unwrap();
    let root = dir.path();
    write(root, "_sitegen.yml", "stylesheet: null\n");
    write(root, "src/pages/one.html", "<main><Missing /></main>");
    write(root, "src/pages/two.html", "<main>");

    let output = sitegen(root, &[]);
    let stderr = String::from_utf8_lossy(&output.stderr);

    assert_eq!(output.status.code(), Some(1));
    assert!(stderr.contains("one.html"));
    assert!(stderr.contains("two.html"));
    assert!(stderr.contains("2 of 2 pages failed"));
    assert!(!stderr.contains("Done."));
}

#[test]
fn test_invalid_root() {
    let dir = tempfile::tempdir().unwrap();
    let output = sitegen(&dir.path().join("absent"), &[]);
    assert_eq!(output.status.code(), Some(1));
}
