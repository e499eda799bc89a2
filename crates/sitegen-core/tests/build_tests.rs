/*
 * build_tests.rs
 * Copyright (c) 2025 Posit, PBC
 *
 * Whole-pipeline tests for sitegen-core on temporary project trees.
 */

use pretty_assertions::assert_eq;
use sitegen_core::{
    BuildError, BuildOptions, Builder, SiteConfig, Stage, StyleCompiler, StyleError, build,
};
use sitegen_template::TemplateError;
use std::fs;
use std::path::Path;
use tempfile::TempDir;

/// Create a project tree from (relative path, contents) pairs.
fn project(files: &[(&str, &str)]) -> TempDir {
    let dir = tempfile::tempdir().unwrap();
    for (path, contents) in files {
        let path = dir.path().join(path);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, contents).unwrap();
    }
    dir
}

fn options(root: &Path) -> BuildOptions {
    let config = SiteConfig::discover(root).unwrap();
    BuildOptions::resolve(root, &config)
}

fn read(root: &Path, path: &str) -> String {
    fs::read_to_string(root.join(path)).unwrap()
}

const LAYOUT: &str = r#"<html>
  <head><title>{props.title}</title></head>
  <body>
    <SiteNav current={props.title} />
    {props.children}
  </body>
</html>"#;

const NAV: &str = r#"<nav>
  {["Home", "About"].map(item =>
    <a key={item} href={item === "Home" ? "/" : "/" + item.toLowerCase() + ".html"} className={item === props.current ? "active" : undefined}>{item}</a>
  )}
</nav>"#;

#[test]
fn test_full_site_build() {
    let dir = project(&[
        ("_sitegen.yml", "stylesheet: null\n"),
        ("src/react/layout.html", LAYOUT),
        ("src/react/site-nav.html", NAV),
        (
            "src/pages/index.html",
            r#"<Layout title="Home"><h1>Welcome</h1></Layout>"#,
        ),
        (
            "src/pages/about/index.html",
            r#"<Layout title="About"><p>About us &amp; them</p></Layout>"#,
        ),
    ]);
    let root = dir.path();

    let summary = build(options(root)).unwrap();

    assert_eq!(summary.components.len(), 2);
    assert_eq!(summary.pages.len(), 2);
    assert!(summary.unbound.is_empty());
    assert_eq!(summary.stylesheet, None);

    assert_eq!(
        read(root, "dist/index.html"),
        concat!(
            "<!DOCTYPE html><html><head><title>Home</title></head><body>",
            r#"<nav><a href="/" class="active">Home</a><a href="/about.html">About</a></nav>"#,
            "<h1>Welcome</h1></body></html>"
        )
    );
    assert_eq!(
        read(root, "dist/about/index.html"),
        concat!(
            "<!DOCTYPE html><html><head><title>About</title></head><body>",
            r#"<nav><a href="/">Home</a><a href="/about.html" class="active">About</a></nav>"#,
            "<p>About us &amp; them</p></body></html>"
        )
    );
}

#[test]
fn test_failed_page_aborts_with_every_error() {
    let dir = project(&[
        ("_sitegen.yml", "stylesheet: null\n"),
        ("src/react/card.html", "<div>{props.text}</div>"),
        ("src/pages/good.html", r#"<Card text="ok" />"#),
        ("src/pages/missing.html", "<main><Sidebar /></main>"),
        ("src/pages/broken.html", "<main>"),
    ]);
    let root = dir.path();

    let err = build(options(root)).unwrap_err();
    let BuildError::Batch {
        stage,
        total,
        errors,
    } = &err
    else {
        panic!("expected a batch error, got {err}");
    };
    assert_eq!(*stage, Stage::Pages);
    assert_eq!(*total, 3);
    assert_eq!(errors.len(), 2);
    assert!(errors.iter().any(|e| matches!(
        e,
        BuildError::Template { source: TemplateError::MissingComponent { .. }, .. }
    )));
    assert!(errors.iter().any(|e| matches!(
        e,
        BuildError::Template { source: TemplateError::Transform { .. }, .. }
    )));

    // Siblings are not rolled back; failed pages produce nothing.
    assert!(root.join("dist/good.html").exists());
    assert!(!root.join("dist/missing.html").exists());
}

#[test]
fn test_component_failure_prevents_page_rendering() {
    let dir = project(&[
        ("_sitegen.yml", "stylesheet: null\n"),
        ("src/react/bad.html", "<div>{props.}</div>"),
        ("src/pages/index.html", "<p>hi</p>"),
    ]);
    let root = dir.path();

    let err = build(options(root)).unwrap_err();
    assert!(matches!(
        err,
        BuildError::Batch {
            stage: Stage::Components,
            ..
        }
    ));
    assert!(!root.join("dist").exists());
}

#[test]
fn test_duplicate_names_last_discovered_wins() {
    let dir = project(&[
        ("_sitegen.yml", "stylesheet: null\njobs: 4\n"),
        ("src/react/a/badge.html", "<b>a</b>"),
        ("src/react/b/Badge.html", "<b>b</b>"),
        ("src/pages/index.html", "<p><Badge /></p>"),
    ]);
    let root = dir.path();

    build(options(root)).unwrap();
    assert_eq!(read(root, "dist/index.html"), "<!DOCTYPE html><p><b>b</b></p>");
}

#[test]
fn test_duplicate_names_rejected_when_strict() {
    let dir = project(&[
        (
            "_sitegen.yml",
            "stylesheet: null\nduplicate-components: error\n",
        ),
        ("src/react/a/badge.html", "<b>a</b>"),
        ("src/react/b/badge.html", "<b>b</b>"),
    ]);

    let err = build(options(dir.path())).unwrap_err();
    assert!(err.failures().iter().any(|e| matches!(
        e,
        BuildError::Template {
            source: TemplateError::DuplicateComponent { name, .. },
            ..
        } if name == "Badge"
    )));
}

#[test]
fn test_unbound_reference_is_reported_in_summary() {
    let dir = project(&[
        ("_sitegen.yml", "stylesheet: null\n"),
        ("src/react/shell.html", "<div><Ghost /></div>"),
        ("src/react/card.html", "<p>{props.text}</p>"),
        ("src/pages/index.html", r#"<Card text="hi" />"#),
    ]);

    let summary = build(options(dir.path())).unwrap();
    assert_eq!(summary.unbound, vec!["Ghost"]);
    assert_eq!(read(dir.path(), "dist/index.html"), "<!DOCTYPE html><p>hi</p>");
}

#[test]
fn test_unbound_reference_fails_at_render() {
    let dir = project(&[
        ("_sitegen.yml", "stylesheet: null\n"),
        ("src/react/shell.html", "<div><Footer /></div>"),
        ("src/pages/index.html", "<Shell />"),
    ]);

    let err = build(options(dir.path())).unwrap_err();
    assert!(err.failures().iter().any(|e| matches!(
        e,
        BuildError::Template {
            source: TemplateError::UnresolvedReference { name },
            ..
        } if name == "Footer"
    )));
}

#[test]
fn test_stylesheet_is_compiled_after_pages() {
    let dir = project(&[
        ("src/react/box.html", "<div />"),
        ("src/pages/index.html", "<Box />"),
        ("src/css/_vars.scss", "$gap: 4px;\n"),
        (
            "src/css/app.scss",
            "@use \"vars\";\n.box { margin: vars.$gap; }\n",
        ),
    ]);
    let root = dir.path();

    let summary = build(options(root)).unwrap();
    assert_eq!(summary.stylesheet, Some(root.join("dist/css/app.css")));
    assert!(read(root, "dist/css/app.css").contains("margin: 4px;"));
}

#[test]
fn test_missing_stylesheet_entry_fails() {
    let dir = project(&[("src/pages/index.html", "<p />")]);
    let err = build(options(dir.path())).unwrap_err();
    assert!(matches!(
        err,
        BuildError::Style {
            source: StyleError::NotFound,
            ..
        }
    ));
}

struct Recording;

impl StyleCompiler for Recording {
    fn compile(&self, entry: &Path) -> Result<String, StyleError> {
        Ok(format!("/* {} */", entry.file_name().unwrap().to_string_lossy()))
    }
}

#[test]
fn test_custom_style_compiler() {
    let dir = project(&[("src/pages/index.html", "<p />")]);
    let root = dir.path();

    Builder::new(options(root))
        .with_style_compiler(Recording)
        .build()
        .unwrap();
    assert_eq!(read(root, "dist/css/app.css"), "/* app.scss */");
}

#[test]
fn test_empty_project() {
    let dir = project(&[("_sitegen.yml", "stylesheet: null\n")]);
    let summary = build(options(dir.path())).unwrap();
    assert!(summary.components.is_empty());
    assert!(summary.pages.is_empty());
}
