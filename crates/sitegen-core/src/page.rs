/*
 * page.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! Page rendering.

use crate::error::{BuildError, Result};
use sitegen_template::{PageGlobals, Program, Sandbox, render_document, transform};
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::debug;

/// Render one page against the resolved components and write it under
/// `output_root`, mirroring its position under `pages_root`.
///
/// Returns the path written.
pub fn render_page(
    globals: &Arc<PageGlobals>,
    page: &Path,
    pages_root: &Path,
    output_root: &Path,
) -> Result<PathBuf> {
    let source = fs::read_to_string(page).map_err(|source| BuildError::Read {
        path: page.to_path_buf(),
        source,
    })?;

    let body = transform(&source).map_err(|e| BuildError::template(page, e))?;
    let sandbox = Sandbox::new(globals.clone());
    let html = sandbox
        .run(&Program::page(body.into_expr()))
        .and_then(|tree| render_document(&tree))
        .map_err(|e| BuildError::template(page, e))?;

    let output = output_path(page, pages_root, output_root);
    if let Some(parent) = output.parent() {
        fs::create_dir_all(parent).map_err(|source| BuildError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(&output, html).map_err(|source| BuildError::Write {
        path: output.clone(),
        source,
    })?;

    debug!(page = %page.display(), output = %output.display(), "Rendered page");
    Ok(output)
}

/// Where a page is written: the output root joined with the page's path
/// relative to the pages root.
pub fn output_path(page: &Path, pages_root: &Path, output_root: &Path) -> PathBuf {
    match page.strip_prefix(pages_root) {
        Ok(relative) => output_root.join(relative),
        Err(_) => output_root.join(page.file_name().unwrap_or_default()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use sitegen_template::{ResolvedComponents, TemplateError};

    #[test]
    fn test_output_path_mirrors_layout() {
        assert_eq!(
            output_path(
                Path::new("/site/src/pages/blog/post.html"),
                Path::new("/site/src/pages"),
                Path::new("/site/dist"),
            ),
            PathBuf::from("/site/dist/blog/post.html")
        );
        assert_eq!(
            output_path(
                Path::new("/elsewhere/index.html"),
                Path::new("/site/src/pages"),
                Path::new("/site/dist"),
            ),
            PathBuf::from("/site/dist/index.html")
        );
    }

    #[test]
    fn test_render_page_writes_document() {
        let dir = tempfile::tempdir().unwrap();
        let pages = dir.path().join("pages");
        let out = dir.path().join("out");
        fs::create_dir_all(pages.join("docs")).unwrap();
        let page = pages.join("docs/index.html");
        fs::write(&page, "<main><h1>Docs</h1></main>").unwrap();

        let globals = Arc::new(PageGlobals::new(ResolvedComponents::default()));
        let written = render_page(&globals, &page, &pages, &out).unwrap();

        assert_eq!(written, out.join("docs/index.html"));
        assert_eq!(
            fs::read_to_string(&written).unwrap(),
            "<!DOCTYPE html><main><h1>Docs</h1></main>"
        );
    }

    #[test]
    fn test_missing_component_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let page = dir.path().join("index.html");
        fs::write(&page, "<div><Nav /></div>").unwrap();
        let out = dir.path().join("out");

        let globals = Arc::new(PageGlobals::default());
        let err = render_page(&globals, &page, dir.path(), &out).unwrap_err();

        assert!(matches!(
            err,
            BuildError::Template {
                source: TemplateError::MissingComponent { ref name },
                ..
            } if name == "Nav"
        ));
        assert!(!out.join("index.html").exists());
    }
}
