/*
 * build.rs
 * Copyright (c) 2025 Posit, PBC
 */

//! The build pipeline.
//!
//! 1. Discover and compile every component into a shared registry.
//! 2. Wait for the whole component batch (hard barrier).
//! 3. Discover and render every page against the resolved registry.
//! 4. Compile the stylesheet, if one is configured.
//!
//! Each batch runs on a rayon pool. A batch reports every failed file and
//! aborts the build; files that succeeded in a failed batch are not
//! rolled back.

use crate::component::{CompiledComponent, compile_component};
use crate::config::BuildOptions;
use crate::discovery::discover_templates;
use crate::error::{BuildError, Result, Stage};
use crate::page::render_page;
use crate::style::{GrassCompiler, StyleCompiler, build_stylesheet};
use rayon::prelude::*;
use sitegen_template::{ComponentRegistry, PageGlobals};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Worker stack size. Nested component rendering recurses deeply.
const WORKER_STACK_SIZE: usize = 32 * 1024 * 1024;

/// What a successful build produced.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BuildSummary {
    pub components: Vec<CompiledComponent>,
    pub pages: Vec<PathBuf>,
    pub stylesheet: Option<PathBuf>,
    /// Names referenced by components but never defined.
    pub unbound: Vec<String>,
}

pub struct Builder {
    options: BuildOptions,
    style_compiler: Box<dyn StyleCompiler>,
}

impl Builder {
    pub fn new(options: BuildOptions) -> Self {
        let style_compiler = options
            .stylesheet
            .as_ref()
            .map(|style| GrassCompiler::new(style.load_paths.clone(), style.minified))
            .unwrap_or_default();
        Self {
            options,
            style_compiler: Box::new(style_compiler),
        }
    }

    /// Use a different stylesheet compiler.
    pub fn with_style_compiler(mut self, compiler: impl StyleCompiler + 'static) -> Self {
        self.style_compiler = Box::new(compiler);
        self
    }

    pub fn options(&self) -> &BuildOptions {
        &self.options
    }

    /// Run the whole pipeline.
    pub fn build(&self) -> Result<BuildSummary> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.options.jobs)
            .stack_size(WORKER_STACK_SIZE)
            .thread_name(|i| format!("sitegen-worker-{}", i))
            .build()?;
        pool.install(|| self.run())
    }

    fn run(&self) -> Result<BuildSummary> {
        let options = &self.options;

        let registry = Arc::new(ComponentRegistry::new(options.duplicate_policy));
        let component_files = discover_templates(&options.components_dir, &options.extension)?;
        info!(
            count = component_files.len(),
            dir = %options.components_dir.display(),
            "Compiling components"
        );
        let components = run_batch(Stage::Components, &component_files, |ordinal, path| {
            compile_component(&registry, path, ordinal)
        })?;

        // Every component task has returned; the registry is complete.
        let unbound = registry.unbound_names();
        for name in &unbound {
            warn!(component = %name, "Component is referenced but never defined");
        }

        let page_files = discover_templates(&options.pages_dir, &options.extension)?;
        info!(
            count = page_files.len(),
            dir = %options.pages_dir.display(),
            "Rendering pages"
        );
        let globals = Arc::new(PageGlobals::new(registry.resolved()));
        let pages = run_batch(Stage::Pages, &page_files, |_, page| {
            render_page(&globals, page, &options.pages_dir, &options.output_dir)
        })?;

        let stylesheet = match &options.stylesheet {
            Some(style) => {
                info!(entry = %style.entry.display(), "Compiling stylesheet");
                Some(build_stylesheet(style, self.style_compiler.as_ref())?)
            }
            None => None,
        };

        Ok(BuildSummary {
            components,
            pages,
            stylesheet,
            unbound,
        })
    }
}

/// Build with the default stylesheet compiler.
pub fn build(options: BuildOptions) -> Result<BuildSummary> {
    Builder::new(options).build()
}

/// Run `task` for every file in parallel and wait for all of them.
///
/// The task receives the file's index, which is its discovery ordinal.
fn run_batch<T, F>(stage: Stage, files: &[PathBuf], task: F) -> Result<Vec<T>>
where
    T: Send,
    F: Fn(usize, &Path) -> Result<T> + Sync,
{
    let results: Vec<Result<T>> = files
        .par_iter()
        .enumerate()
        .map(|(ordinal, path)| task(ordinal, path))
        .collect();

    let total = results.len();
    let mut values = Vec::with_capacity(total);
    let mut errors = Vec::new();
    for result in results {
        match result {
            Ok(value) => values.push(value),
            Err(e) => errors.push(e),
        }
    }

    debug!(%stage, total, failed = errors.len(), "Batch settled");
    if errors.is_empty() {
        Ok(values)
    } else {
        Err(BuildError::Batch {
            stage,
            total,
            errors,
        })
    }
}
