//! Directory builds
//!
//!     A build converts every notebook and markdown document below a source directory and
//!     writes one page per document into the output directory:
//!
//!         <out>/<docname>.<ext>          rendered page
//!         <out>/_sources/<docname>.*     copy of the source, offered for download
//!         <out>/_nb/...                  materialized notebooks and outputs
//!         <out>/_static/...              presentation assets (HTML builds)
//!
//!     Documents are processed in parallel. Each worker owns its document's reference
//!     environment and token stream; only the glue registry is shared. A document that
//!     fails to convert is recorded in the report and the others carry on.

use crate::adapter::{DocumentTarget, NotebookParser};
use crate::convert::DEFAULT_RENDERER;
use crate::error::{BuildError, Diagnostic};
use crate::execution::ExecutionSettings;
use crate::format::Format;
use crate::glue::GlueRegistry;
use crate::markup::ParserConfig;
use crate::materialize::DiskMaterializer;
use crate::page::{DownloadSourceHook, PageContext, PageHooks};
use crate::presentation::{is_slide_deck, PresentationTrigger};
use crate::registry::FormatRegistry;
use crate::static_assets;
use crate::tree::RenderTarget;
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use walkdir::{DirEntry, WalkDir};

/// Directory, relative to the output root, holding copies of the sources.
pub const SOURCES_DIR: &str = "_sources";

/// Source file extensions picked up by a build.
pub const SOURCE_EXTENSIONS: [&str; 2] = ["ipynb", "md"];

#[derive(Debug, Clone)]
pub struct BuildOptions {
    pub source_dir: PathBuf,
    pub out_dir: PathBuf,
    /// Output format name, looked up in the format registry
    pub format: String,
    pub parser: ParserConfig,
    pub execution: ExecutionSettings,
    /// Code cell renderer name
    pub renderer: String,
    /// Register the presentation trigger
    pub presentation: bool,
    /// Copy sources next to the pages and add a download button
    pub copy_sources: bool,
}

impl BuildOptions {
    pub fn new(source_dir: impl Into<PathBuf>, out_dir: impl Into<PathBuf>) -> Self {
        Self {
            source_dir: source_dir.into(),
            out_dir: out_dir.into(),
            format: "html".to_string(),
            parser: ParserConfig::default(),
            execution: ExecutionSettings::default(),
            renderer: DEFAULT_RENDERER.to_string(),
            presentation: true,
            copy_sources: true,
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct DocumentReport {
    pub docname: String,
    pub output: PathBuf,
    pub slide_deck: bool,
    pub diagnostics: Vec<Diagnostic>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DocumentFailure {
    pub docname: String,
    pub message: String,
}

#[derive(Debug, Clone, Default, Serialize)]
pub struct BuildReport {
    pub documents: Vec<DocumentReport>,
    pub failures: Vec<DocumentFailure>,
    pub static_files: Vec<PathBuf>,
}

impl BuildReport {
    pub fn is_success(&self) -> bool {
        self.failures.is_empty()
    }

    pub fn diagnostics(&self) -> impl Iterator<Item = &Diagnostic> {
        self.documents.iter().flat_map(|doc| doc.diagnostics.iter())
    }
}

pub struct Builder {
    options: BuildOptions,
    parser: NotebookParser,
    formats: FormatRegistry,
    hooks: PageHooks,
}

impl Builder {
    pub fn new(options: BuildOptions) -> Self {
        let parser = NotebookParser::new(options.parser)
            .with_execution(options.execution.clone())
            .with_renderer(options.renderer.clone())
            .with_materializer(DiskMaterializer::new(options.out_dir.clone()));

        let mut hooks = PageHooks::new();
        hooks.register(DownloadSourceHook);
        if options.presentation {
            hooks.register(PresentationTrigger);
        }

        Self {
            options,
            parser,
            formats: FormatRegistry::with_defaults(),
            hooks,
        }
    }

    pub fn with_formats(mut self, formats: FormatRegistry) -> Self {
        self.formats = formats;
        self
    }

    pub fn glue(&self) -> &Arc<GlueRegistry> {
        self.parser.glue()
    }

    /// Source files below the source directory, sorted.
    pub fn discover(&self) -> Result<Vec<PathBuf>, BuildError> {
        let root = &self.options.source_dir;
        if !root.is_dir() {
            return Err(BuildError::Read {
                path: root.clone(),
                source: std::io::Error::new(std::io::ErrorKind::NotFound, "not a directory"),
            });
        }

        let out_dir = &self.options.out_dir;
        let mut sources: Vec<PathBuf> = WalkDir::new(root)
            .into_iter()
            .filter_entry(|entry| entry.depth() == 0 || !is_skipped(entry, out_dir))
            .filter_map(|entry| entry.ok())
            .filter(|entry| entry.file_type().is_file())
            .map(|entry| entry.into_path())
            .filter(|path| {
                path.extension()
                    .and_then(|ext| ext.to_str())
                    .is_some_and(|ext| SOURCE_EXTENSIONS.contains(&ext))
            })
            .collect();
        sources.sort();
        Ok(sources)
    }

    pub fn run(&self) -> Result<BuildReport, BuildError> {
        let format = self.formats.get(&self.options.format)?;
        let extension = format.file_extensions().first().copied().unwrap_or("out");
        let (sources, collisions) = claim_docnames(&self.options.source_dir, self.discover()?);

        let out_dir = &self.options.out_dir;
        fs::create_dir_all(out_dir).map_err(|source| BuildError::Write {
            path: out_dir.clone(),
            source,
        })?;
        let static_files = if format.target() == RenderTarget::Html {
            static_assets::install(out_dir)?
        } else {
            Vec::new()
        };

        tracing::info!(
            documents = sources.len(),
            format = format.name(),
            out = %out_dir.display(),
            "starting build"
        );

        let results: Vec<Result<DocumentReport, DocumentFailure>> = sources
            .par_iter()
            .map(|path| self.build_document(path, format, extension))
            .collect();

        let mut report = BuildReport {
            static_files,
            failures: collisions,
            ..BuildReport::default()
        };
        for result in results {
            match result {
                Ok(document) => report.documents.push(document),
                Err(failure) => report.failures.push(failure),
            }
        }

        tracing::info!(
            built = report.documents.len(),
            failed = report.failures.len(),
            "build finished"
        );
        Ok(report)
    }

    fn build_document(
        &self,
        path: &Path,
        format: &dyn Format,
        extension: &str,
    ) -> Result<DocumentReport, DocumentFailure> {
        let docname = docname_for(&self.options.source_dir, path);
        let fail = |message: String| DocumentFailure {
            docname: docname.clone(),
            message,
        };

        let source = fs::read_to_string(path)
            .map_err(|err| fail(format!("failed to read {}: {err}", path.display())))?;
        let target = DocumentTarget::new(docname.clone(), path);
        let parsed = self
            .parser
            .parse(&source, &target)
            .map_err(|failure| fail(failure.to_string()))?;

        for diagnostic in &parsed.diagnostics {
            tracing::warn!("{diagnostic}");
        }

        let title = parsed
            .document
            .title()
            .unwrap_or_else(|| docname.clone());
        let mut context = PageContext::new(docname.clone(), title);

        if self.options.copy_sources {
            let file_name = match path.extension().and_then(|ext| ext.to_str()) {
                Some(ext) => format!("{docname}.{ext}"),
                None => docname.clone(),
            };
            let copy = self.options.out_dir.join(SOURCES_DIR).join(&file_name);
            write_file(&copy, source.as_bytes()).map_err(|err| fail(err.to_string()))?;
            context = context.with_source_download(format!("{SOURCES_DIR}/{file_name}"));
        }

        self.hooks.run(&mut context, &parsed.document);

        let rendered = format
            .serialize(&parsed.document, &context)
            .map_err(|err| fail(err.to_string()))?;
        let output = self.options.out_dir.join(format!("{docname}.{extension}"));
        write_file(&output, rendered.as_bytes()).map_err(|err| fail(err.to_string()))?;

        tracing::debug!(docname = %docname, output = %output.display(), "wrote page");
        Ok(DocumentReport {
            slide_deck: is_slide_deck(&parsed.document, &docname),
            docname,
            output,
            diagnostics: parsed.diagnostics,
        })
    }
}

/// Hidden and underscore-prefixed entries, and the output directory itself.
fn is_skipped(entry: &DirEntry, out_dir: &Path) -> bool {
    let hidden = entry
        .file_name()
        .to_str()
        .is_some_and(|name| name.starts_with('.') || name.starts_with('_'));
    hidden || entry.path() == out_dir
}

/// Keeps the first source (in sorted order) for every docname. Later sources mapping to
/// the same docname would overwrite its page, so they are reported as failures instead.
fn claim_docnames(root: &Path, sources: Vec<PathBuf>) -> (Vec<PathBuf>, Vec<DocumentFailure>) {
    let mut claimed: HashMap<String, PathBuf> = HashMap::new();
    let mut kept = Vec::with_capacity(sources.len());
    let mut collisions = Vec::new();
    for path in sources {
        let docname = docname_for(root, &path);
        match claimed.get(&docname) {
            Some(owner) => {
                tracing::warn!(
                    docname = %docname,
                    kept = %owner.display(),
                    skipped = %path.display(),
                    "two sources share a docname"
                );
                collisions.push(DocumentFailure {
                    message: format!(
                        "{} and {} both map to docname '{docname}'; skipped {}",
                        owner.display(),
                        path.display(),
                        path.display()
                    ),
                    docname,
                });
            }
            None => {
                claimed.insert(docname, path.clone());
                kept.push(path);
            }
        }
    }
    (kept, collisions)
}

/// `/`-separated path of `path` relative to `root`, without extension.
pub fn docname_for(root: &Path, path: &Path) -> String {
    let relative = path.strip_prefix(root).unwrap_or(path).with_extension("");
    relative
        .components()
        .filter_map(|component| component.as_os_str().to_str())
        .collect::<Vec<_>>()
        .join("/")
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), BuildError> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|source| BuildError::Write {
            path: parent.to_path_buf(),
            source,
        })?;
    }
    fs::write(path, contents).map_err(|source| BuildError::Write {
        path: path.to_path_buf(),
        source,
    })
}
