//! Notebook parser adapter
//!
//! # The High-Level Concept
//!
//! The adapter is the entry point for a single document. It picks a converter for the
//! document, and from there drives the whole pipeline:
//!
//! 1. convert the source to a [`Notebook`] (or, when no converter accepts the document,
//!    parse it as plain markup and skip straight to step 6),
//! 2. attach cached outputs when execution is enabled,
//! 3. convert the notebook to tokens with the converter's parser options,
//! 4. write the notebook and its outputs through the materializer,
//! 5. record the notebook's glue keys,
//! 6. build the document tree.
//!
//! Only a failed conversion aborts the document. Everything after it degrades to
//! diagnostics, so a broken output or an unknown renderer still yields a page.

use crate::convert::{markup_to_tokens, notebook_to_tokens, Conversion, DEFAULT_RENDERER};
use crate::converters::ConverterRegistry;
use crate::directive::DirectiveRegistry;
use crate::error::{ConversionFailure, Diagnostic, DiagnosticKind};
use crate::execution::{
    DirectoryCache, ExecutionCache, ExecutionMode, ExecutionSettings, NoExecution,
};
use crate::glue::GlueRegistry;
use crate::markup::ParserConfig;
use crate::materialize::{NullMaterializer, OutputHandle, OutputMaterializer};
use crate::notebook::Notebook;
use crate::tree::{CellRendererRegistry, Document, TreeBuilder};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// The document being parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentTarget {
    /// Name relative to the source root, without extension, `/`-separated
    pub docname: String,
    pub path: PathBuf,
}

impl DocumentTarget {
    pub fn new(docname: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            docname: docname.into(),
            path: path.into(),
        }
    }

    /// Target named after the file stem of `path`.
    pub fn from_path(path: &Path) -> Self {
        let docname = path
            .file_stem()
            .and_then(|stem| stem.to_str())
            .unwrap_or("index")
            .to_string();
        Self::new(docname, path)
    }
}

/// Everything produced for one document.
#[derive(Debug, Clone)]
pub struct ParsedDocument {
    pub document: Document,
    pub conversion: Conversion,
    /// Diagnostics from every stage, attributed to the document
    pub diagnostics: Vec<Diagnostic>,
    /// `None` for plain markup documents
    pub notebook: Option<Notebook>,
    pub outputs: Option<OutputHandle>,
}

pub struct NotebookParser {
    converters: ConverterRegistry,
    markup_config: ParserConfig,
    execution: ExecutionSettings,
    cache: Box<dyn ExecutionCache>,
    materializer: Box<dyn OutputMaterializer>,
    glue: Arc<GlueRegistry>,
    directives: DirectiveRegistry,
    renderers: CellRendererRegistry,
    renderer: String,
}

impl NotebookParser {
    /// Parser with the built-in converters, no execution and in-memory outputs.
    pub fn new(config: ParserConfig) -> Self {
        Self {
            converters: ConverterRegistry::with_defaults(config),
            markup_config: config,
            execution: ExecutionSettings::default(),
            cache: Box::new(NoExecution),
            materializer: Box::new(NullMaterializer),
            glue: Arc::new(GlueRegistry::new()),
            directives: DirectiveRegistry::with_defaults(),
            renderers: CellRendererRegistry::with_defaults(),
            renderer: DEFAULT_RENDERER.to_string(),
        }
    }

    pub fn with_converters(mut self, converters: ConverterRegistry) -> Self {
        self.converters = converters;
        self
    }

    /// Enable execution per `settings`; `cache` mode reads `settings.cache_path`.
    pub fn with_execution(mut self, settings: ExecutionSettings) -> Self {
        self.cache = match settings.mode {
            ExecutionMode::Off => Box::new(NoExecution),
            ExecutionMode::Cache => Box::new(DirectoryCache::new(settings.cache_path.clone())),
        };
        self.execution = settings;
        self
    }

    pub fn with_cache<C: ExecutionCache + 'static>(mut self, cache: C) -> Self {
        self.cache = Box::new(cache);
        self
    }

    pub fn with_materializer<M: OutputMaterializer + 'static>(mut self, materializer: M) -> Self {
        self.materializer = Box::new(materializer);
        self
    }

    pub fn with_glue(mut self, glue: Arc<GlueRegistry>) -> Self {
        self.glue = glue;
        self
    }

    pub fn with_renderers(mut self, renderers: CellRendererRegistry) -> Self {
        self.renderers = renderers;
        self
    }

    /// Name of the code cell renderer written into every code cell token.
    pub fn with_renderer(mut self, name: impl Into<String>) -> Self {
        self.renderer = name.into();
        self
    }

    pub fn glue(&self) -> &Arc<GlueRegistry> {
        &self.glue
    }

    pub fn parse(
        &self,
        source: &str,
        target: &DocumentTarget,
    ) -> Result<ParsedDocument, ConversionFailure> {
        let lines: Vec<&str> = source.lines().collect();
        let Some(converter) = self.converters.resolve(&target.path, &lines) else {
            tracing::debug!(docname = %target.docname, "no notebook converter, reading as markup");
            let conversion = markup_to_tokens(source, &self.markup_config);
            return Ok(self.assemble(target, conversion, None, None, Vec::new()));
        };

        let notebook = converter.convert(source).map_err(|err| {
            tracing::error!(
                docname = %target.docname,
                line = 1,
                converter = converter.name(),
                error = %err,
                "conversion to notebook failed"
            );
            ConversionFailure {
                docname: target.docname.clone(),
                line: 1,
                reason: err.to_string(),
            }
        })?;

        let notebook = match self.execution.mode {
            ExecutionMode::Off => notebook,
            ExecutionMode::Cache => self
                .cache
                .apply(&notebook, self.execution.show_traceback)
                .into_owned(),
        };

        let conversion = notebook_to_tokens(&notebook, &converter.parser_config(), &self.renderer);

        let mut diagnostics = Vec::new();
        let outputs = match self.materializer.materialize(&target.docname, &notebook) {
            Ok(handle) => Some(handle),
            Err(err) => {
                diagnostics.push(Diagnostic::new(
                    DiagnosticKind::MaterializeFailed,
                    Some(1),
                    format!("outputs were not written: {err}"),
                ));
                None
            }
        };

        let glue_path = outputs
            .as_ref()
            .map(|handle| handle.notebook_path.as_path())
            .unwrap_or(&target.path);
        self.glue.add_notebook(&target.docname, &notebook, glue_path);

        Ok(self.assemble(target, conversion, Some(notebook), outputs, diagnostics))
    }

    fn assemble(
        &self,
        target: &DocumentTarget,
        conversion: Conversion,
        notebook: Option<Notebook>,
        outputs: Option<OutputHandle>,
        mut diagnostics: Vec<Diagnostic>,
    ) -> ParsedDocument {
        let mut builder = TreeBuilder::new(&self.directives, &self.renderers);
        if let Some(handle) = &outputs {
            builder = builder.with_outputs(handle);
        }
        let built = builder.build(&conversion.tokens);

        diagnostics.extend(conversion.diagnostics.iter().cloned());
        diagnostics.extend(built.diagnostics);
        let diagnostics = diagnostics
            .into_iter()
            .map(|diagnostic| diagnostic.in_document(&target.docname))
            .collect();

        ParsedDocument {
            document: built.document,
            conversion,
            diagnostics,
            notebook,
            outputs,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markup::Token;
    use crate::tree::DocNode;

    const NOTEBOOK: &str = r##"{
        "cells": [
            {"cell_type": "markdown", "metadata": {"slideshow": {"slide_type": "slide"}},
             "source": "# Deck\n\nSee [docs]."},
            {"cell_type": "markdown", "metadata": {}, "source": "[docs]: https://example.org"}
        ],
        "metadata": {"kernelspec": {"language": "python", "name": "python3"}},
        "nbformat": 4,
        "nbformat_minor": 5
    }"##;

    #[test]
    fn parses_notebooks_into_trees() {
        let parser = NotebookParser::new(ParserConfig::default());
        let parsed = parser
            .parse(NOTEBOOK, &DocumentTarget::new("deck", "deck.ipynb"))
            .unwrap();
        assert_eq!(parsed.document.title().as_deref(), Some("Deck"));
        assert_eq!(parsed.document.cell_metas().len(), 2);
        assert!(parsed.diagnostics.is_empty());
        assert!(matches!(parsed.conversion.tokens[0], Token::FrontMatter { .. }));
        assert!(parsed.notebook.is_some());
    }

    #[test]
    fn plain_markup_has_no_carriers() {
        let parser = NotebookParser::new(ParserConfig::default());
        let parsed = parser
            .parse("# Title\n\nText.\n", &DocumentTarget::new("page", "page.md"))
            .unwrap();
        assert!(parsed.document.cell_metas().is_empty());
        assert!(parsed.notebook.is_none());
        assert!(matches!(parsed.document.children[0], DocNode::Section(_)));
    }

    #[test]
    fn conversion_failure_is_reported_at_line_one() {
        let parser = NotebookParser::new(ParserConfig::default());
        let failure = parser
            .parse("{not json", &DocumentTarget::new("broken", "broken.ipynb"))
            .unwrap_err();
        assert_eq!(failure.docname, "broken");
        assert_eq!(failure.line, 1);
    }

    #[test]
    fn diagnostics_carry_the_docname() {
        let source = r#"{"cells": [{"cell_type": "code", "metadata": {}, "source": "x",
            "outputs": [], "execution_count": null}], "metadata": {}, "nbformat": 4}"#;
        let parser = NotebookParser::new(ParserConfig::default());
        let parsed = parser
            .parse(source, &DocumentTarget::new("nolang", "nolang.ipynb"))
            .unwrap();
        assert_eq!(parsed.diagnostics.len(), 1);
        assert_eq!(parsed.diagnostics[0].kind, DiagnosticKind::UnresolvedLanguageLexer);
        assert_eq!(parsed.diagnostics[0].docname.as_deref(), Some("nolang"));
    }
}
