//! End to end: adapter, page hooks, formats and directory builds.

use crate::common::{fixture_path, load_fixture};
use nbdeck_babel::adapter::{DocumentTarget, NotebookParser};
use nbdeck_babel::build::{BuildOptions, Builder};
use nbdeck_babel::error::DiagnosticKind;
use nbdeck_babel::markup::ParserConfig;
use nbdeck_babel::page::{Asset, DownloadSourceHook, PageContext, PageHooks};
use nbdeck_babel::presentation::{is_slide_deck, PresentationTrigger};
use nbdeck_babel::registry::FormatRegistry;
use std::fs;
use tempfile::tempdir;

const SLIDE_CARRIER: &str = r#"<script type="application/json" data-cell-meta="">{"slideshow":{"slide_type":"slide"}}</script>"#;

fn presentation_hooks() -> PageHooks {
    let mut hooks = PageHooks::new();
    hooks.register(DownloadSourceHook);
    hooks.register(PresentationTrigger);
    hooks
}

#[test]
fn test_three_cell_deck_is_a_slide_deck() {
    let parser = NotebookParser::new(ParserConfig::default());
    let parsed = parser
        .parse(
            &load_fixture("three_cells.ipynb"),
            &DocumentTarget::new("three_cells", fixture_path("three_cells.ipynb")),
        )
        .unwrap();
    assert!(is_slide_deck(&parsed.document, "three_cells"));

    let mut context = PageContext::new("three_cells", "Title");
    presentation_hooks().run(&mut context, &parsed.document);

    assert_eq!(context.header_buttons.len(), 1);
    assert_eq!(context.header_buttons[0].action, "startPresentation()");
    assert_eq!(
        context.assets,
        vec![
            Asset::Css("vendor/reveal.css".to_string()),
            Asset::Css("vendor/simple.css".to_string()),
            Asset::Css("fix-theme.css".to_string()),
            Asset::Js("vendor/reveal.js".to_string()),
            Asset::Js("present.js".to_string()),
        ]
    );
}

#[test]
fn test_presentation_button_precedes_download_button() {
    let parser = NotebookParser::new(ParserConfig::default());
    let parsed = parser
        .parse(
            &load_fixture("three_cells.ipynb"),
            &DocumentTarget::new("three_cells", "three_cells.ipynb"),
        )
        .unwrap();

    let mut context = PageContext::new("three_cells", "Title")
        .with_source_download("_sources/three_cells.ipynb");
    presentation_hooks().run(&mut context, &parsed.document);

    let kinds: Vec<&str> = context
        .header_buttons
        .iter()
        .map(|button| button.kind.as_str())
        .collect();
    assert_eq!(kinds, vec!["javascript", "link"]);
}

#[test]
fn test_page_without_slideshow_is_left_alone() {
    let parser = NotebookParser::new(ParserConfig::default());
    let parsed = parser
        .parse(
            &load_fixture("skipped_cells.ipynb"),
            &DocumentTarget::new("skipped", "skipped_cells.ipynb"),
        )
        .unwrap();

    let mut context = PageContext::new("skipped", "Skipped");
    presentation_hooks().run(&mut context, &parsed.document);
    assert!(context.header_buttons.is_empty());
    assert!(context.assets.is_empty());
}

#[test]
fn test_html_embeds_carriers_byte_for_byte() {
    let parser = NotebookParser::new(ParserConfig::default());
    let parsed = parser
        .parse(
            &load_fixture("three_cells.ipynb"),
            &DocumentTarget::new("three_cells", "three_cells.ipynb"),
        )
        .unwrap();
    let registry = FormatRegistry::with_defaults();
    let html = registry
        .serialize(&parsed.document, &PageContext::new("three_cells", "Title"), "html")
        .unwrap();

    assert!(html.contains(SLIDE_CARRIER));
    assert_eq!(html.matches("data-cell-meta=\"\"").count(), 3);
    assert!(html.contains("<main id=\"main-content\">"));
    assert!(html.contains("data-cell-index=\"1\""));
}

#[test]
fn test_other_formats_drop_carriers() {
    let parser = NotebookParser::new(ParserConfig::default());
    let parsed = parser
        .parse(
            &load_fixture("three_cells.ipynb"),
            &DocumentTarget::new("three_cells", "three_cells.ipynb"),
        )
        .unwrap();
    let registry = FormatRegistry::with_defaults();
    let page = PageContext::new("three_cells", "Title");

    for format in ["text", "latex", "man"] {
        let output = registry.serialize(&parsed.document, &page, format).unwrap();
        assert!(!output.contains("slideshow"), "{format} leaked a carrier");
        assert!(output.contains("x=1"), "{format} lost the code cell");
    }
}

#[test]
fn test_malformed_notebook_is_a_conversion_failure() {
    let parser = NotebookParser::new(ParserConfig::default());
    let failure = parser
        .parse("{ not json", &DocumentTarget::new("broken", "broken.ipynb"))
        .unwrap_err();
    assert_eq!(failure.docname, "broken");
    assert_eq!(failure.line, 1);
}

#[test]
fn test_text_notebook_goes_through_the_same_pipeline() {
    let parser = NotebookParser::new(ParserConfig::default());
    let parsed = parser
        .parse(
            &load_fixture("deck.md"),
            &DocumentTarget::new("deck", fixture_path("deck.md")),
        )
        .unwrap();

    assert!(parsed.notebook.is_some());
    assert_eq!(parsed.document.cell_metas().len(), 3);
    assert_eq!(parsed.document.code_cells().len(), 1);
    assert_eq!(parsed.document.title().as_deref(), Some("Text deck"));
    assert!(is_slide_deck(&parsed.document, "deck"));
}

#[test]
fn test_plain_markdown_has_no_carriers() {
    let parser = NotebookParser::new(ParserConfig::default());
    let parsed = parser
        .parse(
            "# Notes\n\nJust prose.\n",
            &DocumentTarget::new("notes", "notes.md"),
        )
        .unwrap();
    assert!(parsed.notebook.is_none());
    assert!(parsed.document.cell_metas().is_empty());
    assert!(!is_slide_deck(&parsed.document, "notes"));
}

#[test]
fn test_build_writes_pages_assets_and_sources() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::create_dir_all(src.path().join("talks")).unwrap();
    fs::copy(
        fixture_path("three_cells.ipynb"),
        src.path().join("talks/three_cells.ipynb"),
    )
    .unwrap();
    fs::copy(fixture_path("skipped_cells.ipynb"), src.path().join("skipped.ipynb")).unwrap();
    fs::write(src.path().join("broken.ipynb"), "{").unwrap();

    let report = Builder::new(BuildOptions::new(src.path(), out.path()))
        .run()
        .unwrap();

    assert_eq!(report.documents.len(), 2);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].docname, "broken");
    assert!(!report.is_success());

    let deck = report
        .documents
        .iter()
        .find(|doc| doc.docname == "talks/three_cells")
        .unwrap();
    assert!(deck.slide_deck);

    let html = fs::read_to_string(out.path().join("talks/three_cells.html")).unwrap();
    assert!(html.contains(SLIDE_CARRIER));
    assert!(html.contains("<script src=\"../_static/present.js\"></script>"));
    assert!(html.contains("startPresentation()"));
    assert!(html.contains("href=\"../_sources/talks/three_cells.ipynb\""));

    let plain = fs::read_to_string(out.path().join("skipped.html")).unwrap();
    assert!(!plain.contains("present.js"));

    assert!(out.path().join("_static/present.js").exists());
    assert!(out.path().join("_static/fix-theme.css").exists());
    assert!(out.path().join("_sources/talks/three_cells.ipynb").exists());
    assert!(out.path().join("_nb/talks/three_cells.ipynb").exists());
}

#[test]
fn test_build_to_text_skips_static_assets() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::copy(fixture_path("three_cells.ipynb"), src.path().join("deck.ipynb")).unwrap();

    let mut options = BuildOptions::new(src.path(), out.path());
    options.format = "text".to_string();
    options.copy_sources = false;
    let report = Builder::new(options).run().unwrap();

    assert!(report.is_success());
    assert!(report.static_files.is_empty());
    let text = fs::read_to_string(out.path().join("deck.txt")).unwrap();
    assert!(text.starts_with("Title\n=====\n"));
    assert!(!out.path().join("_sources").exists());
}

#[test]
fn test_build_collects_duplicate_reference_warnings() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::write(
        src.path().join("refs.md"),
        "[a]: /one\n[a]: /two\n\nSee [a].\n",
    )
    .unwrap();

    let report = Builder::new(BuildOptions::new(src.path(), out.path()))
        .run()
        .unwrap();
    let kinds: Vec<DiagnosticKind> = report.diagnostics().map(|d| d.kind).collect();
    assert_eq!(kinds, vec![DiagnosticKind::DuplicateReference]);
}

#[test]
fn test_build_reports_sources_sharing_a_docname() {
    let src = tempdir().unwrap();
    let out = tempdir().unwrap();
    fs::copy(fixture_path("three_cells.ipynb"), src.path().join("deck.ipynb")).unwrap();
    fs::write(src.path().join("deck.md"), "# From markdown\n").unwrap();

    let report = Builder::new(BuildOptions::new(src.path(), out.path()))
        .run()
        .unwrap();

    assert!(!report.is_success());
    assert_eq!(report.documents.len(), 1);
    assert!(report.documents[0].slide_deck);
    assert_eq!(report.failures.len(), 1);
    assert_eq!(report.failures[0].docname, "deck");
    assert!(report.failures[0].message.contains("deck.md"));

    let html = fs::read_to_string(out.path().join("deck.html")).unwrap();
    assert!(html.contains(SLIDE_CARRIER));
    assert!(!html.contains("From markdown"));
    assert!(out.path().join("_sources/deck.ipynb").exists());
    assert!(!out.path().join("_sources/deck.md").exists());
}
