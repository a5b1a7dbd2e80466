//! Presentation mode
//!
//!     A page is a slide deck when any metadata carrier in its tree has a `slideshow` key.
//!     Slide deck pages get a "Start presenting" header button plus the stylesheets and
//!     scripts of the presentation front end. Nothing else about the page changes; the
//!     front end reads the carriers in the rendered HTML to split the content into slides.
//!
//!     The trigger runs before the download-source hook so header buttons always come out
//!     in the same order.

use crate::page::{HeaderButton, PageContext, PageHook, DOWNLOAD_SOURCE_PRIORITY};
use crate::tree::Document;

pub const PRESENTATION_PRIORITY: i32 = DOWNLOAD_SOURCE_PRIORITY - 100;

/// Library stylesheets, then the theme override that must come after them.
pub const PRESENTATION_STYLESHEETS: [&str; 3] =
    ["vendor/reveal.css", "vendor/simple.css", "fix-theme.css"];

/// Library script, then the script that wires it to the page.
pub const PRESENTATION_SCRIPTS: [&str; 2] = ["vendor/reveal.js", "present.js"];

pub fn start_presenting_button() -> HeaderButton {
    HeaderButton {
        kind: "javascript".to_string(),
        action: "startPresentation()".to_string(),
        tooltip: "Start presenting".to_string(),
        icon: "fas fa-chart-bar".to_string(),
    }
}

/// Whether any carrier in the document declares slideshow metadata.
///
/// Carriers whose payload is not valid JSON are logged and ignored.
pub fn is_slide_deck(document: &Document, pagename: &str) -> bool {
    document
        .cell_metas()
        .into_iter()
        .any(|meta| match meta.has_slideshow() {
            Ok(found) => found,
            Err(err) => {
                tracing::warn!(
                    page = pagename,
                    payload = %meta.metadata,
                    error = %err,
                    "skipping malformed cell metadata"
                );
                false
            }
        })
}

pub struct PresentationTrigger;

impl PageHook for PresentationTrigger {
    fn name(&self) -> &str {
        "presentation"
    }

    fn priority(&self) -> i32 {
        PRESENTATION_PRIORITY
    }

    fn on_page(&self, context: &mut PageContext, document: &Document) {
        if !is_slide_deck(document, &context.pagename) {
            return;
        }
        tracing::debug!(page = %context.pagename, "enabling presentation mode");

        context.header_buttons.push(start_presenting_button());
        for stylesheet in PRESENTATION_STYLESHEETS {
            context.add_css_file(stylesheet);
        }
        for script in PRESENTATION_SCRIPTS {
            context.add_js_file(script);
        }
    }
}
