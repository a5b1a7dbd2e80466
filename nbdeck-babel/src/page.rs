//! Page context and page hooks
//!
//!     Every rendered page gets a [`PageContext`]: the header buttons and the stylesheet and
//!     script registrations the page template draws. Hooks run once per page, after the
//!     document tree is final and before the page is serialized, in ascending priority
//!     order. Hooks with the same priority keep their registration order.
//!
//!     Hooks only read the tree and only add to the context, so pages can be processed in
//!     parallel.

use crate::tree::Document;
use serde::Serialize;

/// Directory, relative to the output root, that holds static files.
pub const STATIC_DIR: &str = "_static";

/// Priority of [`DownloadSourceHook`].
pub const DOWNLOAD_SOURCE_PRIORITY: i32 = 500;

/// An action shown in the page header.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct HeaderButton {
    /// `javascript` or `link`
    #[serde(rename = "type")]
    pub kind: String,
    /// Script to run, or URL to open
    pub action: String,
    pub tooltip: String,
    pub icon: String,
}

/// A static file registered for inclusion in the page head.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", content = "path", rename_all = "lowercase")]
pub enum Asset {
    Css(String),
    Js(String),
}

impl Asset {
    /// Path relative to the static directory.
    pub fn path(&self) -> &str {
        match self {
            Asset::Css(path) | Asset::Js(path) => path,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PageContext {
    pub pagename: String,
    pub title: String,
    pub header_buttons: Vec<HeaderButton>,
    /// Registration order; later assets override earlier ones
    pub assets: Vec<Asset>,
    /// Relative path from the page back to the output root
    pub root_prefix: String,
    /// URL of the page source offered for download, relative to the output root
    pub source_download: Option<String>,
}

impl PageContext {
    pub fn new(pagename: impl Into<String>, title: impl Into<String>) -> Self {
        let pagename = pagename.into();
        let root_prefix = "../".repeat(pagename.matches('/').count());
        Self {
            pagename,
            title: title.into(),
            header_buttons: Vec::new(),
            assets: Vec::new(),
            root_prefix,
            source_download: None,
        }
    }

    pub fn with_source_download(mut self, url: impl Into<String>) -> Self {
        self.source_download = Some(url.into());
        self
    }

    pub fn add_css_file(&mut self, path: impl Into<String>) {
        self.assets.push(Asset::Css(path.into()));
    }

    pub fn add_js_file(&mut self, path: impl Into<String>) {
        self.assets.push(Asset::Js(path.into()));
    }

    pub fn stylesheets(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().filter_map(|asset| match asset {
            Asset::Css(path) => Some(path.as_str()),
            Asset::Js(_) => None,
        })
    }

    pub fn scripts(&self) -> impl Iterator<Item = &str> {
        self.assets.iter().filter_map(|asset| match asset {
            Asset::Js(path) => Some(path.as_str()),
            Asset::Css(_) => None,
        })
    }

    /// URL of a static file as seen from this page.
    pub fn static_url(&self, path: &str) -> String {
        format!("{}{STATIC_DIR}/{path}", self.root_prefix)
    }
}

pub trait PageHook: Send + Sync {
    fn name(&self) -> &str;

    /// Lower runs first.
    fn priority(&self) -> i32;

    fn on_page(&self, context: &mut PageContext, document: &Document);
}

/// Hooks in run order.
#[derive(Default)]
pub struct PageHooks {
    hooks: Vec<Box<dyn PageHook>>,
}

impl PageHooks {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register<H: PageHook + 'static>(&mut self, hook: H) {
        self.hooks.push(Box::new(hook));
        self.hooks.sort_by_key(|hook| hook.priority());
    }

    pub fn names(&self) -> Vec<&str> {
        self.hooks.iter().map(|hook| hook.name()).collect()
    }

    pub fn run(&self, context: &mut PageContext, document: &Document) {
        for hook in &self.hooks {
            hook.on_page(context, document);
        }
    }
}

/// Adds a header link to the page source when one is available.
pub struct DownloadSourceHook;

impl PageHook for DownloadSourceHook {
    fn name(&self) -> &str {
        "download-source"
    }

    fn priority(&self) -> i32 {
        DOWNLOAD_SOURCE_PRIORITY
    }

    fn on_page(&self, context: &mut PageContext, _document: &Document) {
        let Some(url) = context.source_download.clone() else {
            return;
        };
        context.header_buttons.push(HeaderButton {
            kind: "link".to_string(),
            action: format!("{}{url}", context.root_prefix),
            tooltip: "Download source file".to_string(),
            icon: "fas fa-file-download".to_string(),
        });
    }
}
