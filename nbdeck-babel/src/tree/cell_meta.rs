//! Cell metadata carrier
//!
//!     An inert node holding one cell's metadata as a JSON string. It is placed right before
//!     the nodes of the cell it belongs to, so a presentation front end can group the page
//!     content into slides by reading the payloads in order.
//!
//!     HTML output embeds the payload in a JSON script element. Every other target drops the
//!     node: slide metadata means nothing outside the interactive viewer. In both cases the
//!     node's default rendering is replaced.
//!
//!     The payload is not validated when the node is created. Consumers parse it on demand
//!     and must cope with malformed JSON.

use serde::Serialize;
use serde_json::{Map, Value};

/// Key whose presence marks a cell as part of a slide deck.
pub const SLIDESHOW_KEY: &str = "slideshow";

/// Output family a format renders to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderTarget {
    Html,
    Latex,
    Text,
    Man,
}

/// Outcome of visiting a node that overrides default rendering.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NodeVisit {
    /// Emit this raw markup and skip the default rendering
    Raw(String),
    /// Emit nothing and skip the default rendering
    Skip,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CellMetaNode {
    pub metadata: String,
}

impl CellMetaNode {
    pub fn new(metadata: impl Into<String>) -> Self {
        Self {
            metadata: metadata.into(),
        }
    }

    /// The embedded data block, byte for byte.
    pub fn html(&self) -> String {
        format!(
            "<script type=\"application/json\" data-cell-meta=\"\">{}</script>",
            self.metadata
        )
    }

    pub fn visit(&self, target: RenderTarget) -> NodeVisit {
        match target {
            RenderTarget::Html => NodeVisit::Raw(self.html()),
            RenderTarget::Latex | RenderTarget::Text | RenderTarget::Man => NodeVisit::Skip,
        }
    }

    /// Parse the payload. Non-object JSON is an empty mapping.
    pub fn parse(&self) -> Result<Map<String, Value>, serde_json::Error> {
        match serde_json::from_str::<Value>(&self.metadata)? {
            Value::Object(map) => Ok(map),
            _ => Ok(Map::new()),
        }
    }

    pub fn has_slideshow(&self) -> Result<bool, serde_json::Error> {
        Ok(self.parse()?.contains_key(SLIDESHOW_KEY))
    }
}
