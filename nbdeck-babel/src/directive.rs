//! Block directives
//!
//!     A fenced block whose info string is `{name} arguments` runs the directive registered
//!     under `name`. Directives receive the raw content lines and return finished tree nodes.
//!     The tree builder also routes every `CellMeta` token through the `cell_meta` directive.

use crate::tree::{CellMetaNode, DocNode};
use std::collections::HashMap;

/// Name under which [`CellMetaDirective`] is registered.
pub const CELL_META_DIRECTIVE: &str = "cell_meta";

pub trait Directive: Send + Sync {
    fn name(&self) -> &str;

    fn run(&self, arguments: &str, content: &[&str]) -> Vec<DocNode>;
}

/// Wraps its content, concatenated without separators, into one metadata carrier.
///
/// The content is not checked for being JSON.
pub struct CellMetaDirective;

impl Directive for CellMetaDirective {
    fn name(&self) -> &str {
        CELL_META_DIRECTIVE
    }

    fn run(&self, _arguments: &str, content: &[&str]) -> Vec<DocNode> {
        vec![DocNode::CellMeta(CellMetaNode::new(content.concat()))]
    }
}

pub struct DirectiveRegistry {
    directives: HashMap<String, Box<dyn Directive>>,
}

impl DirectiveRegistry {
    pub fn new() -> Self {
        Self {
            directives: HashMap::new(),
        }
    }

    pub fn register<D: Directive + 'static>(&mut self, directive: D) {
        self.directives
            .insert(directive.name().to_string(), Box::new(directive));
    }

    pub fn get(&self, name: &str) -> Option<&dyn Directive> {
        self.directives.get(name).map(|d| d.as_ref())
    }

    pub fn has(&self, name: &str) -> bool {
        self.directives.contains_key(name)
    }

    pub fn with_defaults() -> Self {
        let mut registry = Self::new();
        registry.register(CellMetaDirective);
        registry
    }
}

impl Default for DirectiveRegistry {
    fn default() -> Self {
        Self::with_defaults()
    }
}

/// Split a fence info string of the form `{name} arguments`.
pub fn directive_name(info: &str) -> Option<(&str, &str)> {
    let rest = info.trim().strip_prefix('{')?;
    let (name, arguments) = rest.split_once('}')?;
    let name = name.trim();
    if name.is_empty() {
        return None;
    }
    Some((name, arguments.trim()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cell_meta_joins_lines_without_separator() {
        let nodes = CellMetaDirective.run("", &["{\"a\":", " 1}"]);
        assert_eq!(
            nodes,
            vec![DocNode::CellMeta(CellMetaNode::new("{\"a\": 1}"))]
        );
    }

    #[test]
    fn cell_meta_does_not_validate() {
        let nodes = CellMetaDirective.run("", &["not json"]);
        assert_eq!(nodes, vec![DocNode::CellMeta(CellMetaNode::new("not json"))]);
    }

    #[test]
    fn defaults_include_cell_meta() {
        let registry = DirectiveRegistry::with_defaults();
        assert!(registry.has("cell_meta"));
        assert!(registry.get("admonition").is_none());
    }

    #[test]
    fn info_string_parsing() {
        assert_eq!(directive_name("{cell_meta}"), Some(("cell_meta", "")));
        assert_eq!(directive_name(" {note} Title here"), Some(("note", "Title here")));
        assert_eq!(directive_name("python"), None);
        assert_eq!(directive_name("{}"), None);
    }
}
