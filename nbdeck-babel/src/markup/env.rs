//! Reference environment shared by the block and inline phases
//!
//! One environment is created per document conversion. The block phase of every cell
//! writes link and footnote definitions into it; the single inline phase that follows
//! reads them, so a reference may be used in a cell that comes before its definition.
//! It is owned by the conversion call and never shared between documents.

use super::token::LineRange;
use serde::Serialize;
use std::collections::BTreeMap;

/// A link reference definition (`[label]: href "title"`).
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LinkDefinition {
    pub href: String,
    pub title: Option<String>,
}

/// A repeated link reference definition. The first definition wins.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct DuplicateRef {
    pub label: String,
    pub href: String,
    /// Lines of the ignored definition, cell-local until `fixed`
    pub map: Option<LineRange>,
    /// Set once `map` has been moved into document coordinates
    pub fixed: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ReferenceEnv {
    /// Link definitions keyed by normalized label
    pub references: BTreeMap<String, LinkDefinition>,
    /// Labels of every footnote definition seen by the block phase
    pub footnote_labels: BTreeMap<String, Option<LineRange>>,
    /// Footnote labels in the order of their first reference; the index is the footnote id
    pub footnote_order: Vec<String>,
    pub duplicate_refs: Vec<DuplicateRef>,
}

impl ReferenceEnv {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a link definition. Returns false when the label was already defined.
    pub fn define_reference(
        &mut self,
        label: &str,
        definition: LinkDefinition,
        map: LineRange,
    ) -> bool {
        let key = normalize_label(label);
        if key.is_empty() {
            return false;
        }
        if self.references.contains_key(&key) {
            self.duplicate_refs.push(DuplicateRef {
                label: label.to_string(),
                href: definition.href,
                map: Some(map),
                fixed: false,
            });
            return false;
        }
        self.references.insert(key, definition);
        true
    }

    pub fn lookup_reference(&self, label: &str) -> Option<&LinkDefinition> {
        self.references.get(&normalize_label(label))
    }

    pub fn define_footnote(&mut self, label: &str, map: Option<LineRange>) {
        self.footnote_labels
            .entry(normalize_label(label))
            .or_insert(map);
    }

    pub fn has_footnote(&self, label: &str) -> bool {
        self.footnote_labels.contains_key(&normalize_label(label))
    }

    /// Id of a footnote, allocating the next one on first reference.
    pub fn footnote_id(&mut self, label: &str) -> usize {
        let key = normalize_label(label);
        match self.footnote_order.iter().position(|l| *l == key) {
            Some(id) => id,
            None => {
                self.footnote_order.push(key);
                self.footnote_order.len() - 1
            }
        }
    }

    /// Move not yet fixed duplicate diagnostics by `offset` lines and mark them fixed.
    pub fn fix_duplicate_maps(&mut self, offset: usize) {
        for dup in self.duplicate_refs.iter_mut().filter(|d| !d.fixed) {
            if let Some([start, end]) = dup.map {
                dup.map = Some([start + offset, end + offset]);
            }
            dup.fixed = true;
        }
    }
}

/// Labels match case-insensitively with runs of whitespace collapsed.
pub fn normalize_label(label: &str) -> String {
    label
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn def(href: &str) -> LinkDefinition {
        LinkDefinition {
            href: href.to_string(),
            title: None,
        }
    }

    #[test]
    fn labels_normalize() {
        assert_eq!(normalize_label("  Foo   Bar "), "foo bar");
    }

    #[test]
    fn first_definition_wins() {
        let mut env = ReferenceEnv::new();
        assert!(env.define_reference("Foo", def("a"), [0, 1]));
        assert!(!env.define_reference("foo", def("b"), [3, 4]));
        assert_eq!(env.lookup_reference("FOO").unwrap().href, "a");
        assert_eq!(env.duplicate_refs.len(), 1);
        assert_eq!(env.duplicate_refs[0].href, "b");
    }

    #[test]
    fn duplicate_maps_shift_once() {
        let mut env = ReferenceEnv::new();
        env.define_reference("x", def("a"), [0, 1]);
        env.define_reference("x", def("b"), [2, 3]);
        env.fix_duplicate_maps(100);
        env.define_reference("x", def("c"), [5, 6]);
        env.fix_duplicate_maps(200);

        assert_eq!(env.duplicate_refs[0].map, Some([102, 103]));
        assert_eq!(env.duplicate_refs[1].map, Some([205, 206]));
        assert!(env.duplicate_refs.iter().all(|d| d.fixed));
    }

    #[test]
    fn footnote_ids_follow_first_reference() {
        let mut env = ReferenceEnv::new();
        env.define_footnote("b", None);
        env.define_footnote("a", None);
        assert_eq!(env.footnote_id("a"), 0);
        assert_eq!(env.footnote_id("b"), 1);
        assert_eq!(env.footnote_id("a"), 0);
    }
}
