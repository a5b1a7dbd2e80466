//! Property tests for the carrier stream and pseudo line numbers.

use crate::common::carriers;
use nbdeck_babel::convert::{notebook_to_tokens, DEFAULT_RENDERER};
use nbdeck_babel::markup::{ParserConfig, Token};
use nbdeck_babel::notebook::{Cell, CellKind, Notebook};
use nbdeck_babel::tree::CellMetaNode;
use proptest::prelude::*;
use serde_json::{json, Map, Value};

const SOURCES: [&str; 8] = [
    "",
    "   \n  ",
    "# Heading",
    "Some *prose* with `code`.",
    "- one\n- two\n\n  continued",
    "> quoted\n> text",
    "x = 1\nprint(x)",
    "```python\nfenced\n```\n\nafter",
];

fn arb_cell() -> impl Strategy<Value = Cell> {
    (0usize..3, 0usize..SOURCES.len(), 0usize..3, any::<bool>()).prop_map(
        |(kind, source, tag, slide)| {
            let kind = match kind {
                0 => CellKind::Markdown,
                1 => CellKind::Code,
                _ => CellKind::Raw,
            };
            let mut metadata = Map::new();
            match tag {
                1 => {
                    metadata.insert("tags".to_string(), json!(["remove-cell"]));
                }
                2 => {
                    metadata.insert("tags".to_string(), json!(["remove_cell"]));
                }
                _ => {}
            }
            if slide {
                metadata.insert("slideshow".to_string(), json!({"slide_type": "slide"}));
            }
            Cell::new(kind, SOURCES[source]).with_metadata(Value::Object(metadata))
        },
    )
}

fn arb_metadata() -> impl Strategy<Value = Map<String, Value>> {
    let leaf = prop_oneof![
        Just(Value::Null),
        any::<bool>().prop_map(Value::from),
        any::<i64>().prop_map(Value::from),
        "[a-z \"\\\\<>/]{0,12}".prop_map(Value::from),
    ];
    let value = leaf.prop_recursive(3, 24, 4, |inner| {
        prop_oneof![
            prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
            prop::collection::btree_map("[a-z_]{1,6}", inner, 0..4)
                .prop_map(|map| Value::Object(map.into_iter().collect())),
        ]
    });
    prop::collection::btree_map("[a-z_]{1,8}", value, 0..5)
        .prop_map(|map| map.into_iter().collect())
}

proptest! {
    #[test]
    fn carrier_count_matches_kept_cells(cells in prop::collection::vec(arb_cell(), 0..12)) {
        let expected: Vec<String> = cells
            .iter()
            .filter(|cell| !cell.is_empty() && !cell.is_removed())
            .map(Cell::metadata_json)
            .collect();
        let notebook = Notebook::new(cells, Map::new());
        let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), DEFAULT_RENDERER);

        let found: Vec<&str> = carriers(&conversion.tokens);
        prop_assert_eq!(found, expected.iter().map(String::as_str).collect::<Vec<_>>());
    }

    #[test]
    fn cell_line_ranges_never_overlap(cells in prop::collection::vec(arb_cell(), 1..12)) {
        let notebook = Notebook::new(cells, Map::new());
        let conversion = notebook_to_tokens(&notebook, &ParserConfig::default(), DEFAULT_RENDERER);

        // Ranges grouped by the carrier that opened them.
        let mut groups: Vec<(usize, usize)> = Vec::new();
        for token in &conversion.tokens {
            match token {
                Token::FrontMatter { .. } | Token::WidgetState { .. } => {}
                Token::CellMeta { map, .. } => groups.push((map[0], map[1])),
                other => {
                    if let (Some(group), Some([start, end])) = (groups.last_mut(), other.map()) {
                        prop_assert!(start >= group.0);
                        group.1 = group.1.max(end);
                    }
                }
            }
        }
        for pair in groups.windows(2) {
            prop_assert!(pair[0].1 < pair[1].0, "{:?} overlaps {:?}", pair[0], pair[1]);
        }
    }

    #[test]
    fn carrier_payload_round_trips(metadata in arb_metadata()) {
        let cell = Cell::markdown("text").with_metadata(Value::Object(metadata.clone()));
        let node = CellMetaNode::new(cell.metadata_json());
        prop_assert_eq!(node.parse().unwrap(), metadata);
    }
}
