//! Markdown parsing split into phases
//!
//! The converter needs to run the block phase once per cell and the inline phase once per
//! document, with a single reference environment in between. That split is why the parser
//! lives here instead of behind an off-the-shelf one-shot markdown library.
//!
//! - [`block`]: source text to block tokens, definitions into [`ReferenceEnv`]
//! - [`inline`]: fills the `children` of every `Inline` token
//! - [`footnotes`]: collects footnote definitions into a trailing footnote block

pub mod block;
pub mod env;
pub mod footnotes;
pub mod inline;
pub mod token;

pub use block::BlockParser;
pub use env::{DuplicateRef, LinkDefinition, ReferenceEnv};
pub use footnotes::collect_footnotes;
pub use inline::{parse_inline, run_inline_phase};
pub use token::{BlockKind, BlockToken, CodeCellToken, Inline, LineRange, Nesting, Token};

use serde::{Deserialize, Serialize};

/// Syntax extensions accepted by the parser.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParserConfig {
    /// `$inline$` and `$$block$$` math
    pub dollarmath: bool,
    /// `[^label]` references and `[^label]:` definitions
    pub footnotes: bool,
    /// Raw HTML blocks and inline tags
    pub html: bool,
}

impl Default for ParserConfig {
    fn default() -> Self {
        Self {
            dollarmath: true,
            footnotes: true,
            html: true,
        }
    }
}
