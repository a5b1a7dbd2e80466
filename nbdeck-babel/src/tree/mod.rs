//! Document tree
//!
//! The format-neutral tree every output format serializes. It is assembled from the token
//! stream by [`builder::TreeBuilder`].

pub mod builder;
pub mod cell_meta;
pub mod code_cell;
pub mod nodes;

pub use builder::{BuiltTree, TreeBuilder};
pub use cell_meta::{CellMetaNode, NodeVisit, RenderTarget, SLIDESHOW_KEY};
pub use code_cell::{CellRenderer, CellRendererRegistry, DefaultCellRenderer};
pub use nodes::*;
