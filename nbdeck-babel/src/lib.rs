//! Notebook to slide-deck conversion
//!
//!     This crate turns Jupyter notebooks (and text notebooks written as markdown) into a
//!     markup token stream, builds a document tree from it and serializes that tree to a
//!     handful of output formats, HTML first. Every cell's metadata travels through the
//!     pipeline as a `cell_meta` carrier so that HTML pages keep it next to the cell it
//!     belongs to; the presentation script reads it back in the browser.
//!
//!     This is a pure lib, that is, it powers nbdeck-cli but is shell agnostic: no code
//!     should be written that supposes a shell environment, be it std printing, env vars
//!     etc. Diagnostics are returned to the caller and logged through `tracing`.
//!
//! Architecture
//!
//!     The pipeline runs in stages, each owning one concern:
//!
//!         source text
//!           └─ converters          (text → Notebook; ipynb or text notebook)
//!               └─ execution       (optional cached outputs)
//!                   └─ convert     (Notebook → tokens; two passes, shared reference env)
//!                       └─ tree    (tokens → Document; directives, code cell renderers)
//!                           └─ formats (Document + PageContext → output text)
//!
//!     The adapter (./adapter.rs) drives the stages for one document. Builds
//!     (./build.rs) discover sources below a directory and run the adapter for each
//!     document in parallel.
//!
//!     The file structure :
//!     .
//!     ├── error.rs                # Error and diagnostic types
//!     ├── notebook.rs             # Notebook model (nbformat 4)
//!     ├── converters              # Source text → Notebook
//!     ├── markup                  # Block and inline phases, reference env
//!     ├── convert.rs              # Notebook → token stream
//!     ├── directive.rs            # Fenced directives (cell_meta)
//!     ├── tree                    # Document tree and builder
//!     ├── format.rs               # Format trait definition
//!     ├── registry.rs             # FormatRegistry for discovery and selection
//!     ├── formats                 # html, latex, man, text
//!     ├── page.rs                 # Page context and page hooks
//!     ├── presentation.rs         # Presentation trigger
//!     ├── static_assets.rs        # Bundled presentation assets
//!     ├── execution.rs            # Execution cache
//!     ├── materialize.rs          # Output materialization
//!     ├── glue.rs                 # Cross-document glue registry
//!     ├── adapter.rs              # Notebook parser adapter
//!     ├── publish.rs              # Single document publishing
//!     └── build.rs                # Directory builds
//!
//! Testing
//!     tests
//!     ├── lib.rs
//!     ├── common
//!     ├── <area>/<topic>.rs
//!     └── fixtures
//!
//!     Note that rust does not by default discover tests in subdirectories, so these are
//!     included from tests/lib.rs.
//!
//! Line numbers
//!
//!     Every cell is parsed on its own, but all cells share one reference environment
//!     (link definitions and footnotes). Tokens carry line ranges; for notebooks without a
//!     source map each cell gets a pseudo start line `index * PSEUDO_LINE_STRIDE` so that
//!     cells never share line numbers. Text notebooks carry real start lines.

pub mod adapter;
pub mod build;
pub mod convert;
pub mod converters;
pub mod directive;
pub mod error;
pub mod execution;
pub mod format;
pub mod formats;
pub mod glue;
pub mod markup;
pub mod materialize;
pub mod notebook;
pub mod page;
pub mod presentation;
pub mod publish;
pub mod registry;
pub mod static_assets;
pub mod tree;

pub use adapter::{DocumentTarget, NotebookParser, ParsedDocument};
pub use build::{BuildOptions, BuildReport, Builder};
pub use convert::{markup_to_tokens, notebook_to_tokens, Conversion};
pub use error::{ConversionFailure, Diagnostic, DiagnosticKind, FormatError, NotebookError};
pub use format::Format;
pub use markup::ParserConfig;
pub use notebook::{Cell, CellKind, Notebook, Output};
pub use page::PageContext;
pub use registry::FormatRegistry;
pub use tree::{Document, RenderTarget};
