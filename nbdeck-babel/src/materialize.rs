//! Output materialization
//!
//!     Notebook outputs that cannot be inlined in text (images, for the most part) are
//!     written next to the rendered pages. The layout under the output root is:
//!
//!         _nb/<docname>.ipynb                     the notebook as converted
//!         _nb/<docname>/output_<cell>_<n>.<ext>   decoded image outputs
//!
//!     The returned [`OutputHandle`] tells the tree builder which prefix to use for image
//!     sources. Without a prefix images are inlined as `data:` URIs.

use crate::error::MaterializeError;
use crate::notebook::{mime_text, Notebook};
use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use std::fs;
use std::path::{Path, PathBuf};

/// Directory, relative to the output root, holding notebooks and their outputs.
pub const NOTEBOOK_DIR: &str = "_nb";

/// Image mimetypes written to disk, best first.
pub const IMAGE_MIMETYPES: [&str; 4] = ["image/svg+xml", "image/png", "image/jpeg", "image/gif"];

/// Where a document's notebook and outputs ended up.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutputHandle {
    pub notebook_path: PathBuf,
    /// URL prefix (relative to the output root) for output files
    pub assets_prefix: Option<String>,
}

impl OutputHandle {
    pub fn asset_src(&self, cell: usize, output: usize, mime: &str) -> Option<String> {
        let prefix = self.assets_prefix.as_ref()?;
        let extension = image_extension(mime)?;
        Some(format!(
            "{prefix}/{}",
            output_file_name(cell, output, extension)
        ))
    }
}

pub trait OutputMaterializer: Send + Sync {
    fn materialize(
        &self,
        docname: &str,
        notebook: &Notebook,
    ) -> Result<OutputHandle, MaterializeError>;
}

/// Keeps everything in memory.
pub struct NullMaterializer;

impl OutputMaterializer for NullMaterializer {
    fn materialize(
        &self,
        docname: &str,
        _notebook: &Notebook,
    ) -> Result<OutputHandle, MaterializeError> {
        Ok(OutputHandle {
            notebook_path: PathBuf::from(format!("{docname}.ipynb")),
            assets_prefix: None,
        })
    }
}

/// Writes notebooks and decoded outputs below an output root.
pub struct DiskMaterializer {
    root: PathBuf,
}

impl DiskMaterializer {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }
}

impl OutputMaterializer for DiskMaterializer {
    fn materialize(
        &self,
        docname: &str,
        notebook: &Notebook,
    ) -> Result<OutputHandle, MaterializeError> {
        let notebook_path = self
            .root
            .join(NOTEBOOK_DIR)
            .join(format!("{docname}.ipynb"));
        let outputs_dir = self.root.join(NOTEBOOK_DIR).join(docname);

        write_file(&notebook_path, notebook.to_ipynb_string()?.as_bytes())?;

        let mut written = 0;
        for cell in &notebook.cells {
            for (n, output) in cell.outputs.iter().enumerate() {
                let Some(data) = output.data() else {
                    continue;
                };
                let Some((mime, value)) = IMAGE_MIMETYPES
                    .iter()
                    .find_map(|mime| data.get(*mime).map(|value| (*mime, value)))
                else {
                    continue;
                };
                let Some(extension) = image_extension(mime) else {
                    continue;
                };
                let bytes = decode_image(mime, value).map_err(|source| MaterializeError::Decode {
                    cell: cell.index,
                    output: n,
                    mime: mime.to_string(),
                    source,
                })?;
                let path = outputs_dir.join(output_file_name(cell.index, n, extension));
                write_file(&path, &bytes)?;
                written += 1;
            }
        }

        tracing::debug!(docname, outputs = written, "materialized notebook outputs");
        Ok(OutputHandle {
            notebook_path,
            assets_prefix: Some(format!("{NOTEBOOK_DIR}/{docname}")),
        })
    }
}

fn write_file(path: &Path, contents: &[u8]) -> Result<(), MaterializeError> {
    let io_error = |source| MaterializeError::Io {
        path: path.to_path_buf(),
        source,
    };
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(io_error)?;
    }
    fs::write(path, contents).map_err(io_error)
}

/// Raw bytes of an image output. SVG is stored as text, bitmaps as base64.
pub fn decode_image(mime: &str, value: &serde_json::Value) -> Result<Vec<u8>, base64::DecodeError> {
    let text = mime_text(value).unwrap_or_default();
    if mime == "image/svg+xml" {
        return Ok(text.into_bytes());
    }
    let compact: String = text.chars().filter(|c| !c.is_whitespace()).collect();
    STANDARD.decode(compact)
}

/// A `data:` URI for an image output, used when outputs are not written to disk.
pub fn data_uri(mime: &str, value: &serde_json::Value) -> String {
    let text = mime_text(value).unwrap_or_default();
    let payload = if mime == "image/svg+xml" {
        STANDARD.encode(text.as_bytes())
    } else {
        text.chars().filter(|c| !c.is_whitespace()).collect()
    };
    format!("data:{mime};base64,{payload}")
}

pub fn output_file_name(cell: usize, output: usize, extension: &str) -> String {
    format!("output_{cell}_{output}.{extension}")
}

pub fn image_extension(mime: &str) -> Option<&'static str> {
    match mime {
        "image/png" => Some("png"),
        "image/jpeg" => Some("jpg"),
        "image/svg+xml" => Some("svg"),
        "image/gif" => Some("gif"),
        _ => None,
    }
}
