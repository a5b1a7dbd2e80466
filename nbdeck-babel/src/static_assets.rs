//! Static files shipped with the library
//!
//! The presentation front end (`present.js`) and its theme fix are embedded in the binary
//! and copied into `<out>/_static/` when a build starts. The reveal.js files it depends on
//! are not bundled: they are expected under `_static/vendor/`.

use crate::error::BuildError;
use crate::page::STATIC_DIR;
use std::fs;
use std::path::{Path, PathBuf};

pub const PRESENT_JS: &str = include_str!("../static/present.js");
pub const FIX_THEME_CSS: &str = include_str!("../static/fix-theme.css");

/// Embedded files as (name, contents).
pub const STATIC_FILES: [(&str, &str); 2] = [
    ("present.js", PRESENT_JS),
    ("fix-theme.css", FIX_THEME_CSS),
];

/// Write the embedded files into the static directory under `out_dir`.
pub fn install(out_dir: &Path) -> Result<Vec<PathBuf>, BuildError> {
    let static_dir = out_dir.join(STATIC_DIR);
    fs::create_dir_all(&static_dir).map_err(|source| BuildError::Write {
        path: static_dir.clone(),
        source,
    })?;

    let mut written = Vec::with_capacity(STATIC_FILES.len());
    for (name, contents) in STATIC_FILES {
        let path = static_dir.join(name);
        fs::write(&path, contents).map_err(|source| BuildError::Write {
            path: path.clone(),
            source,
        })?;
        written.push(path);
    }
    Ok(written)
}
