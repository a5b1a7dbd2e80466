//! JSON notebooks (`.ipynb`, nbformat 4)

use super::{has_extension, NotebookConverter};
use crate::error::NotebookError;
use crate::markup::ParserConfig;
use crate::notebook::Notebook;
use std::path::Path;

pub struct IpynbConverter {
    config: ParserConfig,
}

impl IpynbConverter {
    pub fn new(config: ParserConfig) -> Self {
        Self { config }
    }
}

impl NotebookConverter for IpynbConverter {
    fn name(&self) -> &str {
        "ipynb"
    }

    fn accepts(&self, path: &Path, _lines: &[&str]) -> bool {
        has_extension(path, &["ipynb"])
    }

    fn convert(&self, source: &str) -> Result<Notebook, NotebookError> {
        Notebook::from_ipynb_str(source)
    }

    fn parser_config(&self) -> ParserConfig {
        self.config
    }
}
