//! Shared configuration loader for the nbdeck toolchain.
//!
//! `defaults/nbdeck.default.toml` is embedded into every binary so that docs and
//! runtime behavior stay in sync. Applications layer user-specific files on top
//! of those defaults via [`Loader`] before deserializing into [`NbdeckConfig`].

use config::builder::DefaultState;
use config::{Config, ConfigBuilder, ConfigError, File, FileFormat, ValueKind};
use nbdeck_babel::build::BuildOptions;
use nbdeck_babel::execution::{ExecutionMode, ExecutionSettings};
use nbdeck_babel::markup::ParserConfig;
use serde::Deserialize;
use std::path::{Path, PathBuf};

const DEFAULT_TOML: &str = include_str!("../defaults/nbdeck.default.toml");

/// File picked up from the working directory when present.
pub const PROJECT_CONFIG_FILE: &str = "nbdeck.toml";

/// Top-level configuration consumed by nbdeck applications.
#[derive(Debug, Clone, Deserialize)]
pub struct NbdeckConfig {
    pub execution: ExecutionConfig,
    pub render: RenderConfig,
    pub parser: ParserSection,
    pub output: OutputConfig,
    pub presentation: PresentationConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ExecutionConfig {
    pub mode: ExecutionMode,
    pub show_traceback: bool,
    pub cache_path: PathBuf,
}

impl From<&ExecutionConfig> for ExecutionSettings {
    fn from(config: &ExecutionConfig) -> Self {
        ExecutionSettings {
            mode: config.mode,
            show_traceback: config.show_traceback,
            cache_path: config.cache_path.clone(),
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct RenderConfig {
    /// Code cell renderer name
    pub plugin: String,
}

/// Mirrors the syntax switches of the markup parser.
#[derive(Debug, Clone, Deserialize)]
pub struct ParserSection {
    pub dollarmath: bool,
    pub footnotes: bool,
    pub html: bool,
}

impl From<&ParserSection> for ParserConfig {
    fn from(config: &ParserSection) -> Self {
        ParserConfig {
            dollarmath: config.dollarmath,
            footnotes: config.footnotes,
            html: config.html,
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct OutputConfig {
    pub dir: PathBuf,
    pub format: String,
    pub copy_sources: bool,
}

#[derive(Debug, Clone, Deserialize)]
pub struct PresentationConfig {
    pub enabled: bool,
}

impl NbdeckConfig {
    /// Execution cache directory. Relative paths are taken from `source_dir`.
    pub fn cache_dir(&self, source_dir: &Path) -> PathBuf {
        if self.execution.cache_path.is_absolute() {
            self.execution.cache_path.clone()
        } else {
            source_dir.join(&self.execution.cache_path)
        }
    }

    /// Build options for `source_dir`, writing to `out_dir` or the configured directory.
    pub fn build_options(&self, source_dir: &Path, out_dir: Option<&Path>) -> BuildOptions {
        let out_dir = match out_dir {
            Some(dir) => dir.to_path_buf(),
            None => source_dir.join(&self.output.dir),
        };
        let mut options = BuildOptions::new(source_dir, out_dir);
        options.format = self.output.format.clone();
        options.parser = (&self.parser).into();
        options.execution = (&self.execution).into();
        options.execution.cache_path = self.cache_dir(source_dir);
        options.renderer = self.render.plugin.clone();
        options.presentation = self.presentation.enabled;
        options.copy_sources = self.output.copy_sources;
        options
    }
}

/// Helper for layering user overrides over the built-in defaults.
#[derive(Debug, Clone)]
pub struct Loader {
    builder: ConfigBuilder<DefaultState>,
}

impl Loader {
    /// Start a loader seeded with the embedded defaults.
    pub fn new() -> Self {
        let builder = Config::builder().add_source(File::from_str(DEFAULT_TOML, FileFormat::Toml));
        Self { builder }
    }

    /// Layer a configuration file. Missing files trigger an error.
    pub fn with_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(true);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Layer an optional configuration file (ignored if the file is absent).
    pub fn with_optional_file(mut self, path: impl AsRef<Path>) -> Self {
        let source = File::from(path.as_ref())
            .format(FileFormat::Toml)
            .required(false);
        self.builder = self.builder.add_source(source);
        self
    }

    /// Apply a single key/value override (useful for CLI settings).
    pub fn set_override<I>(mut self, key: &str, value: I) -> Result<Self, ConfigError>
    where
        I: Into<ValueKind>,
    {
        self.builder = self.builder.set_override(key, value)?;
        Ok(self)
    }

    /// Finalize the builder and deserialize the resulting configuration.
    pub fn build(self) -> Result<NbdeckConfig, ConfigError> {
        self.builder.build()?.try_deserialize()
    }
}

impl Default for Loader {
    fn default() -> Self {
        Self::new()
    }
}

/// Convenience helper for callers that only need the defaults.
pub fn load_defaults() -> Result<NbdeckConfig, ConfigError> {
    Loader::new().build()
}
