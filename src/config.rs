//! Compiler configuration.
//!
//! Search roots are passed in explicitly; library code never consults the
//! process environment.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use crate::error::{Error, Result};

pub const DEFAULT_OUTPUT_EXTENSION: &str = ".pb.go";
pub const DEFAULT_RUNTIME_IMPORT: &str = "github.com/vedadiyan/protolizer";

/// How generated files reach the output directory.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WriteMode {
    /// Each file is written as soon as it is rendered. A failure leaves
    /// earlier files on disk.
    #[default]
    WriteThrough,
    /// Everything is rendered in memory first and written only when all
    /// renders succeed.
    Staged,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CompilerConfig {
    /// Toolchain root. `<install_root>/include` is the fallback import path.
    pub install_root: PathBuf,
    /// Root for relative `@generate` template paths. Defaults to
    /// `<install_root>/templates`.
    pub template_root: Option<PathBuf>,
    pub output_extension: String,
    pub runtime_import: String,
    pub write_mode: WriteMode,
}

impl Default for CompilerConfig {
    fn default() -> Self {
        CompilerConfig {
            install_root: PathBuf::new(),
            template_root: None,
            output_extension: DEFAULT_OUTPUT_EXTENSION.to_string(),
            runtime_import: DEFAULT_RUNTIME_IMPORT.to_string(),
            write_mode: WriteMode::default(),
        }
    }
}

impl CompilerConfig {
    pub fn new(install_root: impl Into<PathBuf>) -> Self {
        CompilerConfig { install_root: install_root.into(), ..Default::default() }
    }

    pub fn with_write_mode(mut self, mode: WriteMode) -> Self {
        self.write_mode = mode;
        self
    }

    pub fn with_template_root(mut self, root: impl Into<PathBuf>) -> Self {
        self.template_root = Some(root.into());
        self
    }

    pub fn from_toml_str(source: &str) -> Result<Self> {
        Ok(toml::from_str(source)?)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let source = std::fs::read_to_string(path)
            .map_err(|source| Error::ConfigRead { path: path.to_path_buf(), source })?;
        Self::from_toml_str(&source)
    }

    pub fn include_dir(&self) -> PathBuf {
        self.install_root.join("include")
    }

    pub fn templates_dir(&self) -> Option<PathBuf> {
        match &self.template_root {
            Some(root) => Some(root.clone()),
            None if self.install_root.as_os_str().is_empty() => None,
            None => Some(self.install_root.join("templates")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_apply_to_missing_keys() {
        let config = CompilerConfig::from_toml_str(r#"install_root = "/opt/protov""#).unwrap();
        assert_eq!(config.include_dir(), PathBuf::from("/opt/protov/include"));
        assert_eq!(config.templates_dir(), Some(PathBuf::from("/opt/protov/templates")));
        assert_eq!(config.output_extension, ".pb.go");
        assert_eq!(config.write_mode, WriteMode::WriteThrough);
    }

    #[test]
    fn parses_write_mode_and_template_root() {
        let config = CompilerConfig::from_toml_str(
            r#"
            install_root = "/opt/protov"
            template_root = "/srv/templates"
            write_mode = "staged"
            "#,
        )
        .unwrap();
        assert_eq!(config.write_mode, WriteMode::Staged);
        assert_eq!(config.templates_dir(), Some(PathBuf::from("/srv/templates")));
    }

    #[test]
    fn rejects_unknown_keys() {
        assert!(CompilerConfig::from_toml_str("include = 1").is_err());
    }

    #[test]
    fn no_template_root_without_install_root() {
        assert_eq!(CompilerConfig::default().templates_dir(), None);
    }
}
