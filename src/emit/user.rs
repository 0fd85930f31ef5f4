//! User templates named by `@generate` directives.
//!
//! Templates are minijinja sources rendered against the whole [`Ast`], so
//! `{{ Files[0].Services[0].Name }}` and friends are available.

use std::path::{Path, PathBuf};

use minijinja::Environment;

use crate::error::TemplateError;
use crate::ir::Ast;

/// Absolute template paths are used as-is; relative ones live under the
/// template root.
pub fn resolve_template(template: &str, root: Option<&Path>) -> Result<PathBuf, TemplateError> {
    let path = Path::new(template);
    if path.is_absolute() {
        return Ok(path.to_path_buf());
    }
    match root {
        Some(root) => Ok(root.join(path)),
        None => Err(TemplateError::NoTemplateRoot { path: path.to_path_buf() }),
    }
}

/// Output file name for a template: its file name without the extension,
/// so `client.go.tmpl` produces `client.go`.
pub fn output_name(template: &str) -> String {
    let name = Path::new(template)
        .file_name()
        .map(|name| name.to_string_lossy().into_owned())
        .unwrap_or_else(|| template.to_string());
    match name.rfind('.') {
        Some(dot) if dot > 0 => name[..dot].to_string(),
        _ => name,
    }
}

pub fn render_template(path: &Path, ast: &Ast) -> Result<Vec<u8>, TemplateError> {
    let source = std::fs::read_to_string(path)
        .map_err(|source| TemplateError::Read { path: path.to_path_buf(), source })?;

    let mut env = Environment::new();
    env.set_keep_trailing_newline(true);
    let rendered = env
        .render_str(&source, ast)
        .map_err(|source| TemplateError::User { path: path.to_path_buf(), source })?;

    if rendered.trim().is_empty() {
        return Err(TemplateError::Empty { path: path.to_path_buf() });
    }
    tracing::debug!(template = %path.display(), bytes = rendered.len(), "rendered user template");
    Ok(rendered.into_bytes())
}
