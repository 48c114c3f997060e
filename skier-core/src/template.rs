use std::path::{Path, PathBuf};

use tera::Tera;
use thiserror::Error;

use crate::renderer::RenderContext;

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("Template error: {0}")]
    Tera(#[from] tera::Error),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("Template not compiled: {0}")]
    Unknown(String),
}

/// Per-invocation template engine.
///
/// Each task run gets its own instance, so partials and templates compiled
/// by one task are never visible to another.
pub struct TemplateRenderer {
    tera: Tera,
}

impl Default for TemplateRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl TemplateRenderer {
    pub fn new() -> Self {
        Self {
            tera: Tera::default(),
        }
    }

    /// Register every file in `dir` whose extension is in `extensions` as a
    /// partial, named by its file name (`{% include "header.html" %}`).
    ///
    /// Returns the registered names in directory order.
    pub fn register_partials(
        &mut self,
        dir: &Path,
        extensions: &[&str],
    ) -> Result<Vec<String>, TemplateError> {
        let mut files: Vec<PathBuf> = std::fs::read_dir(dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && has_extension(p, extensions))
            .collect();
        files.sort();

        let mut registered = Vec::with_capacity(files.len());
        for path in files {
            let Some(name) = path.file_name().map(|n| n.to_string_lossy().to_string()) else {
                continue;
            };
            let source = std::fs::read_to_string(&path)?;
            self.tera.add_raw_template(&name, &source)?;
            tracing::debug!(partial = %name, "Registered partial");
            registered.push(name);
        }

        Ok(registered)
    }

    /// Compile a template from source under `name`.
    pub fn compile(&mut self, name: &str, source: &str) -> Result<(), TemplateError> {
        self.tera.add_raw_template(name, source)?;
        Ok(())
    }

    /// Compile the template file at `path`, named by its path. Compiling the
    /// same file twice is a no-op.
    pub fn compile_file(&mut self, path: &Path) -> Result<String, TemplateError> {
        let name = path.to_string_lossy().to_string();
        if !self.is_compiled(&name) {
            let source = std::fs::read_to_string(path)?;
            self.compile(&name, &source)?;
        }
        Ok(name)
    }

    pub fn is_compiled(&self, name: &str) -> bool {
        self.tera.get_template_names().any(|n| n == name)
    }

    /// Render a compiled template with the given context
    pub fn render(&self, name: &str, context: &RenderContext) -> Result<String, TemplateError> {
        if !self.is_compiled(name) {
            return Err(TemplateError::Unknown(name.to_string()));
        }
        let context = context.to_tera()?;
        Ok(self.tera.render(name, &context)?)
    }

    /// Render a template and write it to `output_path`, creating parents.
    pub fn render_to_file(
        &self,
        name: &str,
        context: &RenderContext,
        output_path: &Path,
    ) -> Result<(), TemplateError> {
        let rendered = self.render(name, context)?;

        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        std::fs::write(output_path, rendered)?;
        Ok(())
    }
}

fn has_extension(path: &Path, extensions: &[&str]) -> bool {
    let Some(file_name) = path.file_name() else {
        return false;
    };
    let file_name = file_name.to_string_lossy();
    extensions.iter().any(|ext| file_name.ends_with(ext))
}

/// Find the template closest to `start_dir`, walking up towards `root`.
///
/// The candidate is `template{extension}`. The walk checks `start_dir`
/// first and `root` last; it never looks above `root`. A `start_dir`
/// outside `root` is only checked itself.
pub fn find_nearest_template(start_dir: &Path, root: &Path, extension: &str) -> Option<PathBuf> {
    let file_name = format!("template{extension}");
    let mut current = start_dir.to_path_buf();

    loop {
        let candidate = current.join(&file_name);
        if candidate.is_file() {
            return Some(candidate);
        }
        if current == root || !current.starts_with(root) {
            return None;
        }
        match current.parent() {
            Some(parent) if parent.starts_with(root) => current = parent.to_path_buf(),
            _ => return None,
        }
    }
}
