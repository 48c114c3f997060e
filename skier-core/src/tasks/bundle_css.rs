use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::task::{Task, TaskContext, TaskError, TaskOutput, parse_config, require};

use super::config_str;

pub const KIND: &str = "bundle-css";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct BundleCssConfig {
    /// Directory holding the `.css` sources
    pub from: Option<String>,
    /// Output directory
    pub to: Option<String>,
    /// Output file name, e.g. `styles.css`
    pub output: Option<String>,
    pub minify: Option<bool>,
}

/// Concatenates every stylesheet in a directory, in file name order.
pub struct BundleCss {
    name: String,
    config: Value,
}

impl BundleCss {
    pub fn new(config: Value) -> Self {
        Self {
            name: KIND.to_string(),
            config,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }
}

impl Task for BundleCss {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        match config_str(&self.config, "from") {
            Some(from) => format!("Bundle CSS from {from}"),
            None => "Bundle CSS".to_string(),
        }
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: BundleCssConfig = parse_config(ctx.name, config)?;
        require(
            ctx.name,
            &[
                ("from", cfg.from.as_deref()),
                ("to", cfg.to.as_deref()),
                ("output", cfg.output.as_deref()),
            ],
        )?;
        let from = PathBuf::from(cfg.from.as_deref().unwrap_or_default());
        let to = PathBuf::from(cfg.to.as_deref().unwrap_or_default());
        let output = cfg.output.as_deref().unwrap_or_default();
        if cfg.minify.unwrap_or(false) {
            tracing::warn!("CSS minification is not supported, writing the plain bundle");
        }

        let mut sources: Vec<PathBuf> = std::fs::read_dir(&from)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| p.is_file() && p.extension().is_some_and(|ext| ext == "css"))
            .collect();
        sources.sort();

        let mut bundle = String::new();
        for source in &sources {
            bundle.push_str(&std::fs::read_to_string(source)?);
            bundle.push('\n');
        }

        std::fs::create_dir_all(&to)?;
        let out_file = to.join(output);
        std::fs::write(&out_file, bundle)?;
        tracing::debug!(path = %out_file.display(), files = sources.len(), "Bundled CSS");

        Ok(TaskOutput::new())
    }
}
