use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::markdown::MarkdownRenderer;
use crate::task::{Task, TaskContext, TaskError, TaskOutput, output_var, parse_config, require};

use super::config_str;

pub const KIND: &str = "set-global-from-markdown";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SetGlobalFromMarkdownConfig {
    pub md_path: Option<String>,
    pub output_var: Option<String>,
}

/// Renders one markdown file (a changelog, say) into a context variable.
pub struct SetGlobalFromMarkdown {
    name: String,
    config: Value,
}

impl SetGlobalFromMarkdown {
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

impl Task for SetGlobalFromMarkdown {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        match config_str(&self.config, "mdPath") {
            Some(path) => format!("Set global from markdown from {path}"),
            None => "Set global from markdown".to_string(),
        }
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: SetGlobalFromMarkdownConfig = parse_config(ctx.name, config)?;
        require(
            ctx.name,
            &[
                ("mdPath", cfg.md_path.as_deref()),
                ("outputVar", cfg.output_var.as_deref()),
            ],
        )?;
        let md_path = PathBuf::from(cfg.md_path.as_deref().unwrap_or_default());

        let markdown = std::fs::read_to_string(&md_path)?;
        let html = MarkdownRenderer::new().render(&markdown);
        tracing::debug!(path = %md_path.display(), "Set global from markdown");

        Ok(output_var(
            cfg.output_var.as_deref().unwrap_or_default(),
            Value::String(html),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use serde_json::json;

    #[test]
    fn renders_file_into_variable() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("CHANGELOG.md");
        std::fs::write(&path, "## 1.0.0\n\n- First release").unwrap();

        let config = json!({ "mdPath": path, "outputVar": "changelogHtml" });
        let task = SetGlobalFromMarkdown::new(config.clone());
        let globals = Context::new();
        let mut ctx = TaskContext::new(task.name(), &globals, false);
        let out = task.run(config, &mut ctx).unwrap();

        let html = out["changelogHtml"].as_str().unwrap();
        assert!(html.contains("<h2>1.0.0</h2>"));
        assert!(html.contains("<li>First release</li>"));
    }
}
