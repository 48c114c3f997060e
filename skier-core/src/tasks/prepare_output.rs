use std::path::PathBuf;

use serde::Deserialize;
use serde_json::Value;

use crate::task::{Task, TaskContext, TaskError, TaskOutput, parse_config, require};

use super::config_str;

pub const KIND: &str = "prepare-output";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PrepareOutputConfig {
    pub out_dir: Option<String>,
}

/// Empties the output directory, creating it if needed.
pub struct PrepareOutput {
    name: String,
    config: Value,
}

impl PrepareOutput {
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

impl Task for PrepareOutput {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        match config_str(&self.config, "outDir") {
            Some(dir) => format!("Prepare output directory: {dir}"),
            None => "Prepare output directory".to_string(),
        }
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: PrepareOutputConfig = parse_config(ctx.name, config)?;
        require(ctx.name, &[("outDir", cfg.out_dir.as_deref())])?;
        let out_dir = PathBuf::from(cfg.out_dir.as_deref().unwrap_or_default());

        if out_dir.exists() {
            std::fs::remove_dir_all(&out_dir)?;
            if ctx.debug {
                tracing::debug!(dir = %out_dir.display(), "Removed directory");
            }
        }
        std::fs::create_dir_all(&out_dir)?;
        if ctx.debug {
            tracing::debug!(dir = %out_dir.display(), "Ensured directory exists");
        }

        Ok(TaskOutput::new())
    }
}
