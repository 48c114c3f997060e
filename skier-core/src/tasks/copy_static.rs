use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::task::{Task, TaskContext, TaskError, TaskOutput, parse_config, require};

use super::config_str;

pub const KIND: &str = "copy-static";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct CopyStaticConfig {
    pub from: Option<String>,
    pub to: Option<String>,
}

pub struct CopyStatic {
    name: String,
    config: Value,
}

impl CopyStatic {
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

impl Task for CopyStatic {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        match (config_str(&self.config, "from"), config_str(&self.config, "to")) {
            (Some(from), Some(to)) => format!("Copy static files from {from} to {to}"),
            _ => "Copy static files".to_string(),
        }
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: CopyStaticConfig = parse_config(ctx.name, config)?;
        require(
            ctx.name,
            &[("from", cfg.from.as_deref()), ("to", cfg.to.as_deref())],
        )?;
        let from = PathBuf::from(cfg.from.as_deref().unwrap_or_default());
        let to = PathBuf::from(cfg.to.as_deref().unwrap_or_default());

        tracing::debug!(from = %from.display(), to = %to.display(), "Copying static files");
        let copied = copy_dir(&from, &to)?;
        if ctx.debug {
            tracing::debug!(files = copied, "Copied static files");
        }

        Ok(TaskOutput::new())
    }
}

/// Copy the contents of `from` into `to`, overwriting existing files.
/// Returns the number of files copied.
pub fn copy_dir(from: &Path, to: &Path) -> Result<usize, TaskError> {
    std::fs::create_dir_all(to)?;
    let mut copied = 0;
    for entry in WalkDir::new(from).min_depth(1) {
        let entry = entry.map_err(|e| TaskError::Io(e.into()))?;
        let Ok(rel) = entry.path().strip_prefix(from) else {
            continue;
        };
        let target = to.join(rel);
        if entry.file_type().is_dir() {
            std::fs::create_dir_all(&target)?;
        } else {
            std::fs::copy(entry.path(), &target)?;
            copied += 1;
        }
    }
    Ok(copied)
}
