use serde::de::DeserializeOwned;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::Context;
use crate::scanner::ScanError;
use crate::template::{TemplateError, TemplateRenderer};

/// Variables a task adds to the shared context.
pub type TaskOutput = Map<String, Value>;

/// Configuration problems, reported before a task touches the filesystem.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Missing required config: {}", .fields.join(", "))]
    Missing { task: String, fields: Vec<String> },
    #[error("Cannot specify both {first} and {second}")]
    Conflict {
        task: String,
        first: String,
        second: String,
    },
    #[error("{field} {reason}")]
    OutOfRange {
        task: String,
        field: String,
        reason: String,
    },
    #[error("Invalid config: {source}")]
    Invalid {
        task: String,
        #[source]
        source: serde_json::Error,
    },
}

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    Template(#[from] TemplateError),
    #[error(transparent)]
    Scan(#[from] ScanError),
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
    #[error("{0}")]
    Failed(String),
}

/// What a running task can see.
pub struct TaskContext<'a> {
    pub name: &'a str,
    pub debug: bool,
    /// Read-only view of the shared context
    pub globals: &'a Context,
    /// Fresh renderer for this invocation only
    pub renderer: TemplateRenderer,
}

impl<'a> TaskContext<'a> {
    pub fn new(name: &'a str, globals: &'a Context, debug: bool) -> Self {
        Self {
            name,
            debug,
            globals,
            renderer: TemplateRenderer::new(),
        }
    }
}

/// One named, configured unit of pipeline work.
pub trait Task {
    fn name(&self) -> &str;

    fn title(&self) -> String {
        self.name().to_string()
    }

    /// Raw configuration, before `${var}` resolution.
    fn config(&self) -> &Value;

    /// Execute with the resolved configuration.
    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError>;
}

type RunFn = dyn Fn(Value, &mut TaskContext<'_>) -> Result<TaskOutput, TaskError>;

/// A task backed by a closure, for one-off pipeline steps.
pub struct FnTask {
    name: String,
    title: Option<String>,
    config: Value,
    run: Box<RunFn>,
}

impl FnTask {
    pub fn new<F>(name: impl Into<String>, config: Value, run: F) -> Self
    where
        F: Fn(Value, &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> + 'static,
    {
        Self {
            name: name.into(),
            title: None,
            config,
            run: Box::new(run),
        }
    }

    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }
}

impl Task for FnTask {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        self.title.clone().unwrap_or_else(|| self.name.clone())
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        (self.run)(config, ctx)
    }
}

/// Deserialize a resolved configuration into a task's typed config.
pub fn parse_config<T: DeserializeOwned>(task: &str, config: Value) -> Result<T, ConfigError> {
    let config = match config {
        Value::Null => Value::Object(Map::new()),
        other => other,
    };
    serde_json::from_value(config).map_err(|source| ConfigError::Invalid {
        task: task.to_string(),
        source,
    })
}

/// Check required string fields, naming every one that is missing, null or
/// empty.
pub fn require(task: &str, fields: &[(&str, Option<&str>)]) -> Result<(), ConfigError> {
    let missing: Vec<String> = fields
        .iter()
        .filter(|(_, value)| value.is_none_or(|v| v.trim().is_empty()))
        .map(|(name, _)| name.to_string())
        .collect();

    if missing.is_empty() {
        Ok(())
    } else {
        Err(ConfigError::Missing {
            task: task.to_string(),
            fields: missing,
        })
    }
}

/// Wrap a single output variable into a [`TaskOutput`].
pub fn output_var(name: &str, value: Value) -> TaskOutput {
    let mut output = TaskOutput::new();
    output.insert(name.to_string(), value);
    output
}
