//! The `skier.toml` pipeline file.
//!
//! ```toml
//! [globals]
//! siteTitle = "My site"
//!
//! [[task]]
//! kind = "prepare-output"
//! outDir = "public"
//!
//! [[task]]
//! kind = "generate-items"
//! name = "posts"
//! itemsDir = "content/posts"
//! partialsDir = "partials"
//! outDir = "public"
//! outputVar = "posts"
//! ```
//!
//! Every key of a `[[task]]` entry other than `kind` and `name` is passed to
//! the task as its configuration.

use std::collections::HashSet;
use std::path::Path;

use serde::Deserialize;
use serde_json::{Map, Value};
use thiserror::Error;

use crate::context::Context;
use crate::pipeline::Pipeline;
use crate::registry::TaskRegistry;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    #[error("TOML parse error: {0}")]
    Parsing(#[from] toml::de::Error),
    #[error("Unknown task kind '{kind}' (task '{name}')")]
    UnknownKind { kind: String, name: String },
    #[error("Duplicate task name '{0}', give one of them a distinct `name`")]
    DuplicateName(String),
}

#[derive(Deserialize, Debug, Default)]
pub struct PipelineFile {
    #[serde(default)]
    pub globals: toml::Table,
    #[serde(default)]
    pub task: Vec<TaskSpec>,
}

#[derive(Deserialize, Debug, Clone)]
pub struct TaskSpec {
    pub kind: String,
    pub name: Option<String>,
    #[serde(flatten)]
    pub config: toml::Table,
}

impl TaskSpec {
    pub fn name(&self) -> &str {
        self.name.as_deref().unwrap_or(&self.kind)
    }
}

impl PipelineFile {
    pub fn read<P: AsRef<Path>>(path: P) -> Result<Self, LoadError> {
        let data = std::fs::read_to_string(path)?;
        Self::parse(&data)
    }

    pub fn parse(data: &str) -> Result<Self, LoadError> {
        let file: PipelineFile = toml::from_str(data)?;

        let mut seen = HashSet::new();
        for spec in &file.task {
            if !seen.insert(spec.name()) {
                return Err(LoadError::DuplicateName(spec.name().to_string()));
            }
        }

        Ok(file)
    }

    /// Initial shared context from the `[globals]` table.
    pub fn context(&self) -> Context {
        match toml_to_json(&toml::Value::Table(self.globals.clone())) {
            Value::Object(map) => Context::from_map(map),
            _ => Context::new(),
        }
    }

    /// Instantiate every task, in file order.
    pub fn pipeline(&self, registry: &TaskRegistry) -> Result<Pipeline, LoadError> {
        let mut pipeline = Pipeline::new();
        for spec in &self.task {
            let config = toml_to_json(&toml::Value::Table(spec.config.clone()));
            let task = registry
                .create(&spec.kind, spec.name().to_string(), config)
                .ok_or_else(|| LoadError::UnknownKind {
                    kind: spec.kind.clone(),
                    name: spec.name().to_string(),
                })?;
            pipeline = pipeline.add_boxed(task);
        }
        Ok(pipeline)
    }
}

/// Read a pipeline file and build its context and task list.
pub fn load_pipeline<P: AsRef<Path>>(
    path: P,
    registry: &TaskRegistry,
) -> Result<(Context, Pipeline), LoadError> {
    let file = PipelineFile::read(path)?;
    Ok((file.context(), file.pipeline(registry)?))
}

/// TOML datetimes become their string form; everything else maps directly.
pub fn toml_to_json(value: &toml::Value) -> Value {
    match value {
        toml::Value::String(s) => Value::String(s.clone()),
        toml::Value::Integer(i) => Value::from(*i),
        toml::Value::Float(f) => Value::from(*f),
        toml::Value::Boolean(b) => Value::Bool(*b),
        toml::Value::Datetime(dt) => Value::String(dt.to_string()),
        toml::Value::Array(items) => Value::Array(items.iter().map(toml_to_json).collect()),
        toml::Value::Table(table) => Value::Object(
            table
                .iter()
                .map(|(k, v)| (k.clone(), toml_to_json(v)))
                .collect::<Map<String, Value>>(),
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    const PIPELINE: &str = r#"
[globals]
siteTitle = "Skier"
nav = ["home", "blog"]

[[task]]
kind = "prepare-output"
outDir = "public"

[[task]]
kind = "generate-items"
name = "posts"
itemsDir = "content"
partialsDir = "partials"
outDir = "public"
outputVar = "posts"
linkRewrite = { stripPrefix = ["docs/"], toExt = "" }

[[task]]
kind = "generate-paginated-items"
dataVar = "${posts}"
itemsPerPage = 5
published = 2024-05-01
"#;

    #[test]
    fn parses_globals_and_tasks() {
        let file = PipelineFile::parse(PIPELINE).unwrap();
        let context = file.context();
        assert_eq!(context.get("siteTitle"), Some(&json!("Skier")));
        assert_eq!(context.get("nav"), Some(&json!(["home", "blog"])));

        let names: Vec<&str> = file.task.iter().map(TaskSpec::name).collect();
        assert_eq!(names, vec!["prepare-output", "posts", "generate-paginated-items"]);

        let pipeline = file.pipeline(&TaskRegistry::builtin()).unwrap();
        assert_eq!(pipeline.task_names(), names);
    }

    #[test]
    fn task_config_keeps_remaining_keys() {
        let file = PipelineFile::parse(PIPELINE).unwrap();
        let config = toml_to_json(&toml::Value::Table(file.task[1].config.clone()));
        assert_eq!(config["itemsDir"], json!("content"));
        assert_eq!(config["linkRewrite"]["stripPrefix"], json!(["docs/"]));
        assert!(config.get("kind").is_none());

        let paginated = toml_to_json(&toml::Value::Table(file.task[2].config.clone()));
        assert_eq!(paginated["dataVar"], json!("${posts}"));
        assert_eq!(paginated["itemsPerPage"], json!(5));
        assert_eq!(paginated["published"], json!("2024-05-01"));
    }

    #[test]
    fn duplicate_names_are_rejected() {
        let data = "[[task]]\nkind = \"copy-static\"\n\n[[task]]\nkind = \"copy-static\"\n";
        let err = PipelineFile::parse(data).unwrap_err();
        assert!(matches!(err, LoadError::DuplicateName(name) if name == "copy-static"));
    }

    #[test]
    fn unknown_kinds_are_rejected() {
        let file = PipelineFile::parse("[[task]]\nkind = \"minify-js\"\n").unwrap();
        let err = file.pipeline(&TaskRegistry::builtin()).unwrap_err();
        assert_eq!(err.to_string(), "Unknown task kind 'minify-js' (task 'minify-js')");
    }

    #[test]
    fn empty_file_is_an_empty_pipeline() {
        let file = PipelineFile::parse("").unwrap();
        assert!(file.context().is_empty());
        assert!(file.pipeline(&TaskRegistry::builtin()).unwrap().is_empty());
    }
}
