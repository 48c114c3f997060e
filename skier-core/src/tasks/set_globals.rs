use serde::Deserialize;
use serde_json::{Map, Value};

use crate::context::Context;
use crate::task::{Task, TaskContext, TaskError, TaskOutput, parse_config};

pub const KIND: &str = "set-globals";

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SetGlobalsConfig {
    pub values: Option<Map<String, Value>>,
}

type ValuesFn = dyn Fn(&Context) -> Map<String, Value>;

/// Adds fixed values, computed values, or both to the shared context.
/// Computed values win on conflicting keys.
pub struct SetGlobals {
    name: String,
    config: Value,
    values_fn: Option<Box<ValuesFn>>,
}

impl SetGlobals {
    pub fn new(config: Value) -> Self {
        Self {
            name: KIND.to_string(),
            config,
            values_fn: None,
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Compute values from the context at run time.
    pub fn with_values_fn<F>(mut self, values_fn: F) -> Self
    where
        F: Fn(&Context) -> Map<String, Value> + 'static,
    {
        self.values_fn = Some(Box::new(values_fn));
        self
    }
}

impl Task for SetGlobals {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        "Set global template variables".to_string()
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: SetGlobalsConfig = parse_config(ctx.name, config)?;
        let mut output = TaskOutput::new();

        if let Some(values) = cfg.values {
            tracing::debug!(
                "Setting globals: {}",
                values.keys().cloned().collect::<Vec<_>>().join(", ")
            );
            output.extend(values);
        }

        if let Some(values_fn) = &self.values_fn {
            let computed = values_fn(ctx.globals);
            tracing::debug!(
                "Setting globals from function: {}",
                computed.keys().cloned().collect::<Vec<_>>().join(", ")
            );
            output.extend(computed);
        }

        Ok(output)
    }
}
