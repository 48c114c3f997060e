//! Sequential task execution over a shared context.

use serde_json::Value;
use thiserror::Error;

use crate::context::{Context, resolve_and_report};
use crate::task::{Task, TaskContext, TaskError, TaskOutput};

/// A task failure, tagged with the task that raised it.
#[derive(Debug, Error)]
#[error("[skier/{task}] {source}")]
pub struct PipelineError {
    pub task: String,
    #[source]
    pub source: TaskError,
}

/// Result of one successful task execution.
#[derive(Debug, Default)]
pub struct TaskReport {
    pub output: TaskOutput,
    /// Context keys that already existed and were replaced
    pub overwritten: Vec<String>,
    /// `${name}` references in the config that had no value
    pub unresolved: Vec<String>,
}

/// Run one task: resolve its configuration, execute it, merge its output.
///
/// Replacing an existing context key is allowed and logged as a warning.
/// Any task error is logged and returned as-is; nothing is merged.
pub fn run_task(
    task: &dyn Task,
    context: &mut Context,
    debug: bool,
) -> Result<TaskReport, PipelineError> {
    let span = tracing::info_span!("task", name = %task.name());
    let _enter = span.enter();
    tracing::info!(title = %task.title(), "Started task");

    let (resolved, unresolved) = resolve_and_report(task.config(), context);

    let output = {
        let mut ctx = TaskContext::new(task.name(), context, debug);
        task.run(resolved, &mut ctx)
    };
    let output = match output {
        Ok(output) => output,
        Err(source) => {
            tracing::error!(error = %source, "Task failed");
            return Err(PipelineError {
                task: task.name().to_string(),
                source,
            });
        }
    };

    let mut overwritten = Vec::new();
    for (key, value) in &output {
        if context.insert(key.clone(), value.clone()).is_some() {
            tracing::warn!(
                variable = %key,
                "Variable '{key}' is being overwritten by a later task. This may indicate a configuration issue."
            );
            overwritten.push(key.clone());
        }
        tracing::debug!(variable = %key, value = %compact(value), "Added/updated variable");
    }

    tracing::info!("Finished task");
    Ok(TaskReport {
        output,
        overwritten,
        unresolved,
    })
}

fn compact(value: &Value) -> String {
    let text = value.to_string();
    if text.len() > 200 {
        let mut end = 200;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}...", &text[..end])
    } else {
        text
    }
}

/// Restrict which tasks run. `only` wins over `skip` when both are set.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TaskFilter {
    pub only: Vec<String>,
    pub skip: Vec<String>,
}

impl TaskFilter {
    pub fn only<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: names.into_iter().map(Into::into).collect(),
            skip: Vec::new(),
        }
    }

    pub fn skip<I, S>(names: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            only: Vec::new(),
            skip: names.into_iter().map(Into::into).collect(),
        }
    }

    pub fn allows(&self, name: &str) -> bool {
        if !self.only.is_empty() {
            self.only.iter().any(|n| n == name)
        } else {
            !self.skip.iter().any(|n| n == name)
        }
    }
}

/// Parse a comma separated list of task names, dropping blanks.
pub fn split_task_list(list: &str) -> Vec<String> {
    list.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

/// An ordered list of tasks.
#[derive(Default)]
pub struct Pipeline {
    tasks: Vec<Box<dyn Task>>,
    debug: bool,
}

impl std::fmt::Debug for Pipeline {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Pipeline")
            .field("tasks", &self.tasks.iter().map(|t| t.name()).collect::<Vec<_>>())
            .field("debug", &self.debug)
            .finish()
    }
}

impl Pipeline {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn debug(mut self, debug: bool) -> Self {
        self.debug = debug;
        self
    }

    pub fn add_task<T: Task + 'static>(mut self, task: T) -> Self {
        self.tasks.push(Box::new(task));
        self
    }

    pub fn add_boxed(mut self, task: Box<dyn Task>) -> Self {
        self.tasks.push(task);
        self
    }

    pub fn task_names(&self) -> Vec<&str> {
        self.tasks.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Drop tasks the filter rejects. Order of the rest is unchanged.
    pub fn filter(mut self, filter: &TaskFilter) -> Self {
        self.tasks.retain(|task| filter.allows(task.name()));
        self
    }

    /// Run every task in order, stopping at the first failure.
    pub fn run(&self, context: &mut Context) -> Result<Vec<TaskReport>, PipelineError> {
        tracing::info!(tasks = self.tasks.len(), "Started");
        let mut reports = Vec::with_capacity(self.tasks.len());
        for task in &self.tasks {
            reports.push(run_task(task.as_ref(), context, self.debug)?);
        }
        tracing::info!("Completed");
        Ok(reports)
    }
}
