use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::{Map, Value};

use crate::context::variable_reference;
use crate::pagination::{PaginationMeta, page_output_path, paginate};
use crate::renderer::RenderContext;
use crate::task::{ConfigError, Task, TaskContext, TaskError, TaskOutput, parse_config, require};

use super::config_str;

pub const KIND: &str = "generate-paginated-items";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePaginatedConfig {
    pub data_file: Option<String>,
    /// Either a variable name or a `${name}` reference. A reference that has
    /// already been resolved arrives here as the data itself.
    pub data_var: Option<Value>,
    pub data_key: Option<String>,
    pub items_per_page: Option<i64>,
    pub template: Option<String>,
    pub partials_dir: Option<String>,
    pub out_dir: Option<String>,
    pub base_path: Option<String>,
    pub output_var: Option<String>,
    pub pagination_var: Option<String>,
}

/// What the per-page variables hook is told about the page being rendered.
#[derive(Debug, Clone, Copy)]
pub struct PageArgs<'a> {
    pub page_number: usize,
    pub total_pages: usize,
    pub items: &'a [Value],
}

pub trait PageHooks {
    /// Reshape one item before it reaches the template.
    fn transform_item(&self, item: Value, _index: usize) -> Value {
        item
    }

    fn additional_vars(&self, _page: &PageArgs<'_>) -> Map<String, Value> {
        Map::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPageHooks;

impl PageHooks for DefaultPageHooks {}

pub struct GeneratePaginated {
    name: String,
    config: Value,
    hooks: Box<dyn PageHooks>,
}

impl GeneratePaginated {
    pub fn new(config: Value) -> Self {
        Self {
            name: KIND.to_string(),
            config,
            hooks: Box::new(DefaultPageHooks),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_hooks<H: PageHooks + 'static>(mut self, hooks: H) -> Self {
        self.hooks = Box::new(hooks);
        self
    }
}

enum DataSource {
    File(PathBuf),
    Var(Value),
}

/// `declared_var` is whether the unresolved config named a `dataVar`; a
/// reference to an unset variable resolves to nothing but still counts.
fn data_source(
    task: &str,
    cfg: &GeneratePaginatedConfig,
    declared_var: bool,
) -> Result<DataSource, ConfigError> {
    let file = cfg.data_file.as_deref().filter(|f| !f.trim().is_empty());
    let var = match cfg.data_var.as_ref() {
        Some(Value::String(s)) if s.trim().is_empty() => None,
        Some(value) => Some(value.clone()),
        None if declared_var => Some(Value::Null),
        None => None,
    };

    match (file, var) {
        (Some(_), Some(_)) => Err(ConfigError::Conflict {
            task: task.to_string(),
            first: "dataFile".to_string(),
            second: "dataVar".to_string(),
        }),
        (Some(file), None) => Ok(DataSource::File(PathBuf::from(file))),
        (None, Some(var)) => Ok(DataSource::Var(var)),
        (None, None) => Err(ConfigError::Missing {
            task: task.to_string(),
            fields: vec!["dataFile or dataVar".to_string()],
        }),
    }
}

impl Task for GeneratePaginated {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        match config_str(&self.config, "basePath") {
            Some(base) => format!("Generate paginated pages for {base}"),
            None => "Generate paginated pages".to_string(),
        }
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: GeneratePaginatedConfig = parse_config(ctx.name, config)?;
        require(
            ctx.name,
            &[
                ("template", cfg.template.as_deref()),
                ("partialsDir", cfg.partials_dir.as_deref()),
                ("outDir", cfg.out_dir.as_deref()),
                ("basePath", cfg.base_path.as_deref()),
            ],
        )?;
        let raw_var = self.config.get("dataVar").filter(|v| !v.is_null());
        let declared_var = raw_var.is_some();
        let source = data_source(ctx.name, &cfg, declared_var)?;
        let per_page = match cfg.items_per_page {
            Some(n) if n > 0 => n as usize,
            _ => {
                return Err(ConfigError::OutOfRange {
                    task: ctx.name.to_string(),
                    field: "itemsPerPage".to_string(),
                    reason: "must be a positive number".to_string(),
                }
                .into());
            }
        };
        let template_path = PathBuf::from(cfg.template.as_deref().unwrap_or_default());
        let partials_dir = PathBuf::from(cfg.partials_dir.as_deref().unwrap_or_default());
        let out_dir = PathBuf::from(cfg.out_dir.as_deref().unwrap_or_default());
        let base_path = cfg.base_path.as_deref().unwrap_or_default();
        let items_name = cfg.output_var.as_deref().unwrap_or("items");
        let pagination_name = cfg.pagination_var.as_deref().unwrap_or("pagination");

        let data = match source {
            DataSource::File(path) => load_data_file(&path, cfg.data_key.as_deref())?,
            DataSource::Var(var) => load_data_var(var, raw_var.and_then(Value::as_str), ctx)?,
        };
        let items: Vec<Value> = into_list(data)
            .into_iter()
            .enumerate()
            .map(|(i, item)| self.hooks.transform_item(item, i))
            .collect();
        tracing::debug!(count = items.len(), "Loaded items");

        ctx.renderer
            .register_partials(&partials_dir, &[".html", ".hbs"])?;
        let template = ctx.renderer.compile_file(&template_path)?;

        let pages = paginate(&items, per_page, base_path);
        let total_pages = pages.len();
        for page in &pages {
            let output_path = page_output_path(page.meta.current_page, base_path, &out_dir);
            self.render_page(
                ctx,
                &template,
                page.items,
                &page.meta,
                items_name,
                pagination_name,
                &output_path,
            )?;
            tracing::debug!(
                output = %output_path.display(),
                "Generated page {}/{}",
                page.meta.current_page,
                total_pages
            );
        }

        tracing::info!(
            "Generated {total_pages} paginated page(s) for {base_path} ({} items)",
            items.len()
        );
        Ok(TaskOutput::new())
    }
}

impl GeneratePaginated {
    #[allow(clippy::too_many_arguments)]
    fn render_page(
        &self,
        ctx: &TaskContext<'_>,
        template: &str,
        items: &[Value],
        meta: &PaginationMeta,
        items_name: &str,
        pagination_name: &str,
        output_path: &Path,
    ) -> Result<(), TaskError> {
        let mut render_context = RenderContext::with_globals(ctx.globals);
        render_context.add_to_context(items_name, items)?;
        render_context.add_to_context(pagination_name, meta)?;
        render_context.extend(self.hooks.additional_vars(&PageArgs {
            page_number: meta.current_page,
            total_pages: meta.total_pages,
            items,
        }));
        ctx.renderer
            .render_to_file(template, &render_context, output_path)?;
        Ok(())
    }
}

fn load_data_file(path: &Path, key: Option<&str>) -> Result<Value, TaskError> {
    tracing::debug!(file = %path.display(), "Loading data");
    let text = std::fs::read_to_string(path)?;
    let json: Value = serde_json::from_str(&text)?;
    let Some(key) = key.filter(|k| !k.is_empty()) else {
        return Ok(json);
    };
    match json.get(key) {
        Some(value) => Ok(value.clone()),
        None => {
            tracing::warn!(
                "dataKey '{key}' not found in {}, using empty array",
                path.display()
            );
            Ok(Value::Array(Vec::new()))
        }
    }
}

/// A string equal to the configured `dataVar` names a context variable
/// (bare or `${name}`). Anything else is data that variable resolution
/// already substituted, and a substituted string is not a list.
fn load_data_var(
    var: Value,
    configured: Option<&str>,
    ctx: &TaskContext<'_>,
) -> Result<Value, TaskError> {
    let data = match var {
        Value::String(name) if configured == Some(name.as_str()) => {
            let name = variable_reference(&name).unwrap_or(&name);
            tracing::debug!(variable = %name, "Resolving data from context");
            match ctx.globals.get(name) {
                Some(value) if !value.is_null() => value.clone(),
                _ => {
                    tracing::warn!("Global variable '{name}' not found, using empty array");
                    Value::Array(Vec::new())
                }
            }
        }
        Value::String(_) => {
            return Err(ConfigError::OutOfRange {
                task: ctx.name.to_string(),
                field: "dataVar".to_string(),
                reason: "must resolve to a list, got a string".to_string(),
            }
            .into());
        }
        Value::Null => {
            tracing::warn!("dataVar is not set in the context, using empty array");
            Value::Array(Vec::new())
        }
        data => data,
    };
    Ok(data)
}

fn into_list(data: Value) -> Vec<Value> {
    match data {
        Value::Array(items) => items,
        Value::Null => Vec::new(),
        other => {
            tracing::warn!("Data is not an array, wrapping in array");
            vec![other]
        }
    }
}
