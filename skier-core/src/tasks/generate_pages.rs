use std::path::PathBuf;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::renderer::RenderContext;
use crate::task::{Task, TaskContext, TaskError, TaskOutput, parse_config, require};

use super::config_str;

pub const KIND: &str = "generate-pages";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GeneratePagesConfig {
    pub pages_dir: Option<String>,
    pub partials_dir: Option<String>,
    pub out_dir: Option<String>,
    pub page_ext: Option<String>,
    pub partial_ext: Option<String>,
}

/// Variables every page template receives, on top of the globals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PageRenderVars {
    /// File name without extension
    pub current_page: String,
    pub current_page_path: String,
}

pub trait PagesHooks {
    fn additional_vars(&self, _page: &PageRenderVars) -> Map<String, Value> {
        Map::new()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultPagesHooks;

impl PagesHooks for DefaultPagesHooks {}

pub struct GeneratePages {
    name: String,
    config: Value,
    hooks: Box<dyn PagesHooks>,
}

impl GeneratePages {
    pub fn new(config: Value) -> Self {
        Self {
            name: KIND.to_string(),
            config,
            hooks: Box::new(DefaultPagesHooks),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_hooks<H: PagesHooks + 'static>(mut self, hooks: H) -> Self {
        self.hooks = Box::new(hooks);
        self
    }
}

impl Task for GeneratePages {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        match config_str(&self.config, "pagesDir") {
            Some(dir) => format!("Generate HTML pages from {dir}"),
            None => "Generate HTML pages".to_string(),
        }
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: GeneratePagesConfig = parse_config(ctx.name, config)?;
        require(
            ctx.name,
            &[
                ("pagesDir", cfg.pages_dir.as_deref()),
                ("partialsDir", cfg.partials_dir.as_deref()),
                ("outDir", cfg.out_dir.as_deref()),
            ],
        )?;
        let pages_dir = PathBuf::from(cfg.pages_dir.as_deref().unwrap_or_default());
        let partials_dir = PathBuf::from(cfg.partials_dir.as_deref().unwrap_or_default());
        let out_dir = PathBuf::from(cfg.out_dir.as_deref().unwrap_or_default());
        let page_ext = cfg.page_ext.as_deref().unwrap_or(".html");
        let partial_ext = cfg.partial_ext.as_deref().unwrap_or(".html");

        ctx.renderer.register_partials(&partials_dir, &[partial_ext])?;
        std::fs::create_dir_all(&out_dir)?;

        let mut pages: Vec<PathBuf> = std::fs::read_dir(&pages_dir)?
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.is_file()
                    && p.file_name()
                        .is_some_and(|n| n.to_string_lossy().ends_with(page_ext))
            })
            .collect();
        pages.sort();

        for page in &pages {
            let file_name = page
                .file_name()
                .map(|n| n.to_string_lossy().to_string())
                .unwrap_or_default();
            let vars = PageRenderVars {
                current_page: file_name
                    .strip_suffix(page_ext)
                    .unwrap_or(&file_name)
                    .to_string(),
                current_page_path: file_name.clone(),
            };

            let template = ctx.renderer.compile_file(page)?;
            let mut render_context = RenderContext::with_globals(ctx.globals);
            render_context.set_base(&vars)?;
            render_context.extend(self.hooks.additional_vars(&vars));

            let output_path = out_dir.join(format!("{}.html", vars.current_page));
            ctx.renderer
                .render_to_file(&template, &render_context, &output_path)?;
            tracing::debug!(output = %output_path.display(), "Generated page");
        }

        tracing::info!(count = pages.len(), "Generated {} page(s)", pages.len());
        Ok(TaskOutput::new())
    }
}
