pub mod config;
pub mod context;
pub mod frontmatter;
pub mod item;
pub mod links;
pub mod markdown;
pub mod metadata;
pub mod pagination;
pub mod pipeline;
pub mod registry;
pub mod renderer;
pub mod scanner;
pub mod task;
pub mod tasks;
pub mod template;

// Re-export main types
pub use config::{LoadError, PipelineFile, load_pipeline};
pub use context::{Context, resolve_config_vars};
pub use item::{ContentItem, ContentType};
pub use markdown::MarkdownRenderer;
pub use pagination::PaginationMeta;
pub use pipeline::{Pipeline, PipelineError, TaskFilter, TaskReport, run_task};
pub use registry::TaskRegistry;
pub use renderer::RenderContext;
pub use task::{ConfigError, FnTask, Task, TaskContext, TaskError, TaskOutput};
pub use template::{TemplateError, TemplateRenderer};
