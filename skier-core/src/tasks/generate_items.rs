//! Markdown items rendered through the nearest enclosing template.
//!
//! Every markdown file under `itemsDir` becomes one [`ContentItem`]. Its page
//! is rendered with the `template.html` found closest to it, walking up to
//! `itemsDir`, so a section can override the site-wide item template by
//! dropping its own next to its content. Hand-written `.html` files are
//! items too: they are copied as they are and take their title from
//! `<title>`. The sorted item list is returned under `outputVar` for later
//! tasks (pagination, feeds).

use std::cmp::Ordering;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::frontmatter::{self, Frontmatter};
use crate::item::{ContentItem, ContentType, newest_first};
use crate::links::LinkRewrite;
use crate::markdown::MarkdownRenderer;
use crate::metadata::{self, DateHint};
use crate::renderer::RenderContext;
use crate::scanner::{ContentFile, ContentScanner};
use crate::task::{Task, TaskContext, TaskError, TaskOutput, output_var, parse_config, require};
use crate::template::find_nearest_template;

use super::config_str;

pub const KIND: &str = "generate-items";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateItemsConfig {
    pub items_dir: Option<String>,
    pub partials_dir: Option<String>,
    pub out_dir: Option<String>,
    pub output_var: Option<String>,
    pub template_extension: Option<String>,
    pub partial_extension: Option<String>,
    pub flat_structure: Option<bool>,
    pub link_rewrite: Option<LinkRewrite>,
    pub syntax_theme: Option<String>,
}

/// The source file an item is being built from.
#[derive(Debug, Clone, Copy)]
pub struct ItemSource<'a> {
    pub section: &'a str,
    pub item_name: &'a str,
    pub item_path: &'a Path,
    pub raw: &'a str,
    pub modified: Option<SystemTime>,
}

/// What link and output path builders get to look at.
#[derive(Debug, Clone, Copy)]
pub struct ItemArgs<'a> {
    pub section: &'a str,
    pub item_name: &'a str,
    pub frontmatter: &'a Frontmatter,
}

/// Variables every item template receives, on top of the globals.
#[derive(Debug, Serialize)]
pub struct ItemRenderVars<'a> {
    #[serde(flatten)]
    pub item: &'a ContentItem,
    /// Rendered, link-rewritten HTML body
    pub content: &'a str,
}

/// Per-task customisation of item generation. Every method has a default,
/// so implementors only override what they need.
pub trait ItemHooks {
    fn parse_frontmatter(&self, raw: &str) -> Frontmatter {
        frontmatter::parse(raw)
    }

    /// Date override, consulted before frontmatter and the file name.
    /// A value that does not parse is ignored.
    fn extract_date(&self, _source: &ItemSource<'_>) -> Option<DateHint> {
        None
    }

    /// Excerpt extractor, consulted when frontmatter has no `excerpt`.
    fn extract_excerpt(&self, _raw: &str, _frontmatter: &Frontmatter) -> Option<String> {
        None
    }

    fn render_markdown(&self, markdown: &MarkdownRenderer, raw: &str) -> String {
        markdown.render(raw)
    }

    fn link(&self, args: &ItemArgs<'_>) -> String {
        default_link(args.section, args.item_name)
    }

    fn output_path(&self, args: &ItemArgs<'_>, out_dir: &Path) -> PathBuf {
        default_output_path(args.section, args.item_name, out_dir)
    }

    /// Extra template variables, merged over everything else.
    fn additional_vars(&self, _vars: &ItemRenderVars<'_>) -> Map<String, Value> {
        Map::new()
    }

    fn compare(&self, a: &ContentItem, b: &ContentItem) -> Ordering {
        newest_first(a, b)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct DefaultItemHooks;

impl ItemHooks for DefaultItemHooks {}

/// `/<section>/<item>.html`, or `/<item>.html` at the root.
pub fn default_link(section: &str, item_name: &str) -> String {
    if section.is_empty() {
        format!("/{item_name}.html")
    } else {
        format!("/{section}/{item_name}.html")
    }
}

pub fn default_output_path(section: &str, item_name: &str, out_dir: &Path) -> PathBuf {
    let mut path = out_dir.to_path_buf();
    for part in section.split('/').filter(|p| !p.is_empty()) {
        path.push(part);
    }
    path.push(format!("{item_name}.html"));
    path
}

pub struct GenerateItems {
    name: String,
    config: Value,
    hooks: Box<dyn ItemHooks>,
}

impl GenerateItems {
    pub fn new(config: Value) -> Self {
        Self {
            name: KIND.to_string(),
            config,
            hooks: Box::new(DefaultItemHooks),
        }
    }

    pub fn named(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_hooks<H: ItemHooks + 'static>(mut self, hooks: H) -> Self {
        self.hooks = Box::new(hooks);
        self
    }
}

impl Task for GenerateItems {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        match config_str(&self.config, "itemsDir") {
            Some(dir) => format!("Generate HTML items from {dir}"),
            None => "Generate HTML items".to_string(),
        }
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: GenerateItemsConfig = parse_config(ctx.name, config)?;
        require(
            ctx.name,
            &[
                ("itemsDir", cfg.items_dir.as_deref()),
                ("partialsDir", cfg.partials_dir.as_deref()),
                ("outDir", cfg.out_dir.as_deref()),
                ("outputVar", cfg.output_var.as_deref()),
            ],
        )?;
        let items_dir = PathBuf::from(cfg.items_dir.as_deref().unwrap_or_default());
        let partials_dir = PathBuf::from(cfg.partials_dir.as_deref().unwrap_or_default());
        let out_dir = PathBuf::from(cfg.out_dir.as_deref().unwrap_or_default());
        let output_name = cfg.output_var.as_deref().unwrap_or_default();
        let template_ext = cfg.template_extension.as_deref().unwrap_or(".html");
        let partial_ext = cfg.partial_extension.as_deref().unwrap_or(".html");

        let mut markdown = MarkdownRenderer::new();
        if let Some(theme) = &cfg.syntax_theme {
            markdown = markdown.syntax_theme(theme.as_str());
        }

        let partials = ctx.renderer.register_partials(&partials_dir, &[partial_ext])?;
        tracing::debug!(count = partials.len(), "Registered partials");

        let scanner = |extension: &str| {
            let scanner = ContentScanner::new(&items_dir).extension(extension);
            if cfg.flat_structure.unwrap_or(false) {
                scanner.flat()
            } else {
                scanner
            }
        };
        let files = scanner(".md").scan()?;
        let template_name = format!("template{template_ext}");
        let pages: Vec<ContentFile> = scanner(".html")
            .scan()?
            .into_iter()
            .filter(|file| file.file_name() != template_name && file.file_name() != "template.html")
            .collect();
        tracing::debug!(
            markdown = files.len(),
            html = pages.len(),
            dir = %items_dir.display(),
            "Found content files"
        );

        let mut items = Vec::with_capacity(files.len() + pages.len());
        for file in &files {
            let start_dir = items_dir.join(&file.directory);
            let Some(template_path) = find_nearest_template(&start_dir, &items_dir, template_ext)
            else {
                tracing::warn!(
                    item = %file.relative_path.display(),
                    "No template{template_ext} found in {} or any parent up to {}, skipping",
                    start_dir.display(),
                    items_dir.display()
                );
                continue;
            };
            let template = ctx.renderer.compile_file(&template_path)?;

            let item = self.generate_one(
                file,
                &template,
                &out_dir,
                &markdown,
                cfg.link_rewrite.as_ref(),
                ctx,
            )?;
            tracing::debug!(output = %item.output_path.display(), "Generated item");
            items.push(item);
        }
        for file in &pages {
            let item = self.copy_html(file, &out_dir)?;
            tracing::debug!(output = %item.output_path.display(), "Copied html item");
            items.push(item);
        }

        items.sort_by(|a, b| self.hooks.compare(a, b));
        tracing::info!(count = items.len(), "Generated {} item(s)", items.len());

        Ok(output_var(output_name, serde_json::to_value(&items)?))
    }
}

fn relative_to(output_path: &Path, out_dir: &Path) -> String {
    output_path
        .strip_prefix(out_dir)
        .unwrap_or(output_path)
        .components()
        .map(|c| c.as_os_str().to_string_lossy().to_string())
        .collect::<Vec<_>>()
        .join("/")
}

impl GenerateItems {
    /// An `.html` item is already a page: no template, no markdown.
    fn copy_html(&self, file: &ContentFile, out_dir: &Path) -> Result<ContentItem, TaskError> {
        let section = file.section();
        let item_name = file.stem();
        let raw = std::fs::read_to_string(&file.absolute_path)?;
        let modified = std::fs::metadata(&file.absolute_path)
            .and_then(|m| m.modified())
            .ok();

        let frontmatter = Frontmatter::new();
        let source = ItemSource {
            section: &section,
            item_name: &item_name,
            item_path: &file.absolute_path,
            raw: &raw,
            modified,
        };
        let date = metadata::extract_date(
            self.hooks.extract_date(&source),
            &frontmatter,
            &file.file_name(),
            modified,
        );

        let args = ItemArgs {
            section: &section,
            item_name: &item_name,
            frontmatter: &frontmatter,
        };
        let output_path = self.hooks.output_path(&args, out_dir);
        if let Some(parent) = output_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::copy(&file.absolute_path, &output_path)?;

        Ok(ContentItem {
            section: section.clone(),
            item_name: item_name.clone(),
            item_path: file.absolute_path.clone(),
            path_relative_to_output_root: relative_to(&output_path, out_dir),
            output_path,
            content_type: ContentType::Html,
            date: date.as_ref().map(|d| d.iso()),
            date_value: date.as_ref().map(|d| d.value),
            date_display: date.as_ref().map(|d| d.display()),
            title: metadata::title_from_html(&raw, &item_name),
            excerpt: None,
            rendered_link: self.hooks.link(&args),
            raw_body: raw,
        })
    }

    fn generate_one(
        &self,
        file: &ContentFile,
        template: &str,
        out_dir: &Path,
        markdown: &MarkdownRenderer,
        link_rewrite: Option<&LinkRewrite>,
        ctx: &TaskContext<'_>,
    ) -> Result<ContentItem, TaskError> {
        let section = file.section();
        let item_name = file.stem();
        let raw = std::fs::read_to_string(&file.absolute_path)?;
        let modified = std::fs::metadata(&file.absolute_path)
            .and_then(|m| m.modified())
            .ok();

        let frontmatter = self.hooks.parse_frontmatter(&raw);
        let source = ItemSource {
            section: &section,
            item_name: &item_name,
            item_path: &file.absolute_path,
            raw: &raw,
            modified,
        };
        let date = metadata::extract_date(
            self.hooks.extract_date(&source),
            &frontmatter,
            &file.file_name(),
            modified,
        );
        let title = metadata::extract_title(&frontmatter, &item_name);
        let excerpt = metadata::extract_excerpt(&raw, &frontmatter, markdown, |raw, fm| {
            self.hooks.extract_excerpt(raw, fm)
        });

        let mut content = self.hooks.render_markdown(markdown, &raw);
        if let Some(rewrite) = link_rewrite {
            content = rewrite.apply(&content);
        }

        let args = ItemArgs {
            section: &section,
            item_name: &item_name,
            frontmatter: &frontmatter,
        };
        let output_path = self.hooks.output_path(&args, out_dir);
        let rendered_link = self.hooks.link(&args);
        let path_relative_to_output_root = relative_to(&output_path, out_dir);

        let item = ContentItem {
            section: section.clone(),
            item_name: item_name.clone(),
            item_path: file.absolute_path.clone(),
            output_path,
            path_relative_to_output_root,
            content_type: ContentType::Markdown,
            date: date.as_ref().map(|d| d.iso()),
            date_value: date.as_ref().map(|d| d.value),
            date_display: date.as_ref().map(|d| d.display()),
            title,
            excerpt,
            raw_body: raw.clone(),
            rendered_link,
        };

        let vars = ItemRenderVars {
            item: &item,
            content: &content,
        };
        let extra = self.hooks.additional_vars(&vars);

        let mut render_context = RenderContext::with_globals(ctx.globals);
        render_context.set_base(&vars)?;
        render_context.extend(extra);
        ctx.renderer
            .render_to_file(template, &render_context, &item.output_path)?;

        Ok(item)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use serde_json::json;
    use std::fs;

    fn write(path: &Path, contents: &str) {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent).unwrap();
        }
        fs::write(path, contents).unwrap();
    }

    struct Site {
        dir: tempfile::TempDir,
    }

    impl Site {
        fn new() -> Self {
            let dir = tempfile::tempdir().unwrap();
            let root = dir.path();
            write(&root.join("partials/footer.html"), "<footer>{{ site }}</footer>");
            write(
                &root.join("items/template.html"),
                "ROOT {{ title }}|{{ content | safe }}{% include \"footer.html\" %}",
            );
            write(
                &root.join("items/blog/template.html"),
                "BLOG {{ title }}|{{ dateDisplay }}|{{ renderedLink | safe }}",
            );
            write(
                &root.join("items/blog/2024-01-01-first.md"),
                "First body.",
            );
            write(
                &root.join("items/blog/2024-03-01-third.md"),
                "---\ntitle: The Third\n---\nThird body.",
            );
            write(
                &root.join("items/blog/nested/2024-02-01-second.md"),
                "Second body with [a link](docs/guide.md).",
            );
            write(&root.join("items/about.md"), "# About\n\nAbout us.");
            Self { dir }
        }

        fn path(&self, rel: &str) -> String {
            self.dir.path().join(rel).to_string_lossy().to_string()
        }

        fn config(&self) -> Value {
            json!({
                "itemsDir": self.path("items"),
                "partialsDir": self.path("partials"),
                "outDir": self.path("public"),
                "outputVar": "posts",
            })
        }
    }

    fn run(task: &GenerateItems, globals: &Context) -> Vec<ContentItem> {
        let mut ctx = TaskContext::new(task.name(), globals, false);
        let out = task.run(task.config().clone(), &mut ctx).unwrap();
        serde_json::from_value(out["posts"].clone()).unwrap()
    }

    fn globals() -> Context {
        let mut globals = Context::new();
        globals.insert("site", json!("Skier"));
        globals
    }

    #[test]
    fn generates_sorted_items_with_nearest_template() {
        let site = Site::new();
        let task = GenerateItems::new(site.config());
        let items = run(&task, &globals());

        // about.md has no date of its own and falls back to its mtime
        let names: Vec<&str> = items.iter().map(|i| i.item_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["about", "2024-03-01-third", "2024-02-01-second", "2024-01-01-first"]
        );

        let third = &items[1];
        assert_eq!(third.title, "The Third");
        assert_eq!(third.section, "blog");
        assert_eq!(third.rendered_link, "/blog/2024-03-01-third.html");
        assert_eq!(third.path_relative_to_output_root, "blog/2024-03-01-third.html");
        assert_eq!(third.date.as_deref(), Some("2024-03-01T00:00:00.000Z"));

        let page = fs::read_to_string(&third.output_path).unwrap();
        assert_eq!(page, "BLOG The Third|1 March 2024|/blog/2024-03-01-third.html");

        // nested/ has no template of its own and picks up blog/template.html
        let second = &items[2];
        assert_eq!(second.section, "blog/nested");
        let page = fs::read_to_string(&second.output_path).unwrap();
        assert!(page.starts_with("BLOG Second|"));

        let about = &items[0];
        assert_eq!(about.rendered_link, "/about.html");
        let page = fs::read_to_string(site.dir.path().join("public/about.html")).unwrap();
        assert!(page.starts_with("ROOT About|"));
        assert!(page.contains("<p>About us.</p>"));
        assert!(page.ends_with("<footer>Skier</footer>"));
    }

    #[test]
    fn items_without_a_template_are_skipped() {
        let site = Site::new();
        fs::remove_file(site.dir.path().join("items/template.html")).unwrap();
        let items = run(&GenerateItems::new(site.config()), &globals());
        assert!(items.iter().all(|i| i.section.starts_with("blog")));
        assert!(!site.dir.path().join("public/about.html").exists());
    }

    #[test]
    fn flat_structure_only_reads_the_root() {
        let site = Site::new();
        let mut config = site.config();
        config["flatStructure"] = json!(true);
        let items = run(&GenerateItems::new(config), &globals());
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].item_name, "about");
    }

    #[test]
    fn link_rewrite_applies_to_content() {
        let site = Site::new();
        write(
            &site.dir.path().join("items/blog/nested/template.html"),
            "{{ content | safe }}",
        );
        let mut config = site.config();
        config["linkRewrite"] = json!({"stripPrefix": "docs/", "toExt": ""});
        let items = run(&GenerateItems::new(config), &globals());
        let second = items.iter().find(|i| i.section == "blog/nested").unwrap();
        let page = fs::read_to_string(&second.output_path).unwrap();
        assert!(page.contains(r#"href="/guide""#), "{page}");
    }

    #[test]
    fn html_items_are_copied_verbatim() {
        let site = Site::new();
        let page = "<html><head><title>Press Kit</title></head><body>{{ not_tera }}</body></html>";
        write(&site.dir.path().join("items/blog/2024-04-01-press.html"), page);
        write(&site.dir.path().join("items/blog/nested/template.html"), "{{ title }}");

        let items = run(&GenerateItems::new(site.config()), &globals());
        let names: Vec<&str> = items.iter().map(|i| i.item_name.as_str()).collect();
        assert!(!names.contains(&"template"), "{names:?}");

        let press = items.iter().find(|i| i.item_name == "2024-04-01-press").unwrap();
        assert_eq!(press.content_type, ContentType::Html);
        assert_eq!(press.title, "Press Kit");
        assert_eq!(press.excerpt, None);
        assert_eq!(press.rendered_link, "/blog/2024-04-01-press.html");
        assert_eq!(press.date.as_deref(), Some("2024-04-01T00:00:00.000Z"));
        assert_eq!(fs::read_to_string(&press.output_path).unwrap(), page);
        assert_eq!(
            serde_json::to_value(press).unwrap()["contentType"],
            json!("html")
        );
    }

    #[test]
    fn item_without_body_renders_optional_fields() {
        let site = Site::new();
        write(
            &site.dir.path().join("items/notes/template.html"),
            "{{ title }}|{{ excerpt }}|",
        );
        write(
            &site.dir.path().join("items/notes/stub.md"),
            "---\ntitle: Stub\n---\n",
        );

        let items = run(&GenerateItems::new(site.config()), &globals());
        let stub = items.iter().find(|i| i.item_name == "stub").unwrap();
        assert_eq!(stub.excerpt, None);
        assert_eq!(fs::read_to_string(&stub.output_path).unwrap(), "Stub||");
    }

    #[test]
    fn missing_required_fields_are_named() {
        let task = GenerateItems::new(json!({"itemsDir": "x"}));
        let globals = Context::new();
        let mut ctx = TaskContext::new(task.name(), &globals, false);
        let err = task.run(task.config().clone(), &mut ctx).unwrap_err();
        assert_eq!(
            err.to_string(),
            "Missing required config: partialsDir, outDir, outputVar"
        );
    }

    struct Custom;

    impl ItemHooks for Custom {
        fn extract_date(&self, source: &ItemSource<'_>) -> Option<DateHint> {
            (source.item_name == "about").then(|| DateHint::Text("2030-01-01".into()))
        }

        fn link(&self, args: &ItemArgs<'_>) -> String {
            format!("/x/{}", args.item_name)
        }

        fn additional_vars(&self, vars: &ItemRenderVars<'_>) -> Map<String, Value> {
            let mut extra = Map::new();
            extra.insert("title".into(), json!(vars.item.title.to_uppercase()));
            extra
        }

        fn compare(&self, a: &ContentItem, b: &ContentItem) -> Ordering {
            a.item_name.cmp(&b.item_name)
        }
    }

    #[test]
    fn hooks_override_defaults() {
        let site = Site::new();
        let task = GenerateItems::new(site.config()).with_hooks(Custom);
        let items = run(&task, &globals());

        let names: Vec<&str> = items.iter().map(|i| i.item_name.as_str()).collect();
        assert_eq!(
            names,
            vec!["2024-01-01-first", "2024-02-01-second", "2024-03-01-third", "about"]
        );
        let about = &items[3];
        assert_eq!(about.rendered_link, "/x/about");
        assert_eq!(about.date.as_deref(), Some("2030-01-01T00:00:00.000Z"));
        // title in the item is untouched, the template saw the extra var
        assert_eq!(about.title, "About");
        let page = fs::read_to_string(&about.output_path).unwrap();
        assert!(page.starts_with("ROOT ABOUT|"));
    }
}
