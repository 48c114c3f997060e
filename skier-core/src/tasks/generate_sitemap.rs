use std::path::{Path, PathBuf};

use serde::Deserialize;
use serde_json::Value;
use walkdir::WalkDir;

use crate::task::{Task, TaskContext, TaskError, TaskOutput, parse_config, require};

use super::config_str;

pub const KIND: &str = "generate-sitemap";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateSitemapConfig {
    /// Directory searched for `.html` files
    pub scan_dir: Option<String>,
    pub out_dir: Option<String>,
    /// Prepended to every `<loc>` when set
    pub site_url: Option<String>,
}

pub struct GenerateSitemap {
    name: String,
    config: Value,
}

impl GenerateSitemap {
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

impl Task for GenerateSitemap {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        match config_str(&self.config, "scanDir") {
            Some(dir) => format!("Generate sitemap.xml for {dir}"),
            None => "Generate sitemap.xml".to_string(),
        }
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: GenerateSitemapConfig = parse_config(ctx.name, config)?;
        require(
            ctx.name,
            &[
                ("scanDir", cfg.scan_dir.as_deref()),
                ("outDir", cfg.out_dir.as_deref()),
            ],
        )?;
        let scan_dir = PathBuf::from(cfg.scan_dir.as_deref().unwrap_or_default());
        let out_dir = PathBuf::from(cfg.out_dir.as_deref().unwrap_or_default());

        std::fs::create_dir_all(&scan_dir)?;
        let pages = html_files(&scan_dir)?;
        if pages.is_empty() {
            tracing::warn!(dir = %scan_dir.display(), "No HTML files found for sitemap generation");
        }

        let xml = sitemap_xml(&pages, cfg.site_url.as_deref());
        std::fs::create_dir_all(&out_dir)?;
        let out_path = out_dir.join("sitemap.xml");
        std::fs::write(&out_path, xml)?;
        tracing::debug!(path = %out_path.display(), urls = pages.len(), "Generated sitemap");

        Ok(TaskOutput::new())
    }
}

/// Every `.html` file under `dir`, relative and `/` separated, sorted.
pub fn html_files(dir: &Path) -> Result<Vec<String>, TaskError> {
    let mut pages = Vec::new();
    for entry in WalkDir::new(dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| TaskError::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }
        if entry.path().extension().is_none_or(|ext| ext != "html") {
            continue;
        }
        if let Ok(rel) = entry.path().strip_prefix(dir) {
            let rel = rel
                .components()
                .map(|c| c.as_os_str().to_string_lossy().to_string())
                .collect::<Vec<_>>()
                .join("/");
            pages.push(rel);
        }
    }
    Ok(pages)
}

pub fn sitemap_xml(pages: &[String], site_url: Option<&str>) -> String {
    let base = site_url.map(|u| u.trim_end_matches('/')).unwrap_or("");
    let entries = pages
        .iter()
        .map(|rel| {
            let loc = format!("{base}/{}", rel.trim_start_matches('/'));
            format!("<url><loc>{}</loc></url>", html_escape::encode_text(&loc))
        })
        .collect::<Vec<_>>()
        .join("\n    ");

    format!(
        "<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n\
         <urlset xmlns=\"http://www.sitemaps.org/schemas/sitemap/0.9\">\n    \
         {entries}\n\
         </urlset>\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::context::Context;
    use serde_json::json;
    use std::fs;

    #[test]
    fn lists_html_files_with_site_url() {
        let dir = tempfile::tempdir().unwrap();
        let public = dir.path().join("public");
        fs::create_dir_all(public.join("blog")).unwrap();
        fs::write(public.join("index.html"), "").unwrap();
        fs::write(public.join("blog/a.html"), "").unwrap();
        fs::write(public.join("style.css"), "").unwrap();

        let config = json!({
            "scanDir": public,
            "outDir": public,
            "siteUrl": "https://example.com/",
        });
        let task = GenerateSitemap::new(config.clone());
        let globals = Context::new();
        let mut ctx = TaskContext::new(task.name(), &globals, false);
        task.run(config, &mut ctx).unwrap();

        let xml = fs::read_to_string(public.join("sitemap.xml")).unwrap();
        assert!(xml.starts_with("<?xml version=\"1.0\" encoding=\"UTF-8\"?>\n<urlset"));
        assert!(xml.contains("<url><loc>https://example.com/blog/a.html</loc></url>"));
        assert!(xml.contains("<url><loc>https://example.com/index.html</loc></url>"));
        assert!(!xml.contains("style.css"));
    }

    #[test]
    fn root_relative_without_site_url() {
        let xml = sitemap_xml(&["a.html".to_string()], None);
        assert!(xml.contains("<loc>/a.html</loc>"));
    }
}
