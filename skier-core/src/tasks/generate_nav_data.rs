//! Sidebar navigation built from the frontmatter of a docs tree.
//!
//! Pages are grouped by their `section:` key and ordered by `order:`, then
//! title. The flat `pages` list uses the same ordering and is meant for
//! prev/next links.

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::LazyLock;

use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use walkdir::WalkDir;

use crate::frontmatter;
use crate::metadata::title_from_file_name;
use crate::task::{Task, TaskContext, TaskError, TaskOutput, output_var, parse_config, require};

pub const KIND: &str = "generate-nav-data";

const DEFAULT_ORDER: i64 = 999;

static FIRST_HEADING: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?m)^#\s+(.+)$").expect("valid regex"));

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateNavDataConfig {
    pub docs_dir: Option<String>,
    pub output_var: Option<String>,
    pub base_path: Option<String>,
    pub extensions: Option<Vec<String>>,
    pub default_section: Option<String>,
    pub section_order: Option<BTreeMap<String, i64>>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavItem {
    pub title: String,
    pub url: String,
    pub order: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavSection {
    pub name: String,
    pub order: i64,
    pub items: Vec<NavItem>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct NavData {
    pub sections: Vec<NavSection>,
    pub pages: Vec<NavItem>,
}

pub struct GenerateNavData {
    name: String,
    config: Value,
}

impl GenerateNavData {
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

impl Task for GenerateNavData {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        "Generate navigation data from docs".to_string()
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: GenerateNavDataConfig = parse_config(ctx.name, config)?;
        require(ctx.name, &[("docsDir", cfg.docs_dir.as_deref())])?;
        let docs_dir = PathBuf::from(cfg.docs_dir.as_deref().unwrap_or_default());
        let output_name = cfg.output_var.as_deref().unwrap_or("navData");
        let extensions = cfg
            .extensions
            .clone()
            .unwrap_or_else(|| vec![".md".to_string()]);

        tracing::debug!(dir = %docs_dir.display(), "Scanning for navigation data");
        let nav = build_nav(
            &docs_dir,
            &extensions,
            cfg.base_path.as_deref().unwrap_or(""),
            cfg.default_section.as_deref().unwrap_or("Docs"),
            &cfg.section_order.clone().unwrap_or_default(),
        )?;
        tracing::debug!(
            "Generated nav data: {} sections, {} pages",
            nav.sections.len(),
            nav.pages.len()
        );

        Ok(output_var(output_name, serde_json::to_value(&nav)?))
    }
}

pub fn build_nav(
    docs_dir: &Path,
    extensions: &[String],
    base_path: &str,
    default_section: &str,
    section_order: &BTreeMap<String, i64>,
) -> Result<NavData, TaskError> {
    let mut sections: Vec<(String, Vec<NavItem>)> = Vec::new();
    let mut pages = Vec::new();

    for entry in WalkDir::new(docs_dir).min_depth(1).sort_by_file_name() {
        let entry = entry.map_err(|e| TaskError::Io(e.into()))?;
        let file_name = entry.file_name().to_string_lossy().to_string();
        if !entry.file_type().is_file()
            || !extensions.iter().any(|ext| file_name.ends_with(ext.as_str()))
            || file_name == "template.html"
            || file_name == "template.hbs"
        {
            continue;
        }

        let content = std::fs::read_to_string(entry.path())?;
        let meta = frontmatter::parse(&content);
        let stem = entry
            .path()
            .file_stem()
            .map(|s| s.to_string_lossy().to_string())
            .unwrap_or_default();
        let rel_dir = entry
            .path()
            .parent()
            .and_then(|p| p.strip_prefix(docs_dir).ok())
            .map(|p| {
                p.components()
                    .map(|c| format!("/{}", c.as_os_str().to_string_lossy()))
                    .collect::<String>()
            })
            .unwrap_or_default();

        let url = if stem.eq_ignore_ascii_case("readme") || stem.eq_ignore_ascii_case("index") {
            if rel_dir.is_empty() {
                "/".to_string()
            } else {
                rel_dir
            }
        } else {
            format!("{rel_dir}/{stem}")
        };

        let title = meta
            .get("title")
            .map(|v| v.as_text())
            .filter(|t| !t.trim().is_empty())
            .or_else(|| {
                FIRST_HEADING
                    .captures(frontmatter::strip(&content))
                    .map(|c| c[1].trim().to_string())
            })
            .unwrap_or_else(|| title_from_file_name(&stem));
        let section = meta
            .get("section")
            .map(|v| v.as_text())
            .filter(|s| !s.trim().is_empty())
            .unwrap_or_else(|| default_section.to_string());
        let item = NavItem {
            title,
            url: format!("{base_path}{url}"),
            order: meta
                .get("order")
                .and_then(|v| v.as_number())
                .unwrap_or(DEFAULT_ORDER),
        };

        match sections.iter_mut().find(|(name, _)| *name == section) {
            Some((_, items)) => items.push(item.clone()),
            None => sections.push((section, vec![item.clone()])),
        }
        pages.push(item);
    }

    let mut sections: Vec<NavSection> = sections
        .into_iter()
        .map(|(name, mut items)| {
            items.sort_by(by_order_then_title);
            NavSection {
                order: section_order.get(&name).copied().unwrap_or(DEFAULT_ORDER),
                name,
                items,
            }
        })
        .collect();
    sections.sort_by_key(|s| s.order);
    pages.sort_by(by_order_then_title);

    Ok(NavData { sections, pages })
}

fn by_order_then_title(a: &NavItem, b: &NavItem) -> Ordering {
    a.order
        .cmp(&b.order)
        .then_with(|| a.title.to_lowercase().cmp(&b.title.to_lowercase()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn docs() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let root = dir.path();
        fs::create_dir_all(root.join("guides")).unwrap();
        fs::write(root.join("README.md"), "# Welcome\n\nHi").unwrap();
        fs::write(
            root.join("install.md"),
            "---\ntitle: Installing\norder: 1\nsection: Getting Started\n---\nbody",
        )
        .unwrap();
        fs::write(
            root.join("guides/writing-tasks.md"),
            "---\norder: 2\nsection: Guides\n---\nno heading",
        )
        .unwrap();
        fs::write(root.join("guides/template.html"), "").unwrap();
        dir
    }

    #[test]
    fn groups_and_orders_pages() {
        let dir = docs();
        let mut order = BTreeMap::new();
        order.insert("Getting Started".to_string(), 1);
        order.insert("Guides".to_string(), 2);

        let nav = build_nav(dir.path(), &[".md".to_string()], "/docs", "Docs", &order).unwrap();

        let names: Vec<&str> = nav.sections.iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["Getting Started", "Guides", "Docs"]);

        let guide = &nav.sections[1].items[0];
        assert_eq!(guide.title, "Writing Tasks");
        assert_eq!(guide.url, "/docs/guides/writing-tasks");

        let welcome = &nav.sections[2].items[0];
        assert_eq!(welcome.title, "Welcome");
        assert_eq!(welcome.url, "/docs/");
        assert_eq!(welcome.order, DEFAULT_ORDER);

        let flat: Vec<&str> = nav.pages.iter().map(|p| p.title.as_str()).collect();
        assert_eq!(flat, vec!["Installing", "Writing Tasks", "Welcome"]);
    }

    #[test]
    fn task_outputs_under_default_name() {
        let dir = docs();
        let config = serde_json::json!({ "docsDir": dir.path() });
        let task = GenerateNavData::new(config.clone());
        let globals = crate::context::Context::new();
        let mut ctx = TaskContext::new(task.name(), &globals, false);
        let out = task.run(config, &mut ctx).unwrap();
        let nav: NavData = serde_json::from_value(out["navData"].clone()).unwrap();
        assert_eq!(nav.pages.len(), 3);
    }
}
