//! RSS 2.0, Atom 1.0 and JSON Feed 1.1 from a list of generated items.

use std::fmt::Write as _;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use html_escape::{encode_double_quoted_attribute as attr, encode_text as text};
use serde::Deserialize;
use serde_json::{Value, json};

use crate::metadata::{parse_date, to_iso};
use crate::task::{ConfigError, Task, TaskContext, TaskError, TaskOutput, parse_config, require};

pub const KIND: &str = "generate-feed";

const GENERATOR: &str = "skier";

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateFeedConfig {
    /// Usually `"${posts}"`, the output of a generate-items task
    pub articles: Option<Value>,
    pub out_dir: Option<String>,
    pub site: Option<FeedSite>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct FeedSite {
    pub title: Option<String>,
    pub description: Option<String>,
    pub id: Option<String>,
    pub link: Option<String>,
    pub language: Option<String>,
    pub favicon: Option<String>,
    pub copyright: Option<String>,
    pub feed_links: Option<FeedLinks>,
    pub author: Option<FeedAuthor>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedLinks {
    pub rss: Option<String>,
    pub atom: Option<String>,
    pub json: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct FeedAuthor {
    pub name: Option<String>,
    pub email: Option<String>,
    pub link: Option<String>,
}

/// The fields of a content item a feed entry needs. Unknown fields are
/// ignored so any list of item-like objects works.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", default)]
struct Article {
    title: Option<String>,
    rendered_link: Option<String>,
    raw_body: Option<String>,
    excerpt: Option<String>,
    date: Option<String>,
    date_value: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub title: String,
    pub link: String,
    pub summary: String,
    pub content: String,
    pub published: DateTime<Utc>,
}

pub struct GenerateFeed {
    name: String,
    config: Value,
}

impl GenerateFeed {
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

impl Task for GenerateFeed {
    fn name(&self) -> &str {
        &self.name
    }

    fn title(&self) -> String {
        "Generate RSS/Atom/JSON feeds".to_string()
    }

    fn config(&self) -> &Value {
        &self.config
    }

    fn run(&self, config: Value, ctx: &mut TaskContext<'_>) -> Result<TaskOutput, TaskError> {
        let cfg: GenerateFeedConfig = parse_config(ctx.name, config)?;
        let site = cfg.site.clone().unwrap_or_default();
        require(
            ctx.name,
            &[
                ("outDir", cfg.out_dir.as_deref()),
                ("site.title", site.title.as_deref()),
                ("site.link", site.link.as_deref()),
            ],
        )?;
        let articles = match cfg.articles {
            Some(Value::Array(list)) => list,
            _ => {
                return Err(ConfigError::Missing {
                    task: ctx.name.to_string(),
                    fields: vec!["articles".to_string()],
                }
                .into());
            }
        };

        let entries = feed_entries(articles, site.link.as_deref().unwrap_or_default())?;
        let feed = Feed {
            site: &site,
            entries: &entries,
        };

        let out_dir = PathBuf::from(cfg.out_dir.as_deref().unwrap_or_default());
        std::fs::create_dir_all(&out_dir)?;
        let rss_path = out_dir.join("rss.xml");
        let atom_path = out_dir.join("atom.xml");
        let json_path = out_dir.join("feed.json");
        std::fs::write(&rss_path, feed.rss())?;
        std::fs::write(&atom_path, feed.atom())?;
        std::fs::write(&json_path, serde_json::to_string_pretty(&feed.json())?)?;
        tracing::debug!(path = %rss_path.display(), "Wrote RSS feed");
        tracing::debug!(path = %atom_path.display(), "Wrote Atom feed");
        tracing::debug!(path = %json_path.display(), "Wrote JSON feed");

        let mut output = TaskOutput::new();
        output.insert("rssPath".into(), json!(rss_path));
        output.insert("atomPath".into(), json!(atom_path));
        output.insert("jsonPath".into(), json!(json_path));
        Ok(output)
    }
}

/// Validate articles and turn them into entries, newest first.
///
/// Every article needs a title, a link, a body and a valid date.
pub fn feed_entries(articles: Vec<Value>, site_link: &str) -> Result<Vec<FeedEntry>, TaskError> {
    let mut entries = Vec::with_capacity(articles.len());
    for (i, value) in articles.into_iter().enumerate() {
        let article: Article = serde_json::from_value(value)?;
        let (Some(title), Some(link), Some(body)) =
            (article.title, article.rendered_link, article.raw_body)
        else {
            return Err(TaskError::Failed(format!(
                "Article at index {i} is missing required fields (title, renderedLink, rawBody)"
            )));
        };
        let Some(published) = article
            .date_value
            .or_else(|| article.date.as_deref().and_then(parse_date))
        else {
            return Err(TaskError::Failed(format!(
                "Article '{title}' is missing a valid date"
            )));
        };

        entries.push(FeedEntry {
            summary: article.excerpt.unwrap_or_else(|| body.clone()),
            content: body,
            link: absolute_url(site_link, &link),
            title,
            published,
        });
    }
    entries.sort_by(|a, b| b.published.cmp(&a.published));
    Ok(entries)
}

fn absolute_url(site_link: &str, link: &str) -> String {
    if link.starts_with('/') {
        format!("{}{link}", site_link.trim_end_matches('/'))
    } else {
        link.to_string()
    }
}

/// A site plus its entries, serialisable to the three feed formats.
pub struct Feed<'a> {
    pub site: &'a FeedSite,
    pub entries: &'a [FeedEntry],
}

impl Feed<'_> {
    fn id(&self) -> &str {
        self.site
            .id
            .as_deref()
            .or(self.site.link.as_deref())
            .unwrap_or_default()
    }

    fn updated(&self) -> DateTime<Utc> {
        self.entries
            .first()
            .map(|e| e.published)
            .unwrap_or_else(Utc::now)
    }

    fn link(&self, kind: fn(&FeedLinks) -> Option<&String>) -> Option<&str> {
        self.site.feed_links.as_ref().and_then(kind).map(String::as_str)
    }

    pub fn rss(&self) -> String {
        let site = self.site;
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        xml.push_str(
            "<rss version=\"2.0\" xmlns:content=\"http://purl.org/rss/1.0/modules/content/\" \
             xmlns:atom=\"http://www.w3.org/2005/Atom\">\n",
        );
        xml.push_str("  <channel>\n");
        element(&mut xml, 4, "title", site.title.as_deref());
        element(&mut xml, 4, "link", site.link.as_deref());
        element(&mut xml, 4, "description", site.description.as_deref());
        element(&mut xml, 4, "lastBuildDate", Some(&self.updated().to_rfc2822()));
        element(&mut xml, 4, "generator", Some(GENERATOR));
        element(&mut xml, 4, "language", site.language.as_deref());
        element(&mut xml, 4, "copyright", site.copyright.as_deref());
        if let Some(href) = self.link(|l| l.rss.as_ref()) {
            let _ = writeln!(
                xml,
                "    <atom:link href=\"{}\" rel=\"self\" type=\"application/rss+xml\"/>",
                attr(href)
            );
        }
        let author = site.author.as_ref().and_then(|a| match (&a.email, &a.name) {
            (Some(email), Some(name)) => Some(format!("{email} ({name})")),
            (Some(email), None) => Some(email.clone()),
            _ => None,
        });
        for entry in self.entries {
            xml.push_str("    <item>\n");
            element(&mut xml, 6, "title", Some(&entry.title));
            element(&mut xml, 6, "link", Some(&entry.link));
            element(&mut xml, 6, "guid", Some(&entry.link));
            element(&mut xml, 6, "pubDate", Some(&entry.published.to_rfc2822()));
            element(&mut xml, 6, "description", Some(&entry.summary));
            element(&mut xml, 6, "content:encoded", Some(&entry.content));
            element(&mut xml, 6, "author", author.as_deref());
            xml.push_str("    </item>\n");
        }
        xml.push_str("  </channel>\n</rss>\n");
        xml
    }

    pub fn atom(&self) -> String {
        let site = self.site;
        let mut xml = String::new();
        xml.push_str("<?xml version=\"1.0\" encoding=\"utf-8\"?>\n");
        xml.push_str("<feed xmlns=\"http://www.w3.org/2005/Atom\">\n");
        element(&mut xml, 2, "id", Some(self.id()));
        element(&mut xml, 2, "title", site.title.as_deref());
        element(&mut xml, 2, "updated", Some(&to_iso(&self.updated())));
        element(&mut xml, 2, "generator", Some(GENERATOR));
        if let Some(author) = &site.author {
            xml.push_str("  <author>\n");
            element(&mut xml, 4, "name", author.name.as_deref());
            element(&mut xml, 4, "email", author.email.as_deref());
            element(&mut xml, 4, "uri", author.link.as_deref());
            xml.push_str("  </author>\n");
        }
        if let Some(link) = &site.link {
            let _ = writeln!(xml, "  <link rel=\"alternate\" href=\"{}\"/>", attr(link));
        }
        if let Some(href) = self.link(|l| l.atom.as_ref()) {
            let _ = writeln!(xml, "  <link rel=\"self\" href=\"{}\"/>", attr(href));
        }
        element(&mut xml, 2, "subtitle", site.description.as_deref());
        element(&mut xml, 2, "icon", site.favicon.as_deref());
        element(&mut xml, 2, "rights", site.copyright.as_deref());
        for entry in self.entries {
            xml.push_str("  <entry>\n");
            let _ = writeln!(xml, "    <title type=\"html\">{}</title>", text(&entry.title));
            element(&mut xml, 4, "id", Some(&entry.link));
            let _ = writeln!(xml, "    <link href=\"{}\"/>", attr(&entry.link));
            element(&mut xml, 4, "updated", Some(&to_iso(&entry.published)));
            let _ = writeln!(xml, "    <summary type=\"html\">{}</summary>", text(&entry.summary));
            let _ = writeln!(xml, "    <content type=\"html\">{}</content>", text(&entry.content));
            xml.push_str("  </entry>\n");
        }
        xml.push_str("</feed>\n");
        xml
    }

    pub fn json(&self) -> Value {
        let site = self.site;
        let authors: Vec<Value> = site
            .author
            .iter()
            .map(|a| json!({ "name": a.name, "url": a.link }))
            .collect();
        let items: Vec<Value> = self
            .entries
            .iter()
            .map(|e| {
                json!({
                    "id": e.link,
                    "url": e.link,
                    "title": e.title,
                    "summary": e.summary,
                    "content_html": e.content,
                    "date_published": to_iso(&e.published),
                    "authors": authors,
                })
            })
            .collect();

        json!({
            "version": "https://jsonfeed.org/version/1.1",
            "title": site.title,
            "home_page_url": site.link,
            "feed_url": self.link(|l| l.json.as_ref()),
            "description": site.description,
            "icon": site.favicon,
            "language": site.language,
            "authors": authors,
            "items": items,
        })
    }
}

fn element(xml: &mut String, indent: usize, tag: &str, value: Option<&str>) {
    if let Some(value) = value {
        let _ = writeln!(xml, "{:indent$}<{tag}>{}</{tag}>", "", text(value));
    }
}
