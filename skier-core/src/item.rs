use std::cmp::Ordering;
use std::path::PathBuf;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ContentType {
    Markdown,
    Html,
}

/// One generated content page, as exposed to later tasks.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContentItem {
    /// Directory of the source relative to the content root, `/` separated
    pub section: String,
    /// Source file name without extension
    pub item_name: String,
    pub item_path: PathBuf,
    pub output_path: PathBuf,
    pub path_relative_to_output_root: String,
    pub content_type: ContentType,
    #[serde(default)]
    pub date: Option<String>,
    #[serde(default)]
    pub date_value: Option<DateTime<Utc>>,
    #[serde(default)]
    pub date_display: Option<String>,
    pub title: String,
    #[serde(default)]
    pub excerpt: Option<String>,
    pub raw_body: String,
    /// Link to the item relative to the site root
    pub rendered_link: String,
}

/// Newest first. Undated items go last, in their original order.
pub fn newest_first(a: &ContentItem, b: &ContentItem) -> Ordering {
    match (a.date_value, b.date_value) {
        (Some(a), Some(b)) => b.cmp(&a),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
