//! Date, title and excerpt extraction for content items.
//!
//! Each field falls through its own ordered list of sources, so an author
//! can override one field without supplying the others:
//!
//! - **date**: override hook, frontmatter `date:`, a `YYYY-MM-DD` in the
//!   file name, then the file's modification time. A value that does not
//!   parse as a calendar date is skipped, never an error.
//! - **title**: frontmatter `title:`, otherwise derived from the file name.
//! - **excerpt**: frontmatter `excerpt:`, the excerpt hook, then the first
//!   two paragraphs of the body.

use std::sync::LazyLock;
use std::time::SystemTime;

use chrono::{DateTime, NaiveDate, NaiveDateTime, SecondsFormat, Utc};
use regex::Regex;

use crate::frontmatter::{self, Frontmatter};
use crate::markdown::MarkdownRenderer;

static FILENAME_DATE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(\d{4}-\d{2}-\d{2})").expect("valid regex"));
static DATE_PREFIX: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\d{4}-\d{2}-\d{2}[-_]?(.+)$").expect("valid regex"));
static TITLE_TAG: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)<title[^>]*>(.*?)</title>").expect("valid regex"));
static LIST_MARKER: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(?:[-*+]|\d+[.)])\s+").expect("valid regex"));

/// What a date override hook may hand back.
#[derive(Debug, Clone, PartialEq)]
pub enum DateHint {
    At(DateTime<Utc>),
    Text(String),
}

/// Where an item's date came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DateSource {
    Override,
    Frontmatter,
    FileName,
    Modified,
}

#[derive(Debug, Clone, PartialEq)]
pub struct ItemDate {
    pub value: DateTime<Utc>,
    pub source: DateSource,
}

impl ItemDate {
    /// ISO-8601 with millisecond precision, e.g. `2024-05-01T00:00:00.000Z`.
    pub fn iso(&self) -> String {
        to_iso(&self.value)
    }

    /// Human display form, e.g. `1 May 2024`.
    pub fn display(&self) -> String {
        format_date_display(&self.value)
    }
}

pub fn to_iso(value: &DateTime<Utc>) -> String {
    value.to_rfc3339_opts(SecondsFormat::Millis, true)
}

pub fn format_date_display(value: &DateTime<Utc>) -> String {
    value.format("%-d %B %Y").to_string()
}

/// Parse the date formats authors commonly write. Naive values are UTC.
pub fn parse_date(input: &str) -> Option<DateTime<Utc>> {
    let input = input.trim();
    if input.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(input) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in [
        "%Y-%m-%dT%H:%M:%S%.f",
        "%Y-%m-%dT%H:%M",
        "%Y-%m-%d %H:%M:%S",
        "%Y-%m-%d %H:%M",
    ] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(input, format) {
            return Some(naive.and_utc());
        }
    }
    if let Ok(date) = NaiveDate::parse_from_str(input, "%Y-%m-%d") {
        return date.and_hms_opt(0, 0, 0).map(|naive| naive.and_utc());
    }
    // Bare year, e.g. `date: 2024`
    if input.len() == 4
        && let Ok(year) = input.parse::<i32>()
    {
        return NaiveDate::from_ymd_opt(year, 1, 1)
            .and_then(|date| date.and_hms_opt(0, 0, 0))
            .map(|naive| naive.and_utc());
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(input) {
        return Some(dt.with_timezone(&Utc));
    }

    None
}

/// First valid `YYYY-MM-DD` anywhere in `file_name`.
pub fn date_from_file_name(file_name: &str) -> Option<DateTime<Utc>> {
    FILENAME_DATE
        .captures_iter(file_name)
        .filter_map(|caps| caps.get(1))
        .find_map(|m| parse_date(m.as_str()))
}

/// Run the date chain. `hint` is the result of the override hook, if any.
pub fn extract_date(
    hint: Option<DateHint>,
    frontmatter: &Frontmatter,
    file_name: &str,
    modified: Option<SystemTime>,
) -> Option<ItemDate> {
    let from_hint = hint.and_then(|hint| match hint {
        DateHint::At(value) => Some(value),
        DateHint::Text(text) => parse_date(&text),
    });
    if let Some(value) = from_hint {
        return Some(ItemDate {
            value,
            source: DateSource::Override,
        });
    }

    if let Some(value) = frontmatter
        .get("date")
        .and_then(|v| parse_date(&v.as_text()))
    {
        return Some(ItemDate {
            value,
            source: DateSource::Frontmatter,
        });
    }

    if let Some(value) = date_from_file_name(file_name) {
        return Some(ItemDate {
            value,
            source: DateSource::FileName,
        });
    }

    modified.map(|time| ItemDate {
        value: DateTime::<Utc>::from(time),
        source: DateSource::Modified,
    })
}

/// Turn a file stem into a title: drop a leading date, treat `-` and `_`
/// as spaces, capitalise each word.
pub fn title_from_file_name(item_name: &str) -> String {
    let name = DATE_PREFIX
        .captures(item_name)
        .and_then(|caps| caps.get(1))
        .map(|m| m.as_str())
        .unwrap_or(item_name);

    let spaced = name.replace(['-', '_'], " ");
    let mut title = String::with_capacity(spaced.len());
    let mut at_word_start = true;
    for c in spaced.chars() {
        if at_word_start && c.is_alphanumeric() {
            title.extend(c.to_uppercase());
        } else {
            title.push(c);
        }
        at_word_start = !(c.is_alphanumeric() || c == '_');
    }
    title.trim().to_string()
}

pub fn extract_title(frontmatter: &Frontmatter, item_name: &str) -> String {
    match frontmatter.get("title").map(|v| v.as_text()) {
        Some(title) if !title.trim().is_empty() => title,
        _ => title_from_file_name(item_name),
    }
}

/// Title of a hand-written HTML page: its `<title>` text, else derived from
/// the file name.
pub fn title_from_html(html: &str, item_name: &str) -> String {
    match TITLE_TAG.captures(html).and_then(|caps| caps.get(1)) {
        Some(m) if !m.as_str().trim().is_empty() => {
            html_escape::decode_html_entities(m.as_str().trim()).to_string()
        }
        _ => title_from_file_name(item_name),
    }
}

/// First two non-empty paragraphs of the body with leading block markers
/// (headings, quotes, list bullets) removed. Returns markdown.
pub fn excerpt_source(raw: &str) -> String {
    let body = frontmatter::strip(raw).replace("\r\n", "\n");
    body.split("\n\n")
        .map(clean_paragraph)
        .filter(|p| !p.is_empty())
        .take(2)
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn clean_paragraph(paragraph: &str) -> String {
    paragraph
        .lines()
        .map(|line| {
            let line = line.trim();
            let line = line.trim_start_matches('#').trim_start();
            let line = line.trim_start_matches('>').trim_start();
            LIST_MARKER.replace(line, "").into_owned()
        })
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

/// Run the excerpt chain. `hook` is the caller's extractor, consulted only
/// when frontmatter has no excerpt.
pub fn extract_excerpt<F>(
    raw: &str,
    frontmatter: &Frontmatter,
    markdown: &MarkdownRenderer,
    hook: F,
) -> Option<String>
where
    F: FnOnce(&str, &Frontmatter) -> Option<String>,
{
    if let Some(excerpt) = frontmatter.get("excerpt").map(|v| v.as_text()) {
        if !excerpt.trim().is_empty() {
            return Some(markdown.render(&excerpt));
        }
    }

    if let Some(excerpt) = hook(raw, frontmatter) {
        return Some(excerpt);
    }

    let source = excerpt_source(raw);
    if source.is_empty() {
        None
    } else {
        Some(markdown.render(&source))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::frontmatter::FrontmatterValue;
    use chrono::TimeZone;

    #[test]
    fn html_title_from_tag_or_file_name() {
        assert_eq!(
            title_from_html("<HEAD><Title>\n  Tom &amp; Jerry </TITLE></HEAD>", "x"),
            "Tom & Jerry"
        );
        assert_eq!(
            title_from_html("<title></title><h1>Hi</h1>", "2024-05-01-launch-notes"),
            "Launch Notes"
        );
    }

    fn fm(pairs: &[(&str, &str)]) -> Frontmatter {
        pairs
            .iter()
            .map(|(k, v)| (k.to_string(), FrontmatterValue::Text(v.to_string())))
            .collect()
    }

    #[test]
    fn parses_common_formats() {
        let expected = Utc.with_ymd_and_hms(2024, 5, 1, 0, 0, 0).unwrap();
        assert_eq!(parse_date("2024-05-01"), Some(expected));
        assert_eq!(parse_date("2024-05-01T00:00:00Z"), Some(expected));
        assert_eq!(parse_date("2024-05-01 00:00:00"), Some(expected));
        assert_eq!(parse_date("Wed, 01 May 2024 00:00:00 +0000"), Some(expected));
        assert_eq!(
            parse_date("2024"),
            Some(Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap())
        );
        assert_eq!(parse_date("2024-13-45"), None);
        assert_eq!(parse_date("soon"), None);
    }

    #[test]
    fn iso_and_display_formats() {
        let date = ItemDate {
            value: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            source: DateSource::FileName,
        };
        assert_eq!(date.iso(), "2024-01-02T00:00:00.000Z");
        assert_eq!(date.display(), "2 January 2024");
    }

    #[test]
    fn override_wins_over_everything() {
        let hint = Some(DateHint::Text("2020-02-02".into()));
        let date = extract_date(hint, &fm(&[("date", "2021-01-01")]), "2022-03-03-x.md", None)
            .unwrap();
        assert_eq!(date.source, DateSource::Override);
        assert_eq!(date.iso(), "2020-02-02T00:00:00.000Z");
    }

    #[test]
    fn invalid_sources_fall_through() {
        let hint = Some(DateHint::Text("not a date".into()));
        let date = extract_date(hint, &fm(&[("date", "garbage")]), "2022-03-03-x.md", None)
            .unwrap();
        assert_eq!(date.source, DateSource::FileName);
        assert_eq!(date.display(), "3 March 2022");
    }

    #[test]
    fn falls_back_to_modified_time() {
        let mtime = SystemTime::UNIX_EPOCH + std::time::Duration::from_secs(86_400);
        let date = extract_date(None, &Frontmatter::new(), "post.md", Some(mtime)).unwrap();
        assert_eq!(date.source, DateSource::Modified);
        assert_eq!(date.iso(), "1970-01-02T00:00:00.000Z");
        assert_eq!(extract_date(None, &Frontmatter::new(), "post.md", None), None);
    }

    #[test]
    fn titles_from_file_names() {
        assert_eq!(title_from_file_name("2024-05-01-hello"), "Hello");
        assert_eq!(title_from_file_name("getting_started-guide"), "Getting Started Guide");
        assert_eq!(title_from_file_name("README"), "README");
        assert_eq!(extract_title(&fm(&[("title", "Custom")]), "x"), "Custom");
    }

    #[test]
    fn numeric_looking_frontmatter() {
        let meta = frontmatter::parse("---\ntitle: 007\ndate: 2024\n---\nx");
        assert_eq!(extract_title(&meta, "x"), "007");

        let date = extract_date(None, &meta, "x.md", None).unwrap();
        assert_eq!(date.source, DateSource::Frontmatter);
        assert_eq!(date.iso(), "2024-01-01T00:00:00.000Z");
    }

    #[test]
    fn excerpt_takes_two_paragraphs() {
        let raw = "---\ntitle: t\n---\n# Heading\n\n\n> Quoted line\n\n- third\n";
        assert_eq!(excerpt_source(raw), "Heading\n\nQuoted line");
    }

    #[test]
    fn excerpt_chain_order() {
        let md = MarkdownRenderer::new();
        let raw = "First para.\n\nSecond para.\n\nThird.";

        let from_fm = extract_excerpt(raw, &fm(&[("excerpt", "*Short*")]), &md, |_, _| {
            Some("hook".into())
        });
        assert_eq!(from_fm.as_deref(), Some("<p><em>Short</em></p>\n"));

        let from_hook = extract_excerpt(raw, &Frontmatter::new(), &md, |_, _| Some("hook".into()));
        assert_eq!(from_hook.as_deref(), Some("hook"));

        let auto = extract_excerpt(raw, &Frontmatter::new(), &md, |_, _| None).unwrap();
        assert!(auto.contains("First para."));
        assert!(auto.contains("Second para."));
        assert!(!auto.contains("Third"));
    }
}
