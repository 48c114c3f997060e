//! Restricted frontmatter: a `---` delimited block of single-line
//! `key: value` pairs at the very top of a file.
//!
//! Nested maps, lists and multi-line scalars are not supported; lines that
//! do not look like `key: value` are skipped.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FrontmatterValue {
    Number(i64),
    Text(String),
}

impl FrontmatterValue {
    pub fn as_text(&self) -> String {
        match self {
            FrontmatterValue::Number(n) => n.to_string(),
            FrontmatterValue::Text(s) => s.clone(),
        }
    }

    pub fn as_number(&self) -> Option<i64> {
        match self {
            FrontmatterValue::Number(n) => Some(*n),
            FrontmatterValue::Text(_) => None,
        }
    }
}

pub type Frontmatter = BTreeMap<String, FrontmatterValue>;

/// Split `raw` into the frontmatter block (without delimiters) and the body
/// that follows it. Returns `None` when the file has no frontmatter.
pub fn split(raw: &str) -> Option<(&str, &str)> {
    let rest = raw
        .strip_prefix("---\r\n")
        .or_else(|| raw.strip_prefix("---\n"))?;

    let mut offset = 0;
    for line in rest.split_inclusive('\n') {
        if line.trim_end_matches(['\r', '\n']) == "---" {
            let block = &rest[..offset];
            let body = &rest[offset + line.len()..];
            return Some((block.trim_end_matches(['\r', '\n']), body));
        }
        offset += line.len();
    }

    None
}

/// Strip a leading frontmatter block, if any.
pub fn strip(raw: &str) -> &str {
    split(raw).map(|(_, body)| body).unwrap_or(raw)
}

/// Parse the frontmatter of `raw`. Files without frontmatter yield an empty
/// map.
pub fn parse(raw: &str) -> Frontmatter {
    let mut result = Frontmatter::new();
    let Some((block, _)) = split(raw) else {
        return result;
    };

    for line in block.lines() {
        let Some((key, value)) = line.split_once(':') else {
            continue;
        };
        let key = key.trim();
        if key.is_empty() || key.starts_with('#') || line.starts_with([' ', '\t']) {
            continue;
        }
        let value = unquote(value.trim());

        // Only values that print back identically become numbers: `007` stays text
        let parsed = match value.parse::<i64>() {
            Ok(n) if n.to_string() == value => {
                FrontmatterValue::Number(n)
            }
            _ => FrontmatterValue::Text(value.to_string()),
        };
        result.insert(key.to_string(), parsed);
    }

    result
}

fn unquote(value: &str) -> &str {
    for quote in ['"', '\''] {
        if value.len() >= 2 && value.starts_with(quote) && value.ends_with(quote) {
            return &value[1..value.len() - 1];
        }
    }
    value
}
