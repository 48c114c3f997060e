use std::sync::LazyLock;

use regex::{Captures, Regex};
use serde::{Deserialize, Serialize};

static ANCHOR_HREF: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(r#"<a\s+([^>]*?)href="([^"]+)"([^>]*)>"#).expect("valid regex")
});
static SCHEME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z][a-zA-Z0-9+.-]*:").expect("valid regex"));

/// One or many prefixes, accepting both `"docs/"` and `["docs/", "/docs/"]`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum StripPrefix {
    One(String),
    Many(Vec<String>),
}

impl StripPrefix {
    pub fn as_slice(&self) -> &[String] {
        match self {
            StripPrefix::One(prefix) => std::slice::from_ref(prefix),
            StripPrefix::Many(prefixes) => prefixes,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct LinkRewrite {
    pub strip_prefix: Option<StripPrefix>,
    pub from_ext: String,
    pub to_ext: String,
    pub root_relative: bool,
    pub prefix: Option<String>,
}

impl Default for LinkRewrite {
    fn default() -> Self {
        Self {
            strip_prefix: None,
            from_ext: ".md".to_string(),
            to_ext: ".html".to_string(),
            root_relative: true,
            prefix: None,
        }
    }
}

impl LinkRewrite {
    /// Rewrite every internal `<a href="...">` in `html`.
    ///
    /// Scheme-qualified (`http:`, `mailto:`), protocol-relative (`//`) and
    /// same-page (`#...`) links are left alone. Single pass: running it twice
    /// with different prefixes is not idempotent.
    pub fn apply(&self, html: &str) -> String {
        ANCHOR_HREF
            .replace_all(html, |caps: &Captures| {
                let href = &caps[2];
                if is_external(href) || href.starts_with('#') {
                    return caps[0].to_string();
                }
                format!("<a {}href=\"{}\"{}>", &caps[1], self.rewrite_href(href), &caps[3])
            })
            .into_owned()
    }

    pub fn rewrite_href(&self, href: &str) -> String {
        let mut new_href = href.to_string();

        if let Some(prefixes) = &self.strip_prefix {
            for prefix in prefixes.as_slice() {
                if prefix.is_empty() {
                    continue;
                }
                if let Some(rest) = new_href.strip_prefix(prefix.as_str()) {
                    new_href = if rest.starts_with('/') {
                        rest.to_string()
                    } else {
                        format!("/{rest}")
                    };
                }
            }
        }

        if !self.from_ext.is_empty() {
            new_href = swap_extension(&new_href, &self.from_ext, &self.to_ext);
        }

        if let Some(prefix) = self.prefix.as_deref().filter(|p| !p.is_empty()) {
            if !(SCHEME.is_match(&new_href)
                || new_href.starts_with(['#', '/'])
                || new_href.starts_with("../"))
            {
                new_href = format!(
                    "{}/{}",
                    prefix.trim_end_matches('/'),
                    new_href.trim_start_matches('/')
                );
            }
        }

        if self.root_relative && !new_href.starts_with('/') {
            new_href.insert(0, '/');
        }

        new_href
    }
}

fn is_external(href: &str) -> bool {
    href.starts_with("//") || SCHEME.is_match(href)
}

/// Replace `from` with `to` at the end of the path portion, keeping any
/// query string or fragment verbatim.
fn swap_extension(href: &str, from: &str, to: &str) -> String {
    let split = href.find(['?', '#']).unwrap_or(href.len());
    let (path, suffix) = href.split_at(split);
    match path.strip_suffix(from) {
        Some(stem) => format!("{stem}{to}{suffix}"),
        None => href.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs(to_ext: &str) -> LinkRewrite {
        LinkRewrite {
            strip_prefix: Some(StripPrefix::Many(vec!["/docs/".into(), "docs/".into()])),
            from_ext: ".md".into(),
            to_ext: to_ext.into(),
            root_relative: true,
            prefix: None,
        }
    }

    #[test]
    fn strips_prefix_and_extension() {
        let rw = LinkRewrite {
            strip_prefix: Some(StripPrefix::Many(vec!["docs/".into()])),
            to_ext: String::new(),
            ..LinkRewrite::default()
        };
        assert_eq!(rw.apply(r#"<a href="docs/x.md">x</a>"#), r#"<a href="/x">x</a>"#);
    }

    #[test]
    fn removes_prefixes_regardless_of_leading_slash() {
        let html = r#"<a href="/docs/foo.md">foo</a> <a href="docs/bar.md">bar</a> <a href="baz.md">baz</a>"#;
        let out = docs(".html").apply(html);
        assert!(out.contains(r#"href="/foo.html""#));
        assert!(out.contains(r#"href="/bar.html""#));
        assert!(out.contains(r#"href="/baz.html""#));
    }

    #[test]
    fn leaves_external_and_anchor_links() {
        let html = r##"<a href="http://ext.com/x.md">e</a> <a href="#anchor">a</a> <a href="mailto:me@x.md">m</a> <a href="//cdn.io/a.md">c</a>"##;
        assert_eq!(docs("").apply(html), html);
    }

    #[test]
    fn preserves_query_and_fragment() {
        let html = r#"<a href="/docs/foo.md#bar">foo</a> <a href="docs/bar.md?x=1">bar</a>"#;
        let out = docs(".html").apply(html);
        assert!(out.contains(r#"href="/foo.html#bar""#));
        assert!(out.contains(r#"href="/bar.html?x=1""#));
        assert_eq!(docs("").rewrite_href("bar.md#x"), "/bar#x");
    }

    #[test]
    fn keeps_other_attributes() {
        let html = r#"<a class="nav" href="docs/a.md" title="A">A</a>"#;
        assert_eq!(
            docs("").apply(html),
            r#"<a class="nav" href="/a" title="A">A</a>"#
        );
    }

    #[test]
    fn section_prefix_applies_to_relative_links_only() {
        let rw = LinkRewrite {
            prefix: Some("/guide/".into()),
            root_relative: false,
            ..LinkRewrite::default()
        };
        assert_eq!(rw.rewrite_href("intro.md"), "/guide/intro.html");
        assert_eq!(rw.rewrite_href("/abs.md"), "/abs.html");
        assert_eq!(rw.rewrite_href("../up.md"), "../up.html");
    }

    #[test]
    fn root_relative_can_be_disabled() {
        let rw = LinkRewrite {
            root_relative: false,
            ..LinkRewrite::default()
        };
        assert_eq!(rw.rewrite_href("foo/"), "foo/");
        assert_eq!(rw.rewrite_href("a.md"), "a.html");
    }
}
