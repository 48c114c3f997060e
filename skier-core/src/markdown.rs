use std::sync::LazyLock;

use pulldown_cmark::{CodeBlockKind, Event, Options, Parser, Tag, TagEnd, html};
use syntect::highlighting::ThemeSet;
use syntect::html::highlighted_html_for_string;
use syntect::parsing::SyntaxSet;

use crate::frontmatter;

static SYNTAX_SET: LazyLock<SyntaxSet> = LazyLock::new(SyntaxSet::load_defaults_newlines);
static THEME_SET: LazyLock<ThemeSet> = LazyLock::new(ThemeSet::load_defaults);

pub const DEFAULT_SYNTAX_THEME: &str = "base16-ocean.dark";

/// Markdown to HTML with optional syntect highlighting of fenced code.
#[derive(Debug, Clone)]
pub struct MarkdownRenderer {
    syntax_theme: String,
    highlight: bool,
}

impl Default for MarkdownRenderer {
    fn default() -> Self {
        Self::new()
    }
}

impl MarkdownRenderer {
    pub fn new() -> Self {
        Self {
            syntax_theme: DEFAULT_SYNTAX_THEME.to_string(),
            highlight: true,
        }
    }

    pub fn syntax_theme<S: Into<String>>(mut self, theme: S) -> Self {
        self.syntax_theme = theme.into();
        self
    }

    pub fn highlight(mut self, enabled: bool) -> Self {
        self.highlight = enabled;
        self
    }

    /// Render markdown to HTML. A leading frontmatter block is dropped.
    pub fn render(&self, markdown: &str) -> String {
        let parser = Parser::new_ext(frontmatter::strip(markdown), Options::all());

        // (language, code) of the fenced block being collected
        let mut fence: Option<(String, String)> = None;
        let mut events = Vec::new();
        for event in parser {
            if let Some((lang, code)) = fence.as_mut() {
                match event {
                    Event::Text(text) => code.push_str(&text),
                    Event::End(TagEnd::CodeBlock) => {
                        let block = self.highlight_block(lang, code);
                        events.push(Event::Html(block.into()));
                        fence = None;
                    }
                    _ => {}
                }
                continue;
            }

            match event {
                Event::Start(Tag::CodeBlock(CodeBlockKind::Fenced(info))) if self.highlight => {
                    let lang = info.split_whitespace().next().unwrap_or_default();
                    fence = Some((lang.to_string(), String::new()));
                }
                event => events.push(event),
            }
        }

        let mut out = String::new();
        html::push_html(&mut out, events.into_iter());
        out
    }

    fn highlight_block(&self, lang: &str, code: &str) -> String {
        let plain = || {
            let class = if lang.is_empty() {
                String::new()
            } else {
                format!(" class=\"language-{}\"", html_escape::encode_double_quoted_attribute(lang))
            };
            format!("<pre><code{}>{}</code></pre>\n", class, html_escape::encode_text(code))
        };

        if lang.is_empty() {
            return plain();
        }

        let syntax = SYNTAX_SET
            .find_syntax_by_token(lang)
            .or_else(|| SYNTAX_SET.find_syntax_by_extension(lang));
        let theme = THEME_SET
            .themes
            .get(&self.syntax_theme)
            .or_else(|| THEME_SET.themes.get(DEFAULT_SYNTAX_THEME));

        match (syntax, theme) {
            (Some(syntax), Some(theme)) => {
                highlighted_html_for_string(code, &SYNTAX_SET, syntax, theme)
                    .unwrap_or_else(|_| plain())
            }
            _ => plain(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_markdown_without_frontmatter() {
        let html = MarkdownRenderer::new().render("---\ntitle: x\n---\n# Hello\n\nWorld *here*\n");
        assert!(html.contains("<h1>Hello</h1>"));
        assert!(html.contains("<em>here</em>"));
        assert!(!html.contains("title: x"));
    }

    #[test]
    fn highlights_known_languages() {
        let md = "```rust\nfn main() {}\n```\n";
        let html = MarkdownRenderer::new().render(md);
        assert!(html.contains("<pre style="));
        assert!(!html.contains("```"));
    }

    #[test]
    fn unknown_language_is_escaped() {
        let md = "```nosuchlang\n<b>&</b>\n```\n";
        let html = MarkdownRenderer::new().render(md);
        assert!(html.contains("class=\"language-nosuchlang\""));
        assert!(html.contains("&lt;b&gt;&amp;&lt;/b&gt;"));
    }

    #[test]
    fn highlighting_can_be_disabled() {
        let html = MarkdownRenderer::new()
            .highlight(false)
            .render("```rust\nlet x = 1;\n```\n");
        assert!(html.contains("<code class=\"language-rust\">"));
    }
}
