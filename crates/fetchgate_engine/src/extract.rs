use std::sync::Arc;

use ego_tree::iter::Edge;
use ego_tree::NodeRef;
use fetchgate_core::ArticleResult;
use scraper::node::Node;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// What a readability engine hands back for a parseable document.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct ParsedArticle {
    pub title: Option<String>,
    pub text_content: String,
    pub excerpt: Option<String>,
    pub byline: Option<String>,
    pub length: usize,
    pub site_name: Option<String>,
}

/// A readability engine. `None` means the document has no article in it.
pub trait ArticleEngine: Send + Sync {
    fn parse(&self, html: &str, base_url: &Url) -> Option<ParsedArticle>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
pub enum ExtractError {
    #[error("Failed to extract article content")]
    ExtractionFailed,
}

/// Normalizes whatever the engine produces into an [`ArticleResult`].
#[derive(Clone)]
pub struct ArticleExtractor {
    engine: Arc<dyn ArticleEngine>,
}

impl Default for ArticleExtractor {
    fn default() -> Self {
        Self::new(Arc::new(ReadabilityLikeEngine))
    }
}

impl ArticleExtractor {
    pub fn new(engine: Arc<dyn ArticleEngine>) -> Self {
        Self { engine }
    }

    pub fn extract(&self, html: &str, url: &Url) -> Result<ArticleResult, ExtractError> {
        let parsed = self
            .engine
            .parse(html, url)
            .ok_or(ExtractError::ExtractionFailed)?;
        if parsed.text_content.trim().is_empty() {
            return Err(ExtractError::ExtractionFailed);
        }
        Ok(ArticleResult {
            title: parsed.title,
            content: parsed.text_content,
            excerpt: parsed.excerpt,
            byline: parsed.byline,
            length: Some(parsed.length),
            site_name: parsed.site_name,
        })
    }
}

const CONTENT_SELECTORS: [&str; 5] = ["article", "main", "[role='main']", "#content", ".content"];
const SKIPPED_TAGS: [&str; 9] = [
    "script", "style", "noscript", "nav", "header", "footer", "aside", "form", "template",
];
const BLOCK_TAGS: [&str; 16] = [
    "p", "div", "br", "h1", "h2", "h3", "h4", "h5", "h6", "li", "ul", "ol", "section",
    "blockquote", "pre", "tr",
];

/// Lightweight "readability-like" engine:
/// - title from `og:title`, `<title>`, then the first `<h1>`
/// - byline from `meta[name=author]`, `[rel=author]`, then `.byline`
/// - excerpt from the description metas, then the first non-empty `<p>`
/// - text from the first non-empty main-content container, else `<body>`
///
/// The base URL is not needed because only text is returned.
#[derive(Debug, Default, Clone, Copy)]
pub struct ReadabilityLikeEngine;

impl ArticleEngine for ReadabilityLikeEngine {
    fn parse(&self, html: &str, _base_url: &Url) -> Option<ParsedArticle> {
        let doc = Html::parse_document(html);
        let text_content = main_text(&doc)?;

        let title = meta_content(&doc, "meta[property='og:title']")
            .or_else(|| first_text(&doc, "title"))
            .or_else(|| first_text(&doc, "h1"));
        let byline = meta_content(&doc, "meta[name='author']")
            .or_else(|| first_text(&doc, "[rel='author']"))
            .or_else(|| first_text(&doc, ".byline"));
        let excerpt = meta_content(&doc, "meta[name='description']")
            .or_else(|| meta_content(&doc, "meta[property='og:description']"))
            .or_else(|| first_text(&doc, "p"));
        let site_name = meta_content(&doc, "meta[property='og:site_name']");

        Some(ParsedArticle {
            title,
            length: text_content.chars().count(),
            text_content,
            excerpt,
            byline,
            site_name,
        })
    }
}

fn main_text(doc: &Html) -> Option<String> {
    CONTENT_SELECTORS
        .iter()
        .chain(std::iter::once(&"body"))
        .filter_map(|raw| Selector::parse(raw).ok())
        .find_map(|sel| {
            doc.select(&sel)
                .map(element_text)
                .find(|text| !text.is_empty())
        })
}

fn element_text(element: ElementRef<'_>) -> String {
    let mut raw = String::new();
    collect_text(*element, &mut raw);
    normalize_text(&raw)
}

/// Iterative walk: fetched pages can nest elements arbitrarily deep.
fn collect_text(root: NodeRef<'_, Node>, out: &mut String) {
    // Number of open elements at or below the innermost skipped element.
    let mut skipped_depth = 0usize;
    for edge in root.traverse() {
        match edge {
            Edge::Open(node) if node.id() != root.id() => match node.value() {
                Node::Text(text) if skipped_depth == 0 => out.push_str(text),
                Node::Element(element) => {
                    let tag = element.name();
                    if skipped_depth > 0 || SKIPPED_TAGS.contains(&tag) {
                        skipped_depth += 1;
                    } else if BLOCK_TAGS.contains(&tag) {
                        out.push('\n');
                    }
                }
                _ => {}
            },
            Edge::Close(node) if node.id() != root.id() => {
                if let Node::Element(element) = node.value() {
                    if skipped_depth > 0 {
                        skipped_depth -= 1;
                    } else if BLOCK_TAGS.contains(&element.name()) {
                        out.push('\n');
                    }
                }
            }
            _ => {}
        }
    }
}

/// Collapses whitespace inside lines and drops blank lines.
fn normalize_text(raw: &str) -> String {
    raw.lines()
        .map(|line| line.split_whitespace().collect::<Vec<_>>().join(" "))
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}

fn meta_content(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .filter_map(|meta| meta.value().attr("content"))
        .map(|content| content.split_whitespace().collect::<Vec<_>>().join(" "))
        .find(|content| !content.is_empty())
}

fn first_text(doc: &Html, selector: &str) -> Option<String> {
    let sel = Selector::parse(selector).ok()?;
    doc.select(&sel)
        .map(|element| {
            element
                .text()
                .collect::<String>()
                .split_whitespace()
                .collect::<Vec<_>>()
                .join(" ")
        })
        .find(|text| !text.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn normalize_collapses_runs_and_blank_lines() {
        assert_eq!(normalize_text("  a   b \n\n\n  c  "), "a b\nc");
    }

    #[test]
    fn skipped_tags_do_not_leak_into_text() {
        let doc = Html::parse_document(
            "<body><nav>menu</nav><p>keep</p><script>var x = 1;</script></body>",
        );
        assert_eq!(main_text(&doc).as_deref(), Some("keep"));
    }

    #[test]
    fn nested_skipped_elements_stay_hidden() {
        let doc = Html::parse_document(
            "<body><div>a</div><aside><div><p>hidden</p></div></aside><p>b</p></body>",
        );
        assert_eq!(main_text(&doc).as_deref(), Some("a\nb"));
    }
}
