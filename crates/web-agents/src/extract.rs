//! Readable text from fetched HTML pages.
//!
//! Main content is the first `<main>`, then `<article>`, then a `<div>`
//! whose class list contains `content`, `main` or `article`. Pages with none
//! of those fall back to the text of every `<p>`.

use std::sync::LazyLock;

use regex::Regex;

fn pattern(source: &str) -> Option<Regex> {
    Regex::new(source).ok()
}

static TITLE: LazyLock<Option<Regex>> = LazyLock::new(|| pattern(r"(?is)<title\b[^>]*>(.*?)</title>"));
static NOISE: LazyLock<Option<Regex>> = LazyLock::new(|| {
    pattern(r"(?is)<script\b.*?</script\s*>|<style\b.*?</style\s*>|<noscript\b.*?</noscript\s*>|<!--.*?-->")
});
static MAIN: LazyLock<Option<Regex>> = LazyLock::new(|| pattern(r"(?is)<main\b[^>]*>(.*?)</main\s*>"));
static ARTICLE: LazyLock<Option<Regex>> = LazyLock::new(|| pattern(r"(?is)<article\b[^>]*>(.*?)</article\s*>"));
static CONTENT_DIV: LazyLock<Option<Regex>> = LazyLock::new(|| {
    pattern(r#"(?is)<div\b[^>]*\bclass\s*=\s*["'](?:[^"']*\s)?(?:content|main|article)(?:\s[^"']*)?["'][^>]*>"#)
});
static DIV_TAG: LazyLock<Option<Regex>> = LazyLock::new(|| pattern(r"(?i)<(/?)div\b[^>]*>"));
static PARAGRAPH: LazyLock<Option<Regex>> = LazyLock::new(|| pattern(r"(?is)<p\b[^>]*>(.*?)</p\s*>"));
static TAG: LazyLock<Option<Regex>> = LazyLock::new(|| pattern(r"(?s)<[^>]*>"));
static SPACE: LazyLock<Option<Regex>> = LazyLock::new(|| pattern(r"\s+"));

/// Title and main text of a page
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct PageText {
    pub title: String,
    pub content: String,
}

pub fn extract(html: &str) -> PageText {
    let cleaned = match NOISE.as_ref() {
        Some(re) => re.replace_all(html, " ").into_owned(),
        None => html.to_string(),
    };

    let title = TITLE
        .as_ref()
        .and_then(|re| re.captures(&cleaned))
        .and_then(|c| c.get(1))
        .map(|m| to_text(m.as_str()))
        .unwrap_or_default();

    let content = main_block(&cleaned).map_or_else(|| paragraphs(&cleaned), to_text);

    PageText { title, content }
}

fn first_capture<'a>(re: &LazyLock<Option<Regex>>, html: &'a str) -> Option<&'a str> {
    re.as_ref()?.captures(html)?.get(1).map(|m| m.as_str())
}

fn main_block(html: &str) -> Option<&str> {
    first_capture(&MAIN, html)
        .or_else(|| first_capture(&ARTICLE, html))
        .or_else(|| content_div(html))
}

/// Inner HTML of the first content-class div, following nested divs to the
/// matching close tag
fn content_div(html: &str) -> Option<&str> {
    let open = CONTENT_DIV.as_ref()?.find(html)?;
    let body_start = open.end();

    let mut depth = 1_usize;
    for tag in DIV_TAG.as_ref()?.captures_iter(&html[body_start..]) {
        let (Some(whole), Some(slash)) = (tag.get(0), tag.get(1)) else {
            continue;
        };
        if slash.as_str().is_empty() {
            depth += 1;
        } else {
            depth -= 1;
            if depth == 0 {
                return Some(&html[body_start..body_start + whole.start()]);
            }
        }
    }
    Some(&html[body_start..])
}

fn paragraphs(html: &str) -> String {
    let Some(re) = PARAGRAPH.as_ref() else {
        return String::new();
    };
    re.captures_iter(html)
        .filter_map(|c| c.get(1))
        .map(|m| to_text(m.as_str()))
        .filter(|text| !text.is_empty())
        .collect::<Vec<_>>()
        .join(" ")
}

/// Strip tags, decode common entities and collapse whitespace
pub fn to_text(fragment: &str) -> String {
    let stripped = match TAG.as_ref() {
        Some(re) => re.replace_all(fragment, " ").into_owned(),
        None => fragment.to_string(),
    };
    let decoded = decode_entities(&stripped);
    match SPACE.as_ref() {
        Some(re) => re.replace_all(decoded.trim(), " ").into_owned(),
        None => decoded.trim().to_string(),
    }
}

fn decode_entities(text: &str) -> String {
    text.replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&#x27;", "'")
        .replace("&amp;", "&")
}
