//! HTML metadata/outlink extraction. HTML parsing is treated as an external
//! collaborator behind a narrow `PageExtractor` trait; this module supplies
//! that trait plus a default `scraper`-backed implementation.

use crate::url_canon::make_absolute;
use scraper::{Html, Selector};
use std::collections::HashSet;

/// File extensions that never belong in the HTML outlink graph.
const EXCLUDED_EXTENSIONS: &[&str] = &[
    ".css", ".js", ".png", ".jpg", ".jpeg", ".gif", ".svg", ".ico", ".pdf", ".zip", ".tar",
    ".gz", ".mp3", ".mp4", ".avi", ".mov", ".wmv", ".wav", ".flv", ".swf", ".exe", ".dmg",
    ".iso",
];

/// Structured content extracted from one fetched HTML document.
#[derive(Debug, Clone, Default)]
pub struct ExtractedPage {
    pub canonical_url: Option<String>,
    pub outlinks: Vec<String>,
    pub sitemap_links: Vec<String>,
    pub feed_links: Vec<String>,
    pub robots_meta: Vec<String>,
    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
}

/// Pure function over fetched bytes: outlinks, sitemap/feed hints, and page
/// metadata.
pub trait PageExtractor: Send + Sync {
    fn extract(&self, url: &str, content: &[u8]) -> ExtractedPage;
}

/// The default extractor.
#[derive(Debug, Default, Clone, Copy)]
pub struct DefaultExtractor;

impl PageExtractor for DefaultExtractor {
    fn extract(&self, url: &str, content: &[u8]) -> ExtractedPage {
        let text = String::from_utf8_lossy(content);
        let document = Html::parse_document(&text);

        let canonical_url = select_attr(&document, "link[rel=canonical]", "href")
            .and_then(|href| make_absolute(url, &href).ok())
            .map(|c| c.as_str().to_string());

        let robots_meta = select_attr(&document, "meta[name=robots]", "content")
            .map(|content| content.split_whitespace().map(str::to_string).collect())
            .unwrap_or_default();

        let sitemap_links = select_all_attrs(&document, "link[rel=sitemap]", "href")
            .into_iter()
            .filter_map(|href| make_absolute(url, &href).ok())
            .map(|c| c.as_str().to_string())
            .collect();

        let feed_links = select_all_attrs(&document, "link[rel=alternate]", "href")
            .into_iter()
            .filter_map(|href| make_absolute(url, &href).ok())
            .map(|c| c.as_str().to_string())
            .collect();

        let title = select_attr(&document, "meta[property='og:title']", "content")
            .or_else(|| select_text(&document, "title"));

        let description = select_attr(&document, "meta[property='og:description']", "content")
            .or_else(|| select_attr(&document, "meta[name=description]", "content"));

        let image_url = select_attr(&document, "meta[property='og:image']", "content")
            .and_then(|href| make_absolute(url, &href).ok())
            .map(|c| c.as_str().to_string());

        let outlinks = extract_outlinks(&document, url);

        ExtractedPage {
            canonical_url,
            outlinks,
            sitemap_links,
            feed_links,
            robots_meta,
            title,
            description,
            image_url,
        }
    }
}

fn extract_outlinks(document: &Html, base_url: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse("a[href]") else {
        return Vec::new();
    };
    let mut seen = HashSet::new();
    let mut outlinks = Vec::new();
    for element in document.select(&selector) {
        let Some(href) = element.value().attr("href") else {
            continue;
        };
        if is_excluded_href(href) {
            continue;
        }
        let Ok(absolute) = make_absolute(base_url, href) else {
            continue;
        };
        if seen.insert(absolute.as_str().to_string()) {
            outlinks.push(absolute.as_str().to_string());
        }
    }
    outlinks
}

/// Blank, `javascript:`, `mailto:`, fragment-only, and non-HTML-extension
/// hrefs never become outlinks.
fn is_excluded_href(href: &str) -> bool {
    let trimmed = href.trim();
    if trimmed.is_empty() {
        return true;
    }
    if trimmed.starts_with("javascript:") || trimmed.starts_with("mailto:") || trimmed.starts_with('#') {
        return true;
    }
    let path = trimmed.split(['?', '#']).next().unwrap_or(trimmed).to_lowercase();
    EXCLUDED_EXTENSIONS.iter().any(|ext| path.ends_with(ext))
}

fn select_attr(document: &Html, selector: &str, attr: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document
        .select(&selector)
        .next()
        .and_then(|el| el.value().attr(attr))
        .map(str::to_string)
}

fn select_all_attrs(document: &Html, selector: &str, attr: &str) -> Vec<String> {
    let Ok(selector) = Selector::parse(selector) else {
        return Vec::new();
    };
    document
        .select(&selector)
        .filter_map(|el| el.value().attr(attr))
        .map(str::to_string)
        .collect()
}

fn select_text(document: &Html, selector: &str) -> Option<String> {
    let selector = Selector::parse(selector).ok()?;
    document.select(&selector).next().map(|el| {
        el.text().collect::<Vec<_>>().join("").trim().to_string()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn extracts_title_and_outlinks() {
        let html = r#"<html><head><title>Hello</title></head>
            <body><a href="/x">x</a><a href="https://other.test/y">y</a></body></html>"#;
        let page = DefaultExtractor.extract("http://a.test/", html.as_bytes());
        assert_eq!(page.title.as_deref(), Some("Hello"));
        assert_eq!(page.outlinks, vec!["http://a.test/x", "https://other.test/y"]);
    }

    #[test]
    fn excludes_non_html_extensions_and_pseudo_links() {
        let html = r##"<html><body>
            <a href="/doc.pdf">pdf</a>
            <a href="javascript:void(0)">js</a>
            <a href="mailto:a@b.com">mail</a>
            <a href="#frag">frag</a>
            <a href="/keep">keep</a>
        </body></html>"##;
        let page = DefaultExtractor.extract("http://a.test/", html.as_bytes());
        assert_eq!(page.outlinks, vec!["http://a.test/keep"]);
    }

    #[test]
    fn extracts_sitemap_and_feed_hints() {
        let html = r#"<html><head>
            <link rel="sitemap" href="/sitemap.xml"/>
            <link rel="alternate" type="application/rss+xml" href="/feed.xml"/>
        </head><body></body></html>"#;
        let page = DefaultExtractor.extract("http://a.test/", html.as_bytes());
        assert_eq!(page.sitemap_links, vec!["http://a.test/sitemap.xml"]);
        assert_eq!(page.feed_links, vec!["http://a.test/feed.xml"]);
    }

    #[test]
    fn extracts_canonical_and_robots_meta() {
        let html = r#"<html><head>
            <link rel="canonical" href="https://a.test/canon"/>
            <meta name="robots" content="noindex nofollow"/>
        </head></html>"#;
        let page = DefaultExtractor.extract("http://a.test/x", html.as_bytes());
        assert_eq!(page.canonical_url.as_deref(), Some("https://a.test/canon"));
        assert_eq!(page.robots_meta, vec!["noindex", "nofollow"]);
    }
}
