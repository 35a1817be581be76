//! Sitemap XML parsing: a pure function over bytes producing page URLs and
//! nested sitemap URLs, following the standard sitemaps.org protocol.

use quick_xml::events::Event;
use quick_xml::reader::Reader;

#[derive(Debug, Default, Clone)]
pub struct ParsedSitemap {
    pub page_urls: Vec<String>,
    pub sitemap_urls: Vec<String>,
}

/// Parse a `<urlset>` (leaf sitemap) or `<sitemapindex>` (nested sitemap
/// index) document. Both shapes use a `<loc>` child; which list a `<loc>`
/// lands in depends on whether it is nested under `<url>` or `<sitemap>`.
pub fn parse_sitemap(bytes: &[u8]) -> ParsedSitemap {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut result = ParsedSitemap::default();
    let mut buf = Vec::new();
    // Stack of enclosing element names so a `<loc>` can be attributed to
    // the right list regardless of namespace prefixing.
    let mut stack: Vec<String> = Vec::new();
    let mut in_loc = false;

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                in_loc = name == "loc";
                stack.push(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(e.name().as_ref());
                stack.push(name);
                stack.pop();
            }
            Ok(Event::End(_)) => {
                in_loc = false;
                stack.pop();
            }
            Ok(Event::Text(e)) => {
                if in_loc {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    if stack.iter().any(|s| s == "sitemap") {
                        result.sitemap_urls.push(text);
                    } else {
                        result.page_urls.push(text);
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    result
}

fn local_name(qname: &[u8]) -> String {
    let raw = String::from_utf8_lossy(qname);
    match raw.rsplit_once(':') {
        Some((_, local)) => local.to_lowercase(),
        None => raw.to_lowercase(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_urlset_pages() {
        let xml = br#"<?xml version="1.0"?>
        <urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
          <url><loc>https://a.test/p1</loc></url>
          <url><loc>https://a.test/p2</loc></url>
        </urlset>"#;
        let parsed = parse_sitemap(xml);
        assert_eq!(parsed.page_urls, vec!["https://a.test/p1", "https://a.test/p2"]);
        assert!(parsed.sitemap_urls.is_empty());
    }

    #[test]
    fn parses_nested_sitemap_index() {
        let xml = br#"<sitemapindex>
          <sitemap><loc>https://a.test/s1.xml</loc></sitemap>
          <sitemap><loc>https://a.test/s2.xml</loc></sitemap>
        </sitemapindex>"#;
        let parsed = parse_sitemap(xml);
        assert!(parsed.page_urls.is_empty());
        assert_eq!(parsed.sitemap_urls, vec!["https://a.test/s1.xml", "https://a.test/s2.xml"]);
    }

    #[test]
    fn malformed_xml_yields_empty_result_not_panic() {
        let parsed = parse_sitemap(b"<urlset><url><loc>unterminated");
        assert!(parsed.page_urls.is_empty() || parsed.page_urls.len() <= 1);
    }
}
