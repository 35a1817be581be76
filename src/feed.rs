//! RSS 2.0 / Atom feed parsing: a pure function over bytes folding both
//! wire formats down to the same item shape.

use chrono::{DateTime, Utc};
use quick_xml::events::Event;
use quick_xml::reader::Reader;

#[derive(Debug, Clone, Default)]
pub struct FeedItem {
    pub title: Option<String>,
    pub link: Option<String>,
    pub description: Option<String>,
    pub pub_date: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default)]
pub struct ParsedFeed {
    pub items: Vec<FeedItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum FeedFormat {
    Rss,
    Atom,
}

/// Parse a feed document. `content_type` is consulted first (looking for
/// `rss` then `xml`); if it is inconclusive, the root element tag decides.
pub fn parse_feed(bytes: &[u8], content_type: Option<&str>) -> ParsedFeed {
    let format = content_type
        .and_then(|ct| {
            let lower = ct.to_lowercase();
            if lower.contains("rss") {
                Some(FeedFormat::Rss)
            } else if lower.contains("atom") {
                Some(FeedFormat::Atom)
            } else {
                None
            }
        })
        .unwrap_or_else(|| sniff_format(bytes));

    match format {
        FeedFormat::Rss => parse_rss(bytes),
        FeedFormat::Atom => parse_atom(bytes),
    }
}

fn sniff_format(bytes: &[u8]) -> FeedFormat {
    let head = String::from_utf8_lossy(&bytes[..bytes.len().min(512)]).to_lowercase();
    if head.contains("<feed") {
        FeedFormat::Atom
    } else {
        FeedFormat::Rss
    }
}

fn parse_rss(bytes: &[u8]) -> ParsedFeed {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "item" {
                    current = Some(FeedItem::default());
                }
                field = Some(name);
            }
            Ok(Event::End(e)) => {
                if local_name(e.name().as_ref()) == "item" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                field = None;
            }
            Ok(Event::Text(e)) => {
                if let (Some(item), Some(field_name)) = (current.as_mut(), field.as_deref()) {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match field_name {
                        "title" => item.title = Some(text),
                        "link" => item.link = Some(text),
                        "description" => item.description = Some(text),
                        "pubdate" => item.pub_date = parse_rfc2822(&text),
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    ParsedFeed { items }
}

fn parse_atom(bytes: &[u8]) -> ParsedFeed {
    let mut reader = Reader::from_reader(bytes);
    reader.trim_text(true);

    let mut items = Vec::new();
    let mut current: Option<FeedItem> = None;
    let mut field: Option<String> = None;
    let mut buf = Vec::new();

    loop {
        match reader.read_event_into(&mut buf) {
            Ok(Event::Start(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "entry" {
                    current = Some(FeedItem::default());
                }
                field = Some(name);
            }
            Ok(Event::Empty(e)) => {
                let name = local_name(e.name().as_ref());
                if name == "link" {
                    if let Some(item) = current.as_mut() {
                        let href = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"href")
                            .and_then(|a| a.unescape_value().ok())
                            .map(|v| v.into_owned());
                        let rel = e
                            .attributes()
                            .flatten()
                            .find(|a| a.key.as_ref() == b"rel")
                            .and_then(|a| a.unescape_value().ok());
                        let is_html_alternate = rel
                            .map(|r| r == "alternate" || r.is_empty())
                            .unwrap_or(true);
                        if item.link.is_none() || is_html_alternate {
                            item.link = href;
                        }
                    }
                }
            }
            Ok(Event::End(e)) => {
                if local_name(e.name().as_ref()) == "entry" {
                    if let Some(item) = current.take() {
                        items.push(item);
                    }
                }
                field = None;
            }
            Ok(Event::Text(e)) => {
                if let (Some(item), Some(field_name)) = (current.as_mut(), field.as_deref()) {
                    let text = e.unescape().unwrap_or_default().trim().to_string();
                    if text.is_empty() {
                        continue;
                    }
                    match field_name {
                        "title" => item.title = Some(text),
                        "summary" | "content" => {
                            if item.description.is_none() {
                                item.description = Some(text);
                            }
                        }
                        "published" => item.pub_date = parse_rfc3339(&text),
                        "updated" => {
                            if item.pub_date.is_none() {
                                item.pub_date = parse_rfc3339(&text);
                            }
                        }
                        _ => {}
                    }
                }
            }
            Ok(Event::Eof) => break,
            Err(_) => break,
            _ => {}
        }
        buf.clear();
    }

    ParsedFeed { items }
}

fn parse_rfc2822(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc2822(text).ok().map(|dt| dt.with_timezone(&Utc))
}

fn parse_rfc3339(text: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(text).ok().map(|dt| dt.with_timezone(&Utc))
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
    fn parses_rss_items() {
        let xml = br#"<rss><channel>
          <item><title>T1</title><link>https://a.test/e1</link><description>D1</description></item>
          <item><title>T2</title><link>https://a.test/e2</link></item>
        </channel></rss>"#;
        let feed = parse_feed(xml, Some("application/rss+xml"));
        assert_eq!(feed.items.len(), 2);
        assert_eq!(feed.items[0].title.as_deref(), Some("T1"));
        assert_eq!(feed.items[0].link.as_deref(), Some("https://a.test/e1"));
        assert_eq!(feed.items[1].description, None);
    }

    #[test]
    fn parses_atom_entries_preferring_alternate_link() {
        let xml = br#"<feed>
          <entry>
            <title>Atom Entry</title>
            <link rel="self" href="https://a.test/self"/>
            <link rel="alternate" href="https://a.test/e1"/>
            <summary>Summary text</summary>
            <published>2024-01-02T03:04:05Z</published>
          </entry>
        </feed>"#;
        let feed = parse_feed(xml, Some("application/atom+xml"));
        assert_eq!(feed.items.len(), 1);
        assert_eq!(feed.items[0].link.as_deref(), Some("https://a.test/e1"));
        assert_eq!(feed.items[0].description.as_deref(), Some("Summary text"));
        assert!(feed.items[0].pub_date.is_some());
    }

    #[test]
    fn sniffs_format_when_content_type_is_generic_xml() {
        let xml = br#"<feed><entry><title>X</title><link href="https://a.test/x"/></entry></feed>"#;
        let feed = parse_feed(xml, Some("text/xml"));
        assert_eq!(feed.items[0].title.as_deref(), Some("X"));
    }
}
