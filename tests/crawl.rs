//! End-to-end crawl scenarios run against an in-process fake
//! [`PageFetcher`] and [`MemorySink`] — no real network I/O.

use politecrawl::{BoxFuture, CrawlerBuilder, DomainAllowance, DomainConfig, MemorySink, PageFetcher, RawPage};
use std::collections::HashMap;
use std::sync::Arc;

#[derive(Clone)]
struct FixturePage {
    status: u16,
    content_type: Option<&'static str>,
    body: &'static str,
}

/// Serves a fixed map of URL -> response; anything else is a fetch error,
/// mirroring a real 404/connection-refused outcome.
struct FixtureFetcher {
    pages: HashMap<&'static str, FixturePage>,
}

impl FixtureFetcher {
    fn new(pages: Vec<(&'static str, FixturePage)>) -> Self {
        Self { pages: pages.into_iter().collect() }
    }
}

impl PageFetcher for FixtureFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, anyhow::Result<RawPage>> {
        Box::pin(async move {
            match self.pages.get(url) {
                Some(page) => Ok(RawPage {
                    status_code: page.status,
                    final_url: url.to_string(),
                    headers: HashMap::new(),
                    content_bytes: page.body.as_bytes().to_vec(),
                    content_type: page.content_type.map(str::to_string),
                    charset: None,
                }),
                None => Err(anyhow::anyhow!("no fixture registered for {url}")),
            }
        })
    }
}

fn html(status: u16, body: &'static str) -> FixturePage {
    FixturePage { status, content_type: Some("text/html"), body }
}

fn xml(status: u16, body: &'static str) -> FixturePage {
    FixturePage { status, content_type: Some("application/xml"), body }
}

fn rss(status: u16, body: &'static str) -> FixturePage {
    FixturePage { status, content_type: Some("application/rss+xml"), body }
}

#[tokio::test]
async fn single_host_crawl_visits_all_reachable_pages() {
    let fetcher = FixtureFetcher::new(vec![
        ("http://a.test/", html(200, r#"<html><body>
            <a href="/page1">one</a>
            <a href="/page2">two</a>
        </body></html>"#)),
        ("http://a.test/page1", html(200, "<html><body>leaf</body></html>")),
        ("http://a.test/page2", html(200, "<html><body>leaf</body></html>")),
    ]);

    let sink = Arc::new(MemorySink::new());
    let engine = CrawlerBuilder::new()
        .with_seed_urls(vec!["http://a.test/".to_string()])
        .with_fetcher(Arc::new(fetcher))
        .with_sink(sink.clone())
        .with_crawl_delay_seconds(0)
        .build()
        .unwrap();

    let report = engine.run().await.unwrap();

    assert_eq!(report.counters.succeeded, 3);
    assert_eq!(report.counters.errored, 0);
    assert_eq!(sink.len().await, 3);
    assert!(sink.get("http://a.test/page1").await.is_some());
    assert!(sink.get("http://a.test/page2").await.is_some());
}

#[tokio::test]
async fn robots_disallow_skips_matching_paths() {
    let fetcher = FixtureFetcher::new(vec![
        ("http://a.test/", html(200, r#"<html><body>
            <a href="/private">secret</a>
            <a href="/public">open</a>
        </body></html>"#)),
        ("http://a.test/robots.txt", html(200, "User-agent: *\nDisallow: /private\n")),
        ("http://a.test/private", html(200, "<html><body>should never be fetched</body></html>")),
        ("http://a.test/public", html(200, "<html><body>leaf</body></html>")),
    ]);

    let sink = Arc::new(MemorySink::new());
    let engine = CrawlerBuilder::new()
        .with_seed_urls(vec!["http://a.test/".to_string()])
        .with_fetcher(Arc::new(fetcher))
        .with_sink(sink.clone())
        .with_crawl_delay_seconds(0)
        .build()
        .unwrap();

    let report = engine.run().await.unwrap();

    assert!(report.counters.skipped >= 1);
    assert!(sink.get("http://a.test/public").await.is_some());
    assert!(sink.get("http://a.test/private").await.is_none());
}

#[tokio::test]
async fn domain_filter_derived_from_seeds_excludes_other_hosts() {
    let fetcher = FixtureFetcher::new(vec![
        ("http://a.test/", html(200, r#"<html><body>
            <a href="/local">local</a>
            <a href="https://b.test/other">external</a>
        </body></html>"#)),
        ("http://a.test/local", html(200, "<html><body>leaf</body></html>")),
    ]);

    let sink = Arc::new(MemorySink::new());
    let engine = CrawlerBuilder::new()
        .with_seed_urls(vec!["http://a.test/".to_string()])
        .with_domain_config(DomainConfig { forbidden_domains: vec![], allowance: DomainAllowance::DeriveFromSeeds })
        .with_fetcher(Arc::new(fetcher))
        .with_sink(sink.clone())
        .with_crawl_delay_seconds(0)
        .build()
        .unwrap();

    let report = engine.run().await.unwrap();

    assert_eq!(report.counters.errored, 0);
    assert_eq!(sink.len().await, 2);
    assert!(sink.get("https://b.test/other").await.is_none());
}

#[tokio::test]
async fn sitemap_discovered_via_robots_is_expanded() {
    let fetcher = FixtureFetcher::new(vec![
        ("http://a.test/", html(200, "<html><body>no links here</body></html>")),
        (
            "http://a.test/robots.txt",
            html(200, "User-agent: *\nAllow: /\nSitemap: http://a.test/sitemap.xml\n"),
        ),
        (
            "http://a.test/sitemap.xml",
            xml(
                200,
                r#"<urlset xmlns="http://www.sitemaps.org/schemas/sitemap/0.9">
                  <url><loc>http://a.test/from-sitemap-1</loc></url>
                  <url><loc>http://a.test/from-sitemap-2</loc></url>
                </urlset>"#,
            ),
        ),
        ("http://a.test/from-sitemap-1", html(200, "<html><body>leaf</body></html>")),
        ("http://a.test/from-sitemap-2", html(200, "<html><body>leaf</body></html>")),
    ]);

    let sink = Arc::new(MemorySink::new());
    let engine = CrawlerBuilder::new()
        .with_seed_urls(vec!["http://a.test/".to_string()])
        .with_fetcher(Arc::new(fetcher))
        .with_sink(sink.clone())
        .with_crawl_delay_seconds(0)
        .build()
        .unwrap();

    let report = engine.run().await.unwrap();

    assert_eq!(report.counters.errored, 0);
    assert_eq!(sink.len().await, 3);
    assert!(sink.get("http://a.test/from-sitemap-1").await.is_some());
    assert!(sink.get("http://a.test/from-sitemap-2").await.is_some());
}

#[tokio::test]
async fn feed_hint_metadata_fills_in_missing_page_title() {
    let fetcher = FixtureFetcher::new(vec![
        (
            "http://a.test/",
            html(200, r#"<html><head>
                <link rel="alternate" type="application/rss+xml" href="/feed.xml"/>
            </head><body></body></html>"#),
        ),
        (
            "http://a.test/feed.xml",
            rss(
                200,
                r#"<rss><channel>
                  <item><title>Feed Title</title><link>http://a.test/entry1</link></item>
                </channel></rss>"#,
            ),
        ),
        // No <title> in the page itself, so the feed hint should win.
        ("http://a.test/entry1", html(200, "<html><body>no title here</body></html>")),
    ]);

    let sink = Arc::new(MemorySink::new());
    let engine = CrawlerBuilder::new()
        .with_seed_urls(vec!["http://a.test/".to_string()])
        .with_fetcher(Arc::new(fetcher))
        .with_sink(sink.clone())
        .with_crawl_delay_seconds(0)
        .build()
        .unwrap();

    let report = engine.run().await.unwrap();

    assert_eq!(report.counters.errored, 0);
    let entry = sink.get("http://a.test/entry1").await.expect("entry1 fetched");
    assert_eq!(entry.title.as_deref(), Some("Feed Title"));
}

#[tokio::test]
async fn back_to_back_errors_threshold_stops_the_crawl() {
    let fetcher = FixtureFetcher::new(vec![
        (
            "http://a.test/",
            html(200, r#"<html><body>
                <a href="/broken1">b1</a>
                <a href="/broken2">b2</a>
                <a href="/broken3">b3</a>
            </body></html>"#),
        ),
        // broken1/2/3 are deliberately absent from the fixture map, so each
        // fetch fails.
    ]);

    let sink = Arc::new(MemorySink::new());
    let engine = CrawlerBuilder::new()
        .with_seed_urls(vec!["http://a.test/".to_string()])
        .with_fetcher(Arc::new(fetcher))
        .with_sink(sink.clone())
        .with_crawl_delay_seconds(0)
        .with_max_parallel_requests(1)
        .with_max_back_to_back_errors(2)
        .build()
        .unwrap();

    let report = engine.run().await.unwrap();

    assert_eq!(report.counters.succeeded, 1);
    assert_eq!(report.counters.errored, 2);
}
