//! Worker loop: pop, resolve host metadata, check robots, rate-limit,
//! fetch/dispatch by kind, account, repeat.
//!
//! Per-URL fetch or parse failures never escape the loop — they are logged
//! and counted (`errored`, `back_to_back_errors`). Only a [`crate::sink::Sink`]
//! failure is fatal.

use crate::engine::Engine;
use crate::error::CrawlError;
use crate::model::{HintMetadata, WorkItem, WorkKind};
use crate::url_canon::{canonicalize, make_absolute};
use tracing::{debug, warn};

enum WorkerError {
    Item(anyhow::Error),
    Fatal(CrawlError),
}

impl From<anyhow::Error> for WorkerError {
    fn from(err: anyhow::Error) -> Self {
        WorkerError::Item(err)
    }
}

type WorkerResult = Result<(), WorkerError>;

/// Drain the shared deque until a terminal sentinel or the request budget
/// stops the worker.
pub async fn run_worker(engine: Engine, name: String) {
    loop {
        let item = engine.deque().pop_right().await;
        if item.is_terminal() {
            debug!(worker = name.as_str(), "received terminal sentinel, exiting");
            break;
        }
        if engine.budget_exceeded().await {
            debug!(worker = name.as_str(), "request budget exceeded, exiting");
            break;
        }

        process_item(&engine, item).await;
    }
}

async fn process_item(engine: &Engine, item: WorkItem) {
    let Some(host_record) = engine.host_record(&item.url).await else {
        engine.mark_skipped().await;
        engine.check_terminate().await;
        return;
    };

    let path_and_query = item.url.path_and_query();
    if !host_record
        .robots
        .can_fetch(&engine.config().user_agent, &path_and_query)
    {
        engine.mark_skipped().await;
        engine.check_terminate().await;
        return;
    }

    engine.mark_requested().await;
    engine.rate_limiter().acquire().await;

    let result: WorkerResult = match item.kind {
        WorkKind::Html => handle_html(engine, &item).await,
        WorkKind::Sitemap => handle_sitemap(engine, &item).await,
        WorkKind::Feed => handle_feed(engine, &item).await,
        WorkKind::Terminal => unreachable!("terminal items are filtered before processing"),
    };

    match result {
        Ok(()) => engine.mark_succeeded().await,
        Err(WorkerError::Item(err)) => {
            warn!(url = item.url.as_str(), error = %err, "item failed");
            let back_to_back = engine.mark_errored().await;
            if back_to_back >= engine.config().max_back_to_back_errors {
                warn!("back-to-back error threshold reached, stopping crawl");
                engine.stop().await;
            }
        }
        Err(WorkerError::Fatal(err)) => {
            engine.set_fatal(err);
            engine.stop().await;
        }
    }

    engine.check_terminate().await;
}

async fn handle_html(engine: &Engine, item: &WorkItem) -> WorkerResult {
    let page = fetch_or_load(engine, item).await?;
    dispatch_html(engine, item, &page).await;
    Ok(())
}

/// Consult the sink's cache before fetching; assemble, enrich, and persist
/// the resulting page.
async fn fetch_or_load(engine: &Engine, item: &WorkItem) -> Result<crate::model::FetchedPage, WorkerError> {
    if let Some(cached) = engine
        .sink()
        .load_cached(item.url.as_str())
        .await
        .map_err(|e| WorkerError::Fatal(CrawlError::Sink(e)))?
    {
        return Ok(cached);
    }

    let raw = engine.fetcher().fetch(item.url.as_str()).await?;
    let extracted = engine.extractor().extract(&raw.final_url, &raw.content_bytes);

    let mut page = crate::model::FetchedPage {
        status_code: raw.status_code,
        url: raw.final_url,
        canonical_url: item.url.as_str().to_string(),
        hash: item.url.hash().to_string(),
        headers: raw.headers,
        content_bytes: raw.content_bytes,
        content_type: raw.content_type,
        charset: raw.charset,
        outlinks: extracted.outlinks,
        sitemap_links: extracted.sitemap_links,
        feed_links: extracted.feed_links,
        robots_meta: extracted.robots_meta,
        title: extracted.title,
        description: extracted.description,
        image_url: extracted.image_url,
        published_at: None,
        fetched_at: crate::fetch::now(),
        headless_browser: false,
    };

    if let Some(hint) = &item.hint_metadata {
        page.merge_hint(hint);
    }

    engine
        .sink()
        .on_page(&page)
        .await
        .map_err(|e| WorkerError::Fatal(CrawlError::Sink(e)))?;

    Ok(page)
}

/// Enqueue a fetched HTML page's discovered sitemap/feed/outlink hints.
/// Outlinks never carry hint metadata forward — only feed/sitemap-derived
/// items do.
async fn dispatch_html(engine: &Engine, item: &WorkItem, page: &crate::model::FetchedPage) {
    let config = engine.config();

    if config.follow_sitemap_links {
        for link in &page.sitemap_links {
            if let Ok(canon) = canonicalize(link) {
                let child = WorkItem::new(canon, WorkKind::Sitemap, item.remaining_depth);
                engine.enqueue(child, false).await;
            }
        }
    }

    if config.follow_feed_links {
        for link in &page.feed_links {
            if let Ok(canon) = canonicalize(link) {
                let child = WorkItem::new(canon, WorkKind::Feed, item.remaining_depth);
                engine.enqueue(child, false).await;
            }
        }
    }

    if config.follow_web_page_links && item.remaining_depth > 0 {
        for link in &page.outlinks {
            if let Ok(canon) = canonicalize(link) {
                let child = WorkItem::new(canon, WorkKind::Html, item.remaining_depth - 1);
                engine.enqueue(child, false).await;
            }
        }
    }
}

async fn handle_sitemap(engine: &Engine, item: &WorkItem) -> WorkerResult {
    let raw = engine.fetcher().fetch(item.url.as_str()).await?;
    let parsed = crate::sitemap::parse_sitemap(&raw.content_bytes);

    for page_url in &parsed.page_urls {
        if let Ok(canon) = make_absolute(item.url.as_str(), page_url) {
            let child = WorkItem::new(canon, WorkKind::Html, engine.config().max_depth);
            engine.enqueue(child, false).await;
        }
    }

    for nested_url in &parsed.sitemap_urls {
        if let Ok(canon) = make_absolute(item.url.as_str(), nested_url) {
            let child = WorkItem::new(canon, WorkKind::Sitemap, item.remaining_depth);
            engine.enqueue(child, false).await;
        }
    }

    Ok(())
}

async fn handle_feed(engine: &Engine, item: &WorkItem) -> WorkerResult {
    let raw = engine.fetcher().fetch(item.url.as_str()).await?;
    let parsed = crate::feed::parse_feed(&raw.content_bytes, raw.content_type.as_deref());

    for entry in parsed.items {
        let Some(link) = entry.link else { continue };
        let Ok(canon) = make_absolute(item.url.as_str(), &link) else {
            continue;
        };
        let hint = HintMetadata {
            title: entry.title,
            description: entry.description,
            published_at: entry.pub_date,
            image_url: None,
        };
        let child = WorkItem::new(canon, WorkKind::Html, engine.config().max_depth)
            .with_hint_metadata(Some(hint));
        engine.enqueue(child, false).await;
    }

    Ok(())
}
