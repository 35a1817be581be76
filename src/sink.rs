//! The `Sink` boundary: result storage is out of scope for this core.
//! `on_page` failures are fatal — the sink contract is best-effort but
//! correct; silent drops are not acceptable.

use crate::fetch::BoxFuture;
use crate::model::FetchedPage;
use anyhow::Result;
use std::collections::HashMap;
use tokio::sync::Mutex;

pub trait Sink: Send + Sync {
    fn on_page<'a>(&'a self, page: &'a FetchedPage) -> BoxFuture<'a, Result<()>>;

    /// Best-effort cache lookup consulted before a fetch. Returning `None`
    /// always is a valid implementation — it simply disables caching.
    fn load_cached<'a>(&'a self, _url: &'a str) -> BoxFuture<'a, Result<Option<FetchedPage>>> {
        Box::pin(async { Ok(None) })
    }
}

/// An in-memory sink keyed by canonical URL, keeping every page fetched
/// during a crawl. Also serves as the default cache source for
/// `load_cached`, doubling as both store and cache.
#[derive(Default)]
pub struct MemorySink {
    pages: Mutex<HashMap<String, FetchedPage>>,
}

impl MemorySink {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn pages(&self) -> HashMap<String, FetchedPage> {
        self.pages.lock().await.clone()
    }

    pub async fn get(&self, canonical_url: &str) -> Option<FetchedPage> {
        self.pages.lock().await.get(canonical_url).cloned()
    }

    pub async fn len(&self) -> usize {
        self.pages.lock().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.pages.lock().await.is_empty()
    }
}

impl Sink for MemorySink {
    fn on_page<'a>(&'a self, page: &'a FetchedPage) -> BoxFuture<'a, Result<()>> {
        Box::pin(async move {
            self.pages
                .lock()
                .await
                .insert(page.canonical_url.clone(), page.clone());
            Ok(())
        })
    }

    fn load_cached<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<Option<FetchedPage>>> {
        Box::pin(async move { Ok(self.pages.lock().await.get(url).cloned()) })
    }
}
