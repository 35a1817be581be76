//! Core data model: `WorkItem`, `FetchedPage`, `HostRecord`, `CrawlCounters`.

use crate::robots::RobotsPolicy;
use crate::url_canon::CanonicalUrl;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

/// The kind of resource a [`WorkItem`] refers to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WorkKind {
    Html,
    Sitemap,
    Feed,
    /// Unblocks exactly one worker's blocking pop so it can exit.
    Terminal,
}

/// Metadata carried forward from a feed or sitemap entry into the resulting
/// page record when the page itself does not supply an equivalent field;
/// page values always take precedence, see [`crate::worker`].
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct HintMetadata {
    pub title: Option<String>,
    pub description: Option<String>,
    pub published_at: Option<DateTime<Utc>>,
    pub image_url: Option<String>,
}

/// The unit of queued work.
#[derive(Debug, Clone)]
pub struct WorkItem {
    pub url: CanonicalUrl,
    pub kind: WorkKind,
    /// 0 means "fetch but do not follow outlinks".
    pub remaining_depth: usize,
    pub high_priority: bool,
    pub hint_metadata: Option<HintMetadata>,
}

impl WorkItem {
    pub fn new(url: CanonicalUrl, kind: WorkKind, remaining_depth: usize) -> Self {
        let high_priority = matches!(kind, WorkKind::Sitemap | WorkKind::Feed | WorkKind::Terminal);
        Self {
            url,
            kind,
            remaining_depth,
            high_priority,
            hint_metadata: None,
        }
    }

    pub fn with_high_priority(mut self, high_priority: bool) -> Self {
        self.high_priority = high_priority;
        self
    }

    pub fn with_hint_metadata(mut self, hint: Option<HintMetadata>) -> Self {
        self.hint_metadata = hint;
        self
    }

    /// A terminal sentinel carries no meaningful URL; it exists only to
    /// unblock a worker's `pop_right`.
    pub fn terminal(placeholder: CanonicalUrl) -> Self {
        WorkItem {
            url: placeholder,
            kind: WorkKind::Terminal,
            remaining_depth: 0,
            high_priority: true,
            hint_metadata: None,
        }
    }

    pub fn is_terminal(&self) -> bool {
        self.kind == WorkKind::Terminal
    }

    /// Items that enter the deque's right (priority) side: terminal
    /// sentinels, sitemaps, feeds, or anything explicitly marked
    /// high-priority.
    pub fn enters_priority_side(&self) -> bool {
        matches!(self.kind, WorkKind::Feed | WorkKind::Sitemap | WorkKind::Terminal)
            || self.high_priority
    }
}

/// Result of fetching an HTML resource.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FetchedPage {
    pub status_code: u16,
    pub url: String,
    pub canonical_url: String,
    pub hash: String,

    pub headers: HashMap<String, String>,
    pub content_bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub charset: Option<String>,

    pub outlinks: Vec<String>,
    pub sitemap_links: Vec<String>,
    pub feed_links: Vec<String>,
    /// Tokens from an HTML `<meta name="robots">` tag, carried through for
    /// downstream consumers; this core does not act on them.
    pub robots_meta: Vec<String>,

    pub title: Option<String>,
    pub description: Option<String>,
    pub image_url: Option<String>,
    pub published_at: Option<DateTime<Utc>>,

    pub fetched_at: DateTime<Utc>,

    /// Which fetcher produced this page — diagnostic only.
    pub headless_browser: bool,
}

impl FetchedPage {
    /// Fold `hint` into this page: page-supplied fields always win.
    pub fn merge_hint(&mut self, hint: &HintMetadata) {
        if self.title.is_none() {
            self.title = hint.title.clone();
        }
        if self.description.is_none() {
            self.description = hint.description.clone();
        }
        if self.image_url.is_none() {
            self.image_url = hint.image_url.clone();
        }
        if self.published_at.is_none() {
            self.published_at = hint.published_at;
        }
    }
}

/// Per-host cached record: robots policy plus the effective crawl delay
/// derived from it.
#[derive(Debug, Clone)]
pub struct HostRecord {
    pub robots: RobotsPolicy,
    pub effective_crawl_delay: u64,
}

/// Monotonically non-decreasing crawl counters. Invariant:
/// `succeeded + errored + skipped <= requested <= queued`.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct CrawlCounters {
    pub queued: AtomicCounter,
    pub requested: AtomicCounter,
    pub succeeded: AtomicCounter,
    pub skipped: AtomicCounter,
    pub errored: AtomicCounter,
    pub back_to_back_errors: AtomicCounter,
}

impl CrawlCounters {
    pub fn snapshot(&self) -> CrawlCountersSnapshot {
        CrawlCountersSnapshot {
            queued: self.queued.get(),
            requested: self.requested.get(),
            succeeded: self.succeeded.get(),
            skipped: self.skipped.get(),
            errored: self.errored.get(),
        }
    }

    pub fn is_quiescent(&self) -> bool {
        let done = self.succeeded.get() + self.errored.get() + self.skipped.get();
        done >= self.queued.get()
    }
}

/// A plain-integer snapshot of [`CrawlCounters`] suitable for returning to
/// the caller.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize)]
pub struct CrawlCountersSnapshot {
    pub queued: usize,
    pub requested: usize,
    pub succeeded: usize,
    pub skipped: usize,
    pub errored: usize,
}

/// A `usize` counter shared across workers without a dedicated mutex — the
/// counters live behind the same lock as the visited set in
/// [`crate::engine::EngineState`], but are typed as atomics so a reader
/// (e.g. `is_quiescent`) never needs to reacquire it for a stale read.
#[derive(Debug, Default)]
pub struct AtomicCounter(AtomicUsize);

impl AtomicCounter {
    pub fn get(&self) -> usize {
        self.0.load(Ordering::SeqCst)
    }

    pub fn increment(&self) -> usize {
        self.0.fetch_add(1, Ordering::SeqCst) + 1
    }

    pub fn reset(&self) {
        self.0.store(0, Ordering::SeqCst);
    }
}

impl Serialize for AtomicCounter {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        serializer.serialize_u64(self.get() as u64)
    }
}

impl<'de> Deserialize<'de> for AtomicCounter {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        let value = u64::deserialize(deserializer)?;
        Ok(AtomicCounter(AtomicUsize::new(value as usize)))
    }
}
