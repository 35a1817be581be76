//! Lifecycle orchestration: seed injection, worker fan-out, termination
//! detection, stats aggregation.

use crate::deque::WorkDeque;
use crate::error::CrawlError;
use crate::extract::{DefaultExtractor, PageExtractor};
use crate::fetch::{HttpFetcher, PageFetcher};
use crate::filter::{DomainConfig, DomainFilter, PathFilter};
use crate::host_registry::{host_record_from_robots, HostRegistry};
use crate::model::{CrawlCounters, CrawlCountersSnapshot, HostRecord, WorkItem, WorkKind};
use crate::ratelimit::RateLimiter;
use crate::robots::RobotsPolicy;
use crate::sink::{MemorySink, Sink};
use crate::stats::{analyze_url_groups, DomainGroup};
use crate::url_canon::canonicalize;
use anyhow::{bail, Context, Result as AnyResult};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;
use tracing::{info, warn};

const DEFAULT_USER_AGENT: &str = "PoliteCrawl/0.1";
const DEFAULT_REFERER: &str = "https://www.google.com";

/// Configuration recognized by the engine.
pub struct CrawlConfig {
    pub seed_urls: Vec<String>,
    pub max_parallel_requests: usize,
    pub use_headless_browser: bool,
    pub request_timeout: Duration,
    pub follow_web_page_links: bool,
    pub follow_sitemap_links: bool,
    pub follow_feed_links: bool,
    pub max_requested_urls: usize,
    pub max_back_to_back_errors: usize,
    pub max_depth: usize,
    pub crawl_delay: Duration,
    pub domain_config: DomainConfig,
    pub include_path_patterns: Vec<String>,
    pub exclude_path_patterns: Vec<String>,
    pub user_agent: String,
    pub referer: String,
}

impl Default for CrawlConfig {
    fn default() -> Self {
        Self {
            seed_urls: Vec::new(),
            max_parallel_requests: 16,
            use_headless_browser: false,
            request_timeout: Duration::from_secs(30),
            follow_web_page_links: true,
            follow_sitemap_links: true,
            follow_feed_links: true,
            max_requested_urls: 64 * 1024,
            max_back_to_back_errors: 128,
            max_depth: 16,
            crawl_delay: Duration::from_secs(1),
            domain_config: DomainConfig::default(),
            include_path_patterns: Vec::new(),
            exclude_path_patterns: Vec::new(),
            user_agent: DEFAULT_USER_AGENT.to_string(),
            referer: DEFAULT_REFERER.to_string(),
        }
    }
}

/// Builder for [`Engine`]: one `with_*` method per configuration option,
/// consuming `self`.
#[derive(Default)]
pub struct CrawlerBuilder {
    config: CrawlConfig,
    fetcher: Option<Arc<dyn PageFetcher>>,
    extractor: Option<Arc<dyn PageExtractor>>,
    sink: Option<Arc<dyn Sink>>,
}

impl CrawlerBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_seed_urls(mut self, seed_urls: Vec<String>) -> Self {
        self.config.seed_urls = seed_urls;
        self
    }

    pub fn with_max_parallel_requests(mut self, n: usize) -> Self {
        self.config.max_parallel_requests = n.max(1);
        self
    }

    /// Selects browser fetcher vs. HTTP fetcher. Headless fetching itself is
    /// out of scope for this core; setting this without also calling
    /// [`Self::with_fetcher`] logs a warning and falls back to the default
    /// HTTP fetcher.
    pub fn with_use_headless_browser(mut self, enabled: bool) -> Self {
        self.config.use_headless_browser = enabled;
        self
    }

    pub fn with_request_timeout_seconds(mut self, seconds: u64) -> Self {
        self.config.request_timeout = Duration::from_secs(seconds);
        self
    }

    pub fn with_follow_web_page_links(mut self, enabled: bool) -> Self {
        self.config.follow_web_page_links = enabled;
        self
    }

    pub fn with_follow_sitemap_links(mut self, enabled: bool) -> Self {
        self.config.follow_sitemap_links = enabled;
        self
    }

    pub fn with_follow_feed_links(mut self, enabled: bool) -> Self {
        self.config.follow_feed_links = enabled;
        self
    }

    pub fn with_max_requested_urls(mut self, n: usize) -> Self {
        self.config.max_requested_urls = n;
        self
    }

    pub fn with_max_back_to_back_errors(mut self, n: usize) -> Self {
        self.config.max_back_to_back_errors = n;
        self
    }

    pub fn with_max_depth(mut self, depth: usize) -> Self {
        self.config.max_depth = depth;
        self
    }

    pub fn with_crawl_delay_seconds(mut self, seconds: u64) -> Self {
        self.config.crawl_delay = Duration::from_secs(seconds);
        self
    }

    pub fn with_domain_config(mut self, domain_config: DomainConfig) -> Self {
        self.config.domain_config = domain_config;
        self
    }

    pub fn with_include_path_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.include_path_patterns = patterns;
        self
    }

    pub fn with_exclude_path_patterns(mut self, patterns: Vec<String>) -> Self {
        self.config.exclude_path_patterns = patterns;
        self
    }

    pub fn with_user_agent<S: AsRef<str>>(mut self, user_agent: S) -> Self {
        self.config.user_agent = user_agent.as_ref().to_string();
        self
    }

    pub fn with_referer<S: AsRef<str>>(mut self, referer: S) -> Self {
        self.config.referer = referer.as_ref().to_string();
        self
    }

    /// Override the default `reqwest`-based [`PageFetcher`] — the only
    /// supported way to plug in a headless-browser fetcher.
    pub fn with_fetcher(mut self, fetcher: Arc<dyn PageFetcher>) -> Self {
        self.fetcher = Some(fetcher);
        self
    }

    pub fn with_extractor(mut self, extractor: Arc<dyn PageExtractor>) -> Self {
        self.extractor = Some(extractor);
        self
    }

    pub fn with_sink(mut self, sink: Arc<dyn Sink>) -> Self {
        self.sink = Some(sink);
        self
    }

    pub fn build(self) -> AnyResult<Engine> {
        Engine::from_parts(self.config, self.fetcher, self.extractor, self.sink)
    }
}

struct EngineState {
    visited: HashSet<String>,
    counters: CrawlCounters,
}

/// Aggregated result of a crawl.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
pub struct CrawlReport {
    pub counters: CrawlCountersSnapshot,
    pub domain_groups: Vec<DomainGroup>,
}

impl CrawlReport {
    /// Serialize the report for a logging/reporting sidecar — the engine
    /// itself never writes this anywhere (result storage is a `Sink`
    /// concern).
    pub fn to_json(&self) -> serde_json::Result<String> {
        serde_json::to_string(self)
    }
}

struct EngineInner {
    config: CrawlConfig,
    fetcher: Arc<dyn PageFetcher>,
    extractor: Arc<dyn PageExtractor>,
    sink: Arc<dyn Sink>,
    deque: WorkDeque,
    host_registry: HostRegistry,
    rate_limiter: RateLimiter,
    domain_filter: DomainFilter,
    include_filter: PathFilter,
    exclude_filter: PathFilter,
    state: Mutex<EngineState>,
    fatal: std::sync::Mutex<Option<CrawlError>>,
    stopped: AtomicBool,
    /// Any already-canonicalized URL, used only as the inert payload of a
    /// terminal sentinel.
    placeholder_url: crate::url_canon::CanonicalUrl,
}

/// The crawl engine. Cheaply `Clone`-able (an `Arc` around its state) so
/// each spawned worker can hold its own handle.
#[derive(Clone)]
pub struct Engine(Arc<EngineInner>);

impl Engine {
    fn from_parts(
        config: CrawlConfig,
        fetcher: Option<Arc<dyn PageFetcher>>,
        extractor: Option<Arc<dyn PageExtractor>>,
        sink: Option<Arc<dyn Sink>>,
    ) -> AnyResult<Self> {
        if config.seed_urls.is_empty() {
            bail!("at least one seed URL is required");
        }
        if config.use_headless_browser && fetcher.is_none() {
            warn!("use_headless_browser set without a custom fetcher; falling back to the HTTP fetcher");
        }

        let placeholder_url = canonicalize(&config.seed_urls[0])
            .with_context(|| format!("invalid seed URL: {}", config.seed_urls[0]))?;

        let domain_filter = DomainFilter::new(&config.domain_config, &config.seed_urls);
        let include_filter = PathFilter::new(&config.include_path_patterns, true);
        let exclude_filter = PathFilter::new(&config.exclude_path_patterns, false);

        let fetcher = match fetcher {
            Some(f) => f,
            None => Arc::new(HttpFetcher::new(
                &config.user_agent,
                &config.referer,
                config.request_timeout,
            )?),
        };
        let extractor = extractor.unwrap_or_else(|| Arc::new(DefaultExtractor));
        let sink = sink.unwrap_or_else(|| Arc::new(MemorySink::new()) as Arc<dyn Sink>);

        let rate_limiter = RateLimiter::new(config.crawl_delay);

        let inner = EngineInner {
            config,
            fetcher,
            extractor,
            sink,
            deque: WorkDeque::new(),
            host_registry: HostRegistry::new(),
            rate_limiter,
            domain_filter,
            include_filter,
            exclude_filter,
            state: Mutex::new(EngineState {
                visited: HashSet::new(),
                counters: CrawlCounters::default(),
            }),
            fatal: std::sync::Mutex::new(None),
            stopped: AtomicBool::new(false),
            placeholder_url,
        };

        Ok(Engine(Arc::new(inner)))
    }

    pub fn config(&self) -> &CrawlConfig {
        &self.0.config
    }

    pub(crate) fn fetcher(&self) -> &Arc<dyn PageFetcher> {
        &self.0.fetcher
    }

    pub(crate) fn extractor(&self) -> &Arc<dyn PageExtractor> {
        &self.0.extractor
    }

    pub(crate) fn sink(&self) -> &Arc<dyn Sink> {
        &self.0.sink
    }

    pub(crate) fn deque(&self) -> &WorkDeque {
        &self.0.deque
    }

    pub(crate) fn rate_limiter(&self) -> &RateLimiter {
        &self.0.rate_limiter
    }

    /// Run the crawl to completion: seed, fan out workers, await them, and
    /// return the aggregated report.
    pub async fn run(&self) -> Result<CrawlReport, CrawlError> {
        for seed in self.0.config.seed_urls.clone() {
            match canonicalize(&seed) {
                Ok(canonical) => {
                    let item = WorkItem::new(canonical, WorkKind::Html, self.0.config.max_depth);
                    self.enqueue(item, true).await;
                }
                Err(err) => warn!(seed = seed.as_str(), error = %err, "invalid seed URL, skipping"),
            }
        }

        let mut handles = Vec::with_capacity(self.0.config.max_parallel_requests);
        for i in 0..self.0.config.max_parallel_requests {
            let engine = self.clone();
            handles.push(tokio::spawn(async move {
                crate::worker::run_worker(engine, format!("worker-{i}")).await;
            }));
        }

        for handle in handles {
            if let Err(join_err) = handle.await {
                warn!(error = %join_err, "a crawl worker task panicked");
            }
        }

        if let Some(err) = self.0.fatal.lock().expect("fatal mutex poisoned").take() {
            return Err(err);
        }

        let (snapshot, visited_urls) = {
            let state = self.0.state.lock().await;
            (state.counters.snapshot(), state.visited.iter().cloned().collect::<Vec<_>>())
        };
        let domain_groups = analyze_url_groups(&visited_urls, 5);

        Ok(CrawlReport { counters: snapshot, domain_groups })
    }

    /// Enqueue path: dedup, domain/path filters, priority placement.
    /// `skip_path_filter` is set for seeds.
    pub(crate) async fn enqueue(&self, item: WorkItem, skip_path_filter: bool) {
        if item.kind == WorkKind::Sitemap && !self.0.config.follow_sitemap_links {
            return;
        }
        if item.kind == WorkKind::Feed && !self.0.config.follow_feed_links {
            return;
        }

        let Some(netloc) = item.url.netloc() else {
            return;
        };

        {
            let mut state = self.0.state.lock().await;
            if state.visited.contains(item.url.as_str()) {
                return;
            }
            if !self.0.domain_filter.is_allowed(&netloc) {
                return;
            }
            if item.kind == WorkKind::Html && !skip_path_filter {
                let path = item.url.path_and_query();
                let excluded = self.0.exclude_filter.is_passing(&path);
                let included = self.0.include_filter.is_passing(&path);
                if excluded || !included {
                    return;
                }
            }
            state.visited.insert(item.url.as_str().to_string());
            state.counters.queued.increment();
        }

        self.0.deque.push(item).await;
    }

    /// Compute-once-per-host robots policy + effective crawl delay, then
    /// resets the rate limiter and enqueues advertised sitemaps (subject to
    /// the sitemap-follow flag).
    pub(crate) async fn host_record(&self, url: &crate::url_canon::CanonicalUrl) -> Option<HostRecord> {
        let host_key = url.host_key()?;
        let robots_url = url.robots_txt_url()?;
        let user_agent = self.0.config.user_agent.clone();
        let configured_delay = self.0.config.crawl_delay.as_secs();
        let fetcher = self.0.fetcher.clone();
        let warn_robots_url = robots_url.clone();
        let follow_sitemap_links = self.0.config.follow_sitemap_links;
        let max_depth = self.0.config.max_depth;
        let engine = self.clone();

        let record = self
            .0
            .host_registry
            .get_or_compute(&host_key, move || async move {
                let policy = match fetcher.fetch(&robots_url).await {
                    Ok(raw) => {
                        let body = String::from_utf8_lossy(&raw.content_bytes).to_string();
                        RobotsPolicy::from_http(raw.status_code, Some(&body))
                    }
                    Err(err) => {
                        warn!(url = warn_robots_url.as_str(), error = %err, "robots.txt fetch failed, defaulting to allow-all");
                        RobotsPolicy::allow_all()
                    }
                };
                let record = host_record_from_robots(policy, &user_agent, configured_delay);

                // This closure only ever runs once per host (single-flight
                // via `get_or_compute`), so installing the record and
                // resetting the rate limiter/enqueuing sitemaps here means
                // they also happen exactly once per host.
                engine
                    .rate_limiter()
                    .reset(Duration::from_secs(record.effective_crawl_delay))
                    .await;

                if follow_sitemap_links {
                    for sitemap_url in &record.robots.sitemap_urls {
                        if let Ok(canonical) = canonicalize(sitemap_url) {
                            let item = WorkItem::new(canonical, WorkKind::Sitemap, max_depth);
                            engine.enqueue(item, false).await;
                        }
                    }
                }

                record
            })
            .await;

        Some(record)
    }

    pub(crate) async fn mark_requested(&self) {
        self.0.state.lock().await.counters.requested.increment();
    }

    pub(crate) async fn mark_skipped(&self) {
        self.0.state.lock().await.counters.skipped.increment();
    }

    pub(crate) async fn mark_succeeded(&self) {
        let state = self.0.state.lock().await;
        state.counters.succeeded.increment();
        state.counters.back_to_back_errors.reset();
    }

    pub(crate) async fn mark_errored(&self) -> usize {
        let state = self.0.state.lock().await;
        state.counters.errored.increment();
        state.counters.back_to_back_errors.increment()
    }

    pub(crate) async fn budget_exceeded(&self) -> bool {
        let state = self.0.state.lock().await;
        state.counters.requested.get() >= self.0.config.max_requested_urls
    }

    /// Advisory quiescence check: a racing enqueue merely defers termination
    /// to the next iteration.
    pub(crate) async fn check_terminate(&self) {
        let quiescent = {
            let state = self.0.state.lock().await;
            state.counters.is_quiescent()
        };
        if quiescent {
            self.stop().await;
        }
    }

    pub(crate) fn set_fatal(&self, err: CrawlError) {
        let mut fatal = self.0.fatal.lock().expect("fatal mutex poisoned");
        if fatal.is_none() {
            *fatal = Some(err);
        }
    }

    /// Push one terminal sentinel per worker. Safe to call more than once —
    /// the flag only affects logging.
    pub async fn stop(&self) {
        if !self.0.stopped.swap(true, Ordering::SeqCst) {
            info!("stopping crawl: pushing terminal sentinels");
        }
        for _ in 0..self.0.config.max_parallel_requests {
            let sentinel = WorkItem::terminal(self.0.placeholder_url.clone());
            self.0.deque.push_right(sentinel).await;
        }
    }
}
