//! A polite, breadth-first web crawler engine: a two-priority work queue
//! bounded by a deduplicating visited set, per-host robots/crawl-delay
//! metadata computed at most once per host, and N worker tasks draining the
//! queue until the request budget or an explicit stop drains it dry.
//!
//! HTML parsing, wire-format parsing, and result storage are narrow traits
//! ([`extract::PageExtractor`], [`fetch::PageFetcher`], [`sink::Sink`]) with
//! default implementations good enough to crawl the open web; swap any of
//! them via [`engine::CrawlerBuilder`].

pub mod deque;
pub mod engine;
pub mod error;
pub mod extract;
pub mod feed;
pub mod fetch;
pub mod filter;
pub mod host_registry;
pub mod model;
pub mod ratelimit;
pub mod robots;
pub mod sink;
pub mod sitemap;
pub mod stats;
pub mod url_canon;
pub mod worker;

pub use engine::{CrawlConfig, CrawlReport, CrawlerBuilder, Engine};
pub use error::{CrawlError, Result};
pub use extract::{DefaultExtractor, ExtractedPage, PageExtractor};
pub use fetch::{BoxFuture, HttpFetcher, PageFetcher, RawPage};
pub use filter::{DomainAllowance, DomainConfig, DomainFilter, PathFilter};
pub use model::{CrawlCounters, CrawlCountersSnapshot, FetchedPage, HintMetadata, HostRecord, WorkItem, WorkKind};
pub use robots::RobotsPolicy;
pub use sink::{MemorySink, Sink};
pub use stats::{analyze_url_groups, DomainGroup};
pub use url_canon::{canonicalize, make_absolute, CanonicalUrl};
