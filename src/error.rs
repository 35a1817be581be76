//! Typed errors for the parts of the crawl engine that surface outside the
//! worker loop. Per-URL fetch/parse failures never escape as [`CrawlError`] —
//! they are counted and logged in place (see [`crate::worker`]). Only sink
//! failures and top-level setup failures reach a caller.

use thiserror::Error;

/// Errors that can terminate a crawl or fail engine construction.
#[derive(Debug, Error)]
pub enum CrawlError {
    /// The configured [`crate::sink::Sink`] raised an error from `on_page` or
    /// `load_cached`. This is fatal: the sink contract is "best-effort but
    /// correct", so a failing sink tears down the crawl rather than silently
    /// dropping pages.
    #[error("sink callback failed: {0}")]
    Sink(#[source] anyhow::Error),

    /// The engine could not be constructed from its configuration (e.g. the
    /// HTTP client failed to build, or a seed URL did not parse).
    #[error("engine construction failed: {0}")]
    Setup(#[source] anyhow::Error),
}

pub type Result<T> = std::result::Result<T, CrawlError>;
