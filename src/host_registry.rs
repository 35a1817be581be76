//! Compute-once-per-host record holding robots policy and effective crawl
//! delay. Concurrent callers for the same host coalesce onto a single
//! in-flight computation, routed through a single coordinator that either
//! returns the cached record or starts the computation.
//!
//! `tokio::sync::OnceCell::get_or_init` already gives single-flight
//! semantics for free: the first caller to reach a host's cell runs the
//! initializer, everyone else awaits its result. No dedicated actor task is
//! needed.

use crate::model::HostRecord;
use crate::robots::RobotsPolicy;
use std::collections::HashMap;
use std::future::Future;
use std::sync::Arc;
use tokio::sync::{Mutex, OnceCell};
use tracing::info;

pub struct HostRegistry {
    cells: Mutex<HashMap<String, Arc<OnceCell<HostRecord>>>>,
}

impl Default for HostRegistry {
    fn default() -> Self {
        Self::new()
    }
}

impl HostRegistry {
    pub fn new() -> Self {
        Self {
            cells: Mutex::new(HashMap::new()),
        }
    }

    /// Return the host's record, computing it at most once via `fetch`.
    /// `fetch` is only invoked for the first caller of a given `host_key`;
    /// later callers (concurrent or not) observe the same result.
    pub async fn get_or_compute<F, Fut>(&self, host_key: &str, fetch: F) -> HostRecord
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = HostRecord>,
    {
        let cell = {
            let mut cells = self.cells.lock().await;
            cells
                .entry(host_key.to_string())
                .or_insert_with(|| Arc::new(OnceCell::new()))
                .clone()
        };

        cell.get_or_init(|| async {
            info!(host = host_key, "computing host metadata");
            fetch().await
        })
        .await
        .clone()
    }

    pub async fn known_host_count(&self) -> usize {
        self.cells.lock().await.len()
    }
}

/// Build a [`HostRecord`] from a parsed (or fallback) robots policy and the
/// configured crawl-delay floor: the effective delay is the robots-advertised
/// delay if present, else the configured delay.
pub fn host_record_from_robots(robots: RobotsPolicy, user_agent: &str, configured_delay: u64) -> HostRecord {
    let effective_crawl_delay = robots.crawl_delay(user_agent).unwrap_or(configured_delay);
    HostRecord {
        robots,
        effective_crawl_delay,
    }
}
