//! The `PageFetcher` boundary: HTML fetching is explicitly out of scope for
//! this core and lives behind a narrow trait so a headless browser could
//! stand in for the default `reqwest`-based implementation without touching
//! the engine.

use anyhow::{Context, Result};
use chrono::Utc;
use reqwest::{Client, Url};
use std::collections::HashMap;
use std::future::Future;
use std::pin::Pin;
use std::time::Duration;

/// A boxed, `Send` future — the manual pre-`async-trait` shape, used here so
/// `PageFetcher`/`Sink` stay trait objects (`Arc<dyn PageFetcher>`) the
/// caller can swap at construction time.
pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// The raw result of fetching one resource — headers and bytes are handed
/// to a [`crate::extract::PageExtractor`] or a wire-format parser
/// downstream; this trait does no interpretation of the body.
#[derive(Debug, Clone)]
pub struct RawPage {
    pub status_code: u16,
    pub final_url: String,
    pub headers: HashMap<String, String>,
    pub content_bytes: Vec<u8>,
    pub content_type: Option<String>,
    pub charset: Option<String>,
}

pub trait PageFetcher: Send + Sync {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<RawPage>>;
}

/// The default HTTP fetcher: a single shared `reqwest::Client`, a fixed
/// `User-Agent`, and a per-request timeout.
pub struct HttpFetcher {
    client: Client,
}

impl HttpFetcher {
    pub fn new(user_agent: &str, referer: &str, timeout: Duration) -> Result<Self> {
        let mut headers = reqwest::header::HeaderMap::new();
        if let Ok(value) = reqwest::header::HeaderValue::from_str(referer) {
            headers.insert(reqwest::header::REFERER, value);
        }
        let client = Client::builder()
            .user_agent(user_agent)
            .default_headers(headers)
            .timeout(timeout)
            .build()
            .context("failed to build HTTP client")?;
        Ok(Self { client })
    }
}

impl PageFetcher for HttpFetcher {
    fn fetch<'a>(&'a self, url: &'a str) -> BoxFuture<'a, Result<RawPage>> {
        Box::pin(async move {
            let parsed = Url::parse(url).with_context(|| format!("invalid URL: {url}"))?;
            let response = self
                .client
                .get(parsed)
                .send()
                .await
                .with_context(|| format!("request failed for {url}"))?;

            let status_code = response.status().as_u16();
            let final_url = response.url().to_string();
            let headers = response
                .headers()
                .iter()
                .filter_map(|(k, v)| v.to_str().ok().map(|v| (k.to_string(), v.to_string())))
                .collect();

            let content_type_header = response
                .headers()
                .get(reqwest::header::CONTENT_TYPE)
                .and_then(|v| v.to_str().ok())
                .map(str::to_string);

            let charset = content_type_header
                .as_deref()
                .and_then(|ct| ct.split("charset=").nth(1))
                .map(|c| c.trim().to_string());
            let content_type = content_type_header
                .as_deref()
                .map(|ct| ct.split(';').next().unwrap_or(ct).trim().to_string());

            let content_bytes = response
                .bytes()
                .await
                .with_context(|| format!("failed reading body for {url}"))?
                .to_vec();

            Ok(RawPage {
                status_code,
                final_url,
                headers,
                content_bytes,
                content_type,
                charset,
            })
        })
    }
}

/// A convenience timestamp used when assembling `FetchedPage`.
pub fn now() -> chrono::DateTime<Utc> {
    Utc::now()
}
