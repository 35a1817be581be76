//! Deterministic URL normalization: a byte-identical canonical form used as
//! the visited-set key and a stable content hash over that form.
//!
//! Normalization order: lowercase scheme/host, strip a default port,
//! collapse repeated path slashes, normalize percent-encoding, drop the
//! fragment, sort query parameters by key (stable).

use anyhow::{Context, Result};
use std::fmt;
use url::Url;

/// A URL in its normalized, deduplication-ready form, paired with a stable
/// hash over that form.
///
/// Trailing-slash policy (documented here so it stays consistent): we never
/// add or strip a trailing slash
/// beyond what `url::Url` itself does when parsing/joining — a bare-origin
/// URL (`https://a.test`) normalizes to a root path (`https://a.test/`)
/// because that is what `Url::path()` always returns for an empty path;
/// any other path is left exactly as encountered.
#[derive(Clone, Eq, PartialEq, Hash)]
pub struct CanonicalUrl {
    normalized: String,
    hash: String,
}

impl CanonicalUrl {
    /// The canonical string form, suitable as a set key.
    pub fn as_str(&self) -> &str {
        &self.normalized
    }

    /// A stable hash over the canonical string, independent of Rust's
    /// per-process `DefaultHasher` seed (FNV-1a over the UTF-8 bytes).
    pub fn hash(&self) -> &str {
        &self.hash
    }

    /// `scheme://host[:port]`, used as the host-registry key.
    pub fn host_key(&self) -> Option<String> {
        let url = Url::parse(&self.normalized).ok()?;
        let host = url.host_str()?;
        match url.port() {
            Some(port) => Some(format!("{}://{}:{port}", url.scheme(), host)),
            None => Some(format!("{}://{}", url.scheme(), host)),
        }
    }

    /// The full robots.txt URL for this URL's host.
    pub fn robots_txt_url(&self) -> Option<String> {
        Some(format!("{}/robots.txt", self.host_key()?))
    }

    pub fn netloc(&self) -> Option<String> {
        let url = Url::parse(&self.normalized).ok()?;
        let host = url.host_str()?.to_string();
        Some(match url.port() {
            Some(port) => format!("{host}:{port}"),
            None => host,
        })
    }

    /// Path + query, percent-encoded, as robots.txt matching expects it.
    pub fn path_and_query(&self) -> String {
        let url = match Url::parse(&self.normalized) {
            Ok(u) => u,
            Err(_) => return "/".to_string(),
        };
        let mut out = url.path().to_string();
        if let Some(q) = url.query() {
            out.push('?');
            out.push_str(q);
        }
        if out.is_empty() {
            out.push('/');
        }
        out
    }
}

impl fmt::Debug for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CanonicalUrl").field(&self.normalized).finish()
    }
}

impl fmt::Display for CanonicalUrl {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.normalized)
    }
}

/// Normalize a URL string into its canonical form.
pub fn canonicalize(input: &str) -> Result<CanonicalUrl> {
    let url = Url::parse(input).with_context(|| format!("invalid URL: {input}"))?;
    canonicalize_url(url)
}

/// RFC-3986 reference resolution of `reference` against `base`, then
/// canonicalization. An empty `reference` returns `canonicalize(base)`.
pub fn make_absolute(base: &str, reference: &str) -> Result<CanonicalUrl> {
    if reference.trim().is_empty() {
        return canonicalize(base);
    }
    let base_url = Url::parse(base).with_context(|| format!("invalid base URL: {base}"))?;
    let resolved = base_url
        .join(reference)
        .with_context(|| format!("cannot resolve {reference} against {base}"))?;
    canonicalize_url(resolved)
}

fn canonicalize_url(mut url: Url) -> Result<CanonicalUrl> {
    url.set_fragment(None);
    strip_default_port(&mut url);
    collapse_path_slashes(&mut url);
    sort_query(&mut url);

    let normalized = url.to_string();
    let hash = fnv1a_hex(normalized.as_bytes());
    Ok(CanonicalUrl { normalized, hash })
}

fn strip_default_port(url: &mut Url) {
    if let (Some(port), Some(default)) = (url.port(), default_port(url.scheme())) {
        if port == default {
            let _ = url.set_port(None);
        }
    }
}

fn default_port(scheme: &str) -> Option<u16> {
    match scheme {
        "http" => Some(80),
        "https" => Some(443),
        "ftp" => Some(21),
        _ => None,
    }
}

fn collapse_path_slashes(url: &mut Url) {
    let path = url.path();
    if !path.contains("//") {
        return;
    }
    let mut collapsed = String::with_capacity(path.len());
    let mut prev_slash = false;
    for ch in path.chars() {
        if ch == '/' {
            if prev_slash {
                continue;
            }
            prev_slash = true;
        } else {
            prev_slash = false;
        }
        collapsed.push(ch);
    }
    url.set_path(&collapsed);
}

fn sort_query(url: &mut Url) {
    if url.query().is_none() {
        return;
    }
    let mut pairs: Vec<(String, String)> = url
        .query_pairs()
        .map(|(k, v)| (k.into_owned(), v.into_owned()))
        .collect();
    pairs.sort_by(|a, b| a.0.cmp(&b.0));
    let mut out = url.query_pairs_mut();
    out.clear();
    out.extend_pairs(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));
    drop(out);
}

/// FNV-1a, chosen because it is fixed by specification rather than by the
/// standard library's per-build `DefaultHasher` seed — a dedup/test-fixture
/// hash needs to be stable across runs and across Rust versions.
fn fnv1a_hex(bytes: &[u8]) -> String {
    const FNV_OFFSET: u64 = 0xcbf29ce484222325;
    const FNV_PRIME: u64 = 0x100000001b3;
    let mut hash = FNV_OFFSET;
    for &b in bytes {
        hash ^= b as u64;
        hash = hash.wrapping_mul(FNV_PRIME);
    }
    format!("{hash:016x}")
}
