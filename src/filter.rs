//! Enqueue-time domain and path filters.

use crate::robots::compile_robots_pattern;
use regex::Regex;
use std::collections::HashSet;

/// How the domain allow-set is derived.
#[derive(Debug, Clone)]
pub enum DomainAllowance {
    /// Every domain is allowed (subject to the forbidden set).
    AllowAll,
    /// The allow-set is the netlocs observed in the seed URLs.
    DeriveFromSeeds,
    /// The allow-set is this explicit list.
    ExplicitList(Vec<String>),
}

#[derive(Debug, Clone)]
pub struct DomainConfig {
    pub forbidden_domains: Vec<String>,
    pub allowance: DomainAllowance,
}

impl Default for DomainConfig {
    fn default() -> Self {
        Self {
            forbidden_domains: Vec::new(),
            allowance: DomainAllowance::DeriveFromSeeds,
        }
    }
}

/// Domain allow/deny decisions at enqueue time. Forbidden-deny always wins
/// over allow.
#[derive(Debug, Clone)]
pub struct DomainFilter {
    forbidden_domains: Vec<String>,
    /// `None` means "allow every domain".
    allowed_domains: Option<HashSet<String>>,
}

impl DomainFilter {
    pub fn new(config: &DomainConfig, seed_urls: &[String]) -> Self {
        let allowed_domains = match &config.allowance {
            DomainAllowance::AllowAll => None,
            DomainAllowance::DeriveFromSeeds => {
                let mut set = HashSet::new();
                for seed in seed_urls {
                    if let Some(netloc) = netloc_of(seed) {
                        set.insert(netloc);
                    }
                }
                Some(set)
            }
            DomainAllowance::ExplicitList(domains) => {
                Some(domains.iter().cloned().collect())
            }
        };

        Self {
            forbidden_domains: config.forbidden_domains.clone(),
            allowed_domains,
        }
    }

    /// `true` if `netloc` (a URL's host, optionally `host:port`) may be
    /// crawled.
    pub fn is_allowed(&self, netloc: &str) -> bool {
        for forbidden in &self.forbidden_domains {
            if netloc.ends_with(forbidden.as_str()) {
                return false;
            }
        }

        let allowed = match &self.allowed_domains {
            None => return true,
            Some(set) if set.is_empty() => return true,
            Some(set) => set,
        };

        allowed.iter().any(|allowed| netloc.ends_with(allowed.as_str()))
    }
}

fn netloc_of(url: &str) -> Option<String> {
    let parsed = url::Url::parse(url).ok()?;
    let host = parsed.host_str()?.to_string();
    Some(match parsed.port() {
        Some(port) => format!("{host}:{port}"),
        None => host,
    })
}

/// A compiled robots-style glob pattern list, used for the include/exclude
/// path filters.
#[derive(Debug, Clone)]
pub struct PathFilter {
    patterns: Vec<Regex>,
    default_value: bool,
}

impl PathFilter {
    /// `default_value` is what `is_passing` returns when `patterns` is
    /// empty: `true` for an include filter, `false` for an exclude filter.
    pub fn new(patterns: &[String], default_value: bool) -> Self {
        let compiled = patterns
            .iter()
            .map(|p| compile_robots_pattern(p))
            .collect();
        Self {
            patterns: compiled,
            default_value,
        }
    }

    pub fn is_passing(&self, path: &str) -> bool {
        if self.patterns.is_empty() {
            return self.default_value;
        }
        let path = if path.starts_with('/') {
            path.to_string()
        } else {
            format!("/{path}")
        };
        self.patterns.iter().any(|pattern| pattern.is_match(&path))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn forbidden_wins_over_allow_all() {
        let config = DomainConfig {
            forbidden_domains: vec!["bad.test".into()],
            allowance: DomainAllowance::AllowAll,
        };
        let filter = DomainFilter::new(&config, &[]);
        assert!(!filter.is_allowed("bad.test"));
        assert!(!filter.is_allowed("sub.bad.test"));
        assert!(filter.is_allowed("good.test"));
    }

    #[test]
    fn derive_from_seeds_restricts_to_seed_netlocs() {
        let config = DomainConfig {
            forbidden_domains: vec![],
            allowance: DomainAllowance::DeriveFromSeeds,
        };
        let filter = DomainFilter::new(&config, &["http://a.test/".to_string()]);
        assert!(filter.is_allowed("a.test"));
        assert!(!filter.is_allowed("b.test"));
    }

    #[test]
    fn explicit_list_uses_suffix_match() {
        let config = DomainConfig {
            forbidden_domains: vec![],
            allowance: DomainAllowance::ExplicitList(vec!["example.com".into()]),
        };
        let filter = DomainFilter::new(&config, &[]);
        assert!(filter.is_allowed("www.example.com"));
        assert!(!filter.is_allowed("other.test"));
    }

    #[test]
    fn empty_path_filter_uses_default() {
        let include = PathFilter::new(&[], true);
        let exclude = PathFilter::new(&[], false);
        assert!(include.is_passing("/anything"));
        assert!(!exclude.is_passing("/anything"));
    }

    #[test]
    fn path_filter_matches_glob() {
        let filter = PathFilter::new(&["/blog/*".to_string()], false);
        assert!(filter.is_passing("/blog/post-1"));
        assert!(!filter.is_passing("/about"));
    }
}
