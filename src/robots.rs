//! robots.txt parsing and matching.
//!
//! Deliberately preserves a deviation from current robots.txt practice: the
//! *first* matching rule line in file order wins, not the longest-match rule
//! most crawlers use today. See DESIGN.md for why this was kept.

use regex::Regex;
use tracing::warn;

/// The top-level access decision that short-circuits all per-rule
/// evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AccessRule {
    AllowAll,
    DisallowAll,
    Default,
}

#[derive(Debug, Clone, Copy)]
pub struct RequestRate {
    pub requests: u32,
    pub seconds: u32,
}

#[derive(Debug, Clone)]
struct RuleLine {
    pattern: Regex,
    allowance: bool,
}

impl RuleLine {
    fn new(path: &str, allowance: bool) -> Self {
        // An empty Disallow path is equivalent to Allow: / per the de facto
        // robots.txt convention.
        let allowance = if path.is_empty() { true } else { allowance };
        RuleLine {
            pattern: compile_robots_pattern(path),
            allowance,
        }
    }

    fn applies_to(&self, path: &str) -> bool {
        let path = ensure_leading_slash(path);
        self.pattern.is_match(&path)
    }
}

#[derive(Debug, Clone, Default)]
struct Entry {
    useragents: Vec<String>,
    rulelines: Vec<RuleLine>,
    delay: Option<u64>,
    req_rate: Option<RequestRate>,
}

impl Entry {
    fn applies_to(&self, user_agent: &str) -> bool {
        let ua = user_agent
            .split('/')
            .next()
            .unwrap_or(user_agent)
            .to_lowercase();
        for agent in &self.useragents {
            if agent == "*" {
                return true;
            }
            if ua.contains(agent.to_lowercase().as_str()) {
                return true;
            }
        }
        false
    }

    fn allowance(&self, path: &str) -> bool {
        for line in &self.rulelines {
            if line.applies_to(path) {
                return line.allowance;
            }
        }
        true
    }
}

/// A parsed robots.txt policy for one host.
#[derive(Debug, Clone)]
pub struct RobotsPolicy {
    entries: Vec<Entry>,
    default_entry: Option<Entry>,
    pub access_rule: AccessRule,
    pub sitemap_urls: Vec<String>,
}

impl RobotsPolicy {
    /// The permissive empty policy installed when robots.txt could not be
    /// fetched at all — degrades gracefully to allow-all.
    pub fn allow_all() -> Self {
        Self {
            entries: Vec::new(),
            default_entry: None,
            access_rule: AccessRule::AllowAll,
            sitemap_urls: Vec::new(),
        }
    }

    /// Construct a policy from an HTTP status code and (if fetched) body: a
    /// 401 or 403 means "assume disallowed", any other 4xx means "assume
    /// allowed" (no robots.txt present), anything else parses the body.
    pub fn from_http(status: u16, body: Option<&str>) -> Self {
        if status == 401 || status == 403 {
            let mut policy = Self::allow_all();
            policy.access_rule = AccessRule::DisallowAll;
            return policy;
        }
        if (400..500).contains(&status) {
            return Self::allow_all();
        }
        match body {
            Some(content) => parse_robots(content),
            None => Self::allow_all(),
        }
    }

    pub fn can_fetch(&self, user_agent: &str, path_and_query: &str) -> bool {
        match self.access_rule {
            AccessRule::DisallowAll => return false,
            AccessRule::AllowAll => return true,
            AccessRule::Default => {}
        }

        let path = ensure_leading_slash(path_and_query);
        for entry in &self.entries {
            if entry.applies_to(user_agent) {
                return entry.allowance(&path);
            }
        }
        if let Some(default) = &self.default_entry {
            return default.allowance(&path);
        }
        true
    }

    pub fn crawl_delay(&self, user_agent: &str) -> Option<u64> {
        for entry in &self.entries {
            if entry.applies_to(user_agent) {
                return entry.delay;
            }
        }
        self.default_entry.as_ref().and_then(|e| e.delay)
    }

    pub fn request_rate(&self, user_agent: &str) -> Option<RequestRate> {
        for entry in &self.entries {
            if entry.applies_to(user_agent) {
                return entry.req_rate;
            }
        }
        self.default_entry.as_ref().and_then(|e| e.req_rate)
    }

    fn add_entry(&mut self, entry: Entry) {
        if entry.useragents.iter().any(|a| a == "*") {
            if self.default_entry.is_none() {
                self.default_entry = Some(entry);
            }
        } else {
            self.entries.push(entry);
        }
    }
}

#[derive(PartialEq)]
enum ParseState {
    None,
    UserAgent,
    Rules,
}

/// Parse a robots.txt body. Invalid lines are logged and skipped.
pub fn parse_robots(content: &str) -> RobotsPolicy {
    let mut policy = RobotsPolicy {
        entries: Vec::new(),
        default_entry: None,
        access_rule: AccessRule::Default,
        sitemap_urls: Vec::new(),
    };

    let mut state = ParseState::None;
    let mut entry = Entry::default();

    for raw_line in content.lines() {
        let line = match raw_line.find('#') {
            Some(idx) => &raw_line[..idx],
            None => raw_line,
        }
        .trim();
        if line.is_empty() {
            continue;
        }

        let Some((key_raw, value_raw)) = line.split_once(':') else {
            warn!("skipping invalid robots.txt line: {raw_line}");
            continue;
        };
        let key = key_raw.trim().to_lowercase();
        let value = value_raw.trim();

        match key.as_str() {
            "user-agent" => {
                if state == ParseState::Rules {
                    policy.add_entry(std::mem::take(&mut entry));
                }
                entry.useragents.push(value.to_string());
                state = ParseState::UserAgent;
            }
            "disallow" => {
                if state != ParseState::None {
                    entry.rulelines.push(RuleLine::new(value, false));
                    state = ParseState::Rules;
                }
            }
            "allow" => {
                if state != ParseState::None {
                    entry.rulelines.push(RuleLine::new(value, true));
                    state = ParseState::Rules;
                }
            }
            "crawl-delay" => {
                if state != ParseState::None {
                    if let Ok(seconds) = value.parse::<u64>() {
                        entry.delay = Some(seconds);
                    }
                    state = ParseState::Rules;
                }
            }
            "request-rate" => {
                if state != ParseState::None {
                    if let Some((req, secs)) = value.split_once('/') {
                        if let (Ok(requests), Ok(seconds)) =
                            (req.trim().parse(), secs.trim().parse())
                        {
                            entry.req_rate = Some(RequestRate { requests, seconds });
                        }
                    }
                    state = ParseState::Rules;
                }
            }
            "sitemap" => {
                policy.sitemap_urls.push(value.to_string());
            }
            _ => {
                warn!("skipping unrecognized robots.txt directive: {key}");
            }
        }
    }

    if state == ParseState::Rules {
        policy.add_entry(entry);
    }

    policy
}

fn ensure_leading_slash(path: &str) -> String {
    if path.starts_with('/') {
        path.to_string()
    } else {
        format!("/{path}")
    }
}

const SPECIAL_CHARS: [char; 11] =
    ['\\', '.', '+', '?', '|', '(', ')', '[', ']', '{', '}'];

/// Compile a robots-style glob pattern: `*` = any run, `$` = end anchor,
/// metacharacters other than `*`/`$` escaped, matched full-string.
pub fn compile_robots_pattern(path: &str) -> Regex {
    let anchored = ensure_leading_slash(path);

    let mut escaped = String::with_capacity(anchored.len());
    for ch in anchored.chars() {
        if SPECIAL_CHARS.contains(&ch) {
            escaped.push('\\');
        }
        escaped.push(ch);
    }

    let mut pattern = escaped.replace('*', ".*");
    if !pattern.ends_with('$') && !pattern.ends_with(".*") {
        pattern.push_str(".*");
    }

    Regex::new(&format!("^(?:{pattern})$"))
        .unwrap_or_else(|_| Regex::new("^$").expect("trivial pattern always compiles"))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn pattern_table_from_spec() {
        let cases = [
            ("/*.pdf", "/doc.pdf", true),
            ("/private$", "/private", true),
            ("/private$", "/private/sub", false),
            ("/", "/", true),
        ];
        for (pattern, path, expected) in cases {
            let compiled = compile_robots_pattern(pattern);
            assert_eq!(
                compiled.is_match(path),
                expected,
                "pattern {pattern} vs path {path}"
            );
        }
    }

    #[test]
    fn disallow_all_short_circuits() {
        let mut policy = RobotsPolicy::allow_all();
        policy.access_rule = AccessRule::DisallowAll;
        assert!(!policy.can_fetch("bot", "/anything"));
    }

    #[test]
    fn wildcard_disallow_denies_matching_path() {
        let policy = parse_robots("User-agent: *\nDisallow: /forbidden\n");
        assert!(!policy.can_fetch("AnyBot", "/forbidden"));
        assert!(policy.can_fetch("AnyBot", "/allowed"));
    }

    #[test]
    fn specific_agent_takes_precedence_over_default() {
        let body = "User-agent: GoodBot\nAllow: /\n\nUser-agent: *\nDisallow: /\n";
        let policy = parse_robots(body);
        assert!(policy.can_fetch("GoodBot", "/x"));
        assert!(!policy.can_fetch("OtherBot", "/x"));
    }

    #[test]
    fn first_matching_rule_wins_not_longest_match() {
        // A broad Allow before a narrower Disallow: file order wins, which
        // is the deliberately-preserved deviation from longest-match.
        let body = "User-agent: *\nAllow: /docs/*\nDisallow: /docs/private\n";
        let policy = parse_robots(body);
        assert!(policy.can_fetch("bot", "/docs/private"));
    }

    #[test]
    fn crawl_delay_parsed() {
        let policy = parse_robots("User-agent: *\nCrawl-delay: 7\n");
        assert_eq!(policy.crawl_delay("bot"), Some(7));
    }

    #[test]
    fn sitemaps_collected_regardless_of_agent() {
        let policy = parse_robots(
            "User-agent: *\nDisallow: /\nSitemap: https://a.test/sitemap.xml\n",
        );
        assert_eq!(policy.sitemap_urls, vec!["https://a.test/sitemap.xml"]);
    }

    #[test]
    fn invalid_lines_are_skipped() {
        let policy = parse_robots("not a valid line\nUser-agent: *\nAllow: /\n");
        assert!(policy.can_fetch("bot", "/x"));
    }

    #[test]
    fn status_401_maps_to_disallow_all() {
        let policy = RobotsPolicy::from_http(401, None);
        assert!(!policy.can_fetch("bot", "/anything"));
    }

    #[test]
    fn status_404_maps_to_allow_all() {
        let policy = RobotsPolicy::from_http(404, None);
        assert!(policy.can_fetch("bot", "/anything"));
    }
}
