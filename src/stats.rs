//! Post-crawl grouping report: clusters canonical URLs by sub-path prefix,
//! keeping only prefixes with at least a minimum number of member pages.

use std::collections::HashMap;

#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct DomainGroup {
    pub prefix: String,
    pub page_count: usize,
}

/// For every visited URL, walk its path segments outward-in and attribute
/// it to the *deepest* prefix that still has at least `min_pages_per_sub_path`
/// member URLs — this avoids reporting both `/blog` and `/blog/2024` when
/// the split doesn't add information.
pub fn analyze_url_groups(urls: &[String], min_pages_per_sub_path: usize) -> Vec<DomainGroup> {
    let mut parsed: Vec<(String, Vec<String>)> = Vec::with_capacity(urls.len());
    let mut prefix_counts: HashMap<String, usize> = HashMap::new();

    for raw in urls {
        let Ok(url) = url::Url::parse(raw) else { continue };
        let Some(host) = url.host_str() else { continue };
        let origin = format!("{}://{host}", url.scheme());
        let segments: Vec<String> = url
            .path()
            .trim_matches('/')
            .split('/')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let mut prefix = origin.clone();
        for segment in &segments {
            prefix.push('/');
            prefix.push_str(segment);
            *prefix_counts.entry(prefix.clone()).or_insert(0) += 1;
        }
        parsed.push((origin, segments));
    }

    let mut group_counts: HashMap<String, usize> = HashMap::new();
    for (origin, segments) in &parsed {
        let mut prefix = origin.clone();
        let mut deepest_qualifying: Option<String> = None;
        for segment in segments {
            prefix.push('/');
            prefix.push_str(segment);
            if prefix_counts.get(&prefix).copied().unwrap_or(0) >= min_pages_per_sub_path {
                deepest_qualifying = Some(prefix.clone());
            }
        }
        if let Some(winner) = deepest_qualifying {
            *group_counts.entry(winner).or_insert(0) += 1;
        }
    }

    let mut groups: Vec<DomainGroup> = group_counts
        .into_iter()
        .map(|(prefix, page_count)| DomainGroup { prefix, page_count })
        .collect();
    groups.sort_by(|a, b| a.prefix.cmp(&b.prefix));
    groups
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn groups_paths_meeting_the_threshold() {
        let urls: Vec<String> = (1..=6)
            .map(|i| format!("http://a.test/blog/post-{i}"))
            .collect();
        let groups = analyze_url_groups(&urls, 5);
        assert_eq!(groups.len(), 1);
        assert_eq!(groups[0].prefix, "http://a.test/blog");
        assert_eq!(groups[0].page_count, 6);
    }

    #[test]
    fn paths_below_threshold_are_not_grouped() {
        let urls = vec![
            "http://a.test/about".to_string(),
            "http://a.test/contact".to_string(),
        ];
        let groups = analyze_url_groups(&urls, 5);
        assert!(groups.is_empty());
    }

    #[test]
    fn picks_deepest_qualifying_prefix() {
        let mut urls: Vec<String> = (1..=6).map(|i| format!("http://a.test/docs/v1/page-{i}")).collect();
        urls.extend((1..=6).map(|i| format!("http://a.test/docs/v2/page-{i}")));
        let groups = analyze_url_groups(&urls, 5);
        let prefixes: Vec<&str> = groups.iter().map(|g| g.prefix.as_str()).collect();
        assert!(prefixes.contains(&"http://a.test/docs/v1"));
        assert!(prefixes.contains(&"http://a.test/docs/v2"));
        assert!(!prefixes.contains(&"http://a.test/docs"));
    }
}
