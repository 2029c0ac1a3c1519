//! Helpers for showing watcher results next to configuration lists.

use chrono::{DateTime, Utc};
use indexmap::IndexMap;

use crate::filters::{FilterConfiguration, WatcherResult};

/// Configurations with the most new items first; ties keep their saved order
pub fn rank_by_results<'a>(
    configs: &'a [FilterConfiguration],
    results: &IndexMap<String, WatcherResult>,
) -> Vec<&'a FilterConfiguration> {
    let mut ranked: Vec<&FilterConfiguration> = configs.iter().collect();
    ranked.sort_by_key(|config| {
        std::cmp::Reverse(results.get(&config.name).map(|r| r.new_items).unwrap_or(0))
    });
    ranked
}

/// "+5" when there is something new, empty otherwise
pub fn badge(result: Option<&WatcherResult>) -> String {
    match result {
        Some(result) if result.new_items > 0 => format!("+{}", result.new_items),
        _ => String::new(),
    }
}

/// Human-readable age of the last check
pub fn format_last_check(now: DateTime<Utc>, last: Option<DateTime<Utc>>) -> String {
    let Some(last) = last else {
        return "never".to_string();
    };
    let secs = (now - last).num_seconds().max(0);
    if secs < 60 {
        "just now".to_string()
    } else if secs < 3600 {
        format!("{}m ago", secs / 60)
    } else if secs < 86400 {
        format!("{}h ago", secs / 3600)
    } else {
        format!("{}d ago", secs / 86400)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use serde_json::json;

    #[test]
    fn test_rank_is_stable_for_ties() {
        let configs: Vec<_> = ["A", "B", "C", "D"]
            .iter()
            .map(|n| FilterConfiguration::new(*n, json!({})))
            .collect();
        let mut results = IndexMap::new();
        results.insert("C".to_string(), WatcherResult { total: 9, new_items: 4 });
        results.insert("B".to_string(), WatcherResult { total: 9, new_items: 1 });

        let names: Vec<_> = rank_by_results(&configs, &results).iter().map(|c| c.name.as_str()).collect();
        assert_eq!(names, vec!["C", "B", "A", "D"]);
    }

    #[test]
    fn test_badge() {
        assert_eq!(badge(Some(&WatcherResult { total: 3, new_items: 2 })), "+2");
        assert_eq!(badge(Some(&WatcherResult { total: 3, new_items: 0 })), "");
        assert_eq!(badge(None), "");
    }

    #[test]
    fn test_format_last_check() {
        let now = Utc::now();
        assert_eq!(format_last_check(now, None), "never");
        assert_eq!(format_last_check(now, Some(now - Duration::seconds(10))), "just now");
        assert_eq!(format_last_check(now, Some(now - Duration::minutes(5))), "5m ago");
        assert_eq!(format_last_check(now, Some(now - Duration::hours(3))), "3h ago");
        assert_eq!(format_last_check(now, Some(now - Duration::days(2))), "2d ago");
    }
}
