//! Collapse per-configuration growth into one notification.

use std::collections::HashMap;

use indexmap::IndexMap;

use crate::filters::{TrackedConfiguration, WatcherResult};

/// Highest new-item count already notified, per configuration name
pub type NotifiedLedger = HashMap<String, u64>;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AggregatedNotification {
    pub title: String,
    pub body: String,
}

/// Compare `results` against the ledger and build at most one notification.
///
/// Every configuration whose `new_items` exceeds its ledger entry has the entry raised,
/// whether or not it is mentioned. Only configurations present in `configs` and
/// `watched` appear in the body.
pub fn aggregate_growth(
    results: &IndexMap<String, WatcherResult>,
    configs: &[TrackedConfiguration],
    ledger: &mut NotifiedLedger,
    title: &str,
) -> Option<AggregatedNotification> {
    let mut growing = Vec::new();

    for (name, result) in results {
        let previous = ledger.get(name).copied().unwrap_or(0);
        if result.new_items <= previous {
            continue;
        }
        ledger.insert(name.clone(), result.new_items);

        let included = configs
            .iter()
            .find(|config| &config.name == name)
            .is_some_and(|config| config.watched);
        if included {
            growing.push(format!("{} ({})", name, result.new_items));
        }
    }

    if growing.is_empty() {
        return None;
    }

    Some(AggregatedNotification {
        title: title.to_string(),
        body: growing.join(", "),
    })
}

/// Forget what was notified for `name` so growth is measured from zero again
pub fn reset_ledger_entry(ledger: &mut NotifiedLedger, name: &str) {
    ledger.insert(name.to_string(), 0);
}

#[cfg(test)]
mod tests {
    use super::*;

    const TITLE: &str = "New jobs found";

    fn results(entries: &[(&str, u64, u64)]) -> IndexMap<String, WatcherResult> {
        entries
            .iter()
            .map(|(name, total, new_items)| {
                (name.to_string(), WatcherResult { total: *total, new_items: *new_items })
            })
            .collect()
    }

    fn configs() -> Vec<TrackedConfiguration> {
        vec![
            TrackedConfiguration::new(Some(1), "Config 1", true),
            TrackedConfiguration::new(Some(2), "Config 2", true),
        ]
    }

    #[test]
    fn test_single_notification_lists_all_growth() {
        let mut ledger = NotifiedLedger::new();
        let n = aggregate_growth(
            &results(&[("Config 1", 15, 5), ("Config 2", 15, 5)]),
            &configs(),
            &mut ledger,
            TITLE,
        )
        .unwrap();

        assert_eq!(n.title, TITLE);
        assert_eq!(n.body, "Config 1 (5), Config 2 (5)");
        assert_eq!(ledger["Config 1"], 5);
        assert_eq!(ledger["Config 2"], 5);
    }

    #[test]
    fn test_same_count_does_not_renotify() {
        let mut ledger = NotifiedLedger::new();
        let current = results(&[("Config 1", 15, 5)]);
        assert!(aggregate_growth(&current, &configs(), &mut ledger, TITLE).is_some());
        assert!(aggregate_growth(&current, &configs(), &mut ledger, TITLE).is_none());

        let grown = results(&[("Config 1", 16, 6)]);
        let n = aggregate_growth(&grown, &configs(), &mut ledger, TITLE).unwrap();
        assert_eq!(n.body, "Config 1 (6)");
    }

    #[test]
    fn test_ledger_never_decreases() {
        let mut ledger = NotifiedLedger::new();
        ledger.insert("Config 1".into(), 8);

        let n = aggregate_growth(&results(&[("Config 1", 20, 3)]), &configs(), &mut ledger, TITLE);
        assert!(n.is_none());
        assert_eq!(ledger["Config 1"], 8);
    }

    #[test]
    fn test_unlisted_and_unwatched_update_ledger_silently() {
        let mut list = configs();
        list[1].watched = false;
        let mut ledger = NotifiedLedger::new();

        let n = aggregate_growth(
            &results(&[("Config 1", 3, 1), ("Config 2", 4, 2), ("Ghost", 9, 9)]),
            &list,
            &mut ledger,
            TITLE,
        )
        .unwrap();

        assert_eq!(n.body, "Config 1 (1)");
        assert_eq!(ledger["Config 2"], 2);
        assert_eq!(ledger["Ghost"], 9);
    }

    #[test]
    fn test_no_notification_when_only_hidden_growth() {
        let mut ledger = NotifiedLedger::new();
        let n = aggregate_growth(&results(&[("Ghost", 9, 9)]), &configs(), &mut ledger, TITLE);
        assert!(n.is_none());
        assert_eq!(ledger["Ghost"], 9);
    }

    #[test]
    fn test_reset_entry_allows_renotify() {
        let mut ledger = NotifiedLedger::new();
        let current = results(&[("Config 1", 15, 5)]);
        aggregate_growth(&current, &configs(), &mut ledger, TITLE);

        reset_ledger_entry(&mut ledger, "Config 1");
        assert_eq!(ledger["Config 1"], 0);
        assert!(aggregate_growth(&current, &configs(), &mut ledger, TITLE).is_some());
    }
}
