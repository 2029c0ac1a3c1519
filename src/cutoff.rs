//! Cutoff timestamps sent to the stats endpoint.
//!
//! The API compares job creation times as naive server-local timestamps, so every
//! effective start time is shifted into the server's wall clock and printed without
//! a zone designator.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Duration, Local, Offset, TimeZone, Utc};

use crate::filters::TrackedConfiguration;

/// ISO-8601 with millisecond precision and no trailing `Z`
const CUTOFF_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3f";

/// Minutes the local zone is ahead of UTC at `at` (east positive)
pub fn local_offset_minutes(at: DateTime<Utc>) -> i32 {
    Local.offset_from_utc_datetime(&at.naive_utc()).fix().local_minus_utc() / 60
}

/// Render `start` as wall-clock time in a zone `offset_minutes` east of UTC
pub fn format_cutoff(start: DateTime<Utc>, offset_minutes: i32) -> String {
    let shifted = start + Duration::minutes(i64::from(offset_minutes));
    shifted.format(CUTOFF_FORMAT).to_string()
}

/// Build the id -> cutoff map for every tracked configuration.
///
/// A configuration's start is its override when present, otherwise `start`. Without a
/// known server offset the local offset at that start time is used instead.
pub fn build_cutoff_map<'a>(
    configs: impl IntoIterator<Item = &'a TrackedConfiguration>,
    start: Option<DateTime<Utc>>,
    overrides: &HashMap<String, DateTime<Utc>>,
    server_offset_minutes: Option<i32>,
) -> BTreeMap<i64, String> {
    let mut cutoffs = BTreeMap::new();

    for config in configs {
        let Some(id) = config.id else { continue };
        if !config.watched {
            continue;
        }
        let Some(effective_start) = overrides.get(&config.name).copied().or(start) else {
            continue;
        };
        let offset = server_offset_minutes.unwrap_or_else(|| local_offset_minutes(effective_start));
        cutoffs.insert(id, format_cutoff(effective_start, offset));
    }

    cutoffs
}

#[cfg(test)]
mod tests {
    use super::*;

    fn at(s: &str) -> DateTime<Utc> {
        DateTime::parse_from_rfc3339(s).unwrap().with_timezone(&Utc)
    }

    fn tracked(id: i64, name: &str) -> TrackedConfiguration {
        TrackedConfiguration::new(Some(id), name, true)
    }

    #[test]
    fn test_format_cutoff_applies_offset() {
        let start = at("2024-03-10T12:00:00Z");
        assert_eq!(format_cutoff(start, 0), "2024-03-10T12:00:00.000");
        assert_eq!(format_cutoff(start, 120), "2024-03-10T14:00:00.000");
        assert_eq!(format_cutoff(start, -300), "2024-03-10T07:00:00.000");
    }

    #[test]
    fn test_format_cutoff_crosses_midnight() {
        let start = at("2024-03-10T23:30:15.250Z");
        assert_eq!(format_cutoff(start, 60), "2024-03-11T00:30:15.250");
    }

    #[test]
    fn test_cutoff_never_has_zone_suffix() {
        let cutoff = format_cutoff(Utc::now(), 0);
        assert!(!cutoff.ends_with('Z'));
        assert!(!cutoff.contains('+'));
    }

    #[test]
    fn test_override_wins_over_global_start() {
        let configs = vec![tracked(1, "Rust"), tracked(2, "Go")];
        let mut overrides = HashMap::new();
        overrides.insert("Go".to_string(), at("2024-03-10T12:05:05Z"));

        let map = build_cutoff_map(&configs, Some(at("2024-03-10T12:00:00Z")), &overrides, Some(0));
        assert_eq!(map[&1], "2024-03-10T12:00:00.000");
        assert_eq!(map[&2], "2024-03-10T12:05:05.000");
    }

    #[test]
    fn test_untracked_configs_are_skipped() {
        let mut unwatched = tracked(2, "Paused");
        unwatched.watched = false;
        let local_only = TrackedConfiguration::new(None, "Draft", true);
        let configs = vec![tracked(1, "Rust"), unwatched, local_only];

        let map = build_cutoff_map(&configs, Some(Utc::now()), &HashMap::new(), Some(0));
        assert_eq!(map.keys().copied().collect::<Vec<_>>(), vec![1]);
    }

    #[test]
    fn test_missing_start_produces_no_entry() {
        let configs = vec![tracked(1, "Rust"), tracked(2, "Go")];
        let mut overrides = HashMap::new();
        overrides.insert("Go".to_string(), at("2024-03-10T12:00:00Z"));

        let map = build_cutoff_map(&configs, None, &overrides, Some(0));
        assert!(!map.contains_key(&1));
        assert!(map.contains_key(&2));
    }

    #[test]
    fn test_local_offset_fallback() {
        let start = at("2024-07-01T09:00:00Z");
        let configs = vec![tracked(7, "Local")];

        let map = build_cutoff_map(&configs, Some(start), &HashMap::new(), None);
        assert_eq!(map[&7], format_cutoff(start, local_offset_minutes(start)));
    }
}
