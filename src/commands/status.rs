//! One-shot view of new matches since the daemon's last recorded check

use chrono::{DateTime, Utc};
use colored::Colorize;
use indexmap::IndexMap;
use std::collections::HashMap;
use tracing::warn;

use jobwatch::config::Config;
use jobwatch::cutoff::build_cutoff_map;
use jobwatch::db::{Database, LocalStore};
use jobwatch::display::{badge, format_last_check, rank_by_results};
use jobwatch::error::Result;
use jobwatch::filters::{FilterConfiguration, WatcherResult};
use jobwatch::sources::{get_json, StatsSource, TimezoneSource, LAST_CHECK_KEY};

use super::{require_api_client, store_with};

pub async fn cmd_status(json: bool) -> Result<()> {
    let config = Config::load()?;
    let client = require_api_client(&config)?;
    let local = LocalStore::new(Database::open()?);
    let store = store_with(Some(client.clone()), local.clone());

    let configs = store.list().await?;
    let last_check: Option<DateTime<Utc>> = get_json(&local, LAST_CHECK_KEY).await?;
    let server_offset = match client.system_timezone().await {
        Ok(tz) => Some(tz.offset_minutes),
        Err(e) => {
            warn!(error = %e, "Could not fetch server timezone, using local offset");
            None
        }
    };

    let tracked: Vec<_> = configs.iter().map(FilterConfiguration::tracked).collect();
    let since = last_check.unwrap_or_else(Utc::now);
    let cutoffs = build_cutoff_map(&tracked, Some(since), &HashMap::new(), server_offset);
    let stats = client.watcher_stats(&cutoffs).await?;

    let mut results: IndexMap<String, WatcherResult> = IndexMap::new();
    for config in &configs {
        if let Some(reported) = config.id.and_then(|id| stats.get(&id)) {
            results.insert(
                config.name.clone(),
                WatcherResult { total: reported.total, new_items: reported.new_items },
            );
        }
    }

    if json {
        let out = serde_json::json!({
            "last_check_time": last_check,
            "results": results,
        });
        println!("{}", serde_json::to_string_pretty(&out)?);
        return Ok(());
    }

    print_results(&configs, &results, last_check);
    Ok(())
}

/// Ranked result table shared by `status` and the daemon
pub(crate) fn print_results(
    configs: &[FilterConfiguration],
    results: &IndexMap<String, WatcherResult>,
    last_check: Option<DateTime<Utc>>,
) {
    let use_color = atty::is(atty::Stream::Stdout);
    println!("\nLast check: {}\n", format_last_check(Utc::now(), last_check));

    let ranked: Vec<_> = rank_by_results(configs, results)
        .into_iter()
        .filter(|c| c.tracked().is_tracked())
        .collect();
    if ranked.is_empty() {
        println!("  No watched filter configurations.");
        return;
    }

    let width = ranked.iter().map(|c| c.name.chars().count()).max().unwrap_or(20).min(30);
    for config in ranked {
        let result = results.get(&config.name);
        let new = badge(result);
        let new = if use_color && !new.is_empty() { new.green().bold().to_string() } else { new };
        let total = result.map(|r| r.total.to_string()).unwrap_or_else(|| "-".into());
        println!("  {:<width$}  {:>6} total  {}", config.name, total, new, width = width);
    }
    println!();
}
