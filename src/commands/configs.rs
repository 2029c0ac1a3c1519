//! Filter configuration commands: list, show, save, edit, delete, reorder, export, import

use colored::Colorize;
use inquire::Confirm;
use std::io::{self, Read};

use jobwatch::error::{JobwatchError, Result};
use jobwatch::filters::FilterConfiguration;

use super::open_store;
use crate::utils::truncate_str;

fn flag(on: bool, label: &str, use_color: bool) -> String {
    match (on, use_color) {
        (true, true) => label.green().to_string(),
        (true, false) => format!("[{}]", label),
        (false, _) => String::new(),
    }
}

pub async fn cmd_config_list(verbose: bool, json: bool) -> Result<()> {
    let store = open_store()?;
    let configs = store.list().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&configs)?);
        return Ok(());
    }

    if configs.is_empty() {
        println!("No filter configurations saved. Run `jobwatch config save` to add one.");
        return Ok(());
    }

    if !store.has_remote() {
        println!("(local only: set JOBWATCH_API_URL to sync and watch configurations)");
    }

    let use_color = atty::is(atty::Stream::Stdout);
    let max_name_len = configs.iter().map(|c| c.name.chars().count()).max().unwrap_or(20).min(30);

    println!("\nFilter configurations:\n");
    for config in &configs {
        let status = if !config.tracked().is_tracked() {
            if use_color { "○".dimmed().to_string() } else { "[local]".to_string() }
        } else if config.watched {
            if use_color { "●".green().to_string() } else { "[watched]".to_string() }
        } else if use_color {
            "○".yellow().to_string()
        } else {
            "[unwatched]".to_string()
        };

        println!(
            "  {} {:<width$} {}",
            status,
            truncate_str(&config.name, 30),
            flag(config.notify, "notify", use_color),
            width = max_name_len
        );

        if verbose {
            match config.id {
                Some(id) => println!("      id:      {}", id),
                None => println!("      id:      (not synced)"),
            }
            println!("      filters: {}", config.filters);
            println!("      updated: {}", config.updated_at.format("%Y-%m-%d %H:%M"));
        }
    }
    println!();
    Ok(())
}

pub async fn cmd_config_show(name: &str, json: bool) -> Result<()> {
    let store = open_store()?;
    let config = store
        .load(name)
        .await?
        .ok_or_else(|| JobwatchError::ConfigNotFound(name.to_string()))?;

    if json {
        println!("{}", serde_json::to_string_pretty(&config)?);
        return Ok(());
    }

    println!("\n{}\n", config.name.bold());
    match config.id {
        Some(id) => println!("  id:       {}", id),
        None => println!("  id:       (not synced)"),
    }
    println!("  watched:  {}", config.watched);
    println!("  notify:   {}", config.notify);
    println!("  position: {}", config.position);
    println!("  filters:  {}", serde_json::to_string_pretty(&config.filters)?);
    Ok(())
}

pub async fn cmd_config_save(
    name: String,
    filters: &str,
    notify: bool,
    unwatched: bool,
    force: bool,
) -> Result<()> {
    let filters: serde_json::Value = serde_json::from_str(filters)
        .map_err(|e| JobwatchError::ConfigError(format!("Invalid --filters JSON: {}", e)))?;
    if !filters.is_object() {
        return Err(JobwatchError::ConfigError("--filters must be a JSON object".into()));
    }

    let store = open_store()?;
    if !force && store.load(&name).await?.is_some() {
        return Err(JobwatchError::DuplicateConfigName(name));
    }

    let mut config = FilterConfiguration::new(name, filters);
    config.notify = notify;
    config.watched = !unwatched;

    let saved = store.save(config).await?;
    match saved.id {
        Some(id) => println!("Saved '{}' (id {})", saved.name, id),
        None => println!("Saved '{}' locally", saved.name),
    }
    Ok(())
}

pub async fn cmd_config_edit(name: &str, notify: Option<bool>, watched: Option<bool>) -> Result<()> {
    if notify.is_none() && watched.is_none() {
        return Err(JobwatchError::ConfigError("Nothing to change. Pass --notify and/or --watched".into()));
    }
    let store = open_store()?;
    let config = store.set_flags(name, notify, watched).await?;
    println!(
        "Updated '{}': watched={}, notify={}",
        config.name, config.watched, config.notify
    );
    Ok(())
}

pub async fn cmd_config_delete(name: &str, skip_confirm: bool) -> Result<()> {
    let store = open_store()?;
    if store.load(name).await?.is_none() {
        return Err(JobwatchError::ConfigNotFound(name.to_string()));
    }

    if !skip_confirm {
        let confirm = Confirm::new(&format!("Delete filter configuration '{}'?", name))
            .with_default(false)
            .prompt()
            .map_err(|e| JobwatchError::ConfigError(e.to_string()))?;

        if !confirm {
            println!("Cancelled.");
            return Ok(());
        }
    }

    store.delete(name).await?;
    println!("Deleted filter configuration: {}", name);
    Ok(())
}

pub async fn cmd_config_reorder(names: Vec<String>) -> Result<()> {
    let store = open_store()?;
    let configs = store.reorder(&names).await?;
    println!("New order:");
    for (i, config) in configs.iter().enumerate() {
        println!("  {}. {}", i + 1, config.name);
    }
    Ok(())
}

pub async fn cmd_config_export(name: Option<String>) -> Result<()> {
    let store = open_store()?;
    println!("{}", store.export(name.as_deref()).await?);
    Ok(())
}

pub async fn cmd_config_import(dry_run: bool) -> Result<()> {
    let mut input = String::new();
    io::stdin().read_to_string(&mut input)?;

    let store = open_store()?;
    let summary = store.import(&input, dry_run).await?;

    let verb = if dry_run { "Would import" } else { "Imported" };
    for name in &summary.imported {
        println!("  {}: {}", verb, name);
    }
    for name in &summary.skipped {
        println!("  Skipped (already exists): {}", name);
    }
    println!(
        "\n{} {} configuration(s), skipped {}.",
        verb,
        summary.imported.len(),
        summary.skipped.len()
    );
    Ok(())
}
