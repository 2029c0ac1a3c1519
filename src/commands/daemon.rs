//! Foreground watcher: polls the job API and takes commands on stdin

use std::sync::Arc;
use std::time::Duration;

use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::{info, warn};

use jobwatch::config::Config;
use jobwatch::db::{Database, LocalStore};
use jobwatch::error::{JobwatchError, Result};
use jobwatch::events::{ChangeBus, ChangeKind};
use jobwatch::filters::FilterConfiguration;
use jobwatch::notify::TargetNotifier;
use jobwatch::store::ConfigStore;
use jobwatch::{FilterWatcher, WatcherOptions, WatcherSources};

use super::status::print_results;
use super::{require_api_client, store_with};
use crate::utils::{format_interval, parse_interval_str};

/// A line typed into a running daemon
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DaemonCommand {
    Reset(String),
    Stop,
    Start,
    Changed,
    Reload,
    Status,
    Help,
}

impl DaemonCommand {
    /// `None` for blank lines
    pub fn parse(line: &str) -> Option<std::result::Result<Self, String>> {
        let line = line.trim();
        if line.is_empty() {
            return None;
        }
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim()),
            None => (line, ""),
        };
        let command = match word.to_lowercase().as_str() {
            "reset" if rest.is_empty() => Err("usage: reset <name>".to_string()),
            "reset" => Ok(Self::Reset(rest.to_string())),
            "stop" => Ok(Self::Stop),
            "start" => Ok(Self::Start),
            "changed" => Ok(Self::Changed),
            "reload" => Ok(Self::Reload),
            "status" => Ok(Self::Status),
            "help" | "?" => Ok(Self::Help),
            other => Err(format!("unknown command '{}' (try `help`)", other)),
        };
        Some(command)
    }
}

struct Session {
    watcher: FilterWatcher,
    bus: ChangeBus,
    store: ConfigStore,
    configs: Vec<FilterConfiguration>,
}

impl Session {
    async fn handle(&mut self, command: DaemonCommand) -> Result<()> {
        match command {
            DaemonCommand::Reset(name) => {
                if self.configs.iter().any(|c| c.name == name) {
                    self.watcher.reset_watcher(&name);
                    println!("Reset '{}'", name);
                } else {
                    println!("No filter configuration named '{}'", name);
                }
            }
            DaemonCommand::Stop => self.watcher.stop_watching(),
            DaemonCommand::Start => self.watcher.start_watching(),
            DaemonCommand::Changed => {
                self.bus.publish(ChangeKind::JobUpdated);
            }
            DaemonCommand::Reload => {
                self.configs = self.store.list().await?;
                self.watcher
                    .set_configurations(self.configs.iter().map(FilterConfiguration::tracked).collect());
                self.bus.publish(ChangeKind::Refreshed);
                println!("Reloaded {} filter configuration(s)", self.configs.len());
            }
            DaemonCommand::Status => self.print(),
            DaemonCommand::Help => {
                println!("Commands: reset <name>, stop, start, changed, reload, status, help");
            }
        }
        Ok(())
    }

    fn print(&self) {
        let snapshot = self.watcher.snapshot();
        if !snapshot.is_watching {
            println!("\nWatching is paused. Type `start` to resume.");
            return;
        }
        print_results(&self.configs, &snapshot.results, snapshot.last_check_time);
    }
}

pub async fn cmd_daemon(interval: Option<String>) -> Result<()> {
    let config = Config::load()?;
    let client = require_api_client(&config)?;
    let local = LocalStore::new(Database::open()?);
    let store = store_with(Some(client.clone()), local.clone());

    let mut options = WatcherOptions::from(&config.watcher);
    if let Some(interval) = interval {
        options.poll_interval = Duration::from_secs(parse_interval_str(&interval)?);
    }

    let configs = store.list().await?;
    let watched = configs.iter().filter(|c| c.watched && c.id.is_some()).count();
    if watched == 0 {
        println!("No watched filter configurations yet. Save one with `jobwatch config save`.");
    }

    let bus = ChangeBus::new();
    let sources = WatcherSources {
        stats: client.clone(),
        timezone: client,
        store: Arc::new(local),
        notifier: Arc::new(TargetNotifier::new(config.default_notify.clone(), config.quiet_hours.clone())),
        changes: Arc::new(bus.clone()),
    };

    let (stop_tx, mut stop_rx) = mpsc::unbounded_channel::<()>();
    ctrlc::set_handler(move || {
        let _ = stop_tx.send(());
    })
    .map_err(|e| JobwatchError::ConfigError(format!("Failed to set Ctrl+C handler: {}", e)))?;

    let watcher = FilterWatcher::spawn(
        configs.iter().map(FilterConfiguration::tracked).collect(),
        sources,
        options.clone(),
    );
    let mut snapshots = watcher.subscribe();
    let mut session = Session { watcher, bus, store, configs };

    println!(
        "\njobwatch daemon watching {} configuration(s), every {}. Type `help` for commands.\n",
        watched,
        format_interval(options.poll_interval.as_secs())
    );
    info!(interval_secs = options.poll_interval.as_secs(), "Daemon started");

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;

    loop {
        tokio::select! {
            _ = stop_rx.recv() => {
                println!("\n\nShutting down...");
                break;
            }
            changed = snapshots.changed() => {
                if changed.is_err() {
                    break;
                }
                let fresh_check = {
                    let snapshot = snapshots.borrow_and_update();
                    snapshot.is_watching && snapshot.last_check_time.is_some()
                };
                if fresh_check {
                    session.print();
                }
            }
            line = lines.next_line(), if stdin_open => match line {
                Ok(Some(line)) => match DaemonCommand::parse(&line) {
                    Some(Ok(command)) => {
                        if let Err(e) = session.handle(command).await {
                            eprintln!("Error: {}", e);
                        }
                    }
                    Some(Err(message)) => println!("{}", message),
                    None => {}
                },
                Ok(None) => stdin_open = false,
                Err(e) => {
                    warn!(error = %e, "Stopped reading commands from stdin");
                    stdin_open = false;
                }
            }
        }
    }

    session.watcher.shutdown();
    Ok(())
}
