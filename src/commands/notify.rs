//! Notification commands: set, show, test, quiet

use colored::Colorize;
use inquire::{Confirm, Select, Text};
use std::io::{self, Write};

use jobwatch::config::{Config, NotifyTarget, QuietHours};
use jobwatch::error::{JobwatchError, Result};
use jobwatch::notify::{send_notification, Notification};

use crate::utils::validate_hhmm;

/// Target flags accepted by `notify set`
#[derive(Debug, Default)]
pub struct TargetFlags {
    pub ntfy: Option<String>,
    pub slack: Option<String>,
    pub discord: Option<String>,
    pub gotify_server: Option<String>,
    pub gotify_token: Option<String>,
    pub command: Option<String>,
    pub telegram_token: Option<String>,
    pub telegram_chat: Option<String>,
    pub pushover_user: Option<String>,
    pub pushover_token: Option<String>,
    pub matrix_server: Option<String>,
    pub matrix_room: Option<String>,
    pub matrix_token: Option<String>,
}

fn paired<A, B>(
    a: Option<A>,
    b: Option<B>,
    missing: &str,
    build: impl FnOnce(A, B) -> NotifyTarget,
) -> Result<NotifyTarget> {
    match (a, b) {
        (Some(a), Some(b)) => Ok(build(a, b)),
        _ => Err(JobwatchError::ConfigError(missing.into())),
    }
}

/// Build a target from flags; `None` when no flag was given
pub fn target_from_flags(flags: TargetFlags) -> Result<Option<NotifyTarget>> {
    let target = if let Some(topic) = flags.ntfy {
        NotifyTarget::Ntfy { topic, server: None }
    } else if let Some(webhook_url) = flags.slack {
        NotifyTarget::Slack { webhook_url }
    } else if let Some(webhook_url) = flags.discord {
        NotifyTarget::Discord { webhook_url }
    } else if flags.gotify_server.is_some() || flags.gotify_token.is_some() {
        paired(
            flags.gotify_server,
            flags.gotify_token,
            "Gotify requires both --gotify-server and --gotify-token",
            |server, token| NotifyTarget::Gotify { server, token },
        )?
    } else if flags.telegram_token.is_some() || flags.telegram_chat.is_some() {
        paired(
            flags.telegram_token,
            flags.telegram_chat,
            "Telegram requires both --telegram-token and --telegram-chat",
            |bot_token, chat_id| NotifyTarget::Telegram { bot_token, chat_id },
        )?
    } else if flags.pushover_user.is_some() || flags.pushover_token.is_some() {
        paired(
            flags.pushover_user,
            flags.pushover_token,
            "Pushover requires both --pushover-user and --pushover-token",
            |user_key, api_token| NotifyTarget::Pushover { user_key, api_token },
        )?
    } else if flags.matrix_server.is_some() || flags.matrix_room.is_some() || flags.matrix_token.is_some() {
        match (flags.matrix_server, flags.matrix_room, flags.matrix_token) {
            (Some(homeserver), Some(room_id), Some(access_token)) => {
                NotifyTarget::Matrix { homeserver, room_id, access_token }
            }
            _ => {
                return Err(JobwatchError::ConfigError(
                    "Matrix requires --matrix-server, --matrix-room, and --matrix-token".into()
                ));
            }
        }
    } else if let Some(command) = flags.command {
        NotifyTarget::Command { command }
    } else {
        return Ok(None);
    };
    Ok(Some(target))
}

/// Set up notification target
pub fn cmd_notify_set(flags: TargetFlags) -> Result<()> {
    let mut config = Config::load()?;

    let target = match target_from_flags(flags)? {
        Some(target) => target,
        None => {
            println!("\nNotification Setup\n");
            match prompt_notification_setup()? {
                Some(target) => target,
                None => {
                    println!("\n  Notification setup cancelled.");
                    return Ok(());
                }
            }
        }
    };

    config.default_notify = Some(target.clone());
    config.save()?;
    println!("Notification settings saved.");

    if atty::is(atty::Stream::Stdin) {
        let test = Confirm::new("Send a test notification now?")
            .with_default(true)
            .prompt()
            .unwrap_or(false);
        if test {
            send_test(&target);
        }
    }
    Ok(())
}

/// Show current notification settings
pub fn cmd_notify_show() -> Result<()> {
    let config = Config::load()?;

    println!("\nNotification Settings\n");

    match &config.default_notify {
        Some(target) => println!("  Target: {}", describe_notify_target(target)),
        None => {
            println!("  No notification target configured.");
            println!("  Run `jobwatch notify set` to configure notifications.");
        }
    }

    match &config.quiet_hours {
        Some(quiet) => {
            let status = if quiet.is_quiet_now() {
                "ACTIVE NOW".yellow()
            } else {
                "scheduled".normal()
            };
            println!("\n  Quiet hours: {} - {} ({})", quiet.start, quiet.end, status);
        }
        None => println!("\n  Quiet hours: not configured"),
    }

    println!("  Title:       {}", config.watcher.notification_title);

    if let Ok(path) = Config::config_path() {
        println!("\n  Config file: {}", path.display());
    }

    Ok(())
}

/// Configure quiet hours
pub fn cmd_notify_quiet(start: Option<String>, end: Option<String>, disable: bool) -> Result<()> {
    let mut config = Config::load()?;

    if disable {
        config.quiet_hours = None;
        config.save()?;
        println!("Quiet hours disabled.");
        return Ok(());
    }

    let (start, end) = match (start, end) {
        (Some(s), Some(e)) => (s, e),
        (None, None) => {
            let start = Text::new("Quiet hours start time (HH:MM):")
                .with_default("22:00")
                .prompt()
                .map_err(|e| JobwatchError::ConfigError(e.to_string()))?;
            let end = Text::new("Quiet hours end time (HH:MM):")
                .with_default("08:00")
                .prompt()
                .map_err(|e| JobwatchError::ConfigError(e.to_string()))?;
            (start, end)
        }
        _ => {
            return Err(JobwatchError::ConfigError(
                "Both --start and --end are required".into()
            ));
        }
    };

    validate_hhmm("start", &start)?;
    validate_hhmm("end", &end)?;

    println!("Quiet hours set: {} to {}", start, end);
    config.quiet_hours = Some(QuietHours { start, end });
    config.save()?;
    println!("Job alerts will be held back during this time.");
    Ok(())
}

/// Send a test notification
pub fn cmd_notify_test() -> Result<()> {
    let config = Config::load()?;

    match &config.default_notify {
        Some(target) => send_test(target),
        None => {
            println!("\nNo notification target configured.");
            println!("Run `jobwatch notify set` to configure notifications.");
        }
    }
    Ok(())
}

fn send_test(target: &NotifyTarget) {
    print!("  Sending test... ");
    let _ = io::stdout().flush();

    let notification = Notification::new("New jobs found", "Test configuration (3)");
    match send_notification(target, &notification) {
        Ok(()) => println!("{}", "Success!".green()),
        Err(e) => {
            println!("{}", "Failed".red());
            println!("  Error: {}", e);
            println!("\n  Check your settings and try again with `jobwatch notify set`");
        }
    }
}

fn prompt_notification_setup() -> Result<Option<NotifyTarget>> {
    let options = vec![
        "ntfy.sh (easy push notifications)",
        "Gotify (self-hosted)",
        "Slack webhook",
        "Discord webhook",
        "Custom command",
        "Skip for now",
    ];

    let choice = Select::new("Where should new job alerts go?", options)
        .prompt()
        .map_err(|e| JobwatchError::ConfigError(e.to_string()))?;

    let ask = |label: &str| -> Result<String> {
        Text::new(label)
            .prompt()
            .map_err(|e| JobwatchError::ConfigError(e.to_string()))
    };

    let target = match choice {
        "ntfy.sh (easy push notifications)" => {
            let topic = Text::new("ntfy topic name:")
                .with_default("jobwatch-alerts")
                .prompt()
                .map_err(|e| JobwatchError::ConfigError(e.to_string()))?;
            println!("\n  Subscribe to https://ntfy.sh/{} in the ntfy app", topic);
            NotifyTarget::Ntfy { topic, server: None }
        }
        "Gotify (self-hosted)" => NotifyTarget::Gotify {
            server: ask("Gotify server URL:")?,
            token: ask("Gotify application token:")?,
        },
        "Slack webhook" => NotifyTarget::Slack { webhook_url: ask("Slack webhook URL:")? },
        "Discord webhook" => NotifyTarget::Discord { webhook_url: ask("Discord webhook URL:")? },
        "Custom command" => NotifyTarget::Command { command: ask("Command to run (receives JSON on stdin):")? },
        _ => return Ok(None),
    };
    Ok(Some(target))
}

/// One-line description of a target, with secrets left out
pub fn describe_notify_target(target: &NotifyTarget) -> String {
    match target {
        NotifyTarget::Command { command } => format!("command: {}", command),
        NotifyTarget::Ntfy { topic, server } => {
            format!("ntfy: {}/{}", server.as_deref().unwrap_or("https://ntfy.sh"), topic)
        }
        NotifyTarget::Slack { .. } => "Slack webhook".to_string(),
        NotifyTarget::Discord { .. } => "Discord webhook".to_string(),
        NotifyTarget::Gotify { server, .. } => format!("Gotify: {}", server),
        NotifyTarget::Telegram { chat_id, .. } => format!("Telegram chat {}", chat_id),
        NotifyTarget::Pushover { .. } => "Pushover".to_string(),
        NotifyTarget::Matrix { homeserver, room_id, .. } => format!("Matrix {} on {}", room_id, homeserver),
    }
}
