use std::io::Write;
use std::process::{Command, Stdio};
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use once_cell::sync::Lazy;
use serde::Serialize;
use tracing::{debug, info};

use crate::config::{NotifyTarget, QuietHours};
use crate::error::{JobwatchError, Result};
use crate::sources::NotificationService;

/// Shared HTTP agent for webhook deliveries
static NOTIFY_AGENT: Lazy<ureq::Agent> = Lazy::new(|| {
    ureq::Agent::config_builder()
        .timeout_global(Some(Duration::from_secs(15)))
        .build()
        .into()
});

/// Notification payload sent to all targets
#[derive(Debug, Clone, Serialize)]
pub struct Notification {
    pub title: String,
    pub body: String,
    pub detected_at: DateTime<Utc>,
}

impl Notification {
    pub fn new(title: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            body: body.into(),
            detected_at: Utc::now(),
        }
    }
}

/// Send a notification to the specified target
pub fn send_notification(target: &NotifyTarget, notification: &Notification) -> Result<()> {
    debug!(target = target.kind(), title = %notification.title, "Sending notification");

    match target {
        NotifyTarget::Command { command } => send_command(command, notification),
        NotifyTarget::Ntfy { topic, server } => send_ntfy(topic, server.as_deref(), notification),
        NotifyTarget::Slack { webhook_url } => send_slack(webhook_url, notification),
        NotifyTarget::Discord { webhook_url } => send_discord(webhook_url, notification),
        NotifyTarget::Gotify { server, token } => send_gotify(server, token, notification),
        NotifyTarget::Telegram { bot_token, chat_id } => send_telegram(bot_token, chat_id, notification),
        NotifyTarget::Pushover { user_key, api_token } => send_pushover(user_key, api_token, notification),
        NotifyTarget::Matrix { homeserver, room_id, access_token } => {
            send_matrix(homeserver, room_id, access_token, notification)
        }
    }
}

/// Send notification via custom command (JSON on stdin)
fn send_command(command: &str, notification: &Notification) -> Result<()> {
    let json = serde_json::to_string(notification)?;

    let mut child = Command::new("sh")
        .args(["-c", command])
        .stdin(Stdio::piped())
        .stdout(Stdio::null())
        .stderr(Stdio::piped())
        .spawn()?;

    if let Some(ref mut stdin) = child.stdin {
        stdin.write_all(json.as_bytes())?;
    }

    let output = child.wait_with_output()?;

    if !output.status.success() {
        let stderr = String::from_utf8_lossy(&output.stderr);
        return Err(JobwatchError::NotificationError(format!(
            "Command failed: {}",
            stderr
        )));
    }

    Ok(())
}

/// Send notification via ntfy
fn send_ntfy(topic: &str, server: Option<&str>, notification: &Notification) -> Result<()> {
    let server = server.unwrap_or("https://ntfy.sh");
    let url = format!("{}/{}", server.trim_end_matches('/'), topic);

    NOTIFY_AGENT
        .post(&url)
        .header("Title", &notification.title)
        .header("Priority", "default")
        .header("Tags", "briefcase")
        .send(&notification.body)?;

    Ok(())
}

fn slack_payload(notification: &Notification) -> serde_json::Value {
    serde_json::json!({
        "text": format!("*{}*\n{}", notification.title, notification.body),
        "blocks": [
            {
                "type": "header",
                "text": {
                    "type": "plain_text",
                    "text": notification.title
                }
            },
            {
                "type": "section",
                "text": {
                    "type": "mrkdwn",
                    "text": notification.body
                }
            }
        ]
    })
}

/// Send notification via Slack webhook
fn send_slack(webhook_url: &str, notification: &Notification) -> Result<()> {
    NOTIFY_AGENT
        .post(webhook_url)
        .header("Content-Type", "application/json")
        .send_json(&slack_payload(notification))?;

    Ok(())
}

fn discord_payload(notification: &Notification) -> serde_json::Value {
    serde_json::json!({
        "embeds": [
            {
                "title": notification.title,
                "description": notification.body,
                "color": 5814783, // Blue color
                "timestamp": notification.detected_at.to_rfc3339(),
                "footer": {
                    "text": "jobwatch"
                }
            }
        ]
    })
}

/// Send notification via Discord webhook
fn send_discord(webhook_url: &str, notification: &Notification) -> Result<()> {
    NOTIFY_AGENT
        .post(webhook_url)
        .header("Content-Type", "application/json")
        .send_json(&discord_payload(notification))?;

    Ok(())
}

/// Send notification via Gotify
fn send_gotify(server: &str, token: &str, notification: &Notification) -> Result<()> {
    let url = format!("{}/message?token={}", server.trim_end_matches('/'), token);

    let gotify_payload = serde_json::json!({
        "title": notification.title,
        "message": notification.body,
        "priority": 5,
        "extras": {
            "client::display": {
                "contentType": "text/plain"
            }
        }
    });

    NOTIFY_AGENT
        .post(&url)
        .header("Content-Type", "application/json")
        .send_json(&gotify_payload)?;

    Ok(())
}

/// Send notification via Telegram Bot API
fn send_telegram(bot_token: &str, chat_id: &str, notification: &Notification) -> Result<()> {
    let url = format!("https://api.telegram.org/bot{}/sendMessage", bot_token);

    let telegram_payload = serde_json::json!({
        "chat_id": chat_id,
        "text": format!("<b>{}</b>\n\n{}", notification.title, notification.body),
        "parse_mode": "HTML",
        "disable_web_page_preview": true
    });

    NOTIFY_AGENT
        .post(&url)
        .header("Content-Type", "application/json")
        .send_json(&telegram_payload)?;

    Ok(())
}

/// Send notification via Pushover
fn send_pushover(user_key: &str, api_token: &str, notification: &Notification) -> Result<()> {
    let pushover_payload = serde_json::json!({
        "token": api_token,
        "user": user_key,
        "title": notification.title,
        "message": notification.body
    });

    NOTIFY_AGENT
        .post("https://api.pushover.net/1/messages.json")
        .header("Content-Type", "application/json")
        .send_json(&pushover_payload)?;

    Ok(())
}

/// Send notification via Matrix
fn send_matrix(
    homeserver: &str,
    room_id: &str,
    access_token: &str,
    notification: &Notification,
) -> Result<()> {
    // Room IDs contain '!' and ':'
    let encoded_room = urlencoding::encode(room_id);
    let txn_id = uuid::Uuid::new_v4().to_string();

    let url = format!(
        "{}/_matrix/client/r0/rooms/{}/send/m.room.message/{}",
        homeserver.trim_end_matches('/'),
        encoded_room,
        txn_id
    );

    let matrix_payload = serde_json::json!({
        "msgtype": "m.text",
        "body": format!("{}\n\n{}", notification.title, notification.body),
        "format": "org.matrix.custom.html",
        "formatted_body": format!("<b>{}</b><br/><br/>{}", notification.title, notification.body)
    });

    NOTIFY_AGENT
        .put(&url)
        .header("Content-Type", "application/json")
        .header("Authorization", &format!("Bearer {}", access_token))
        .send_json(&matrix_payload)?;

    Ok(())
}

/// [`NotificationService`] backed by a configured [`NotifyTarget`].
///
/// Permission is granted once a target is configured. Deliveries during quiet hours are
/// dropped.
pub struct TargetNotifier {
    target: Option<NotifyTarget>,
    quiet_hours: Option<QuietHours>,
    granted: AtomicBool,
}

impl TargetNotifier {
    pub fn new(target: Option<NotifyTarget>, quiet_hours: Option<QuietHours>) -> Self {
        Self { target, quiet_hours, granted: AtomicBool::new(false) }
    }
}

#[async_trait]
impl NotificationService for TargetNotifier {
    async fn request_permission(&self) -> bool {
        let granted = self.target.is_some();
        if !granted {
            info!("No notification target configured; run `jobwatch notify set` to enable alerts");
        }
        self.granted.store(granted, Ordering::SeqCst);
        granted
    }

    fn has_permission(&self) -> bool {
        self.granted.load(Ordering::SeqCst)
    }

    async fn notify(&self, title: &str, body: &str) -> Result<()> {
        if !self.has_permission() {
            return Ok(());
        }
        let Some(target) = self.target.clone() else {
            return Ok(());
        };
        if self.quiet_hours.as_ref().is_some_and(QuietHours::is_quiet_now) {
            info!(title, "Quiet hours, notification suppressed");
            return Ok(());
        }

        let notification = Notification::new(title, body);
        tokio::task::spawn_blocking(move || send_notification(&target, &notification)).await?
    }
}
