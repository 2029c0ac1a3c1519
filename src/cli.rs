use clap::{Parser, Subcommand, ValueEnum};

/// Shell types for completion generation
#[derive(Clone, Copy, Debug, ValueEnum)]
pub enum CompletionShell {
    Bash,
    Zsh,
    Fish,
    Powershell,
}

#[derive(Parser)]
#[command(name = "jobwatch")]
#[command(author, version, about = "Watches saved job-search filters for new postings", long_about = None)]
#[command(after_help = r#"Examples:
  jobwatch config save "Remote Rust" --filters '{"q":"rust","remote":true}' --notify
  jobwatch config list                         List saved filter configurations
  jobwatch status                              New matches since the last check
  jobwatch daemon                              Watch in the foreground

Quick Start:
  1. JOBWATCH_API_URL=http://localhost:8000 jobwatch config list
  2. jobwatch notify set --ntfy my-job-alerts
  3. jobwatch daemon
"#)]
pub struct Cli {
    /// Show debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Watch saved filter configurations in the foreground
    #[command(after_help = r#"Examples:
  jobwatch daemon                  Poll every 5 minutes (default)
  jobwatch daemon --interval 1m    Poll every minute

While running, type a command and press Enter:
  reset <name>   Clear the new-item count for one configuration
  stop           Pause watching
  start          Resume watching from now
  changed        Report that job data changed (debounced check)
  reload         Re-read the configuration list
"#)]
    Daemon {
        /// Poll interval (e.g., 30s, 5m, 1h) - defaults to the config file setting
        #[arg(long)]
        interval: Option<String>,
    },

    /// Show new matches since the last recorded check
    Status {
        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Manage saved filter configurations
    #[command(subcommand)]
    Config(ConfigCommands),

    /// Configure notifications
    #[command(subcommand)]
    Notify(NotifyCommands),

    /// Generate shell completions
    #[command(after_help = r#"Examples:
  jobwatch completions bash >> ~/.bashrc
  jobwatch completions zsh >> ~/.zshrc
  jobwatch completions fish > ~/.config/fish/completions/jobwatch.fish
"#)]
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: CompletionShell,
    },
}

#[derive(Subcommand)]
pub enum ConfigCommands {
    /// List saved filter configurations
    List {
        /// Show flags and filters
        #[arg(short, long)]
        verbose: bool,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Show one configuration
    Show {
        /// Configuration name
        name: String,

        /// Output as JSON
        #[arg(long)]
        json: bool,
    },

    /// Save a new configuration (--force overwrites one with the same name)
    #[command(after_help = r#"Examples:
  jobwatch config save "Berlin Backend" --filters '{"q":"backend","location":"Berlin"}'
  jobwatch config save "Remote Rust" --filters '{"q":"rust"}' --notify
"#)]
    Save {
        /// Configuration name
        name: String,

        /// Filter criteria as a JSON object
        #[arg(long, default_value = "{}")]
        filters: String,

        /// Send notifications when new jobs match
        #[arg(long)]
        notify: bool,

        /// Save without watching it
        #[arg(long)]
        unwatched: bool,

        /// Overwrite an existing configuration with the same name
        #[arg(long)]
        force: bool,
    },

    /// Change the flags of a configuration
    Edit {
        /// Configuration name
        name: String,

        /// Enable or disable notifications
        #[arg(long)]
        notify: Option<bool>,

        /// Enable or disable watching
        #[arg(long)]
        watched: Option<bool>,
    },

    /// Delete a configuration
    Delete {
        /// Configuration name
        name: String,

        /// Skip confirmation
        #[arg(short = 'y', long)]
        yes: bool,
    },

    /// Move configurations to the front of the list, in the given order
    Reorder {
        /// Configuration names
        #[arg(required = true)]
        names: Vec<String>,
    },

    /// Export configurations to JSON (stdout)
    Export {
        /// Configuration name (exports all if not specified)
        name: Option<String>,
    },

    /// Import configurations from JSON (stdin)
    Import {
        /// Preview without saving
        #[arg(long)]
        dry_run: bool,
    },
}

#[derive(Subcommand)]
pub enum NotifyCommands {
    /// Set up notification target (interactive or via flags)
    Set {
        /// ntfy topic (e.g., my-topic)
        #[arg(long)]
        ntfy: Option<String>,

        /// Slack webhook URL
        #[arg(long)]
        slack: Option<String>,

        /// Discord webhook URL
        #[arg(long)]
        discord: Option<String>,

        /// Gotify server URL (e.g., https://gotify.example.com)
        #[arg(long)]
        gotify_server: Option<String>,

        /// Gotify application token
        #[arg(long)]
        gotify_token: Option<String>,

        /// Custom command to execute (receives JSON on stdin)
        #[arg(long)]
        command: Option<String>,

        /// Telegram bot token
        #[arg(long)]
        telegram_token: Option<String>,

        /// Telegram chat ID
        #[arg(long)]
        telegram_chat: Option<String>,

        /// Pushover user key
        #[arg(long)]
        pushover_user: Option<String>,

        /// Pushover API token
        #[arg(long)]
        pushover_token: Option<String>,

        /// Matrix homeserver URL
        #[arg(long)]
        matrix_server: Option<String>,

        /// Matrix room ID
        #[arg(long)]
        matrix_room: Option<String>,

        /// Matrix access token
        #[arg(long)]
        matrix_token: Option<String>,
    },

    /// Show current notification settings
    Show,

    /// Send a test notification
    Test,

    /// Configure quiet hours (suppress notifications during this time)
    Quiet {
        /// Start time in HH:MM format (e.g., "22:00")
        #[arg(long)]
        start: Option<String>,

        /// End time in HH:MM format (e.g., "08:00")
        #[arg(long)]
        end: Option<String>,

        /// Disable quiet hours
        #[arg(long)]
        disable: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn test_cli_is_well_formed() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_parse_reorder() {
        let cli = Cli::try_parse_from(["jobwatch", "config", "reorder", "B", "A"]).unwrap();
        match cli.command {
            Commands::Config(ConfigCommands::Reorder { names }) => assert_eq!(names, vec!["B", "A"]),
            _ => panic!("expected reorder"),
        }
    }

    #[test]
    fn test_reorder_requires_names() {
        assert!(Cli::try_parse_from(["jobwatch", "config", "reorder"]).is_err());
    }
}
