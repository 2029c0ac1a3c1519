//! jobwatch - watches saved job-search filters for new postings

use clap::Parser;
use colored::Colorize;
use tracing_subscriber::EnvFilter;

use jobwatch::cli::{Cli, Commands, ConfigCommands, NotifyCommands};
use jobwatch::error::Result;

mod commands;
mod utils;

fn init_tracing(verbose: bool) {
    let default = if verbose { "jobwatch=debug,info" } else { "jobwatch=info,warn" };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    init_tracing(cli.verbose);

    if let Err(e) = run(cli).await {
        eprintln!("{} {}", "Error:".red().bold(), e);
        if let Some(hint) = e.hint() {
            eprintln!("\n{}", hint);
        }
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::Daemon { interval } => commands::cmd_daemon(interval).await,
        Commands::Status { json } => commands::cmd_status(json).await,

        Commands::Config(command) => match command {
            ConfigCommands::List { verbose, json } => commands::cmd_config_list(verbose, json).await,
            ConfigCommands::Show { name, json } => commands::cmd_config_show(&name, json).await,
            ConfigCommands::Save { name, filters, notify, unwatched, force } => {
                commands::cmd_config_save(name, &filters, notify, unwatched, force).await
            }
            ConfigCommands::Edit { name, notify, watched } => {
                commands::cmd_config_edit(&name, notify, watched).await
            }
            ConfigCommands::Delete { name, yes } => commands::cmd_config_delete(&name, yes).await,
            ConfigCommands::Reorder { names } => commands::cmd_config_reorder(names).await,
            ConfigCommands::Export { name } => commands::cmd_config_export(name).await,
            ConfigCommands::Import { dry_run } => commands::cmd_config_import(dry_run).await,
        },

        Commands::Notify(command) => match command {
            NotifyCommands::Set {
                ntfy,
                slack,
                discord,
                gotify_server,
                gotify_token,
                command,
                telegram_token,
                telegram_chat,
                pushover_user,
                pushover_token,
                matrix_server,
                matrix_room,
                matrix_token,
            } => commands::cmd_notify_set(commands::TargetFlags {
                ntfy,
                slack,
                discord,
                gotify_server,
                gotify_token,
                command,
                telegram_token,
                telegram_chat,
                pushover_user,
                pushover_token,
                matrix_server,
                matrix_room,
                matrix_token,
            }),
            NotifyCommands::Show => commands::cmd_notify_show(),
            NotifyCommands::Test => commands::cmd_notify_test(),
            NotifyCommands::Quiet { start, end, disable } => commands::cmd_notify_quiet(start, end, disable),
        },

        Commands::Completions { shell } => commands::cmd_completions(shell),
    }
}
