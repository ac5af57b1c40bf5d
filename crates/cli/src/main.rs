//! Helpdesk CLI
//!
//! Triage and answer support tickets from the terminal.

mod cmd_messages;
mod cmd_tickets;
mod cmd_watch;
mod output;
mod session;

use std::path::PathBuf;

use clap::{CommandFactory, Parser, Subcommand};
use helpdesk_protocol::{MessageQuery, TicketStatus};
use helpdesk_sync::{init_logging, ConfigOverrides, SyncConfig, TicketFilter};

use crate::output::Output;

#[derive(Parser, Debug)]
#[command(name = "helpdesk", author, version, about)]
struct Cli {
    /// Base URL of the REST API
    #[arg(long, global = true)]
    api_url: Option<String>,
    /// WebSocket URL of the event channel
    #[arg(long, global = true)]
    channel_url: Option<String>,
    /// Channel room to join
    #[arg(long, global = true)]
    room: Option<String>,
    /// Bearer token for the REST API
    #[arg(long, global = true)]
    token: Option<String>,
    /// Directory holding config.toml and logs/
    #[arg(long, global = true)]
    data_dir: Option<PathBuf>,
    /// Machine-readable JSON output
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// List tickets
    Tickets {
        /// open, completed, closed or all
        #[arg(long)]
        status: Option<String>,
        /// Match against ticket id or username
        #[arg(long, default_value = "")]
        search: String,
    },
    /// Show the conversation of a ticket (marks it seen by the admin)
    Messages {
        ticket_id: String,
        #[arg(long)]
        page: Option<u32>,
        #[arg(long)]
        limit: Option<u32>,
    },
    /// Reply to a ticket as admin
    Reply { ticket_id: String, text: String },
    /// Change a ticket's status
    Status {
        ticket_id: String,
        status: TicketStatus,
    },
    /// Follow live events; lines typed on stdin are sent as replies
    Watch {
        /// Ticket to open right away
        #[arg(long)]
        ticket: Option<String>,
    },
    /// Print shell completions
    Completions { shell: clap_complete::Shell },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if let Command::Completions { shell } = cli.command {
        clap_complete::generate(shell, &mut Cli::command(), "helpdesk", &mut std::io::stdout());
        return Ok(());
    }

    let config = SyncConfig::resolve(ConfigOverrides {
        api_url: cli.api_url,
        channel_url: cli.channel_url,
        room: cli.room,
        api_token: cli.token,
        data_dir: cli.data_dir,
    })?;
    let logging = init_logging(&config.log_dir())?;
    tracing::info!(
        component = "cli",
        event = "cli.started",
        run_id = %logging.run_id,
        api_url = %config.api_url,
        "Helpdesk CLI started"
    );

    let out = Output::new(cli.json);
    match cli.command {
        Command::Tickets { status, search } => {
            cmd_tickets::run(&config, &out, TicketFilter { status, search }).await
        }
        Command::Messages {
            ticket_id,
            page,
            limit,
        } => cmd_messages::show(&config, &out, &ticket_id, MessageQuery { page, limit }).await,
        Command::Reply { ticket_id, text } => {
            cmd_messages::reply(&config, &out, &ticket_id, &text).await
        }
        Command::Status { ticket_id, status } => {
            cmd_messages::set_status(&config, &out, &ticket_id, status).await
        }
        Command::Watch { ticket } => cmd_watch::run(&config, &out, ticket).await,
        Command::Completions { .. } => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn cli_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_status_case_insensitively() {
        let cli = Cli::try_parse_from(["helpdesk", "status", "T1", "Completed"]).expect("parse");
        match cli.command {
            Command::Status { ticket_id, status } => {
                assert_eq!(ticket_id, "T1");
                assert_eq!(status, TicketStatus::Completed);
            }
            other => panic!("unexpected command: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_status() {
        assert!(Cli::try_parse_from(["helpdesk", "status", "T1", "archived"]).is_err());
    }

    #[test]
    fn global_flags_follow_subcommand() {
        let cli = Cli::try_parse_from([
            "helpdesk",
            "tickets",
            "--status",
            "open",
            "--json",
            "--room",
            "night-shift",
        ])
        .expect("parse");
        assert!(cli.json);
        assert_eq!(cli.room.as_deref(), Some("night-shift"));
        assert!(matches!(
            cli.command,
            Command::Tickets { status: Some(ref s), ref search } if s == "open" && search.is_empty()
        ));
    }
}
