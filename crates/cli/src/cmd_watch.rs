//! `helpdesk watch`: follow live events and answer from stdin.
//!
//! Lines typed on stdin are replies to the open ticket. `/open <id>` and
//! `/close` switch the open ticket, `/tickets` reprints the list.

use std::time::Duration;

use helpdesk_protocol::{Message, MessageQuery, Role};
use helpdesk_sync::{SupportSessionHandle, SyncConfig, SyncSnapshot, TicketFilter};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::error::RecvError;
use tokio::sync::mpsc;

use crate::output::Output;
use crate::session::Connected;

const REFRESH_INTERVAL: Duration = Duration::from_millis(200);
const INPUT_QUEUE: usize = 16;

#[derive(Debug, PartialEq, Eq)]
enum WatchInput {
    Open(String),
    Close,
    Tickets,
    Reply(String),
    Unknown(String),
    Empty,
}

fn parse_input(line: &str) -> WatchInput {
    let line = line.trim();
    if line.is_empty() {
        return WatchInput::Empty;
    }
    let Some(command) = line.strip_prefix('/') else {
        return WatchInput::Reply(line.to_string());
    };
    let mut parts = command.splitn(2, char::is_whitespace);
    match (parts.next(), parts.next().map(str::trim)) {
        (Some("open"), Some(id)) if !id.is_empty() => WatchInput::Open(id.to_string()),
        (Some("close"), None) => WatchInput::Close,
        (Some("tickets"), None) => WatchInput::Tickets,
        _ => WatchInput::Unknown(line.to_string()),
    }
}

/// Identity of a printed line. Read flags are left out so marking the
/// conversation read does not reprint it.
#[derive(Debug, PartialEq, Eq)]
struct Shown {
    id: Option<String>,
    sender: Role,
    text: String,
}

impl From<&Message> for Shown {
    fn from(message: &Message) -> Self {
        Self {
            id: message.id.clone(),
            sender: message.sender,
            text: message.text.clone(),
        }
    }
}

/// What has to be printed to bring the screen up to a snapshot
#[derive(Debug, PartialEq, Eq)]
struct Pending<'a> {
    /// The open ticket changed; carries the new one
    switched: Option<Option<&'a str>>,
    /// Lines already on screen no longer lead the list
    reprint: bool,
    messages: &'a [Message],
}

/// Tracks which part of the open conversation is already on screen
#[derive(Default)]
struct Printed {
    revision: u64,
    ticket: Option<String>,
    shown: Vec<Shown>,
}

impl Printed {
    fn pending<'a>(&mut self, snapshot: &'a SyncSnapshot) -> Option<Pending<'a>> {
        if snapshot.revision == self.revision {
            return None;
        }
        self.revision = snapshot.revision;

        let switched = if snapshot.open_ticket != self.ticket {
            self.ticket = snapshot.open_ticket.clone();
            self.shown.clear();
            Some(snapshot.open_ticket.as_deref())
        } else {
            None
        };

        // A history load replaces the list, possibly around lines printed
        // from live events; start over unless the screen is still a prefix.
        let still_prefix = self.shown.len() <= snapshot.messages.len()
            && self
                .shown
                .iter()
                .zip(&snapshot.messages)
                .all(|(shown, message)| *shown == Shown::from(message));
        let reprint = !still_prefix;
        let from = if reprint { 0 } else { self.shown.len() };

        self.shown = snapshot.messages.iter().map(Shown::from).collect();
        Some(Pending {
            switched,
            reprint,
            messages: &snapshot.messages[from..],
        })
    }

    fn catch_up(&mut self, handle: &SupportSessionHandle, out: &Output) -> anyhow::Result<()> {
        let snapshot = handle.snapshot();
        let Some(pending) = self.pending(&snapshot) else {
            return Ok(());
        };
        match pending.switched {
            Some(Some(id)) => out.note(&format!("-- {id} --")),
            Some(None) => out.note("-- no ticket open --"),
            None if pending.reprint => out.note("-- history loaded --"),
            None => {}
        }
        for message in pending.messages {
            out.message(message)?;
        }
        if (pending.switched.is_some() || pending.reprint) && snapshot.unread_from_user > 0 {
            out.note(&format!("{} unread from user", snapshot.unread_from_user));
        }
        Ok(())
    }
}

pub async fn run(config: &SyncConfig, out: &Output, ticket: Option<String>) -> anyhow::Result<()> {
    let out = *out;
    let mut session = Connected::live(config).await?;
    let handle = session.handle.clone();
    let mut notifications = handle.subscribe_notifications();

    handle.load_tickets().await?;
    out.tickets(&handle.filtered(&TicketFilter::default()))?;
    if let Some(ticket_id) = ticket {
        handle.open_ticket(ticket_id, MessageQuery::default()).await?;
    }
    out.note("Type to reply, /open <id>, /close, /tickets. Ctrl-C to quit.");

    let mut printed = Printed::default();
    printed.catch_up(&handle, &out)?;

    // REST calls have no timeout, so they run off the event loop.
    let (input_tx, input_rx) = mpsc::channel(INPUT_QUEUE);
    let worker = tokio::spawn(input_worker(handle.clone(), out, input_rx));

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    let mut stdin_open = true;
    let mut refresh = tokio::time::interval(REFRESH_INTERVAL);

    loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break,

            _ = session.channel_closed() => {
                out.warn("event channel closed by the server");
                break;
            }

            notification = notifications.recv() => match notification {
                Ok(notification) => out.notification(&notification)?,
                Err(RecvError::Lagged(skipped)) => {
                    out.warn(&format!("missed {skipped} notifications"));
                }
                Err(RecvError::Closed) => break,
            },

            line = lines.next_line(), if stdin_open => match line? {
                Some(line) => {
                    if !queue_input(&input_tx, parse_input(&line)) {
                        out.warn("still busy with earlier input, line dropped");
                    }
                }
                None => stdin_open = false,
            },

            _ = refresh.tick() => {}
        }
        printed.catch_up(&handle, &out)?;
    }

    worker.abort();
    drop(handle);
    session.shutdown().await;
    Ok(())
}

/// Hand a line to the worker without waiting; false when the queue is full
fn queue_input(tx: &mpsc::Sender<WatchInput>, input: WatchInput) -> bool {
    match input {
        WatchInput::Empty => true,
        input => tx.try_send(input).is_ok(),
    }
}

/// Runs stdin input one at a time so replies keep their order
async fn input_worker(
    handle: SupportSessionHandle,
    out: Output,
    mut input_rx: mpsc::Receiver<WatchInput>,
) {
    while let Some(input) = input_rx.recv().await {
        if let Err(e) = handle_input(&handle, &out, input).await {
            out.warn(&format!("{e:#}"));
        }
    }
}

async fn handle_input(
    handle: &SupportSessionHandle,
    out: &Output,
    input: WatchInput,
) -> anyhow::Result<()> {
    match input {
        WatchInput::Empty => {}
        WatchInput::Open(ticket_id) => {
            // Failures also arrive as notifications.
            if let Err(e) = handle.open_ticket(ticket_id, MessageQuery::default()).await {
                tracing::debug!(
                    component = "cli",
                    event = "cli.watch.open_failed",
                    error = %e,
                    "Open failed"
                );
            }
        }
        WatchInput::Close => handle.close_ticket().await?,
        WatchInput::Tickets => out.tickets(&handle.filtered(&TicketFilter::default()))?,
        WatchInput::Reply(text) => match handle.send_message(text).await {
            Ok(message) => tracing::debug!(
                component = "cli",
                event = "cli.watch.sent",
                message_id = ?message.id,
                "Reply sent"
            ),
            Err(e) => out.warn(&e.to_string()),
        },
        WatchInput::Unknown(line) => out.warn(&format!("unknown command: {line}")),
    }
    Ok(())
}
