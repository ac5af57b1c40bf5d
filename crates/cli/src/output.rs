//! Table / JSON rendering for the CLI.

use comfy_table::presets::UTF8_FULL;
use comfy_table::{Cell, Color, ContentArrangement, Table};
use console::style;
use helpdesk_protocol::{Message, Role, Ticket, TicketStatus};
use helpdesk_sync::Notification;
use serde_json::{json, Value};

#[derive(Debug, Clone, Copy)]
pub struct Output {
    json: bool,
}

impl Output {
    pub fn new(json: bool) -> Self {
        Self { json }
    }

    pub fn is_json(&self) -> bool {
        self.json
    }

    pub fn tickets(&self, tickets: &[Ticket]) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string_pretty(tickets)?);
            return Ok(());
        }
        if tickets.is_empty() {
            self.note("No tickets.");
            return Ok(());
        }
        println!("{}", ticket_table(tickets));
        Ok(())
    }

    pub fn messages(&self, ticket_id: &str, messages: &[Message]) -> anyhow::Result<()> {
        if self.json {
            let value = json!({ "ticketId": ticket_id, "messages": messages });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
        println!("{}", style(format!("Ticket {ticket_id}")).bold());
        if messages.is_empty() {
            self.note("No messages.");
        }
        for message in messages {
            self.message(message)?;
        }
        Ok(())
    }

    /// One conversation line
    pub fn message(&self, message: &Message) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(message)?);
            return Ok(());
        }
        let who = match message.sender {
            Role::Admin => style("admin").green(),
            Role::User => style("user ").yellow(),
        };
        let read = if message.is_read { " " } else { "*" };
        let when = message.created_at.as_deref().unwrap_or("");
        println!("{} {} {}  {}", read, who, style(when).dim(), message.text);
        Ok(())
    }

    pub fn sent(&self, ticket_id: &str, message: &Message, broadcast: bool) -> anyhow::Result<()> {
        if self.json {
            let value = json!({ "ticketId": ticket_id, "message": message, "broadcast": broadcast });
            println!("{}", serde_json::to_string_pretty(&value)?);
            return Ok(());
        }
        println!(
            "{} reply sent to {}{}",
            style("✓").green(),
            ticket_id,
            if broadcast { "" } else { " (not broadcast)" }
        );
        Ok(())
    }

    pub fn notification(&self, notification: &Notification) -> anyhow::Result<()> {
        if self.json {
            println!("{}", serde_json::to_string(&notification_json(notification))?);
            return Ok(());
        }
        let line = notification.to_string();
        match notification {
            Notification::Error { .. } => eprintln!("{} {}", style("!").red().bold(), line),
            Notification::NewTicket { .. } => println!("{} {}", style("+").cyan().bold(), line),
            Notification::StatusUpdated { .. } => println!("{} {}", style("~").blue(), line),
        }
        Ok(())
    }

    pub fn note(&self, text: &str) {
        if !self.json {
            println!("{}", style(text).dim());
        }
    }

    pub fn warn(&self, text: &str) {
        eprintln!("{} {}", style("warning:").yellow().bold(), text);
    }
}

fn ticket_table(tickets: &[Ticket]) -> Table {
    let mut table = Table::new();
    table
        .load_preset(UTF8_FULL)
        .set_content_arrangement(ContentArrangement::Dynamic)
        .set_header(vec!["ID", "Status", "User", "Subject", "Unread", "User unread"]);

    for ticket in tickets {
        let unread = Cell::new(ticket.unread_messages.admin);
        let unread = if ticket.unread_messages.admin > 0 {
            unread.fg(Color::Yellow)
        } else {
            unread
        };
        table.add_row(vec![
            Cell::new(&ticket.id),
            Cell::new(ticket.status).fg(status_color(ticket.status)),
            Cell::new(&ticket.user.username),
            Cell::new(&ticket.subject),
            unread,
            Cell::new(ticket.unread_messages.user),
        ]);
    }
    table
}

fn status_color(status: TicketStatus) -> Color {
    match status {
        TicketStatus::Open => Color::Green,
        TicketStatus::Completed => Color::Blue,
        TicketStatus::Closed => Color::DarkGrey,
    }
}

pub fn notification_json(notification: &Notification) -> Value {
    match notification {
        Notification::NewTicket {
            ticket_id,
            subject,
            username,
        } => json!({
            "kind": "new_ticket",
            "ticketId": ticket_id,
            "subject": subject,
            "username": username,
        }),
        Notification::StatusUpdated { ticket_id, status } => json!({
            "kind": "status_updated",
            "ticketId": ticket_id,
            "status": status,
        }),
        Notification::Error { op, message } => json!({
            "kind": "error",
            "op": op.as_str(),
            "message": message,
        }),
    }
}
