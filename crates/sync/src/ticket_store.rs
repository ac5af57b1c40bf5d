//! Ticket store: the cached list of support tickets and their unread counters.

use helpdesk_protocol::{Role, Ticket, TicketStatus};
use tracing::debug;

/// Known tickets in server order. Tickets are never removed client-side.
#[derive(Debug, Clone, Default)]
pub struct TicketStore {
    tickets: Vec<Ticket>,
}

impl TicketStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the whole collection with a fresh list fetch
    pub fn replace_all(&mut self, tickets: Vec<Ticket>) {
        self.tickets = tickets;
    }

    /// Insert a ticket announced by an event unless one with that id is known.
    /// Returns whether it was inserted.
    pub fn upsert_from_event(&mut self, ticket: Ticket) -> bool {
        if self.tickets.iter().any(|t| t.id == ticket.id) {
            debug!(
                component = "ticket_store",
                event = "ticket_store.upsert.known",
                ticket_id = %ticket.id,
                "Ticket already known, keeping cached copy"
            );
            return false;
        }
        self.tickets.push(ticket);
        true
    }

    /// Bump one role's unread counter. Unknown tickets are ignored: an event
    /// can arrive before the list fetch that would contain the ticket.
    pub fn increment_unread(&mut self, ticket_id: &str, role: Role) -> bool {
        match self.get_mut(ticket_id) {
            Some(ticket) => {
                ticket.unread_messages.increment(role);
                true
            }
            None => {
                debug!(
                    component = "ticket_store",
                    event = "ticket_store.unread.unknown_ticket",
                    ticket_id = %ticket_id,
                    role = %role,
                    "Unread increment for unknown ticket ignored"
                );
                false
            }
        }
    }

    pub fn reset_unread(&mut self, ticket_id: &str) {
        if let Some(ticket) = self.get_mut(ticket_id) {
            ticket.unread_messages.reset_all();
        }
    }

    pub fn reset_role_unread(&mut self, ticket_id: &str, role: Role) {
        if let Some(ticket) = self.get_mut(ticket_id) {
            ticket.unread_messages.reset(role);
        }
    }

    /// Mirror a status change the server already confirmed
    pub fn update_status(&mut self, ticket_id: &str, status: TicketStatus) -> bool {
        match self.get_mut(ticket_id) {
            Some(ticket) => {
                ticket.status = status;
                true
            }
            None => false,
        }
    }

    pub fn get(&self, ticket_id: &str) -> Option<&Ticket> {
        self.tickets.iter().find(|t| t.id == ticket_id)
    }

    fn get_mut(&mut self, ticket_id: &str) -> Option<&mut Ticket> {
        self.tickets.iter_mut().find(|t| t.id == ticket_id)
    }

    pub fn tickets(&self) -> &[Ticket] {
        &self.tickets
    }

    pub fn len(&self) -> usize {
        self.tickets.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tickets.is_empty()
    }

    /// Sum of one role's unread counters across all tickets
    pub fn total_unread(&self, role: Role) -> u64 {
        self.tickets
            .iter()
            .map(|t| u64::from(t.unread_messages.get(role)))
            .sum()
    }
}

/// Status + free-text filter used by list views
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TicketFilter {
    /// Exact status name, compared case-insensitively. `None`, empty or
    /// `all` match every ticket.
    pub status: Option<String>,
    /// Substring of the ticket id or the end user's username
    pub search: String,
}

impl TicketFilter {
    pub fn matches(&self, ticket: &Ticket) -> bool {
        self.matches_status(ticket) && self.matches_search(ticket)
    }

    fn matches_status(&self, ticket: &Ticket) -> bool {
        match self.status.as_deref().map(str::trim) {
            None | Some("") => true,
            Some(status) if status.eq_ignore_ascii_case("all") => true,
            Some(status) => status.eq_ignore_ascii_case(ticket.status.as_str()),
        }
    }

    fn matches_search(&self, ticket: &Ticket) -> bool {
        let needle = self.search.trim().to_lowercase();
        if needle.is_empty() {
            return true;
        }
        ticket.id.to_lowercase().contains(&needle)
            || ticket.user.username.to_lowercase().contains(&needle)
    }
}

/// Tickets passing both filters, in input order
pub fn filter_tickets<'a>(tickets: &'a [Ticket], filter: &TicketFilter) -> Vec<&'a Ticket> {
    tickets.iter().filter(|t| filter.matches(t)).collect()
}
