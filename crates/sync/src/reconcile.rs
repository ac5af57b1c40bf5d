//! Pure state transition function
//!
//! Every change to the ticket and message caches goes through
//! `transition(state, input) -> (state, effects)`. Inputs are channel events
//! and REST results; effects are outbound channel frames and operator
//! notifications for the caller to execute. No IO, no async, no locking.
//!
//! The open ticket is read from `state` when each input is applied, so the
//! routing decision always sees the current selection.

use helpdesk_protocol::{
    ClientEvent, Message, MessagePayload, Receipt, Role, ServerEvent, Ticket, TicketStatus,
};
use tracing::{debug, info};

use crate::message_store::MessageStore;
use crate::ticket_store::TicketStore;

// ---------------------------------------------------------------------------
// SyncState: everything the session caches
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, Default)]
pub struct SyncState {
    pub tickets: TicketStore,
    pub messages: MessageStore,
    pub open_ticket: Option<String>,
    /// Bumped on every ticket open; a load carrying an older value is stale.
    pub load_generation: u64,
}

impl SyncState {
    pub fn is_open(&self, ticket_id: &str) -> bool {
        self.open_ticket.as_deref() == Some(ticket_id)
    }

    fn user_id_of(&self, ticket_id: &str) -> Option<String> {
        self.tickets.get(ticket_id).map(|t| t.user.id.clone())
    }
}

// ---------------------------------------------------------------------------
// Input
// ---------------------------------------------------------------------------

/// REST operation a failure belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestOp {
    LoadTickets,
    LoadMessages,
    SendMessage,
    UpdateStatus,
}

impl RequestOp {
    pub fn as_str(self) -> &'static str {
        match self {
            RequestOp::LoadTickets => "load_tickets",
            RequestOp::LoadMessages => "load_messages",
            RequestOp::SendMessage => "send_message",
            RequestOp::UpdateStatus => "update_status",
        }
    }
}

#[derive(Debug, Clone)]
pub enum Input {
    /// A frame pushed over the duplex channel
    Event(ServerEvent),
    TicketsLoaded(Vec<Ticket>),
    TicketOpened {
        ticket_id: String,
    },
    TicketClosed,
    MessagesLoaded {
        ticket_id: String,
        generation: u64,
        messages: Vec<Message>,
    },
    /// The server confirmed an admin reply
    MessageSent {
        ticket_id: String,
        message: Message,
    },
    StatusUpdated {
        ticket_id: String,
        status: TicketStatus,
    },
    RequestFailed {
        op: RequestOp,
        error: String,
    },
}

impl From<ServerEvent> for Input {
    fn from(event: ServerEvent) -> Self {
        Input::Event(event)
    }
}

// ---------------------------------------------------------------------------
// Effects: describe IO to be executed by the caller
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Effect {
    Publish(Box<ClientEvent>),
    Notify(Notification),
}

/// Non-blocking operator notification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    NewTicket {
        ticket_id: String,
        subject: String,
        username: String,
    },
    StatusUpdated {
        ticket_id: String,
        status: TicketStatus,
    },
    Error {
        op: RequestOp,
        message: String,
    },
}

impl std::fmt::Display for Notification {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Notification::NewTicket {
                ticket_id,
                subject,
                username,
            } => write!(f, "New ticket {} from {}: {}", ticket_id, username, subject),
            Notification::StatusUpdated { ticket_id, status } => {
                write!(f, "Ticket {} is now {}", ticket_id, status)
            }
            Notification::Error { op, message } => {
                write!(f, "{} failed: {}", op.as_str(), message)
            }
        }
    }
}

// ---------------------------------------------------------------------------
// transition(), the pure core
// ---------------------------------------------------------------------------

/// Pure, synchronous state transition.
///
/// Given the current state and an input, returns the new state and the
/// effects (channel publishes, notifications) to execute.
pub fn transition(mut state: SyncState, input: Input) -> (SyncState, Vec<Effect>) {
    let mut effects: Vec<Effect> = Vec::new();

    match input {
        // -- Channel events ---------------------------------------------------
        Input::Event(ServerEvent::NewMessage(MessagePayload { ticket_id, message })) => {
            if state.is_open(&ticket_id) {
                let sender = message.sender;
                let appended = state.messages.append(message);
                debug!(
                    component = "reconcile",
                    event = "reconcile.new_message.append",
                    ticket_id = %ticket_id,
                    sender = %sender,
                    appended,
                    "Message for open ticket"
                );

                // Only our own messages solicit a receipt from the end user.
                if appended && sender == Role::Admin {
                    let user_id = state.user_id_of(&ticket_id);
                    effects.push(Effect::Publish(Box::new(ClientEvent::SeenRequest(
                        Receipt::from_admin(ticket_id, user_id),
                    ))));
                }
            } else {
                state.tickets.increment_unread(&ticket_id, Role::Admin);
                debug!(
                    component = "reconcile",
                    event = "reconcile.new_message.unread",
                    ticket_id = %ticket_id,
                    "Message for background ticket"
                );
            }
        }

        Input::Event(ServerEvent::MessagesRead(r)) => {
            if state.is_open(&r.ticket_id) {
                state.messages.mark_all_read();
            }
            state.tickets.reset_unread(&r.ticket_id);
        }

        Input::Event(ServerEvent::NewTicketCreated(ticket)) => {
            let notification = Notification::NewTicket {
                ticket_id: ticket.id.clone(),
                subject: ticket.subject.clone(),
                username: ticket.user.username.clone(),
            };
            if state.tickets.upsert_from_event(ticket) {
                effects.push(Effect::Notify(notification));
            }
        }

        Input::Event(ServerEvent::SeenRequest(r)) => {
            if state.is_open(&r.ticket_id) {
                state.messages.mark_all_read();
                let user_id = state.user_id_of(&r.ticket_id);
                effects.push(Effect::Publish(Box::new(ClientEvent::Seen(
                    Receipt::from_admin(r.ticket_id.clone(), user_id),
                ))));
            }
            state.tickets.reset_role_unread(&r.ticket_id, Role::Admin);
        }

        // Terminal step of the handshake: never publishes.
        Input::Event(ServerEvent::Seen(r)) => {
            if state.is_open(&r.ticket_id) {
                state.messages.mark_all_read();
            }
        }

        // -- REST results -----------------------------------------------------
        Input::TicketsLoaded(tickets) => {
            info!(
                component = "reconcile",
                event = "reconcile.tickets.loaded",
                count = tickets.len(),
                "Ticket list replaced"
            );
            state.tickets.replace_all(tickets);
        }

        Input::TicketOpened { ticket_id } => {
            state.load_generation += 1;
            state.messages.clear();
            state.open_ticket = Some(ticket_id);
        }

        Input::TicketClosed => {
            state.open_ticket = None;
            state.messages.clear();
        }

        Input::MessagesLoaded {
            ticket_id,
            generation,
            messages,
        } => {
            // Opening a ticket means the admin has seen its history.
            state.tickets.reset_role_unread(&ticket_id, Role::Admin);

            if state.is_open(&ticket_id) && generation == state.load_generation {
                state.messages.load(&ticket_id, messages);
            } else {
                debug!(
                    component = "reconcile",
                    event = "reconcile.messages.stale",
                    ticket_id = %ticket_id,
                    generation,
                    current_generation = state.load_generation,
                    "Discarding messages for a ticket that is no longer open"
                );
            }
        }

        // The newMessage echo is the only path that appends a sent message.
        Input::MessageSent { ticket_id, message } => {
            effects.push(Effect::Publish(Box::new(ClientEvent::AdminSendMessage(
                MessagePayload { ticket_id, message },
            ))));
        }

        Input::StatusUpdated { ticket_id, status } => {
            state.tickets.update_status(&ticket_id, status);
            effects.push(Effect::Notify(Notification::StatusUpdated { ticket_id, status }));
        }

        Input::RequestFailed { op, error } => {
            effects.push(Effect::Notify(Notification::Error { op, message: error }));
        }
    }

    (state, effects)
}
