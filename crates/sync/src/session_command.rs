//! Commands sent to the support session actor.

use helpdesk_protocol::{Message, MessageQuery, ServerEvent, TicketStatus};
use tokio::sync::oneshot;

use crate::error::SessionError;
use crate::reconcile::Input;

/// Runs on the actor after a request's input has been applied, so a waiting
/// caller observes the updated snapshot.
pub type Completion = Box<dyn FnOnce() + Send>;

/// A command that can be sent to the session actor.
pub enum SessionCommand {
    // -- REST-backed operations (answered once the result is applied) --
    LoadTickets {
        reply: Option<oneshot::Sender<Result<(), SessionError>>>,
    },
    OpenTicket {
        ticket_id: String,
        query: MessageQuery,
        reply: Option<oneshot::Sender<Result<(), SessionError>>>,
    },
    SendMessage {
        text: String,
        reply: oneshot::Sender<Result<Message, SessionError>>,
    },
    UpdateStatus {
        ticket_id: String,
        status: TicketStatus,
        reply: oneshot::Sender<Result<(), SessionError>>,
    },

    // -- Local mutations --
    CloseTicket,

    // -- Channel --
    /// Feed one inbound channel event through the reconciler
    Dispatch {
        event: ServerEvent,
    },

    // -- Internal --
    /// A spawned request finished
    RequestCompleted {
        input: Input,
        done: Option<Completion>,
    },
    /// Answered after every earlier command has been processed
    Flush {
        reply: oneshot::Sender<()>,
    },
}

/// Wrap a reply so it fires after the actor applied the matching input
pub(crate) fn answer<T: Send + 'static>(
    reply: Option<oneshot::Sender<T>>,
    value: T,
) -> Option<Completion> {
    reply.map(|tx| {
        Box::new(move || {
            let _ = tx.send(value);
        }) as Completion
    })
}
