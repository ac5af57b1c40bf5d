//! Server → Client events pushed over the duplex channel

use serde::{Deserialize, Serialize};

use crate::types::*;

/// Events pushed by the server
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ServerEvent {
    /// A message was posted to a ticket (including echoes of our own sends)
    NewMessage(MessagePayload),
    /// The counterpart read every message of a ticket
    MessagesRead(TicketRef),
    /// An end user opened a new ticket
    NewTicketCreated(Ticket),
    /// The counterpart asks us to acknowledge that we saw a ticket
    SeenRequest(Receipt),
    /// The counterpart acknowledged our messages; terminal
    Seen(Receipt),
}

impl ServerEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ServerEvent::NewMessage(_) => "newMessage",
            ServerEvent::MessagesRead(_) => "messagesRead",
            ServerEvent::NewTicketCreated(_) => "newTicketCreated",
            ServerEvent::SeenRequest(_) => "seenRequest",
            ServerEvent::Seen(_) => "seen",
        }
    }

    /// Ticket the event is about
    pub fn ticket_id(&self) -> &str {
        match self {
            ServerEvent::NewMessage(payload) => &payload.ticket_id,
            ServerEvent::MessagesRead(r) => &r.ticket_id,
            ServerEvent::NewTicketCreated(ticket) => &ticket.id,
            ServerEvent::SeenRequest(r) | ServerEvent::Seen(r) => &r.ticket_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::ServerEvent;
    use crate::types::*;

    #[test]
    fn deserializes_new_message_frame() {
        let json = r#"{
          "event":"newMessage",
          "data":{"ticketId":"T1","sender":"user","text":"hi there","isRead":false}
        }"#;

        let parsed: ServerEvent = serde_json::from_str(json).expect("parse newMessage");
        match parsed {
            ServerEvent::NewMessage(MessagePayload { ticket_id, message }) => {
                assert_eq!(ticket_id, "T1");
                assert_eq!(message.sender, Role::User);
                assert_eq!(message.text, "hi there");
                assert!(!message.is_read);
                assert_eq!(message.id, None);
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn deserializes_seen_request_with_extra_fields() {
        let json = r#"{
          "event":"seenRequest",
          "data":{"ticketId":"T9","sender":"user","userId":"u-4","socketId":"abc"}
        }"#;

        let parsed: ServerEvent = serde_json::from_str(json).expect("parse seenRequest");
        assert_eq!(parsed.name(), "seenRequest");
        assert_eq!(parsed.ticket_id(), "T9");
        match parsed {
            ServerEvent::SeenRequest(receipt) => {
                assert_eq!(receipt.sender, Some(Role::User));
                assert_eq!(receipt.user_id.as_deref(), Some("u-4"));
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn deserializes_new_ticket_frame() {
        let json = r#"{
          "event":"newTicketCreated",
          "data":{"_id":"N1","status":"open","subject":"Card declined","user":{"_id":"u-7","username":"carol"}}
        }"#;

        let parsed: ServerEvent = serde_json::from_str(json).expect("parse newTicketCreated");
        match parsed {
            ServerEvent::NewTicketCreated(ticket) => {
                assert_eq!(ticket.id, "N1");
                assert_eq!(ticket.subject, "Card declined");
                assert_eq!(ticket.unread_messages, UnreadMessages::default());
            }
            other => panic!("unexpected variant: {:?}", other),
        }
    }

    #[test]
    fn rejects_unknown_event_name() {
        let json = r#"{"event":"typing","data":{"ticketId":"T1"}}"#;
        assert!(serde_json::from_str::<ServerEvent>(json).is_err());
    }
}
