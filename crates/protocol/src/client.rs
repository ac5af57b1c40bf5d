//! Client → Server events published over the duplex channel

use serde::{Deserialize, Serialize};

use crate::types::{MessagePayload, Receipt};

/// Room the admin console joins unless configured otherwise
pub const DEFAULT_ROOM: &str = "admin-room";

/// Events published by the client
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", content = "data", rename_all = "camelCase")]
pub enum ClientEvent {
    /// Bind this connection to a logical room
    Register { room: String },
    /// Rebroadcast a server-confirmed admin message to other listeners
    AdminSendMessage(MessagePayload),
    /// Ask the counterpart for a read receipt
    SeenRequest(Receipt),
    /// Acknowledge a `seenRequest`
    Seen(Receipt),
}

impl ClientEvent {
    /// Wire name of the event
    pub fn name(&self) -> &'static str {
        match self {
            ClientEvent::Register { .. } => "register",
            ClientEvent::AdminSendMessage(_) => "adminSendMessage",
            ClientEvent::SeenRequest(_) => "seenRequest",
            ClientEvent::Seen(_) => "seen",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Message, Role};

    #[test]
    fn register_frame_shape() {
        let event = ClientEvent::Register {
            room: DEFAULT_ROOM.to_string(),
        };
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({"event": "register", "data": {"room": "admin-room"}})
        );
    }

    #[test]
    fn seen_frame_carries_admin_sender() {
        let event = ClientEvent::Seen(Receipt::from_admin("T1", Some("u-1".to_string())));
        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "event": "seen",
                "data": {"ticketId": "T1", "sender": "admin", "userId": "u-1"}
            })
        );
        assert_eq!(event.name(), "seen");
    }

    #[test]
    fn admin_send_message_frame_shape() {
        let mut message = Message::new(Role::Admin, "on it");
        message.id = Some("m-9".to_string());
        let event = ClientEvent::AdminSendMessage(MessagePayload {
            ticket_id: "T3".to_string(),
            message,
        });

        let value = serde_json::to_value(&event).expect("serialize");
        assert_eq!(value["event"], "adminSendMessage");
        assert_eq!(value["data"]["ticketId"], "T3");
        assert_eq!(value["data"]["_id"], "m-9");
        assert_eq!(value["data"]["sender"], "admin");
    }
}
