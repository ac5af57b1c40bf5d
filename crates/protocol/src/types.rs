//! Core types shared across the protocol

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Who wrote a message, and whose unread counter is meant
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Admin,
}

impl Role {
    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::Admin => "admin",
        }
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Ticket lifecycle status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TicketStatus {
    Open,
    Completed,
    Closed,
}

impl TicketStatus {
    pub fn as_str(self) -> &'static str {
        match self {
            TicketStatus::Open => "open",
            TicketStatus::Completed => "completed",
            TicketStatus::Closed => "closed",
        }
    }
}

impl fmt::Display for TicketStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Returned when a status string is not one of `open`, `completed`, `closed`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownStatus(pub String);

impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown ticket status: {}", self.0)
    }
}

impl std::error::Error for UnknownStatus {}

impl FromStr for TicketStatus {
    type Err = UnknownStatus;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value.trim().to_ascii_lowercase().as_str() {
            "open" => Ok(TicketStatus::Open),
            "completed" => Ok(TicketStatus::Completed),
            "closed" => Ok(TicketStatus::Closed),
            _ => Err(UnknownStatus(value.to_string())),
        }
    }
}

/// Per-role unread counters on a ticket
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UnreadMessages {
    #[serde(default)]
    pub admin: u32,
    #[serde(default)]
    pub user: u32,
}

impl UnreadMessages {
    pub fn get(&self, role: Role) -> u32 {
        match role {
            Role::Admin => self.admin,
            Role::User => self.user,
        }
    }

    pub fn increment(&mut self, role: Role) {
        let slot = self.slot_mut(role);
        *slot = slot.saturating_add(1);
    }

    pub fn reset(&mut self, role: Role) {
        *self.slot_mut(role) = 0;
    }

    pub fn reset_all(&mut self) {
        self.admin = 0;
        self.user = 0;
    }

    fn slot_mut(&mut self, role: Role) -> &mut u32 {
        match role {
            Role::Admin => &mut self.admin,
            Role::User => &mut self.user,
        }
    }
}

/// End user a ticket belongs to
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TicketUser {
    #[serde(rename = "_id")]
    pub id: String,
    #[serde(default)]
    pub username: String,
}

/// A support conversation thread
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Ticket {
    #[serde(rename = "_id")]
    pub id: String,
    pub status: TicketStatus,
    #[serde(default)]
    pub subject: String,
    pub user: TicketUser,
    #[serde(default)]
    pub unread_messages: UnreadMessages,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<String>,
}

/// One message inside a ticket
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Message {
    #[serde(rename = "_id", default, skip_serializing_if = "Option::is_none")]
    pub id: Option<String>,
    pub sender: Role,
    pub text: String,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub created_at: Option<String>,
}

impl Message {
    pub fn new(sender: Role, text: impl Into<String>) -> Self {
        Self {
            id: None,
            sender,
            text: text.into(),
            is_read: false,
            created_at: None,
        }
    }
}

/// A message addressed to a ticket, as carried by `newMessage` and
/// `adminSendMessage` frames
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MessagePayload {
    pub ticket_id: String,
    #[serde(flatten)]
    pub message: Message,
}

/// Payload of `messagesRead`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TicketRef {
    pub ticket_id: String,
}

/// Payload of the `seenRequest` / `seen` read-receipt handshake
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Receipt {
    pub ticket_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sender: Option<Role>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
}

impl Receipt {
    /// Receipt sent by the admin side for a ticket
    pub fn from_admin(ticket_id: impl Into<String>, user_id: Option<String>) -> Self {
        Self {
            ticket_id: ticket_id.into(),
            sender: Some(Role::Admin),
            user_id,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ticket_deserializes_from_backend_shape() {
        let json = r#"{
          "_id":"A1",
          "status":"open",
          "subject":"Withdrawal stuck",
          "user":{"_id":"u-1","username":"bob"},
          "unreadMessages":{"admin":3,"user":0},
          "createdAt":"2024-05-01T10:00:00Z"
        }"#;

        let ticket: Ticket = serde_json::from_str(json).expect("parse ticket");
        assert_eq!(ticket.id, "A1");
        assert_eq!(ticket.status, TicketStatus::Open);
        assert_eq!(ticket.user.username, "bob");
        assert_eq!(ticket.unread_messages.admin, 3);
        assert_eq!(ticket.created_at.as_deref(), Some("2024-05-01T10:00:00Z"));
    }

    #[test]
    fn ticket_without_counters_defaults_to_zero() {
        let json = r#"{"_id":"B2","status":"closed","user":{"_id":"u-2"}}"#;
        let ticket: Ticket = serde_json::from_str(json).expect("parse ticket");
        assert_eq!(ticket.unread_messages, UnreadMessages::default());
        assert_eq!(ticket.subject, "");
        assert_eq!(ticket.user.username, "");
    }

    #[test]
    fn status_parses_case_insensitively() {
        assert_eq!("OPEN".parse::<TicketStatus>(), Ok(TicketStatus::Open));
        assert_eq!(" Completed ".parse::<TicketStatus>(), Ok(TicketStatus::Completed));
        assert!("pending".parse::<TicketStatus>().is_err());
    }

    #[test]
    fn unread_counters_are_per_role() {
        let mut unread = UnreadMessages::default();
        unread.increment(Role::Admin);
        unread.increment(Role::Admin);
        unread.increment(Role::User);
        assert_eq!(unread.get(Role::Admin), 2);
        assert_eq!(unread.get(Role::User), 1);

        unread.reset(Role::Admin);
        assert_eq!(unread, UnreadMessages { admin: 0, user: 1 });

        unread.reset_all();
        assert_eq!(unread, UnreadMessages::default());
    }

    #[test]
    fn message_payload_is_flat_on_the_wire() {
        let payload = MessagePayload {
            ticket_id: "T1".to_string(),
            message: Message::new(Role::Admin, "hello"),
        };
        let value = serde_json::to_value(&payload).expect("serialize");
        assert_eq!(
            value,
            serde_json::json!({
                "ticketId": "T1",
                "sender": "admin",
                "text": "hello",
                "isRead": false
            })
        );
    }

    #[test]
    fn receipt_omits_unknown_user() {
        let receipt = Receipt::from_admin("T1", None);
        let value = serde_json::to_value(&receipt).expect("serialize");
        assert_eq!(value, serde_json::json!({"ticketId": "T1", "sender": "admin"}));
    }
}
